//! Root and nested transactions for Tangle.
//!
//! This crate provides:
//! - [`TransactionHierarchy`] - A root transaction and its chain of
//!   sub-transactions, with commit, rollback, and discard
//! - [`PersistenceProvider`] - The store a root transaction loads from and
//!   persists to
//! - [`MemoryStore`] - An in-memory provider with timestamp-based
//!   concurrency checks
//! - [`TransactionScope`] / [`SubTransactionScope`] - Guards that select the
//!   current transaction
//! - [`TransactionConfig`] - Hierarchy tunables
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tangle_foundation::Type;
//! use tangle_mapping::{ClassDefinition, MappingConfiguration, PropertyDefinition};
//! use tangle_transaction::{MemoryStore, TransactionHierarchy};
//!
//! let mut mapping = MappingConfiguration::new();
//! mapping
//!     .register_class(
//!         ClassDefinition::new("Order")
//!             .with_property(PropertyDefinition::persistent("Number", Type::Int)),
//!     )
//!     .unwrap();
//!
//! let mut hierarchy = TransactionHierarchy::new(Arc::new(mapping), MemoryStore::new());
//! let root = hierarchy.root();
//! let order = hierarchy.new_object(root, "Order").unwrap();
//!
//! let sub = hierarchy.create_sub_transaction(root).unwrap();
//! hierarchy.set_value(sub, &order, "Number", 7_i64).unwrap();
//! hierarchy.commit(sub).unwrap();
//! hierarchy.commit(root).unwrap();
//!
//! assert!(hierarchy.provider().contains(&order));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod hierarchy;
pub mod node;
pub mod provider;
pub mod scope;
pub mod store;

pub use config::TransactionConfig;
pub use hierarchy::TransactionHierarchy;
pub use node::{TransactionNode, TransactionState};
pub use provider::{PersistableData, PersistenceProvider};
pub use scope::{SubTransactionScope, TransactionScope};
pub use store::{MemoryStore, StoredObject};
