//! Tangle - Client-side transactional object cache
//!
//! This crate re-exports all layers of the Tangle system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: tangle_debug       - Notification recording and trace formatting
//! Layer 3: tangle_transaction - Root and sub-transactions, persistence, MemoryStore
//! Layer 2: tangle_data        - Data containers, relation end points, commands
//! Layer 1: tangle_mapping     - Class, property, and relation definitions
//! Layer 0: tangle_foundation  - Core types (ObjectId, Value, Error)
//! ```

pub use tangle_data as data;
pub use tangle_debug as debug;
pub use tangle_foundation as foundation;
pub use tangle_mapping as mapping;
pub use tangle_transaction as transaction;
