//! Entity state, relation end points, and the relation command protocol for Tangle.
//!
//! This crate provides:
//! - [`DataContainer`] - Current and original property values of one object
//! - [`RelationEndPoint`] - Real, virtual, collection, and null relation sides
//! - [`DomainObjectCollection`] - Ordered, duplicate-free related identities
//! - [`RelationCommand`] / [`CompositeCommand`] - Begin/Perform/End edits with
//!   expansion to every affected end point
//! - [`DataManager`] - The per-transaction registry of containers and end points
//! - [`TransactionListener`] - Change notifications with veto support
//! - [`ObjectLoader`] - The seam through which a data manager loads

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collection;
pub mod command;
pub mod container;
pub mod data_manager;
pub mod end_point;
pub mod listener;
pub mod loader;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::DomainObjectCollection;
pub use command::{CompositeCommand, RelationCommand};
pub use container::{DataContainer, ObjectState};
pub use data_manager::{DataContext, DataManager};
pub use end_point::{
    CollectionEndPoint, LoadState, NullEndPoint, RealEndPoint, RelationEndPoint,
    VirtualObjectEndPoint,
};
pub use listener::{CompositeListener, NoopListener, TransactionListener};
pub use loader::ObjectLoader;
