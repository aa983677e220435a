//! Class, property, and relation mapping for Tangle.
//!
//! This crate provides:
//! - [`ClassDefinition`] / [`PropertyDefinition`] - Declared properties and types
//! - [`RelationDefinition`] - Relations as pairs of end point definitions
//! - [`MappingConfiguration`] - The read-only registry consulted by the core
//!
//! Mappings are built programmatically; loading them from declarative sources
//! is left to callers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod configuration;
mod relation;
mod schema;

pub use configuration::MappingConfiguration;
pub use relation::{Cardinality, RelationDefinition, RelationEndPointDefinition, RelationKind};
pub use schema::{ClassDefinition, PropertyDefinition, StorageClass};
