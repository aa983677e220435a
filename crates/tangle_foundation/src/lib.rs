//! Core identities, values, and errors for Tangle.
//!
//! This crate provides:
//! - [`ObjectId`] - Class-tagged object identities
//! - [`RelationEndPointId`] - Addresses one side of one relation instance
//! - [`Value`] - Property values held by data containers
//! - [`Type`] - Type descriptors for property validation
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod types;
pub mod value;

pub use error::{Error, ErrorContext, ErrorKind};
pub use id::{
    ClassId, IdValue, ObjectId, PropertyName, RelationEndPointId, Timestamp, TransactionId,
};
pub use types::Type;
pub use value::Value;

/// Result type alias using Tangle's Error.
pub type Result<T> = std::result::Result<T, Error>;
