//! Error types for Tangle.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::id::{ClassId, ObjectId, PropertyName, RelationEndPointId, TransactionId};
use crate::types::Type;

/// The main error type for Tangle operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Attaches the transaction that raised this error, keeping existing context.
    #[must_use]
    pub fn in_transaction(mut self, tx: TransactionId) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_transaction(tx));
        self
    }

    /// Creates an object not found error.
    #[must_use]
    pub fn not_found(id: ObjectId) -> Self {
        Self::new(ErrorKind::NotFound(id))
    }

    /// Creates an error for an identity already marked invalid.
    #[must_use]
    pub fn already_invalid(id: ObjectId) -> Self {
        Self::new(ErrorKind::AlreadyInvalid(id))
    }

    /// Creates a protocol violation error.
    #[must_use]
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolViolation(message.into()))
    }

    /// Creates a type mismatch error for a property write.
    #[must_use]
    pub fn type_mismatch(
        object: ObjectId,
        property: PropertyName,
        expected: Type,
        actual: Type,
    ) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            object,
            property,
            expected,
            actual,
        })
    }

    /// Creates an optimistic concurrency conflict error.
    #[must_use]
    pub fn concurrency_conflict(id: ObjectId) -> Self {
        Self::new(ErrorKind::ConcurrencyConflict(id))
    }

    /// Creates an invalid operation error.
    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOperation(message.into()))
    }

    /// Creates a re-entrant load error.
    #[must_use]
    pub fn reentrant_load(end_point: RelationEndPointId) -> Self {
        Self::new(ErrorKind::ReentrantLoad(end_point))
    }

    /// Creates an unknown class error.
    #[must_use]
    pub fn unknown_class(class: ClassId) -> Self {
        Self::new(ErrorKind::UnknownClass(class))
    }

    /// Creates an unknown property error.
    #[must_use]
    pub fn unknown_property(class: ClassId, property: PropertyName) -> Self {
        Self::new(ErrorKind::UnknownProperty { class, property })
    }

    /// Creates a cancellation error, typically raised by a `changing` handler.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled(reason.into()))
    }

    /// Creates a storage error reported by a persistence provider.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage(message.into()))
    }

    /// Creates an internal error for a broken invariant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this error is a not-found or already-invalid error.
    #[must_use]
    pub fn is_missing_object(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::NotFound(_) | ErrorKind::AlreadyInvalid(_)
        )
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The requested identity could not be loaded.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The identity was marked invalid earlier in this transaction.
    #[error("object is invalid in this transaction: {0}")]
    AlreadyInvalid(ObjectId),

    /// A command or end point was used against its protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Value assigned to a property of incompatible declared type.
    #[error("type mismatch on {object}.{property}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The object being written.
        object: ObjectId,
        /// The property being written.
        property: PropertyName,
        /// The declared type.
        expected: Type,
        /// The type of the rejected value.
        actual: Type,
    },

    /// Persist-time timestamp mismatch reported by the store.
    #[error("concurrency conflict on {0}")]
    ConcurrencyConflict(ObjectId),

    /// Operation not permitted in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A load was requested for an end point that is already loading.
    #[error("re-entrant load of end point {0}")]
    ReentrantLoad(RelationEndPointId),

    /// Class is not part of the mapping.
    #[error("unknown class: {0}")]
    UnknownClass(ClassId),

    /// Property is not defined on the class.
    #[error("unknown property: {class}.{property}")]
    UnknownProperty {
        /// The class that was queried.
        class: ClassId,
        /// The property that was not found.
        property: PropertyName,
    },

    /// An edit was vetoed by a notification handler.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Failure reported by the persistence provider.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The object involved.
    pub object: Option<ObjectId>,
    /// The property or relation involved.
    pub property: Option<PropertyName>,
    /// The transaction in which the error was raised.
    pub transaction: Option<TransactionId>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the object.
    #[must_use]
    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }

    /// Sets the property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyName) -> Self {
        self.property = Some(property);
        self
    }

    /// Sets object and property from an end point identifier.
    #[must_use]
    pub fn with_end_point(self, end_point: &RelationEndPointId) -> Self {
        self.with_object(end_point.object.clone())
            .with_property(end_point.property.clone())
    }

    /// Sets the transaction.
    #[must_use]
    pub fn with_transaction(mut self, tx: TransactionId) -> Self {
        self.transaction = Some(tx);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.object, &self.property) {
            (Some(object), Some(property)) => write!(f, "at {object}.{property}")?,
            (Some(object), None) => write!(f, "at {object}")?,
            (None, Some(property)) => write!(f, "at .{property}")?,
            (None, None) => {}
        }
        if let Some(tx) = self.transaction {
            write!(f, " in {tx}")?;
        }
        Ok(())
    }
}
