//! Trace event and record types.
//!
//! One [`TraceEvent`] variant exists per [`TransactionListener`] method, plus
//! [`TraceEvent::Vetoed`] for vetoes raised by the recorder itself.
//!
//! [`TransactionListener`]: tangle_data::TransactionListener

use tangle_foundation::{ObjectId, PropertyName, TransactionId, Value};

// =============================================================================
// Trace Event
// =============================================================================

/// Events observed on a transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// An object was loaded.
    ObjectLoaded {
        /// The loaded object.
        object: ObjectId,
    },

    /// A property value is about to change.
    PropertyChanging {
        /// The object being written.
        object: ObjectId,
        /// The property being written.
        property: PropertyName,
        /// The current value.
        old: Value,
        /// The value about to be written.
        new: Value,
    },

    /// A property value has changed.
    PropertyChanged {
        /// The object that was written.
        object: ObjectId,
        /// The property that was written.
        property: PropertyName,
        /// The previous value.
        old: Value,
        /// The new value.
        new: Value,
    },

    /// A relation end point is about to change.
    RelationChanging {
        /// The owner of the end point.
        object: ObjectId,
        /// The relation property.
        property: PropertyName,
        /// The related object being removed, if any.
        old: Option<ObjectId>,
        /// The related object being added, if any.
        new: Option<ObjectId>,
    },

    /// A relation end point has changed.
    RelationChanged {
        /// The owner of the end point.
        object: ObjectId,
        /// The relation property.
        property: PropertyName,
        /// The related object that was removed, if any.
        old: Option<ObjectId>,
        /// The related object that was added, if any.
        new: Option<ObjectId>,
    },

    /// An object is about to be deleted.
    ObjectDeleting {
        /// The object.
        object: ObjectId,
    },

    /// An object was deleted.
    ObjectDeleted {
        /// The object.
        object: ObjectId,
    },

    /// A transaction is about to commit.
    TransactionCommitting {
        /// The new, changed, and deleted objects.
        objects: Vec<ObjectId>,
    },

    /// A transaction has committed.
    TransactionCommitted {
        /// The new, changed, and deleted objects.
        objects: Vec<ObjectId>,
    },

    /// A transaction is about to roll back.
    TransactionRollingBack,

    /// A transaction has rolled back.
    TransactionRolledBack,

    /// A sub-transaction was created below the recorded transaction.
    SubTransactionCreated {
        /// The new sub-transaction.
        child: TransactionId,
    },

    /// The recorder vetoed the preceding event.
    Vetoed {
        /// Event type of the vetoed event.
        event_type: &'static str,
    },
}

impl TraceEvent {
    /// Returns a short name for the event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ObjectLoaded { .. } => "object-loaded",
            Self::PropertyChanging { .. } => "property-changing",
            Self::PropertyChanged { .. } => "property-changed",
            Self::RelationChanging { .. } => "relation-changing",
            Self::RelationChanged { .. } => "relation-changed",
            Self::ObjectDeleting { .. } => "object-deleting",
            Self::ObjectDeleted { .. } => "object-deleted",
            Self::TransactionCommitting { .. } => "transaction-committing",
            Self::TransactionCommitted { .. } => "transaction-committed",
            Self::TransactionRollingBack => "transaction-rolling-back",
            Self::TransactionRolledBack => "transaction-rolled-back",
            Self::SubTransactionCreated { .. } => "sub-transaction-created",
            Self::Vetoed { .. } => "vetoed",
        }
    }

    /// Returns true if a listener may veto this event.
    #[must_use]
    pub fn is_vetoable(&self) -> bool {
        matches!(
            self,
            Self::PropertyChanging { .. }
                | Self::RelationChanging { .. }
                | Self::ObjectDeleting { .. }
                | Self::TransactionCommitting { .. }
                | Self::TransactionRollingBack
        )
    }

    /// Returns true if this is a relation end point event.
    #[must_use]
    pub fn is_relation_event(&self) -> bool {
        matches!(
            self,
            Self::RelationChanging { .. } | Self::RelationChanged { .. }
        )
    }

    /// Returns true if this event marks a transaction boundary.
    #[must_use]
    pub fn is_transaction_boundary(&self) -> bool {
        matches!(
            self,
            Self::TransactionCommitting { .. }
                | Self::TransactionCommitted { .. }
                | Self::TransactionRollingBack
                | Self::TransactionRolledBack
                | Self::SubTransactionCreated { .. }
        )
    }

    /// Returns the object the event is about, if it concerns a single object.
    #[must_use]
    pub fn object(&self) -> Option<&ObjectId> {
        match self {
            Self::ObjectLoaded { object }
            | Self::PropertyChanging { object, .. }
            | Self::PropertyChanged { object, .. }
            | Self::RelationChanging { object, .. }
            | Self::RelationChanged { object, .. }
            | Self::ObjectDeleting { object }
            | Self::ObjectDeleted { object } => Some(object),
            _ => None,
        }
    }
}

// =============================================================================
// Trace Record
// =============================================================================

/// A timestamped trace record.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    /// Unique record ID within the recorder.
    pub id: u64,
    /// The transaction that raised the event.
    pub transaction: TransactionId,
    /// Nanoseconds since the recorder was created.
    pub timestamp_ns: u64,
    /// The trace event.
    pub event: TraceEvent,
}

impl TraceRecord {
    /// Creates a new trace record.
    #[must_use]
    pub fn new(id: u64, transaction: TransactionId, timestamp_ns: u64, event: TraceEvent) -> Self {
        Self {
            id,
            transaction,
            timestamp_ns,
            event,
        }
    }

    /// Returns the event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

// =============================================================================
// Tests
// =============================================================================
