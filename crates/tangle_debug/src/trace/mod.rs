//! Notification tracing for Tangle transactions.
//!
//! [`EventRecorder`] is a [`TransactionListener`] that stores every
//! notification it receives in a shared [`TraceBuffer`]. Register the
//! recorder with a hierarchy and keep the [`TraceHandle`] to inspect what was
//! raised.
//!
//! # Example
//!
//! ```
//! use tangle_debug::{EventRecorder, HumanFormatter, TracerConfig};
//!
//! let recorder = EventRecorder::new(TracerConfig::new().with_buffer_size(100));
//! let handle = recorder.handle();
//! // hierarchy.add_listener(Box::new(recorder));
//! assert!(handle.is_empty());
//! assert_eq!(handle.format(&HumanFormatter::new()), "");
//! ```

pub mod buffer;
pub mod format;
pub mod record;

pub use buffer::{TraceBuffer, TraceBufferStats};
pub use format::{HumanFormatter, JsonFormatter, TraceFormatter};
pub use record::{TraceEvent, TraceRecord};

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use tangle_data::TransactionListener;
use tangle_foundation::{Error, ObjectId, PropertyName, Result, TransactionId, Value};
use tracing::debug;

// =============================================================================
// Trace Output
// =============================================================================

/// Where recorded events are echoed besides the buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceOutput {
    /// Buffer only.
    #[default]
    None,
    /// Also emit each formatted record as a `tracing` debug event.
    Log,
}

// =============================================================================
// Tracer Configuration
// =============================================================================

/// Configuration for an [`EventRecorder`].
#[derive(Clone, Debug)]
pub struct TracerConfig {
    /// Whether recording is enabled.
    pub enabled: bool,
    /// Maximum records to keep in buffer.
    pub buffer_size: usize,
    /// Where to echo records.
    pub output: TraceOutput,
    /// Event types to record (empty = all).
    pub event_filter: Vec<String>,
    /// Event types the recorder vetoes.
    pub vetoes: Vec<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: 10000,
            output: TraceOutput::None,
            event_filter: Vec::new(),
            vetoes: Vec::new(),
        }
    }
}

impl TracerConfig {
    /// Creates a new tracer configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Builder method to set buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Builder method to echo records through `tracing`.
    #[must_use]
    pub fn to_log(mut self) -> Self {
        self.output = TraceOutput::Log;
        self
    }

    /// Builder method to filter event types.
    #[must_use]
    pub fn filter_events(mut self, types: Vec<String>) -> Self {
        self.event_filter = types;
        self
    }

    /// Builder method to veto an event type.
    ///
    /// Only vetoable events (`*-changing`, `object-deleting`,
    /// `transaction-committing`, `transaction-rolling-back`) can be vetoed.
    #[must_use]
    pub fn veto(mut self, event_type: impl Into<String>) -> Self {
        self.vetoes.push(event_type.into());
        self
    }

    /// Returns true if events of this type are recorded.
    #[must_use]
    pub fn records(&self, event_type: &str) -> bool {
        self.enabled
            && (self.event_filter.is_empty() || self.event_filter.iter().any(|t| t == event_type))
    }
}

// =============================================================================
// Trace Handle
// =============================================================================

/// Shared read access to the buffer of an [`EventRecorder`].
#[derive(Clone, Debug, Default)]
pub struct TraceHandle {
    buffer: Rc<RefCell<TraceBuffer>>,
}

impl TraceHandle {
    /// Returns the number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.borrow().is_empty()
    }

    /// Returns a copy of every buffered record, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<TraceRecord> {
        self.buffer.borrow().iter().cloned().collect()
    }

    /// Returns the buffered events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.buffer.borrow().iter().map(|r| r.event.clone()).collect()
    }

    /// Returns the event type of every buffered record.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.buffer.borrow().event_types()
    }

    /// Returns buffer statistics.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        self.buffer.borrow().stats()
    }

    /// Runs `f` against the buffer.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&TraceBuffer) -> R) -> R {
        f(&self.buffer.borrow())
    }

    /// Formats every buffered record, one per line.
    #[must_use]
    pub fn format(&self, formatter: &dyn TraceFormatter) -> String {
        let buffer = self.buffer.borrow();
        let records: Vec<_> = buffer.iter().collect();
        formatter.format_many(&records)
    }

    /// Clears the buffer.
    pub fn clear(&self) {
        self.buffer.borrow_mut().clear();
    }
}

// =============================================================================
// Event Recorder
// =============================================================================

/// A listener that records every notification.
///
/// Recording costs nothing beyond a flag check when disabled.
#[derive(Debug)]
pub struct EventRecorder {
    config: TracerConfig,
    handle: TraceHandle,
    start_time: Instant,
    human_formatter: HumanFormatter,
}

impl EventRecorder {
    /// Creates a recorder with the given configuration.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        let buffer = TraceBuffer::new(config.buffer_size);
        Self {
            config,
            handle: TraceHandle {
                buffer: Rc::new(RefCell::new(buffer)),
            },
            start_time: Instant::now(),
            human_formatter: HumanFormatter::new(),
        }
    }

    /// Returns a handle to the recorder's buffer.
    #[must_use]
    pub fn handle(&self) -> TraceHandle {
        self.handle.clone()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Returns whether recording is enabled.
    #[must_use]
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Enables recording.
    pub fn enable(&mut self) {
        self.config.enabled = true;
    }

    /// Disables recording.
    pub fn disable(&mut self) {
        self.config.enabled = false;
    }

    /// Records an event raised by `tx`.
    #[inline]
    pub fn record(&mut self, tx: TransactionId, event: TraceEvent) {
        if !self.config.enabled {
            return;
        }
        self.record_internal(tx, event);
    }

    fn record_internal(&mut self, tx: TransactionId, event: TraceEvent) {
        if !self.config.records(event.event_type()) {
            return;
        }

        #[allow(clippy::cast_possible_truncation)]
        let timestamp_ns = self.start_time.elapsed().as_nanos() as u64;
        let mut buffer = self.handle.buffer.borrow_mut();
        let id = buffer.push(tx, timestamp_ns, event);

        if self.config.output == TraceOutput::Log {
            if let Some(record) = buffer.get(id) {
                debug!(target: "tangle::trace", "{}", self.human_formatter.format(record));
            }
        }
    }

    /// Records a vetoable event and rejects it if its type is vetoed.
    fn record_vetoable(&mut self, tx: TransactionId, event: TraceEvent) -> Result<()> {
        let event_type = event.event_type();
        self.record(tx, event);
        if self.config.vetoes.iter().any(|t| t == event_type) {
            self.record(tx, TraceEvent::Vetoed { event_type });
            return Err(Error::cancelled(format!("{event_type} vetoed by recorder"))
                .in_transaction(tx));
        }
        Ok(())
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(TracerConfig::default())
    }
}

impl TransactionListener for EventRecorder {
    fn object_loaded(&mut self, tx: TransactionId, object: &ObjectId) {
        self.record(
            tx,
            TraceEvent::ObjectLoaded {
                object: object.clone(),
            },
        );
    }

    fn property_changing(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: &Value,
        new: &Value,
    ) -> Result<()> {
        self.record_vetoable(
            tx,
            TraceEvent::PropertyChanging {
                object: object.clone(),
                property: property.clone(),
                old: old.clone(),
                new: new.clone(),
            },
        )
    }

    fn property_changed(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: &Value,
        new: &Value,
    ) {
        self.record(
            tx,
            TraceEvent::PropertyChanged {
                object: object.clone(),
                property: property.clone(),
                old: old.clone(),
                new: new.clone(),
            },
        );
    }

    fn relation_changing(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> Result<()> {
        self.record_vetoable(
            tx,
            TraceEvent::RelationChanging {
                object: object.clone(),
                property: property.clone(),
                old: old.cloned(),
                new: new.cloned(),
            },
        )
    }

    fn relation_changed(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
        self.record(
            tx,
            TraceEvent::RelationChanged {
                object: object.clone(),
                property: property.clone(),
                old: old.cloned(),
                new: new.cloned(),
            },
        );
    }

    fn object_deleting(&mut self, tx: TransactionId, object: &ObjectId) -> Result<()> {
        self.record_vetoable(
            tx,
            TraceEvent::ObjectDeleting {
                object: object.clone(),
            },
        )
    }

    fn object_deleted(&mut self, tx: TransactionId, object: &ObjectId) {
        self.record(
            tx,
            TraceEvent::ObjectDeleted {
                object: object.clone(),
            },
        );
    }

    fn transaction_committing(&mut self, tx: TransactionId, objects: &[ObjectId]) -> Result<()> {
        self.record_vetoable(
            tx,
            TraceEvent::TransactionCommitting {
                objects: objects.to_vec(),
            },
        )
    }

    fn transaction_committed(&mut self, tx: TransactionId, objects: &[ObjectId]) {
        self.record(
            tx,
            TraceEvent::TransactionCommitted {
                objects: objects.to_vec(),
            },
        );
    }

    fn transaction_rolling_back(&mut self, tx: TransactionId) -> Result<()> {
        self.record_vetoable(tx, TraceEvent::TransactionRollingBack)
    }

    fn transaction_rolled_back(&mut self, tx: TransactionId) {
        self.record(tx, TraceEvent::TransactionRolledBack);
    }

    fn sub_transaction_created(&mut self, parent: TransactionId, child: TransactionId) {
        self.record(parent, TraceEvent::SubTransactionCreated { child });
    }
}

// =============================================================================
// Tests
// =============================================================================
