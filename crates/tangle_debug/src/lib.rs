//! Notification tracing for Tangle.
//!
//! This crate provides:
//! - [`EventRecorder`] - A transaction listener that records every notification
//! - [`TraceBuffer`] - A ring buffer of [`TraceRecord`]s
//! - [`HumanFormatter`] / [`JsonFormatter`] - Renderers for recorded events
//! - [`TracerConfig`] - Buffer size, event filter, and vetoes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod trace;

pub use trace::{
    EventRecorder, HumanFormatter, JsonFormatter, TraceBuffer, TraceBufferStats, TraceEvent,
    TraceFormatter, TraceHandle, TraceOutput, TraceRecord, TracerConfig,
};
