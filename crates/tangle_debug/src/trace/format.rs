//! Trace output formatters.
//!
//! Provides human-readable and JSON formatters for trace records.

use std::fmt::Write;

use tangle_foundation::{ObjectId, Value};

use super::record::{TraceEvent, TraceRecord};

// =============================================================================
// Trace Formatter Trait
// =============================================================================

/// Trait for formatting trace records.
pub trait TraceFormatter {
    /// Formats a single trace record to a string.
    fn format(&self, record: &TraceRecord) -> String;

    /// Formats multiple records.
    fn format_many(&self, records: &[&TraceRecord]) -> String {
        records
            .iter()
            .map(|r| self.format(r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Human-Readable Formatter
// =============================================================================

/// Formats trace records in human-readable form.
///
/// ```text
/// txn:2 RELATION Order|1.Customer Customer|1 -> Customer|2
/// ```
#[derive(Clone, Debug, Default)]
pub struct HumanFormatter {
    /// Whether to include timestamps.
    pub show_timestamps: bool,
    /// Whether to include record IDs.
    pub show_ids: bool,
}

impl HumanFormatter {
    /// Creates a new human formatter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to show timestamps.
    #[must_use]
    pub fn with_timestamps(mut self) -> Self {
        self.show_timestamps = true;
        self
    }

    /// Builder method to show record IDs.
    #[must_use]
    pub fn with_ids(mut self) -> Self {
        self.show_ids = true;
        self
    }

    /// Formats timestamp in microseconds.
    #[allow(clippy::cast_precision_loss)]
    fn format_timestamp(ns: u64) -> String {
        let us = ns / 1000;
        if us >= 1_000_000 {
            format!("{:.3}s", us as f64 / 1_000_000.0)
        } else if us >= 1000 {
            format!("{:.3}ms", us as f64 / 1000.0)
        } else {
            format!("{us}us")
        }
    }

    fn related(id: Option<&ObjectId>) -> String {
        id.map_or_else(|| "null".to_string(), ToString::to_string)
    }

    fn objects(objects: &[ObjectId]) -> String {
        let names: Vec<_> = objects.iter().map(ToString::to_string).collect();
        format!("[{}]", names.join(", "))
    }
}

impl TraceFormatter for HumanFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let mut prefix = String::new();

        if self.show_ids {
            let _ = write!(prefix, "[{:06}] ", record.id);
        }

        let _ = write!(prefix, "{} ", record.transaction);

        if self.show_timestamps {
            let _ = write!(
                prefix,
                "{:>10} ",
                Self::format_timestamp(record.timestamp_ns)
            );
        }

        let event_str = match &record.event {
            TraceEvent::ObjectLoaded { object } => format!("LOAD {object}"),
            TraceEvent::PropertyChanging {
                object,
                property,
                old,
                new,
            } => format!("SETTING {object}.{property} {old} -> {new}"),
            TraceEvent::PropertyChanged {
                object,
                property,
                old,
                new,
            } => format!("SET {object}.{property} {old} -> {new}"),
            TraceEvent::RelationChanging {
                object,
                property,
                old,
                new,
            } => format!(
                "RELATING {object}.{property} {} -> {}",
                Self::related(old.as_ref()),
                Self::related(new.as_ref())
            ),
            TraceEvent::RelationChanged {
                object,
                property,
                old,
                new,
            } => format!(
                "RELATION {object}.{property} {} -> {}",
                Self::related(old.as_ref()),
                Self::related(new.as_ref())
            ),
            TraceEvent::ObjectDeleting { object } => format!("DELETING {object}"),
            TraceEvent::ObjectDeleted { object } => format!("DELETE {object}"),
            TraceEvent::TransactionCommitting { objects } => {
                format!("=== COMMITTING {} ===", Self::objects(objects))
            }
            TraceEvent::TransactionCommitted { objects } => {
                format!("=== COMMITTED {} ===", Self::objects(objects))
            }
            TraceEvent::TransactionRollingBack => "=== ROLLING BACK ===".to_string(),
            TraceEvent::TransactionRolledBack => "=== ROLLED BACK ===".to_string(),
            TraceEvent::SubTransactionCreated { child } => format!("=== SUB {child} ==="),
            TraceEvent::Vetoed { event_type } => format!("  VETO {event_type}"),
        };

        format!("{prefix}{event_str}")
    }
}

// =============================================================================
// JSON Formatter
// =============================================================================

/// Formats trace records as single-line JSON objects.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Creates a new JSON formatter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Quotes and escapes a string as a JSON string literal.
    fn quote(s: &str) -> String {
        serde_json::Value::String(s.to_owned()).to_string()
    }

    /// Formats a value as JSON.
    fn format_value(value: &Value) -> String {
        match value {
            Value::Nil => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.is_finite() {
                    f.to_string()
                } else {
                    format!("\"{f}\"")
                }
            }
            Value::String(s) => Self::quote(s),
            Value::ObjectRef(id) => Self::quote(&id.to_string()),
        }
    }

    fn format_object(id: Option<&ObjectId>) -> String {
        id.map_or_else(
            || "null".to_string(),
            |id| Self::quote(&id.to_string()),
        )
    }

    fn format_objects(objects: &[ObjectId]) -> String {
        let items: Vec<_> = objects.iter().map(|o| Self::format_object(Some(o))).collect();
        format!("[{}]", items.join(","))
    }
}

impl TraceFormatter for JsonFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let event_data = match &record.event {
            TraceEvent::ObjectLoaded { object }
            | TraceEvent::ObjectDeleting { object }
            | TraceEvent::ObjectDeleted { object } => {
                format!(",\"object\":{}", Self::format_object(Some(object)))
            }
            TraceEvent::PropertyChanging {
                object,
                property,
                old,
                new,
            }
            | TraceEvent::PropertyChanged {
                object,
                property,
                old,
                new,
            } => format!(
                ",\"object\":{},\"property\":{},\"old\":{},\"new\":{}",
                Self::format_object(Some(object)),
                Self::quote(property.as_str()),
                Self::format_value(old),
                Self::format_value(new)
            ),
            TraceEvent::RelationChanging {
                object,
                property,
                old,
                new,
            }
            | TraceEvent::RelationChanged {
                object,
                property,
                old,
                new,
            } => format!(
                ",\"object\":{},\"property\":{},\"old\":{},\"new\":{}",
                Self::format_object(Some(object)),
                Self::quote(property.as_str()),
                Self::format_object(old.as_ref()),
                Self::format_object(new.as_ref())
            ),
            TraceEvent::TransactionCommitting { objects }
            | TraceEvent::TransactionCommitted { objects } => {
                format!(",\"objects\":{}", Self::format_objects(objects))
            }
            TraceEvent::TransactionRollingBack | TraceEvent::TransactionRolledBack => {
                String::new()
            }
            TraceEvent::SubTransactionCreated { child } => format!(",\"child\":\"{child}\""),
            TraceEvent::Vetoed { event_type } => format!(",\"vetoed\":\"{event_type}\""),
        };

        format!(
            "{{\"id\":{},\"transaction\":\"{}\",\"timestamp_ns\":{},\"type\":\"{}\"{}}}",
            record.id,
            record.transaction,
            record.timestamp_ns,
            record.event_type(),
            event_data
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
