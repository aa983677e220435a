//! Entity state containers.
//!
//! A `DataContainer` holds the current and original property values of one
//! object. Both maps are persistent (`im::OrdMap`), so taking the original
//! snapshot on commit is O(1) and shares structure with the current values.

use im::{OrdMap, OrdSet};
use tangle_foundation::{
    Error, ErrorContext, ObjectId, PropertyName, Result, Timestamp, Value,
};
use tangle_mapping::{ClassDefinition, PropertyDefinition};

// =============================================================================
// Object State
// =============================================================================

/// Externally visible state of an object within one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// Created in this transaction and not yet committed.
    New,
    /// Loaded and not modified.
    Unchanged,
    /// Loaded and modified, or explicitly marked as changed.
    Changed,
    /// Marked for deletion; removed on commit.
    Deleted,
    /// No longer part of the transaction.
    Discarded,
    /// The identity is known not to exist in this transaction.
    Invalid,
}

impl std::fmt::Display for ObjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Changed => write!(f, "changed"),
            Self::Deleted => write!(f, "deleted"),
            Self::Discarded => write!(f, "discarded"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    New,
    Existing,
    Deleted { was_new: bool },
    Discarded,
}

// =============================================================================
// Data Container
// =============================================================================

/// Current and original property values of one object.
#[derive(Clone, Debug)]
pub struct DataContainer {
    id: ObjectId,
    /// Concurrency token; `None` until the object has been persisted.
    timestamp: Option<Timestamp>,
    values: OrdMap<PropertyName, Value>,
    original: OrdMap<PropertyName, Value>,
    /// Properties that are committed locally but never persisted.
    transaction_local: OrdSet<PropertyName>,
    lifecycle: Lifecycle,
    marked_changed: bool,
    new_in_hierarchy: bool,
}

impl DataContainer {
    /// Creates the container of a new object, filled with property defaults.
    #[must_use]
    pub fn new_object(class: &ClassDefinition, id: ObjectId) -> Self {
        let values: OrdMap<_, _> = class
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.initial_value()))
            .collect();
        Self {
            id,
            timestamp: None,
            original: values.clone(),
            values,
            transaction_local: local_properties(class),
            lifecycle: Lifecycle::New,
            marked_changed: false,
            new_in_hierarchy: false,
        }
    }

    /// Creates the container of an object read from a store.
    ///
    /// Properties missing from `values` start with their default; values for
    /// undeclared properties are ignored.
    pub fn from_loaded(
        class: &ClassDefinition,
        id: ObjectId,
        timestamp: Timestamp,
        values: impl IntoIterator<Item = (PropertyName, Value)>,
    ) -> Self {
        let mut current: OrdMap<_, _> = class
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.initial_value()))
            .collect();
        for (name, value) in values {
            if current.contains_key(&name) {
                current.insert(name, value);
            }
        }
        Self {
            id,
            timestamp: Some(timestamp),
            original: current.clone(),
            values: current,
            transaction_local: local_properties(class),
            lifecycle: Lifecycle::Existing,
            marked_changed: false,
            new_in_hierarchy: false,
        }
    }

    /// Creates the view of this container handed to a sub-transaction.
    ///
    /// The child starts unchanged at the parent's current values. Objects that
    /// are new anywhere up the hierarchy arrive flagged as new-in-hierarchy.
    #[must_use]
    pub fn for_sub_transaction(&self) -> Self {
        Self {
            id: self.id.clone(),
            timestamp: self.timestamp,
            values: self.values.clone(),
            original: self.values.clone(),
            transaction_local: self.transaction_local.clone(),
            lifecycle: Lifecycle::Existing,
            marked_changed: false,
            new_in_hierarchy: self.new_in_hierarchy || self.lifecycle == Lifecycle::New,
        }
    }

    /// Returns the object identity.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Returns the concurrency token, if the object has been persisted.
    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Replaces the concurrency token after a successful persist.
    pub fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = Some(timestamp);
    }

    /// Returns the state derived from lifecycle and value changes.
    #[must_use]
    pub fn state(&self) -> ObjectState {
        match self.lifecycle {
            Lifecycle::New => ObjectState::New,
            Lifecycle::Deleted { .. } => ObjectState::Deleted,
            Lifecycle::Discarded => ObjectState::Discarded,
            Lifecycle::Existing if self.has_changes() => ObjectState::Changed,
            Lifecycle::Existing => ObjectState::Unchanged,
        }
    }

    /// Returns true if the object was created in this transaction.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.lifecycle == Lifecycle::New
    }

    /// Returns true if the object is marked for deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Deleted { .. })
    }

    /// Returns true if the object was created and deleted in this transaction.
    #[must_use]
    pub fn is_deleted_new(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted { was_new: true }
    }

    /// Returns true if the container has been discarded.
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.lifecycle == Lifecycle::Discarded
    }

    /// Returns true if the object is new in an enclosing transaction.
    #[must_use]
    pub fn is_new_in_hierarchy(&self) -> bool {
        self.new_in_hierarchy
    }

    /// Flags the object as new in an enclosing transaction.
    pub fn set_new_in_hierarchy(&mut self) {
        self.new_in_hierarchy = true;
    }

    /// Returns true if the object was explicitly marked as changed.
    #[must_use]
    pub fn is_marked_changed(&self) -> bool {
        self.marked_changed
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Returns the current value of a property.
    #[must_use]
    pub fn value(&self, property: &PropertyName) -> Option<&Value> {
        self.values.get(property)
    }

    /// Returns the value of a property as of the last commit or load.
    #[must_use]
    pub fn original_value(&self, property: &PropertyName) -> Option<&Value> {
        self.original.get(property)
    }

    /// Iterates over current values in property order.
    pub fn values(&self) -> impl Iterator<Item = (&PropertyName, &Value)> {
        self.values.iter()
    }

    /// Iterates over original values in property order.
    pub fn original_values(&self) -> impl Iterator<Item = (&PropertyName, &Value)> {
        self.original.iter()
    }

    /// Iterates over the current values of persistent properties.
    pub fn persistent_values(&self) -> impl Iterator<Item = (&PropertyName, &Value)> {
        self.values
            .iter()
            .filter(|(name, _)| !self.transaction_local.contains(*name))
    }

    /// Validates a write without performing it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The container is deleted or discarded (`InvalidOperation`)
    /// - The property backs a relation (`ProtocolViolation`)
    /// - The value does not match the declared type (`TypeMismatch`)
    pub fn check_value(&self, definition: &PropertyDefinition, value: &Value) -> Result<()> {
        self.check_writable()?;
        if definition.is_relation {
            return Err(Error::protocol_violation(format!(
                "relation property {} must be changed through its end point",
                definition.name
            ))
            .with_context(self.context(&definition.name)));
        }
        let actual = value.value_type();
        if !definition.ty.accepts(&actual) {
            return Err(Error::type_mismatch(
                self.id.clone(),
                definition.name.clone(),
                definition.ty.clone(),
                actual,
            ));
        }
        Ok(())
    }

    /// Sets a property value, returning the previous value.
    ///
    /// # Errors
    ///
    /// See [`check_value`](Self::check_value).
    pub fn set_value(&mut self, definition: &PropertyDefinition, value: Value) -> Result<Value> {
        self.check_value(definition, &value)?;
        Ok(self
            .values
            .insert(definition.name.clone(), value)
            .unwrap_or(Value::Nil))
    }

    /// Writes the foreign key backing a real relation end point.
    pub(crate) fn set_relation_value(
        &mut self,
        property: &PropertyName,
        related: Option<ObjectId>,
    ) -> Result<()> {
        if self.is_discarded() {
            return Err(Error::invalid_operation("object has been discarded")
                .with_context(self.context(property)));
        }
        self.values
            .insert(property.clone(), Value::from_object(related));
        Ok(())
    }

    /// Marks the object as changed regardless of its values.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is deleted or discarded.
    pub fn mark_as_changed(&mut self) -> Result<()> {
        self.check_writable()?;
        self.marked_changed = true;
        Ok(())
    }

    /// Returns true if any value differs from its original or the object was
    /// marked as changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.marked_changed || self.values != self.original
    }

    /// Returns true if a persistent property differs from its original.
    #[must_use]
    pub fn has_persistent_changes(&self) -> bool {
        self.changed_properties()
            .any(|name| !self.transaction_local.contains(name))
    }

    /// Returns true if a transaction-local property differs from its original.
    #[must_use]
    pub fn has_transaction_local_changes(&self) -> bool {
        self.changed_properties()
            .any(|name| self.transaction_local.contains(name))
    }

    /// Returns true if the store needs to see this object on commit.
    #[must_use]
    pub fn needs_persisting(&self) -> bool {
        match self.lifecycle {
            Lifecycle::New => true,
            Lifecycle::Existing => self.marked_changed || self.has_persistent_changes(),
            Lifecycle::Deleted { .. } | Lifecycle::Discarded => false,
        }
    }

    /// Iterates over the properties whose current value differs from the original.
    pub fn changed_properties(&self) -> impl Iterator<Item = &PropertyName> {
        self.values
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, _)| name)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Accepts the current values as the new originals.
    ///
    /// New and changed objects become unchanged; deleted objects become
    /// discarded and are dropped by the owning data manager.
    pub fn commit_state(&mut self) {
        match self.lifecycle {
            Lifecycle::Deleted { .. } => self.lifecycle = Lifecycle::Discarded,
            Lifecycle::Discarded => {}
            Lifecycle::New | Lifecycle::Existing => {
                self.original = self.values.clone();
                self.lifecycle = Lifecycle::Existing;
                self.marked_changed = false;
            }
        }
    }

    /// Restores the original values.
    ///
    /// New objects become discarded; deleted objects return to their state
    /// before deletion.
    pub fn rollback_state(&mut self) {
        self.values = self.original.clone();
        self.marked_changed = false;
        self.lifecycle = match self.lifecycle {
            Lifecycle::New | Lifecycle::Deleted { was_new: true } | Lifecycle::Discarded => {
                Lifecycle::Discarded
            }
            Lifecycle::Existing | Lifecycle::Deleted { was_new: false } => Lifecycle::Existing,
        };
    }

    /// Marks the object for deletion.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the object is already deleted and
    /// `InvalidOperation` if it has been discarded.
    pub fn mark_deleted(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Deleted { .. } => Err(Error::protocol_violation(format!(
                "object {} is already deleted",
                self.id
            ))),
            Lifecycle::Discarded => Err(Error::invalid_operation(format!(
                "object {} has been discarded",
                self.id
            ))),
            Lifecycle::New => {
                self.lifecycle = Lifecycle::Deleted { was_new: true };
                Ok(())
            }
            Lifecycle::Existing => {
                self.lifecycle = Lifecycle::Deleted { was_new: false };
                Ok(())
            }
        }
    }

    /// Removes the container from use.
    pub fn discard(&mut self) {
        self.lifecycle = Lifecycle::Discarded;
    }

    /// Takes over the values of a sub-transaction's copy of this object.
    pub(crate) fn absorb(&mut self, child: &Self) -> Result<()> {
        if child.is_deleted() {
            return self.mark_deleted();
        }
        self.values = child.values.clone();
        self.marked_changed |= child.marked_changed;
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::New | Lifecycle::Existing => Ok(()),
            Lifecycle::Deleted { .. } => Err(Error::invalid_operation(format!(
                "object {} is deleted",
                self.id
            ))),
            Lifecycle::Discarded => Err(Error::invalid_operation(format!(
                "object {} has been discarded",
                self.id
            ))),
        }
    }

    fn context(&self, property: &PropertyName) -> ErrorContext {
        ErrorContext::new()
            .with_object(self.id.clone())
            .with_property(property.clone())
    }
}

fn local_properties(class: &ClassDefinition) -> OrdSet<PropertyName> {
    class
        .properties
        .iter()
        .filter(|p| !p.is_persistent())
        .map(|p| p.name.clone())
        .collect()
}
