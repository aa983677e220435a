//! Change notifications.
//!
//! A [`TransactionListener`] observes loads, property and relation edits,
//! deletions, and transaction boundaries. The `changing` and `committing`
//! style methods run before any state is modified and can veto the operation
//! by returning an error. Every method has a no-op default.

use tangle_foundation::{ObjectId, PropertyName, Result, TransactionId, Value};

/// Observer of transaction events.
#[allow(unused_variables)]
pub trait TransactionListener {
    /// An object was loaded into a transaction.
    fn object_loaded(&mut self, tx: TransactionId, object: &ObjectId) {}

    /// A property value is about to change.
    ///
    /// # Errors
    ///
    /// Returning an error cancels the write.
    fn property_changing(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: &Value,
        new: &Value,
    ) -> Result<()> {
        Ok(())
    }

    /// A property value has changed.
    fn property_changed(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: &Value,
        new: &Value,
    ) {
    }

    /// A relation end point is about to change.
    ///
    /// # Errors
    ///
    /// Returning an error cancels the whole command closure.
    fn relation_changing(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> Result<()> {
        Ok(())
    }

    /// A relation end point has changed.
    fn relation_changed(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
    }

    /// An object is about to be marked as deleted.
    ///
    /// # Errors
    ///
    /// Returning an error cancels the deletion.
    fn object_deleting(&mut self, tx: TransactionId, object: &ObjectId) -> Result<()> {
        Ok(())
    }

    /// An object has been marked as deleted.
    fn object_deleted(&mut self, tx: TransactionId, object: &ObjectId) {}

    /// A transaction is about to commit the given objects.
    ///
    /// # Errors
    ///
    /// Returning an error cancels the commit.
    fn transaction_committing(&mut self, tx: TransactionId, objects: &[ObjectId]) -> Result<()> {
        Ok(())
    }

    /// A transaction has committed the given objects.
    fn transaction_committed(&mut self, tx: TransactionId, objects: &[ObjectId]) {}

    /// A transaction is about to roll back.
    ///
    /// # Errors
    ///
    /// Returning an error cancels the rollback.
    fn transaction_rolling_back(&mut self, tx: TransactionId) -> Result<()> {
        Ok(())
    }

    /// A transaction has rolled back.
    fn transaction_rolled_back(&mut self, tx: TransactionId) {}

    /// A sub-transaction was created below `parent`.
    fn sub_transaction_created(&mut self, parent: TransactionId, child: TransactionId) {}
}

/// A listener that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl TransactionListener for NoopListener {}

/// Forwards every event to a list of listeners, in registration order.
///
/// Vetoable events stop at the first listener that returns an error.
#[derive(Default)]
pub struct CompositeListener {
    listeners: Vec<Box<dyn TransactionListener>>,
}

impl CompositeListener {
    /// Creates an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn push(&mut self, listener: Box<dyn TransactionListener>) {
        self.listeners.push(listener);
    }

    /// Returns the number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for CompositeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeListener")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TransactionListener for CompositeListener {
    fn object_loaded(&mut self, tx: TransactionId, object: &ObjectId) {
        for l in &mut self.listeners {
            l.object_loaded(tx, object);
        }
    }

    fn property_changing(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: &Value,
        new: &Value,
    ) -> Result<()> {
        for l in &mut self.listeners {
            l.property_changing(tx, object, property, old, new)?;
        }
        Ok(())
    }

    fn property_changed(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: &Value,
        new: &Value,
    ) {
        for l in &mut self.listeners {
            l.property_changed(tx, object, property, old, new);
        }
    }

    fn relation_changing(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> Result<()> {
        for l in &mut self.listeners {
            l.relation_changing(tx, object, property, old, new)?;
        }
        Ok(())
    }

    fn relation_changed(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
        for l in &mut self.listeners {
            l.relation_changed(tx, object, property, old, new);
        }
    }

    fn object_deleting(&mut self, tx: TransactionId, object: &ObjectId) -> Result<()> {
        for l in &mut self.listeners {
            l.object_deleting(tx, object)?;
        }
        Ok(())
    }

    fn object_deleted(&mut self, tx: TransactionId, object: &ObjectId) {
        for l in &mut self.listeners {
            l.object_deleted(tx, object);
        }
    }

    fn transaction_committing(&mut self, tx: TransactionId, objects: &[ObjectId]) -> Result<()> {
        for l in &mut self.listeners {
            l.transaction_committing(tx, objects)?;
        }
        Ok(())
    }

    fn transaction_committed(&mut self, tx: TransactionId, objects: &[ObjectId]) {
        for l in &mut self.listeners {
            l.transaction_committed(tx, objects);
        }
    }

    fn transaction_rolling_back(&mut self, tx: TransactionId) -> Result<()> {
        for l in &mut self.listeners {
            l.transaction_rolling_back(tx)?;
        }
        Ok(())
    }

    fn transaction_rolled_back(&mut self, tx: TransactionId) {
        for l in &mut self.listeners {
            l.transaction_rolled_back(tx);
        }
    }

    fn sub_transaction_created(&mut self, parent: TransactionId, child: TransactionId) {
        for l in &mut self.listeners {
            l.sub_transaction_created(parent, child);
        }
    }
}
