//! Guards that select a current transaction.
//!
//! Both guards borrow the hierarchy mutably and dereference to it, so every
//! hierarchy operation stays available while a scope is entered. Dropping a
//! guard restores the previously current transaction.

use std::ops::{Deref, DerefMut};

use tangle_foundation::{Result, TransactionId};
use tracing::{debug, warn};

use crate::hierarchy::TransactionHierarchy;
use crate::provider::PersistenceProvider;
use crate::store::MemoryStore;

// =============================================================================
// Transaction Scope
// =============================================================================

/// Makes an existing transaction current until dropped.
#[derive(Debug)]
pub struct TransactionScope<'h, P: PersistenceProvider = MemoryStore> {
    hierarchy: &'h mut TransactionHierarchy<P>,
    tx: TransactionId,
    previous: Option<TransactionId>,
}

impl<'h, P: PersistenceProvider> TransactionScope<'h, P> {
    pub(crate) fn new(hierarchy: &'h mut TransactionHierarchy<P>, tx: TransactionId) -> Self {
        let previous = hierarchy.current.replace(tx);
        Self {
            hierarchy,
            tx,
            previous,
        }
    }

    /// Returns the transaction this scope selected.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.tx
    }
}

impl<P: PersistenceProvider> Deref for TransactionScope<'_, P> {
    type Target = TransactionHierarchy<P>;

    fn deref(&self) -> &Self::Target {
        self.hierarchy
    }
}

impl<P: PersistenceProvider> DerefMut for TransactionScope<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.hierarchy
    }
}

impl<P: PersistenceProvider> Drop for TransactionScope<'_, P> {
    fn drop(&mut self) {
        self.hierarchy.current = self.previous;
    }
}

// =============================================================================
// Sub-Transaction Scope
// =============================================================================

/// Owns a freshly created sub-transaction and makes it current.
///
/// Unless [`commit`](Self::commit) or [`discard`](Self::discard) ended it
/// first, the sub-transaction (and anything still open below it) is
/// discarded on drop.
#[derive(Debug)]
pub struct SubTransactionScope<'h, P: PersistenceProvider = MemoryStore> {
    hierarchy: &'h mut TransactionHierarchy<P>,
    tx: TransactionId,
    previous: Option<TransactionId>,
}

impl<'h, P: PersistenceProvider> SubTransactionScope<'h, P> {
    pub(crate) fn new(hierarchy: &'h mut TransactionHierarchy<P>, tx: TransactionId) -> Self {
        let previous = hierarchy.current.replace(tx);
        Self {
            hierarchy,
            tx,
            previous,
        }
    }

    /// Returns the sub-transaction.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.tx
    }

    /// Commits the sub-transaction into its parent and leaves the scope.
    ///
    /// # Errors
    ///
    /// See [`TransactionHierarchy::commit`]. The sub-transaction is
    /// discarded when the commit fails.
    pub fn commit(self) -> Result<()> {
        let tx = self.tx;
        self.hierarchy.commit(tx)
    }

    /// Discards the sub-transaction and leaves the scope.
    ///
    /// # Errors
    ///
    /// See [`TransactionHierarchy::discard_through`].
    pub fn discard(self) -> Result<()> {
        let tx = self.tx;
        self.hierarchy.discard_through(tx)
    }
}

impl<P: PersistenceProvider> Deref for SubTransactionScope<'_, P> {
    type Target = TransactionHierarchy<P>;

    fn deref(&self) -> &Self::Target {
        self.hierarchy
    }
}

impl<P: PersistenceProvider> DerefMut for SubTransactionScope<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.hierarchy
    }
}

impl<P: PersistenceProvider> Drop for SubTransactionScope<'_, P> {
    fn drop(&mut self) {
        let tx = self.tx;
        if self.hierarchy.state(tx).is_some_and(|s| s.is_open()) {
            debug!(%tx, "discarding sub-transaction left open by its scope");
            if let Err(err) = self.hierarchy.discard_through(tx) {
                warn!(%tx, error = %err, "failed to discard sub-transaction");
            }
        }
        self.hierarchy.current = self.previous;
    }
}
