//! Transaction nodes and the loaders that feed them.

use std::fmt;

use tangle_data::{DataContainer, DataContext, DataManager, NoopListener, ObjectLoader};
use tangle_foundation::{ObjectId, RelationEndPointId, Result, TransactionId};
use tangle_mapping::{MappingConfiguration, RelationEndPointDefinition};

use crate::provider::PersistenceProvider;

// =============================================================================
// Transaction State
// =============================================================================

/// Lifecycle state of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Accepts edits.
    Active,
    /// Read-only while a sub-transaction is open.
    HasActiveChild,
    /// Ended by committing into its parent.
    Committed,
    /// Ended without keeping its changes.
    Discarded,
}

impl TransactionState {
    /// Returns true if the transaction has not ended.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::HasActiveChild)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::HasActiveChild => "has-active-child",
            Self::Committed => "committed",
            Self::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Transaction Node
// =============================================================================

/// One open transaction and the data it owns.
#[derive(Debug)]
pub struct TransactionNode {
    pub(crate) id: TransactionId,
    pub(crate) parent: Option<TransactionId>,
    pub(crate) state: TransactionState,
    pub(crate) data: DataManager,
}

impl TransactionNode {
    pub(crate) fn new(id: TransactionId, parent: Option<TransactionId>, data: DataManager) -> Self {
        Self {
            id,
            parent,
            state: TransactionState::Active,
            data,
        }
    }

    /// Returns the transaction handle.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the parent transaction, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<TransactionId> {
        self.parent
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the data manager.
    #[must_use]
    pub fn data(&self) -> &DataManager {
        &self.data
    }
}

// =============================================================================
// Loaders
// =============================================================================

/// Builds the loader of the node sitting directly above `ancestors`.
///
/// The root loads from the store; every sub-transaction loads from the
/// current state of its parent, which in turn loads from its own parent.
pub(crate) fn loader_for<'a>(
    ancestors: &'a mut [TransactionNode],
    provider: &'a mut dyn PersistenceProvider,
    mapping: &'a MappingConfiguration,
) -> Box<dyn ObjectLoader + 'a> {
    match ancestors.split_last_mut() {
        Some((parent, rest)) => Box::new(ParentLoader {
            parent: &mut parent.data,
            upstream: loader_for(rest, provider, mapping),
        }),
        None => Box::new(StoreLoader { provider, mapping }),
    }
}

/// Adapts a persistence provider.
struct StoreLoader<'a> {
    provider: &'a mut dyn PersistenceProvider,
    mapping: &'a MappingConfiguration,
}

impl ObjectLoader for StoreLoader<'_> {
    fn load_containers(&mut self, ids: &[ObjectId]) -> Result<Vec<DataContainer>> {
        self.provider.load_containers(self.mapping, ids)
    }

    fn load_related_ids(
        &mut self,
        end_point: &RelationEndPointId,
        opposite: &RelationEndPointDefinition,
    ) -> Result<Vec<ObjectId>> {
        self.provider.load_related_ids(end_point, opposite)
    }
}

/// Adapts the data manager of a parent transaction.
///
/// Loads performed in the parent on behalf of the child raise no
/// notifications. Objects deleted in the parent are reported missing.
struct ParentLoader<'a> {
    parent: &'a mut DataManager,
    upstream: Box<dyn ObjectLoader + 'a>,
}

impl ObjectLoader for ParentLoader<'_> {
    fn load_containers(&mut self, ids: &[ObjectId]) -> Result<Vec<DataContainer>> {
        let mut listener = NoopListener;
        let mut ctx = DataContext::new(&mut *self.upstream, &mut listener);
        self.parent.load_objects(ids, &mut ctx)?;

        let mut containers = Vec::with_capacity(ids.len());
        for id in ids {
            match self.parent.get_object_if_loaded(id) {
                Ok(Some(container)) if !container.is_deleted() => {
                    containers.push(container.for_sub_transaction());
                }
                Ok(_) => {}
                Err(err) if err.is_missing_object() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(containers)
    }

    /// Identities the parent holds are taken even when deleted or invalid
    /// there, matching what the parent itself would accept as new.
    fn is_taken(&mut self, id: &ObjectId) -> Result<bool> {
        if self.parent.is_invalid(id) || self.parent.get_object_if_loaded(id)?.is_some() {
            return Ok(true);
        }
        self.upstream.is_taken(id)
    }

    fn load_related_ids(
        &mut self,
        end_point: &RelationEndPointId,
        _opposite: &RelationEndPointDefinition,
    ) -> Result<Vec<ObjectId>> {
        let mut listener = NoopListener;
        let mut ctx = DataContext::new(&mut *self.upstream, &mut listener);
        Ok(self
            .parent
            .get_end_point_or_load(end_point, &mut ctx)?
            .related_objects())
    }
}
