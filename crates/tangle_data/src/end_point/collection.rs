//! Derived collection end points.

use tangle_foundation::RelationEndPointId;
use tangle_mapping::RelationEndPointDefinition;

use super::LoadState;
use crate::collection::DomainObjectCollection;

/// The derived many side of a one-to-many relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionEndPoint {
    pub(crate) id: RelationEndPointId,
    pub(crate) definition: RelationEndPointDefinition,
    pub(crate) opposite: RelationEndPointDefinition,
    pub(crate) collection: DomainObjectCollection,
    pub(crate) load_state: LoadState,
    pub(crate) touched: bool,
}

impl CollectionEndPoint {
    /// Creates an end point whose contents still have to be loaded.
    #[must_use]
    pub fn unloaded(
        id: RelationEndPointId,
        definition: RelationEndPointDefinition,
        opposite: RelationEndPointDefinition,
    ) -> Self {
        Self {
            id,
            definition,
            opposite,
            collection: DomainObjectCollection::new(),
            load_state: LoadState::NotLoadedYet,
            touched: false,
        }
    }

    /// Creates the empty, complete end point of a new object.
    #[must_use]
    pub fn empty(
        id: RelationEndPointId,
        definition: RelationEndPointDefinition,
        opposite: RelationEndPointDefinition,
    ) -> Self {
        Self {
            load_state: LoadState::Complete,
            ..Self::unloaded(id, definition, opposite)
        }
    }

    /// Returns the collection contents.
    #[must_use]
    pub fn collection(&self) -> &DomainObjectCollection {
        &self.collection
    }

    pub(crate) fn collection_mut(&mut self) -> &mut DomainObjectCollection {
        self.touched = true;
        &mut self.collection
    }
}
