//! Derived scalar end points.

use tangle_foundation::{ObjectId, RelationEndPointId};
use tangle_mapping::RelationEndPointDefinition;

use super::LoadState;

/// The derived scalar side of a one-to-one relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualObjectEndPoint {
    pub(crate) id: RelationEndPointId,
    pub(crate) definition: RelationEndPointDefinition,
    pub(crate) opposite: RelationEndPointDefinition,
    pub(crate) current: Option<ObjectId>,
    pub(crate) original: Option<ObjectId>,
    pub(crate) load_state: LoadState,
    pub(crate) touched: bool,
}

impl VirtualObjectEndPoint {
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
            current: None,
            original: None,
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

    /// Returns the related object.
    #[must_use]
    pub fn related(&self) -> Option<&ObjectId> {
        self.current.as_ref()
    }

    /// Returns the related object as of the last load or commit.
    #[must_use]
    pub fn original_related(&self) -> Option<&ObjectId> {
        self.original.as_ref()
    }

    pub(crate) fn set(&mut self, related: Option<ObjectId>) {
        self.current = related;
        self.touched = true;
    }
}
