//! Foreign-key holding end points.

use tangle_foundation::{ObjectId, RelationEndPointId};
use tangle_mapping::RelationEndPointDefinition;

/// The scalar side of a relation that stores the foreign key.
///
/// The related identity is mirrored from the owning container's relation
/// property; the data manager writes both in the same step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealEndPoint {
    pub(crate) id: RelationEndPointId,
    pub(crate) definition: RelationEndPointDefinition,
    pub(crate) opposite: RelationEndPointDefinition,
    pub(crate) current: Option<ObjectId>,
    pub(crate) original: Option<ObjectId>,
    pub(crate) touched: bool,
}

impl RealEndPoint {
    /// Creates a real end point from the owning container's values.
    #[must_use]
    pub fn new(
        id: RelationEndPointId,
        definition: RelationEndPointDefinition,
        opposite: RelationEndPointDefinition,
        current: Option<ObjectId>,
        original: Option<ObjectId>,
    ) -> Self {
        Self {
            id,
            definition,
            opposite,
            current,
            original,
            touched: false,
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
