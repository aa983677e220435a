//! The loading seam between a data manager and whatever backs it.

use tangle_foundation::{ObjectId, RelationEndPointId, Result};
use tangle_mapping::RelationEndPointDefinition;

use crate::container::DataContainer;

/// Supplies containers and relation contents to a [`DataManager`].
///
/// A root transaction adapts a persistence provider; a sub-transaction adapts
/// the data manager of its parent.
///
/// [`DataManager`]: crate::DataManager
pub trait ObjectLoader {
    /// Loads the containers of the given objects.
    ///
    /// Objects that do not exist are left out of the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails.
    fn load_containers(&mut self, ids: &[ObjectId]) -> Result<Vec<DataContainer>>;

    /// Returns true if `id` is already taken in the backing source, so a new
    /// object must not reuse it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails.
    fn is_taken(&mut self, id: &ObjectId) -> Result<bool> {
        Ok(!self.load_containers(std::slice::from_ref(id))?.is_empty())
    }

    /// Returns the objects whose real end point `opposite` refers to the
    /// owner of `end_point`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing source fails.
    fn load_related_ids(
        &mut self,
        end_point: &RelationEndPointId,
        opposite: &RelationEndPointDefinition,
    ) -> Result<Vec<ObjectId>>;
}
