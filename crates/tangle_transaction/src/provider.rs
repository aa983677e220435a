//! The persistence seam of a root transaction.

use tangle_data::{DataContainer, ObjectState};
use tangle_foundation::{ObjectId, PropertyName, RelationEndPointId, Result, Timestamp, Value};
use tangle_mapping::{MappingConfiguration, RelationEndPointDefinition};

/// The persistent image of one new or changed object.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistableData {
    /// The object.
    pub id: ObjectId,
    /// `New` or `Changed`.
    pub state: ObjectState,
    /// The timestamp the object was loaded with; `None` for new objects.
    pub timestamp: Option<Timestamp>,
    /// Current values of the persistent properties, foreign keys included.
    pub values: Vec<(PropertyName, Value)>,
}

impl PersistableData {
    /// Captures the persistent values of a container.
    #[must_use]
    pub fn from_container(container: &DataContainer) -> Self {
        Self {
            id: container.id().clone(),
            state: if container.is_new() {
                ObjectState::New
            } else {
                ObjectState::Changed
            },
            timestamp: container.timestamp(),
            values: container
                .persistent_values()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Returns the value of a property, if captured.
    #[must_use]
    pub fn value(&self, property: &PropertyName) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }
}

/// A store that root transactions load from and persist to.
pub trait PersistenceProvider {
    /// Loads the containers of the given objects.
    ///
    /// Objects that do not exist are left out of the result.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` for unmapped classes or a `Storage` error.
    fn load_containers(
        &mut self,
        mapping: &MappingConfiguration,
        ids: &[ObjectId],
    ) -> Result<Vec<DataContainer>>;

    /// Returns the objects whose stored foreign key `opposite` points at the
    /// owner of `end_point`.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the store fails.
    fn load_related_ids(
        &mut self,
        end_point: &RelationEndPointId,
        opposite: &RelationEndPointDefinition,
    ) -> Result<Vec<ObjectId>>;

    /// Writes new and changed objects and removes deleted ones, all or nothing.
    ///
    /// Returns the new timestamp of every written object.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` if a stored timestamp no longer matches,
    /// or a `Storage` error. Nothing is written on error.
    fn persist(
        &mut self,
        changed: &[PersistableData],
        deleted: &[(ObjectId, Timestamp)],
    ) -> Result<Vec<(ObjectId, Timestamp)>>;
}
