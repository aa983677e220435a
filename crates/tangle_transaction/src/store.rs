//! An in-memory persistence provider.

use im::OrdMap;
use tangle_data::DataContainer;
use tangle_foundation::{
    Error, ObjectId, PropertyName, RelationEndPointId, Result, Timestamp, Value,
};
use tangle_mapping::{MappingConfiguration, RelationEndPointDefinition};
use tracing::debug;

use crate::provider::{PersistableData, PersistenceProvider};

/// One stored object.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    /// Concurrency token, advanced on every write.
    pub timestamp: Timestamp,
    /// Persistent values, foreign keys included.
    pub values: OrdMap<PropertyName, Value>,
}

/// A persistence provider backed by a persistent map.
///
/// Writes are checked against stored timestamps and applied to a snapshot
/// that replaces the live map only when every check passed.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: OrdMap<ObjectId, StoredObject>,
    clock: Timestamp,
    persist_calls: usize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to seed an object.
    #[must_use]
    pub fn with_object<P: Into<PropertyName>>(
        mut self,
        id: ObjectId,
        values: impl IntoIterator<Item = (P, Value)>,
    ) -> Self {
        self.insert(id, values);
        self
    }

    /// Seeds or overwrites an object, returning its new timestamp.
    pub fn insert<P: Into<PropertyName>>(
        &mut self,
        id: ObjectId,
        values: impl IntoIterator<Item = (P, Value)>,
    ) -> Timestamp {
        let timestamp = self.tick();
        let values = values.into_iter().map(|(p, v)| (p.into(), v)).collect();
        self.records.insert(id, StoredObject { timestamp, values });
        timestamp
    }

    /// Gets a stored object.
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&StoredObject> {
        self.records.get(id)
    }

    /// Gets a stored value.
    #[must_use]
    pub fn value(&self, id: &ObjectId, property: impl Into<PropertyName>) -> Option<&Value> {
        let property: PropertyName = property.into();
        self.records.get(id)?.values.get(&property)
    }

    /// Returns true if the object is stored.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.records.contains_key(id)
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns how many times [`persist`](PersistenceProvider::persist) was called.
    #[must_use]
    pub fn persist_calls(&self) -> usize {
        self.persist_calls
    }

    /// Advances an object's timestamp as if another writer had saved it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object is not stored.
    pub fn touch_externally(&mut self, id: &ObjectId) -> Result<Timestamp> {
        let timestamp = self.tick();
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| Error::not_found(id.clone()))?;
        record.timestamp = timestamp;
        Ok(timestamp)
    }

    fn tick(&mut self) -> Timestamp {
        self.clock = self.clock.next();
        self.clock
    }
}

fn check_timestamp(
    records: &OrdMap<ObjectId, StoredObject>,
    id: &ObjectId,
    expected: Option<Timestamp>,
) -> Result<()> {
    let stored = records.get(id).map(|r| r.timestamp);
    if stored == expected {
        Ok(())
    } else {
        Err(Error::concurrency_conflict(id.clone()))
    }
}

impl PersistenceProvider for MemoryStore {
    fn load_containers(
        &mut self,
        mapping: &MappingConfiguration,
        ids: &[ObjectId],
    ) -> Result<Vec<DataContainer>> {
        let mut containers = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            let class = mapping.require_class(&id.class)?;
            containers.push(DataContainer::from_loaded(
                class,
                id.clone(),
                record.timestamp,
                record.values.clone(),
            ));
        }
        Ok(containers)
    }

    fn load_related_ids(
        &mut self,
        end_point: &RelationEndPointId,
        opposite: &RelationEndPointDefinition,
    ) -> Result<Vec<ObjectId>> {
        let Some(property) = &opposite.property else {
            return Ok(Vec::new());
        };
        let owner = Value::ObjectRef(end_point.object.clone());
        Ok(self
            .records
            .iter()
            .filter(|(id, record)| {
                id.class == opposite.class && record.values.get(property) == Some(&owner)
            })
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn persist(
        &mut self,
        changed: &[PersistableData],
        deleted: &[(ObjectId, Timestamp)],
    ) -> Result<Vec<(ObjectId, Timestamp)>> {
        self.persist_calls += 1;
        let mut records = self.records.clone();
        let mut clock = self.clock;
        let mut stamps = Vec::with_capacity(changed.len());

        for data in changed {
            check_timestamp(&records, &data.id, data.timestamp)?;
            clock = clock.next();
            let values = data.values.iter().cloned().collect();
            records.insert(
                data.id.clone(),
                StoredObject {
                    timestamp: clock,
                    values,
                },
            );
            stamps.push((data.id.clone(), clock));
        }
        for (id, timestamp) in deleted {
            check_timestamp(&records, id, Some(*timestamp))?;
            records.remove(id);
        }

        debug!(
            written = changed.len(),
            deleted = deleted.len(),
            "memory store persisted"
        );
        self.records = records;
        self.clock = clock;
        Ok(stamps)
    }
}
