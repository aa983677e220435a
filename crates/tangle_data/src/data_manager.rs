//! The per-transaction registry of containers and end points.
//!
//! Objects refer to each other only through identities; the data manager
//! owns every container and end point of one transaction and resolves those
//! identities, loading lazily through an [`ObjectLoader`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tangle_foundation::{
    Error, ErrorContext, ObjectId, PropertyName, RelationEndPointId, Result, Timestamp,
    TransactionId, Value,
};
use tangle_mapping::MappingConfiguration;
use tracing::{debug, trace};

use crate::command::{CompositeCommand, RelationCommand, expand_delete};
use crate::container::{DataContainer, ObjectState};
use crate::end_point::{RealEndPoint, RelationEndPoint};
use crate::listener::TransactionListener;
use crate::loader::ObjectLoader;

// =============================================================================
// Data Context
// =============================================================================

/// The collaborators a data manager calls out to while working.
pub struct DataContext<'a> {
    /// Source of containers and relation contents.
    pub loader: &'a mut dyn ObjectLoader,
    /// Receiver of change notifications.
    pub listener: &'a mut dyn TransactionListener,
}

impl<'a> DataContext<'a> {
    /// Bundles a loader and a listener.
    pub fn new(
        loader: &'a mut dyn ObjectLoader,
        listener: &'a mut dyn TransactionListener,
    ) -> Self {
        Self { loader, listener }
    }
}

// =============================================================================
// Data Manager
// =============================================================================

/// Containers and end points of one transaction.
#[derive(Clone, Debug)]
pub struct DataManager {
    transaction: TransactionId,
    mapping: Arc<MappingConfiguration>,
    containers: BTreeMap<ObjectId, DataContainer>,
    end_points: BTreeMap<RelationEndPointId, RelationEndPoint>,
    /// Identities known not to exist in this transaction.
    invalid: BTreeSet<ObjectId>,
}

impl DataManager {
    /// Creates an empty data manager.
    #[must_use]
    pub fn new(transaction: TransactionId, mapping: Arc<MappingConfiguration>) -> Self {
        Self {
            transaction,
            mapping,
            containers: BTreeMap::new(),
            end_points: BTreeMap::new(),
            invalid: BTreeSet::new(),
        }
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn transaction(&self) -> TransactionId {
        self.transaction
    }

    /// Returns the mapping.
    #[must_use]
    pub fn mapping(&self) -> &MappingConfiguration {
        &self.mapping
    }

    /// Returns true if `id` is known not to exist in this transaction.
    #[must_use]
    pub fn is_invalid(&self, id: &ObjectId) -> bool {
        self.invalid.contains(id)
    }

    /// Iterates over the registered containers.
    pub fn containers(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers.values()
    }

    /// Iterates over the registered end points.
    pub fn end_points(&self) -> impl Iterator<Item = (&RelationEndPointId, &RelationEndPoint)> {
        self.end_points.iter()
    }

    // -------------------------------------------------------------------------
    // Objects
    // -------------------------------------------------------------------------

    /// Returns a container if it is registered.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInvalid` if the identity is invalid.
    pub fn get_object_if_loaded(&self, id: &ObjectId) -> Result<Option<&DataContainer>> {
        self.check_valid(id)?;
        Ok(self.containers.get(id))
    }

    /// Returns a container, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` the first time a missing object is requested and
    /// `AlreadyInvalid` afterwards. Loader errors are propagated.
    pub fn get_object_or_load(
        &mut self,
        id: &ObjectId,
        ctx: &mut DataContext<'_>,
    ) -> Result<&DataContainer> {
        self.check_valid(id)?;
        if !self.containers.contains_key(id) {
            self.load_objects(std::slice::from_ref(id), ctx)?;
        }
        self.containers
            .get(id)
            .ok_or_else(|| Error::not_found(id.clone()).in_transaction(self.transaction))
    }

    /// Loads every object in `ids` that is not registered yet.
    ///
    /// Objects the loader does not return are marked invalid.
    ///
    /// # Errors
    ///
    /// Propagates loader errors.
    pub fn load_objects(&mut self, ids: &[ObjectId], ctx: &mut DataContext<'_>) -> Result<()> {
        let mut missing: Vec<ObjectId> = Vec::new();
        for id in ids {
            if !self.containers.contains_key(id) && !self.invalid.contains(id) && !missing.contains(id) {
                missing.push(id.clone());
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        debug!(tx = %self.transaction, count = missing.len(), "loading objects");
        let loaded = ctx.loader.load_containers(&missing)?;
        for container in loaded {
            let id = container.id().clone();
            if !missing.contains(&id) || self.containers.contains_key(&id) {
                continue;
            }
            self.containers.insert(id.clone(), container);
            ctx.listener.object_loaded(self.transaction, &id);
        }
        for id in missing {
            if !self.containers.contains_key(&id) {
                trace!(tx = %self.transaction, object = %id, "object not found");
                self.invalid.insert(id);
            }
        }
        Ok(())
    }

    /// Registers the container of a new object together with its end points.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` for an unmapped class and `InvalidOperation`
    /// if the identity is already in use.
    pub fn register_new(&mut self, container: DataContainer) -> Result<()> {
        let id = container.id().clone();
        self.check_unregistered(&id)?;
        self.mapping.require_class(&id.class)?;

        let definitions: Vec<_> = self
            .mapping
            .end_points_of(&id.class)
            .filter_map(|d| {
                let opposite = self
                    .mapping
                    .opposite_end_point(&d.class, d.property.as_ref()?)?
                    .clone();
                Some((d.clone(), opposite))
            })
            .collect();
        for (definition, opposite) in definitions {
            let Some(property) = definition.property.clone() else {
                continue;
            };
            let end_point_id = RelationEndPointId::new(id.clone(), property);
            let end_point = if definition.is_virtual {
                RelationEndPoint::empty(end_point_id.clone(), definition, opposite)
            } else {
                let related = related_value(container.value(&end_point_id.property));
                RelationEndPoint::Real(RealEndPoint::new(
                    end_point_id.clone(),
                    definition,
                    opposite,
                    related.clone(),
                    related,
                ))
            };
            self.end_points.insert(end_point_id, end_point);
        }

        trace!(tx = %self.transaction, object = %id, "registered new object");
        self.containers.insert(id, container);
        Ok(())
    }

    /// Registers a new object unless its identity is already taken here or
    /// upstream.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if this data manager or its loader already
    /// knows the identity, `UnknownClass` for an unmapped class, and
    /// propagates loader errors.
    pub fn create_object(
        &mut self,
        container: DataContainer,
        ctx: &mut DataContext<'_>,
    ) -> Result<()> {
        let id = container.id().clone();
        self.check_unregistered(&id)?;
        if ctx.loader.is_taken(&id)? {
            return Err(Error::invalid_operation(format!("object {id} already exists"))
                .in_transaction(self.transaction));
        }
        self.register_new(container)
    }

    /// Registers a container obtained outside the loader.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the identity is already in use.
    pub fn register_loaded(&mut self, container: DataContainer) -> Result<()> {
        let id = container.id().clone();
        self.check_unregistered(&id)?;
        self.containers.insert(id, container);
        Ok(())
    }

    /// Returns the state of an object, folding in changes of its end points.
    ///
    /// Returns `None` if the object is not registered.
    #[must_use]
    pub fn object_state(&self, id: &ObjectId) -> Option<ObjectState> {
        if self.invalid.contains(id) {
            return Some(ObjectState::Invalid);
        }
        let state = self.containers.get(id)?.state();
        if state == ObjectState::Unchanged
            && self.end_points_of_object(id).any(|(_, e)| e.has_changed())
        {
            return Some(ObjectState::Changed);
        }
        Some(state)
    }

    /// Returns the current value of a property.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` for an unmapped property and propagates
    /// loading errors.
    pub fn get_value(
        &mut self,
        id: &ObjectId,
        property: &PropertyName,
        ctx: &mut DataContext<'_>,
    ) -> Result<Value> {
        self.mapping.require_property(&id.class, property)?;
        let container = self.get_object_or_load(id, ctx)?;
        Ok(container.value(property).cloned().unwrap_or(Value::Nil))
    }

    /// Sets a property value, raising `property_changing` and `property_changed`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty`, `TypeMismatch`, `ProtocolViolation` for
    /// relation properties, `InvalidOperation` for deleted objects, or the
    /// listener's veto.
    pub fn set_value(
        &mut self,
        id: &ObjectId,
        property: &PropertyName,
        value: Value,
        ctx: &mut DataContext<'_>,
    ) -> Result<()> {
        let definition = self.mapping.require_property(&id.class, property)?.clone();
        let container = self.get_object_or_load(id, ctx)?;
        container.check_value(&definition, &value)?;
        let old = container.value(property).cloned().unwrap_or(Value::Nil);

        ctx.listener
            .property_changing(self.transaction, id, property, &old, &value)?;
        self.container_mut(id)?.set_value(&definition, value.clone())?;
        ctx.listener
            .property_changed(self.transaction, id, property, &old, &value);
        Ok(())
    }

    /// Marks an object as changed without changing a value.
    ///
    /// # Errors
    ///
    /// Propagates loading errors and fails for deleted objects.
    pub fn mark_as_changed(&mut self, id: &ObjectId, ctx: &mut DataContext<'_>) -> Result<()> {
        self.get_object_or_load(id, ctx)?;
        self.container_mut(id)?.mark_as_changed()
    }

    /// Stores the timestamp assigned by a store after persisting.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the object is not registered.
    pub fn set_timestamp(&mut self, id: &ObjectId, timestamp: Timestamp) -> Result<()> {
        self.container_mut(id)?.set_timestamp(timestamp);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // End Points
    // -------------------------------------------------------------------------

    /// Returns an end point if it is registered.
    #[must_use]
    pub fn get_end_point_if_loaded(&self, id: &RelationEndPointId) -> Option<&RelationEndPoint> {
        self.end_points.get(id)
    }

    /// Returns an end point, loading its owner and contents if necessary.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` if the property is not a relation property,
    /// `ReentrantLoad` if the end point is already loading, and propagates
    /// loading errors. A failed load leaves the end point `NotLoadedYet`.
    pub fn get_end_point_or_load(
        &mut self,
        id: &RelationEndPointId,
        ctx: &mut DataContext<'_>,
    ) -> Result<&RelationEndPoint> {
        if !self.end_points.get(id).is_some_and(RelationEndPoint::is_complete) {
            self.load_end_point(id, ctx)?;
        }
        self.end_points.get(id).ok_or_else(|| {
            Error::internal("end point vanished after loading")
                .with_context(ErrorContext::new().with_end_point(id))
        })
    }

    fn load_end_point(&mut self, id: &RelationEndPointId, ctx: &mut DataContext<'_>) -> Result<()> {
        let definition = self
            .mapping
            .require_end_point(&id.object.class, &id.property)?
            .clone();
        let opposite = self
            .mapping
            .opposite_end_point(&id.object.class, &id.property)
            .cloned()
            .ok_or_else(|| Error::internal(format!("relation of {id} has no opposite side")))?;
        let container = self.get_object_or_load(&id.object, ctx)?;

        if !definition.is_virtual {
            let end_point = RelationEndPoint::Real(RealEndPoint::new(
                id.clone(),
                definition,
                opposite,
                related_value(container.value(&id.property)),
                related_value(container.original_value(&id.property)),
            ));
            self.end_points.insert(id.clone(), end_point);
            return Ok(());
        }

        self.end_points
            .entry(id.clone())
            .or_insert_with(|| RelationEndPoint::unloaded(id.clone(), definition, opposite.clone()))
            .begin_load()?;

        trace!(tx = %self.transaction, end_point = %id, "loading end point");
        match self.fetch_related(id, &opposite, ctx) {
            Ok(related) => self.end_point_mut(id)?.complete_load(related),
            Err(err) => {
                if let Some(end_point) = self.end_points.get_mut(id) {
                    end_point.reset_load();
                }
                Err(err)
            }
        }
    }

    /// Asks the loader for the objects referring to the owner of `id` and
    /// keeps those whose registered foreign key still points at it.
    fn fetch_related(
        &mut self,
        id: &RelationEndPointId,
        opposite: &tangle_mapping::RelationEndPointDefinition,
        ctx: &mut DataContext<'_>,
    ) -> Result<Vec<ObjectId>> {
        let related = ctx.loader.load_related_ids(id, opposite)?;
        self.load_objects(&related, ctx)?;

        let Some(property) = &opposite.property else {
            return Ok(Vec::new());
        };
        let owner = Value::ObjectRef(id.object.clone());
        Ok(related
            .into_iter()
            .filter(|r| {
                self.containers
                    .get(r)
                    .is_some_and(|c| !c.is_deleted() && c.value(property) == Some(&owner))
            })
            .collect())
    }

    fn end_points_of_object<'a>(
        &'a self,
        id: &'a ObjectId,
    ) -> impl Iterator<Item = (&'a RelationEndPointId, &'a RelationEndPoint)> + 'a {
        self.end_points
            .range(RelationEndPointId::new(id.clone(), "")..)
            .take_while(move |(k, _)| &k.object == id)
    }

    /// Iterates over end points whose contents differ from their originals.
    pub fn changed_end_points(&self) -> impl Iterator<Item = &RelationEndPoint> {
        self.end_points.values().filter(|e| e.has_changed())
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Expands a command and executes the closure.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the command's object is deleted, and
    /// propagates expansion and execution errors.
    pub fn execute(&mut self, command: RelationCommand, ctx: &mut DataContext<'_>) -> Result<()> {
        if self.get_object_or_load(command.object(), ctx)?.is_deleted() {
            return Err(Error::invalid_operation(format!(
                "object {} is deleted",
                command.object()
            ))
            .in_transaction(self.transaction));
        }
        let closure = command.expand_to_all_related_objects(self, ctx)?;
        closure.execute(self, &mut *ctx.listener)
    }

    /// Builds the deletion closure of an object without executing it.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the object is already deleted, and
    /// propagates loading errors.
    pub fn delete_command(
        &mut self,
        id: &ObjectId,
        ctx: &mut DataContext<'_>,
    ) -> Result<CompositeCommand> {
        if self.get_object_or_load(id, ctx)?.is_deleted() {
            return Err(Error::protocol_violation(format!("object {id} is already deleted"))
                .in_transaction(self.transaction));
        }
        expand_delete(id, self, ctx)
    }

    /// Deletes an object: clears all of its relations, then marks it deleted.
    ///
    /// # Errors
    ///
    /// See [`delete_command`](Self::delete_command); listener vetoes are
    /// propagated as well.
    pub fn mark_deleted(&mut self, id: &ObjectId, ctx: &mut DataContext<'_>) -> Result<()> {
        let closure = self.delete_command(id, ctx)?;
        closure.execute(self, &mut *ctx.listener)
    }

    pub(crate) fn end_point_mut(&mut self, id: &RelationEndPointId) -> Result<&mut RelationEndPoint> {
        self.end_points.get_mut(id).ok_or_else(|| {
            Error::internal("end point is not registered")
                .with_context(ErrorContext::new().with_end_point(id))
        })
    }

    pub(crate) fn container_mut(&mut self, id: &ObjectId) -> Result<&mut DataContainer> {
        self.containers.get_mut(id).ok_or_else(|| {
            Error::internal("object is not registered")
                .with_context(ErrorContext::new().with_object(id.clone()))
        })
    }

    /// Writes a scalar end point; real end points update their container too.
    pub(crate) fn write_related(
        &mut self,
        id: &RelationEndPointId,
        related: Option<ObjectId>,
    ) -> Result<()> {
        match self.end_points.get_mut(id) {
            Some(RelationEndPoint::Real(end_point)) => {
                let container = self.containers.get_mut(&id.object).ok_or_else(|| {
                    Error::internal("object is not registered")
                        .with_context(ErrorContext::new().with_end_point(id))
                })?;
                container.set_relation_value(&id.property, related.clone())?;
                end_point.set(related);
                Ok(())
            }
            Some(RelationEndPoint::VirtualObject(end_point)) => {
                end_point.set(related);
                Ok(())
            }
            _ => Err(Error::internal("set command aimed at a non-scalar end point")
                .with_context(ErrorContext::new().with_end_point(id))),
        }
    }

    // -------------------------------------------------------------------------
    // Commit and Rollback
    // -------------------------------------------------------------------------

    /// Iterates over new and changed containers that are not deleted.
    pub fn changed_containers(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers
            .values()
            .filter(|c| matches!(c.state(), ObjectState::New | ObjectState::Changed))
    }

    /// Iterates over containers marked for deletion.
    pub fn deleted_objects(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers.values().filter(|c| c.is_deleted())
    }

    /// Returns every object that is new, changed, or deleted.
    #[must_use]
    pub fn changed_objects(&self) -> Vec<ObjectId> {
        self.containers
            .keys()
            .filter(|id| {
                matches!(
                    self.object_state(id),
                    Some(ObjectState::New | ObjectState::Changed | ObjectState::Deleted)
                )
            })
            .cloned()
            .collect()
    }

    /// Marks the owners of changed one-to-one virtual end points as changed,
    /// so the store checks their timestamps.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if an owner is not registered.
    pub fn mark_virtual_object_owners_changed(&mut self) -> Result<()> {
        let owners: Vec<ObjectId> = self
            .end_points
            .iter()
            .filter(|(_, e)| matches!(e, RelationEndPoint::VirtualObject(_)) && e.has_changed())
            .map(|(id, _)| id.object.clone())
            .collect();
        for owner in owners {
            let container = self.container_mut(&owner)?;
            if container.state() == ObjectState::Unchanged {
                container.mark_as_changed()?;
            }
        }
        Ok(())
    }

    /// Accepts all changes.
    ///
    /// Deleted objects are dropped and their identities become invalid; all
    /// other containers and every end point take their current contents as
    /// original.
    pub fn commit(&mut self) {
        let deleted: Vec<ObjectId> = self.deleted_objects().map(|c| c.id().clone()).collect();
        for container in self.containers.values_mut() {
            container.commit_state();
        }
        for end_point in self.end_points.values_mut() {
            end_point.commit();
        }
        for id in &deleted {
            self.forget(id);
        }
        debug!(tx = %self.transaction, deleted = deleted.len(), "committed data manager");
    }

    /// Discards all changes.
    ///
    /// New objects are dropped and their identities become invalid; all other
    /// containers and every end point return to their originals.
    pub fn rollback(&mut self) {
        for container in self.containers.values_mut() {
            container.rollback_state();
        }
        let discarded: Vec<ObjectId> = self
            .containers
            .values()
            .filter(|c| c.is_discarded())
            .map(|c| c.id().clone())
            .collect();
        for id in &discarded {
            self.forget(id);
        }
        for end_point in self.end_points.values_mut() {
            end_point.rollback();
        }
        debug!(tx = %self.transaction, discarded = discarded.len(), "rolled back data manager");
    }

    /// Drops every container and end point; all known identities become invalid.
    pub fn discard(&mut self) {
        let ids: Vec<ObjectId> = self.containers.keys().cloned().collect();
        for container in self.containers.values_mut() {
            container.discard();
        }
        self.invalid.extend(ids);
        self.containers.clear();
        self.end_points.clear();
        debug!(tx = %self.transaction, "discarded data manager");
    }

    /// Takes over the changes of a committed sub-transaction.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the child changed an object this data manager
    /// never handed out.
    pub fn merge_from(&mut self, child: &DataManager) -> Result<()> {
        for (id, container) in &child.containers {
            if container.is_deleted_new() {
                continue;
            }
            if let Some(parent) = self.containers.get_mut(id) {
                if container.has_changes() || container.is_deleted() {
                    parent.absorb(container)?;
                }
            } else if container.is_new() {
                self.containers.insert(id.clone(), container.clone());
            } else if container.has_changes() || container.is_deleted() {
                return Err(Error::internal(format!(
                    "{id} changed in a sub-transaction but is unknown to its parent"
                )));
            }
        }

        for (id, end_point) in &child.end_points {
            let Some(owner) = child.containers.get(&id.object) else {
                continue;
            };
            if owner.is_deleted_new() {
                continue;
            }
            if let Some(parent) = self.end_points.get_mut(id) {
                parent.absorb(end_point);
            } else if owner.is_new() {
                self.end_points.insert(id.clone(), end_point.clone());
            }
        }

        debug!(
            tx = %self.transaction,
            child = %child.transaction,
            objects = child.containers.len(),
            "merged sub-transaction"
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Consistency
    // -------------------------------------------------------------------------

    /// Verifies that every loaded relation is symmetric.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` naming the first end point whose opposite
    /// does not refer back.
    pub fn check_consistency(&self) -> Result<()> {
        for (id, end_point) in &self.end_points {
            if !end_point.is_complete() {
                continue;
            }
            let Some(opposite_property) = &end_point.opposite_definition().property else {
                continue;
            };
            for related in end_point.related_objects() {
                let opposite_id = RelationEndPointId::new(related.clone(), opposite_property.clone());
                let refers_back = match self.end_points.get(&opposite_id) {
                    Some(opposite) if opposite.is_complete() => opposite.refers_to(&id.object),
                    Some(_) => true,
                    None if end_point.definition().is_virtual => self
                        .containers
                        .get(&related)
                        .is_none_or(|c| {
                            c.value(opposite_property) == Some(&Value::ObjectRef(id.object.clone()))
                        }),
                    None => true,
                };
                if !refers_back {
                    return Err(Error::protocol_violation(format!(
                        "{id} refers to {related} but {opposite_id} does not refer back"
                    ))
                    .with_context(ErrorContext::new().with_end_point(id))
                    .in_transaction(self.transaction));
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn check_valid(&self, id: &ObjectId) -> Result<()> {
        if self.invalid.contains(id) {
            return Err(Error::already_invalid(id.clone()).in_transaction(self.transaction));
        }
        Ok(())
    }

    fn check_unregistered(&self, id: &ObjectId) -> Result<()> {
        if self.containers.contains_key(id) || self.invalid.contains(id) {
            return Err(Error::invalid_operation(format!("object {id} is already registered"))
                .in_transaction(self.transaction));
        }
        Ok(())
    }

    /// Removes an object and its end points and marks the identity invalid.
    fn forget(&mut self, id: &ObjectId) {
        self.containers.remove(id);
        self.end_points.retain(|k, _| &k.object != id);
        self.invalid.insert(id.clone());
    }
}

fn related_value(value: Option<&Value>) -> Option<ObjectId> {
    value.and_then(Value::as_object).cloned()
}
