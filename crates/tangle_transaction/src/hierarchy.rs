//! The root transaction and its stack of sub-transactions.
//!
//! A hierarchy owns one root transaction backed by a [`PersistenceProvider`]
//! and at most one open sub-transaction per transaction, so the open nodes
//! always form a chain. Only the innermost node is `Active`; every node
//! above it is `HasActiveChild` and can still be read, but rejects edits,
//! commits, and rollbacks until the child commits or is discarded.
//!
//! Every operation names its transaction explicitly. [`enter_scope`] and
//! [`enter_sub_transaction`] additionally track a current transaction for
//! the duration of a guard.
//!
//! [`enter_scope`]: TransactionHierarchy::enter_scope
//! [`enter_sub_transaction`]: TransactionHierarchy::enter_sub_transaction

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tangle_data::{
    CompositeListener, DataContainer, DataContext, DataManager, DomainObjectCollection,
    ObjectState, RelationCommand, RelationEndPoint, TransactionListener,
};
use tangle_foundation::{
    ClassId, Error, ObjectId, PropertyName, RelationEndPointId, Result, Timestamp, TransactionId,
    Type, Value,
};
use tangle_mapping::MappingConfiguration;
use tracing::{debug, trace};

use crate::config::TransactionConfig;
use crate::node::{TransactionNode, TransactionState, loader_for};
use crate::provider::{PersistableData, PersistenceProvider};
use crate::scope::{SubTransactionScope, TransactionScope};
use crate::store::MemoryStore;

const ROOT: TransactionId = TransactionId::new(1);

/// A root transaction plus its open sub-transactions.
pub struct TransactionHierarchy<P: PersistenceProvider = MemoryStore> {
    mapping: Arc<MappingConfiguration>,
    provider: P,
    listeners: CompositeListener,
    config: TransactionConfig,
    /// Open nodes, root first; the last one is the only active node.
    nodes: Vec<TransactionNode>,
    /// Final states of ended transactions.
    ended: BTreeMap<TransactionId, TransactionState>,
    pub(crate) current: Option<TransactionId>,
    next_id: u64,
}

impl<P: PersistenceProvider> fmt::Debug for TransactionHierarchy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHierarchy")
            .field("nodes", &self.nodes.iter().map(|n| (n.id, n.state)).collect::<Vec<_>>())
            .field("ended", &self.ended)
            .field("current", &self.current)
            .field("listeners", &self.listeners)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: PersistenceProvider> TransactionHierarchy<P> {
    /// Creates a hierarchy with an empty root transaction.
    #[must_use]
    pub fn new(mapping: Arc<MappingConfiguration>, provider: P) -> Self {
        Self::with_config(mapping, provider, TransactionConfig::default())
    }

    /// Creates a hierarchy with the given configuration.
    #[must_use]
    pub fn with_config(
        mapping: Arc<MappingConfiguration>,
        provider: P,
        config: TransactionConfig,
    ) -> Self {
        let root = TransactionNode::new(ROOT, None, DataManager::new(ROOT, Arc::clone(&mapping)));
        Self {
            mapping,
            provider,
            listeners: CompositeListener::new(),
            config,
            nodes: vec![root],
            ended: BTreeMap::new(),
            current: None,
            next_id: ROOT.as_u64() + 1,
        }
    }

    /// Registers a listener for every transaction of the hierarchy.
    pub fn add_listener(&mut self, listener: Box<dyn TransactionListener>) {
        self.listeners.push(listener);
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Returns the root transaction.
    #[must_use]
    pub fn root(&self) -> TransactionId {
        ROOT
    }

    /// Returns the innermost open transaction, `None` once the root is discarded.
    #[must_use]
    pub fn active(&self) -> Option<TransactionId> {
        self.nodes.last().map(|n| n.id)
    }

    /// Returns the transaction selected by the innermost scope guard.
    #[must_use]
    pub fn current(&self) -> Option<TransactionId> {
        self.current
    }

    /// Returns the number of open sub-transactions.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Returns the state of a transaction, `None` if it never existed.
    #[must_use]
    pub fn state(&self, tx: TransactionId) -> Option<TransactionState> {
        self.node(tx)
            .map(TransactionNode::state)
            .or_else(|| self.ended.get(&tx).copied())
    }

    /// Returns the parent of an open transaction.
    #[must_use]
    pub fn parent(&self, tx: TransactionId) -> Option<TransactionId> {
        self.node(tx).and_then(TransactionNode::parent)
    }

    /// Returns an open transaction node.
    #[must_use]
    pub fn node(&self, tx: TransactionId) -> Option<&TransactionNode> {
        self.nodes.iter().find(|n| n.id == tx)
    }

    /// Returns the data manager of an open transaction.
    #[must_use]
    pub fn data_manager(&self, tx: TransactionId) -> Option<&DataManager> {
        self.node(tx).map(TransactionNode::data)
    }

    /// Returns the mapping.
    #[must_use]
    pub fn mapping(&self) -> &MappingConfiguration {
        &self.mapping
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Returns the persistence provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the persistence provider mutably.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    // -------------------------------------------------------------------------
    // Objects
    // -------------------------------------------------------------------------

    /// Creates a new object with a fresh GUID identity.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` for an unmapped class or `InvalidOperation` if
    /// the transaction is not active.
    pub fn new_object(&mut self, tx: TransactionId, class: impl Into<ClassId>) -> Result<ObjectId> {
        let id = ObjectId::new_guid(class);
        self.new_object_with_id(tx, id.clone())?;
        Ok(id)
    }

    /// Creates a new object with a caller-chosen identity.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass`, `InvalidOperation` if the identity is already
    /// known to the transaction, its ancestors, or the store, or
    /// `InvalidOperation` if the transaction is not active.
    pub fn new_object_with_id(&mut self, tx: TransactionId, id: ObjectId) -> Result<()> {
        self.with_node(tx, |data, ctx| {
            let class = data.mapping().require_class(&id.class)?.clone();
            data.create_object(DataContainer::new_object(&class, id), ctx)
        })
    }

    /// Returns a snapshot of an object's container, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` / `AlreadyInvalid` for missing objects.
    pub fn get_object(&mut self, tx: TransactionId, id: &ObjectId) -> Result<DataContainer> {
        self.read_node(tx, |data, ctx| data.get_object_or_load(id, ctx).cloned())
    }

    /// Returns the state of an object, loading it if necessary.
    ///
    /// Missing objects report `Invalid`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not open, and
    /// propagates store errors.
    pub fn object_state(&mut self, tx: TransactionId, id: &ObjectId) -> Result<ObjectState> {
        self.read_node(tx, |data, ctx| {
            match data.get_object_or_load(id, ctx).map(|_| ()) {
                Ok(()) => Ok(data.object_state(id).unwrap_or(ObjectState::Invalid)),
                Err(err) if err.is_missing_object() => Ok(ObjectState::Invalid),
                Err(err) => Err(err),
            }
        })
    }

    /// Returns the current value of a property.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` or a loading error.
    pub fn get_value(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
        property: impl Into<PropertyName>,
    ) -> Result<Value> {
        let property = property.into();
        self.read_node(tx, |data, ctx| data.get_value(id, &property, ctx))
    }

    /// Sets the value of a non-relation property.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty`, `TypeMismatch`, `ProtocolViolation` for
    /// relation properties, `InvalidOperation` for deleted objects, or a
    /// listener veto.
    pub fn set_value(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
        property: impl Into<PropertyName>,
        value: impl Into<Value>,
    ) -> Result<()> {
        let property = property.into();
        let value = value.into();
        self.with_node(tx, |data, ctx| data.set_value(id, &property, value, ctx))
    }

    /// Marks an object as changed without changing a value.
    ///
    /// # Errors
    ///
    /// Returns a loading error or `InvalidOperation` for deleted objects.
    pub fn mark_as_changed(&mut self, tx: TransactionId, id: &ObjectId) -> Result<()> {
        self.with_node(tx, |data, ctx| data.mark_as_changed(id, ctx))
    }

    /// Deletes an object after clearing every relation it takes part in.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the object is already deleted, a
    /// loading error, or a listener veto.
    pub fn delete_object(&mut self, tx: TransactionId, id: &ObjectId) -> Result<()> {
        self.with_node(tx, |data, ctx| data.mark_deleted(id, ctx))
    }

    // -------------------------------------------------------------------------
    // Relations
    // -------------------------------------------------------------------------

    /// Returns the object a scalar relation property points at.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for collection properties and
    /// `UnknownProperty` for non-relation properties.
    pub fn get_related_object(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
    ) -> Result<Option<ObjectId>> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.read_end_point(tx, &id, |e| Ok(scalar(e, &id)?.related_object().cloned()))
    }

    /// Returns the object a scalar relation property pointed at when loaded.
    ///
    /// # Errors
    ///
    /// See [`get_related_object`](Self::get_related_object).
    pub fn get_original_related_object(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
    ) -> Result<Option<ObjectId>> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.read_end_point(tx, &id, |e| {
            Ok(scalar(e, &id)?.original_related_object().cloned())
        })
    }

    /// Returns the members of a collection relation property.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for scalar properties and
    /// `UnknownProperty` for non-relation properties.
    pub fn get_related_objects(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
    ) -> Result<Vec<ObjectId>> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.read_end_point(tx, &id, |e| Ok(collection(e, &id)?.related_objects()))
    }

    /// Returns the members of a collection relation property as loaded.
    ///
    /// # Errors
    ///
    /// See [`get_related_objects`](Self::get_related_objects).
    pub fn get_original_related_objects(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
    ) -> Result<Vec<ObjectId>> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.read_end_point(tx, &id, |e| {
            Ok(collection(e, &id)?.original_related_objects())
        })
    }

    /// Returns a snapshot of a relation end point, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` for non-relation properties.
    pub fn get_end_point(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
    ) -> Result<RelationEndPoint> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.read_end_point(tx, &id, |e| Ok(e.clone()))
    }

    /// Points a scalar relation property at `related`, updating every
    /// affected opposite end point.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if `related` has the wrong class,
    /// `ProtocolViolation` for collection properties, loading errors, or a
    /// listener veto.
    pub fn set_related_object(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
        related: Option<ObjectId>,
    ) -> Result<()> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.edit(tx, &id, |e| {
            if let Some(related) = &related {
                check_related_class(e, &id, related)?;
            }
            e.create_set_command(related)
        })
    }

    /// Inserts `item` into a collection at `index`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `item` is already a member or `index`
    /// is out of range, `TypeMismatch`, loading errors, or a listener veto.
    pub fn insert_related_object(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
        index: usize,
        item: ObjectId,
    ) -> Result<()> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.edit(tx, &id, |e| {
            check_related_class(e, &id, &item)?;
            e.create_insert_command(index, item)
        })
    }

    /// Appends `item` to a collection.
    ///
    /// # Errors
    ///
    /// See [`insert_related_object`](Self::insert_related_object).
    pub fn add_related_object(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
        item: ObjectId,
    ) -> Result<()> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.edit(tx, &id, |e| {
            check_related_class(e, &id, &item)?;
            let len = collection(e, &id)?.collection().map_or(0, DomainObjectCollection::len);
            e.create_insert_command(len, item)
        })
    }

    /// Removes `item` from a collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `item` is not a member, loading errors,
    /// or a listener veto.
    pub fn remove_related_object(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
        item: &ObjectId,
    ) -> Result<()> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.edit(tx, &id, |e| e.create_remove_command(item.clone()))
    }

    /// Replaces the member at `index` with `item`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for an out-of-range index or an `item`
    /// that is already a member elsewhere in the collection, `TypeMismatch`,
    /// loading errors, or a listener veto.
    pub fn replace_related_object(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
        index: usize,
        item: ObjectId,
    ) -> Result<()> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.edit(tx, &id, |e| {
            check_related_class(e, &id, &item)?;
            e.create_replace_command(index, item)
        })
    }

    /// Replaces the whole contents of a collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for duplicate items, `TypeMismatch`,
    /// loading errors, or a listener veto.
    pub fn set_related_objects(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
        items: Vec<ObjectId>,
    ) -> Result<()> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.edit(tx, &id, |e| {
            for item in &items {
                check_related_class(e, &id, item)?;
            }
            e.create_set_collection_command(items)
        })
    }

    /// Marks a relation end point as touched without changing it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` or a loading error.
    pub fn touch(
        &mut self,
        tx: TransactionId,
        object: &ObjectId,
        property: impl Into<PropertyName>,
    ) -> Result<()> {
        let id = RelationEndPointId::new(object.clone(), property);
        self.edit(tx, &id, RelationEndPoint::create_touch_command)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Opens a sub-transaction below `parent`, which becomes inactive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `parent` is not active or the maximum
    /// nesting depth is reached.
    pub fn create_sub_transaction(&mut self, parent: TransactionId) -> Result<TransactionId> {
        let index = self.active_position(parent)?;
        if self.depth() >= self.config.max_nesting_depth {
            return Err(Error::invalid_operation(format!(
                "sub-transactions are limited to a depth of {}",
                self.config.max_nesting_depth
            ))
            .in_transaction(parent));
        }

        let id = TransactionId::new(self.next_id);
        self.next_id += 1;
        self.nodes[index].state = TransactionState::HasActiveChild;
        self.nodes.push(TransactionNode::new(
            id,
            Some(parent),
            DataManager::new(id, Arc::clone(&self.mapping)),
        ));
        self.listeners.sub_transaction_created(parent, id);
        debug!(%parent, child = %id, depth = self.depth(), "created sub-transaction");
        Ok(id)
    }

    /// Commits a transaction.
    ///
    /// The root persists its changes through the provider and stays active.
    /// A sub-transaction hands its changes to its parent, ends as
    /// `Committed`, and reactivates the parent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active,
    /// `ProtocolViolation` if the consistency check fails, a listener veto,
    /// or a provider error such as `ConcurrencyConflict`. A failed commit
    /// leaves the transaction open with its changes.
    pub fn commit(&mut self, tx: TransactionId) -> Result<()> {
        let index = self.active_position(tx)?;
        let result = if index == 0 {
            self.commit_root(tx)
        } else {
            self.commit_sub(tx, index)
        };
        result.map_err(|err| err.in_transaction(tx))
    }

    fn commit_root(&mut self, tx: TransactionId) -> Result<()> {
        let Self {
            nodes,
            provider,
            listeners,
            config,
            ..
        } = self;
        let data = &mut nodes[0].data;

        if config.check_consistency_on_commit {
            data.check_consistency()?;
        }
        let objects = data.changed_objects();
        listeners.transaction_committing(tx, &objects)?;
        if config.mark_one_to_one_virtual_changes {
            data.mark_virtual_object_owners_changed()?;
        }

        let changed: Vec<PersistableData> = data
            .containers()
            .filter(|c| c.needs_persisting())
            .map(PersistableData::from_container)
            .collect();
        let deleted: Vec<(ObjectId, Timestamp)> = data
            .deleted_objects()
            .filter_map(|c| Some((c.id().clone(), c.timestamp()?)))
            .collect();
        debug!(%tx, written = changed.len(), deleted = deleted.len(), "committing root transaction");

        for (id, timestamp) in provider.persist(&changed, &deleted)? {
            data.set_timestamp(&id, timestamp)?;
        }
        data.commit();
        listeners.transaction_committed(tx, &objects);
        Ok(())
    }

    fn commit_sub(&mut self, tx: TransactionId, index: usize) -> Result<()> {
        let objects = {
            let Self {
                nodes,
                listeners,
                config,
                ..
            } = &mut *self;
            let (ancestors, rest) = nodes.split_at_mut(index);
            let (Some(parent), Some(child)) = (ancestors.last_mut(), rest.first()) else {
                return Err(Error::internal("sub-transaction without parent"));
            };

            if config.check_consistency_on_commit {
                child.data.check_consistency()?;
            }
            let objects = child.data.changed_objects();
            listeners.transaction_committing(tx, &objects)?;
            parent.data.merge_from(&child.data)?;
            parent.state = TransactionState::Active;
            objects
        };

        self.nodes.truncate(index);
        self.ended.insert(tx, TransactionState::Committed);
        self.listeners.transaction_committed(tx, &objects);
        debug!(%tx, objects = objects.len(), "committed sub-transaction");
        Ok(())
    }

    /// Reverts every change of a transaction; it stays active.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active, or a
    /// listener veto.
    pub fn rollback(&mut self, tx: TransactionId) -> Result<()> {
        let index = self.active_position(tx)?;
        self.listeners
            .transaction_rolling_back(tx)
            .map_err(|err| err.in_transaction(tx))?;
        self.nodes[index].data.rollback();
        self.listeners.transaction_rolled_back(tx);
        debug!(%tx, "rolled back transaction");
        Ok(())
    }

    /// Ends a transaction without keeping its changes.
    ///
    /// A discarded sub-transaction reactivates its parent. A discarded root
    /// ends the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active.
    pub fn discard(&mut self, tx: TransactionId) -> Result<()> {
        self.active_position(tx)?;
        if let Some(mut node) = self.nodes.pop() {
            node.data.discard();
        }
        self.ended.insert(tx, TransactionState::Discarded);
        if let Some(parent) = self.nodes.last_mut() {
            parent.state = TransactionState::Active;
        }
        debug!(%tx, "discarded transaction");
        Ok(())
    }

    /// Discards `tx` together with every sub-transaction below it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `tx` is not open.
    pub fn discard_through(&mut self, tx: TransactionId) -> Result<()> {
        self.position(tx)?;
        while let Some(last) = self.active() {
            self.discard(last)?;
            if last == tx {
                break;
            }
        }
        Ok(())
    }

    /// Verifies that every loaded relation of an open transaction is symmetric.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` naming the first asymmetric end point.
    pub fn check_consistency(&self, tx: TransactionId) -> Result<()> {
        let index = self.position(tx)?;
        self.nodes[index]
            .data
            .check_consistency()
            .map_err(|err| err.in_transaction(tx))
    }

    /// Returns every new, changed, or deleted object of an open transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not open.
    pub fn changed_objects(&self, tx: TransactionId) -> Result<Vec<ObjectId>> {
        let index = self.position(tx)?;
        Ok(self.nodes[index].data.changed_objects())
    }

    // -------------------------------------------------------------------------
    // Scopes
    // -------------------------------------------------------------------------

    /// Makes `tx` the current transaction until the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `tx` is not open.
    pub fn enter_scope(&mut self, tx: TransactionId) -> Result<TransactionScope<'_, P>> {
        self.position(tx)?;
        Ok(TransactionScope::new(self, tx))
    }

    /// Opens a sub-transaction below `parent` and makes it current.
    ///
    /// The sub-transaction is discarded when the guard drops unless it was
    /// committed or discarded before.
    ///
    /// # Errors
    ///
    /// See [`create_sub_transaction`](Self::create_sub_transaction).
    pub fn enter_sub_transaction(
        &mut self,
        parent: TransactionId,
    ) -> Result<SubTransactionScope<'_, P>> {
        let tx = self.create_sub_transaction(parent)?;
        Ok(SubTransactionScope::new(self, tx))
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn position(&self, tx: TransactionId) -> Result<usize> {
        if let Some(index) = self.nodes.iter().position(|n| n.id == tx) {
            return Ok(index);
        }
        let err = match self.ended.get(&tx) {
            Some(state) => Error::invalid_operation(format!("transaction {tx} is {state}")),
            None => Error::invalid_operation(format!("unknown transaction {tx}")),
        };
        Err(err.in_transaction(tx))
    }

    fn active_position(&self, tx: TransactionId) -> Result<usize> {
        let index = self.position(tx)?;
        if self.nodes[index].state != TransactionState::Active {
            return Err(Error::invalid_operation(format!(
                "transaction {tx} is inactive while a sub-transaction is open"
            ))
            .in_transaction(tx));
        }
        Ok(index)
    }

    /// Runs `f` against the data manager of an active transaction.
    fn with_node<R>(
        &mut self,
        tx: TransactionId,
        f: impl FnOnce(&mut DataManager, &mut DataContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let index = self.active_position(tx)?;
        self.run_at(index, tx, f)
    }

    /// Runs a read against the data manager of an open transaction.
    ///
    /// Reads may still load lazily into a transaction with an open child.
    fn read_node<R>(
        &mut self,
        tx: TransactionId,
        f: impl FnOnce(&mut DataManager, &mut DataContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let index = self.position(tx)?;
        self.run_at(index, tx, f)
    }

    fn run_at<R>(
        &mut self,
        index: usize,
        tx: TransactionId,
        f: impl FnOnce(&mut DataManager, &mut DataContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let Self {
            nodes,
            provider,
            mapping,
            listeners,
            ..
        } = self;
        let (ancestors, rest) = nodes.split_at_mut(index);
        let node = &mut rest[0];
        let mut loader = loader_for(ancestors, provider, mapping);
        let mut ctx = DataContext::new(&mut *loader, listeners);
        trace!(%tx, "operating on transaction");
        f(&mut node.data, &mut ctx).map_err(|err| err.in_transaction(tx))
    }

    fn read_end_point<R>(
        &mut self,
        tx: TransactionId,
        id: &RelationEndPointId,
        f: impl FnOnce(&RelationEndPoint) -> Result<R>,
    ) -> Result<R> {
        self.read_node(tx, |data, ctx| f(data.get_end_point_or_load(id, ctx)?))
    }

    fn edit(
        &mut self,
        tx: TransactionId,
        id: &RelationEndPointId,
        create: impl FnOnce(&RelationEndPoint) -> Result<RelationCommand>,
    ) -> Result<()> {
        self.with_node(tx, |data, ctx| {
            let command = create(data.get_end_point_or_load(id, ctx)?)?;
            data.execute(command, ctx)
        })
    }
}

fn scalar<'a>(
    end_point: &'a RelationEndPoint,
    id: &RelationEndPointId,
) -> Result<&'a RelationEndPoint> {
    if end_point.is_scalar() {
        Ok(end_point)
    } else {
        Err(Error::protocol_violation(format!("{id} is a collection end point")))
    }
}

fn collection<'a>(
    end_point: &'a RelationEndPoint,
    id: &RelationEndPointId,
) -> Result<&'a RelationEndPoint> {
    if end_point.is_scalar() {
        Err(Error::protocol_violation(format!("{id} is a scalar end point")))
    } else {
        Ok(end_point)
    }
}

fn check_related_class(
    end_point: &RelationEndPoint,
    id: &RelationEndPointId,
    related: &ObjectId,
) -> Result<()> {
    let expected = &end_point.opposite_definition().class;
    if &related.class == expected {
        Ok(())
    } else {
        Err(Error::type_mismatch(
            id.object.clone(),
            id.property.clone(),
            Type::object_ref(expected.clone()),
            Type::object_ref(related.class.clone()),
        ))
    }
}
