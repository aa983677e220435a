//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use tangle_foundation::{
    Error, ObjectId, PropertyName, RelationEndPointId, Result, Timestamp, TransactionId, Type,
    Value,
};
use tangle_mapping::{
    ClassDefinition, MappingConfiguration, PropertyDefinition, RelationDefinition,
    RelationEndPointDefinition,
};

use crate::container::DataContainer;
use crate::data_manager::DataManager;
use crate::listener::TransactionListener;
use crate::loader::ObjectLoader;

/// Order/Customer/OrderTicket/OrderItem plus a unidirectional Location.Client.
pub(crate) fn mapping() -> Arc<MappingConfiguration> {
    let mut mapping = MappingConfiguration::new();
    for class in [
        ClassDefinition::new("Order")
            .with_property(PropertyDefinition::persistent("Number", Type::Int)),
        ClassDefinition::new("Customer")
            .with_property(PropertyDefinition::persistent("Name", Type::String)),
        ClassDefinition::new("OrderTicket")
            .with_property(PropertyDefinition::persistent("FileName", Type::String)),
        ClassDefinition::new("OrderItem")
            .with_property(PropertyDefinition::persistent("Product", Type::String)),
        ClassDefinition::new("Location")
            .with_property(PropertyDefinition::persistent("City", Type::String)),
        ClassDefinition::new("Client")
            .with_property(PropertyDefinition::persistent("Name", Type::String)),
    ] {
        mapping.register_class(class).unwrap();
    }
    for relation in [
        RelationDefinition::one_to_many(
            "Order:Customer->Customer:Orders",
            ("Order", "Customer"),
            ("Customer", "Orders"),
        ),
        RelationDefinition::one_to_one(
            "OrderTicket:Order->Order:OrderTicket",
            ("OrderTicket", "Order"),
            ("Order", "OrderTicket"),
        ),
        RelationDefinition::one_to_many(
            "OrderItem:Order->Order:OrderItems",
            ("OrderItem", "Order"),
            ("Order", "OrderItems"),
        ),
        RelationDefinition::unidirectional("Location:Client", ("Location", "Client"), "Client"),
    ] {
        mapping.register_relation(relation).unwrap();
    }
    Arc::new(mapping)
}

pub(crate) fn order(n: i64) -> ObjectId {
    ObjectId::with_int("Order", n)
}

pub(crate) fn customer(n: i64) -> ObjectId {
    ObjectId::with_int("Customer", n)
}

pub(crate) fn ticket(n: i64) -> ObjectId {
    ObjectId::with_int("OrderTicket", n)
}

pub(crate) fn item(n: i64) -> ObjectId {
    ObjectId::with_int("OrderItem", n)
}

pub(crate) fn location(n: i64) -> ObjectId {
    ObjectId::with_int("Location", n)
}

pub(crate) fn client(n: i64) -> ObjectId {
    ObjectId::with_int("Client", n)
}

pub(crate) fn ep(object: &ObjectId, property: &str) -> RelationEndPointId {
    RelationEndPointId::new(object.clone(), property)
}

pub(crate) fn prop(name: &str) -> PropertyName {
    PropertyName::new(name)
}

pub(crate) fn data_manager() -> DataManager {
    DataManager::new(TransactionId::new(1), mapping())
}

// =============================================================================
// Fixture Loader
// =============================================================================

/// Serves containers from an in-memory table.
#[derive(Default)]
pub(crate) struct FixtureLoader {
    records: BTreeMap<ObjectId, DataContainer>,
    pub(crate) container_loads: usize,
    pub(crate) related_loads: usize,
    pub(crate) fail: bool,
}

impl FixtureLoader {
    /// Adds an object with the given values, including foreign keys.
    pub(crate) fn with(mut self, id: ObjectId, values: &[(&str, Value)]) -> Self {
        let mapping = mapping();
        let class = mapping.require_class(&id.class).unwrap();
        let container = DataContainer::from_loaded(
            class,
            id.clone(),
            Timestamp::new(1),
            values.iter().map(|(p, v)| (prop(p), v.clone())),
        );
        self.records.insert(id, container);
        self
    }

    /// Two customers with two orders each, one ticket per order, one item
    /// per order, and a location pointing at a client.
    pub(crate) fn standard() -> Self {
        Self::default()
            .with(customer(1), &[("Name", "Alice".into())])
            .with(customer(2), &[("Name", "Bob".into())])
            .with(order(1), &[("Number", Value::Int(1)), ("Customer", customer(1).into())])
            .with(order(2), &[("Number", Value::Int(2)), ("Customer", customer(1).into())])
            .with(order(3), &[("Number", Value::Int(3)), ("Customer", customer(2).into())])
            .with(order(4), &[("Number", Value::Int(4)), ("Customer", customer(2).into())])
            .with(ticket(1), &[("FileName", "t1".into()), ("Order", order(1).into())])
            .with(ticket(2), &[("FileName", "t2".into()), ("Order", order(2).into())])
            .with(item(1), &[("Product", "Tea".into()), ("Order", order(1).into())])
            .with(item(2), &[("Product", "Cake".into()), ("Order", order(2).into())])
            .with(client(1), &[("Name", "Acme".into())])
            .with(location(1), &[("City", "Oslo".into()), ("Client", client(1).into())])
    }
}

impl ObjectLoader for FixtureLoader {
    fn load_containers(&mut self, ids: &[ObjectId]) -> Result<Vec<DataContainer>> {
        if self.fail {
            return Err(Error::storage("fixture failure"));
        }
        self.container_loads += 1;
        Ok(ids.iter().filter_map(|id| self.records.get(id).cloned()).collect())
    }

    fn load_related_ids(
        &mut self,
        end_point: &RelationEndPointId,
        opposite: &RelationEndPointDefinition,
    ) -> Result<Vec<ObjectId>> {
        if self.fail {
            return Err(Error::storage("fixture failure"));
        }
        self.related_loads += 1;
        let Some(property) = &opposite.property else {
            return Ok(Vec::new());
        };
        let owner = Value::ObjectRef(end_point.object.clone());
        Ok(self
            .records
            .values()
            .filter(|c| c.id().class == opposite.class && c.value(property) == Some(&owner))
            .map(|c| c.id().clone())
            .collect())
    }
}

// =============================================================================
// Recording Listener
// =============================================================================

/// Records relation and deletion notifications as strings.
#[derive(Default)]
pub(crate) struct Recorder {
    pub(crate) events: Vec<String>,
    pub(crate) veto_relations: bool,
}

fn show(id: Option<&ObjectId>) -> String {
    id.map_or_else(|| "null".to_string(), ToString::to_string)
}

impl TransactionListener for Recorder {
    fn relation_changing(
        &mut self,
        _tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> Result<()> {
        if self.veto_relations {
            return Err(Error::cancelled("vetoed by recorder"));
        }
        self.events.push(format!(
            "changing {object}.{property} {} -> {}",
            show(old),
            show(new)
        ));
        Ok(())
    }

    fn relation_changed(
        &mut self,
        _tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
        self.events.push(format!(
            "changed {object}.{property} {} -> {}",
            show(old),
            show(new)
        ));
    }

    fn property_changed(
        &mut self,
        _tx: TransactionId,
        object: &ObjectId,
        property: &PropertyName,
        _old: &Value,
        new: &Value,
    ) {
        self.events.push(format!("set {object}.{property} = {new}"));
    }

    fn object_deleting(&mut self, _tx: TransactionId, object: &ObjectId) -> Result<()> {
        self.events.push(format!("deleting {object}"));
        Ok(())
    }

    fn object_deleted(&mut self, _tx: TransactionId, object: &ObjectId) {
        self.events.push(format!("deleted {object}"));
    }
}
