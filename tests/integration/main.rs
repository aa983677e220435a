//! Integration tests for the full Tangle stack
//!
//! Drives a transaction hierarchy over a memory store with an event
//! recorder attached, and checks the notifications, vetoes, persisted state,
//! and relation symmetry that result.


use std::sync::Arc;

use tangle_debug::{EventRecorder, TraceHandle, TracerConfig};
use tangle_foundation::{ObjectId, Result, TransactionId, Type, Value};
use tangle_mapping::{ClassDefinition, MappingConfiguration, PropertyDefinition, RelationDefinition};
use tangle_transaction::{MemoryStore, TransactionHierarchy};

// =============================================================================
// Fixtures
// =============================================================================

/// Orders, customers, tickets, and locations that point at a customer
/// without a way back.
pub fn mapping() -> Arc<MappingConfiguration> {
    let mut mapping = MappingConfiguration::new();
    for class in [
        ClassDefinition::new("Order")
            .with_property(PropertyDefinition::persistent("Number", Type::Int)),
        ClassDefinition::new("Customer")
            .with_property(PropertyDefinition::persistent("Name", Type::String)),
        ClassDefinition::new("OrderTicket")
            .with_property(PropertyDefinition::persistent("FileName", Type::String)),
        ClassDefinition::new("Location")
            .with_property(PropertyDefinition::persistent("City", Type::String)),
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
        RelationDefinition::unidirectional("Location:Owner", ("Location", "Owner"), "Customer"),
    ] {
        mapping.register_relation(relation).unwrap();
    }
    Arc::new(mapping)
}

pub fn order(n: i64) -> ObjectId {
    ObjectId::with_int("Order", n)
}

pub fn customer(n: i64) -> ObjectId {
    ObjectId::with_int("Customer", n)
}

pub fn ticket(n: i64) -> ObjectId {
    ObjectId::with_int("OrderTicket", n)
}

pub fn location(n: i64) -> ObjectId {
    ObjectId::with_int("Location", n)
}

/// Customers 1 and 2; orders 1 and 2 belong to customer 1, order 3 to
/// customer 2; ticket 1 belongs to order 1; location 1 is owned by
/// customer 1.
pub fn store() -> MemoryStore {
    MemoryStore::new()
        .with_object(customer(1), [("Name", Value::string("Ada"))])
        .with_object(customer(2), [("Name", Value::string("Grace"))])
        .with_object(order(1), [("Number", Value::Int(1)), ("Customer", customer(1).into())])
        .with_object(order(2), [("Number", Value::Int(2)), ("Customer", customer(1).into())])
        .with_object(order(3), [("Number", Value::Int(3)), ("Customer", customer(2).into())])
        .with_object(
            ticket(1),
            [("FileName", Value::string("t1")), ("Order", order(1).into())],
        )
        .with_object(
            location(1),
            [("City", Value::string("Zurich")), ("Owner", customer(1).into())],
        )
}

/// A hierarchy with a recorder attached, plus the recorder's handle.
pub fn traced(config: TracerConfig) -> (TransactionHierarchy, TraceHandle) {
    let recorder = EventRecorder::new(config);
    let handle = recorder.handle();
    let mut hierarchy = TransactionHierarchy::new(mapping(), store());
    hierarchy.add_listener(Box::new(recorder));
    (hierarchy, handle)
}

/// Recorded event types other than loads.
pub fn changes(handle: &TraceHandle) -> Vec<&'static str> {
    handle
        .event_types()
        .into_iter()
        .filter(|t| *t != "object-loaded")
        .collect()
}

/// Checks that every order and customer in `tx` agree with each other.
pub fn assert_symmetric(h: &mut TransactionHierarchy, tx: TransactionId) -> Result<()> {
    h.check_consistency(tx)?;
    for c in [customer(1), customer(2)] {
        for o in h.get_related_objects(tx, &c, "Orders")? {
            assert_eq!(h.get_related_object(tx, &o, "Customer")?, Some(c.clone()), "{o}");
        }
    }
    Ok(())
}
