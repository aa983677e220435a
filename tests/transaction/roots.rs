//! Integration tests for root transaction commits
//!
//! Tests what a root commit writes to the store, concurrency conflicts, and
//! the state the root is left in afterwards.

use tangle_data::ObjectState;
use tangle_foundation::{ErrorKind, Timestamp, Value};
use tangle_transaction::{TransactionConfig, TransactionState};

use crate::{customer, hierarchy, hierarchy_with, order, ticket};

// =============================================================================
// Persisting
// =============================================================================

#[test]
fn commit_writes_values_and_foreign_keys() {
    let mut h = hierarchy();
    let root = h.root();
    h.set_value(root, &order(1), "Number", 10_i64).unwrap();
    h.set_related_object(root, &order(2), "Customer", Some(customer(2)))
        .unwrap();

    h.commit(root).unwrap();

    let store = h.provider();
    assert_eq!(store.persist_calls(), 1);
    assert_eq!(store.value(&order(1), "Number"), Some(&Value::Int(10)));
    assert_eq!(store.value(&order(2), "Customer"), Some(&Value::ObjectRef(customer(2))));
    assert_eq!(store.value(&order(3), "Number"), Some(&Value::Int(3)));
}

#[test]
fn root_stays_active_with_committed_state_as_original() {
    let mut h = hierarchy();
    let root = h.root();
    h.set_related_object(root, &order(2), "Customer", Some(customer(2)))
        .unwrap();
    h.commit(root).unwrap();

    assert_eq!(h.state(root), Some(TransactionState::Active));
    assert!(h.changed_objects(root).unwrap().is_empty());
    assert_eq!(
        h.get_original_related_objects(root, &customer(2), "Orders")
            .unwrap(),
        vec![order(3), order(2)]
    );
    assert_eq!(
        h.get_original_related_objects(root, &customer(1), "Orders")
            .unwrap(),
        vec![order(1)]
    );

    h.set_value(root, &order(1), "Number", 11_i64).unwrap();
    h.commit(root).unwrap();
    assert_eq!(h.provider().persist_calls(), 2);
    assert_eq!(h.provider().value(&order(1), "Number"), Some(&Value::Int(11)));
}

#[test]
fn transaction_local_changes_are_not_written() {
    let mut h = hierarchy();
    let root = h.root();
    let before = h.provider().get(&order(1)).map(|r| r.timestamp);
    h.set_value(root, &order(1), "Note", "rush").unwrap();
    assert_eq!(h.object_state(root, &order(1)).unwrap(), ObjectState::Changed);

    h.commit(root).unwrap();

    assert_eq!(h.provider().get(&order(1)).map(|r| r.timestamp), before);
    assert_eq!(h.provider().value(&order(1), "Note"), None);
    assert_eq!(
        h.get_value(root, &order(1), "Note").unwrap(),
        Value::string("rush")
    );
}

#[test]
fn new_object_with_relations_is_inserted() {
    let mut h = hierarchy();
    let root = h.root();
    h.new_object_with_id(root, order(10)).unwrap();
    h.set_value(root, &order(10), "Number", 10_i64).unwrap();
    h.add_related_object(root, &customer(2), "Orders", order(10))
        .unwrap();

    h.commit(root).unwrap();

    assert_eq!(h.provider().value(&order(10), "Number"), Some(&Value::Int(10)));
    assert_eq!(h.provider().value(&order(10), "Customer"), Some(&Value::ObjectRef(customer(2))));
    let stamp = h.provider().get(&order(10)).map(|r| r.timestamp);
    assert_eq!(h.object_state(root, &order(10)).unwrap(), ObjectState::Unchanged);
    assert_eq!(h.get_object(root, &order(10)).unwrap().timestamp(), stamp);
}

#[test]
fn stored_identity_cannot_be_created_again() {
    let mut h = hierarchy();
    let root = h.root();

    let err = h.new_object_with_id(root, order(2)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidOperation(_)));
    assert_eq!(h.get_value(root, &order(2), "Number").unwrap(), Value::Int(2));
    assert_eq!(
        h.get_related_objects(root, &customer(1), "Orders").unwrap(),
        vec![order(1), order(2)]
    );
    assert!(h.changed_objects(root).unwrap().is_empty());
}

#[test]
fn deleting_a_customer_clears_its_orders() {
    let mut h = hierarchy();
    let root = h.root();
    h.delete_object(root, &customer(1)).unwrap();

    assert_eq!(h.get_related_object(root, &order(1), "Customer").unwrap(), None);
    assert_eq!(h.get_related_object(root, &order(2), "Customer").unwrap(), None);
    h.check_consistency(root).unwrap();

    h.commit(root).unwrap();

    assert!(!h.provider().contains(&customer(1)));
    assert_eq!(h.provider().value(&order(1), "Customer"), Some(&Value::Nil));
    assert_eq!(h.provider().value(&order(2), "Customer"), Some(&Value::Nil));
    assert_eq!(h.object_state(root, &customer(1)).unwrap(), ObjectState::Invalid);
}

// =============================================================================
// One-to-one owners
// =============================================================================

#[test]
fn reassigned_ticket_marks_both_orders_changed() {
    let mut h = hierarchy();
    let root = h.root();
    let o1_before = h.provider().get(&order(1)).map(|r| r.timestamp);
    let o2_before = h.provider().get(&order(2)).map(|r| r.timestamp);

    h.set_related_object(root, &ticket(1), "Order", Some(order(2)))
        .unwrap();
    assert_eq!(h.get_related_object(root, &order(1), "OrderTicket").unwrap(), None);
    assert_eq!(
        h.get_related_object(root, &order(2), "OrderTicket").unwrap(),
        Some(ticket(1))
    );
    h.commit(root).unwrap();

    assert_eq!(h.provider().value(&ticket(1), "Order"), Some(&Value::ObjectRef(order(2))));
    assert_ne!(h.provider().get(&order(1)).map(|r| r.timestamp), o1_before);
    assert_ne!(h.provider().get(&order(2)).map(|r| r.timestamp), o2_before);
}

#[test]
fn one_to_one_marking_can_be_disabled() {
    let mut h = hierarchy_with(TransactionConfig::new().with_one_to_one_marking(false));
    let root = h.root();
    let o2_before = h.provider().get(&order(2)).map(|r| r.timestamp);

    h.set_related_object(root, &ticket(1), "Order", Some(order(2)))
        .unwrap();
    h.commit(root).unwrap();

    assert_eq!(h.provider().value(&ticket(1), "Order"), Some(&Value::ObjectRef(order(2))));
    assert_eq!(h.provider().get(&order(2)).map(|r| r.timestamp), o2_before);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_write_rejects_the_whole_commit() {
    let mut h = hierarchy();
    let root = h.root();
    h.set_value(root, &order(1), "Number", 10_i64).unwrap();
    h.set_value(root, &order(2), "Number", 20_i64).unwrap();
    let stamp = h.provider_mut().touch_externally(&order(2)).unwrap();
    assert!(stamp > Timestamp::new(6));

    let err = h.commit(root).unwrap_err();

    assert!(matches!(err.kind, ErrorKind::ConcurrencyConflict(ref id) if id == &order(2)));
    assert_eq!(h.provider().value(&order(1), "Number"), Some(&Value::Int(1)));
    assert_eq!(h.provider().value(&order(2), "Number"), Some(&Value::Int(2)));
    assert_eq!(h.changed_objects(root).unwrap(), vec![order(1), order(2)]);
    assert_eq!(h.state(root), Some(TransactionState::Active));
}

#[test]
fn concurrently_deleted_object_conflicts_on_delete() {
    let mut h = hierarchy();
    let root = h.root();
    h.delete_object(root, &order(3)).unwrap();
    h.provider_mut().touch_externally(&order(3)).unwrap();

    let err = h.commit(root).unwrap_err();

    assert!(matches!(err.kind, ErrorKind::ConcurrencyConflict(_)));
    assert!(h.provider().contains(&order(3)));
    assert_eq!(h.object_state(root, &order(3)).unwrap(), ObjectState::Deleted);
}

// =============================================================================
// Rollback
// =============================================================================

#[test]
fn rollback_forgets_uncommitted_work_only() {
    let mut h = hierarchy();
    let root = h.root();
    h.set_value(root, &order(1), "Number", 10_i64).unwrap();
    h.commit(root).unwrap();

    h.set_value(root, &order(1), "Number", 11_i64).unwrap();
    h.remove_related_object(root, &customer(1), "Orders", &order(2))
        .unwrap();
    h.rollback(root).unwrap();

    assert_eq!(h.get_value(root, &order(1), "Number").unwrap(), Value::Int(10));
    assert_eq!(
        h.get_related_objects(root, &customer(1), "Orders").unwrap(),
        vec![order(1), order(2)]
    );
    h.check_consistency(root).unwrap();
    assert!(h.changed_objects(root).unwrap().is_empty());
}
