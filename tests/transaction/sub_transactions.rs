//! Integration tests for sub-transactions
//!
//! Tests the read-through to the parent, isolation until commit, merging
//! into the parent, and the parent's read-only state while a child is open.

use tangle_data::ObjectState;
use tangle_foundation::{ErrorKind, ObjectId, TransactionId, Value};
use tangle_transaction::{TransactionConfig, TransactionState};

use crate::{customer, hierarchy, hierarchy_with, order, ticket};

// =============================================================================
// Creation
// =============================================================================

#[test]
fn sub_transactions_get_fresh_ids() {
    let mut h = hierarchy();
    let root = h.root();
    assert_eq!(root, TransactionId::new(1));

    let first = h.create_sub_transaction(root).unwrap();
    assert_eq!(first, TransactionId::new(2));
    h.discard(first).unwrap();

    let second = h.create_sub_transaction(root).unwrap();
    assert_eq!(second, TransactionId::new(3));
    assert_eq!(h.parent(second), Some(root));
    assert_eq!(h.depth(), 1);
}

#[test]
fn parent_is_read_only_while_child_is_open() {
    let mut h = hierarchy();
    let root = h.root();
    h.set_value(root, &order(1), "Number", 5_i64).unwrap();
    let sub = h.create_sub_transaction(root).unwrap();

    assert_eq!(h.state(root), Some(TransactionState::HasActiveChild));
    assert_eq!(h.get_value(root, &order(1), "Number").unwrap(), Value::Int(5));
    for err in [
        h.set_value(root, &order(1), "Number", 6_i64).unwrap_err(),
        h.set_related_object(root, &order(1), "Customer", None).unwrap_err(),
        h.new_object(root, "Order").unwrap_err(),
        h.delete_object(root, &order(2)).unwrap_err(),
        h.create_sub_transaction(root).unwrap_err(),
        h.commit(root).unwrap_err(),
        h.rollback(root).unwrap_err(),
    ] {
        assert!(matches!(err.kind, ErrorKind::InvalidOperation(_)));
    }

    assert_eq!(h.changed_objects(root).unwrap(), vec![order(1)]);
    h.check_consistency(root).unwrap();
    assert_eq!(h.active(), Some(sub));
}

#[test]
fn nesting_depth_follows_config() {
    let mut h = hierarchy_with(TransactionConfig::new().with_max_nesting_depth(1));
    let root = h.root();
    let sub = h.create_sub_transaction(root).unwrap();

    let err = h.create_sub_transaction(sub).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidOperation(_)));
    assert_eq!(h.depth(), 1);
    assert_eq!(h.state(sub), Some(TransactionState::Active));
}

#[test]
fn child_cannot_reuse_an_identity_of_its_parent() {
    let mut h = hierarchy();
    let root = h.root();
    assert_eq!(
        h.get_related_object(root, &order(1), "OrderTicket").unwrap(),
        Some(ticket(1))
    );
    h.delete_object(root, &order(2)).unwrap();
    let sub = h.create_sub_transaction(root).unwrap();

    for id in [order(1), order(2), order(3)] {
        let err = h.new_object_with_id(sub, id).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidOperation(_)));
    }
    h.commit(sub).unwrap();

    assert_eq!(
        h.get_related_object(root, &order(1), "OrderTicket").unwrap(),
        Some(ticket(1))
    );
    assert_eq!(
        h.get_related_objects(root, &customer(1), "Orders").unwrap(),
        vec![order(1)]
    );
    h.check_consistency(root).unwrap();
}

// =============================================================================
// Isolation
// =============================================================================

#[test]
fn child_starts_from_parent_state() {
    let mut h = hierarchy();
    let root = h.root();
    h.set_value(root, &order(1), "Number", 5_i64).unwrap();
    h.set_related_object(root, &order(2), "Customer", Some(customer(2)))
        .unwrap();
    let sub = h.create_sub_transaction(root).unwrap();

    assert_eq!(h.get_value(sub, &order(1), "Number").unwrap(), Value::Int(5));
    assert_eq!(h.object_state(sub, &order(1)).unwrap(), ObjectState::Unchanged);
    assert_eq!(
        h.get_related_objects(sub, &customer(2), "Orders").unwrap(),
        vec![order(3), order(2)]
    );
    assert_eq!(
        h.get_original_related_objects(sub, &customer(2), "Orders")
            .unwrap(),
        vec![order(3), order(2)]
    );
}

#[test]
fn child_edits_stay_invisible_in_parent_until_commit() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = h.create_sub_transaction(root).unwrap();
    h.set_value(sub, &order(1), "Number", 10_i64).unwrap();
    h.set_related_object(sub, &order(1), "Customer", Some(customer(2)))
        .unwrap();
    let created = h.new_object(sub, "Order").unwrap();

    assert_eq!(h.get_value(root, &order(1), "Number").unwrap(), Value::Int(1));
    assert_eq!(
        h.get_related_object(root, &order(1), "Customer").unwrap(),
        Some(customer(1))
    );
    assert_eq!(
        h.get_related_objects(root, &customer(2), "Orders").unwrap(),
        vec![order(3)]
    );
    assert_eq!(h.object_state(root, &order(1)).unwrap(), ObjectState::Unchanged);
    assert!(h.changed_objects(root).unwrap().is_empty());

    h.commit(sub).unwrap();

    assert_eq!(h.get_value(root, &order(1), "Number").unwrap(), Value::Int(10));
    assert_eq!(
        h.get_related_objects(root, &customer(2), "Orders").unwrap(),
        vec![order(3), order(1)]
    );
    assert_eq!(h.object_state(root, &created).unwrap(), ObjectState::New);
    h.check_consistency(root).unwrap();
}

#[test]
fn discarded_child_changes_never_reach_parent() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = h.create_sub_transaction(root).unwrap();
    h.set_value(sub, &order(1), "Number", 10_i64).unwrap();
    h.set_related_object(sub, &order(1), "Customer", Some(customer(2)))
        .unwrap();
    h.new_object_with_id(sub, order(10)).unwrap();

    h.discard(sub).unwrap();

    assert_eq!(h.state(sub), Some(TransactionState::Discarded));
    assert_eq!(h.get_value(root, &order(1), "Number").unwrap(), Value::Int(1));
    assert_eq!(
        h.get_related_object(root, &order(1), "Customer").unwrap(),
        Some(customer(1))
    );
    assert_eq!(h.object_state(root, &order(10)).unwrap(), ObjectState::Invalid);
    assert!(h.changed_objects(root).unwrap().is_empty());
}

#[test]
fn rollback_in_child_returns_to_parent_state() {
    let mut h = hierarchy();
    let root = h.root();
    h.set_value(root, &order(1), "Number", 5_i64).unwrap();
    let sub = h.create_sub_transaction(root).unwrap();
    h.set_value(sub, &order(1), "Number", 7_i64).unwrap();

    h.rollback(sub).unwrap();

    assert_eq!(h.state(sub), Some(TransactionState::Active));
    assert_eq!(h.get_value(sub, &order(1), "Number").unwrap(), Value::Int(5));
    assert!(h.changed_objects(sub).unwrap().is_empty());
}

// =============================================================================
// Merging
// =============================================================================

#[test]
fn committed_relation_change_reaches_the_store() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = h.create_sub_transaction(root).unwrap();
    h.set_related_object(sub, &order(1), "Customer", Some(customer(2)))
        .unwrap();

    h.commit(sub).unwrap();

    assert_eq!(h.state(sub), Some(TransactionState::Committed));
    assert_eq!(h.state(root), Some(TransactionState::Active));
    assert_eq!(h.provider().persist_calls(), 0);
    assert_eq!(h.object_state(root, &order(1)).unwrap(), ObjectState::Changed);
    assert_eq!(
        h.get_related_objects(root, &customer(2), "Orders").unwrap(),
        vec![order(3), order(1)]
    );
    assert_eq!(
        h.get_related_objects(root, &customer(1), "Orders").unwrap(),
        vec![order(2)]
    );
    h.check_consistency(root).unwrap();

    h.commit(root).unwrap();
    assert_eq!(h.provider().value(&order(1), "Customer"), Some(&Value::ObjectRef(customer(2))));
}

#[test]
fn object_created_in_child_is_new_in_parent() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = h.create_sub_transaction(root).unwrap();
    let created = h.new_object(sub, "Order").unwrap();
    h.set_value(sub, &created, "Number", 42_i64).unwrap();
    h.add_related_object(sub, &customer(1), "Orders", created.clone())
        .unwrap();
    h.commit(sub).unwrap();

    assert_eq!(h.object_state(root, &created).unwrap(), ObjectState::New);
    assert_eq!(
        h.get_related_objects(root, &customer(1), "Orders").unwrap(),
        vec![order(1), order(2), created.clone()]
    );

    h.commit(root).unwrap();
    assert_eq!(h.provider().value(&created, "Number"), Some(&Value::Int(42)));
    assert_eq!(h.provider().value(&created, "Customer"), Some(&Value::ObjectRef(customer(1))));
}

#[test]
fn object_created_and_deleted_in_child_leaves_no_trace() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = h.create_sub_transaction(root).unwrap();
    h.new_object_with_id(sub, order(10)).unwrap();
    h.add_related_object(sub, &customer(1), "Orders", order(10))
        .unwrap();
    h.delete_object(sub, &order(10)).unwrap();
    h.commit(sub).unwrap();

    assert_eq!(
        h.get_related_objects(root, &customer(1), "Orders").unwrap(),
        vec![order(1), order(2)]
    );
    assert_eq!(h.object_state(root, &order(10)).unwrap(), ObjectState::Invalid);
    assert!(h.changed_objects(root).unwrap().is_empty());
}

#[test]
fn grandchild_changes_commit_level_by_level() {
    let mut h = hierarchy();
    let root = h.root();
    let child = h.create_sub_transaction(root).unwrap();
    let grandchild = h.create_sub_transaction(child).unwrap();
    h.remove_related_object(grandchild, &customer(1), "Orders", &order(2))
        .unwrap();

    h.commit(grandchild).unwrap();
    assert_eq!(h.get_related_object(child, &order(2), "Customer").unwrap(), None);
    assert_eq!(h.changed_objects(root).unwrap(), Vec::<ObjectId>::new());

    h.commit(child).unwrap();
    assert_eq!(h.get_related_object(root, &order(2), "Customer").unwrap(), None);
    assert!(h.changed_objects(root).unwrap().contains(&order(2)));
}
