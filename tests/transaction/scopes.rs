//! Integration tests for transaction scopes
//!
//! Tests how scope guards select the current transaction and how a
//! sub-transaction scope ends its sub-transaction.

use tangle_foundation::{ErrorKind, Value};
use tangle_transaction::TransactionState;

use crate::{customer, hierarchy, order};

#[test]
fn committed_scope_hands_changes_to_parent() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = {
        let mut scope = h.enter_sub_transaction(root).unwrap();
        let sub = scope.id();
        assert_eq!(scope.current(), Some(sub));
        scope.set_value(sub, &order(1), "Number", 10_i64).unwrap();
        scope.commit().unwrap();
        sub
    };

    assert_eq!(h.current(), None);
    assert_eq!(h.state(sub), Some(TransactionState::Committed));
    assert_eq!(h.get_value(root, &order(1), "Number").unwrap(), Value::Int(10));
}

#[test]
fn explicitly_discarded_scope_keeps_parent_clean() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = {
        let mut scope = h.enter_sub_transaction(root).unwrap();
        let sub = scope.id();
        scope
            .set_related_object(sub, &order(1), "Customer", Some(customer(2)))
            .unwrap();
        scope.discard().unwrap();
        sub
    };

    assert_eq!(h.state(sub), Some(TransactionState::Discarded));
    assert_eq!(
        h.get_related_object(root, &order(1), "Customer").unwrap(),
        Some(customer(1))
    );
}

#[test]
fn dropping_a_scope_discards_everything_below_it() {
    let mut h = hierarchy();
    let root = h.root();
    let (outer, inner) = {
        let mut scope = h.enter_sub_transaction(root).unwrap();
        let outer = scope.id();
        let inner = scope.create_sub_transaction(outer).unwrap();
        scope.set_value(inner, &order(2), "Number", 20_i64).unwrap();
        (outer, inner)
    };

    assert_eq!(h.state(inner), Some(TransactionState::Discarded));
    assert_eq!(h.state(outer), Some(TransactionState::Discarded));
    assert_eq!(h.active(), Some(root));
    assert_eq!(h.depth(), 0);
    assert!(h.changed_objects(root).unwrap().is_empty());
}

#[test]
fn scope_over_the_root_restores_current() {
    let mut h = hierarchy();
    let root = h.root();
    {
        let mut scope = h.enter_scope(root).unwrap();
        assert_eq!(scope.id(), root);
        scope.set_value(root, &order(3), "Number", 30_i64).unwrap();
        {
            let inner = scope.enter_sub_transaction(root).unwrap();
            assert_eq!(inner.current(), Some(inner.id()));
        }
        assert_eq!(scope.current(), Some(root));
    }

    assert_eq!(h.current(), None);
    assert_eq!(h.state(root), Some(TransactionState::Active));
    assert_eq!(h.changed_objects(root).unwrap(), vec![order(3)]);
}

#[test]
fn ended_transactions_cannot_be_entered() {
    let mut h = hierarchy();
    let root = h.root();
    let sub = h.create_sub_transaction(root).unwrap();
    h.commit(sub).unwrap();

    let err = h.enter_scope(sub).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidOperation(_)));
    assert_eq!(h.current(), None);
}
