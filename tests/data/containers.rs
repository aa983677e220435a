//! Integration tests for data containers and collections
//!
//! Tests value tracking, lifecycle transitions, and ordered collections.

use tangle_data::{DataContainer, DomainObjectCollection, ObjectState};
use tangle_foundation::{ErrorKind, ObjectId, Timestamp, Value};

use crate::{customer, mapping, order, prop};

fn loaded_order() -> DataContainer {
    let mapping = mapping();
    let class = mapping.require_class(&"Order".into()).unwrap();
    DataContainer::from_loaded(
        class,
        order(1),
        Timestamp::new(3),
        [
            (prop("Number"), Value::Int(1)),
            (prop("Customer"), customer(1).into()),
            (prop("Unmapped"), Value::Int(99)),
        ],
    )
}

fn set(container: &mut DataContainer, property: &str, value: Value) -> tangle_foundation::Result<Value> {
    let mapping = mapping();
    let definition = mapping
        .require_property(&container.id().class, &prop(property))
        .unwrap()
        .clone();
    container.set_value(&definition, value)
}

// =============================================================================
// Values
// =============================================================================

#[test]
fn loaded_container_ignores_unmapped_values() {
    let container = loaded_order();
    assert_eq!(container.state(), ObjectState::Unchanged);
    assert_eq!(container.timestamp(), Some(Timestamp::new(3)));
    assert_eq!(container.value(&prop("Number")), Some(&Value::Int(1)));
    assert_eq!(container.value(&prop("Note")), Some(&Value::Nil));
    assert!(container.value(&prop("Unmapped")).is_none());
}

#[test]
fn changing_a_value_keeps_the_original() {
    let mut container = loaded_order();
    let old = set(&mut container, "Number", Value::Int(2)).unwrap();

    assert_eq!(old, Value::Int(1));
    assert_eq!(container.state(), ObjectState::Changed);
    assert_eq!(container.original_value(&prop("Number")), Some(&Value::Int(1)));
    let changed: Vec<_> = container.changed_properties().cloned().collect();
    assert_eq!(changed, vec![prop("Number")]);
}

#[test]
fn setting_the_original_value_again_is_unchanged() {
    let mut container = loaded_order();
    set(&mut container, "Number", Value::Int(2)).unwrap();
    set(&mut container, "Number", Value::Int(1)).unwrap();
    assert_eq!(container.state(), ObjectState::Unchanged);
}

#[test]
fn relation_foreign_keys_are_read_only() {
    let mut container = loaded_order();
    let err = set(&mut container, "Customer", customer(2).into()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ProtocolViolation(_)));
}

#[test]
fn wrong_value_type_is_rejected() {
    let mut container = loaded_order();
    let err = set(&mut container, "Number", Value::string("one")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    assert_eq!(container.state(), ObjectState::Unchanged);
}

#[test]
fn transaction_local_changes_do_not_need_persisting() {
    let mut container = loaded_order();
    set(&mut container, "Note", Value::string("rush")).unwrap();

    assert_eq!(container.state(), ObjectState::Changed);
    assert!(container.has_transaction_local_changes());
    assert!(!container.has_persistent_changes());
    assert!(!container.needs_persisting());
    assert!(container.persistent_values().all(|(name, _)| name != &prop("Note")));
}

#[test]
fn mark_as_changed_needs_persisting() {
    let mut container = loaded_order();
    container.mark_as_changed().unwrap();
    assert!(container.is_marked_changed());
    assert_eq!(container.state(), ObjectState::Changed);
    assert!(container.needs_persisting());

    container.commit_state();
    assert!(!container.is_marked_changed());
    assert_eq!(container.state(), ObjectState::Unchanged);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn new_object_commits_to_unchanged() {
    let mapping = mapping();
    let class = mapping.require_class(&"Customer".into()).unwrap();
    let mut container = DataContainer::new_object(class, ObjectId::new_guid("Customer"));

    assert_eq!(container.state(), ObjectState::New);
    assert!(container.timestamp().is_none());
    assert!(container.needs_persisting());

    container.commit_state();
    assert_eq!(container.state(), ObjectState::Unchanged);
}

#[test]
fn rollback_discards_new_object() {
    let mapping = mapping();
    let class = mapping.require_class(&"Customer".into()).unwrap();
    let mut container = DataContainer::new_object(class, customer(9));
    container.rollback_state();
    assert_eq!(container.state(), ObjectState::Discarded);
}

#[test]
fn deleting_twice_is_a_protocol_violation() {
    let mut container = loaded_order();
    container.mark_deleted().unwrap();
    assert_eq!(container.state(), ObjectState::Deleted);
    assert!(!container.needs_persisting());

    let err = container.mark_deleted().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ProtocolViolation(_)));
    let err = container.mark_as_changed().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidOperation(_)));
}

#[test]
fn rollback_undeletes_loaded_object() {
    let mut container = loaded_order();
    set(&mut container, "Number", Value::Int(5)).unwrap();
    container.mark_deleted().unwrap();

    container.rollback_state();
    assert_eq!(container.state(), ObjectState::Unchanged);
    assert_eq!(container.value(&prop("Number")), Some(&Value::Int(1)));
}

#[test]
fn sub_transaction_view_starts_unchanged() {
    let mut container = loaded_order();
    set(&mut container, "Number", Value::Int(5)).unwrap();

    let child = container.for_sub_transaction();
    assert_eq!(child.state(), ObjectState::Unchanged);
    assert_eq!(child.value(&prop("Number")), Some(&Value::Int(5)));
    assert_eq!(child.timestamp(), container.timestamp());
    assert!(!child.is_new_in_hierarchy());
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn collection_drops_repeated_ids() {
    let collection = DomainObjectCollection::from_ids([order(1), order(2), order(1)]);
    assert_eq!(collection.to_vec(), vec![order(1), order(2)]);
    assert_eq!(collection.index_of(&order(2)), Some(1));
    assert!(!collection.has_changed());
}

#[test]
fn collection_edits_track_changes() {
    let mut collection = DomainObjectCollection::from_ids([order(1), order(2)]);
    collection.insert(0, order(3)).unwrap();
    assert_eq!(collection.remove(&order(1)), Some(1));
    assert_eq!(collection.replace(1, order(4)).unwrap(), order(2));

    assert_eq!(collection.to_vec(), vec![order(3), order(4)]);
    assert_eq!(collection.original(), vec![order(1), order(2)]);
    assert!(collection.has_changed());

    collection.rollback();
    assert_eq!(collection.to_vec(), vec![order(1), order(2)]);
}

#[test]
fn collection_reorder_is_a_change() {
    let mut collection = DomainObjectCollection::from_ids([order(1), order(2)]);
    collection.set_items(&[order(2), order(1)]).unwrap();
    assert!(collection.has_changed());
    collection.commit();
    assert!(!collection.has_changed());
}

#[test]
fn collection_rejects_duplicates() {
    let mut collection = DomainObjectCollection::from_ids([order(1)]);
    assert!(collection.insert(0, order(1)).is_err());
    assert!(collection.insert(5, order(2)).is_err());
    assert!(collection.set_items(&[order(2), order(2)]).is_err());
    assert!(collection.replace(3, order(2)).is_err());
}
