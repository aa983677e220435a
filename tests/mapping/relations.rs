//! Integration tests for relation definitions
//!
//! Tests relation shapes, end point lookups, and registration errors.

use tangle_foundation::{ClassId, ErrorKind, PropertyName, Type};
use tangle_mapping::{
    Cardinality, ClassDefinition, MappingConfiguration, PropertyDefinition, RelationDefinition,
    RelationKind,
};

use crate::sample_mapping;

fn class(name: &str) -> ClassId {
    ClassId::new(name)
}

fn prop(name: &str) -> PropertyName {
    PropertyName::new(name)
}

// =============================================================================
// Relation Shapes
// =============================================================================

#[test]
fn relation_kinds() {
    let mapping = sample_mapping();
    let kinds: Vec<_> = mapping.relations().map(RelationDefinition::kind).collect();
    assert_eq!(
        kinds,
        vec![
            RelationKind::OneToMany,
            RelationKind::OneToOne,
            RelationKind::Unidirectional
        ]
    );
}

#[test]
fn real_side_gets_foreign_key_property() {
    let mapping = sample_mapping();
    let fk = mapping
        .require_property(&class("Order"), &prop("Customer"))
        .unwrap();
    assert!(fk.is_relation);
    assert_eq!(fk.ty, Type::option(Type::object_ref("Customer")));

    // Virtual sides hold no value.
    assert!(mapping.property(&class("Customer"), &prop("Orders")).is_none());
}

// =============================================================================
// End Point Lookups
// =============================================================================

#[test]
fn end_point_definitions() {
    let mapping = sample_mapping();

    let real = mapping.end_point(&class("Order"), &prop("Customer")).unwrap();
    assert!(!real.is_virtual);
    assert!(real.is_scalar());

    let orders = mapping.end_point(&class("Customer"), &prop("Orders")).unwrap();
    assert!(orders.is_virtual);
    assert_eq!(orders.cardinality, Cardinality::Many);

    let ticket = mapping.end_point(&class("Order"), &prop("OrderTicket")).unwrap();
    assert!(ticket.is_virtual);
    assert!(ticket.is_scalar());
}

#[test]
fn opposite_end_points() {
    let mapping = sample_mapping();

    let opposite = mapping
        .opposite_end_point(&class("Order"), &prop("Customer"))
        .unwrap();
    assert_eq!(opposite.class, class("Customer"));
    assert_eq!(opposite.property, Some(prop("Orders")));

    let anonymous = mapping
        .opposite_end_point(&class("Location"), &prop("Client"))
        .unwrap();
    assert!(anonymous.is_anonymous());
    assert_eq!(anonymous.class, class("Customer"));
}

#[test]
fn anonymous_sides_are_not_navigable() {
    let mapping = sample_mapping();
    let customer = class("Customer");
    let properties: Vec<_> = mapping
        .end_points_of(&customer)
        .filter_map(|e| e.property.clone())
        .collect();
    assert_eq!(properties, vec![prop("Orders")]);
}

#[test]
fn require_end_point_rejects_plain_property() {
    let mapping = sample_mapping();
    let err = mapping
        .require_end_point(&class("Order"), &prop("Number"))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownProperty { .. }));
}

// =============================================================================
// Registration Errors
// =============================================================================

#[test]
fn relation_with_unknown_class_is_rejected() {
    let mut mapping = MappingConfiguration::new();
    mapping.register_class(ClassDefinition::new("Order")).unwrap();
    let err = mapping
        .register_relation(RelationDefinition::one_to_many(
            "Order:Customer->Customer:Orders",
            ("Order", "Customer"),
            ("Customer", "Orders"),
        ))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownClass(_)));
}

#[test]
fn relation_property_clash_is_rejected() {
    let mut mapping = MappingConfiguration::new();
    mapping
        .register_class(
            ClassDefinition::new("Order")
                .with_property(PropertyDefinition::persistent("Customer", Type::Int)),
        )
        .unwrap();
    mapping.register_class(ClassDefinition::new("Customer")).unwrap();
    let err = mapping
        .register_relation(RelationDefinition::one_to_many(
            "Order:Customer->Customer:Orders",
            ("Order", "Customer"),
            ("Customer", "Orders"),
        ))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidOperation(_)));
}
