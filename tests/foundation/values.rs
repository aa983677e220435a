//! Integration tests for Value and Type
//!
//! Tests value construction, accessors, conversions, and type acceptance.

use tangle_foundation::{ObjectId, Type, Value};

// =============================================================================
// Value Construction
// =============================================================================

#[test]
fn value_from_primitives() {
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from(7_i64), Value::Int(7));
    assert_eq!(Value::from(1.5), Value::Float(1.5));
    assert_eq!(Value::from("Ada"), Value::string("Ada"));
    assert_eq!(Value::from(String::from("Ada")), Value::string("Ada"));
}

#[test]
fn value_from_optional_object() {
    let customer = ObjectId::with_int("Customer", 1);
    assert_eq!(
        Value::from(Some(customer.clone())),
        Value::ObjectRef(customer.clone())
    );
    assert_eq!(Value::from(None::<ObjectId>), Value::Nil);
    assert_eq!(Value::from_object(Some(customer.clone())).as_object(), Some(&customer));
}

// =============================================================================
// Value Accessors
// =============================================================================

#[test]
fn value_accessors() {
    assert_eq!(Value::Int(3).as_int(), Some(3));
    assert_eq!(Value::Float(2.0).as_float(), Some(2.0));
    assert_eq!(Value::Bool(false).as_bool(), Some(false));
    assert_eq!(Value::string("x").as_str(), Some("x"));
    assert!(Value::Nil.is_nil());
    assert_eq!(Value::Int(3).as_str(), None);
}

#[test]
fn value_display() {
    assert_eq!(Value::Nil.to_string(), "nil");
    assert_eq!(Value::Int(12).to_string(), "12");
    assert_eq!(Value::string("Ada").to_string(), "Ada");
    assert_eq!(
        Value::ObjectRef(ObjectId::with_int("Order", 1)).to_string(),
        "Order|1"
    );
}

#[test]
fn float_values_compare_by_bits() {
    assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    assert_ne!(Value::Int(1), Value::Float(1.0));
}

// =============================================================================
// Type Acceptance
// =============================================================================

#[test]
fn value_types() {
    assert_eq!(Value::Nil.value_type(), Type::Nil);
    assert_eq!(Value::Int(1).value_type(), Type::Int);
    assert_eq!(
        Value::ObjectRef(ObjectId::with_int("Order", 1)).value_type(),
        Type::object_ref("Order")
    );
}

#[test]
fn type_accepts_matching_values() {
    assert!(Type::Int.accepts(&Type::Int));
    assert!(Type::Float.accepts(&Type::Int));
    assert!(!Type::Int.accepts(&Type::Float));
    assert!(Type::Any.accepts(&Type::String));
    assert!(!Type::String.accepts(&Type::Nil));
}

#[test]
fn option_type_accepts_nil() {
    let customer = Type::option(Type::object_ref("Customer"));
    assert!(customer.is_nullable());
    assert!(customer.accepts(&Type::Nil));
    assert!(customer.accepts(&Type::object_ref("Customer")));
    assert!(!customer.accepts(&Type::object_ref("Order")));
}
