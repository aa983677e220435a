//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use tangle_foundation::{
    ClassId, Error, ErrorContext, ErrorKind, ObjectId, PropertyName, RelationEndPointId,
    TransactionId, Type,
};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_not_found() {
    let err = Error::not_found(ObjectId::with_int("Order", 9));
    assert!(matches!(err.kind, ErrorKind::NotFound(_)));
    assert!(err.is_missing_object());
    assert!(err.to_string().contains("Order|9"));
}

#[test]
fn error_already_invalid_is_missing_object() {
    let err = Error::already_invalid(ObjectId::with_int("Order", 1));
    assert!(matches!(err.kind, ErrorKind::AlreadyInvalid(_)));
    assert!(err.is_missing_object());
}

#[test]
fn error_type_mismatch() {
    let err = Error::type_mismatch(
        ObjectId::with_int("Order", 1),
        PropertyName::new("Customer"),
        Type::object_ref("Customer"),
        Type::object_ref("Order"),
    );
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    let msg = err.to_string();
    assert!(msg.contains("Order|1.Customer"));
    assert!(msg.contains("ref<Customer>"));
    assert!(msg.contains("ref<Order>"));
    assert!(!err.is_missing_object());
}

#[test]
fn error_kinds_display() {
    let cases = [
        (Error::protocol_violation("perform before begin"), "protocol violation"),
        (Error::concurrency_conflict(ObjectId::with_int("Order", 1)), "concurrency conflict"),
        (Error::invalid_operation("not active"), "invalid operation"),
        (
            Error::reentrant_load(RelationEndPointId::new(ObjectId::with_int("Order", 1), "Customer")),
            "re-entrant load",
        ),
        (Error::unknown_class(ClassId::new("Invoice")), "unknown class"),
        (
            Error::unknown_property(ClassId::new("Order"), PropertyName::new("Total")),
            "unknown property",
        ),
        (Error::cancelled("vetoed"), "cancelled"),
        (Error::storage("disk full"), "storage error"),
        (Error::internal("oops"), "internal error"),
    ];

    for (err, expected) in cases {
        assert!(err.to_string().contains(expected), "{err}");
    }
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn in_transaction_keeps_existing_context() {
    let end_point = RelationEndPointId::new(ObjectId::with_int("Order", 1), "Customer");
    let err = Error::protocol_violation("bad")
        .with_context(ErrorContext::new().with_end_point(&end_point))
        .in_transaction(TransactionId::new(2));

    let context = err.context.expect("context");
    assert_eq!(context.object, Some(ObjectId::with_int("Order", 1)));
    assert_eq!(context.property, Some(PropertyName::new("Customer")));
    assert_eq!(context.transaction, Some(TransactionId::new(2)));
    assert_eq!(context.to_string(), "at Order|1.Customer in txn:2");
}

#[test]
fn in_transaction_without_context() {
    let err = Error::invalid_operation("x").in_transaction(TransactionId::new(5));
    let context = err.context.expect("context");
    assert!(context.object.is_none());
    assert_eq!(context.to_string(), " in txn:5");
}
