//! Schema definitions for classes and their properties.

use tangle_foundation::{ClassId, PropertyName, Type, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Schema definition for a mapped class.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassDefinition {
    /// Class identifier (e.g., `Order`).
    pub id: ClassId,
    /// Property definitions, in declaration order.
    pub properties: Vec<PropertyDefinition>,
}

impl ClassDefinition {
    /// Creates a class definition with no properties.
    #[must_use]
    pub fn new(id: impl Into<ClassId>) -> Self {
        Self {
            id: id.into(),
            properties: Vec::new(),
        }
    }

    /// Adds a property to the class.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    /// Returns the property definition by name.
    #[must_use]
    pub fn property(&self, name: &PropertyName) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| &p.name == name)
    }

    /// Returns true if the class declares the property.
    #[must_use]
    pub fn has_property(&self, name: &PropertyName) -> bool {
        self.property(name).is_some()
    }
}

/// Schema definition for a class property.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PropertyDefinition {
    /// Property name.
    pub name: PropertyName,
    /// Declared type.
    pub ty: Type,
    /// Whether the value is written to the store or lives only in the transaction.
    pub storage: StorageClass,
    /// Value assigned to new objects. `None` means nil.
    pub default: Option<Value>,
    /// True if this property holds the foreign key of a real relation end point.
    pub is_relation: bool,
}

impl PropertyDefinition {
    /// Creates a persistent property.
    #[must_use]
    pub fn persistent(name: impl Into<PropertyName>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            storage: StorageClass::Persistent,
            default: None,
            is_relation: false,
        }
    }

    /// Creates a transaction-local property that is never persisted.
    #[must_use]
    pub fn transaction_local(name: impl Into<PropertyName>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            storage: StorageClass::Transaction,
            default: None,
            is_relation: false,
        }
    }

    /// Creates the foreign-key property backing a real relation end point.
    #[must_use]
    pub fn relation(name: impl Into<PropertyName>, target: ClassId) -> Self {
        Self {
            name: name.into(),
            ty: Type::option(Type::ObjectRef(target)),
            storage: StorageClass::Persistent,
            default: None,
            is_relation: true,
        }
    }

    /// Sets the default value for new objects.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Returns the value a new object starts with.
    #[must_use]
    pub fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Nil)
    }

    /// Returns true if the property is written to the store.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.storage == StorageClass::Persistent
    }
}

/// Where a property value lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StorageClass {
    /// Persisted by the store on root commit.
    Persistent,
    /// Kept only in the transaction; committed locally but never persisted.
    Transaction,
}
