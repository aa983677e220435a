//! Relation definitions.
//!
//! A relation is a pair of end point definitions. The real side stores the
//! foreign key; the virtual side is derived from it. Unidirectional relations
//! have an anonymous opposite side that can never be navigated.

use tangle_foundation::{ClassId, PropertyName};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How many objects an end point can reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Cardinality {
    /// At most one related object.
    One,
    /// An ordered collection of related objects.
    Many,
}

/// The shape of a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RelationKind {
    /// Scalar on both sides.
    OneToOne,
    /// Scalar real side, collection virtual side.
    OneToMany,
    /// Scalar real side, anonymous opposite side.
    Unidirectional,
}

/// One side of a relation definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationEndPointDefinition {
    /// The class owning this side.
    pub class: ClassId,
    /// The navigable property, or `None` for an anonymous side.
    pub property: Option<PropertyName>,
    /// Scalar or collection.
    pub cardinality: Cardinality,
    /// True if this side is derived rather than stored.
    pub is_virtual: bool,
}

impl RelationEndPointDefinition {
    /// Creates the foreign-key holding side.
    #[must_use]
    pub fn real(class: impl Into<ClassId>, property: impl Into<PropertyName>) -> Self {
        Self {
            class: class.into(),
            property: Some(property.into()),
            cardinality: Cardinality::One,
            is_virtual: false,
        }
    }

    /// Creates a derived side.
    #[must_use]
    pub fn virtual_end_point(
        class: impl Into<ClassId>,
        property: impl Into<PropertyName>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            class: class.into(),
            property: Some(property.into()),
            cardinality,
            is_virtual: true,
        }
    }

    /// Creates an anonymous side that has no back-reference.
    #[must_use]
    pub fn anonymous(class: impl Into<ClassId>) -> Self {
        Self {
            class: class.into(),
            property: None,
            cardinality: Cardinality::Many,
            is_virtual: true,
        }
    }

    /// Returns true if this side has no navigable property.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.property.is_none()
    }

    /// Returns true if this side holds a single related object.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.cardinality == Cardinality::One
    }
}

/// Schema definition for a relation between two classes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationDefinition {
    /// Relation name (e.g., `Order:Customer->Customer:Orders`).
    pub id: String,
    /// The two sides. Index 0 is always the real side.
    pub end_points: [RelationEndPointDefinition; 2],
}

impl RelationDefinition {
    /// Creates a one-to-many relation.
    ///
    /// `real` is the scalar foreign-key side (e.g. `Order.Customer`);
    /// `collection` is the derived collection side (e.g. `Customer.Orders`).
    #[must_use]
    pub fn one_to_many(
        id: impl Into<String>,
        real: (&str, &str),
        collection: (&str, &str),
    ) -> Self {
        Self {
            id: id.into(),
            end_points: [
                RelationEndPointDefinition::real(real.0, real.1),
                RelationEndPointDefinition::virtual_end_point(
                    collection.0,
                    collection.1,
                    Cardinality::Many,
                ),
            ],
        }
    }

    /// Creates a one-to-one relation.
    ///
    /// `real` holds the foreign key; `virtual_side` is derived from it.
    #[must_use]
    pub fn one_to_one(
        id: impl Into<String>,
        real: (&str, &str),
        virtual_side: (&str, &str),
    ) -> Self {
        Self {
            id: id.into(),
            end_points: [
                RelationEndPointDefinition::real(real.0, real.1),
                RelationEndPointDefinition::virtual_end_point(
                    virtual_side.0,
                    virtual_side.1,
                    Cardinality::One,
                ),
            ],
        }
    }

    /// Creates a unidirectional relation from `real` to `target` class.
    #[must_use]
    pub fn unidirectional(id: impl Into<String>, real: (&str, &str), target: &str) -> Self {
        Self {
            id: id.into(),
            end_points: [
                RelationEndPointDefinition::real(real.0, real.1),
                RelationEndPointDefinition::anonymous(target),
            ],
        }
    }

    /// Returns the shape of the relation.
    #[must_use]
    pub fn kind(&self) -> RelationKind {
        let opposite = &self.end_points[1];
        if opposite.is_anonymous() {
            RelationKind::Unidirectional
        } else if opposite.is_scalar() {
            RelationKind::OneToOne
        } else {
            RelationKind::OneToMany
        }
    }

    /// Returns the foreign-key holding side.
    #[must_use]
    pub fn real_end_point(&self) -> &RelationEndPointDefinition {
        &self.end_points[0]
    }

    /// Returns the side opposite to the given class/property pair.
    #[must_use]
    pub fn opposite_of(
        &self,
        class: &ClassId,
        property: &PropertyName,
    ) -> Option<&RelationEndPointDefinition> {
        let [a, b] = &self.end_points;
        if &a.class == class && a.property.as_ref() == Some(property) {
            Some(b)
        } else if &b.class == class && b.property.as_ref() == Some(property) {
            Some(a)
        } else {
            None
        }
    }
}
