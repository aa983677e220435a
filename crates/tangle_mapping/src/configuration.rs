//! The mapping registry consulted by the data layer.

use std::collections::HashMap;

use tangle_foundation::{ClassId, Error, PropertyName, Result};

use crate::relation::{RelationDefinition, RelationEndPointDefinition};
use crate::schema::{ClassDefinition, PropertyDefinition};

/// Read-only description of classes, properties, and relations.
///
/// Registering a relation adds the foreign-key property of its real side to
/// the owning class, so classes must be registered before their relations.
#[derive(Clone, Debug, Default)]
pub struct MappingConfiguration {
    /// Registered classes by identifier.
    classes: HashMap<ClassId, ClassDefinition>,
    /// Registered relations, in registration order.
    relations: Vec<RelationDefinition>,
    /// Lookup: (class, property) -> (relation index, side index).
    end_points: HashMap<(ClassId, PropertyName), (usize, usize)>,
}

impl MappingConfiguration {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the class is already registered or declares the
    /// same property twice.
    pub fn register_class(&mut self, class: ClassDefinition) -> Result<()> {
        if self.classes.contains_key(&class.id) {
            return Err(Error::invalid_operation(format!(
                "class already registered: {}",
                class.id
            )));
        }
        for (i, property) in class.properties.iter().enumerate() {
            if class.properties[..i].iter().any(|p| p.name == property.name) {
                return Err(Error::invalid_operation(format!(
                    "duplicate property {}.{}",
                    class.id, property.name
                )));
            }
        }
        self.classes.insert(class.id.clone(), class);
        Ok(())
    }

    /// Registers a relation definition.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A class named by the relation is not registered
    /// - A navigable property is already used by another relation or property
    /// - The real side is not scalar or the relation has no real side
    pub fn register_relation(&mut self, relation: RelationDefinition) -> Result<()> {
        let [real, opposite] = &relation.end_points;

        if real.is_virtual || !real.is_scalar() {
            return Err(Error::invalid_operation(format!(
                "relation {} must have a scalar real side",
                relation.id
            )));
        }
        if !opposite.is_virtual {
            return Err(Error::invalid_operation(format!(
                "relation {} has two real sides",
                relation.id
            )));
        }

        for end_point in &relation.end_points {
            let class = self
                .classes
                .get(&end_point.class)
                .ok_or_else(|| Error::unknown_class(end_point.class.clone()))?;
            if let Some(property) = &end_point.property {
                let key = (end_point.class.clone(), property.clone());
                if class.has_property(property) || self.end_points.contains_key(&key) {
                    return Err(Error::invalid_operation(format!(
                        "property {}.{} is already mapped",
                        end_point.class, property
                    )));
                }
            }
        }

        let index = self.relations.len();
        for (side, end_point) in relation.end_points.iter().enumerate() {
            if let Some(property) = &end_point.property {
                self.end_points
                    .insert((end_point.class.clone(), property.clone()), (index, side));
            }
        }

        if let (Some(property), Some(class)) = (&real.property, self.classes.get_mut(&real.class)) {
            class.properties.push(PropertyDefinition::relation(
                property.clone(),
                opposite.class.clone(),
            ));
        }

        self.relations.push(relation);
        Ok(())
    }

    /// Gets a class definition.
    #[must_use]
    pub fn class(&self, id: &ClassId) -> Option<&ClassDefinition> {
        self.classes.get(id)
    }

    /// Gets a class definition or fails with `UnknownClass`.
    ///
    /// # Errors
    ///
    /// Returns an error if the class is not registered.
    pub fn require_class(&self, id: &ClassId) -> Result<&ClassDefinition> {
        self.class(id)
            .ok_or_else(|| Error::unknown_class(id.clone()))
    }

    /// Gets a property definition.
    #[must_use]
    pub fn property(&self, class: &ClassId, property: &PropertyName) -> Option<&PropertyDefinition> {
        self.class(class).and_then(|c| c.property(property))
    }

    /// Gets a property definition or fails with `UnknownProperty`.
    ///
    /// # Errors
    ///
    /// Returns an error if the class or property is not registered.
    pub fn require_property(
        &self,
        class: &ClassId,
        property: &PropertyName,
    ) -> Result<&PropertyDefinition> {
        self.require_class(class)?
            .property(property)
            .ok_or_else(|| Error::unknown_property(class.clone(), property.clone()))
    }

    /// Gets the relation a navigable property belongs to.
    #[must_use]
    pub fn relation(&self, class: &ClassId, property: &PropertyName) -> Option<&RelationDefinition> {
        self.end_points
            .get(&(class.clone(), property.clone()))
            .map(|(index, _)| &self.relations[*index])
    }

    /// Gets the end point definition for a navigable relation property.
    #[must_use]
    pub fn end_point(
        &self,
        class: &ClassId,
        property: &PropertyName,
    ) -> Option<&RelationEndPointDefinition> {
        self.end_points
            .get(&(class.clone(), property.clone()))
            .map(|(index, side)| &self.relations[*index].end_points[*side])
    }

    /// Gets the end point definition or fails with `UnknownProperty`.
    ///
    /// # Errors
    ///
    /// Returns an error if the property is not a relation property.
    pub fn require_end_point(
        &self,
        class: &ClassId,
        property: &PropertyName,
    ) -> Result<&RelationEndPointDefinition> {
        self.end_point(class, property)
            .ok_or_else(|| Error::unknown_property(class.clone(), property.clone()))
    }

    /// Gets the definition of the side opposite to a relation property.
    #[must_use]
    pub fn opposite_end_point(
        &self,
        class: &ClassId,
        property: &PropertyName,
    ) -> Option<&RelationEndPointDefinition> {
        self.end_points
            .get(&(class.clone(), property.clone()))
            .map(|(index, side)| &self.relations[*index].end_points[1 - *side])
    }

    /// Returns every navigable relation end point owned by a class.
    pub fn end_points_of<'a>(
        &'a self,
        class: &'a ClassId,
    ) -> impl Iterator<Item = &'a RelationEndPointDefinition> + 'a {
        self.relations
            .iter()
            .flat_map(|r| r.end_points.iter())
            .filter(move |e| &e.class == class && !e.is_anonymous())
    }

    /// Returns all registered relations.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.relations.iter()
    }

    /// Returns all registered classes.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }
}
