//! Relation end points.
//!
//! An end point is one side of one relation instance, addressed by
//! `(object, property)`. The variants share one capability set:
//!
//! | Variant | Cardinality | Storage | Loading |
//! |---------|-------------|---------|---------|
//! | `Real` | one | owning container's foreign key | with the container |
//! | `VirtualObject` | one | derived from the opposite real side | lazy |
//! | `Collection` | many | derived from the opposite real sides | lazy |
//! | `Null` | either | none | never |
//!
//! Command factories snapshot the end point's current contents into a
//! [`RelationCommand`]; they never mutate the end point.

mod collection;
mod real;
mod virtual_object;

pub use collection::CollectionEndPoint;
pub use real::RealEndPoint;
pub use virtual_object::VirtualObjectEndPoint;

use tangle_foundation::{Error, ErrorContext, ObjectId, RelationEndPointId, Result};
use tangle_mapping::RelationEndPointDefinition;

use crate::collection::{DomainObjectCollection, check_distinct};
use crate::command::RelationCommand;

// =============================================================================
// Load State
// =============================================================================

/// Lazy-load progress of a virtual end point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Contents have not been requested.
    #[default]
    NotLoadedYet,
    /// A load is in progress; re-entrant requests are rejected.
    Loading,
    /// Contents are available.
    Complete,
}

// =============================================================================
// Null End Point
// =============================================================================

/// Stand-in for the end point of an absent object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NullEndPoint {
    definition: RelationEndPointDefinition,
    opposite: RelationEndPointDefinition,
}

// =============================================================================
// Relation End Point
// =============================================================================

/// One side of one relation instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationEndPoint {
    /// Scalar side holding the foreign key.
    Real(RealEndPoint),
    /// Derived scalar side.
    VirtualObject(VirtualObjectEndPoint),
    /// Derived collection side.
    Collection(CollectionEndPoint),
    /// Side of an absent object.
    Null(NullEndPoint),
}

impl RelationEndPoint {
    /// Creates the null end point for a relation side.
    #[must_use]
    pub fn null(
        definition: RelationEndPointDefinition,
        opposite: RelationEndPointDefinition,
    ) -> Self {
        Self::Null(NullEndPoint {
            definition,
            opposite,
        })
    }

    /// Creates an unloaded virtual end point of the right cardinality.
    #[must_use]
    pub fn unloaded(
        id: RelationEndPointId,
        definition: RelationEndPointDefinition,
        opposite: RelationEndPointDefinition,
    ) -> Self {
        if definition.is_scalar() {
            Self::VirtualObject(VirtualObjectEndPoint::unloaded(id, definition, opposite))
        } else {
            Self::Collection(CollectionEndPoint::unloaded(id, definition, opposite))
        }
    }

    /// Creates the empty, complete virtual end point of a new object.
    #[must_use]
    pub fn empty(
        id: RelationEndPointId,
        definition: RelationEndPointDefinition,
        opposite: RelationEndPointDefinition,
    ) -> Self {
        if definition.is_scalar() {
            Self::VirtualObject(VirtualObjectEndPoint::empty(id, definition, opposite))
        } else {
            Self::Collection(CollectionEndPoint::empty(id, definition, opposite))
        }
    }

    /// Returns the end point identity, or `None` for a null end point.
    #[must_use]
    pub fn id(&self) -> Option<&RelationEndPointId> {
        match self {
            Self::Real(e) => Some(&e.id),
            Self::VirtualObject(e) => Some(&e.id),
            Self::Collection(e) => Some(&e.id),
            Self::Null(_) => None,
        }
    }

    /// Returns the definition of this side.
    #[must_use]
    pub fn definition(&self) -> &RelationEndPointDefinition {
        match self {
            Self::Real(e) => &e.definition,
            Self::VirtualObject(e) => &e.definition,
            Self::Collection(e) => &e.definition,
            Self::Null(e) => &e.definition,
        }
    }

    /// Returns the definition of the opposite side.
    #[must_use]
    pub fn opposite_definition(&self) -> &RelationEndPointDefinition {
        match self {
            Self::Real(e) => &e.opposite,
            Self::VirtualObject(e) => &e.opposite,
            Self::Collection(e) => &e.opposite,
            Self::Null(e) => &e.opposite,
        }
    }

    /// Returns true for the null end point.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Returns true if this side holds a single related object.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.definition().is_scalar()
    }

    /// Returns the lazy-load progress. Real and null end points are always complete.
    #[must_use]
    pub fn load_state(&self) -> LoadState {
        match self {
            Self::VirtualObject(e) => e.load_state,
            Self::Collection(e) => e.load_state,
            Self::Real(_) | Self::Null(_) => LoadState::Complete,
        }
    }

    /// Returns true if the contents are available.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.load_state() == LoadState::Complete
    }

    // -------------------------------------------------------------------------
    // Contents
    // -------------------------------------------------------------------------

    /// Returns the related object of a scalar end point.
    #[must_use]
    pub fn related_object(&self) -> Option<&ObjectId> {
        match self {
            Self::Real(e) => e.related(),
            Self::VirtualObject(e) => e.related(),
            Self::Collection(_) | Self::Null(_) => None,
        }
    }

    /// Returns the original related object of a scalar end point.
    #[must_use]
    pub fn original_related_object(&self) -> Option<&ObjectId> {
        match self {
            Self::Real(e) => e.original_related(),
            Self::VirtualObject(e) => e.original_related(),
            Self::Collection(_) | Self::Null(_) => None,
        }
    }

    /// Returns the collection contents of a collection end point.
    #[must_use]
    pub fn collection(&self) -> Option<&DomainObjectCollection> {
        match self {
            Self::Collection(e) => Some(e.collection()),
            _ => None,
        }
    }

    /// Returns every related object, in order.
    #[must_use]
    pub fn related_objects(&self) -> Vec<ObjectId> {
        match self {
            Self::Collection(e) => e.collection.to_vec(),
            _ => self.related_object().cloned().into_iter().collect(),
        }
    }

    /// Returns every related object as of the last load or commit.
    #[must_use]
    pub fn original_related_objects(&self) -> Vec<ObjectId> {
        match self {
            Self::Collection(e) => e.collection.original(),
            _ => self.original_related_object().cloned().into_iter().collect(),
        }
    }

    /// Returns true if the end point refers to `object`.
    #[must_use]
    pub fn refers_to(&self, object: &ObjectId) -> bool {
        match self {
            Self::Collection(e) => e.collection.contains(object),
            _ => self.related_object() == Some(object),
        }
    }

    // -------------------------------------------------------------------------
    // Change Tracking
    // -------------------------------------------------------------------------

    /// Marks the end point as accessed.
    pub fn touch(&mut self) {
        match self {
            Self::Real(e) => e.touched = true,
            Self::VirtualObject(e) => e.touched = true,
            Self::Collection(e) => e.touched = true,
            Self::Null(_) => {}
        }
    }

    /// Returns true if the end point was accessed or targeted by a command.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        match self {
            Self::Real(e) => e.touched,
            Self::VirtualObject(e) => e.touched,
            Self::Collection(e) => e.touched,
            Self::Null(_) => false,
        }
    }

    /// Returns true if the contents differ from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        match self {
            Self::Real(e) => e.current != e.original,
            Self::VirtualObject(e) => e.current != e.original,
            Self::Collection(e) => e.collection.has_changed(),
            Self::Null(_) => false,
        }
    }

    /// Accepts the current contents as original and clears the touched flag.
    pub fn commit(&mut self) {
        match self {
            Self::Real(e) => {
                e.original.clone_from(&e.current);
                e.touched = false;
            }
            Self::VirtualObject(e) => {
                e.original.clone_from(&e.current);
                e.touched = false;
            }
            Self::Collection(e) => {
                e.collection.commit();
                e.touched = false;
            }
            Self::Null(_) => {}
        }
    }

    /// Restores the original contents and clears the touched flag.
    pub fn rollback(&mut self) {
        match self {
            Self::Real(e) => {
                e.current.clone_from(&e.original);
                e.touched = false;
            }
            Self::VirtualObject(e) => {
                e.current.clone_from(&e.original);
                e.touched = false;
            }
            Self::Collection(e) => {
                e.collection.rollback();
                e.touched = false;
            }
            Self::Null(_) => {}
        }
    }

    // -------------------------------------------------------------------------
    // Lazy Loading
    // -------------------------------------------------------------------------

    /// Moves a virtual end point into `Loading`.
    ///
    /// # Errors
    ///
    /// Returns `ReentrantLoad` if a load is already in progress.
    pub fn begin_load(&mut self) -> Result<()> {
        let (id, state) = match self {
            Self::VirtualObject(e) => (&e.id, &mut e.load_state),
            Self::Collection(e) => (&e.id, &mut e.load_state),
            Self::Real(_) | Self::Null(_) => return Ok(()),
        };
        match state {
            LoadState::Loading => Err(Error::reentrant_load(id.clone())),
            LoadState::NotLoadedYet => {
                *state = LoadState::Loading;
                Ok(())
            }
            LoadState::Complete => Ok(()),
        }
    }

    /// Stores loaded contents and marks the end point complete.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a scalar end point receives more than one object.
    pub fn complete_load(&mut self, related: Vec<ObjectId>) -> Result<()> {
        match self {
            Self::VirtualObject(e) => {
                if related.len() > 1 {
                    e.load_state = LoadState::NotLoadedYet;
                    return Err(Error::internal(format!(
                        "{} objects refer to scalar end point {}",
                        related.len(),
                        e.id
                    )));
                }
                let related = related.into_iter().next();
                e.current.clone_from(&related);
                e.original = related;
                e.load_state = LoadState::Complete;
            }
            Self::Collection(e) => {
                e.collection = DomainObjectCollection::from_ids(related);
                e.load_state = LoadState::Complete;
            }
            Self::Real(_) | Self::Null(_) => {}
        }
        Ok(())
    }

    /// Returns a failed load to `NotLoadedYet`.
    pub fn reset_load(&mut self) {
        match self {
            Self::VirtualObject(e) => e.load_state = LoadState::NotLoadedYet,
            Self::Collection(e) => e.load_state = LoadState::NotLoadedYet,
            Self::Real(_) | Self::Null(_) => {}
        }
    }

    /// Takes over the current contents of a sub-transaction's copy.
    pub(crate) fn absorb(&mut self, child: &Self) {
        match (&mut *self, child) {
            (Self::Real(e), Self::Real(c)) => e.current.clone_from(&c.current),
            (Self::VirtualObject(e), Self::VirtualObject(c)) => e.current.clone_from(&c.current),
            (Self::Collection(e), Self::Collection(c)) => e.collection.take_items(&c.collection),
            _ => {}
        }
        if child.has_been_touched() {
            self.touch();
        }
    }

    // -------------------------------------------------------------------------
    // Command Factories
    // -------------------------------------------------------------------------

    /// Creates a command assigning a new related object to a scalar end point.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for null, collection, or unloaded end points.
    pub fn create_set_command(&self, new: Option<ObjectId>) -> Result<RelationCommand> {
        let (id, old) = match self {
            Self::Real(e) => (&e.id, e.current.clone()),
            Self::VirtualObject(e) => {
                self.ensure_complete()?;
                (&e.id, e.current.clone())
            }
            Self::Collection(_) => return Err(self.cardinality_violation("set")),
            Self::Null(_) => return Err(self.null_violation("set")),
        };
        Ok(RelationCommand::SetObject {
            end_point: id.clone(),
            old,
            new,
        })
    }

    /// Creates a command removing `item` from a collection end point.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for non-collection end points and
    /// `InvalidOperation` if `item` is not in the collection.
    pub fn create_remove_command(&self, item: ObjectId) -> Result<RelationCommand> {
        let e = self.as_collection("remove")?;
        if !e.collection.contains(&item) {
            return Err(Error::invalid_operation(format!(
                "{item} is not in the collection"
            ))
            .with_context(ErrorContext::new().with_end_point(&e.id)));
        }
        Ok(RelationCommand::Remove {
            end_point: e.id.clone(),
            item,
        })
    }

    /// Creates a command inserting `item` into a collection end point.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for non-collection end points and
    /// `InvalidOperation` if `item` is already present or `index` is past the end.
    pub fn create_insert_command(&self, index: usize, item: ObjectId) -> Result<RelationCommand> {
        let e = self.as_collection("insert")?;
        if e.collection.contains(&item) {
            return Err(Error::invalid_operation(format!(
                "{item} is already in the collection"
            ))
            .with_context(ErrorContext::new().with_end_point(&e.id)));
        }
        if index > e.collection.len() {
            return Err(Error::invalid_operation(format!(
                "insert index {index} out of range for length {}",
                e.collection.len()
            ))
            .with_context(ErrorContext::new().with_end_point(&e.id)));
        }
        Ok(RelationCommand::Insert {
            end_point: e.id.clone(),
            index,
            item,
        })
    }

    /// Creates a command replacing the item at `index` of a collection end point.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for non-collection end points and
    /// `InvalidOperation` if `index` is out of range or `new` is already
    /// present at another position.
    pub fn create_replace_command(&self, index: usize, new: ObjectId) -> Result<RelationCommand> {
        let e = self.as_collection("replace")?;
        let Some(old) = e.collection.get(index).cloned() else {
            return Err(Error::invalid_operation(format!(
                "replace index {index} out of range for length {}",
                e.collection.len()
            ))
            .with_context(ErrorContext::new().with_end_point(&e.id)));
        };
        if old != new && e.collection.contains(&new) {
            return Err(Error::invalid_operation(format!(
                "{new} is already in the collection"
            ))
            .with_context(ErrorContext::new().with_end_point(&e.id)));
        }
        Ok(RelationCommand::Replace {
            end_point: e.id.clone(),
            index,
            old,
            new,
        })
    }

    /// Creates a command replacing all items of a collection end point.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for non-collection end points and
    /// `InvalidOperation` if `items` contains duplicates.
    pub fn create_set_collection_command(&self, items: Vec<ObjectId>) -> Result<RelationCommand> {
        let e = self.as_collection("set")?;
        check_distinct(&items)
            .map_err(|err| err.with_context(ErrorContext::new().with_end_point(&e.id)))?;
        Ok(RelationCommand::SetCollection {
            end_point: e.id.clone(),
            old: e.collection.to_vec(),
            new: items,
        })
    }

    /// Creates a command that only touches the end point.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for a null end point.
    pub fn create_touch_command(&self) -> Result<RelationCommand> {
        let id = self.id().ok_or_else(|| self.null_violation("touch"))?;
        Ok(RelationCommand::Touch {
            end_point: id.clone(),
        })
    }

    fn as_collection(&self, operation: &str) -> Result<&CollectionEndPoint> {
        match self {
            Self::Collection(e) => {
                self.ensure_complete()?;
                Ok(e)
            }
            Self::Null(_) => Err(self.null_violation(operation)),
            Self::Real(_) | Self::VirtualObject(_) => Err(self.cardinality_violation(operation)),
        }
    }

    fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        let mut err = Error::protocol_violation("end point is not loaded");
        if let Some(id) = self.id() {
            err = err.with_context(ErrorContext::new().with_end_point(id));
        }
        Err(err)
    }

    fn null_violation(&self, operation: &str) -> Error {
        Error::protocol_violation(format!(
            "cannot {operation} on the null end point of {}",
            self.definition().class
        ))
    }

    fn cardinality_violation(&self, operation: &str) -> Error {
        let shape = if self.is_scalar() { "scalar" } else { "collection" };
        let mut err = Error::protocol_violation(format!(
            "{operation} is not supported by a {shape} end point"
        ));
        if let Some(id) = self.id() {
            err = err.with_context(ErrorContext::new().with_end_point(id));
        }
        err
    }
}
