//! The relation command protocol.
//!
//! Every relation edit is a [`RelationCommand`] aimed at one end point.
//! Expanding it yields a [`CompositeCommand`] holding the full closure of
//! commands needed to keep both sides of every affected relation symmetric.
//! A composite runs in three passes:
//!
//! 1. `begin` on every command, raising the `changing` notifications. Any
//!    error vetoes the whole closure before state is touched.
//! 2. `perform` on every command, mutating end points and containers.
//! 3. `end` on every command, raising the `changed` notifications.
//!
//! All three passes visit the commands in the same order.

mod composite;
mod expand;

pub use composite::CompositeCommand;
pub(crate) use expand::expand_delete;

use tangle_foundation::{Error, ErrorContext, ObjectId, RelationEndPointId, Result, TransactionId};

use crate::collection::DomainObjectCollection;
use crate::data_manager::DataManager;
use crate::end_point::RelationEndPoint;
use crate::listener::TransactionListener;

/// One atomic step of a relation edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationCommand {
    /// Assigns the related object of a scalar end point.
    SetObject {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Related object before the command.
        old: Option<ObjectId>,
        /// Related object after the command.
        new: Option<ObjectId>,
    },
    /// Inserts an item into a collection end point. Positions past the end append.
    Insert {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Insert position.
        index: usize,
        /// Inserted object.
        item: ObjectId,
    },
    /// Removes an item from a collection end point.
    Remove {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Removed object.
        item: ObjectId,
    },
    /// Replaces one item of a collection end point in place.
    Replace {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Position of the replaced item when the command was created.
        index: usize,
        /// Replaced object.
        old: ObjectId,
        /// Replacement object.
        new: ObjectId,
    },
    /// Replaces all items of a collection end point.
    SetCollection {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Items before the command.
        old: Vec<ObjectId>,
        /// Items after the command.
        new: Vec<ObjectId>,
    },
    /// Touches an end point without changing it.
    Touch {
        /// Target end point.
        end_point: RelationEndPointId,
    },
    /// Marks an object as deleted; the last step of a deletion closure.
    MarkDeleted {
        /// Deleted object.
        object: ObjectId,
    },
}

impl RelationCommand {
    /// Returns the targeted end point, or `None` for a deletion step.
    #[must_use]
    pub fn end_point(&self) -> Option<&RelationEndPointId> {
        match self {
            Self::SetObject { end_point, .. }
            | Self::Insert { end_point, .. }
            | Self::Remove { end_point, .. }
            | Self::Replace { end_point, .. }
            | Self::SetCollection { end_point, .. }
            | Self::Touch { end_point } => Some(end_point),
            Self::MarkDeleted { .. } => None,
        }
    }

    /// Returns the object whose state the command changes.
    #[must_use]
    pub fn object(&self) -> &ObjectId {
        match self {
            Self::SetObject { end_point, .. }
            | Self::Insert { end_point, .. }
            | Self::Remove { end_point, .. }
            | Self::Replace { end_point, .. }
            | Self::SetCollection { end_point, .. }
            | Self::Touch { end_point } => &end_point.object,
            Self::MarkDeleted { object } => object,
        }
    }

    /// Returns the short name of the command kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetObject { .. } => "set",
            Self::Insert { .. } => "insert",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::SetCollection { .. } => "set-collection",
            Self::Touch { .. } => "touch",
            Self::MarkDeleted { .. } => "mark-deleted",
        }
    }

    /// Returns the `(old, new)` pairs announced by this command, one per
    /// affected related object.
    #[must_use]
    pub fn changes(&self) -> Vec<(Option<&ObjectId>, Option<&ObjectId>)> {
        match self {
            Self::SetObject { old, new, .. } => vec![(old.as_ref(), new.as_ref())],
            Self::Insert { item, .. } => vec![(None, Some(item))],
            Self::Remove { item, .. } => vec![(Some(item), None)],
            Self::Replace { old, new, .. } => vec![(Some(old), Some(new))],
            Self::SetCollection { old, new, .. } => {
                let removed = old
                    .iter()
                    .filter(|id| !new.contains(id))
                    .map(|id| (Some(id), None));
                let added = new
                    .iter()
                    .filter(|id| !old.contains(id))
                    .map(|id| (None, Some(id)));
                removed.chain(added).collect()
            }
            Self::Touch { .. } | Self::MarkDeleted { .. } => Vec::new(),
        }
    }

    /// Raises the `changing` notifications. Does not modify any state.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by the listener.
    pub fn begin(&self, tx: TransactionId, listener: &mut dyn TransactionListener) -> Result<()> {
        if let Self::MarkDeleted { object } = self {
            return listener.object_deleting(tx, object);
        }
        let Some(end_point) = self.end_point() else {
            return Ok(());
        };
        for (old, new) in self.changes() {
            listener.relation_changing(tx, &end_point.object, &end_point.property, old, new)?;
        }
        Ok(())
    }

    /// Applies the command to the data manager and touches the target end point.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the target end point is not loaded or has the
    /// wrong shape, and propagates collection and container errors.
    pub fn perform(&self, data: &mut DataManager) -> Result<()> {
        match self {
            Self::SetObject { end_point, new, .. } => data.write_related(end_point, new.clone()),
            Self::Insert {
                end_point,
                index,
                item,
            } => {
                let collection = collection_of(data.end_point_mut(end_point)?, end_point)?;
                let index = (*index).min(collection.len());
                collection.insert(index, item.clone())
            }
            Self::Remove { end_point, item } => {
                let collection = collection_of(data.end_point_mut(end_point)?, end_point)?;
                collection.remove(item).map(|_| ()).ok_or_else(|| {
                    Error::internal(format!("{item} missing from {end_point}"))
                })
            }
            Self::Replace {
                end_point,
                old,
                new,
                ..
            } => {
                let collection = collection_of(data.end_point_mut(end_point)?, end_point)?;
                let index = collection.index_of(old).ok_or_else(|| {
                    Error::internal(format!("{old} missing from {end_point}"))
                })?;
                collection.replace(index, new.clone()).map(|_| ())
            }
            Self::SetCollection { end_point, new, .. } => {
                let collection = collection_of(data.end_point_mut(end_point)?, end_point)?;
                collection.set_items(new)
            }
            Self::Touch { end_point } => {
                data.end_point_mut(end_point)?.touch();
                Ok(())
            }
            Self::MarkDeleted { object } => data.container_mut(object)?.mark_deleted(),
        }
    }

    /// Raises the `changed` notifications.
    pub fn end(&self, tx: TransactionId, listener: &mut dyn TransactionListener) {
        if let Self::MarkDeleted { object } = self {
            listener.object_deleted(tx, object);
            return;
        }
        let Some(end_point) = self.end_point() else {
            return;
        };
        for (old, new) in self.changes() {
            listener.relation_changed(tx, &end_point.object, &end_point.property, old, new);
        }
    }
}

fn collection_of<'a>(
    end_point: &'a mut RelationEndPoint,
    id: &RelationEndPointId,
) -> Result<&'a mut DomainObjectCollection> {
    match end_point {
        RelationEndPoint::Collection(e) => Ok(e.collection_mut()),
        _ => Err(Error::internal("collection command aimed at a scalar end point")
            .with_context(ErrorContext::new().with_end_point(id))),
    }
}
