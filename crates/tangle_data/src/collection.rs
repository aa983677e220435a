//! Ordered, duplicate-free collections of related objects.

use im::Vector;
use tangle_foundation::{Error, ObjectId, Result};

/// The contents of a collection end point.
///
/// Keeps the current items in order together with a read-only snapshot of
/// the items as of the last load or commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainObjectCollection {
    items: Vector<ObjectId>,
    original: Vector<ObjectId>,
}

impl DomainObjectCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection whose current and original items are `ids`.
    ///
    /// Repeated identities keep their first position.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        let mut items = Vector::new();
        for id in ids {
            if !items.contains(&id) {
                items.push_back(id);
            }
        }
        Self {
            original: items.clone(),
            items,
        }
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the collection has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if the collection holds `id`.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.items.contains(id)
    }

    /// Returns the position of `id`.
    #[must_use]
    pub fn index_of(&self, id: &ObjectId) -> Option<usize> {
        self.items.index_of(id)
    }

    /// Returns the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ObjectId> {
        self.items.get(index)
    }

    /// Iterates over the current items in order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectId> {
        self.items.iter()
    }

    /// Returns the current items.
    #[must_use]
    pub fn to_vec(&self) -> Vec<ObjectId> {
        self.items.iter().cloned().collect()
    }

    /// Returns the items as of the last load or commit.
    #[must_use]
    pub fn original(&self) -> Vec<ObjectId> {
        self.original.iter().cloned().collect()
    }

    /// Inserts `id` at `index`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `id` is already present or `index` is
    /// past the end.
    pub fn insert(&mut self, index: usize, id: ObjectId) -> Result<()> {
        if self.items.contains(&id) {
            return Err(Error::invalid_operation(format!(
                "{id} is already in the collection"
            )));
        }
        if index > self.items.len() {
            return Err(Error::invalid_operation(format!(
                "insert index {index} out of range for length {}",
                self.items.len()
            )));
        }
        self.items.insert(index, id);
        Ok(())
    }

    /// Removes `id`, returning its former position.
    pub fn remove(&mut self, id: &ObjectId) -> Option<usize> {
        let index = self.items.index_of(id)?;
        self.items.remove(index);
        Some(index)
    }

    /// Replaces the item at `index` with `id`, returning the replaced item.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `index` is out of range or `id` is
    /// present at another position.
    pub fn replace(&mut self, index: usize, id: ObjectId) -> Result<ObjectId> {
        if index >= self.items.len() {
            return Err(Error::invalid_operation(format!(
                "replace index {index} out of range for length {}",
                self.items.len()
            )));
        }
        if self
            .items
            .index_of(&id)
            .is_some_and(|existing| existing != index)
        {
            return Err(Error::invalid_operation(format!(
                "{id} is already in the collection"
            )));
        }
        Ok(self.items.set(index, id))
    }

    /// Replaces all items.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `ids` contains duplicates.
    pub fn set_items(&mut self, ids: &[ObjectId]) -> Result<()> {
        check_distinct(ids)?;
        self.items = ids.iter().cloned().collect();
        Ok(())
    }

    /// Copies the current items of `other`, keeping this collection's original.
    pub(crate) fn take_items(&mut self, other: &Self) {
        self.items = other.items.clone();
    }

    /// Returns true if the items or their order differ from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.items != self.original
    }

    /// Accepts the current items as the new original.
    pub fn commit(&mut self) {
        self.original = self.items.clone();
    }

    /// Restores the original items.
    pub fn rollback(&mut self) {
        self.items = self.original.clone();
    }
}

/// Fails with `InvalidOperation` if `ids` repeats an identity.
pub(crate) fn check_distinct(ids: &[ObjectId]) -> Result<()> {
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(Error::invalid_operation(format!(
                "{id} appears more than once"
            )));
        }
    }
    Ok(())
}
