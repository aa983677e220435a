//! Expansion of single commands into symmetric closures.
//!
//! Every end point a closure will touch is loaded during expansion, so the
//! perform pass never needs to load anything.

use tangle_foundation::{Error, ErrorContext, ObjectId, RelationEndPointId, Result};
use tangle_mapping::RelationEndPointDefinition;
use tracing::trace;

use super::{CompositeCommand, RelationCommand};
use crate::data_manager::{DataContext, DataManager};
use crate::end_point::RelationEndPoint;

impl RelationCommand {
    /// Computes the full ordered closure of commands for this edit.
    ///
    /// For a scalar assignment `old -> new` the closure is:
    /// 1. disconnect `old`'s opposite end point,
    /// 2. connect `new`'s opposite end point,
    /// 3. clear the object `new`'s scalar opposite pointed to before,
    /// 4. the command itself.
    ///
    /// Collection commands clear or reconnect the opposite scalar of every
    /// item they add or drop. Steps aimed at absent objects are omitted, and
    /// a command that would not change anything becomes a single `Touch`.
    ///
    /// # Errors
    ///
    /// Propagates loading errors and rejects edits that involve deleted objects.
    pub fn expand_to_all_related_objects(
        self,
        data: &mut DataManager,
        ctx: &mut DataContext<'_>,
    ) -> Result<CompositeCommand> {
        let steps = match &self {
            Self::SetObject {
                end_point,
                old,
                new,
            } => expand_set(&self, end_point, old.as_ref(), new.as_ref(), data, ctx)?,
            Self::Remove { end_point, item } => expand_remove(&self, end_point, item, data, ctx)?,
            Self::Insert {
                end_point, item, ..
            } => expand_insert(&self, end_point, item, data, ctx)?,
            Self::Replace {
                end_point,
                old,
                new,
                ..
            } => expand_replace(&self, end_point, old, new, data, ctx)?,
            Self::SetCollection {
                end_point,
                old,
                new,
            } => expand_set_collection(&self, end_point, old, new, data, ctx)?,
            Self::Touch { .. } | Self::MarkDeleted { .. } => vec![self.clone()],
        };
        trace!(steps = steps.len(), "expanded relation command");
        Ok(CompositeCommand::expanded(steps))
    }
}

/// Builds the deletion closure for `object`: clear every end point, then
/// mark the object deleted.
pub(crate) fn expand_delete(
    object: &ObjectId,
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
) -> Result<CompositeCommand> {
    let definitions: Vec<RelationEndPointDefinition> = data
        .mapping()
        .end_points_of(&object.class)
        .cloned()
        .collect();

    let mut steps = Vec::new();
    for definition in definitions {
        let Some(property) = definition.property else {
            continue;
        };
        let end_point = load(data, ctx, &RelationEndPointId::new(object.clone(), property))?;
        let command = if end_point.is_scalar() {
            if end_point.related_object().is_none() {
                continue;
            }
            end_point.create_set_command(None)?
        } else {
            if end_point.collection().is_none_or(|c| c.is_empty()) {
                continue;
            }
            end_point.create_set_collection_command(Vec::new())?
        };
        steps.extend(command.expand_to_all_related_objects(data, ctx)?);
    }
    steps.push(RelationCommand::MarkDeleted {
        object: object.clone(),
    });
    Ok(CompositeCommand::expanded(steps))
}

fn expand_set(
    command: &RelationCommand,
    end_point: &RelationEndPointId,
    old: Option<&ObjectId>,
    new: Option<&ObjectId>,
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
) -> Result<Vec<RelationCommand>> {
    let source = load(data, ctx, end_point)?;
    if old == new {
        return Ok(vec![source.create_touch_command()?]);
    }
    let opposite = source.opposite_definition().clone();
    // A unidirectional relation has no end point on the related objects.
    if opposite.is_anonymous() {
        return Ok(vec![command.clone()]);
    }
    let owner = &end_point.object;
    let mut steps = Vec::with_capacity(4);

    let old_opposite = load_opposite(data, ctx, &source, old)?;
    if !old_opposite.is_null() {
        steps.push(if old_opposite.is_scalar() {
            old_opposite.create_set_command(None)?
        } else {
            old_opposite.create_remove_command(owner.clone())?
        });
    }

    let new_opposite = load_opposite(data, ctx, &source, new)?;
    if !new_opposite.is_null() {
        if new_opposite.is_scalar() {
            let third = new_opposite.related_object().cloned();
            steps.push(new_opposite.create_set_command(Some(owner.clone()))?);
            if let Some(third) = third {
                let third_end_point =
                    load(data, ctx, &RelationEndPointId::new(third, end_point.property.clone()))?;
                steps.push(third_end_point.create_set_command(None)?);
            }
        } else {
            let len = new_opposite.collection().map_or(0, |c| c.len());
            steps.push(new_opposite.create_insert_command(len, owner.clone())?);
        }
    }

    steps.push(command.clone());
    Ok(steps)
}

fn expand_remove(
    command: &RelationCommand,
    end_point: &RelationEndPointId,
    item: &ObjectId,
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
) -> Result<Vec<RelationCommand>> {
    let source = load(data, ctx, end_point)?;
    let item_end_point = load_opposite(data, ctx, &source, Some(item))?;
    Ok(vec![item_end_point.create_set_command(None)?, command.clone()])
}

fn expand_insert(
    command: &RelationCommand,
    end_point: &RelationEndPointId,
    item: &ObjectId,
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
) -> Result<Vec<RelationCommand>> {
    let source = load(data, ctx, end_point)?;
    let mut steps = Vec::with_capacity(3);
    connect_item(&mut steps, &source, end_point, item, data, ctx)?;
    steps.push(command.clone());
    Ok(steps)
}

fn expand_replace(
    command: &RelationCommand,
    end_point: &RelationEndPointId,
    old: &ObjectId,
    new: &ObjectId,
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
) -> Result<Vec<RelationCommand>> {
    let source = load(data, ctx, end_point)?;
    if old == new {
        return Ok(vec![source.create_touch_command()?]);
    }
    let mut steps = Vec::with_capacity(4);
    let old_end_point = load_opposite(data, ctx, &source, Some(old))?;
    steps.push(old_end_point.create_set_command(None)?);
    connect_item(&mut steps, &source, end_point, new, data, ctx)?;
    steps.push(command.clone());
    Ok(steps)
}

fn expand_set_collection(
    command: &RelationCommand,
    end_point: &RelationEndPointId,
    old: &[ObjectId],
    new: &[ObjectId],
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
) -> Result<Vec<RelationCommand>> {
    let source = load(data, ctx, end_point)?;
    if old == new {
        return Ok(vec![source.create_touch_command()?]);
    }
    let mut steps = Vec::new();
    for removed in old.iter().filter(|id| !new.contains(id)) {
        let item_end_point = load_opposite(data, ctx, &source, Some(removed))?;
        steps.push(item_end_point.create_set_command(None)?);
    }
    for added in new.iter().filter(|id| !old.contains(id)) {
        connect_item(&mut steps, &source, end_point, added, data, ctx)?;
    }
    steps.push(command.clone());
    Ok(steps)
}

/// Detaches `item` from the collection it currently belongs to and points
/// its scalar opposite at the owner of `end_point`.
fn connect_item(
    steps: &mut Vec<RelationCommand>,
    source: &RelationEndPoint,
    end_point: &RelationEndPointId,
    item: &ObjectId,
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
) -> Result<()> {
    let owner = &end_point.object;
    let item_end_point = load_opposite(data, ctx, source, Some(item))?;
    let prior = item_end_point.related_object().cloned();
    if prior.as_ref() == Some(owner) {
        return Err(Error::invalid_operation(format!(
            "{item} is already in the collection"
        ))
        .with_context(ErrorContext::new().with_end_point(end_point)));
    }
    if let Some(prior) = prior {
        let prior_collection =
            load(data, ctx, &RelationEndPointId::new(prior, end_point.property.clone()))?;
        steps.push(prior_collection.create_remove_command(item.clone())?);
    }
    steps.push(item_end_point.create_set_command(Some(owner.clone()))?);
    Ok(())
}

/// Loads an end point and snapshots it, rejecting end points of deleted objects.
fn load(
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
    id: &RelationEndPointId,
) -> Result<RelationEndPoint> {
    let end_point = data.get_end_point_or_load(id, ctx)?.clone();
    if data
        .get_object_if_loaded(&id.object)?
        .is_some_and(|c| c.is_deleted())
    {
        return Err(Error::invalid_operation(format!(
            "object {} is deleted",
            id.object
        ))
        .with_context(ErrorContext::new().with_end_point(id)));
    }
    Ok(end_point)
}

/// Loads the end point opposite to `source` on `related`, or the null end
/// point if there is no related object.
fn load_opposite(
    data: &mut DataManager,
    ctx: &mut DataContext<'_>,
    source: &RelationEndPoint,
    related: Option<&ObjectId>,
) -> Result<RelationEndPoint> {
    let opposite = source.opposite_definition();
    match (related, &opposite.property) {
        (Some(related), Some(property)) => load(
            data,
            ctx,
            &RelationEndPointId::new(related.clone(), property.clone()),
        ),
        _ => Ok(RelationEndPoint::null(
            opposite.clone(),
            source.definition().clone(),
        )),
    }
}
