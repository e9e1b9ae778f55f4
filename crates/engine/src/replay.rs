//! Structural undo/redo of a step against a snapshot.
//!
//! Id-list changes are resolved per collection against the snapshot's current
//! order. Value changes run in three passes so entity creates come before
//! field writes and entity deletes come after them.

use std::collections::HashSet;

use jobset_core::{
    ChangeKind, CollectionChange, CollectionPath, EntityId, FieldChange, FieldPath, FieldValue,
    FormData, Job, JobColorField, JobField, Machine, MachineField, Position, Procedure,
    ProcedureField,
};

use crate::error::EngineError;
use crate::steps::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Redo,
    Undo,
}

pub fn redo_step(step: &Step, snapshot: &FormData) -> Result<FormData, EngineError> {
    replay(step, snapshot, Direction::Redo)
}

pub fn undo_step(step: &Step, snapshot: &FormData) -> Result<FormData, EngineError> {
    replay(step, snapshot, Direction::Undo)
}

struct Assignment<'a> {
    path: &'a FieldPath,
    value: &'a FieldValue,
}

impl Assignment<'_> {
    fn is_entity(&self) -> bool {
        matches!(self.path, FieldPath::Entity(..))
    }
}

fn replay(step: &Step, snapshot: &FormData, direction: Direction) -> Result<FormData, EngineError> {
    let changes: Vec<&FieldChange> = step
        .operations
        .iter()
        .filter(|operation| operation.is_effective())
        .flat_map(|operation| operation.field_changes.iter())
        .flat_map(|entry| entry.changes())
        .collect();

    let mut families: Vec<(&CollectionPath, Vec<&CollectionChange>)> = Vec::new();
    let mut assignments = Vec::new();
    for change in changes {
        match (&change.path, &change.change) {
            (FieldPath::Ids(collection), ChangeKind::Collection(collection_change)) => {
                match families.iter_mut().find(|(family, _)| *family == collection) {
                    Some((_, list)) => list.push(collection_change),
                    None => families.push((collection, vec![collection_change])),
                }
            }
            (path, ChangeKind::Collection(_)) => {
                return Err(EngineError::UnexpectedValue {
                    path: path.to_string(),
                    found: "collection change",
                });
            }
            (path, ChangeKind::Value { previous, new }) => assignments.push(Assignment {
                path,
                value: match direction {
                    Direction::Redo => new,
                    Direction::Undo => previous,
                },
            }),
        }
    }
    if direction == Direction::Undo {
        assignments.reverse();
    }

    let mut form = snapshot.clone();

    for assignment in assignments
        .iter()
        .filter(|a| a.is_entity() && !a.value.is_null())
    {
        set_value(&mut form, assignment.path, assignment.value)?;
    }

    for (collection, changes) in &families {
        let ids = ids_mut(&mut form, collection)?;
        match direction {
            Direction::Redo => redo_order(ids, changes),
            Direction::Undo => undo_order(ids, changes),
        }
    }

    for assignment in assignments.iter().filter(|a| !a.is_entity()) {
        set_value(&mut form, assignment.path, assignment.value)?;
    }

    for assignment in assignments
        .iter()
        .filter(|a| a.is_entity() && a.value.is_null())
    {
        set_value(&mut form, assignment.path, assignment.value)?;
    }

    Ok(form)
}

fn ids_mut<'a>(
    form: &'a mut FormData,
    collection: &CollectionPath,
) -> Result<&'a mut Vec<EntityId>, EngineError> {
    match collection {
        CollectionPath::Machines => Ok(&mut form.machines.ids),
        CollectionPath::Jobs => Ok(&mut form.jobs.ids),
        CollectionPath::JobColors => Ok(&mut form.job_colors.ids),
        CollectionPath::Procedures { job_id } => Ok(&mut job_mut(form, job_id)?.procedures.ids),
    }
}

/// Rewrite the slots holding `from`'s ids so they read in `to`'s order.
fn permute(ids: &mut [EntityId], from: &[EntityId], to: &[EntityId]) {
    let moving: HashSet<&EntityId> = from.iter().collect();
    let slots: Vec<usize> = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| moving.contains(id))
        .map(|(slot, _)| slot)
        .collect();
    let present: HashSet<&EntityId> = slots.iter().map(|&slot| &ids[slot]).collect();
    let reordered: Vec<EntityId> = to
        .iter()
        .filter(|id| present.contains(id))
        .cloned()
        .collect();
    if reordered.len() != slots.len() {
        tracing::warn!(
            "move covers {} ids but {} are present, skipping",
            reordered.len(),
            slots.len()
        );
        return;
    }
    for (slot, id) in slots.into_iter().zip(reordered) {
        ids[slot] = id;
    }
}

fn redo_order(ids: &mut Vec<EntityId>, changes: &[&CollectionChange]) {
    let before = ids.clone();

    for change in changes {
        if let CollectionChange::Move { previous, new } = change {
            permute(ids, previous, new);
        }
    }

    let mut adds: Vec<(&EntityId, &Position)> = changes
        .iter()
        .filter_map(|change| match change {
            CollectionChange::Add { id, position } => Some((id, position)),
            _ => None,
        })
        .collect();
    adds.sort_by_key(|(_, position)| position.subindex());
    for (id, position) in adds {
        if ids.contains(id) {
            tracing::warn!("{id} is already present, skipping add");
            continue;
        }
        let at = match position {
            Position::Beginning { subindex } => *subindex,
            Position::After { index, subindex } => {
                let anchor = before
                    .get(*index)
                    .and_then(|anchor| ids.iter().position(|candidate| candidate == anchor));
                match anchor {
                    Some(anchor) => anchor + 1 + subindex,
                    None => index + 1 + subindex,
                }
            }
        };
        ids.insert(at.min(ids.len()), id.clone());
    }

    for change in changes {
        if let CollectionChange::Remove { id, .. } = change {
            ids.retain(|candidate| candidate != id);
        }
    }
}

fn undo_order(ids: &mut Vec<EntityId>, changes: &[&CollectionChange]) {
    for change in changes {
        if let CollectionChange::Add { id, .. } = change {
            ids.retain(|candidate| candidate != id);
        }
    }

    for change in changes.iter().rev() {
        if let CollectionChange::Move { previous, new } = change {
            permute(ids, new, previous);
        }
    }

    let mut removes: Vec<(&EntityId, usize)> = changes
        .iter()
        .filter_map(|change| match change {
            CollectionChange::Remove { id, index } => Some((id, *index)),
            _ => None,
        })
        .collect();
    removes.sort_by_key(|(_, index)| *index);
    for (id, index) in removes {
        if ids.contains(id) {
            tracing::warn!("{id} is already present, skipping restore");
            continue;
        }
        ids.insert(index.min(ids.len()), id.clone());
    }
}

pub(crate) fn machine_mut<'a>(
    form: &'a mut FormData,
    id: &EntityId,
) -> Result<&'a mut Machine, EngineError> {
    form.machines
        .get_mut(id)
        .ok_or_else(|| EngineError::MissingEntity(format!("machine {id}")))
}

pub(crate) fn job_mut<'a>(
    form: &'a mut FormData,
    id: &EntityId,
) -> Result<&'a mut Job, EngineError> {
    form.jobs
        .get_mut(id)
        .ok_or_else(|| EngineError::MissingEntity(format!("job {id}")))
}

pub(crate) fn procedure_mut<'a>(
    form: &'a mut FormData,
    job_id: &EntityId,
    procedure_id: &EntityId,
) -> Result<&'a mut Procedure, EngineError> {
    job_mut(form, job_id)?
        .procedures
        .get_mut(procedure_id)
        .ok_or_else(|| EngineError::MissingEntity(format!("procedure {procedure_id}")))
}

fn set_value(form: &mut FormData, path: &FieldPath, value: &FieldValue) -> Result<(), EngineError> {
    match (path, value) {
        (FieldPath::Title, FieldValue::Text(text)) => form.title = text.clone(),
        (FieldPath::Description, FieldValue::Text(text)) => form.description = text.clone(),
        (FieldPath::IsAutoTimeOptions, FieldValue::Boolean(flag)) => {
            form.is_auto_time_options = *flag
        }
        (FieldPath::ManualTimeOptions, FieldValue::TimeOptions(options)) => {
            form.manual_time_options = options.clone()
        }

        (FieldPath::Entity(CollectionPath::Machines, id), FieldValue::Machine(machine)) => {
            form.machines.entities.insert(id.clone(), machine.clone());
        }
        (FieldPath::Entity(CollectionPath::Jobs, id), FieldValue::Job(job)) => {
            form.jobs.entities.insert(id.clone(), job.clone());
        }
        (FieldPath::Entity(CollectionPath::JobColors, id), FieldValue::JobColor(color)) => {
            form.job_colors.entities.insert(id.clone(), color.clone());
        }
        (
            FieldPath::Entity(CollectionPath::Procedures { job_id }, id),
            FieldValue::Procedure(procedure),
        ) => {
            job_mut(form, job_id)?
                .procedures
                .entities
                .insert(id.clone(), procedure.clone());
        }
        (FieldPath::Entity(collection, id), FieldValue::Null) => {
            let removed = match collection {
                CollectionPath::Machines => form.machines.entities.remove(id).is_some(),
                CollectionPath::Jobs => form.jobs.entities.remove(id).is_some(),
                CollectionPath::JobColors => form.job_colors.entities.remove(id).is_some(),
                CollectionPath::Procedures { job_id } => job_mut(form, job_id)?
                    .procedures
                    .entities
                    .remove(id)
                    .is_some(),
            };
            if !removed {
                tracing::warn!("{path} was already gone");
            }
        }

        (FieldPath::Machine { machine_id, field }, FieldValue::Text(text)) => {
            let machine = machine_mut(form, machine_id)?;
            match field {
                MachineField::Title => machine.title = text.clone(),
                MachineField::Description => machine.description = text.clone(),
            }
        }
        (
            FieldPath::Job {
                job_id,
                field: JobField::Title,
            },
            FieldValue::Text(text),
        ) => job_mut(form, job_id)?.title = text.clone(),
        (FieldPath::JobColor { job_id, field }, FieldValue::Text(text)) => {
            let color = form
                .job_colors
                .get_mut(job_id)
                .ok_or_else(|| EngineError::MissingEntity(format!("job color {job_id}")))?;
            match field {
                JobColorField::Color => color.color = text.clone(),
                JobColorField::TextColor => color.text_color = text.clone(),
            }
        }
        (
            FieldPath::Procedure {
                job_id,
                procedure_id,
                field: ProcedureField::MachineId,
            },
            FieldValue::Null | FieldValue::EntityRef(_),
        ) => {
            procedure_mut(form, job_id, procedure_id)?.machine_id = value.as_entity_ref().cloned()
        }
        (
            FieldPath::Procedure {
                job_id,
                procedure_id,
                field: ProcedureField::ProcessingTimeMs,
            },
            FieldValue::Integer(ms),
        ) => procedure_mut(form, job_id, procedure_id)?.processing_time_ms = *ms,

        _ => {
            return Err(EngineError::UnexpectedValue {
                path: path.to_string(),
                found: value.kind_name(),
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod proptest_suite {
    use super::*;
    use crate::diff::get_field_changes;
    use crate::steps::Operation;
    use crate::testing::arb_form;
    use proptest::prelude::*;

    fn step_between(previous: &FormData, current: &FormData) -> Step {
        Step::new("edit", vec![Operation::edit(get_field_changes(previous, current))])
    }

    proptest! {
        #[test]
        fn redo_of_diff_reaches_target(a in arb_form(), b in arb_form()) {
            let step = step_between(&a, &b);
            prop_assert_eq!(redo_step(&step, &a).unwrap(), b);
        }

        #[test]
        fn undo_inverts_redo(a in arb_form(), b in arb_form()) {
            let step = step_between(&a, &b);
            let redone = redo_step(&step, &a).unwrap();
            prop_assert_eq!(undo_step(&step, &redone).unwrap(), a);
        }

        #[test]
        fn replayed_snapshots_keep_references_valid(a in arb_form(), b in arb_form()) {
            let step = step_between(&a, &b);
            let redone = redo_step(&step, &a).unwrap();
            prop_assert!(redone.check_references().is_ok());
            prop_assert!(undo_step(&step, &redone).unwrap().check_references().is_ok());
        }
    }
}
