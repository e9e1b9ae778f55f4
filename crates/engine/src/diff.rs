//! Snapshot diffing.
//!
//! Collections are compared through their id orders: removals first, then at
//! most one move of the surviving ids, then per-entity updates, then
//! additions. Removal and addition entries are grouped with the entity
//! write and every cascading reference change so they revert as one unit.

use std::collections::HashSet;

use jobset_core::{
    ChangeEntry, CollectionChange, CollectionPath, EntityId, FieldChange, FieldPath, FieldValue,
    FormData, Job, JobColorField, JobField, MachineField, Position, ProcedureField,
};

/// How one id order became another.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct OrderDiff {
    /// Ids only in the previous order, with their previous index.
    pub removed: Vec<(EntityId, usize)>,
    /// The ids common to both orders, as ordered before and after.
    pub moved: Option<(Vec<EntityId>, Vec<EntityId>)>,
    /// Ids only in the current order, anchored on the previous order.
    pub added: Vec<(EntityId, Position)>,
}

impl OrderDiff {
    fn removed_index(&self, id: &EntityId) -> Option<usize> {
        self.removed
            .iter()
            .find(|(removed, _)| removed == id)
            .map(|(_, index)| *index)
    }

    fn added_position(&self, id: &EntityId) -> Option<Position> {
        self.added
            .iter()
            .find(|(added, _)| added == id)
            .map(|(_, position)| *position)
    }
}

pub(crate) fn diff_order(previous: &[EntityId], current: &[EntityId]) -> OrderDiff {
    let in_previous: HashSet<&EntityId> = previous.iter().collect();
    let in_current: HashSet<&EntityId> = current.iter().collect();

    let removed = previous
        .iter()
        .enumerate()
        .filter(|(_, id)| !in_current.contains(id))
        .map(|(index, id)| (id.clone(), index))
        .collect();

    let common_before: Vec<EntityId> = previous
        .iter()
        .filter(|id| in_current.contains(id))
        .cloned()
        .collect();
    let common_after: Vec<EntityId> = current
        .iter()
        .filter(|id| in_previous.contains(id))
        .cloned()
        .collect();
    let moved = (common_before != common_after).then_some((common_before, common_after));

    let mut added = Vec::new();
    let mut anchor = None;
    let mut subindex = 0;
    for id in current {
        if in_previous.contains(id) {
            anchor = previous.iter().position(|candidate| candidate == id);
            subindex = 0;
            continue;
        }
        let position = match anchor {
            Some(index) => Position::After { index, subindex },
            None => Position::Beginning { subindex },
        };
        added.push((id.clone(), position));
        subindex += 1;
    }

    OrderDiff {
        removed,
        moved,
        added,
    }
}

fn ids_change(collection: &CollectionPath, change: CollectionChange) -> FieldChange {
    FieldChange::collection(FieldPath::Ids(collection.clone()), change)
}

fn entity_change(
    collection: &CollectionPath,
    id: &EntityId,
    previous: FieldValue,
    new: FieldValue,
) -> FieldChange {
    FieldChange::value(FieldPath::Entity(collection.clone(), id.clone()), previous, new)
}

fn push_value(entries: &mut Vec<ChangeEntry>, path: FieldPath, previous: FieldValue, new: FieldValue) {
    if previous != new {
        entries.push(ChangeEntry::Single(FieldChange::value(path, previous, new)));
    }
}

fn push_move(entries: &mut Vec<ChangeEntry>, collection: &CollectionPath, order: &mut OrderDiff) {
    if let Some((previous, new)) = order.moved.take() {
        entries.push(ChangeEntry::Single(ids_change(
            collection,
            CollectionChange::Move { previous, new },
        )));
    }
}

/// Ordered changes turning `previous` into `current`. Derived time options
/// are not compared.
pub fn get_field_changes(previous: &FormData, current: &FormData) -> Vec<ChangeEntry> {
    let mut entries = Vec::new();

    push_value(
        &mut entries,
        FieldPath::Title,
        FieldValue::Text(previous.title.clone()),
        FieldValue::Text(current.title.clone()),
    );
    push_value(
        &mut entries,
        FieldPath::Description,
        FieldValue::Text(previous.description.clone()),
        FieldValue::Text(current.description.clone()),
    );
    push_value(
        &mut entries,
        FieldPath::IsAutoTimeOptions,
        FieldValue::Boolean(previous.is_auto_time_options),
        FieldValue::Boolean(current.is_auto_time_options),
    );
    push_value(
        &mut entries,
        FieldPath::ManualTimeOptions,
        FieldValue::TimeOptions(previous.manual_time_options.clone()),
        FieldValue::TimeOptions(current.manual_time_options.clone()),
    );

    diff_machines(previous, current, &mut entries);
    diff_jobs(previous, current, &mut entries);
    entries
}

fn diff_machines(previous: &FormData, current: &FormData, entries: &mut Vec<ChangeEntry>) {
    let collection = CollectionPath::Machines;
    let mut order = diff_order(&previous.machines.ids, &current.machines.ids);

    for (machine_id, index) in &order.removed {
        let Some(machine) = previous.machines.get(machine_id) else {
            tracing::warn!("removed machine {machine_id} has no entity");
            continue;
        };
        let mut group = vec![
            ids_change(
                &collection,
                CollectionChange::Remove {
                    id: machine_id.clone(),
                    index: *index,
                },
            ),
            entity_change(
                &collection,
                machine_id,
                FieldValue::Machine(machine.clone()),
                FieldValue::Null,
            ),
        ];
        // Only procedures that survive need their reference cleared; removed
        // ones carry the old reference in their own entity value.
        for procedure in previous.procedures() {
            if procedure.machine_id.as_ref() == Some(machine_id)
                && current.procedure(&procedure.job_id, &procedure.id).is_some()
            {
                group.push(FieldChange::value(
                    FieldPath::procedure(&procedure.job_id, &procedure.id, ProcedureField::MachineId),
                    FieldValue::EntityRef(machine_id.clone()),
                    FieldValue::Null,
                ));
            }
        }
        entries.push(ChangeEntry::grouped(group));
    }

    push_move(entries, &collection, &mut order);

    for (machine_id, machine) in current.machines.iter() {
        let Some(before) = previous.machines.get(machine_id) else {
            continue;
        };
        push_value(
            entries,
            FieldPath::machine(machine_id, MachineField::Title),
            FieldValue::Text(before.title.clone()),
            FieldValue::Text(machine.title.clone()),
        );
        push_value(
            entries,
            FieldPath::machine(machine_id, MachineField::Description),
            FieldValue::Text(before.description.clone()),
            FieldValue::Text(machine.description.clone()),
        );
    }

    // Reassignments not already expressed by a removal or addition group.
    for procedure in current.procedures() {
        let Some(before) = previous.procedure(&procedure.job_id, &procedure.id) else {
            continue;
        };
        if before.machine_id == procedure.machine_id {
            continue;
        }
        let assigned_to_new = procedure
            .machine_id
            .as_ref()
            .is_some_and(|id| !previous.machines.contains(id) && current.machines.contains(id));
        if assigned_to_new {
            continue;
        }
        let was = before
            .machine_id
            .as_ref()
            .filter(|id| current.machines.contains(id));
        push_value(
            entries,
            FieldPath::procedure(&procedure.job_id, &procedure.id, ProcedureField::MachineId),
            FieldValue::from_ref(was),
            FieldValue::from_ref(procedure.machine_id.as_ref()),
        );
    }

    for (machine_id, position) in &order.added {
        let Some(machine) = current.machines.get(machine_id) else {
            tracing::warn!("added machine {machine_id} has no entity");
            continue;
        };
        let mut group = vec![
            ids_change(
                &collection,
                CollectionChange::Add {
                    id: machine_id.clone(),
                    position: *position,
                },
            ),
            entity_change(
                &collection,
                machine_id,
                FieldValue::Null,
                FieldValue::Machine(machine.clone()),
            ),
        ];
        for procedure in current.procedures() {
            if procedure.machine_id.as_ref() != Some(machine_id) {
                continue;
            }
            let was = previous
                .procedure(&procedure.job_id, &procedure.id)
                .and_then(|before| before.machine_id.as_ref())
                .filter(|id| current.machines.contains(id));
            group.push(FieldChange::value(
                FieldPath::procedure(&procedure.job_id, &procedure.id, ProcedureField::MachineId),
                FieldValue::from_ref(was),
                FieldValue::EntityRef(machine_id.clone()),
            ));
        }
        entries.push(ChangeEntry::grouped(group));
    }
}

fn diff_jobs(previous: &FormData, current: &FormData, entries: &mut Vec<ChangeEntry>) {
    let jobs = CollectionPath::Jobs;
    let colors = CollectionPath::JobColors;
    let mut job_order = diff_order(&previous.jobs.ids, &current.jobs.ids);
    let mut color_order = diff_order(&previous.job_colors.ids, &current.job_colors.ids);

    let removed_jobs: HashSet<EntityId> =
        job_order.removed.iter().map(|(id, _)| id.clone()).collect();
    let added_jobs: HashSet<EntityId> = job_order.added.iter().map(|(id, _)| id.clone()).collect();

    for (job_id, index) in &job_order.removed {
        let Some(job) = previous.jobs.get(job_id) else {
            tracing::warn!("removed job {job_id} has no entity");
            continue;
        };
        let mut group = vec![
            ids_change(
                &jobs,
                CollectionChange::Remove {
                    id: job_id.clone(),
                    index: *index,
                },
            ),
            entity_change(&jobs, job_id, FieldValue::Job(job.clone()), FieldValue::Null),
        ];
        if let (Some(color_index), Some(color)) = (
            color_order.removed_index(job_id),
            previous.job_colors.get(job_id),
        ) {
            group.push(ids_change(
                &colors,
                CollectionChange::Remove {
                    id: job_id.clone(),
                    index: color_index,
                },
            ));
            group.push(entity_change(
                &colors,
                job_id,
                FieldValue::JobColor(color.clone()),
                FieldValue::Null,
            ));
        }
        entries.push(ChangeEntry::grouped(group));
    }

    for (job_id, index) in &color_order.removed {
        if removed_jobs.contains(job_id) {
            continue;
        }
        let Some(color) = previous.job_colors.get(job_id) else {
            continue;
        };
        entries.push(ChangeEntry::grouped(vec![
            ids_change(
                &colors,
                CollectionChange::Remove {
                    id: job_id.clone(),
                    index: *index,
                },
            ),
            entity_change(
                &colors,
                job_id,
                FieldValue::JobColor(color.clone()),
                FieldValue::Null,
            ),
        ]));
    }

    push_move(entries, &jobs, &mut job_order);
    push_move(entries, &colors, &mut color_order);

    for (job_id, job) in current.jobs.iter() {
        if let Some(before) = previous.jobs.get(job_id) {
            push_value(
                entries,
                FieldPath::job(job_id, JobField::Title),
                FieldValue::Text(before.title.clone()),
                FieldValue::Text(job.title.clone()),
            );
        }
    }

    for (job_id, color) in current.job_colors.iter() {
        let Some(before) = previous.job_colors.get(job_id) else {
            continue;
        };
        push_value(
            entries,
            FieldPath::job_color(job_id, JobColorField::Color),
            FieldValue::Text(before.color.clone()),
            FieldValue::Text(color.color.clone()),
        );
        push_value(
            entries,
            FieldPath::job_color(job_id, JobColorField::TextColor),
            FieldValue::Text(before.text_color.clone()),
            FieldValue::Text(color.text_color.clone()),
        );
    }

    for (job_id, job) in current.jobs.iter() {
        if let Some(before) = previous.jobs.get(job_id) {
            diff_procedures(job_id, before, job, entries);
        }
    }

    for (job_id, position) in &job_order.added {
        let Some(job) = current.jobs.get(job_id) else {
            tracing::warn!("added job {job_id} has no entity");
            continue;
        };
        let mut group = vec![
            ids_change(
                &jobs,
                CollectionChange::Add {
                    id: job_id.clone(),
                    position: *position,
                },
            ),
            entity_change(&jobs, job_id, FieldValue::Null, FieldValue::Job(job.clone())),
        ];
        if let (Some(color_position), Some(color)) = (
            color_order.added_position(job_id),
            current.job_colors.get(job_id),
        ) {
            group.push(ids_change(
                &colors,
                CollectionChange::Add {
                    id: job_id.clone(),
                    position: color_position,
                },
            ));
            group.push(entity_change(
                &colors,
                job_id,
                FieldValue::Null,
                FieldValue::JobColor(color.clone()),
            ));
        }
        entries.push(ChangeEntry::grouped(group));
    }

    for (job_id, position) in &color_order.added {
        if added_jobs.contains(job_id) {
            continue;
        }
        let Some(color) = current.job_colors.get(job_id) else {
            continue;
        };
        entries.push(ChangeEntry::grouped(vec![
            ids_change(
                &colors,
                CollectionChange::Add {
                    id: job_id.clone(),
                    position: *position,
                },
            ),
            entity_change(
                &colors,
                job_id,
                FieldValue::Null,
                FieldValue::JobColor(color.clone()),
            ),
        ]));
    }
}

/// Procedure changes inside a job present in both snapshots. Machine
/// assignments are reported by the machines pass.
fn diff_procedures(job_id: &EntityId, previous: &Job, current: &Job, entries: &mut Vec<ChangeEntry>) {
    let collection = CollectionPath::Procedures {
        job_id: job_id.clone(),
    };
    let mut order = diff_order(&previous.procedures.ids, &current.procedures.ids);

    for (procedure_id, index) in &order.removed {
        let Some(procedure) = previous.procedures.get(procedure_id) else {
            continue;
        };
        entries.push(ChangeEntry::grouped(vec![
            ids_change(
                &collection,
                CollectionChange::Remove {
                    id: procedure_id.clone(),
                    index: *index,
                },
            ),
            entity_change(
                &collection,
                procedure_id,
                FieldValue::Procedure(procedure.clone()),
                FieldValue::Null,
            ),
        ]));
    }

    push_move(entries, &collection, &mut order);

    for (procedure_id, procedure) in current.procedures.iter() {
        if let Some(before) = previous.procedures.get(procedure_id) {
            push_value(
                entries,
                FieldPath::procedure(job_id, procedure_id, ProcedureField::ProcessingTimeMs),
                FieldValue::Integer(before.processing_time_ms),
                FieldValue::Integer(procedure.processing_time_ms),
            );
        }
    }

    for (procedure_id, position) in &order.added {
        let Some(procedure) = current.procedures.get(procedure_id) else {
            continue;
        };
        entries.push(ChangeEntry::grouped(vec![
            ids_change(
                &collection,
                CollectionChange::Add {
                    id: procedure_id.clone(),
                    position: *position,
                },
            ),
            entity_change(
                &collection,
                procedure_id,
                FieldValue::Null,
                FieldValue::Procedure(procedure.clone()),
            ),
        ]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use jobset_core::changes::flatten;
    use jobset_core::ChangeKind;

    fn ids(raw: &[&str]) -> Vec<EntityId> {
        raw.iter().map(|id| EntityId::from(*id)).collect()
    }

    // ========================================================================
    // Id orders
    // ========================================================================

    #[test]
    fn unchanged_order_has_no_diff() {
        assert_eq!(diff_order(&ids(&["a", "b"]), &ids(&["a", "b"])), OrderDiff::default());
    }

    #[test]
    fn additions_anchor_on_previous_order() {
        let diff = diff_order(&ids(&["a", "b", "c"]), &ids(&["x", "a", "b", "y", "z", "c"]));
        assert_eq!(
            diff.added,
            vec![
                (EntityId::from("x"), Position::Beginning { subindex: 0 }),
                (EntityId::from("y"), Position::After { index: 1, subindex: 0 }),
                (EntityId::from("z"), Position::After { index: 1, subindex: 1 }),
            ]
        );
        assert!(diff.moved.is_none());
    }

    #[test]
    fn move_covers_only_common_ids() {
        let diff = diff_order(&ids(&["a", "b", "c"]), &ids(&["c", "d", "a"]));
        assert_eq!(diff.removed, vec![(EntityId::from("b"), 1)]);
        assert_eq!(diff.moved, Some((ids(&["a", "c"]), ids(&["c", "a"]))));
        assert_eq!(
            diff.added,
            vec![(EntityId::from("d"), Position::After { index: 2, subindex: 0 })]
        );
    }

    // ========================================================================
    // Snapshot diffs
    // ========================================================================

    #[test]
    fn identical_snapshots_have_no_changes() {
        let form = sample_form();
        assert!(get_field_changes(&form, &form).is_empty());
    }

    #[test]
    fn derived_time_options_are_ignored() {
        let previous = sample_form();
        let mut current = previous.clone();
        current.auto_time_options.max_time_ms += 1;
        assert!(get_field_changes(&previous, &current).is_empty());
    }

    #[test]
    fn machine_removal_groups_reference_cascade() {
        let previous = sample_form();
        let mut current = previous.clone();
        remove_machine(&mut current, "m1");

        let entries = get_field_changes(&previous, &current);
        assert_eq!(entries.len(), 1);
        let changes = entries[0].changes();
        assert_eq!(changes.len(), 3);
        assert_eq!(
            changes[0].change,
            ChangeKind::Collection(CollectionChange::Remove {
                id: EntityId::from("m1"),
                index: 0,
            })
        );
        assert_eq!(
            changes[1].path,
            FieldPath::Entity(CollectionPath::Machines, EntityId::from("m1"))
        );
        assert_eq!(
            changes[2],
            FieldChange::value(
                FieldPath::procedure(
                    &EntityId::from("j1"),
                    &EntityId::from("p1"),
                    ProcedureField::MachineId
                ),
                FieldValue::EntityRef(EntityId::from("m1")),
                FieldValue::Null,
            )
        );
    }

    #[test]
    fn assignment_to_new_machine_lives_in_addition_group() {
        let previous = sample_form();
        let mut current = previous.clone();
        add_machine(&mut current, "m3");
        current
            .jobs
            .get_mut(&EntityId::from("j1"))
            .and_then(|job| job.procedures.get_mut(&EntityId::from("p1")))
            .unwrap()
            .machine_id = Some(EntityId::from("m3"));

        let entries = get_field_changes(&previous, &current);
        assert_eq!(entries.len(), 1, "{entries:?}");
        let changes = entries[0].changes();
        assert_eq!(
            changes.last().unwrap().change,
            ChangeKind::Value {
                previous: FieldValue::EntityRef(EntityId::from("m1")),
                new: FieldValue::EntityRef(EntityId::from("m3")),
            }
        );
    }

    #[test]
    fn reassignment_away_from_removed_machine_starts_from_null() {
        let previous = sample_form();
        let mut current = previous.clone();
        remove_machine(&mut current, "m1");
        current
            .jobs
            .get_mut(&EntityId::from("j1"))
            .and_then(|job| job.procedures.get_mut(&EntityId::from("p1")))
            .unwrap()
            .machine_id = Some(EntityId::from("m2"));

        let flat = flatten(&get_field_changes(&previous, &current));
        let reassignment = flat.last().unwrap();
        assert_eq!(
            reassignment.change,
            ChangeKind::Value {
                previous: FieldValue::Null,
                new: FieldValue::EntityRef(EntityId::from("m2")),
            }
        );
    }

    #[test]
    fn job_removal_takes_its_color() {
        let previous = sample_form();
        let mut current = previous.clone();
        let job_id = EntityId::from("j2");
        current.jobs.remove(&job_id);
        current.job_colors.remove(&job_id);

        let entries = get_field_changes(&previous, &current);
        assert_eq!(entries.len(), 1);
        let paths: Vec<String> = entries[0].changes().iter().map(|c| c.path.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "/jobs/ids",
                "/jobs/entities/j2",
                "/jobColors/ids",
                "/jobColors/entities/j2",
            ]
        );
    }

    #[test]
    fn scalar_and_section_order() {
        let previous = sample_form();
        let mut current = previous.clone();
        current.title = "Renamed".into();
        current.machines.move_item(0, 1);
        current
            .jobs
            .get_mut(&EntityId::from("j1"))
            .unwrap()
            .title = "Milling".into();

        let entries = get_field_changes(&previous, &current);
        let paths: Vec<String> = flatten(&entries).iter().map(|c| c.path.to_string()).collect();
        assert_eq!(paths, vec!["/title", "/machines/ids", "/jobs/entities/j1/title"]);
    }
}
