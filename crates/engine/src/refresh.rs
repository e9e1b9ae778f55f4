//! Three-way reconciliation of local edits with a newer remote version.

use jobset_core::changes::flatten;
use jobset_core::{
    ChangeEntry, CollectionPath, EntityRef, FieldChange, FieldPath, FormData, VersionToken,
};

use crate::diff::get_field_changes;
use crate::error::EngineError;
use crate::steps::{calculate_step_name, MergeBehaviour, Operation, OperationKind, Step};

pub const MERGE_STEP_NAME: &str = "Merge newer version";
pub const LOAD_STEP_NAME: &str = "Load newer version";

/// What a structural entry is about.
enum Target {
    Entity(EntityRef),
    Collection(CollectionPath),
}

impl Target {
    fn of(entry: &ChangeEntry) -> Option<Self> {
        let first = entry.changes().first()?;
        match &first.path {
            FieldPath::Ids(collection) if first.is_move() => {
                Some(Target::Collection(collection.clone()))
            }
            _ => first.entity_ref().map(Target::Entity),
        }
    }

    fn is_touched_by(&self, change: &FieldChange) -> bool {
        match self {
            Target::Collection(collection) => {
                change.is_move() && change.path == FieldPath::Ids(collection.clone())
            }
            Target::Entity(entity) => {
                let addressed = change
                    .entity_ref()
                    .is_some_and(|addressed| addressed.is_within(entity));
                let referenced = matches!(entity, EntityRef::Machine(id) if change.references(id));
                addressed || referenced
            }
        }
    }
}

/// Build the step that moves `local` onto `remote`, classifying every
/// difference against what each side changed since `previous_version`.
/// Returns `None` when the two snapshots already agree.
pub fn calculate_refreshed_step(
    previous_version: &FormData,
    local: &FormData,
    remote: &FormData,
    version_token: VersionToken,
) -> Result<Option<Step>, EngineError> {
    let remote_vs_local = get_field_changes(local, remote);
    if remote_vs_local.is_empty() {
        return Ok(None);
    }
    let local_entries = get_field_changes(previous_version, local);
    let local_changes = flatten(&local_entries);
    let remote_changes = flatten(&get_field_changes(previous_version, remote));

    let mut operations = Vec::with_capacity(remote_vs_local.len());
    for entry in remote_vs_local {
        let touches: Box<dyn Fn(&FieldChange) -> bool> = if entry.is_complex() {
            match Target::of(&entry) {
                Some(target) => Box::new(move |change: &FieldChange| target.is_touched_by(change)),
                None => Box::new(|_: &FieldChange| false),
            }
        } else {
            let paths: Vec<FieldPath> = entry.changes().iter().map(|c| c.path.clone()).collect();
            Box::new(move |change: &FieldChange| paths.contains(&change.path))
        };

        let local_touched = local_changes.iter().any(|change| touches(change));
        let remote_touched = remote_changes.iter().any(|change| touches(change));

        let operation = match (local_touched, remote_touched) {
            (false, _) => Operation {
                kind: OperationKind::Merge,
                field_changes: vec![entry],
                conflict_name: None,
                conflict_applied: None,
                applied: true,
            },
            (true, true) => {
                let local_entry = local_entries
                    .iter()
                    .find(|local| local.changes().iter().any(|change| touches(change)));
                let conflict_name = match local_entry {
                    Some(local) if local.is_complex() => {
                        calculate_step_name(std::slice::from_ref(local))?
                    }
                    _ => calculate_step_name(std::slice::from_ref(&entry))?,
                };
                Operation {
                    kind: OperationKind::Conflict,
                    field_changes: vec![entry],
                    conflict_name: Some(conflict_name),
                    conflict_applied: Some(true),
                    applied: true,
                }
            }
            (true, false) => Operation {
                kind: OperationKind::ReverseLocal,
                field_changes: vec![entry],
                conflict_name: None,
                conflict_applied: None,
                applied: false,
            },
        };
        tracing::debug!(
            "refresh: {:?} for {}",
            operation.kind,
            operation.field_changes[0]
                .changes()
                .first()
                .map(|change| change.path.to_string())
                .unwrap_or_default()
        );
        operations.push(operation);
    }

    let needs_review = operations.iter().any(|operation| {
        matches!(
            operation.kind,
            OperationKind::Conflict | OperationKind::ReverseLocal
        )
    });
    let (name, merge_behaviour) = if needs_review {
        (MERGE_STEP_NAME, MergeBehaviour::Merge)
    } else {
        (LOAD_STEP_NAME, MergeBehaviour::DiscardLocalChanges)
    };

    let mut step = Step::new(name, operations);
    step.version_token = Some(version_token);
    step.merge_behaviour = Some(merge_behaviour);
    Ok(Some(step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::redo_step;
    use crate::testing::*;
    use jobset_core::EntityId;

    fn token() -> VersionToken {
        VersionToken::from_string("v2")
    }

    fn kinds(step: &Step) -> Vec<OperationKind> {
        step.operations.iter().map(|operation| operation.kind).collect()
    }

    #[test]
    fn agreeing_snapshots_need_no_step() {
        let base = sample_form();
        let mut local = base.clone();
        local.title = "Same".into();
        let remote = local.clone();
        assert!(calculate_refreshed_step(&base, &local, &remote, token())
            .unwrap()
            .is_none());
    }

    #[test]
    fn remote_only_rename_merges_cleanly() {
        let base = sample_form();
        let mut remote = base.clone();
        remote.jobs.get_mut(&EntityId::from("j1")).unwrap().title = "B".into();

        let step = calculate_refreshed_step(&base, &base, &remote, token())
            .unwrap()
            .unwrap();
        assert_eq!(kinds(&step), vec![OperationKind::Merge]);
        assert!(step.operations[0].applied);
        assert_eq!(step.name, LOAD_STEP_NAME);
        assert_eq!(step.merge_behaviour, Some(MergeBehaviour::DiscardLocalChanges));
        assert_eq!(step.version_token, Some(token()));
        assert_eq!(redo_step(&step, &base).unwrap(), remote);
    }

    #[test]
    fn local_removal_against_remote_edit_conflicts() {
        let base = sample_form();
        let mut local = base.clone();
        remove_machine(&mut local, "m1");
        let mut remote = base.clone();
        remote.machines.get_mut(&EntityId::from("m1")).unwrap().title = "Big lathe".into();

        let step = calculate_refreshed_step(&base, &local, &remote, token())
            .unwrap()
            .unwrap();
        assert_eq!(kinds(&step), vec![OperationKind::Conflict]);
        let conflict = &step.operations[0];
        assert_eq!(conflict.conflict_name.as_deref(), Some("Remove machine"));
        assert_eq!(conflict.conflict_applied, Some(true));
        assert_eq!(step.merge_behaviour, Some(MergeBehaviour::Merge));
        assert_eq!(step.name, MERGE_STEP_NAME);

        // Remote wins provisionally: the machine comes back with its new title.
        let merged = redo_step(&step, &local).unwrap();
        assert_eq!(merged, remote);
    }

    #[test]
    fn unsaved_local_edits_are_kept() {
        let base = sample_form();
        let mut local = base.clone();
        local.description = "Local notes".into();
        add_machine(&mut local, "m3");

        let step = calculate_refreshed_step(&base, &local, &base, token())
            .unwrap()
            .unwrap();
        assert_eq!(
            kinds(&step),
            vec![OperationKind::ReverseLocal, OperationKind::ReverseLocal]
        );
        assert!(step.operations.iter().all(|operation| !operation.applied));
        assert_eq!(redo_step(&step, &local).unwrap(), local);
    }

    #[test]
    fn both_sides_editing_one_field_conflicts() {
        let base = sample_form();
        let mut local = base.clone();
        local.title = "Local".into();
        let mut remote = base.clone();
        remote.title = "Remote".into();
        remote.description = "Remote notes".into();

        let step = calculate_refreshed_step(&base, &local, &remote, token())
            .unwrap()
            .unwrap();
        assert_eq!(kinds(&step), vec![OperationKind::Conflict, OperationKind::Merge]);
        assert_eq!(step.operations[0].conflict_name.as_deref(), Some("Edit name"));
    }

    #[test]
    fn reordering_on_both_sides_conflicts() {
        let mut base = sample_form();
        base.jobs.push(EntityId::from("j3"), jobset_core::Job::new(EntityId::from("j3"), "Pin"));
        let mut local = base.clone();
        local.jobs.move_item(0, 2);
        let mut remote = base.clone();
        remote.jobs.move_item(2, 0);
        remote.job_colors.move_item(0, 1);

        let step = calculate_refreshed_step(&base, &local, &remote, token())
            .unwrap()
            .unwrap();
        assert_eq!(kinds(&step), vec![OperationKind::Conflict, OperationKind::Merge]);
        assert_eq!(step.operations[0].conflict_name.as_deref(), Some("Reorder jobs"));
    }
}
