use jobset_core::changes::flatten;
use jobset_core::{CollectionPath, EntityRef, FieldChange, FieldPath};

use crate::steps::{Operation, Step};

/// Whether flipping `conflict` would disturb changes recorded in `step`:
/// they share a path, or one adds or removes an entity the other edits or
/// references.
pub fn conflict_has_related_changes(conflict: &Operation, step: &Step) -> bool {
    let conflict_changes = flatten(&conflict.field_changes);
    let step_changes: Vec<FieldChange> = step
        .operations
        .iter()
        .flat_map(|operation| flatten(&operation.field_changes))
        .collect();

    conflict_changes.iter().any(|a| {
        step_changes
            .iter()
            .any(|b| a.path == b.path || depends_on(a, b) || depends_on(b, a))
    })
}

/// True when `structural` adds or removes an entity that `other` touches.
fn depends_on(structural: &FieldChange, other: &FieldChange) -> bool {
    let FieldPath::Ids(collection) = &structural.path else {
        return false;
    };
    let Some(id) = structural.collection_change().and_then(|change| change.id()) else {
        return false;
    };
    let Some(touched) = other.entity_ref() else {
        return matches!(collection, CollectionPath::Machines) && other.references(id);
    };
    match collection {
        CollectionPath::Machines => {
            touched == EntityRef::Machine(id.clone()) || other.references(id)
        }
        CollectionPath::Jobs | CollectionPath::JobColors => {
            touched.is_within(&EntityRef::Job(id.clone()))
        }
        CollectionPath::Procedures { .. } => touched == collection.entity_ref(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::get_field_changes;
    use crate::testing::*;
    use jobset_core::{EntityId, FormData, Job};

    fn operation(a: &FormData, b: &FormData) -> Operation {
        Operation::edit(get_field_changes(a, b))
    }

    fn step(a: &FormData, b: &FormData) -> Step {
        Step::new("later", vec![operation(a, b)])
    }

    #[test]
    fn same_path_is_related() {
        let base = sample_form();
        let mut a = base.clone();
        a.title = "A".into();
        let mut b = a.clone();
        b.title = "B".into();
        assert!(conflict_has_related_changes(&operation(&base, &a), &step(&a, &b)));
    }

    #[test]
    fn machine_removal_relates_to_reference_edits() {
        let base = sample_form();
        let mut readded = base.clone();
        remove_machine(&mut readded, "m2");
        // Conflict re-adds m2; a later step points p1 at it.
        let conflict = operation(&readded, &base);
        let mut later = base.clone();
        later
            .jobs
            .get_mut(&EntityId::from("j1"))
            .and_then(|job| job.procedures.get_mut(&EntityId::from("p1")))
            .unwrap()
            .machine_id = Some(EntityId::from("m2"));
        assert!(conflict_has_related_changes(&conflict, &step(&base, &later)));
    }

    #[test]
    fn machine_readd_relates_to_procedures_created_on_it() {
        let base = sample_form();
        let mut readded = base.clone();
        remove_machine(&mut readded, "m2");
        let conflict = operation(&readded, &base);

        let mut with_procedure = base.clone();
        with_procedure
            .jobs
            .get_mut(&EntityId::from("j2"))
            .unwrap()
            .procedures
            .push(EntityId::from("p9"), procedure("j2", "p9", Some("m2"), 10));
        assert!(conflict_has_related_changes(&conflict, &step(&base, &with_procedure)));

        let mut with_job = base.clone();
        let mut job = Job::new(EntityId::from("j9"), "Bolt");
        job.procedures
            .push(EntityId::from("p9"), procedure("j9", "p9", Some("m2"), 10));
        with_job.jobs.push(EntityId::from("j9"), job);
        assert!(conflict_has_related_changes(&conflict, &step(&base, &with_job)));

        let mut elsewhere = base.clone();
        elsewhere
            .jobs
            .get_mut(&EntityId::from("j2"))
            .unwrap()
            .procedures
            .push(EntityId::from("p9"), procedure("j2", "p9", Some("m1"), 10));
        assert!(!conflict_has_related_changes(&conflict, &step(&base, &elsewhere)));
    }

    #[test]
    fn job_removal_relates_to_its_procedures_and_color() {
        let base = sample_form();
        let mut without = base.clone();
        without.jobs.remove(&EntityId::from("j2"));
        without.job_colors.remove(&EntityId::from("j2"));
        let conflict = operation(&without, &base);

        let mut retimed = base.clone();
        retimed
            .jobs
            .get_mut(&EntityId::from("j2"))
            .and_then(|job| job.procedures.get_mut(&EntityId::from("p3")))
            .unwrap()
            .processing_time_ms = 9;
        assert!(conflict_has_related_changes(&conflict, &step(&base, &retimed)));

        let mut recolored = base.clone();
        recolored.job_colors.get_mut(&EntityId::from("j2")).unwrap().color = "#000".into();
        assert!(conflict_has_related_changes(&conflict, &step(&base, &recolored)));
    }

    #[test]
    fn unrelated_entities_are_independent() {
        let base = sample_form();
        let mut without = base.clone();
        without.jobs.remove(&EntityId::from("j2"));
        without.job_colors.remove(&EntityId::from("j2"));
        let conflict = operation(&without, &base);

        let mut renamed = base.clone();
        renamed.machines.get_mut(&EntityId::from("m1")).unwrap().title = "X".into();
        renamed.jobs.get_mut(&EntityId::from("j1")).unwrap().title = "Y".into();
        assert!(!conflict_has_related_changes(&conflict, &step(&base, &renamed)));
    }

    #[test]
    fn relation_is_symmetric() {
        let base = sample_form();
        let mut retimed = base.clone();
        retimed
            .jobs
            .get_mut(&EntityId::from("j1"))
            .and_then(|job| job.procedures.get_mut(&EntityId::from("p2")))
            .unwrap()
            .processing_time_ms = 9;
        let conflict = operation(&base, &retimed);

        let mut removed = retimed.clone();
        removed
            .jobs
            .get_mut(&EntityId::from("j1"))
            .unwrap()
            .procedures
            .remove(&EntityId::from("p2"));
        assert!(conflict_has_related_changes(&conflict, &step(&retimed, &removed)));
    }
}
