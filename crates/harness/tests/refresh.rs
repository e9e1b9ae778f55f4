use jobset_core::EntityId;
use jobset_engine::{EditorAction, EngineError, SaveOutcome};
use jobset_harness::{job_titles, machine_titles, workshop_form, TestServer};

// ============================================================================
// Refresh
// ============================================================================

#[test]
fn refresh_without_local_edits_loads_newer_version() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut editor = server.editor()?;
    editor.load(&id)?;

    let mut newer = workshop_form();
    newer.title = "Night shift".to_string();
    server.overwrite(&id, &newer)?;

    assert!(editor.refresh()?);
    assert_eq!(editor.form().title, "Night shift");
    assert_eq!(editor.step_names(), vec!["", "Load newer version"]);
    assert!(!editor.state().has_unsaved_changes());

    // Undo steps back to the snapshot we originally loaded.
    editor.undo()?;
    assert_eq!(editor.form().title, "Workshop");
    Ok(())
}

#[test]
fn refresh_against_same_version_changes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut editor = server.editor()?;
    editor.load(&id)?;
    editor.set_title("Mine")?;

    editor.refresh()?;
    assert_eq!(editor.step_names(), vec!["", "Edit name"]);
    assert_eq!(editor.form().title, "Mine");
    Ok(())
}

#[test]
fn disjoint_edits_merge() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut editor = server.editor()?;
    editor.load(&id)?;
    editor.rename_machine(&EntityId::from("m1"), "Local lathe")?;

    let mut newer = workshop_form();
    if let Some(job) = newer.jobs.get_mut(&EntityId::from("j2")) {
        job.title = "Remote gear".to_string();
    }
    server.overwrite(&id, &newer)?;
    editor.refresh()?;

    let step = editor.last_step().ok_or("no refresh step")?;
    assert_eq!(step.name, "Merge newer version");
    assert!(step.conflicts().next().is_none());
    assert_eq!(machine_titles(editor.form()), vec!["Local lathe", "Mill"]);
    assert_eq!(job_titles(editor.form()), vec!["Shaft", "Remote gear"]);
    assert!(editor.state().has_unsaved_changes());
    Ok(())
}

#[test]
fn conflicting_edits_can_be_resolved_either_way() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut mine = server.editor()?;
    let mut theirs = server.editor()?;
    mine.load(&id)?;
    theirs.load(&id)?;

    theirs.rename_machine(&EntityId::from("m1"), "Their lathe")?;
    assert!(matches!(theirs.save()?, SaveOutcome::Saved(_)));

    mine.rename_machine(&EntityId::from("m1"), "My lathe")?;
    mine.refresh()?;
    let step = mine.last_step().ok_or("no refresh step")?.clone();
    let (index, conflict) = step.conflicts().next().ok_or("no conflict")?;
    assert_eq!(conflict.conflict_name.as_deref(), Some("Edit machine name"));
    assert_eq!(machine_titles(mine.form())[0], "Their lathe");

    mine.toggle_conflict(&step.id, index)?;
    assert_eq!(machine_titles(mine.form())[0], "My lathe");

    assert!(matches!(mine.save()?, SaveOutcome::Saved(_)));
    assert_eq!(machine_titles(&server.load_form(&id)?)[0], "My lathe");
    Ok(())
}

#[test]
fn remote_removal_conflicts_with_local_rename() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut mine = server.editor()?;
    let mut theirs = server.editor()?;
    mine.load(&id)?;
    theirs.load(&id)?;

    theirs.remove_machine(&EntityId::from("m2"))?;
    theirs.save()?;

    mine.rename_machine(&EntityId::from("m2"), "My mill")?;
    mine.refresh()?;
    let step = mine.last_step().ok_or("no refresh step")?;
    let names: Vec<_> = step
        .conflicts()
        .filter_map(|(_, operation)| operation.conflict_name.clone())
        .collect();
    assert_eq!(names, vec!["Remove machine".to_string()]);
    assert!(mine.form().machines.get(&EntityId::from("m2")).is_none());
    Ok(())
}

#[test]
fn conflict_with_later_related_edit_cannot_be_toggled() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut mine = server.editor()?;
    let mut theirs = server.editor()?;
    mine.load(&id)?;
    theirs.load(&id)?;

    theirs.set_title("Theirs")?;
    theirs.save()?;
    mine.set_title("Mine")?;
    mine.refresh()?;
    let step = mine.last_step().ok_or("no refresh step")?.clone();
    let (index, _) = step.conflicts().next().ok_or("no conflict")?;

    mine.set_title("Mine again")?;
    let err = mine.toggle_conflict(&step.id, index).unwrap_err();
    assert!(matches!(err, EngineError::ConflictHasRelatedChanges(_)));
    assert_eq!(mine.form().title, "Mine again");
    Ok(())
}

// ============================================================================
// Saving
// ============================================================================

#[test]
fn stale_save_refreshes_then_saves() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut mine = server.editor()?;
    let mut theirs = server.editor()?;
    mine.load(&id)?;
    theirs.load(&id)?;

    theirs.dispatch(EditorAction::SetJobTitle {
        job_id: EntityId::from("j1"),
        title: "Their shaft".into(),
    })?;
    theirs.save()?;

    mine.rename_machine(&EntityId::from("m2"), "My mill")?;
    assert_eq!(mine.save()?, SaveOutcome::Refreshed);
    assert_eq!(mine.last_step().map(|s| s.name.as_str()), Some("Merge newer version"));
    assert_eq!(job_titles(mine.form())[0], "Their shaft");
    assert_eq!(machine_titles(mine.form())[1], "My mill");

    assert!(matches!(mine.save()?, SaveOutcome::Saved(_)));
    let stored = server.load_form(&id)?;
    assert_eq!(job_titles(&stored)[0], "Their shaft");
    assert_eq!(machine_titles(&stored)[1], "My mill");
    assert!(!mine.state().has_unsaved_changes());
    Ok(())
}

#[test]
fn locked_job_set_rejects_edits_and_saves() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut editor = server.editor()?;
    editor.load(&id)?;
    editor.set_title("Draft")?;

    server.set_locked(&id, true)?;
    editor.refresh()?;
    assert!(editor.state().is_locked);
    assert!(matches!(editor.set_title("More"), Err(EngineError::Locked)));
    assert!(matches!(editor.save(), Err(EngineError::Locked)));
    assert_eq!(editor.form().title, "Draft");
    Ok(())
}

#[test]
fn nothing_to_save_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::new()?;
    let id = server.seed(&workshop_form())?;
    let mut editor = server.editor()?;
    editor.load(&id)?;
    assert_eq!(editor.save()?, SaveOutcome::Skipped);
    Ok(())
}
