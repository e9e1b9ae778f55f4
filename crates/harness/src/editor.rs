use std::ops::{Deref, DerefMut};

use jobset_core::{EntityId, FormData, StepId};
use jobset_engine::{EditorAction, EditorConfig, Editor, EngineError, Step};
use jobset_storage::SqliteJobSetStore;

/// An [`Editor`] over a [`crate::TestServer`] connection, with shorthands
/// for the edits tests make most often.
pub struct TestEditor {
    editor: Editor<SqliteJobSetStore>,
}

impl TestEditor {
    pub fn new(store: SqliteJobSetStore, config: EditorConfig) -> Self {
        Self {
            editor: Editor::new(store, config),
        }
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), EngineError> {
        self.editor.dispatch(EditorAction::SetTitle(title.to_string()))
    }

    pub fn rename_machine(&mut self, machine_id: &EntityId, title: &str) -> Result<(), EngineError> {
        self.editor.dispatch(EditorAction::SetMachineTitle {
            machine_id: machine_id.clone(),
            title: title.to_string(),
        })
    }

    pub fn remove_machine(&mut self, machine_id: &EntityId) -> Result<(), EngineError> {
        self.editor
            .dispatch(EditorAction::RemoveMachine(machine_id.clone()))
    }

    pub fn remove_job(&mut self, job_id: &EntityId) -> Result<(), EngineError> {
        self.editor.dispatch(EditorAction::RemoveJob(job_id.clone()))
    }

    pub fn set_processing_time(
        &mut self,
        job_id: &EntityId,
        procedure_id: &EntityId,
        processing_time_ms: i64,
    ) -> Result<(), EngineError> {
        self.editor
            .dispatch(EditorAction::SetProcedureProcessingTime {
                job_id: job_id.clone(),
                procedure_id: procedure_id.clone(),
                processing_time_ms,
            })
    }

    pub fn steps(&self) -> &[Step] {
        &self.editor.state().steps
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps().iter().map(|step| step.name.clone()).collect()
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps().last()
    }

    pub fn last_step_id(&self) -> Option<StepId> {
        self.last_step().map(|step| step.id.clone())
    }

    pub fn snapshot(&self) -> FormData {
        self.editor.form().clone()
    }
}

impl Deref for TestEditor {
    type Target = Editor<SqliteJobSetStore>;

    fn deref(&self) -> &Self::Target {
        &self.editor
    }
}

impl DerefMut for TestEditor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.editor
    }
}
