pub mod action;
pub mod auto_time;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod refresh;
pub mod related;
pub mod replay;
pub mod state;
pub mod steps;
pub mod store;
pub mod validation;

#[cfg(test)]
mod testing;

pub use action::EditorAction;
pub use auto_time::compute_auto_time_options;
pub use config::EditorConfig;
pub use diff::get_field_changes;
pub use error::EngineError;
pub use fetch::{FetchRegistry, FetchTicket, TakePolicy};
pub use refresh::calculate_refreshed_step;
pub use related::conflict_has_related_changes;
pub use replay::{redo_step, undo_step};
pub use state::{reduce, EditorState, Notification, NotificationLevel, ServerVersion};
pub use steps::{
    calculate_edit_steps, calculate_step_name, combine_field_changes, CombinedChange,
    MergeBehaviour, Operation, OperationKind, SaveStatus, Step,
};
pub use store::{Store, SubscriptionId};
pub use validation::{validate, Severity, ValidationIssue};

use jobset_core::{
    EntityId, FormData, Job, JobSetId, Machine, Procedure, StepId, VersionToken,
};
use jobset_storage::{JobSetDraft, JobSetRecord, JobSetStore, StorageError};

const LOAD_JOB_SET: &str = "load job set";
const CREATE_JOB_SET: &str = "create job set";
const SAVE_JOB_SET: &str = "save job set";
const REFRESH_JOB_SET: &str = "refresh job set";
const DELETE_JOB_SET: &str = "delete job set";

/// A remote call that has returned but whose result is not applied yet.
#[derive(Debug)]
pub struct Pending<T> {
    ticket: FetchTicket,
    result: Result<T, StorageError>,
}

#[derive(Debug)]
pub struct Created {
    pub job_set_id: JobSetId,
    pub version_token: VersionToken,
    form: FormData,
}

#[derive(Debug)]
pub struct PendingSave {
    ticket: FetchTicket,
    step_id: StepId,
    saved: FormData,
    result: Result<VersionToken, StorageError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(VersionToken),
    /// Nothing to save, or a newer save superseded this one.
    Skipped,
    /// The server had a newer version; it was merged in as a refresh step.
    Refreshed,
}

/// One editing session over a job set held by `S`.
pub struct Editor<S: JobSetStore> {
    backend: S,
    store: Store,
    fetches: FetchRegistry,
}

impl<S: JobSetStore> Editor<S> {
    pub fn new(backend: S, config: EditorConfig) -> Self {
        Self {
            backend,
            store: Store::new(config),
            fetches: FetchRegistry::new(),
        }
    }

    pub fn state(&self) -> &EditorState {
        self.store.state()
    }

    pub fn form(&self) -> &FormData {
        &self.store.state().form
    }

    pub fn config(&self) -> &EditorConfig {
        self.store.config()
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EditorState) + 'static) -> SubscriptionId {
        self.store.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub fn dispatch(&mut self, action: EditorAction) -> Result<(), EngineError> {
        self.store.dispatch(action)
    }

    /// Report a failed remote call to the user and hand the error back.
    fn surface<T, E: Into<EngineError>>(
        &mut self,
        what: &str,
        result: Result<T, E>,
    ) -> Result<T, EngineError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let err = err.into();
                tracing::warn!("{what} failed: {err}");
                self.store
                    .dispatch(EditorAction::Notify(Notification::error(format!(
                        "{what} failed: {err}"
                    ))))?;
                Err(err)
            }
        }
    }

    fn loaded_id(&self) -> Result<JobSetId, EngineError> {
        self.state()
            .job_set_id
            .clone()
            .ok_or(EngineError::NoJobSetLoaded)
    }

    // ========================================================================
    // Load
    // ========================================================================

    pub fn begin_load(&mut self, id: &JobSetId) -> Option<Pending<JobSetRecord>> {
        let ticket = self.fetches.begin(LOAD_JOB_SET, TakePolicy::Latest)?;
        let result = self.backend.load(id);
        Some(Pending { ticket, result })
    }

    /// Returns false when a newer load superseded this one.
    pub fn finish_load(&mut self, pending: Pending<JobSetRecord>) -> Result<bool, EngineError> {
        if !self.fetches.complete(&pending.ticket) {
            return Ok(false);
        }
        let record = self.surface("Loading", pending.result)?;
        let form = self.surface("Loading", record.to_form_data())?;
        self.store.dispatch(EditorAction::LoadFromRemote {
            job_set_id: record.id,
            form,
            version_token: record.version_token,
            is_locked: record.is_locked,
        })?;
        Ok(true)
    }

    pub fn load(&mut self, id: &JobSetId) -> Result<bool, EngineError> {
        match self.begin_load(id) {
            Some(pending) => self.finish_load(pending),
            None => Ok(false),
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Returns `Ok(None)` when a create is already in flight.
    pub fn begin_create(&mut self, form: &FormData) -> Result<Option<Pending<Created>>, EngineError> {
        let draft = JobSetDraft::from_form_data(form)?;
        let Some(ticket) = self.fetches.begin(CREATE_JOB_SET, TakePolicy::Leading) else {
            return Ok(None);
        };
        let result = self
            .backend
            .create(&draft)
            .map(|(job_set_id, version_token)| Created {
                job_set_id,
                version_token,
                form: form.clone(),
            });
        Ok(Some(Pending { ticket, result }))
    }

    pub fn finish_create(&mut self, pending: Pending<Created>) -> Result<Option<JobSetId>, EngineError> {
        if !self.fetches.complete(&pending.ticket) {
            return Ok(None);
        }
        let created = self.surface("Creating", pending.result)?;
        self.store.dispatch(EditorAction::LoadFromRemote {
            job_set_id: created.job_set_id.clone(),
            form: created.form,
            version_token: created.version_token,
            is_locked: false,
        })?;
        Ok(Some(created.job_set_id))
    }

    pub fn create(&mut self, form: &FormData) -> Result<Option<JobSetId>, EngineError> {
        match self.begin_create(form)? {
            Some(pending) => self.finish_create(pending),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Send the current form with the last known version token. Returns
    /// `Ok(None)` when there is nothing to save.
    pub fn begin_save(&mut self) -> Result<Option<PendingSave>, EngineError> {
        let job_set_id = self.loaded_id()?;
        let state = self.store.state();
        if state.is_locked {
            return Err(EngineError::Locked);
        }
        let Some(server) = &state.server else {
            return Err(EngineError::NoJobSetLoaded);
        };
        if !state.has_unsaved_changes() {
            return Ok(None);
        }
        let expected = server.version_token.clone();
        let step_id = state
            .current_step()
            .map(|step| step.id.clone())
            .ok_or_else(|| EngineError::StepNotFound(state.current_step_index.to_string()))?;
        let saved = state.form.clone();
        let draft = JobSetDraft::from_form_data(&saved)?;

        let Some(ticket) = self.fetches.begin(SAVE_JOB_SET, TakePolicy::Latest) else {
            return Ok(None);
        };
        self.store.dispatch(EditorAction::SaveStarted {
            step_id: step_id.clone(),
        })?;
        let result = self.backend.update(&job_set_id, &draft, &expected);
        Ok(Some(PendingSave {
            ticket,
            step_id,
            saved,
            result,
        }))
    }

    /// Apply a save result. A stale version token is not an error: the newer
    /// server version is fetched and merged in instead.
    pub fn finish_save(&mut self, pending: PendingSave) -> Result<SaveOutcome, EngineError> {
        let PendingSave {
            ticket,
            step_id,
            saved,
            result,
        } = pending;
        if !self.fetches.complete(&ticket) {
            self.store.dispatch(EditorAction::SaveFailed {
                step_id,
                message: None,
            })?;
            return Ok(SaveOutcome::Skipped);
        }
        match result {
            Ok(version_token) => {
                self.store.dispatch(EditorAction::SaveSucceeded {
                    step_id,
                    version_token: version_token.clone(),
                    saved,
                })?;
                Ok(SaveOutcome::Saved(version_token))
            }
            Err(StorageError::VersionConditionFailed(_)) => {
                tracing::debug!("save rejected as stale, refreshing");
                self.store.dispatch(EditorAction::SaveFailed {
                    step_id,
                    message: None,
                })?;
                self.refresh()?;
                Ok(SaveOutcome::Refreshed)
            }
            Err(err) => {
                self.store.dispatch(EditorAction::SaveFailed {
                    step_id,
                    message: Some(format!("Saving failed: {err}")),
                })?;
                Err(err.into())
            }
        }
    }

    pub fn save(&mut self) -> Result<SaveOutcome, EngineError> {
        match self.begin_save()? {
            Some(pending) => self.finish_save(pending),
            None => Ok(SaveOutcome::Skipped),
        }
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    pub fn begin_refresh(&mut self) -> Result<Option<Pending<JobSetRecord>>, EngineError> {
        let job_set_id = self.loaded_id()?;
        let Some(ticket) = self.fetches.begin(REFRESH_JOB_SET, TakePolicy::Latest) else {
            return Ok(None);
        };
        let result = self.backend.load(&job_set_id);
        Ok(Some(Pending { ticket, result }))
    }

    /// Merge the fetched version into the history. Returns false when a
    /// newer refresh superseded this one.
    pub fn finish_refresh(&mut self, pending: Pending<JobSetRecord>) -> Result<bool, EngineError> {
        if !self.fetches.complete(&pending.ticket) {
            return Ok(false);
        }
        let record = self.surface("Refreshing", pending.result)?;
        let form = self.surface("Refreshing", record.to_form_data())?;
        self.store.dispatch(EditorAction::RefreshReceived {
            form,
            version_token: record.version_token,
            is_locked: record.is_locked,
        })?;
        Ok(true)
    }

    pub fn refresh(&mut self) -> Result<bool, EngineError> {
        match self.begin_refresh()? {
            Some(pending) => self.finish_refresh(pending),
            None => Ok(false),
        }
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Returns `Ok(None)` when a delete is already in flight.
    pub fn begin_delete(&mut self) -> Result<Option<Pending<()>>, EngineError> {
        let job_set_id = self.loaded_id()?;
        let Some(ticket) = self.fetches.begin(DELETE_JOB_SET, TakePolicy::Leading) else {
            return Ok(None);
        };
        let result = self.backend.delete(&job_set_id);
        Ok(Some(Pending { ticket, result }))
    }

    pub fn finish_delete(&mut self, pending: Pending<()>) -> Result<bool, EngineError> {
        if !self.fetches.complete(&pending.ticket) {
            return Ok(false);
        }
        self.surface("Deleting", pending.result)?;
        self.fetches.cancel(SAVE_JOB_SET);
        self.fetches.cancel(REFRESH_JOB_SET);
        self.store.dispatch(EditorAction::Reset)?;
        Ok(true)
    }

    pub fn delete(&mut self) -> Result<bool, EngineError> {
        match self.begin_delete()? {
            Some(pending) => self.finish_delete(pending),
            None => Ok(false),
        }
    }

    // ========================================================================
    // Editing helpers
    // ========================================================================

    pub fn add_machine(&mut self, title: &str) -> Result<EntityId, EngineError> {
        let id = EntityId::new();
        self.store.dispatch(EditorAction::AddMachine(Machine {
            id: id.clone(),
            title: title.to_string(),
            description: String::new(),
        }))?;
        Ok(id)
    }

    /// Add a job with the next palette color.
    pub fn add_job(&mut self, title: &str) -> Result<EntityId, EngineError> {
        let id = EntityId::new();
        let color = self.config().job_color(self.form().jobs.len());
        self.store.dispatch(EditorAction::AddJob {
            job: Job::new(id.clone(), title),
            color,
        })?;
        Ok(id)
    }

    pub fn add_procedure(
        &mut self,
        job_id: &EntityId,
        machine_id: Option<&EntityId>,
    ) -> Result<EntityId, EngineError> {
        let id = EntityId::new();
        let processing_time_ms = self.config().default_processing_time_ms;
        self.store.dispatch(EditorAction::AddProcedure(Procedure {
            id: id.clone(),
            job_id: job_id.clone(),
            machine_id: machine_id.cloned(),
            processing_time_ms,
        }))?;
        Ok(id)
    }

    pub fn undo(&mut self) -> Result<(), EngineError> {
        self.store.dispatch(EditorAction::Undo)
    }

    pub fn redo(&mut self) -> Result<(), EngineError> {
        self.store.dispatch(EditorAction::Redo)
    }

    pub fn jump_to_step(&mut self, index: usize) -> Result<(), EngineError> {
        self.store.dispatch(EditorAction::JumpToStep(index))
    }

    pub fn toggle_conflict(&mut self, step_id: &StepId, operation_index: usize) -> Result<(), EngineError> {
        self.store.dispatch(EditorAction::ToggleConflict {
            step_id: step_id.clone(),
            operation_index,
        })
    }
}
