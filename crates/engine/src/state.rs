use serde::{Deserialize, Serialize};

use jobset_core::{
    EntityId, FieldPath, FormData, JobSetId, OrderedCollection, StepId, VersionToken,
};

use crate::action::EditorAction;
use crate::config::EditorConfig;
use crate::error::EngineError;
use crate::refresh::calculate_refreshed_step;
use crate::related::conflict_has_related_changes;
use crate::replay::{job_mut, machine_mut, procedure_mut, redo_step, undo_step};
use crate::steps::{calculate_edit_steps, OperationKind, SaveStatus, Step};
use crate::validation::ValidationIssue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// The last snapshot known to match the server, and its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub version_token: VersionToken,
    pub snapshot: FormData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub job_set_id: Option<JobSetId>,
    pub form: FormData,
    pub steps: Vec<Step>,
    /// Steps up to and including this index are applied to `form`.
    pub current_step_index: usize,
    pub server: Option<ServerVersion>,
    pub is_locked: bool,
    pub focused_path: Option<FieldPath>,
    pub history_panel_open: bool,
    pub validation: Vec<ValidationIssue>,
    pub notifications: Vec<Notification>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    pub fn new() -> Self {
        Self {
            job_set_id: None,
            form: FormData::default(),
            steps: vec![Step::initial(None)],
            current_step_index: 0,
            server: None,
            is_locked: false,
            focused_path: None,
            history_panel_open: false,
            validation: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }

    pub fn can_undo(&self) -> bool {
        self.current_step_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_step_index + 1 < self.steps.len()
    }

    /// Whether the form differs from the last known server snapshot.
    pub fn has_unsaved_changes(&self) -> bool {
        match &self.server {
            Some(server) => !crate::diff::get_field_changes(&server.snapshot, &self.form).is_empty(),
            None => false,
        }
    }

    fn step_mut(&mut self, id: &StepId) -> Result<&mut Step, EngineError> {
        self.steps
            .iter_mut()
            .find(|step| step.id == *id)
            .ok_or_else(|| EngineError::StepNotFound(id.to_string()))
    }

    fn undo_once(&mut self) -> Result<(), EngineError> {
        let step = self
            .steps
            .get(self.current_step_index)
            .ok_or_else(|| EngineError::StepNotFound(self.current_step_index.to_string()))?;
        self.form = undo_step(step, &self.form)?;
        self.current_step_index -= 1;
        Ok(())
    }

    fn redo_once(&mut self) -> Result<(), EngineError> {
        let index = self.current_step_index + 1;
        let step = self
            .steps
            .get(index)
            .ok_or_else(|| EngineError::StepNotFound(index.to_string()))?;
        self.form = redo_step(step, &self.form)?;
        self.current_step_index = index;
        Ok(())
    }

    /// Drop the redo tail, put `replacement` in place of the current step and
    /// move the cursor to the end.
    fn splice_steps(&mut self, replacement: Vec<Step>, config: &EditorConfig) {
        self.steps.truncate(self.current_step_index + 1);
        self.steps.pop();
        self.steps.extend(replacement);
        self.append_steps(Vec::new(), config);
    }

    fn append_steps(&mut self, steps: Vec<Step>, config: &EditorConfig) {
        self.steps.extend(steps);
        if self.steps.is_empty() {
            self.steps.push(Step::initial(None));
        }
        let limit = config.max_history.max(1);
        if self.steps.len() > limit {
            let excess = self.steps.len() - limit;
            self.steps.drain(..excess);
            tracing::debug!("dropped {excess} oldest steps");
        }
        self.current_step_index = self.steps.len() - 1;
    }
}

/// Apply `action` to a copy of `state`.
pub fn reduce(
    state: &EditorState,
    action: EditorAction,
    config: &EditorConfig,
) -> Result<EditorState, EngineError> {
    let mut next = state.clone();

    if action.records_step() {
        if state.is_locked {
            return Err(EngineError::Locked);
        }
        apply_edit(&mut next.form, action)?;
        let current = state
            .current_step()
            .ok_or_else(|| EngineError::StepNotFound(state.current_step_index.to_string()))?;
        let replacement = calculate_edit_steps(current, &state.form, &next.form)?;
        next.splice_steps(replacement, config);
        return Ok(next);
    }

    match action {
        EditorAction::ReplaceLastStep(steps) => next.splice_steps(steps, config),
        EditorAction::Undo => {
            if next.can_undo() {
                next.undo_once()?;
            }
        }
        EditorAction::Redo => {
            if next.can_redo() {
                next.redo_once()?;
            }
        }
        EditorAction::JumpToStep(index) => {
            if index >= next.steps.len() {
                return Err(EngineError::StepNotFound(index.to_string()));
            }
            while next.current_step_index > index {
                next.undo_once()?;
            }
            while next.current_step_index < index {
                next.redo_once()?;
            }
        }
        EditorAction::ToggleConflict {
            step_id,
            operation_index,
        } => toggle_conflict(&mut next, &step_id, operation_index)?,

        EditorAction::LoadFromRemote {
            job_set_id,
            form,
            version_token,
            is_locked,
        } => {
            next = EditorState {
                job_set_id: Some(job_set_id),
                form: form.clone(),
                steps: vec![Step::initial(Some(version_token.clone()))],
                current_step_index: 0,
                server: Some(ServerVersion {
                    version_token,
                    snapshot: form,
                }),
                is_locked,
                history_panel_open: state.history_panel_open,
                notifications: state.notifications.clone(),
                ..EditorState::new()
            };
        }
        EditorAction::RefreshReceived {
            form: remote,
            version_token,
            is_locked,
        } => {
            let server = state.server.as_ref().ok_or(EngineError::NoJobSetLoaded)?;
            next.is_locked = is_locked;
            if server.version_token == version_token {
                return Ok(next);
            }
            let refreshed = calculate_refreshed_step(
                &server.snapshot,
                &state.form,
                &remote,
                version_token.clone(),
            )?;
            next.server = Some(ServerVersion {
                version_token,
                snapshot: remote,
            });
            if let Some(step) = refreshed {
                tracing::debug!(
                    "refresh step {} with {} operations",
                    step.id,
                    step.operations.len()
                );
                next.form = redo_step(&step, &next.form)?;
                next.steps.truncate(next.current_step_index + 1);
                next.append_steps(vec![step], config);
            }
        }
        EditorAction::Reset => {
            next = EditorState {
                history_panel_open: state.history_panel_open,
                notifications: state.notifications.clone(),
                ..EditorState::new()
            };
        }

        EditorAction::SetAutoTimeOptions(options) => next.form.auto_time_options = options,
        EditorAction::SetValidation(issues) => next.validation = issues,

        EditorAction::Focus(path) => next.focused_path = Some(path),
        EditorAction::Blur => next.focused_path = None,
        EditorAction::SetHistoryPanelOpen(open) => next.history_panel_open = open,
        EditorAction::Notify(notification) => next.notifications.push(notification),
        EditorAction::DismissNotification(index) => {
            if index < next.notifications.len() {
                next.notifications.remove(index);
            }
        }

        EditorAction::SaveStarted { step_id } => {
            next.step_mut(&step_id)?.save_status = Some(SaveStatus::Saving);
        }
        EditorAction::SaveSucceeded {
            step_id,
            version_token,
            saved,
        } => {
            // The server holds the write even if the step was dropped since.
            if let Ok(step) = next.step_mut(&step_id) {
                step.save_status = Some(SaveStatus::Saved);
                step.version_token = Some(version_token.clone());
            }
            next.server = Some(ServerVersion {
                version_token,
                snapshot: saved,
            });
        }
        EditorAction::SaveFailed { step_id, message } => {
            // The step may have been collapsed or trimmed meanwhile.
            if let Ok(step) = next.step_mut(&step_id) {
                step.save_status = None;
            }
            if let Some(message) = message {
                next.notifications.push(Notification::error(message));
            }
        }

        edit => return Err(EngineError::InvalidEdit(edit.name().to_string())),
    }
    Ok(next)
}

fn toggle_conflict(
    state: &mut EditorState,
    step_id: &StepId,
    operation_index: usize,
) -> Result<(), EngineError> {
    let position = state
        .steps
        .iter()
        .position(|step| step.id == *step_id)
        .ok_or_else(|| EngineError::StepNotFound(step_id.to_string()))?;
    let conflict = state.steps[position]
        .operations
        .get(operation_index)
        .filter(|operation| operation.kind == OperationKind::Conflict)
        .ok_or_else(|| EngineError::NotAConflict {
            step: step_id.to_string(),
            index: operation_index,
        })?;
    if state.steps[position + 1..]
        .iter()
        .any(|later| conflict_has_related_changes(conflict, later))
    {
        return Err(EngineError::ConflictHasRelatedChanges(step_id.to_string()));
    }

    let cursor = state.current_step_index;
    let applied_range = position..=cursor;
    let mut form = state.form.clone();
    if position <= cursor {
        for step in state.steps[applied_range.clone()].iter().rev() {
            form = undo_step(step, &form)?;
        }
    }

    let operation = &mut state.steps[position].operations[operation_index];
    operation.conflict_applied = Some(operation.conflict_applied == Some(false));

    if position <= cursor {
        for step in &state.steps[applied_range] {
            form = redo_step(step, &form)?;
        }
        state.form = form;
    }
    Ok(())
}

fn move_within<T>(
    collection: &mut OrderedCollection<T>,
    from: usize,
    to: usize,
    label: &str,
) -> Result<(), EngineError> {
    if collection.move_item(from, to) {
        Ok(())
    } else {
        Err(EngineError::InvalidEdit(format!(
            "cannot move {label} from {from} to {to}"
        )))
    }
}

fn ensure_machine(form: &FormData, machine_id: Option<&EntityId>) -> Result<(), EngineError> {
    match machine_id {
        Some(id) if !form.machines.contains(id) => {
            Err(EngineError::MissingEntity(format!("machine {id}")))
        }
        _ => Ok(()),
    }
}

fn apply_edit(form: &mut FormData, action: EditorAction) -> Result<(), EngineError> {
    match action {
        EditorAction::SetTitle(title) => form.title = title,
        EditorAction::SetDescription(description) => form.description = description,
        EditorAction::SetIsAutoTimeOptions(flag) => form.is_auto_time_options = flag,
        EditorAction::SetManualTimeOptions(options) => form.manual_time_options = options,

        EditorAction::AddMachine(machine) => {
            if form.machines.contains(&machine.id) {
                return Err(EngineError::InvalidEdit(format!(
                    "machine {} already exists",
                    machine.id
                )));
            }
            form.machines.push(machine.id.clone(), machine);
        }
        EditorAction::RemoveMachine(machine_id) => {
            form.machines
                .remove(&machine_id)
                .ok_or_else(|| EngineError::MissingEntity(format!("machine {machine_id}")))?;
            for job in form.jobs.entities.values_mut() {
                for procedure in job.procedures.entities.values_mut() {
                    if procedure.machine_id.as_ref() == Some(&machine_id) {
                        procedure.machine_id = None;
                    }
                }
            }
        }
        EditorAction::MoveMachine { from, to } => move_within(&mut form.machines, from, to, "machine")?,
        EditorAction::SetMachineTitle { machine_id, title } => {
            machine_mut(form, &machine_id)?.title = title
        }
        EditorAction::SetMachineDescription {
            machine_id,
            description,
        } => machine_mut(form, &machine_id)?.description = description,

        EditorAction::AddJob { job, color } => {
            if form.jobs.contains(&job.id) {
                return Err(EngineError::InvalidEdit(format!("job {} already exists", job.id)));
            }
            let job_id = job.id.clone();
            form.jobs.push(job_id.clone(), job);
            form.job_colors.push(job_id, color);
        }
        EditorAction::RemoveJob(job_id) => {
            form.jobs
                .remove(&job_id)
                .ok_or_else(|| EngineError::MissingEntity(format!("job {job_id}")))?;
            form.job_colors.remove(&job_id);
        }
        EditorAction::MoveJob { from, to } => {
            move_within(&mut form.jobs, from, to, "job")?;
            // Colors follow job order; colors without a job stay at the end.
            let order: Vec<EntityId> = form
                .jobs
                .ids
                .iter()
                .filter(|id| form.job_colors.contains(id))
                .chain(form.job_colors.ids.iter().filter(|id| !form.jobs.contains(id)))
                .cloned()
                .collect();
            form.job_colors.ids = order;
        }
        EditorAction::SetJobTitle { job_id, title } => job_mut(form, &job_id)?.title = title,
        EditorAction::SetJobColor { job_id, color } => {
            if !form.jobs.contains(&job_id) {
                return Err(EngineError::MissingEntity(format!("job {job_id}")));
            }
            match form.job_colors.get_mut(&job_id) {
                Some(existing) => *existing = color,
                None => form.job_colors.push(job_id, color),
            }
        }

        EditorAction::AddProcedure(procedure) => {
            ensure_machine(form, procedure.machine_id.as_ref())?;
            let job = job_mut(form, &procedure.job_id)?;
            if job.procedures.contains(&procedure.id) {
                return Err(EngineError::InvalidEdit(format!(
                    "procedure {} already exists",
                    procedure.id
                )));
            }
            job.procedures.push(procedure.id.clone(), procedure);
        }
        EditorAction::RemoveProcedure {
            job_id,
            procedure_id,
        } => {
            job_mut(form, &job_id)?
                .procedures
                .remove(&procedure_id)
                .ok_or_else(|| EngineError::MissingEntity(format!("procedure {procedure_id}")))?;
        }
        EditorAction::MoveProcedure { job_id, from, to } => {
            move_within(&mut job_mut(form, &job_id)?.procedures, from, to, "procedure")?
        }
        EditorAction::SetProcedureMachine {
            job_id,
            procedure_id,
            machine_id,
        } => {
            ensure_machine(form, machine_id.as_ref())?;
            procedure_mut(form, &job_id, &procedure_id)?.machine_id = machine_id;
        }
        EditorAction::SetProcedureProcessingTime {
            job_id,
            procedure_id,
            processing_time_ms,
        } => procedure_mut(form, &job_id, &procedure_id)?.processing_time_ms = processing_time_ms,

        other => return Err(EngineError::InvalidEdit(other.name().to_string())),
    }
    Ok(())
}
