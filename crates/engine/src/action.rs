use jobset_core::{
    EntityId, FieldPath, FormData, Job, JobColor, JobSetId, Machine, Procedure, StepId,
    TimeOptions, VersionToken,
};

use crate::state::Notification;
use crate::steps::Step;
use crate::validation::ValidationIssue;

#[derive(Debug, Clone)]
pub enum EditorAction {
    // Document
    SetTitle(String),
    SetDescription(String),
    SetIsAutoTimeOptions(bool),
    SetManualTimeOptions(TimeOptions),

    // Machines
    AddMachine(Machine),
    /// Also clears every procedure reference to the machine.
    RemoveMachine(EntityId),
    MoveMachine { from: usize, to: usize },
    SetMachineTitle { machine_id: EntityId, title: String },
    SetMachineDescription { machine_id: EntityId, description: String },

    // Jobs
    AddJob { job: Job, color: JobColor },
    RemoveJob(EntityId),
    MoveJob { from: usize, to: usize },
    SetJobTitle { job_id: EntityId, title: String },
    SetJobColor { job_id: EntityId, color: JobColor },

    // Procedures
    AddProcedure(Procedure),
    RemoveProcedure { job_id: EntityId, procedure_id: EntityId },
    MoveProcedure { job_id: EntityId, from: usize, to: usize },
    SetProcedureMachine {
        job_id: EntityId,
        procedure_id: EntityId,
        machine_id: Option<EntityId>,
    },
    SetProcedureProcessingTime {
        job_id: EntityId,
        procedure_id: EntityId,
        processing_time_ms: i64,
    },

    // History
    /// Splice `steps` over the current step.
    ReplaceLastStep(Vec<Step>),
    Undo,
    Redo,
    JumpToStep(usize),
    ToggleConflict { step_id: StepId, operation_index: usize },

    // Remote
    LoadFromRemote {
        job_set_id: JobSetId,
        form: FormData,
        version_token: VersionToken,
        is_locked: bool,
    },
    RefreshReceived {
        form: FormData,
        version_token: VersionToken,
        is_locked: bool,
    },
    Reset,

    // Derived state
    SetAutoTimeOptions(TimeOptions),
    SetValidation(Vec<ValidationIssue>),

    // UI state
    Focus(FieldPath),
    Blur,
    SetHistoryPanelOpen(bool),
    Notify(Notification),
    DismissNotification(usize),

    // Save lifecycle
    SaveStarted { step_id: StepId },
    SaveSucceeded {
        step_id: StepId,
        version_token: VersionToken,
        saved: FormData,
    },
    /// `message` is surfaced as a notification when present.
    SaveFailed { step_id: StepId, message: Option<String> },
}

impl EditorAction {
    /// Editing actions are recorded in the history. Everything else manages
    /// the history itself or is UI and remote plumbing.
    pub fn records_step(&self) -> bool {
        matches!(
            self,
            Self::SetTitle(_)
                | Self::SetDescription(_)
                | Self::SetIsAutoTimeOptions(_)
                | Self::SetManualTimeOptions(_)
                | Self::AddMachine(_)
                | Self::RemoveMachine(_)
                | Self::MoveMachine { .. }
                | Self::SetMachineTitle { .. }
                | Self::SetMachineDescription { .. }
                | Self::AddJob { .. }
                | Self::RemoveJob(_)
                | Self::MoveJob { .. }
                | Self::SetJobTitle { .. }
                | Self::SetJobColor { .. }
                | Self::AddProcedure(_)
                | Self::RemoveProcedure { .. }
                | Self::MoveProcedure { .. }
                | Self::SetProcedureMachine { .. }
                | Self::SetProcedureProcessingTime { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetTitle(_) => "set title",
            Self::SetDescription(_) => "set description",
            Self::SetIsAutoTimeOptions(_) => "toggle auto time options",
            Self::SetManualTimeOptions(_) => "set manual time options",
            Self::AddMachine(_) => "add machine",
            Self::RemoveMachine(_) => "remove machine",
            Self::MoveMachine { .. } => "move machine",
            Self::SetMachineTitle { .. } => "set machine title",
            Self::SetMachineDescription { .. } => "set machine description",
            Self::AddJob { .. } => "add job",
            Self::RemoveJob(_) => "remove job",
            Self::MoveJob { .. } => "move job",
            Self::SetJobTitle { .. } => "set job title",
            Self::SetJobColor { .. } => "set job color",
            Self::AddProcedure(_) => "add procedure",
            Self::RemoveProcedure { .. } => "remove procedure",
            Self::MoveProcedure { .. } => "move procedure",
            Self::SetProcedureMachine { .. } => "set procedure machine",
            Self::SetProcedureProcessingTime { .. } => "set procedure processing time",
            Self::ReplaceLastStep(_) => "replace last step",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::JumpToStep(_) => "jump to step",
            Self::ToggleConflict { .. } => "toggle conflict",
            Self::LoadFromRemote { .. } => "load from remote",
            Self::RefreshReceived { .. } => "refresh received",
            Self::Reset => "reset",
            Self::SetAutoTimeOptions(_) => "set auto time options",
            Self::SetValidation(_) => "set validation",
            Self::Focus(_) => "focus",
            Self::Blur => "blur",
            Self::SetHistoryPanelOpen(_) => "set history panel open",
            Self::Notify(_) => "notify",
            Self::DismissNotification(_) => "dismiss notification",
            Self::SaveStarted { .. } => "save started",
            Self::SaveSucceeded { .. } => "save succeeded",
            Self::SaveFailed { .. } => "save failed",
        }
    }
}
