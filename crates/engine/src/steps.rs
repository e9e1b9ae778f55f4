use serde::{Deserialize, Serialize};

use jobset_core::changes::flatten;
use jobset_core::{
    ChangeEntry, ChangeKind, CollectionChange, CollectionPath, FieldChange, FieldPath, FormData,
    JobColorField, JobField, MachineField, ProcedureField, StepId, VersionToken,
};

use crate::diff::get_field_changes;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "edit")]
    Edit,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "conflict")]
    Conflict,
    #[serde(rename = "reverse local")]
    ReverseLocal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: OperationKind,
    pub field_changes: Vec<ChangeEntry>,
    pub conflict_name: Option<String>,
    /// Conflicts only: whether the remote side currently wins.
    pub conflict_applied: Option<bool>,
    pub applied: bool,
}

impl Operation {
    pub fn edit(field_changes: Vec<ChangeEntry>) -> Self {
        Self {
            kind: OperationKind::Edit,
            field_changes,
            conflict_name: None,
            conflict_applied: None,
            applied: true,
        }
    }

    /// Whether replay includes this operation's changes.
    pub fn is_effective(&self) -> bool {
        self.applied && self.conflict_applied != Some(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeBehaviour {
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "discard local changes")]
    DiscardLocalChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveStatus {
    #[serde(rename = "saving")]
    Saving,
    #[serde(rename = "saved")]
    Saved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub operations: Vec<Operation>,
    /// Set when the snapshot after this step equals a known server version.
    pub version_token: Option<VersionToken>,
    pub merge_behaviour: Option<MergeBehaviour>,
    pub save_status: Option<SaveStatus>,
}

impl Step {
    pub fn new(name: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            id: StepId::new(),
            name: name.into(),
            operations,
            version_token: None,
            merge_behaviour: None,
            save_status: None,
        }
    }

    /// The as-loaded snapshot.
    pub fn initial(version_token: Option<VersionToken>) -> Self {
        Self {
            id: StepId::initial(),
            name: String::new(),
            operations: Vec::new(),
            version_token,
            merge_behaviour: None,
            save_status: None,
        }
    }

    pub fn conflicts(&self) -> impl Iterator<Item = (usize, &Operation)> {
        self.operations
            .iter()
            .enumerate()
            .filter(|(_, operation)| operation.kind == OperationKind::Conflict)
    }
}

/// Result of folding a new change into the previous step's change.
#[derive(Debug, PartialEq, Eq)]
pub enum CombinedChange {
    /// The two changes cancel out.
    NoOp,
    Change(FieldChange),
    Incompatible,
}

pub fn combine_field_changes(old: &FieldChange, new: &FieldChange) -> CombinedChange {
    if old.path != new.path {
        return CombinedChange::Incompatible;
    }
    match (&old.change, &new.change) {
        (ChangeKind::Value { previous, .. }, ChangeKind::Value { new: latest, .. }) => {
            if previous == latest {
                CombinedChange::NoOp
            } else {
                CombinedChange::Change(FieldChange::value(
                    old.path.clone(),
                    previous.clone(),
                    latest.clone(),
                ))
            }
        }
        (
            ChangeKind::Collection(CollectionChange::Move { previous, .. }),
            ChangeKind::Collection(CollectionChange::Move { new: latest, .. }),
        ) => {
            // Only an exact return to the earlier order collapses.
            if previous == latest {
                CombinedChange::NoOp
            } else {
                CombinedChange::Change(FieldChange::collection(
                    old.path.clone(),
                    CollectionChange::Move {
                        previous: previous.clone(),
                        new: latest.clone(),
                    },
                ))
            }
        }
        _ => CombinedChange::Incompatible,
    }
}

/// The single change of a step that later edits may fold into.
fn combinable_change(step: &Step) -> Option<&FieldChange> {
    if step.version_token.is_some() || step.save_status.is_some() || step.merge_behaviour.is_some()
    {
        return None;
    }
    match step.operations.as_slice() {
        [operation] if operation.kind == OperationKind::Edit => {
            match operation.field_changes.as_slice() {
                [ChangeEntry::Single(change)] => Some(change),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Steps that replace `previous_step` at the end of the log after an edit
/// turned `previous` into `current`.
pub fn calculate_edit_steps(
    previous_step: &Step,
    previous: &FormData,
    current: &FormData,
) -> Result<Vec<Step>, EngineError> {
    let entries = get_field_changes(previous, current);
    let changes = flatten(&entries);
    if changes.is_empty() {
        return Ok(vec![previous_step.clone()]);
    }

    if let ([change], Some(earlier)) = (changes.as_slice(), combinable_change(previous_step)) {
        match combine_field_changes(earlier, change) {
            CombinedChange::NoOp => {
                tracing::debug!("edit at {} reverts step {}", change.path, previous_step.id);
                return Ok(Vec::new());
            }
            CombinedChange::Change(combined) => {
                let entries = vec![ChangeEntry::Single(combined)];
                let mut merged = Step::new(calculate_step_name(&entries)?, vec![Operation::edit(entries)]);
                merged.id = previous_step.id.clone();
                return Ok(vec![merged]);
            }
            CombinedChange::Incompatible => {}
        }
    }

    let step = Step::new(calculate_step_name(&entries)?, vec![Operation::edit(entries)]);
    tracing::debug!("recorded step {} ({})", step.id, step.name);
    Ok(vec![previous_step.clone(), step])
}

fn collection_nouns(collection: &CollectionPath) -> (&'static str, &'static str) {
    match collection {
        CollectionPath::Machines => ("machine", "machines"),
        CollectionPath::Jobs => ("job", "jobs"),
        CollectionPath::JobColors => ("job color", "job colors"),
        CollectionPath::Procedures { .. } => ("procedure", "procedures"),
    }
}

fn change_name(change: &FieldChange) -> Result<String, EngineError> {
    let name = match (&change.path, &change.change) {
        (FieldPath::Title, ChangeKind::Value { .. }) => "Edit name",
        (FieldPath::Description, ChangeKind::Value { .. }) => "Edit description",
        (FieldPath::IsAutoTimeOptions, ChangeKind::Value { .. }) => "Toggle automatic time options",
        (FieldPath::ManualTimeOptions, ChangeKind::Value { .. }) => "Edit time options",
        (FieldPath::Ids(collection), ChangeKind::Collection(collection_change)) => {
            let (one, many) = collection_nouns(collection);
            return Ok(match collection_change {
                CollectionChange::Add { .. } => format!("Add {one}"),
                CollectionChange::Remove { .. } => format!("Remove {one}"),
                CollectionChange::Move { .. } => format!("Reorder {many}"),
            });
        }
        (FieldPath::Entity(collection, _), ChangeKind::Value { new, .. }) => {
            let (one, _) = collection_nouns(collection);
            return Ok(if new.is_null() {
                format!("Remove {one}")
            } else {
                format!("Add {one}")
            });
        }
        (FieldPath::Machine { field, .. }, ChangeKind::Value { .. }) => match field {
            MachineField::Title => "Edit machine name",
            MachineField::Description => "Edit machine description",
        },
        (FieldPath::Job { field: JobField::Title, .. }, ChangeKind::Value { .. }) => "Edit job name",
        (
            FieldPath::JobColor {
                field: JobColorField::Color | JobColorField::TextColor,
                ..
            },
            ChangeKind::Value { .. },
        ) => "Edit job color",
        (FieldPath::Procedure { field, .. }, ChangeKind::Value { .. }) => match field {
            ProcedureField::MachineId => "Edit procedure machine",
            ProcedureField::ProcessingTimeMs => "Edit procedure processing time",
        },
        _ => return Err(EngineError::UnnamedChange(change.path.to_string())),
    };
    Ok(name.to_string())
}

/// History label for a set of entries. A group is named after its leading
/// change.
pub fn calculate_step_name(entries: &[ChangeEntry]) -> Result<String, EngineError> {
    match entries {
        [] => Ok(String::new()),
        [entry] => match entry.changes().first() {
            Some(change) => change_name(change),
            None => Ok(String::new()),
        },
        _ => Ok("Multiple edits".to_string()),
    }
}
