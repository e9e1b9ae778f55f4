use serde::{Deserialize, Serialize};

use jobset_core::{CollectionPath, FieldPath, FormData, JobField, MachineField, ProcedureField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: FieldPath,
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn error(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

pub fn validate(form: &FormData) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if form.title.trim().is_empty() {
        issues.push(ValidationIssue::error(FieldPath::Title, "Name is required"));
    }

    for (machine_id, machine) in form.machines.iter() {
        if machine.title.trim().is_empty() {
            issues.push(ValidationIssue::error(
                FieldPath::machine(machine_id, MachineField::Title),
                "Machine name is required",
            ));
        }
    }

    for (job_id, job) in form.jobs.iter() {
        if job.title.trim().is_empty() {
            issues.push(ValidationIssue::warning(
                FieldPath::job(job_id, JobField::Title),
                "Job has no name",
            ));
        }
        if job.procedures.is_empty() {
            issues.push(ValidationIssue::warning(
                FieldPath::Entity(CollectionPath::Jobs, job_id.clone()),
                "Job has no procedures",
            ));
        }
        for (procedure_id, procedure) in job.procedures.iter() {
            let machine_path = FieldPath::procedure(job_id, procedure_id, ProcedureField::MachineId);
            match &procedure.machine_id {
                None => issues.push(ValidationIssue::error(
                    machine_path,
                    "Procedure needs a machine",
                )),
                Some(machine_id) if !form.machines.contains(machine_id) => {
                    issues.push(ValidationIssue::error(
                        machine_path,
                        format!("Machine {machine_id} does not exist"),
                    ))
                }
                Some(_) => {}
            }
            if procedure.processing_time_ms <= 0 {
                issues.push(ValidationIssue::error(
                    FieldPath::procedure(job_id, procedure_id, ProcedureField::ProcessingTimeMs),
                    "Processing time must be positive",
                ));
            }
        }
    }

    if !form.is_auto_time_options {
        let options = &form.manual_time_options;
        if options.view_start_time_ms >= options.view_end_time_ms {
            issues.push(ValidationIssue::error(
                FieldPath::ManualTimeOptions,
                "View start must be before view end",
            ));
        }
        if options.min_view_duration_ms > options.max_view_duration_ms {
            issues.push(ValidationIssue::error(
                FieldPath::ManualTimeOptions,
                "Minimum view duration exceeds maximum",
            ));
        }
    }

    issues
}
