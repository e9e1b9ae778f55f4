//! The load/save shape of a job set and its conversion to [`FormData`].
//!
//! The record embeds three JSON documents as strings: `content` (machines and
//! jobs with their procedures, each carrying a 1-based `sequence`),
//! `job_colors` (job id → colors) and `time_options` (the manual options).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use jobset_core::{
    EntityId, FormData, Job, JobColor, JobSetId, Machine, OrderedCollection, Procedure,
    TimeOptions, VersionToken,
};

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSetRecord {
    pub id: JobSetId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub job_colors: String,
    pub is_auto_time_options: bool,
    pub time_options: String,
    pub is_locked: bool,
    pub version_token: VersionToken,
}

/// What create/update send: the record without server-owned fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSetDraft {
    pub title: String,
    pub description: String,
    pub content: String,
    pub job_colors: String,
    pub is_auto_time_options: bool,
    pub time_options: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDocument {
    #[serde(default)]
    machines: Vec<MachineEntry>,
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachineEntry {
    id: EntityId,
    title: String,
    #[serde(default)]
    description: String,
    sequence: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobEntry {
    id: EntityId,
    title: String,
    sequence: u32,
    #[serde(default)]
    procedures: Vec<ProcedureEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcedureEntry {
    id: EntityId,
    job_id: EntityId,
    machine_id: Option<EntityId>,
    processing_time_ms: i64,
    sequence: u32,
}

fn sequence_of(index: usize) -> Result<u32, StorageError> {
    u32::try_from(index + 1)
        .map_err(|_| StorageError::Serialization(format!("sequence {index} out of range")))
}

/// Append an entry, rejecting a document that lists the same id twice.
fn push_unique<T>(
    collection: &mut OrderedCollection<T>,
    kind: &str,
    id: EntityId,
    entity: T,
) -> Result<(), StorageError> {
    if collection.contains(&id) {
        return Err(StorageError::Serialization(format!(
            "{kind} {id} is listed more than once"
        )));
    }
    collection.push(id, entity);
    Ok(())
}

impl JobSetRecord {
    /// Parse the embedded documents into a snapshot. Entries are ordered by
    /// `sequence`; ties keep their document order.
    pub fn to_form_data(&self) -> Result<FormData, StorageError> {
        let mut content: ContentDocument = serde_json::from_str(&self.content)?;
        let colors: BTreeMap<EntityId, JobColor> = if self.job_colors.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&self.job_colors)?
        };
        let manual_time_options: TimeOptions = if self.time_options.trim().is_empty() {
            TimeOptions::default()
        } else {
            serde_json::from_str(&self.time_options)?
        };

        content.machines.sort_by_key(|entry| entry.sequence);
        content.jobs.sort_by_key(|entry| entry.sequence);

        let mut machines = OrderedCollection::new();
        for entry in content.machines {
            push_unique(
                &mut machines,
                "machine",
                entry.id.clone(),
                Machine {
                    id: entry.id,
                    title: entry.title,
                    description: entry.description,
                },
            )?;
        }

        let mut jobs = OrderedCollection::new();
        for mut entry in content.jobs {
            entry.procedures.sort_by_key(|procedure| procedure.sequence);
            let mut job = Job::new(entry.id.clone(), entry.title);
            for procedure in entry.procedures {
                if procedure.job_id != entry.id {
                    tracing::warn!(
                        "procedure {} names job {} but is listed under {}, reassigning",
                        procedure.id,
                        procedure.job_id,
                        entry.id
                    );
                }
                push_unique(
                    &mut job.procedures,
                    "procedure",
                    procedure.id.clone(),
                    Procedure {
                        id: procedure.id,
                        job_id: entry.id.clone(),
                        machine_id: procedure.machine_id,
                        processing_time_ms: procedure.processing_time_ms,
                    },
                )?;
            }
            push_unique(&mut jobs, "job", entry.id, job)?;
        }

        // Colors follow job order; any stray keys go last.
        let mut job_colors = OrderedCollection::new();
        let mut remaining = colors;
        for job_id in &jobs.ids {
            if let Some(color) = remaining.remove(job_id) {
                job_colors.push(job_id.clone(), color);
            }
        }
        for (job_id, color) in remaining {
            job_colors.push(job_id, color);
        }

        let form = FormData {
            title: self.title.clone(),
            description: self.description.clone(),
            machines,
            jobs,
            job_colors,
            is_auto_time_options: self.is_auto_time_options,
            manual_time_options,
            auto_time_options: TimeOptions::default(),
        };
        form.check_references()?;
        Ok(form)
    }
}

impl JobSetDraft {
    /// Serialize a snapshot, re-deriving every `sequence` from display order.
    pub fn from_form_data(form: &FormData) -> Result<Self, StorageError> {
        let machines = form
            .machines
            .iter()
            .enumerate()
            .map(|(index, (id, machine))| {
                Ok(MachineEntry {
                    id: id.clone(),
                    title: machine.title.clone(),
                    description: machine.description.clone(),
                    sequence: sequence_of(index)?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let mut jobs = Vec::with_capacity(form.jobs.len());
        for (index, (job_id, job)) in form.jobs.iter().enumerate() {
            let procedures = job
                .procedures
                .iter()
                .enumerate()
                .map(|(position, (procedure_id, procedure))| {
                    Ok(ProcedureEntry {
                        id: procedure_id.clone(),
                        job_id: job_id.clone(),
                        machine_id: procedure.machine_id.clone(),
                        processing_time_ms: procedure.processing_time_ms,
                        sequence: sequence_of(position)?,
                    })
                })
                .collect::<Result<Vec<_>, StorageError>>()?;
            jobs.push(JobEntry {
                id: job_id.clone(),
                title: job.title.clone(),
                sequence: sequence_of(index)?,
                procedures,
            });
        }

        let colors: BTreeMap<&EntityId, &JobColor> = form.job_colors.iter().collect();

        Ok(Self {
            title: form.title.clone(),
            description: form.description.clone(),
            content: serde_json::to_string(&ContentDocument { machines, jobs })?,
            job_colors: serde_json::to_string(&colors)?,
            is_auto_time_options: form.is_auto_time_options,
            time_options: serde_json::to_string(&form.manual_time_options)?,
        })
    }
}
