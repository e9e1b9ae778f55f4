use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::EntityId;

/// Viewport and horizon settings for the schedule chart, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOptions {
    pub max_time_ms: i64,
    pub view_start_time_ms: i64,
    pub view_end_time_ms: i64,
    pub min_view_duration_ms: i64,
    pub max_view_duration_ms: i64,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self {
            max_time_ms: 3_600_000,
            view_start_time_ms: 0,
            view_end_time_ms: 3_600_000,
            min_view_duration_ms: 1_000,
            max_view_duration_ms: 3_600_000,
        }
    }
}

/// An ordered id list paired with an id → entity map. The list order is the
/// displayed order and must hold exactly the map's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedCollection<T> {
    pub ids: Vec<EntityId>,
    pub entities: BTreeMap<EntityId, T>,
}

impl<T> Default for OrderedCollection<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            entities: BTreeMap::new(),
        }
    }
}

impl<T> OrderedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut T> {
        self.entities.get_mut(id)
    }

    pub fn index_of(&self, id: &EntityId) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Entities in display order. Ids without an entity are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &T)> {
        self.ids
            .iter()
            .filter_map(|id| self.entities.get(id).map(|entity| (id, entity)))
    }

    pub fn push(&mut self, id: EntityId, entity: T) {
        if self.entities.insert(id.clone(), entity).is_none() {
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<(usize, T)> {
        let index = self.index_of(id)?;
        let entity = self.entities.remove(id)?;
        self.ids.remove(index);
        Some((index, entity))
    }

    /// Move the item at `from` so it ends up at `to`. Returns false when
    /// either index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.ids.len() || to >= self.ids.len() {
            return false;
        }
        let id = self.ids.remove(from);
        self.ids.insert(to, id);
        true
    }

    fn check_in_sync(&self, label: &str) -> Result<(), CoreError> {
        if self.ids.len() != self.entities.len()
            || self.ids.iter().any(|id| !self.entities.contains_key(id))
        {
            return Err(CoreError::InvalidData(format!(
                "{label} ids are out of sync with entities"
            )));
        }
        Ok(())
    }
}

impl<T> FromIterator<(EntityId, T)> for OrderedCollection<T> {
    fn from_iter<I: IntoIterator<Item = (EntityId, T)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (id, entity) in iter {
            collection.push(id, entity);
        }
        collection
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: EntityId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub id: EntityId,
    pub job_id: EntityId,
    pub machine_id: Option<EntityId>,
    pub processing_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: EntityId,
    pub title: String,
    pub procedures: OrderedCollection<Procedure>,
}

impl Job {
    pub fn new(id: EntityId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            procedures: OrderedCollection::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobColor {
    pub color: String,
    pub text_color: String,
}

/// The editable job-set document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub title: String,
    pub description: String,
    pub machines: OrderedCollection<Machine>,
    pub jobs: OrderedCollection<Job>,
    pub job_colors: OrderedCollection<JobColor>,
    pub is_auto_time_options: bool,
    pub manual_time_options: TimeOptions,
    /// Derived from the procedures; recomputed outside the edit history.
    pub auto_time_options: TimeOptions,
}

impl FormData {
    pub fn procedure(&self, job_id: &EntityId, procedure_id: &EntityId) -> Option<&Procedure> {
        self.jobs.get(job_id)?.procedures.get(procedure_id)
    }

    /// Every procedure, jobs in order and procedures in order within each job.
    pub fn procedures(&self) -> impl Iterator<Item = &Procedure> {
        self.jobs
            .iter()
            .flat_map(|(_, job)| job.procedures.iter().map(|(_, procedure)| procedure))
    }

    pub fn time_options(&self) -> &TimeOptions {
        if self.is_auto_time_options {
            &self.auto_time_options
        } else {
            &self.manual_time_options
        }
    }

    /// Verify the structural invariants: id lists match entity maps, every
    /// procedure sits in the job it names, and machine references resolve.
    pub fn check_references(&self) -> Result<(), CoreError> {
        self.machines.check_in_sync("machines")?;
        self.jobs.check_in_sync("jobs")?;
        self.job_colors.check_in_sync("job colors")?;
        for (job_id, job) in self.jobs.iter() {
            job.procedures
                .check_in_sync(&format!("procedures of job {job_id}"))?;
            for (procedure_id, procedure) in job.procedures.iter() {
                if procedure.job_id != *job_id {
                    return Err(CoreError::InvalidData(format!(
                        "procedure {procedure_id} names job {} but sits in job {job_id}",
                        procedure.job_id
                    )));
                }
                if let Some(machine_id) = &procedure.machine_id
                    && !self.machines.contains(machine_id)
                {
                    return Err(CoreError::InvalidData(format!(
                        "procedure {procedure_id} references missing machine {machine_id}"
                    )));
                }
            }
        }
        Ok(())
    }
}
