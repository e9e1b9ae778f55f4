use serde::{Deserialize, Serialize};

use crate::form::{Job, JobColor, Machine, Procedure, TimeOptions};
use crate::ids::EntityId;

/// A value held at a [`FieldPath`](crate::path::FieldPath). Entity variants
/// carry the whole entity for create/delete changes; `Null` stands for
/// "absent" and for an unassigned machine reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
    EntityRef(EntityId),
    TimeOptions(TimeOptions),
    Machine(Machine),
    Job(Job),
    Procedure(Procedure),
    JobColor(JobColor),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn from_ref(reference: Option<&EntityId>) -> Self {
        match reference {
            Some(id) => FieldValue::EntityRef(id.clone()),
            None => FieldValue::Null,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_entity_ref(&self) -> Option<&EntityId> {
        match self {
            FieldValue::EntityRef(id) => Some(id),
            _ => None,
        }
    }

    /// Whether this value points at `id`, either directly or through the
    /// machine of a procedure it carries.
    pub fn references(&self, id: &EntityId) -> bool {
        match self {
            FieldValue::EntityRef(target) => target == id,
            FieldValue::Procedure(procedure) => procedure.machine_id.as_ref() == Some(id),
            FieldValue::Job(job) => job
                .procedures
                .iter()
                .any(|(_, procedure)| procedure.machine_id.as_ref() == Some(id)),
            _ => false,
        }
    }

    /// Short variant name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::EntityRef(_) => "entity reference",
            FieldValue::TimeOptions(_) => "time options",
            FieldValue::Machine(_) => "machine",
            FieldValue::Job(_) => "job",
            FieldValue::Procedure(_) => "procedure",
            FieldValue::JobColor(_) => "job color",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn procedure_on(machine: Option<&str>) -> Procedure {
        Procedure {
            id: EntityId::from("p1"),
            job_id: EntityId::from("j1"),
            machine_id: machine.map(EntityId::from),
            processing_time_ms: 1_000,
        }
    }

    #[test]
    fn entity_values_reference_their_procedure_machines() {
        let m1 = EntityId::from("m1");
        assert!(FieldValue::EntityRef(m1.clone()).references(&m1));
        assert!(FieldValue::Procedure(procedure_on(Some("m1"))).references(&m1));
        assert!(!FieldValue::Procedure(procedure_on(None)).references(&m1));

        let mut job = Job::new(EntityId::from("j1"), "Shaft");
        assert!(!FieldValue::Job(job.clone()).references(&m1));
        job.procedures.push(EntityId::from("p1"), procedure_on(Some("m1")));
        assert!(FieldValue::Job(job).references(&m1));

        assert!(!FieldValue::Text("m1".into()).references(&m1));
    }
}
