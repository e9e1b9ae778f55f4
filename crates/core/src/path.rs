//! Typed locators into [`FormData`](crate::form::FormData).
//!
//! Paths are shared between the diff engine, the replayer and validation.
//! They render to the slash scheme (`/machines/entities/{id}/title`) only at
//! the edges, for logging and serialization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::ids::EntityId;

/// One of the four id-list families.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionPath {
    Machines,
    Jobs,
    JobColors,
    Procedures { job_id: EntityId },
}

impl CollectionPath {
    /// The entity an id of this collection stands for. Job colors belong to
    /// their job.
    pub fn entity_ref(&self, id: &EntityId) -> EntityRef {
        match self {
            Self::Machines => EntityRef::Machine(id.clone()),
            Self::Jobs | Self::JobColors => EntityRef::Job(id.clone()),
            Self::Procedures { job_id } => EntityRef::Procedure {
                job_id: job_id.clone(),
                procedure_id: id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MachineField {
    Title,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobField {
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobColorField {
    Color,
    TextColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcedureField {
    MachineId,
    ProcessingTimeMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldPath {
    Title,
    Description,
    IsAutoTimeOptions,
    ManualTimeOptions,
    Ids(CollectionPath),
    Entity(CollectionPath, EntityId),
    Machine {
        machine_id: EntityId,
        field: MachineField,
    },
    Job {
        job_id: EntityId,
        field: JobField,
    },
    JobColor {
        job_id: EntityId,
        field: JobColorField,
    },
    Procedure {
        job_id: EntityId,
        procedure_id: EntityId,
        field: ProcedureField,
    },
}

/// The addressable entities of the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Machine(EntityId),
    Job(EntityId),
    Procedure {
        job_id: EntityId,
        procedure_id: EntityId,
    },
}

impl EntityRef {
    /// True when `self` is `other` or lives inside it (a procedure inside its job).
    pub fn is_within(&self, other: &EntityRef) -> bool {
        match (self, other) {
            (Self::Procedure { job_id, .. }, EntityRef::Job(outer)) => job_id == outer,
            _ => self == other,
        }
    }
}

impl FieldPath {
    pub fn machine(machine_id: &EntityId, field: MachineField) -> Self {
        Self::Machine {
            machine_id: machine_id.clone(),
            field,
        }
    }

    pub fn job(job_id: &EntityId, field: JobField) -> Self {
        Self::Job {
            job_id: job_id.clone(),
            field,
        }
    }

    pub fn job_color(job_id: &EntityId, field: JobColorField) -> Self {
        Self::JobColor {
            job_id: job_id.clone(),
            field,
        }
    }

    pub fn procedure(job_id: &EntityId, procedure_id: &EntityId, field: ProcedureField) -> Self {
        Self::Procedure {
            job_id: job_id.clone(),
            procedure_id: procedure_id.clone(),
            field,
        }
    }

    pub fn is_ids(&self) -> bool {
        matches!(self, Self::Ids(_))
    }

    /// The entity this path points into. Id-list paths and document-level
    /// fields have none.
    pub fn entity_ref(&self) -> Option<EntityRef> {
        match self {
            Self::Title
            | Self::Description
            | Self::IsAutoTimeOptions
            | Self::ManualTimeOptions
            | Self::Ids(_) => None,
            Self::Entity(collection, id) => Some(collection.entity_ref(id)),
            Self::Machine { machine_id, .. } => Some(EntityRef::Machine(machine_id.clone())),
            Self::Job { job_id, .. } | Self::JobColor { job_id, .. } => {
                Some(EntityRef::Job(job_id.clone()))
            }
            Self::Procedure {
                job_id,
                procedure_id,
                ..
            } => Some(EntityRef::Procedure {
                job_id: job_id.clone(),
                procedure_id: procedure_id.clone(),
            }),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Machines => f.write_str("/machines"),
            Self::Jobs => f.write_str("/jobs"),
            Self::JobColors => f.write_str("/jobColors"),
            Self::Procedures { job_id } => write!(f, "/jobs/entities/{job_id}/procedures"),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => f.write_str("/title"),
            Self::Description => f.write_str("/description"),
            Self::IsAutoTimeOptions => f.write_str("/isAutoTimeOptions"),
            Self::ManualTimeOptions => f.write_str("/manualTimeOptions"),
            Self::Ids(collection) => write!(f, "{collection}/ids"),
            Self::Entity(collection, id) => write!(f, "{collection}/entities/{id}"),
            Self::Machine { machine_id, field } => {
                let name = match field {
                    MachineField::Title => "title",
                    MachineField::Description => "description",
                };
                write!(f, "/machines/entities/{machine_id}/{name}")
            }
            Self::Job { job_id, field } => match field {
                JobField::Title => write!(f, "/jobs/entities/{job_id}/title"),
            },
            Self::JobColor { job_id, field } => {
                let name = match field {
                    JobColorField::Color => "color",
                    JobColorField::TextColor => "textColor",
                };
                write!(f, "/jobColors/entities/{job_id}/{name}")
            }
            Self::Procedure {
                job_id,
                procedure_id,
                field,
            } => {
                let name = match field {
                    ProcedureField::MachineId => "machineId",
                    ProcedureField::ProcessingTimeMs => "processingTimeMs",
                };
                write!(
                    f,
                    "/jobs/entities/{job_id}/procedures/entities/{procedure_id}/{name}"
                )
            }
        }
    }
}

impl FromStr for FieldPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidPath(s.to_string());
        let rest = s.strip_prefix('/').ok_or_else(invalid)?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid());
        }
        fn id(segment: &str) -> EntityId {
            EntityId::from(segment)
        }

        let path = match segments.as_slice() {
            ["title"] => Self::Title,
            ["description"] => Self::Description,
            ["isAutoTimeOptions"] => Self::IsAutoTimeOptions,
            ["manualTimeOptions"] => Self::ManualTimeOptions,

            ["machines", "ids"] => Self::Ids(CollectionPath::Machines),
            ["machines", "entities", machine] => Self::Entity(CollectionPath::Machines, id(machine)),
            ["machines", "entities", machine, "title"] => {
                Self::machine(&id(machine), MachineField::Title)
            }
            ["machines", "entities", machine, "description"] => {
                Self::machine(&id(machine), MachineField::Description)
            }

            ["jobColors", "ids"] => Self::Ids(CollectionPath::JobColors),
            ["jobColors", "entities", job] => Self::Entity(CollectionPath::JobColors, id(job)),
            ["jobColors", "entities", job, "color"] => {
                Self::job_color(&id(job), JobColorField::Color)
            }
            ["jobColors", "entities", job, "textColor"] => {
                Self::job_color(&id(job), JobColorField::TextColor)
            }

            ["jobs", "ids"] => Self::Ids(CollectionPath::Jobs),
            ["jobs", "entities", job] => Self::Entity(CollectionPath::Jobs, id(job)),
            ["jobs", "entities", job, "title"] => Self::job(&id(job), JobField::Title),
            ["jobs", "entities", job, "procedures", "ids"] => {
                Self::Ids(CollectionPath::Procedures { job_id: id(job) })
            }
            ["jobs", "entities", job, "procedures", "entities", procedure] => Self::Entity(
                CollectionPath::Procedures { job_id: id(job) },
                id(procedure),
            ),
            ["jobs", "entities", job, "procedures", "entities", procedure, "machineId"] => {
                Self::procedure(&id(job), &id(procedure), ProcedureField::MachineId)
            }
            ["jobs", "entities", job, "procedures", "entities", procedure, "processingTimeMs"] => {
                Self::procedure(&id(job), &id(procedure), ProcedureField::ProcessingTimeMs)
            }

            _ => return Err(invalid()),
        };
        Ok(path)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
