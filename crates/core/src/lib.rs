pub mod changes;
pub mod error;
pub mod field_value;
pub mod form;
pub mod ids;
pub mod path;

pub use changes::{ChangeEntry, ChangeKind, CollectionChange, FieldChange, GroupedFieldChanges, Position};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use form::{FormData, Job, JobColor, Machine, OrderedCollection, Procedure, TimeOptions};
pub use ids::*;
pub use path::{
    CollectionPath, EntityRef, FieldPath, JobColorField, JobField, MachineField, ProcedureField,
};
