pub mod error;
pub mod record;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use record::{JobSetDraft, JobSetRecord};
pub use sqlite::SqliteJobSetStore;
pub use traits::JobSetStore;
