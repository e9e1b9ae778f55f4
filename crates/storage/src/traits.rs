use jobset_core::{JobSetId, VersionToken};

use crate::error::StorageError;
use crate::record::{JobSetDraft, JobSetRecord};

/// The remote store the editor loads from and saves to.
///
/// `update` is an optimistic write: it succeeds only while `expected`
/// is still the current version token, and returns
/// [`StorageError::VersionConditionFailed`] otherwise.
pub trait JobSetStore {
    fn load(&self, id: &JobSetId) -> Result<JobSetRecord, StorageError>;

    fn create(&mut self, draft: &JobSetDraft) -> Result<(JobSetId, VersionToken), StorageError>;

    fn update(
        &mut self,
        id: &JobSetId,
        draft: &JobSetDraft,
        expected: &VersionToken,
    ) -> Result<VersionToken, StorageError>;

    fn delete(&mut self, id: &JobSetId) -> Result<(), StorageError>;

    fn set_locked(&mut self, id: &JobSetId, locked: bool) -> Result<(), StorageError>;
}
