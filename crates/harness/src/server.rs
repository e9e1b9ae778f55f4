use jobset_core::{FormData, JobSetId};
use jobset_engine::EditorConfig;
use jobset_storage::{JobSetDraft, JobSetStore, SqliteJobSetStore, StorageError};
use tempfile::TempDir;

use crate::TestEditor;

/// A job set server backed by one SQLite file. Every editor and direct
/// store handed out opens its own connection to that file, so writes made
/// through one are visible to the others.
pub struct TestServer {
    _dir: TempDir,
    path: String,
}

impl TestServer {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir
            .path()
            .join("jobsets.db")
            .to_string_lossy()
            .into_owned();
        // Create the schema up front.
        SqliteJobSetStore::open(&path)?;
        Ok(Self { _dir: dir, path })
    }

    pub fn open_store(&self) -> Result<SqliteJobSetStore, StorageError> {
        SqliteJobSetStore::open(&self.path)
    }

    /// Store `form` as a new job set, as another client would.
    pub fn seed(&self, form: &FormData) -> Result<JobSetId, StorageError> {
        let mut store = self.open_store()?;
        let (id, _) = store.create(&JobSetDraft::from_form_data(form)?)?;
        Ok(id)
    }

    /// Overwrite a job set behind every editor's back.
    pub fn overwrite(&self, id: &JobSetId, form: &FormData) -> Result<(), StorageError> {
        let mut store = self.open_store()?;
        let current = store.load(id)?.version_token;
        store.update(id, &JobSetDraft::from_form_data(form)?, &current)?;
        Ok(())
    }

    pub fn set_locked(&self, id: &JobSetId, locked: bool) -> Result<(), StorageError> {
        self.open_store()?.set_locked(id, locked)
    }

    pub fn load_form(&self, id: &JobSetId) -> Result<FormData, StorageError> {
        self.open_store()?.load(id)?.to_form_data()
    }

    pub fn editor(&self) -> Result<TestEditor, StorageError> {
        self.editor_with(EditorConfig::default())
    }

    pub fn editor_with(&self, config: EditorConfig) -> Result<TestEditor, StorageError> {
        Ok(TestEditor::new(self.open_store()?, config))
    }
}
