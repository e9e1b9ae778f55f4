use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use jobset_core::{JobSetId, VersionToken};

use crate::error::StorageError;
use crate::record::{JobSetDraft, JobSetRecord};
use crate::traits::JobSetStore;

/// Version tokens are a digest of the job set id, its revision and the saved
/// payload, so every accepted write yields a fresh token.
fn version_token(id: &JobSetId, revision: i64, draft: &JobSetDraft) -> VersionToken {
    let mut hasher = blake3::Hasher::new();
    hasher.update(id.as_str().as_bytes());
    hasher.update(&revision.to_be_bytes());
    for part in [
        &draft.title,
        &draft.description,
        &draft.content,
        &draft.job_colors,
        &draft.time_options,
    ] {
        hasher.update(&(part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.update(&[draft.is_auto_time_options as u8]);
    VersionToken::from_string(hasher.finalize().to_hex().to_string())
}

pub struct SqliteJobSetStore {
    conn: Connection,
}

impl SqliteJobSetStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn read_record(row: &rusqlite::Row) -> rusqlite::Result<JobSetRecord> {
    Ok(JobSetRecord {
        id: JobSetId::from_string(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        job_colors: row.get(4)?,
        is_auto_time_options: row.get(5)?,
        time_options: row.get(6)?,
        is_locked: row.get(7)?,
        version_token: VersionToken::from_string(row.get::<_, String>(8)?),
    })
}

impl JobSetStore for SqliteJobSetStore {
    fn load(&self, id: &JobSetId) -> Result<JobSetRecord, StorageError> {
        self.conn
            .query_row(
                "SELECT id, title, description, content, job_colors, is_auto_time_options, time_options, is_locked, version_token
                 FROM job_sets WHERE id = ?1",
                rusqlite::params![id.as_str()],
                read_record,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn create(&mut self, draft: &JobSetDraft) -> Result<(JobSetId, VersionToken), StorageError> {
        let id = JobSetId::new();
        let revision = 1;
        let token = version_token(&id, revision, draft);
        self.conn.execute(
            "INSERT INTO job_sets (id, title, description, content, job_colors, is_auto_time_options, time_options, revision, version_token)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                id.as_str(),
                draft.title,
                draft.description,
                draft.content,
                draft.job_colors,
                draft.is_auto_time_options,
                draft.time_options,
                revision,
                token.as_str(),
            ],
        )?;
        tracing::debug!("created job set {id}");
        Ok((id, token))
    }

    fn update(
        &mut self,
        id: &JobSetId,
        draft: &JobSetDraft,
        expected: &VersionToken,
    ) -> Result<VersionToken, StorageError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, bool, i64)> = tx
            .query_row(
                "SELECT version_token, is_locked, revision FROM job_sets WHERE id = ?1",
                rusqlite::params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (current_token, is_locked, revision) =
            current.ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if is_locked {
            return Err(StorageError::Locked(id.to_string()));
        }
        if current_token != expected.as_str() {
            tracing::debug!("update of job set {id} rejected: stale version token");
            return Err(StorageError::VersionConditionFailed(id.to_string()));
        }

        let revision = revision + 1;
        let token = version_token(id, revision, draft);
        tx.execute(
            "UPDATE job_sets SET title = ?1, description = ?2, content = ?3, job_colors = ?4,
                is_auto_time_options = ?5, time_options = ?6, revision = ?7, version_token = ?8,
                updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
             WHERE id = ?9",
            rusqlite::params![
                draft.title,
                draft.description,
                draft.content,
                draft.job_colors,
                draft.is_auto_time_options,
                draft.time_options,
                revision,
                token.as_str(),
                id.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(token)
    }

    fn delete(&mut self, id: &JobSetId) -> Result<(), StorageError> {
        let deleted = self.conn.execute(
            "DELETE FROM job_sets WHERE id = ?1",
            rusqlite::params![id.as_str()],
        )?;
        if deleted == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_locked(&mut self, id: &JobSetId, locked: bool) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE job_sets SET is_locked = ?1 WHERE id = ?2",
            rusqlite::params![locked, id.as_str()],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
