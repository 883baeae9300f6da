use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::store::VersionedStore;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Queued,
    Downloading,
    Sizing,
    Compressing,
    Chunking,
    Transcribing,
    Merging,
    Formatting,
    Uploading,
    Notifying,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileRef {
    pub id: String,
    pub path: String,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub file: FileRef,
    pub state: JobState,
    /// Attempt counter per stage name, bumped on every try including the first.
    pub attempts: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, file: FileRef) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            file,
            state: JobState::Queued,
            attempts: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        }
    }
}

/// Durable per-job state, one versioned JSON document per job id.
///
/// Terminal states are immutable: any transition attempt on a `Completed`
/// or `Failed` record is an error, which is what makes restarted workers
/// and duplicate submissions harmless.
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn store_for(&self, job_id: &str) -> VersionedStore<Option<JobRecord>> {
        VersionedStore::new(self.dir.join(format!("{job_id}.json")))
    }

    /// Persist a brand-new record. An existing record for the id is left
    /// untouched and returned, so re-running a job binary resumes instead of
    /// restarting.
    pub fn create_or_load(&self, record: JobRecord) -> Result<JobRecord, Error> {
        let store = self.store_for(&record.id);
        let (existing, version) = store.load()?;
        if let Some(existing) = existing {
            return Ok(existing);
        }
        store.commit(&Some(record.clone()), version)?;
        Ok(record)
    }

    pub fn load(&self, job_id: &str) -> Result<JobRecord, Error> {
        let (record, _) = self.store_for(job_id).load()?;
        record.ok_or_else(|| Error::JobNotFound {
            job_id: job_id.to_string(),
        })
    }

    pub fn transition(&self, job_id: &str, next: JobState) -> Result<JobRecord, Error> {
        self.mutate(job_id, |record| {
            record.state = next;
            if next.is_terminal() {
                record.completed_at = Some(Utc::now());
            }
        })
    }

    pub fn record_failure(&self, job_id: &str, error: &str) -> Result<JobRecord, Error> {
        let error = error.to_string();
        self.mutate(job_id, move |record| {
            record.state = JobState::Failed;
            record.error = Some(error.clone());
            record.completed_at = Some(Utc::now());
        })
    }

    /// Bump and return the attempt count for `stage`.
    pub fn bump_attempt(&self, job_id: &str, stage: &str) -> Result<u32, Error> {
        let key = stage.to_string();
        let record = self.mutate(job_id, move |record| {
            *record.attempts.entry(key.clone()).or_insert(0) += 1;
        })?;
        Ok(record.attempts.get(stage).copied().unwrap_or(0))
    }

    fn mutate(
        &self,
        job_id: &str,
        apply: impl Fn(&mut JobRecord),
    ) -> Result<JobRecord, Error> {
        let store = self.store_for(job_id);
        let (record, version) = store.load()?;
        let mut record = record.ok_or_else(|| Error::JobNotFound {
            job_id: job_id.to_string(),
        })?;

        if record.state.is_terminal() {
            return Err(Error::TerminalState {
                job_id: job_id.to_string(),
                state: record.state,
            });
        }

        apply(&mut record);
        record.updated_at = Utc::now();
        store.commit(&Some(record.clone()), version)?;
        Ok(record)
    }
}
