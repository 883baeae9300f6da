use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::store::VersionedStore;

const MAX_WRITE_ATTEMPTS: u32 = 5;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchStatus {
    Dispatched,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessedRecord {
    pub status: DispatchStatus,
    pub file_path: String,
    pub job_id: Option<String>,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns dispatch for this file identity.
    Claimed,
    /// Someone already dispatched this identity and the claim is still live.
    AlreadyDispatched,
}

/// Dedup ledger: one record per file identity, consulted before dispatch so
/// at-least-once webhook delivery never produces two jobs for one file.
///
/// A claim is inserted *before* the job is submitted. `Failed` claims (the
/// submission itself blew up) and `Dispatched` claims older than `claim_ttl`
/// (a worker that died without finishing) are reclaimable; anything else is
/// an idempotent no-op for the caller.
pub struct ProcessedLedger {
    store: VersionedStore<HashMap<String, ProcessedRecord>>,
    claim_ttl: Duration,
}

impl ProcessedLedger {
    pub fn new(path: impl Into<PathBuf>, claim_ttl: Duration) -> Self {
        Self {
            store: VersionedStore::new(path),
            claim_ttl,
        }
    }

    pub fn try_claim(&self, file_id: &str, file_path: &str) -> Result<Claim, Error> {
        let file_id = file_id.to_string();
        let file_path = file_path.to_string();
        let ttl = chrono::TimeDelta::from_std(self.claim_ttl).unwrap_or(chrono::TimeDelta::MAX);

        self.store.update(MAX_WRITE_ATTEMPTS, move |records| {
            let now = Utc::now();
            let reclaimable = match records.get(&file_id) {
                None => true,
                Some(record) => match record.status {
                    DispatchStatus::Failed => true,
                    DispatchStatus::Dispatched => now - record.dispatched_at > ttl,
                },
            };

            if !reclaimable {
                return Claim::AlreadyDispatched;
            }

            records.insert(
                file_id.clone(),
                ProcessedRecord {
                    status: DispatchStatus::Dispatched,
                    file_path: file_path.clone(),
                    job_id: None,
                    dispatched_at: now,
                },
            );
            Claim::Claimed
        })
    }

    /// Attach the submitted job id to an existing claim.
    pub fn record_job(&self, file_id: &str, job_id: &str) -> Result<(), Error> {
        let file_id = file_id.to_string();
        let job_id = job_id.to_string();
        self.store.update(MAX_WRITE_ATTEMPTS, move |records| {
            if let Some(record) = records.get_mut(&file_id) {
                record.job_id = Some(job_id.clone());
            }
        })
    }

    /// Flip a claim to `Failed` after an unsuccessful submission so the next
    /// delivery of the same diff can retry the file.
    pub fn release(&self, file_id: &str) -> Result<(), Error> {
        let file_id = file_id.to_string();
        self.store.update(MAX_WRITE_ATTEMPTS, move |records| {
            if let Some(record) = records.get_mut(&file_id) {
                record.status = DispatchStatus::Failed;
            }
        })
    }

    pub fn get(&self, file_id: &str) -> Result<Option<ProcessedRecord>, Error> {
        let (records, _) = self.store.load()?;
        Ok(records.get(file_id).cloned())
    }

    pub fn len(&self) -> Result<usize, Error> {
        let (records, _) = self.store.load()?;
        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }
}

/// Stable file identity: the storage path with separators and spaces
/// flattened, so redeliveries of the same physical file map to one ledger key.
pub fn file_identity(path: &str) -> String {
    path.replace(['/', ' '], "_")
}
