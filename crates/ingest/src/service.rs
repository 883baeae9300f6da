use ink_dropbox::{DropboxClient, Entry};
use ink_ledger::{Claim, CursorStore, FileRef, ProcessedLedger, file_identity};

use crate::config::IngestConfig;
use crate::error::ServiceError;
use crate::runner::{JobRequest, JobRunner};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub entries_seen: usize,
    pub candidates: usize,
    pub dispatched: usize,
    pub skipped_duplicates: usize,
    pub dispatch_failures: usize,
    pub cursor_committed: bool,
}

/// The diff-and-dispatch core of the gateway.
///
/// Side-effect order per notification: list changes from the stored
/// cursor, filter to media candidates, claim each in the ledger, submit a
/// job per claim, and only then commit the new cursor. A failed submission
/// releases its claim and blocks the cursor commit, so the same diff is
/// replayed on the next delivery with already-dispatched files deduped by
/// their claims.
pub struct IngestService<R> {
    dropbox: DropboxClient,
    cursors: CursorStore,
    ledger: ProcessedLedger,
    runner: R,
    config: IngestConfig,
}

impl<R: JobRunner> IngestService<R> {
    pub fn new(
        dropbox: DropboxClient,
        cursors: CursorStore,
        ledger: ProcessedLedger,
        runner: R,
        config: IngestConfig,
    ) -> Self {
        Self {
            dropbox,
            cursors,
            ledger,
            runner,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn process_changes(&self) -> Result<DispatchSummary, ServiceError> {
        let folder = self.config.raw_folder.clone();

        let Some(cursor) = self.cursors.get(&folder)? else {
            return self.prime_cursor(&folder).await;
        };

        let (entries, new_cursor) = match self.drain_changes(&cursor).await {
            Ok(page) => page,
            Err(ServiceError::Provider(err)) if err.is_cursor_reset() => {
                tracing::warn!(folder = %folder, "cursor_reset_repriming");
                return self.prime_cursor(&folder).await;
            }
            Err(err) => return Err(err),
        };

        let mut summary = DispatchSummary {
            entries_seen: entries.len(),
            ..Default::default()
        };

        let candidates: Vec<FileRef> = entries
            .iter()
            .filter_map(|entry| self.as_candidate(entry))
            .collect();
        summary.candidates = candidates.len();

        for file in candidates {
            match self.ledger.try_claim(&file.id, &file.path)? {
                Claim::AlreadyDispatched => {
                    tracing::info!(file = %file.name, "already_dispatched_skipping");
                    summary.skipped_duplicates += 1;
                }
                Claim::Claimed => {
                    let request = JobRequest {
                        job_id: uuid::Uuid::new_v4().to_string(),
                        file,
                    };
                    match self.runner.submit(&request).await {
                        Ok(()) => {
                            self.ledger.record_job(&request.file.id, &request.job_id)?;
                            tracing::info!(
                                job_id = %request.job_id,
                                file = %request.file.name,
                                "job_dispatched"
                            );
                            summary.dispatched += 1;
                        }
                        Err(err) => {
                            tracing::error!(
                                file = %request.file.name,
                                error = %err,
                                "dispatch_failed_releasing_claim"
                            );
                            self.ledger.release(&request.file.id)?;
                            summary.dispatch_failures += 1;
                        }
                    }
                }
            }
        }

        if summary.dispatch_failures == 0 {
            self.cursors.set(&folder, &new_cursor)?;
            summary.cursor_committed = true;
        } else {
            tracing::warn!(
                failures = summary.dispatch_failures,
                "cursor_not_committed_diff_will_replay"
            );
        }

        tracing::info!(
            entries = summary.entries_seen,
            candidates = summary.candidates,
            dispatched = summary.dispatched,
            skipped = summary.skipped_duplicates,
            "notification_processed"
        );
        Ok(summary)
    }

    /// First contact (or a provider-side reset): take a cursor at the
    /// current folder state without dispatching anything, so a freshly
    /// configured watcher does not flood jobs for historical files.
    async fn prime_cursor(&self, folder: &str) -> Result<DispatchSummary, ServiceError> {
        let (entries, cursor) = self.dropbox.list_folder_all(folder).await?;
        self.cursors.set(folder, &cursor)?;
        tracing::info!(
            folder = %folder,
            existing_files = entries.len(),
            "cursor_primed_existing_files_skipped"
        );
        Ok(DispatchSummary {
            entries_seen: entries.len(),
            cursor_committed: true,
            ..Default::default()
        })
    }

    async fn drain_changes(
        &self,
        cursor: &str,
    ) -> Result<(Vec<Entry>, String), ServiceError> {
        let mut entries = Vec::new();
        let mut cursor = cursor.to_string();
        loop {
            let mut page = self.dropbox.list_folder_continue(&cursor).await?;
            entries.append(&mut page.entries);
            cursor = page.cursor;
            if !page.has_more {
                return Ok((entries, cursor));
            }
        }
    }

    fn as_candidate(&self, entry: &Entry) -> Option<FileRef> {
        if !entry.is_file() {
            return None;
        }
        let path = entry.path_display.as_deref()?;
        if !path.starts_with(&self.config.raw_folder) {
            return None;
        }
        if !self.config.accepts(&entry.name) {
            tracing::debug!(file = %entry.name, "unsupported_extension_skipped");
            return None;
        }

        Some(FileRef {
            id: file_identity(path),
            path: path.to_string(),
            name: entry.name.clone(),
            size: entry.size.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunnerError;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct StubRunner {
        submitted: Mutex<Vec<JobRequest>>,
        fail: bool,
    }

    impl JobRunner for StubRunner {
        async fn submit(&self, request: &JobRequest) -> Result<(), RunnerError> {
            if self.fail {
                return Err(RunnerError::Spawn(std::io::Error::other("platform down")));
            }
            self.submitted.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn entry(name: &str) -> serde_json::Value {
        serde_json::json!({
            ".tag": "file",
            "name": name,
            "path_display": format!("/transcripts/raw/{name}"),
            "size": 4096,
        })
    }

    fn page(entries: Vec<serde_json::Value>, cursor: &str) -> serde_json::Value {
        serde_json::json!({"entries": entries, "cursor": cursor, "has_more": false})
    }

    struct Harness {
        service: IngestService<StubRunner>,
        _temp: TempDir,
    }

    async fn harness(server: &MockServer, runner: StubRunner) -> Harness {
        let temp = tempfile::tempdir().unwrap();
        let dropbox = DropboxClient::builder()
            .access_token("t")
            .api_base(server.uri())
            .content_base(server.uri())
            .build();
        let cursors = CursorStore::new(temp.path().join("cursors.json"));
        let ledger = ProcessedLedger::new(
            temp.path().join("processed.json"),
            Duration::from_secs(24 * 60 * 60),
        );
        let service = IngestService::new(
            dropbox,
            cursors,
            ledger,
            runner,
            IngestConfig::new("/transcripts/raw", "secret"),
        );
        Harness {
            service,
            _temp: temp,
        }
    }

    async fn mount_continue(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn first_notification_primes_cursor_without_dispatching() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page(vec![entry("old.mp3"), entry("older.wav")], "c0")),
            )
            .mount(&server)
            .await;

        let h = harness(&server, StubRunner::default()).await;
        let summary = h.service.process_changes().await.unwrap();

        assert_eq!(summary.entries_seen, 2);
        assert_eq!(summary.dispatched, 0);
        assert!(summary.cursor_committed);
        assert_eq!(
            h.service.cursors.get("/transcripts/raw").unwrap().as_deref(),
            Some("c0")
        );
        assert!(h.service.runner.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_media_files_are_dispatched_and_filtered() {
        let server = MockServer::start().await;
        mount_continue(
            &server,
            page(
                vec![
                    entry("standup.mp3"),
                    entry("notes.txt"),
                    serde_json::json!({".tag": "deleted", "name": "gone.mp3",
                        "path_display": "/transcripts/raw/gone.mp3"}),
                    serde_json::json!({".tag": "file", "name": "outside.mp3",
                        "path_display": "/other/outside.mp3", "size": 1}),
                ],
                "c1",
            ),
        )
        .await;

        let h = harness(&server, StubRunner::default()).await;
        h.service.cursors.set("/transcripts/raw", "c0").unwrap();

        let summary = h.service.process_changes().await.unwrap();

        assert_eq!(summary.entries_seen, 4);
        assert_eq!(summary.candidates, 1);
        assert_eq!(summary.dispatched, 1);
        assert!(summary.cursor_committed);

        let submitted = h.service.runner.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].file.name, "standup.mp3");
        assert_eq!(submitted[0].file.id, "_transcripts_raw_standup.mp3");

        // Ledger remembers the job.
        let record = h
            .service
            .ledger
            .get("_transcripts_raw_standup.mp3")
            .unwrap()
            .unwrap();
        assert_eq!(record.job_id.as_deref(), Some(submitted[0].job_id.as_str()));
    }

    #[tokio::test]
    async fn duplicate_delivery_dispatches_exactly_once() {
        let server = MockServer::start().await;
        // The same diff is returned for every continue call, simulating
        // at-least-once delivery of the same change.
        mount_continue(&server, page(vec![entry("standup.mp3")], "c1")).await;

        let h = harness(&server, StubRunner::default()).await;
        h.service.cursors.set("/transcripts/raw", "c0").unwrap();

        let first = h.service.process_changes().await.unwrap();
        let second = h.service.process_changes().await.unwrap();

        assert_eq!(first.dispatched, 1);
        assert_eq!(second.dispatched, 0);
        assert_eq!(second.skipped_duplicates, 1);
        assert_eq!(h.service.runner.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_dispatch_releases_claim_and_holds_cursor() {
        let server = MockServer::start().await;
        mount_continue(&server, page(vec![entry("standup.mp3")], "c1")).await;

        let h = harness(
            &server,
            StubRunner {
                fail: true,
                ..Default::default()
            },
        )
        .await;
        h.service.cursors.set("/transcripts/raw", "c0").unwrap();

        let summary = h.service.process_changes().await.unwrap();

        assert_eq!(summary.dispatch_failures, 1);
        assert!(!summary.cursor_committed);
        // Cursor still points at the old diff.
        assert_eq!(
            h.service.cursors.get("/transcripts/raw").unwrap().as_deref(),
            Some("c0")
        );
        // The claim is released for the replay.
        let record = h
            .service
            .ledger
            .get("_transcripts_raw_standup.mp3")
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ink_ledger::DispatchStatus::Failed);
    }

    #[tokio::test]
    async fn cursor_reset_reprimes_without_dispatching() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error_summary": "reset/...",
                "error": {".tag": "reset"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page(vec![entry("existing.mp3")], "c9")),
            )
            .mount(&server)
            .await;

        let h = harness(&server, StubRunner::default()).await;
        h.service.cursors.set("/transcripts/raw", "stale").unwrap();

        let summary = h.service.process_changes().await.unwrap();

        assert_eq!(summary.dispatched, 0);
        assert_eq!(
            h.service.cursors.get("/transcripts/raw").unwrap().as_deref(),
            Some("c9")
        );
        assert!(h.service.runner.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multi_page_diffs_are_drained() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .and(wiremock::matchers::body_json_string(r#"{"cursor":"c0"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [entry("a.mp3")], "cursor": "c1", "has_more": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .and(wiremock::matchers::body_json_string(r#"{"cursor":"c1"}"#))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page(vec![entry("b.mp3")], "c2")),
            )
            .mount(&server)
            .await;

        let h = harness(&server, StubRunner::default()).await;
        h.service.cursors.set("/transcripts/raw", "c0").unwrap();

        let summary = h.service.process_changes().await.unwrap();
        assert_eq!(summary.dispatched, 2);
        assert_eq!(
            h.service.cursors.get("/transcripts/raw").unwrap().as_deref(),
            Some("c2")
        );
    }
}
