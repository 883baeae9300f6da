mod adapters;
mod env;

use std::process::ExitCode;

use tracing_subscriber::prelude::*;

use ink_dropbox::DropboxClient;
use ink_ledger::{FileRef, JobStore, file_identity};
use ink_pipeline::{FfmpegProcessor, JobState, JobWorkspace, Orchestrator};
use ink_transcribe_openai::WhisperClient;

use adapters::{DropboxStorage, SlackNotifier, WhisperTranscriber};
use env::env;

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run())
}

async fn run() -> ExitCode {
    let env = env();

    let job_id = env
        .job_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let file = FileRef {
        id: env
            .target_file_id
            .clone()
            .unwrap_or_else(|| file_identity(&env.target_file_path)),
        path: env.target_file_path.clone(),
        name: env.target_file_name.clone(),
        size: env.target_file_size,
    };

    tracing::info!(
        job_id = %job_id,
        file = %file.name,
        path = %file.path,
        "worker_started"
    );

    let dropbox = DropboxClient::builder()
        .access_token(&env.dropbox_access_token)
        .build();

    // Make sure the output folder exists before hours of transcription
    // find out it does not.
    if let Err(err) = dropbox.create_folder(&env.processed_folder).await {
        tracing::warn!(
            folder = %env.processed_folder,
            error = %err,
            "processed_folder_bootstrap_failed"
        );
    }

    let mut whisper = WhisperClient::builder()
        .api_key(&env.openai_api_key)
        .max_payload_bytes(env.pipeline.provider_limit_bytes as usize);
    if let Some(model) = &env.openai_model {
        whisper = whisper.model(model);
    }
    if let Some(language) = &env.language {
        whisper = whisper.language(language);
    }

    let orchestrator = Orchestrator::new(
        DropboxStorage::new(dropbox),
        WhisperTranscriber::new(whisper.build()),
        SlackNotifier::new(env.slack_webhook_url.clone()),
        FfmpegProcessor,
        JobStore::new(env.state_dir.join("jobs")),
        env.pipeline.clone(),
        &env.work_dir,
        &env.processed_folder,
    );

    let outcome = tokio::time::timeout(
        env.pipeline.job_timeout(),
        orchestrator.run(&job_id, file),
    )
    .await;

    match outcome {
        Ok(Ok(record)) if record.state == JobState::Completed => {
            tracing::info!(job_id = %job_id, "job_completed");
            ExitCode::SUCCESS
        }
        Ok(Ok(record)) => {
            tracing::error!(
                job_id = %job_id,
                state = %record.state,
                error = record.error.as_deref().unwrap_or("unknown"),
                "job_did_not_complete"
            );
            ExitCode::FAILURE
        }
        Ok(Err(err)) => {
            tracing::error!(job_id = %job_id, error = %err, "job_store_failure");
            ExitCode::FAILURE
        }
        Err(_elapsed) => {
            tracing::error!(
                job_id = %job_id,
                timeout_secs = env.pipeline.job_timeout_secs,
                "job_timed_out"
            );
            let jobs = JobStore::new(env.state_dir.join("jobs"));
            if let Err(err) = jobs.record_failure(&job_id, "job wall-clock timeout exceeded") {
                tracing::warn!(job_id = %job_id, error = %err, "timeout_record_failed");
            }
            JobWorkspace::new(&env.work_dir, &job_id).cleanup().await;
            ExitCode::FAILURE
        }
    }
}
