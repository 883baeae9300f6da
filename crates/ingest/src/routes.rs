use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use ink_dropbox::webhook::{Notification, verify_signature};

use crate::error::GatewayError;
use crate::runner::JobRunner;
use crate::service::IngestService;

pub const SIGNATURE_HEADER: &str = "x-dropbox-signature";

pub struct AppState<R> {
    service: Arc<IngestService<R>>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<R> AppState<R> {
    pub fn new(service: IngestService<R>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn router<R>(state: AppState<R>) -> Router
where
    R: JobRunner + Send + Sync + 'static,
{
    Router::new()
        .route("/webhook", get(challenge))
        .route("/webhook", post(notify))
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct ChallengeParams {
    challenge: Option<String>,
}

/// Provider handshake: echo the challenge back verbatim so the sender can
/// confirm it owns this endpoint. No state is touched.
async fn challenge(
    Query(params): Query<ChallengeParams>,
) -> Result<(HeaderMap, String), GatewayError> {
    let challenge = params
        .challenge
        .ok_or_else(|| GatewayError::BadRequest("missing challenge parameter".to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain"),
    );
    headers.insert(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        axum::http::HeaderValue::from_static("nosniff"),
    );

    tracing::info!("webhook_challenge_answered");
    Ok((headers, challenge))
}

#[derive(Debug, serde::Serialize)]
struct NotifyResponse {
    status: &'static str,
}

/// Change notification entry point. The signature is checked against the
/// raw body before anything else happens; a bad signature leaves zero side
/// effects. Valid notifications are acknowledged immediately and the
/// diff-and-dispatch work runs on a detached task, keeping the response
/// well inside the sender's delivery deadline.
async fn notify<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotifyResponse>, GatewayError>
where
    R: JobRunner + Send + Sync + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| GatewayError::Auth("missing signature header".to_string()))?;

    if !verify_signature(&state.service.config().app_secret, &body, signature) {
        tracing::warn!("webhook_signature_rejected");
        return Err(GatewayError::Auth("invalid signature".to_string()));
    }

    let notification: Notification = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::BadRequest(format!("unparsable payload: {err}")))?;

    if notification.list_folder.accounts.is_empty() {
        tracing::info!("webhook_without_accounts_ignored");
        return Ok(Json(NotifyResponse { status: "ignored" }));
    }

    tracing::info!(
        accounts = notification.list_folder.accounts.len(),
        "webhook_accepted"
    );

    let service = state.service.clone();
    tokio::spawn(async move {
        match service.process_changes().await {
            Ok(summary) => {
                tracing::info!(
                    dispatched = summary.dispatched,
                    skipped = summary.skipped_duplicates,
                    failures = summary.dispatch_failures,
                    "change_processing_finished"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "change_processing_failed");
            }
        }
    });

    Ok(Json(NotifyResponse { status: "accepted" }))
}
