//! HTTP host for the runner: starts runs (optionally as an SSE stream),
//! reports status, aborts, and serves counts and the latest run record.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::counter;
use crate::models::{StreamMessage, TestCounts};
use crate::runner::{Orchestrator, RunOptions};

/// Cadence of explicit heartbeat messages on an open stream.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<Config>,
    pub workspace: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RunRequest {
    streaming: bool,
    #[serde(flatten)]
    options: RunOptions,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            streaming: true,
            options: RunOptions::default(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/runs",
            post(start_run).get(run_status).delete(abort_run),
        )
        .route("/api/runs/latest", get(latest_run))
        .route("/api/counts", get(test_counts))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "pulse host listening");
    axum::serve(listener, router(state))
        .await
        .context("server error")
}

async fn start_run(State(state): State<AppState>, body: String) -> Response {
    // Tolerate an empty body; reject anything else that isn't valid JSON.
    let request: RunRequest = if body.trim().is_empty() {
        RunRequest::default()
    } else {
        match serde_json::from_str(&body) {
            Ok(request) => request,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("invalid request: {err}") })),
                )
                    .into_response();
            }
        }
    };
    let execution_id = match state.orchestrator.start(request.options).await {
        Ok(id) => id,
        Err(err) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };

    if !request.streaming {
        return (
            StatusCode::ACCEPTED,
            Json(json!({ "executionId": execution_id })),
        )
            .into_response();
    }

    Sse::new(event_stream(Arc::clone(&state.orchestrator), execution_id)).into_response()
}

/// Bridge the orchestrator's broadcast channel into one client's SSE body:
/// a `connection_established` preamble, fenced run events, periodic
/// heartbeats, and termination on the run's `stream_complete`. A send
/// failure means the client is gone; that aborts the run it was watching
/// (the tab-closed safety net).
fn event_stream(
    orchestrator: Arc<Orchestrator>,
    execution_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let (tx, rx) = mpsc::channel::<StreamMessage>(64);
    let mut events = orchestrator.subscribe();

    tokio::spawn(async move {
        let established = StreamMessage::ConnectionEstablished {
            execution_id: execution_id.clone(),
            timestamp: Utc::now(),
        };
        if tx.send(established).await.is_err() {
            return;
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                message = events.recv() => match message {
                    Ok(message) => {
                        if let Some(id) = message.execution_id()
                            && id != execution_id
                        {
                            continue;
                        }
                        let done = matches!(message, StreamMessage::StreamComplete { .. });
                        if tx.send(message).await.is_err() {
                            debug!(execution_id = %execution_id, "stream client disconnected");
                            orchestrator.abort_if_current(&execution_id).await;
                            break;
                        }
                        if done {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "stream consumer lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = heartbeat.tick() => {
                    let beat = StreamMessage::Heartbeat { timestamp: Utc::now() };
                    if tx.send(beat).await.is_err() {
                        debug!(execution_id = %execution_id, "stream client disconnected");
                        orchestrator.abort_if_current(&execution_id).await;
                        break;
                    }
                }
            }
        }
    });

    futures_util::stream::unfold(rx, |mut rx| async move {
        let message = rx.recv().await?;
        let event = match serde_json::to_string(&message) {
            Ok(json) => Event::default().data(json),
            Err(err) => {
                warn!(error = %err, "failed to encode stream message");
                return None;
            }
        };
        Some((Ok::<_, Infallible>(event), rx))
    })
}

async fn run_status(State(state): State<AppState>) -> Response {
    Json(state.orchestrator.status().await).into_response()
}

async fn abort_run(State(state): State<AppState>) -> Response {
    let aborted = state.orchestrator.abort().await;
    Json(json!({ "aborted": aborted })).into_response()
}

async fn latest_run(State(state): State<AppState>) -> Response {
    match state.orchestrator.history().load_latest() {
        Ok(Some(results)) => Json(results).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no runs recorded yet" })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Fresh scan of the test tree; the fallback when a live run hasn't
/// supplied counts yet.
async fn test_counts(State(state): State<AppState>) -> Json<TestCounts> {
    let workspace = state.workspace.clone();
    let scan_config = state.config.scan.clone();
    let counts = tokio::task::spawn_blocking(move || counter::scan(&workspace, &scan_config))
        .await
        .unwrap_or_else(|_| counter::scan(&state.workspace, &state.config.scan));
    Json(counts)
}
