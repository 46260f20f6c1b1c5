// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Job listing and manual trigger endpoints.

use crate::error::{AppError, CancelReason};
use crate::jobs::{JobInfo, JobKind, JobOutcome, RunReport};
use crate::middleware::require_trigger_token;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let trigger = Router::new()
        .route("/jobs/{name}/run", post(run_job))
        .route_layer(middleware::from_fn_with_state(state, require_trigger_token));

    Router::new().route("/jobs", get(list_jobs)).merge(trigger)
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobInfo>> {
    Json(state.runner.describe())
}

/// Response body for a finished manual run.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub job: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CancelReason>,
}

impl RunResponse {
    fn new(kind: JobKind, outcome: JobOutcome) -> (StatusCode, Self) {
        let mut body = Self {
            job: kind.name(),
            status: "succeeded",
            report: None,
            error: None,
            reason: None,
        };
        let status = match outcome {
            JobOutcome::Succeeded(report) => {
                body.report = Some(report);
                StatusCode::OK
            }
            JobOutcome::Failed(err) => {
                body.status = "failed";
                body.error = Some(err.to_string());
                StatusCode::INTERNAL_SERVER_ERROR
            }
            JobOutcome::Cancelled(reason) => {
                body.status = "cancelled";
                body.reason = Some(reason);
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, body)
    }
}

async fn run_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let kind =
        JobKind::parse(&name).ok_or_else(|| AppError::NotFound(format!("Job {}", name)))?;

    tracing::info!(job = %kind, "Manual run requested");
    let outcome = state.runner.trigger(kind).await?;

    let (status, body) = RunResponse::new(kind, outcome);
    Ok((status, Json(body)))
}
