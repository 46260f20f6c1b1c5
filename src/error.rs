// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by jobs, storage backends and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a run stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller (signal handler, shutdown) cancelled the run.
    Signal,
    /// The run exceeded its wall-clock budget.
    Timeout,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Signal => f.write_str("cancelled"),
            CancelReason::Timeout => f.write_str("timed out"),
        }
    }
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Credential exchange or session login failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Listing, detail or export call failed with an unexpected status.
    #[error("Source fetch failed: {0}")]
    SourceFetch(String),

    /// The provider reports the record does not exist (soft skip).
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Blob storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Run {0}")]
    Cancelled(CancelReason),

    #[error("Job already running: {0}")]
    AlreadyRunning(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Per-record conditions that end that record's processing without
    /// failing the run.
    pub fn is_soft_skip(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Storage-class failures are safe to retry on the next scheduled run.
    pub fn is_storage(&self) -> bool {
        matches!(self, AppError::Storage(_) | AppError::Database(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Auth(msg) => (StatusCode::BAD_GATEWAY, "auth_error", Some(msg.clone())),
            AppError::SourceFetch(msg) => {
                (StatusCode::BAD_GATEWAY, "source_error", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Blob storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Cancelled(reason) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "cancelled",
                Some(reason.to_string()),
            ),
            AppError::AlreadyRunning(job) => {
                (StatusCode::CONFLICT, "already_running", Some(job.clone()))
            }
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
