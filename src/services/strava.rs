// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for the token-refresh strategy.
//!
//! Handles:
//! - Refresh-token exchange for a short-lived bearer token (never cached)
//! - Listing the current athlete's activities
//! - Fetching full activity detail as raw JSON

use crate::config::StravaConfig;
use crate::error::AppError;
use crate::models::{ActivityId, ActivityMetadata, Candidate, RecordSource};
use crate::time_utils::parse_provider_timestamp;
use serde::Deserialize;
use std::time::Duration;

/// Page size used by the listing endpoint when polling.
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    request_timeout: Duration,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(config: &StravaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            request_timeout: config.request_timeout,
        }
    }

    /// Exchange the configured refresh token for a bearer token.
    ///
    /// Every run calls this once; the result is not cached.
    pub async fn refresh_access_token(&self) -> Result<String, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .timeout(self.request_timeout)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token refresh failed");
            return Err(AppError::Auth(format!(
                "Token refresh failed with status {}",
                status
            )));
        }

        let token: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to parse token response: {}", e)))?;

        if token.access_token.is_empty() {
            return Err(AppError::Auth("Token response has empty access_token".into()));
        }

        tracing::debug!(expires_at = ?token.expires_at, "Access token refreshed");
        Ok(token.access_token)
    }

    /// List one page of the current athlete's activities.
    pub async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.api_url);

        let response = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .bearer_auth(access_token)
            .query(&[("page", page.to_string()), ("per_page", per_page.to_string())])
            .send()
            .await
            .map_err(|e| AppError::SourceFetch(e.to_string()))?;

        let body = check_response(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::SourceFetch(format!("JSON parse error: {}", e)))
    }

    /// Get a detailed activity by ID.
    ///
    /// A deleted activity ("Record Not Found", HTTP 404) yields
    /// `AppError::NotFound`.
    pub async fn get_activity(
        &self,
        access_token: &str,
        id: ActivityId,
    ) -> Result<ActivityDetail, AppError> {
        let url = format!("{}/activities/{}", self.api_url, id);

        let response = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::SourceFetch(e.to_string()))?;

        let body = match check_response(response).await {
            Ok(body) => body,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::NotFound(format!("Activity {}", id)));
            }
            Err(e) => return Err(e),
        };

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| AppError::SourceFetch(format!("JSON parse error: {}", e)))?;
        Ok(ActivityDetail::from_json(raw))
    }
}

/// Map non-success statuses onto the error taxonomy and return the body.
async fn check_response(response: reqwest::Response) -> Result<String, AppError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::SourceFetch(format!("Failed to read body: {}", e)))?;

    if status.is_success() {
        return Ok(body);
    }

    match status.as_u16() {
        401 => Err(AppError::Auth(format!("HTTP {}: {}", status, body))),
        404 => Err(AppError::NotFound(format!("HTTP {}: {}", status, body))),
        429 => {
            tracing::warn!("Strava rate limit hit (429)");
            Err(AppError::SourceFetch(format!("HTTP {}: rate limited", status)))
        }
        _ => Err(AppError::SourceFetch(format!("HTTP {}: {}", status, body))),
    }
}

/// Token refresh response from Strava. Only `access_token` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: ActivityId,
    #[serde(default)]
    pub name: Option<String>,
}

impl StravaActivitySummary {
    pub fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id,
            source: RecordSource::Polling,
        }
    }
}

/// Full activity detail. The raw document is what gets mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDetail {
    pub raw: serde_json::Value,
    pub metadata: ActivityMetadata,
}

impl ActivityDetail {
    pub fn from_json(raw: serde_json::Value) -> Self {
        let text = |field: &str| {
            raw.get(field)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let metadata = ActivityMetadata {
            activity_type: text("type").or_else(|| text("sport_type")),
            gear_id: text("gear_id"),
            timestamp: text("start_date").and_then(|s| parse_provider_timestamp(&s)),
        };

        Self { raw, metadata }
    }

    /// Pretty-printed JSON, the raw form of the mirrored payload.
    pub fn payload(&self) -> Result<Vec<u8>, AppError> {
        serde_json::to_vec_pretty(&self.raw)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode activity: {}", e)))
    }
}
