// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded once at startup from environment variables.
//!
//! Every required variable is checked before returning, so a misconfigured
//! deployment reports all missing names in one error instead of one per restart.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://www.strava.com/api/v3";
const DEFAULT_TOKEN_URL: &str = "https://www.strava.com/api/v3/oauth/token";
const DEFAULT_WEB_URL: &str = "https://www.strava.com";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Strava API and web-session credentials.
#[derive(Debug, Clone)]
pub struct StravaConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Long-lived credential exchanged for a bearer token on every run.
    pub refresh_token: String,
    /// Account login for the emulated browser session.
    pub email: String,
    pub password: String,
    pub api_url: String,
    pub token_url: String,
    pub web_url: String,
    /// Per-request HTTP timeout, never longer than the job timeout.
    pub request_timeout: Duration,
}

impl StravaConfig {
    /// Cap the request timeout so an abandoned run cannot outlive `job_timeout`
    /// by more than one stalled request.
    pub fn clamp_request_timeout(&mut self, job_timeout: Duration) {
        self.request_timeout = DEFAULT_REQUEST_TIMEOUT.min(job_timeout);
    }
}

/// Where blob objects are written.
#[derive(Debug, Clone)]
pub enum BlobConfig {
    S3 {
        bucket: String,
        /// Custom endpoint, e.g. `https://storage.googleapis.com` for GCS interop.
        endpoint: Option<String>,
        region: String,
        access_key: String,
        secret_key: String,
    },
    Fs {
        root: PathBuf,
    },
}

/// Per-job schedule overrides. `None` keeps the compiled-in default.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOverrides {
    pub activity_poll: Option<String>,
    pub activity_sync: Option<String>,
    pub activity_original: Option<String>,
    pub from_export: Option<String>,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub strava: StravaConfig,
    pub blob: BlobConfig,
    pub schedules: ScheduleOverrides,
    /// Wall-clock budget for a single run.
    pub job_timeout: Duration,
    /// Server port
    pub port: u16,
    pub scheduler_enabled: bool,
    /// Shared secret for `POST /jobs/{name}/run`; `None` disables the route.
    pub trigger_token: Option<String>,
    /// Unpacked account export; registers the `from-export` job when set.
    pub export_dir: Option<PathBuf>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            database_url: "postgres://localhost/activities_test".to_string(),
            strava: StravaConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
                refresh_token: "test_refresh_token".to_string(),
                email: "athlete@example.com".to_string(),
                password: "hunter2".to_string(),
                api_url: DEFAULT_API_URL.to_string(),
                token_url: DEFAULT_TOKEN_URL.to_string(),
                web_url: DEFAULT_WEB_URL.to_string(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            blob: BlobConfig::Fs {
                root: PathBuf::from("./blobs"),
            },
            schedules: ScheduleOverrides::default(),
            job_timeout: Duration::from_secs(30),
            port: 3000,
            scheduler_enabled: false,
            trigger_token: Some("test_trigger_token".to_string()),
            export_dir: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut require = |key: &'static str| {
            get(key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };

        let database_url = require("DATABASE_URL");
        let client_id = require("STRAVA_CLIENT_ID");
        let client_secret = require("STRAVA_CLIENT_SECRET");
        let refresh_token = require("STRAVA_REFRESH_TOKEN");
        let email = require("STRAVA_EMAIL");
        let password = require("STRAVA_PASSWORD");

        let backend = get("BLOB_BACKEND").unwrap_or_else(|| "s3".to_string());
        let blob = match backend.as_str() {
            "s3" => BlobConfig::S3 {
                bucket: require("BLOB_BUCKET"),
                endpoint: get("BLOB_ENDPOINT"),
                region: get("BLOB_REGION").unwrap_or_else(|| "auto".to_string()),
                access_key: require("BLOB_ACCESS_KEY"),
                secret_key: require("BLOB_SECRET_KEY"),
            },
            "fs" => BlobConfig::Fs {
                root: PathBuf::from(require("BLOB_ROOT")),
            },
            other => return Err(ConfigError::Invalid("BLOB_BACKEND", other.to_string())),
        };

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let job_timeout_secs = match get("JOB_TIMEOUT_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::Invalid("JOB_TIMEOUT_SECS", v)),
            },
            None => 30,
        };
        let job_timeout = Duration::from_secs(job_timeout_secs);

        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT", v))?,
            None => 3000,
        };

        let mut strava = StravaConfig {
            client_id,
            client_secret,
            refresh_token,
            email,
            password,
            api_url: get("STRAVA_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token_url: get("STRAVA_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            web_url: get("STRAVA_WEB_URL").unwrap_or_else(|| DEFAULT_WEB_URL.to_string()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        strava.clamp_request_timeout(job_timeout);

        Ok(Self {
            database_url,
            strava,
            blob,
            schedules: ScheduleOverrides {
                activity_poll: get("ACTIVITY_POLL_SCHEDULE"),
                activity_sync: get("ACTIVITY_SYNC_SCHEDULE"),
                activity_original: get("ACTIVITY_ORIGINAL_SCHEDULE"),
                from_export: get("FROM_EXPORT_SCHEDULE"),
            },
            job_timeout,
            port,
            scheduler_enabled: get("SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            trigger_token: get("TRIGGER_TOKEN"),
            export_dir: get("EXPORT_DIR").map(PathBuf::from),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
