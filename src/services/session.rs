// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Emulated browser session against the Strava website.
//!
//! Original uploads are only downloadable through the logged-in web UI, so
//! this client performs the login form dance and then carries the session
//! cookies on every export request. Login is attempted once per run.

use crate::config::StravaConfig;
use crate::error::AppError;
use crate::models::{ActivityId, OriginalFormat};
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Fedora; Linux x86_64; rv:88.0) Gecko/20100101 Firefox/88.0";
const TOKEN_SELECTOR: &str = "form input[name=authenticity_token]";

/// Unauthenticated web client settings. Redirects are never followed.
#[derive(Clone)]
pub struct SessionClient {
    web_url: Url,
    headers: HeaderMap,
    request_timeout: Duration,
    email: String,
    password: String,
}

/// Logged-in session. The HTTP client owns the cookie jar filled during
/// login and sends it on every request.
#[derive(Clone)]
pub struct Session {
    http: reqwest::Client,
    web_url: Url,
}

/// Result of fetching one activity's original upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The provider redirected instead of serving a file: no original exists.
    Missing,
    Original {
        format: OriginalFormat,
        bytes: Vec<u8>,
    },
}

impl SessionClient {
    pub fn new(config: &StravaConfig) -> Result<Self, AppError> {
        let web_url = Url::parse(&config.web_url)
            .map_err(|e| AppError::Config(format!("Invalid STRAVA_WEB_URL: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-GB,en;q=0.7,en-US;q=0.3"),
        );
        headers.insert(header::DNT, HeaderValue::from_static("1"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        Ok(Self {
            web_url,
            headers,
            request_timeout: config.request_timeout,
            email: config.email.clone(),
            password: config.password.clone(),
        })
    }

    /// A client with a fresh cookie jar, so every login starts clean.
    fn browser(&self) -> Result<reqwest::Client, AppError> {
        reqwest::Client::builder()
            .redirect(Policy::none())
            .default_headers(self.headers.clone())
            .cookie_provider(Arc::new(Jar::default()))
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client: {}", e)))
    }

    fn url(&self, path: &str) -> Result<Url, AppError> {
        self.web_url
            .join(path)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad URL path {}: {}", path, e)))
    }

    /// Log in with the configured account.
    ///
    /// Fails with `AppError::Auth` unless the session POST answers with a
    /// redirect to the dashboard.
    pub async fn login(&self) -> Result<Session, AppError> {
        let http = self.browser()?;

        let response = http
            .get(self.url("/login")?)
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Login page request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            return Err(AppError::Auth(format!(
                "Login page returned {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to read login page: {}", e)))?;
        let token = extract_authenticity_token(&html)
            .ok_or_else(|| AppError::Auth("Login page has no authenticity_token".into()))?;

        let response = http
            .post(self.url("/session")?)
            .form(&[
                ("utf8", "\u{2713}"),
                ("authenticity_token", token.as_str()),
                ("plan", ""),
                ("email", self.email.as_str()),
                ("password", self.password.as_str()),
                ("remember_me", "on"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Session request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::FOUND {
            return Err(AppError::Auth(format!(
                "Session login returned {} instead of a redirect",
                status
            )));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let target = self.url(location)?;
        let dashboard = self.url("/dashboard")?;
        if target != dashboard {
            return Err(AppError::Auth(format!(
                "Session login redirected to {} instead of the dashboard",
                target
            )));
        }

        tracing::info!("Web session established");

        Ok(Session {
            http,
            web_url: self.web_url.clone(),
        })
    }
}

impl Session {
    /// Download the original upload for one activity.
    pub async fn export_original(&self, id: ActivityId) -> Result<ExportOutcome, AppError> {
        let url = self
            .web_url
            .join(&format!("/activities/{}/export_original", id))
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad export URL: {}", e)))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::SourceFetch(format!("Export of {} failed: {}", id, e)))?;

        let status = response.status();
        if status.is_redirection() {
            return Ok(ExportOutcome::Missing);
        }
        if status != StatusCode::OK {
            return Err(AppError::SourceFetch(format!(
                "Export of {} returned {}",
                id, status
            )));
        }

        let format = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(OriginalFormat::classify)
            .unwrap_or(OriginalFormat::Unknown);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::SourceFetch(format!("Export body of {}: {}", id, e)))?
            .to_vec();

        Ok(ExportOutcome::Original { format, bytes })
    }
}

/// Pull the anti-forgery token out of the login form.
pub fn extract_authenticity_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(TOKEN_SELECTOR).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
