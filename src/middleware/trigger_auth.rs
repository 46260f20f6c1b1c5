// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret authentication for the job trigger route.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Require `Authorization: Bearer $TRIGGER_TOKEN`.
///
/// With no token configured the route is disabled and every request is
/// answered with 404.
pub async fn require_trigger_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.trigger_token.as_deref() else {
        return Err(StatusCode::NOT_FOUND);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default();

    if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!(path = %request.uri().path(), "Blocked trigger request with bad token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
