// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, Duration, Utc};

/// Oldest `created_at` still inside a freshness window ending at `now`.
pub fn freshness_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now - window
}

/// Parse a provider timestamp such as `2024-05-01T07:12:44Z`.
pub fn parse_provider_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
