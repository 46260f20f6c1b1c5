// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity catalog model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strava activity ID. Catalog rows are keyed and ordered by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub u64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActivityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ActivityId)
    }
}

/// How a row first entered the catalog. Set once, never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Polling,
    Export,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::Polling => "polling",
            RecordSource::Export => "export",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "polling" => Some(RecordSource::Polling),
            "export" => Some(RecordSource::Export),
            _ => None,
        }
    }
}

/// File format of an original upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginalFormat {
    Fit,
    Gpx,
    Tcx,
    Unknown,
    /// The provider confirmed there is no original. Terminal.
    Missing,
}

impl OriginalFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginalFormat::Fit => "fit",
            OriginalFormat::Gpx => "gpx",
            OriginalFormat::Tcx => "tcx",
            OriginalFormat::Unknown => "unknown",
            OriginalFormat::Missing => "missing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fit" => Some(OriginalFormat::Fit),
            "gpx" => Some(OriginalFormat::Gpx),
            "tcx" => Some(OriginalFormat::Tcx),
            "unknown" => Some(OriginalFormat::Unknown),
            "missing" => Some(OriginalFormat::Missing),
            _ => None,
        }
    }

    /// Classify a file name such as `1234.fit`, `data/1234.gpx.gz` or a
    /// `Content-Disposition` value carrying a quoted file name.
    pub fn classify(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        [OriginalFormat::Fit, OriginalFormat::Gpx, OriginalFormat::Tcx]
            .into_iter()
            .find(|format| {
                let ext = format!(".{}", format.as_str());
                let gz = format!("{ext}.gz");
                name.ends_with(&ext)
                    || name.ends_with(&gz)
                    || name.contains(&format!("{ext}\""))
                    || name.contains(&format!("{gz}\""))
            })
            .unwrap_or(OriginalFormat::Unknown)
    }
}

/// The two payload kinds mirrored per activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Structured activity detail (JSON).
    Data,
    /// Original uploaded file (FIT/GPX/TCX).
    Original,
}

impl PayloadKind {
    /// How long after insertion a row keeps being re-checked even when it
    /// already has a digest.
    pub fn freshness_window(&self) -> Duration {
        match self {
            PayloadKind::Data => Duration::days(10),
            PayloadKind::Original => Duration::days(5),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Data => "data",
            PayloadKind::Original => "original",
        }
    }
}

/// Stored activity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub source: RecordSource,
    /// Digest of the last mirrored metadata payload; empty until first sync.
    pub data_digest: String,
    /// Digest of the last mirrored original payload; empty until first sync.
    pub original_digest: String,
    pub original_format: Option<OriginalFormat>,
    pub activity_type: Option<String>,
    pub gear_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// A freshly inserted row carrying only its id and source.
    pub fn new(id: ActivityId, source: RecordSource, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            source,
            data_digest: String::new(),
            original_digest: String::new(),
            original_format: None,
            activity_type: None,
            gear_id: None,
            timestamp: None,
            created_at,
        }
    }

    pub fn digest(&self, kind: PayloadKind) -> &str {
        match kind {
            PayloadKind::Data => &self.data_digest,
            PayloadKind::Original => &self.original_digest,
        }
    }

    pub fn is_original_missing(&self) -> bool {
        self.original_format == Some(OriginalFormat::Missing)
    }

    /// Whether a run should re-check this row for `kind`: never synced, or
    /// created after `cutoff`. A missing original is never re-checked.
    pub fn is_eligible(&self, kind: PayloadKind, cutoff: DateTime<Utc>) -> bool {
        if kind == PayloadKind::Original && self.is_original_missing() {
            return false;
        }
        self.digest(kind).is_empty() || self.created_at > cutoff
    }
}

/// A row to upsert, produced by a source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: ActivityId,
    pub source: RecordSource,
}

/// Catalog view of a row selected for re-check: its id and stored digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestRow {
    pub id: ActivityId,
    pub digest: String,
}

/// Denormalized fields copied from the activity detail on metadata sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    pub activity_type: Option<String>,
    pub gear_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}
