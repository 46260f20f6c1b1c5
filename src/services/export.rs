// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reader for a downloaded account export (the GDPR archive).
//!
//! The archive has an `activities.csv` index whose first column is the
//! activity ID and whose thirteenth column is the relative path of the
//! original upload, possibly gzipped.

use crate::digest;
use crate::error::AppError;
use crate::models::{ActivityId, Candidate, OriginalFormat, RecordSource};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

pub const INDEX_FILE: &str = "activities.csv";
const HEADER_SENTINEL: &str = "Activity ID";
const FILENAME_COLUMN: usize = 12;

/// Parsed `activities.csv`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportIndex {
    pub candidates: Vec<Candidate>,
    /// Relative original file path for rows that have one.
    pub files: BTreeMap<ActivityId, String>,
}

/// Parse the CSV index. The header row is recognized by its first column.
pub fn parse_index<R: std::io::Read>(reader: R) -> Result<ExportIndex, AppError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut index = ExportIndex::default();
    for (line, record) in csv.records().enumerate() {
        let record = record
            .map_err(|e| AppError::SourceFetch(format!("Export CSV line {}: {}", line + 1, e)))?;

        let Some(first) = record.get(0) else {
            continue;
        };
        if first == HEADER_SENTINEL || first.trim().is_empty() {
            continue;
        }

        let id: ActivityId = first.parse().map_err(|_| {
            AppError::SourceFetch(format!(
                "Export CSV line {}: invalid activity ID {:?}",
                line + 1,
                first
            ))
        })?;

        index.candidates.push(Candidate {
            id,
            source: RecordSource::Export,
        });

        if let Some(file) = record.get(FILENAME_COLUMN).map(str::trim) {
            if !file.is_empty() {
                index.files.insert(id, file.to_string());
            }
        }
    }

    Ok(index)
}

/// Read and parse `activities.csv` under `export_dir`.
pub async fn read_index(export_dir: &Path) -> Result<ExportIndex, AppError> {
    let path = export_dir.join(INDEX_FILE);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::SourceFetch(format!("Failed to open {}: {}", path.display(), e)))?;
    parse_index(bytes.as_slice())
}

/// Resolve `relative` under `export_dir`, refusing paths that escape it.
fn resolve(export_dir: &Path, relative: &str) -> Result<PathBuf, AppError> {
    let rel = Path::new(relative);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(AppError::SourceFetch(format!(
            "Export file path {:?} leaves the export directory",
            relative
        )));
    }
    Ok(export_dir.join(rel))
}

/// Load one original file as raw bytes, inflating `.gz` files, and classify
/// its format from the file name.
pub async fn load_original(
    export_dir: &Path,
    relative: &str,
) -> Result<(OriginalFormat, Vec<u8>), AppError> {
    let path = resolve(export_dir, relative)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::SourceFetch(format!("Failed to read {}: {}", path.display(), e)))?;

    let raw = if relative.ends_with(".gz") {
        digest::decompress(&bytes).map_err(|e| {
            AppError::SourceFetch(format!("Failed to inflate {}: {}", path.display(), e))
        })?
    } else {
        bytes
    };

    Ok((OriginalFormat::classify(relative), raw))
}
