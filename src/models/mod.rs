// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;

pub use activity::{
    ActivityId, ActivityMetadata, ActivityRecord, Candidate, DigestRow, OriginalFormat,
    PayloadKind, RecordSource,
};
