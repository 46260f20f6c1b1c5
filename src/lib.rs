// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity mirror: keeps a relational catalog and blob storage in step
//! with a Strava account.
//!
//! Jobs list activities through the API or an account export, then mirror
//! each activity's detail JSON and original upload into blob storage,
//! writing only when the content digest changed.

pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod sync;
pub mod time_utils;

use config::Config;
use jobs::JobRunner;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub runner: std::sync::Arc<JobRunner>,
}
