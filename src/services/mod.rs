// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record sources and the credentials they need.

pub mod export;
pub mod session;
pub mod strava;

pub use session::{ExportOutcome, Session, SessionClient};
pub use strava::StravaClient;
