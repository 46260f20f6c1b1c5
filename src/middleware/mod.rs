// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules.

pub mod trigger_auth;

pub use trigger_auth::require_trigger_token;
