// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciliation engine and the dual-store writer behind it.

pub mod reconcile;
pub mod writer;

pub use reconcile::{Outcome, Reconciler};
pub use writer::{DualStoreWriter, Target};
