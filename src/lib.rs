// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Snapclass: image classification log
//!
//! Submits image paths to a classification API (or a randomized mock),
//! records every attempt in SQLite and exports the history as CSV.

pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod submission;
pub mod web;

pub use config::AppConfig;
pub use error::{Result, SnapclassError};
