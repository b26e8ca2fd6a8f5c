// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Snapclass

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Result type alias for Snapclass operations
pub type Result<T> = std::result::Result<T, SnapclassError>;

/// Snapclass error types
#[derive(Error, Debug)]
pub enum SnapclassError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl IntoResponse for SnapclassError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        let body = Html(format!(
            "<!DOCTYPE html><html><body><h1>Internal Server Error</h1><p>{}</p></body></html>",
            html_escape::encode_text(&self.to_string())
        ));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
