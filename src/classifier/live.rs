// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP client for the remote classification API

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{decode_envelope, Classification, Classifier, ClassifyError};
use crate::config::ClassifierConfig;
use crate::{Result, SnapclassError};

/// Classification API client
pub struct HttpClassifier {
    client: Client,
    url: String,
}

impl HttpClassifier {
    /// Create a new client for the configured endpoint
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| SnapclassError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn classify(&self, image_path: &str) -> std::result::Result<Classification, ClassifyError> {
        debug!("Sending classification request to {}: image_path={}", self.url, image_path);

        let response = self
            .client
            .post(&self.url)
            .form(&[("image_path", image_path)])
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ClassifyError::Malformed(format!("body is not JSON: {}", e)))?;

        decode_envelope(&value)
    }
}
