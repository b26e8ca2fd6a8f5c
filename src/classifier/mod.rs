// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image classification clients
//!
//! Every client reports through the same typed outcome: the remote service
//! either produced an estimate ([`Classification::Success`]), declined with a
//! message ([`Classification::Failure`]), or could not be used at all
//! ([`ClassifyError`]). Untrusted JSON is validated here, at the boundary,
//! so nothing downstream ever sees a half-formed envelope.

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub mod live;
pub mod mock;

pub use live::HttpClassifier;
pub use mock::MockClassifier;

/// Confidence score in [0, 1], held exactly to four decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Confidence(u16);

impl Confidence {
    pub const SCALE: u16 = 10_000;

    /// Round a float to four decimal places; `None` outside [0, 1]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return None;
        }
        Some(Self((value * Self::SCALE as f64).round() as u16))
    }

    pub fn from_ten_thousandths(value: u16) -> Option<Self> {
        (value <= Self::SCALE).then_some(Self(value))
    }

    pub fn ten_thousandths(self) -> u16 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Normalized answer from a classification service
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success {
        class_id: i64,
        confidence: Confidence,
        message: String,
    },
    Failure {
        message: String,
    },
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Classification::Success { message, .. } | Classification::Failure { message } => message,
        }
    }
}

/// Reasons a classification attempt produced no usable envelope
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    /// Connection failure, non-2xx status or unreadable body
    #[error("{0}")]
    Transport(String),

    /// The service answered, but not with a valid envelope
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A service that estimates the class of the image at a path
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Client name for logging
    fn name(&self) -> &'static str;

    /// Classify one image. Exactly one attempt, no retries.
    async fn classify(&self, image_path: &str) -> Result<Classification, ClassifyError>;
}

/// Convert a raw JSON envelope into a [`Classification`]
///
/// Expected shape:
/// `{"success": bool, "message": str, "estimated_data": {"class": int, "confidence": number}}`.
/// `estimated_data` is only read when `success` is true.
pub fn decode_envelope(value: &serde_json::Value) -> Result<Classification, ClassifyError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ClassifyError::Malformed("response is not a JSON object".to_string()))?;

    let success = obj
        .get("success")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| ClassifyError::Malformed("missing boolean `success`".to_string()))?;

    let message = match obj.get("message") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(_) => return Err(ClassifyError::Malformed("`message` is not a string".to_string())),
    };

    if !success {
        return Ok(Classification::Failure { message });
    }

    let estimate = obj
        .get("estimated_data")
        .and_then(|v| v.as_object())
        .ok_or_else(|| ClassifyError::Malformed("missing object `estimated_data`".to_string()))?;

    let class_id = estimate
        .get("class")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ClassifyError::Malformed("missing integer `estimated_data.class`".to_string()))?;

    let raw_confidence = estimate
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ClassifyError::Malformed("missing number `estimated_data.confidence`".to_string()))?;

    let confidence = Confidence::from_f64(raw_confidence).ok_or_else(|| {
        ClassifyError::Malformed(format!("confidence {} outside [0, 1]", raw_confidence))
    })?;

    Ok(Classification::Success {
        class_id,
        confidence,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confidence_rounds_to_four_places() {
        let c = Confidence::from_f64(0.95).unwrap();
        assert_eq!(c.ten_thousandths(), 9500);
        assert_eq!(c.to_string(), "0.9500");

        let c = Confidence::from_f64(0.123456).unwrap();
        assert_eq!(c.to_string(), "0.1235");

        assert_eq!(Confidence::from_f64(1.0).unwrap().to_string(), "1.0000");
        assert_eq!(Confidence::from_f64(0.0).unwrap().to_string(), "0.0000");
    }

    #[test]
    fn test_confidence_rejects_out_of_range() {
        assert!(Confidence::from_f64(-0.01).is_none());
        assert!(Confidence::from_f64(1.01).is_none());
        assert!(Confidence::from_f64(f64::NAN).is_none());
        assert!(Confidence::from_ten_thousandths(10_001).is_none());
        assert!(Confidence::from_ten_thousandths(10_000).is_some());
    }

    #[test]
    fn test_decode_success() {
        let value = json!({
            "success": true,
            "message": "ok",
            "estimated_data": {"class": 7, "confidence": 0.8123}
        });
        let decoded = decode_envelope(&value).unwrap();
        assert_eq!(
            decoded,
            Classification::Success {
                class_id: 7,
                confidence: Confidence::from_ten_thousandths(8123).unwrap(),
                message: "ok".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_failure_ignores_estimate() {
        let value = json!({"success": false, "message": "bad image", "estimated_data": 0});
        let decoded = decode_envelope(&value).unwrap();
        assert_eq!(decoded, Classification::Failure { message: "bad image".to_string() });
        assert!(!decoded.is_success());
    }

    #[test]
    fn test_decode_missing_message_is_empty() {
        let value = json!({"success": false});
        assert_eq!(decode_envelope(&value).unwrap().message(), "");
    }

    #[test]
    fn test_decode_success_without_estimate_is_malformed() {
        let value = json!({"success": true, "message": "ok"});
        assert!(matches!(decode_envelope(&value), Err(ClassifyError::Malformed(_))));

        let value = json!({"success": true, "estimated_data": {"class": 1}});
        assert!(matches!(decode_envelope(&value), Err(ClassifyError::Malformed(_))));

        let value = json!({"success": true, "estimated_data": {"class": "cat", "confidence": 0.5}});
        assert!(matches!(decode_envelope(&value), Err(ClassifyError::Malformed(_))));
    }

    #[test]
    fn test_decode_non_object_is_malformed() {
        assert!(matches!(decode_envelope(&json!([1, 2])), Err(ClassifyError::Malformed(_))));
        assert!(matches!(decode_envelope(&json!("yes")), Err(ClassifyError::Malformed(_))));
        assert!(matches!(decode_envelope(&json!({"message": "x"})), Err(ClassifyError::Malformed(_))));
    }

    #[test]
    fn test_decode_confidence_out_of_range_is_malformed() {
        let value = json!({"success": true, "estimated_data": {"class": 1, "confidence": 95}});
        assert!(matches!(decode_envelope(&value), Err(ClassifyError::Malformed(_))));
    }
}
