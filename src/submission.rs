// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Submission flow: validate the form, classify, persist, report

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classifier::{Classifier, ClassifyError, HttpClassifier, MockClassifier};
use crate::config::ClassifierConfig;
use crate::db::{AnalysisRecord, Database, NewAnalysis, MAX_TEXT_LEN};
use crate::Result;

/// Stored when the service answered with something that is not an envelope
pub const REQUEST_FAILED_MESSAGE: &str = "API request failed.";

/// Raw form fields as posted by the browser
#[derive(Debug, Default, Clone)]
pub struct SubmissionForm {
    pub image_path: Option<String>,
    pub debug_mode: Option<String>,
}

/// Per-field validation messages
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FormErrors {
    pub image_path: Vec<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.image_path.is_empty()
    }
}

/// A validated submission
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub image_path: String,
    pub debug_mode: bool,
}

/// Checkbox and cookie values that count as "on"
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}

impl SubmissionForm {
    /// Collect decoded `name=value` pairs; a repeated field keeps its last value
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut form = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "image_path" => form.image_path = Some(value),
                "debug_mode" => form.debug_mode = Some(value),
                _ => {}
            }
        }
        form
    }

    pub fn validate(&self) -> std::result::Result<Submission, FormErrors> {
        let mut errors = FormErrors::default();
        let image_path = self.image_path.as_deref().unwrap_or("").trim();

        if image_path.is_empty() {
            errors.image_path.push("This field is required.".to_string());
        } else {
            let len = image_path.chars().count();
            if len > MAX_TEXT_LEN {
                errors.image_path.push(format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    MAX_TEXT_LEN, len
                ));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Submission {
            image_path: image_path.to_string(),
            debug_mode: parse_flag(self.debug_mode.as_deref()),
        })
    }
}

/// The live and mock clients; the debug flag picks one per request
#[derive(Clone)]
pub struct Classifiers {
    live: Arc<dyn Classifier>,
    mock: Arc<dyn Classifier>,
}

impl Classifiers {
    pub fn new(live: Arc<dyn Classifier>, mock: Arc<dyn Classifier>) -> Self {
        Self { live, mock }
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let live = HttpClassifier::new(config)?;
        let mock = match config.mock.seed {
            Some(seed) => MockClassifier::with_seed(config.mock.failure_rate, seed),
            None => MockClassifier::new(config.mock.failure_rate),
        };
        Ok(Self::new(Arc::new(live), Arc::new(mock)))
    }

    pub fn for_mode(&self, debug_mode: bool) -> &dyn Classifier {
        if debug_mode {
            self.mock.as_ref()
        } else {
            self.live.as_ref()
        }
    }
}

/// User-facing outcome notice shown after the redirect
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Success,
    Failure(String),
}

impl Notice {
    pub fn for_record(record: &AnalysisRecord) -> Self {
        if record.success {
            Notice::Success
        } else {
            Notice::Failure(record.message.clone().unwrap_or_default())
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Notice::Success)
    }

    pub fn text(&self) -> String {
        match self {
            Notice::Success => "Image analysis completed successfully.".to_string(),
            Notice::Failure(message) => format!("An error occurred: {}", message),
        }
    }
}

/// Run one classification attempt and store exactly one record for it
pub async fn submit(
    db: &Database,
    classifiers: &Classifiers,
    submission: &Submission,
) -> Result<AnalysisRecord> {
    let classifier = classifiers.for_mode(submission.debug_mode);
    info!("Classifying {:?} with {} client", submission.image_path, classifier.name());

    let request_timestamp = Utc::now();
    let outcome = classifier.classify(&submission.image_path).await;
    let response_timestamp = Utc::now();

    let new = match &outcome {
        Ok(classification) => NewAnalysis::from_classification(
            &submission.image_path,
            classification,
            request_timestamp,
            response_timestamp,
        ),
        Err(ClassifyError::Transport(text)) => {
            warn!("Classification request failed: {}", text);
            NewAnalysis::failed(&submission.image_path, text, request_timestamp, response_timestamp)
        }
        Err(ClassifyError::Malformed(reason)) => {
            warn!("Classification response rejected: {}", reason);
            NewAnalysis::failed(
                &submission.image_path,
                REQUEST_FAILED_MESSAGE,
                request_timestamp,
                response_timestamp,
            )
        }
    };

    let record = db.insert_result(&new)?;
    if record.success {
        info!(
            "Stored result {}: class {:?} ({})",
            record.id,
            record.class_id,
            record.confidence.map(|c| c.to_string()).unwrap_or_default()
        );
    } else {
        warn!("Stored failed result {}: {}", record.id, record.message.as_deref().unwrap_or(""));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, Confidence};
    use async_trait::async_trait;

    struct Fixed(std::result::Result<Classification, ClassifyError>);

    #[async_trait]
    impl Classifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn classify(&self, _image_path: &str) -> std::result::Result<Classification, ClassifyError> {
            self.0.clone()
        }
    }

    fn with_live(outcome: std::result::Result<Classification, ClassifyError>) -> Classifiers {
        Classifiers::new(Arc::new(Fixed(outcome)), Arc::new(MockClassifier::with_seed(0.0, 1)))
    }

    fn live_submission(path: &str) -> Submission {
        Submission { image_path: path.to_string(), debug_mode: false }
    }

    #[test]
    fn test_validate_requires_path() {
        let errors = SubmissionForm::default().validate().unwrap_err();
        assert_eq!(errors.image_path, vec!["This field is required.".to_string()]);

        let blank = SubmissionForm { image_path: Some("   ".to_string()), debug_mode: None };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_validate_length_limit() {
        let ok = SubmissionForm { image_path: Some("a".repeat(255)), debug_mode: None };
        assert!(ok.validate().is_ok());

        let too_long = SubmissionForm { image_path: Some("a".repeat(256)), debug_mode: None };
        let errors = too_long.validate().unwrap_err();
        assert!(errors.image_path[0].contains("it has 256"));
    }

    #[test]
    fn test_validate_trims_and_reads_flag() {
        let form = SubmissionForm {
            image_path: Some("  test/image.png ".to_string()),
            debug_mode: Some("True".to_string()),
        };
        assert_eq!(
            form.validate().unwrap(),
            Submission { image_path: "test/image.png".to_string(), debug_mode: true }
        );
    }

    #[test]
    fn test_from_pairs_keeps_last_value() {
        let form = SubmissionForm::from_pairs(vec![
            ("image_path".to_string(), "a.png".to_string()),
            ("csrf".to_string(), "ignored".to_string()),
            ("image_path".to_string(), "b.png".to_string()),
            ("debug_mode".to_string(), "on".to_string()),
        ]);
        assert_eq!(
            form.validate().unwrap(),
            Submission { image_path: "b.png".to_string(), debug_mode: true }
        );
        assert!(SubmissionForm::from_pairs(Vec::new()).validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("on")));
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("TRUE")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }

    #[tokio::test]
    async fn test_debug_mode_uses_mock() {
        let db = Database::in_memory().unwrap();
        let classifiers = with_live(Err(ClassifyError::Transport("live must not be called".to_string())));
        let submission = Submission { image_path: "test/image.png".to_string(), debug_mode: true };

        let record = submit(&db, &classifiers, &submission).await.unwrap();
        assert!(record.success);
        assert_eq!(record.class_id, Some(3));
        assert_eq!(record.confidence, Confidence::from_f64(0.95));
        assert_eq!(db.count_results().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let db = Database::in_memory().unwrap();
        let classifiers = with_live(Ok(Classification::Success {
            class_id: 8,
            confidence: Confidence::from_f64(0.5).unwrap(),
            message: "fine".to_string(),
        }));

        let record = submit(&db, &classifiers, &live_submission("x.png")).await.unwrap();
        assert!(record.success);
        assert_eq!(record.class_id, Some(8));
        assert_eq!(record.message.as_deref(), Some("fine"));
        assert!(record.response_timestamp >= record.request_timestamp);
        assert_eq!(Notice::for_record(&record), Notice::Success);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_message() {
        let db = Database::in_memory().unwrap();
        let classifiers = with_live(Ok(Classification::Failure { message: "blurry".to_string() }));

        let record = submit(&db, &classifiers, &live_submission("x.png")).await.unwrap();
        assert!(!record.success);
        assert_eq!(record.class_id, None);
        assert_eq!(record.confidence, None);
        assert_eq!(Notice::for_record(&record).text(), "An error occurred: blurry");
    }

    #[tokio::test]
    async fn test_transport_error_records_text() {
        let db = Database::in_memory().unwrap();
        let classifiers = with_live(Err(ClassifyError::Transport("connection refused".to_string())));

        let record = submit(&db, &classifiers, &live_submission("x.png")).await.unwrap();
        assert!(!record.success);
        assert_eq!(record.message.as_deref(), Some("connection refused"));
        assert_eq!(db.count_results().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_records_fixed_message() {
        let db = Database::in_memory().unwrap();
        let classifiers = with_live(Err(ClassifyError::Malformed("not an object".to_string())));

        let record = submit(&db, &classifiers, &live_submission("x.png")).await.unwrap();
        assert!(!record.success);
        assert_eq!(record.message.as_deref(), Some(REQUEST_FAILED_MESSAGE));
        assert_eq!(record.class_id, None);
        assert!(!Notice::for_record(&record).is_success());
    }

    #[tokio::test]
    async fn test_one_record_per_submission() {
        let db = Database::in_memory().unwrap();
        let classifiers = Classifiers::new(
            Arc::new(Fixed(Err(ClassifyError::Transport("down".to_string())))),
            Arc::new(MockClassifier::with_seed(0.33, 99)),
        );

        for i in 0..25 {
            let submission = Submission { image_path: format!("img_{}.png", i), debug_mode: i % 2 == 0 };
            submit(&db, &classifiers, &submission).await.unwrap();
        }

        let records = db.list_results().unwrap();
        assert_eq!(records.len(), 25);
        for record in &records {
            if !record.success {
                assert!(record.class_id.is_none() && record.confidence.is_none());
            }
        }
    }
}
