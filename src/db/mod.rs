// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for analysis results
//!
//! The store is append-only: records are inserted once and read back in
//! request order, newest first. There is no update path.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::classifier::{Classification, Confidence};
use crate::{Result, SnapclassError};

/// Longest image path or message the table holds, in characters
pub const MAX_TEXT_LEN: usize = 255;

/// Database manager for Snapclass (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A stored analysis attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub image_path: String,
    pub success: bool,
    pub message: Option<String>,
    pub class_id: Option<i64>,
    pub confidence: Option<Confidence>,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
}

/// An analysis attempt about to be stored
///
/// Only the constructors can build one, so a failed attempt never carries
/// a class or confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    image_path: String,
    success: bool,
    message: Option<String>,
    class_id: Option<i64>,
    confidence: Option<Confidence>,
    request_timestamp: DateTime<Utc>,
    response_timestamp: DateTime<Utc>,
}

impl NewAnalysis {
    pub fn succeeded(
        image_path: &str,
        class_id: i64,
        confidence: Confidence,
        message: &str,
        request_timestamp: DateTime<Utc>,
        response_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            image_path: clip(image_path),
            success: true,
            message: Some(clip(message)),
            class_id: Some(class_id),
            confidence: Some(confidence),
            request_timestamp: request_timestamp.trunc_subsecs(6),
            response_timestamp: response_timestamp.trunc_subsecs(6),
        }
    }

    pub fn failed(
        image_path: &str,
        message: &str,
        request_timestamp: DateTime<Utc>,
        response_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            image_path: clip(image_path),
            success: false,
            message: Some(clip(message)),
            class_id: None,
            confidence: None,
            request_timestamp: request_timestamp.trunc_subsecs(6),
            response_timestamp: response_timestamp.trunc_subsecs(6),
        }
    }

    pub fn from_classification(
        image_path: &str,
        classification: &Classification,
        request_timestamp: DateTime<Utc>,
        response_timestamp: DateTime<Utc>,
    ) -> Self {
        match classification {
            Classification::Success { class_id, confidence, message } => Self::succeeded(
                image_path,
                *class_id,
                *confidence,
                message,
                request_timestamp,
                response_timestamp,
            ),
            Classification::Failure { message } => {
                Self::failed(image_path, message, request_timestamp, response_timestamp)
            }
        }
    }
}

/// Cut text to the column limit on a character boundary
fn clip(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(column: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, ty, message.into())
}

fn parse_timestamp(row: &Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, Type::Text, format!("bad timestamp {:?}: {}", raw, e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    let confidence = match row.get::<_, Option<i64>>(5)? {
        Some(raw) => Some(
            u16::try_from(raw)
                .ok()
                .and_then(Confidence::from_ten_thousandths)
                .ok_or_else(|| conversion_error(5, Type::Integer, format!("confidence {} out of range", raw)))?,
        ),
        None => None,
    };

    Ok(AnalysisRecord {
        id: row.get(0)?,
        image_path: row.get(1)?,
        success: row.get(2)?,
        message: row.get(3)?,
        class_id: row.get(4)?,
        confidence,
        request_timestamp: parse_timestamp(row, 6)?,
        response_timestamp: parse_timestamp(row, 7)?,
    })
}

const SELECT_COLUMNS: &str = "SELECT id, image_path, success, message, class_id, confidence, \
                              request_timestamp, response_timestamp FROM analysis_results";

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SnapclassError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS analysis_results (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                image_path TEXT NOT NULL CHECK (length(image_path) <= 255),
                success INTEGER NOT NULL DEFAULT 0,
                message TEXT CHECK (message IS NULL OR length(message) <= 255),
                class_id INTEGER,
                confidence INTEGER CHECK (confidence IS NULL OR confidence BETWEEN 0 AND 10000),
                request_timestamp TEXT NOT NULL,
                response_timestamp TEXT NOT NULL,
                CHECK (success = 1 OR (class_id IS NULL AND confidence IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_results_request_ts ON analysis_results(request_timestamp);
        "#)?;
        Ok(())
    }

    /// Append one analysis attempt and return the stored record
    pub fn insert_result(&self, new: &NewAnalysis) -> Result<AnalysisRecord> {
        let conn = self.lock_conn()?;
        let id = Uuid::new_v4().to_string();

        conn.execute(
            r#"INSERT INTO analysis_results
               (id, image_path, success, message, class_id, confidence, request_timestamp, response_timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                id,
                new.image_path,
                new.success,
                new.message,
                new.class_id,
                new.confidence.map(|c| c.ten_thousandths()),
                format_timestamp(&new.request_timestamp),
                format_timestamp(&new.response_timestamp),
            ],
        )?;

        Ok(AnalysisRecord {
            id,
            image_path: new.image_path.clone(),
            success: new.success,
            message: new.message.clone(),
            class_id: new.class_id,
            confidence: new.confidence,
            request_timestamp: new.request_timestamp,
            response_timestamp: new.response_timestamp,
        })
    }

    /// All records, newest request first
    pub fn list_results(&self) -> Result<Vec<AnalysisRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY request_timestamp DESC, seq DESC",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn get_result(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            row_to_record,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_results(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row("SELECT COUNT(*) FROM analysis_results", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
