// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! CSV export of stored analysis results

use std::io::Write;

use crate::db::AnalysisRecord;
use crate::Result;

/// Download name offered by the web export
pub const EXPORT_FILENAME: &str = "image_analysis_results.csv";

pub const HEADER: [&str; 7] = [
    "Image Path",
    "Success",
    "Message",
    "Class ID",
    "Confidence",
    "Request Timestamp",
    "Response Timestamp",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write the header and one row per record, in the order given
pub fn write_csv<W: Write>(records: &[AnalysisRecord], writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    csv.write_record(HEADER)?;
    for record in records {
        csv.write_record([
            record.image_path.clone(),
            if record.success { "True" } else { "False" }.to_string(),
            record.message.clone().unwrap_or_default(),
            record.class_id.map(|c| c.to_string()).unwrap_or_default(),
            record.confidence.map(|c| c.to_string()).unwrap_or_default(),
            record.request_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            record.response_timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Render the whole document in memory
pub fn to_csv(records: &[AnalysisRecord]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Confidence;
    use crate::db::{Database, NewAnalysis};
    use chrono::{TimeZone, Utc};

    fn sample_db() -> Database {
        let db = Database::in_memory().unwrap();
        let req = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let resp = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 8).unwrap();
        db.insert_result(&NewAnalysis::succeeded(
            "test.jpg",
            1,
            Confidence::from_f64(0.99).unwrap(),
            "Test",
            req,
            resp,
        ))
        .unwrap();
        db.insert_result(&NewAnalysis::failed(
            "dir, with comma/b.png",
            "error: \"timeout\"",
            req + chrono::Duration::seconds(60),
            resp + chrono::Duration::seconds(60),
        ))
        .unwrap();
        db
    }

    #[test]
    fn test_header_only_when_empty() {
        let out = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            out,
            "Image Path,Success,Message,Class ID,Confidence,Request Timestamp,Response Timestamp\r\n"
        );
    }

    #[test]
    fn test_rows_follow_store_order() {
        let db = sample_db();
        let out = String::from_utf8(to_csv(&db.list_results().unwrap()).unwrap()).unwrap();
        let lines: Vec<&str> = out.split("\r\n").filter(|l| !l.is_empty()).collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            r#""dir, with comma/b.png",False,"error: ""timeout""",,,2024-03-09 14:06:07,2024-03-09 14:06:08"#
        );
        assert_eq!(lines[2], "test.jpg,True,Test,1,0.9900,2024-03-09 14:05:07,2024-03-09 14:05:08");
    }

    #[test]
    fn test_export_is_idempotent() {
        let db = sample_db();
        let first = to_csv(&db.list_results().unwrap()).unwrap();
        let second = to_csv(&db.list_results().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parses_back_as_csv() {
        let db = sample_db();
        let bytes = to_csv(&db.list_results().unwrap()).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "dir, with comma/b.png");
        assert_eq!(&rows[0][2], "error: \"timeout\"");
    }
}
