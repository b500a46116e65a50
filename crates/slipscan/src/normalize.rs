//! Envelope construction: the one place an [`ExtractionEnvelope`] is built.

use chrono::{DateTime, Utc};

use crate::error::{AcquisitionError, ErrorKind};
use crate::extractor::Extraction;
use crate::types::{EnvelopeError, ExtractionEnvelope, ExtractionRecord, Method};

/// Note attached when markup was acquired but no rule matched.
pub const EMPTY_EXTRACTION_NOTE: &str =
    "markup was acquired but no extraction rule matched; the page may not have finished loading";

/// Wrap records (or an acquisition failure) in an envelope stamped with the current time.
pub fn normalize(
    records: Vec<ExtractionRecord>,
    url: &str,
    method: Method,
    source_error: Option<&AcquisitionError>,
) -> ExtractionEnvelope {
    normalize_at(records, url, method, source_error, Utc::now())
}

/// Wrap a successful extraction. Its notes (ambiguous or reassigned
/// accounts) become the envelope note unless the envelope already carries one.
pub fn normalize_extraction(extraction: Extraction, url: &str, method: Method) -> ExtractionEnvelope {
    let notes = extraction.notes.join("; ");
    let mut envelope = normalize(extraction.into_records(), url, method, None);
    if envelope.note.is_none() && !notes.is_empty() {
        envelope.note = Some(notes);
    }
    envelope
}

/// [`normalize`] with an explicit timestamp.
///
/// - An acquisition error always wins: `success` is false and no records are kept.
/// - With no error, empty records are dropped. If nothing is left, the
///   envelope reports `noContentExtracted` and carries one empty record to
///   show the attempt happened.
pub fn normalize_at(
    records: Vec<ExtractionRecord>,
    url: &str,
    method: Method,
    source_error: Option<&AcquisitionError>,
    extracted_at: DateTime<Utc>,
) -> ExtractionEnvelope {
    if let Some(err) = source_error {
        return ExtractionEnvelope {
            success: false,
            method,
            url: url.to_string(),
            extracted_at,
            error: Some(EnvelopeError {
                kind: err.kind,
                message: err.message.clone(),
                attempts: err.attempts,
            }),
            note: None,
            records: Vec::new(),
        };
    }

    let records: Vec<ExtractionRecord> = records.into_iter().filter(|r| !r.is_empty()).collect();
    if records.is_empty() {
        return ExtractionEnvelope {
            success: false,
            method,
            url: url.to_string(),
            extracted_at,
            error: Some(EnvelopeError {
                kind: ErrorKind::NoContentExtracted,
                message: "no fields could be extracted".to_string(),
                attempts: 0,
            }),
            note: Some(EMPTY_EXTRACTION_NOTE.to_string()),
            records: vec![ExtractionRecord::new()],
        };
    }

    ExtractionEnvelope {
        success: true,
        method,
        url: url.to_string(),
        extracted_at,
        error: None,
        note: None,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;

    fn record(amount: &str) -> ExtractionRecord {
        std::iter::once((Field::Amount, amount.to_string())).collect()
    }

    #[test]
    fn test_success_envelope() {
        let env = normalize(vec![record("10"), ExtractionRecord::new()], "https://x.test", Method::Direct, None);
        assert!(env.success());
        assert_eq!(env.records().len(), 1);
        assert!(env.error().is_none());
    }

    #[test]
    fn test_error_discards_records() {
        let err = AcquisitionError::render_exhausted(5, "timed out");
        let env = normalize(vec![record("10")], "https://x.test", Method::Rendered, Some(&err));
        assert!(!env.success());
        assert!(env.records().is_empty());
        let e = env.error().unwrap();
        assert_eq!(e.kind, ErrorKind::RenderExhausted);
        assert_eq!(e.attempts, 5);
    }

    #[test]
    fn test_all_empty_records() {
        let env = normalize(vec![ExtractionRecord::new()], "https://x.test", Method::Rendered, None);
        assert!(!env.success());
        assert_eq!(env.error().unwrap().kind, ErrorKind::NoContentExtracted);
        assert_eq!(env.records(), &[ExtractionRecord::new()]);
        assert_eq!(env.note(), Some(EMPTY_EXTRACTION_NOTE));

        let env = normalize(Vec::new(), "https://x.test", Method::Direct, None);
        assert_eq!(env.records().len(), 1);
    }

    #[test]
    fn test_extraction_notes_reach_the_envelope() {
        let extraction = Extraction {
            record: record("10"),
            table_rows: Vec::new(),
            notes: vec!["receiverAccount left unresolved: 2 distinct account candidates".into()],
        };
        let env = normalize_extraction(extraction, "https://x.test", Method::Rendered);
        assert!(env.success());
        assert_eq!(
            env.note(),
            Some("receiverAccount left unresolved: 2 distinct account candidates")
        );

        let quiet = normalize_extraction(
            Extraction { record: record("10"), ..Extraction::default() },
            "https://x.test",
            Method::Rendered,
        );
        assert_eq!(quiet.note(), None);

        let empty = normalize_extraction(
            Extraction { notes: vec!["x".into()], ..Extraction::default() },
            "https://x.test",
            Method::Rendered,
        );
        assert_eq!(empty.note(), Some(EMPTY_EXTRACTION_NOTE));
    }

    #[test]
    fn test_envelope_json_shape() {
        let ts = DateTime::parse_from_rfc3339("2025-07-04T10:00:00Z").unwrap().with_timezone(&Utc);
        let env = normalize_at(vec![record("6950.00")], "https://x.test/?trx=1", Method::Api, None, ts);
        let expected = serde_json::json!({
            "success": true,
            "method": "api",
            "url": "https://x.test/?trx=1",
            "extractedAt": "2025-07-04T10:00:00Z",
            "records": [{ "amount": "6950.00" }]
        });
        assert_json_diff::assert_json_eq!(serde_json::to_value(&env).unwrap(), expected);
    }
}
