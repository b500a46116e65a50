//! Envelope rendering for stdout.

use anyhow::Result;
use clap::ValueEnum;
use slipscan::ExtractionEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per URL (an array for several URLs).
    Json,
    /// Human-readable summary.
    Pretty,
    /// All records as CSV.
    Csv,
}

/// Render envelopes in `format`. The result ends with a newline.
pub fn render(envelopes: &[ExtractionEnvelope], format: OutputFormat) -> Result<String> {
    let mut out = match format {
        OutputFormat::Json => match envelopes {
            [single] => serde_json::to_string_pretty(single)?,
            many => serde_json::to_string_pretty(many)?,
        },
        OutputFormat::Csv => {
            slipscan::export::to_csv(envelopes.iter().flat_map(|e| e.records()))
        }
        OutputFormat::Pretty => envelopes
            .iter()
            .map(pretty)
            .collect::<Vec<_>>()
            .join("\n"),
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

fn pretty(envelope: &ExtractionEnvelope) -> String {
    let mut lines = Vec::new();
    let status = if envelope.success() { "OK" } else { "!!" };
    lines.push(format!("[{status}] {} ({})", envelope.url(), envelope.method()));
    lines.push(format!(
        "     extracted at {}",
        envelope.extracted_at().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(err) = envelope.error() {
        lines.push(format!(
            "     error: {} after {} attempt(s): {}",
            err.kind, err.attempts, err.message
        ));
    }
    if let Some(note) = envelope.note() {
        lines.push(format!("     note: {note}"));
    }
    for (i, record) in envelope.records().iter().enumerate() {
        if record.is_empty() {
            continue;
        }
        lines.push(format!("     record {}:", i + 1));
        let width = record.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in record.iter() {
            lines.push(format!("       {key:<width$}  {value}"));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipscan::{normalize, ExtractionRecord, Field, Method};

    fn envelope() -> ExtractionEnvelope {
        let record: ExtractionRecord =
            std::iter::once((Field::Amount, "6950.00".to_string())).collect();
        normalize(vec![record], "https://x.test/?trx=1", Method::Rendered, None)
    }

    #[test]
    fn test_single_json_is_an_object() {
        let out = render(&[envelope()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(value.is_object());
        assert_eq!(value["records"][0]["amount"], "6950.00");

        let out = render(&[envelope(), envelope()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_pretty_and_csv() {
        let pretty = render(&[envelope()], OutputFormat::Pretty).unwrap();
        assert!(pretty.starts_with("[OK] https://x.test/?trx=1 (rendered)"));
        assert!(pretty.contains("amount  6950.00"));

        let csv = render(&[envelope()], OutputFormat::Csv).unwrap();
        assert!(csv.starts_with("transactionId,amount,"));
        assert_eq!(csv.lines().count(), 2);
    }
}
