//! CSV export of extraction records.

use std::collections::BTreeSet;

use crate::types::{ExtractionRecord, Field};

/// Columns that always lead the header, in this order.
pub const BASE_COLUMNS: [Field; 8] = [
    Field::TransactionId,
    Field::Amount,
    Field::Currency,
    Field::Date,
    Field::SenderAccount,
    Field::ReceiverAccount,
    Field::Status,
    Field::Description,
];

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render records as CSV: base columns, then every other key seen, sorted.
/// Every cell is quoted; absent values are empty.
pub fn to_csv<'a>(records: impl IntoIterator<Item = &'a ExtractionRecord>) -> String {
    let records: Vec<&ExtractionRecord> = records.into_iter().collect();
    let base: Vec<&str> = BASE_COLUMNS.iter().map(|f| f.key()).collect();
    let extras: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.iter().map(|(k, _)| k))
        .filter(|k| !base.contains(k))
        .collect();
    let columns: Vec<&str> = base.iter().copied().chain(extras).collect();

    let mut out = columns.join(",");
    out.push('\n');
    for record in &records {
        let row: Vec<String> = columns
            .iter()
            .map(|c| quote(record.get_key(c).unwrap_or_default()))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_header_and_quoting() {
        let mut a = ExtractionRecord::new();
        a.insert(Field::Amount, "6950.00");
        a.insert(Field::Description, "said \"hi\", then left");
        let mut b = ExtractionRecord::new();
        b.insert(Field::ReceiverName, "ADDISU MELKIE");

        let csv = to_csv([&a, &b]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "transactionId,amount,currency,date,senderAccount,receiverAccount,status,description,receiverName"
        );
        assert_eq!(
            lines[1],
            r#""","6950.00","","","","","","said ""hi"", then left","""#
        );
        assert_eq!(lines[2], r#""","","","","","","","","ADDISU MELKIE""#);
    }

    #[test]
    fn test_csv_no_records() {
        let csv = to_csv(std::iter::empty());
        assert_eq!(csv.lines().count(), 1);
    }
}
