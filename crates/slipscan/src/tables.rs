//! HTML table extraction: one record per data row, keyed by header.

use scraper::{ElementRef, Html, Selector};

use crate::rules::{collapse_whitespace, element_text, Validator};
use crate::types::{ExtractionRecord, Field};

const MAX_ROWS: usize = 500;

/// Map a header label onto a well-known field.
fn header_field(header: &str) -> Option<Field> {
    let field = match header {
        "transaction id" | "txn id" | "transaction no" | "id" | "trx" => Field::TransactionId,
        "reference" | "ref" | "ref no" | "reference no" | "reference number" => Field::Reference,
        "amount" | "total" | "debit" | "credit" | "transferred amount" => Field::Amount,
        "currency" | "ccy" => Field::Currency,
        "date" | "transaction date" | "value date" | "posting date" | "date time" => Field::Date,
        "from account" | "sender account" | "debit account" | "source account" => {
            Field::SenderAccount
        }
        "to account" | "receiver account" | "beneficiary account" | "credit account" => {
            Field::ReceiverAccount
        }
        "sender" | "sender name" | "payer" | "remitter" => Field::SenderName,
        "receiver" | "receiver name" | "beneficiary" | "payee" => Field::ReceiverName,
        "status" | "state" => Field::Status,
        "type" | "transaction type" => Field::TransactionType,
        "description" | "narrative" | "details" | "remarks" | "narration" => Field::Description,
        "name" | "product" | "title" | "item" => Field::Title,
        "price" | "unit price" => Field::Price,
        "rating" | "stars" => Field::Rating,
        "availability" | "stock" | "in stock" => Field::Availability,
        _ => return None,
    };
    Some(field)
}

fn normalize_header(raw: &str) -> String {
    collapse_whitespace(
        &raw.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>(),
    )
}

fn column_key(header: &str, index: usize) -> String {
    if header.is_empty() {
        format!("column_{}", index + 1)
    } else {
        header.replace(' ', "_")
    }
}

/// Cell value for a well-known field; unresolvable values fall back to the raw text.
fn cell_value(field: Option<Field>, text: &str) -> String {
    let validator = match field {
        Some(Field::Amount) => Validator::Decimal,
        Some(Field::Price) => Validator::Price,
        Some(Field::Status) => Validator::Status,
        Some(Field::Availability) => Validator::Availability,
        _ => return text.to_string(),
    };
    validator.clean(text).unwrap_or_else(|| text.to_string())
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn row_cells(row: &ElementRef<'_>, cell_sel: &Selector) -> Vec<String> {
    row.select(cell_sel).map(|c| element_text(&c)).collect()
}

/// Records for every data row of every table with a header row.
///
/// Rows whose cell count does not match the header are skipped, as are rows
/// with no non-empty cell.
pub fn extract_tables(document: &Html) -> Vec<ExtractionRecord> {
    let (Some(table_sel), Some(row_sel), Some(cell_sel)) =
        (selector("table"), selector("tr"), selector("th, td"))
    else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for table in document.select(&table_sel) {
        let mut rows = table.select(&row_sel);
        let Some(header_row) = rows.next() else {
            continue;
        };
        let headers: Vec<String> = row_cells(&header_row, &cell_sel)
            .iter()
            .map(|h| normalize_header(h))
            .collect();
        if headers.len() < 2 {
            continue;
        }
        let columns: Vec<(Option<Field>, String)> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let field = header_field(h);
                let key = field
                    .map(|f| f.key().to_string())
                    .unwrap_or_else(|| column_key(h, i));
                (field, key)
            })
            .collect();

        for row in rows.take(MAX_ROWS) {
            let cells = row_cells(&row, &cell_sel);
            if cells.len() != columns.len() || cells.iter().all(String::is_empty) {
                continue;
            }
            let mut record = ExtractionRecord::new();
            for ((field, key), text) in columns.iter().zip(cells.iter()) {
                if !text.is_empty() && record.get_key(key).is_none() {
                    record.insert_key(key.clone(), cell_value(*field, text));
                }
            }
            if !record.is_empty() {
                records.push(record);
            }
        }
    }
    records
}
