//! Receipt API endpoint discovery.
//!
//! Some receipt sites back their page with a JSON endpoint that answers
//! without rendering. Profiles list candidate endpoint templates; each is
//! tried with a short timeout and the first usable response wins.

use super::http_client::HttpClient;
use serde_json::Value;
use slipscan::extractor::clean_for_field;
use slipscan::{ExtractionRecord, Field};
use url::Url;

/// A usable API response.
#[derive(Debug, Clone)]
pub struct ApiHit {
    /// The endpoint that answered.
    pub api_url: String,
    /// Raw response body, run through the profile's rule chains as markup.
    pub body: String,
    /// Parsed JSON, when the body is JSON.
    pub data: Option<Value>,
}

/// Resolve an endpoint template against the page URL.
///
/// Relative templates are joined onto the page's origin; `{id}` is replaced
/// by the transaction identifier.
pub fn build_endpoint_url(page: &Url, template: &str, identifier: &str) -> Option<String> {
    let filled = template.replace("{id}", identifier);
    page.join(&filled).ok().map(|u| u.to_string())
}

/// Try each endpoint in order. Returns the first 200 response that parses as
/// JSON or mentions the identifier; `None` if nothing answers usefully.
pub async fn try_api(
    client: &HttpClient,
    page: &Url,
    templates: &[String],
    identifier: &str,
    timeout_ms: u64,
) -> Option<ApiHit> {
    for template in templates {
        let Some(api_url) = build_endpoint_url(page, template, identifier) else {
            continue;
        };

        match client.get_bounded(&api_url, 512 * 1024, timeout_ms).await {
            Ok(resp) if resp.status == 200 => {
                let data = serde_json::from_str::<Value>(&resp.body).ok();
                if data.is_some() || resp.body.contains(identifier) {
                    tracing::debug!(%api_url, "api endpoint answered");
                    return Some(ApiHit {
                        api_url,
                        body: resp.body,
                        data,
                    });
                }
            }
            Ok(resp) => tracing::trace!(%api_url, status = resp.status, "api endpoint skipped"),
            Err(e) => tracing::trace!(%api_url, error = %e, "api endpoint unreachable"),
        }
    }
    None
}

fn key_field(key: &str) -> Option<Field> {
    let norm: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let field = match norm.as_str() {
        "amount" | "transferamount" | "totalamount" | "transactionamount" => Field::Amount,
        "currency" | "currencycode" => Field::Currency,
        "date" | "transactiondate" | "createdat" | "timestamp" | "valuedate" => Field::Date,
        "fromaccount" | "sourceaccount" | "senderaccount" | "debitaccount" => Field::SenderAccount,
        "toaccount" | "destinationaccount" | "receiveraccount" | "creditaccount"
        | "beneficiaryaccount" => Field::ReceiverAccount,
        "sendername" | "fromname" | "payername" => Field::SenderName,
        "receivername" | "beneficiaryname" | "payeename" | "toname" => Field::ReceiverName,
        "reference" | "paymentreference" | "referenceno" | "referencenumber" => Field::Reference,
        "status" | "transactionstatus" => Field::Status,
        "transactionid" | "trxid" | "txnid" => Field::TransactionId,
        "transactiontype" | "type" => Field::TransactionType,
        "description" | "narrative" | "remark" | "remarks" => Field::Description,
        _ => return None,
    };
    Some(field)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn collect(value: &Value, record: &mut ExtractionRecord, depth: usize) {
    if depth > 4 {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if let (Some(field), Some(raw)) = (key_field(key), scalar(v)) {
                    if !record.contains(field) {
                        if let Some(clean) = clean_for_field(field, &raw) {
                            record.insert(field, clean);
                        }
                    }
                } else {
                    collect(v, record, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            if let Some(first) = items.first() {
                collect(first, record, depth + 1);
            }
        }
        _ => {}
    }
}

/// Map well-known keys of a JSON payload onto a record (shallowest wins).
pub fn json_record(data: &Value) -> ExtractionRecord {
    let mut record = ExtractionRecord::new();
    collect(data, &mut record, 0);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_endpoint_url() {
        let page = Url::parse("https://cs.bankofabyssinia.com/slip/?trx=FT1").unwrap();
        assert_eq!(
            build_endpoint_url(&page, "/api/slip/{id}", "FT1").as_deref(),
            Some("https://cs.bankofabyssinia.com/api/slip/FT1")
        );
        assert_eq!(
            build_endpoint_url(&page, "https://api.other.test/r/{id}.json", "FT1").as_deref(),
            Some("https://api.other.test/r/FT1.json")
        );
    }

    #[test]
    fn test_json_record_maps_known_keys() {
        let data = serde_json::json!({
            "data": {
                "transferAmount": "1,250.00",
                "currency": "etb",
                "status": "SUCCESS",
                "toAccount": "1000****4321",
                "beneficiaryName": "Mekdes Alemu",
                "branch": { "code": "042" }
            }
        });
        let record = json_record(&data);
        assert_eq!(record.get(Field::Amount), Some("1250.00"));
        assert_eq!(record.get(Field::Currency), Some("ETB"));
        assert_eq!(record.get(Field::Status), Some("Completed"));
        assert_eq!(record.get(Field::ReceiverAccount), Some("1000****4321"));
        assert_eq!(record.get(Field::ReceiverName), Some("Mekdes Alemu"));
        assert_eq!(record.len(), 5);
    }

    #[test]
    fn test_json_record_numbers_and_arrays() {
        let data = serde_json::json!([{ "amount": 75.5, "type": "Fund Transfer" }]);
        let record = json_record(&data);
        assert_eq!(record.get(Field::Amount), Some("75.5"));
        assert_eq!(record.get(Field::TransactionType), Some("Fund Transfer"));
    }
}
