//! Transaction identifier lookup in receipt URLs.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn fallback_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[?&](?:trx|id)=([A-Z0-9]+)(?:[&#]|$)").expect("identifier regex is valid")
    })
}

/// The transaction identifier carried by `url`, if any.
///
/// Query parameters named in `params` are tried in order; then any
/// `trx=`/`id=` parameter. Only alphanumeric values count.
pub fn transaction_identifier(url: &Url, params: &[String]) -> Option<String> {
    for param in params {
        let found = url
            .query_pairs()
            .find(|(k, _)| k.eq_ignore_ascii_case(param))
            .map(|(_, v)| v.trim().to_string());
        if let Some(value) = found.filter(|v| is_identifier(v)) {
            return Some(value);
        }
    }

    fallback_pattern()
        .captures(url.as_str())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}
