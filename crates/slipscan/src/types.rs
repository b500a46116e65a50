//! Core data types: requests, strategies, records and envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, InvalidUrl};

/// How markup should be acquired for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Probe the URL and pick one of the other two.
    Auto,
    /// Plain HTTP GET.
    DirectFetch,
    /// Render the page in a headless browser subprocess.
    RenderedFetch,
}

impl Strategy {
    /// The method name reported in the envelope when this strategy ran.
    pub fn method(&self) -> Method {
        match self {
            Self::DirectFetch => Method::Direct,
            Self::RenderedFetch | Self::Auto => Method::Rendered,
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "direct" => Ok(Self::DirectFetch),
            "rendered" => Ok(Self::RenderedFetch),
            other => Err(format!(
                "unknown strategy `{other}` (expected auto, direct or rendered)"
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::DirectFetch => "direct",
            Self::RenderedFetch => "rendered",
        })
    }
}

/// The acquisition method that actually produced (or failed to produce) markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Direct,
    Rendered,
    Api,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Rendered => "rendered",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single acquisition request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    url: url::Url,
    strategy: Strategy,
}

impl AcquisitionRequest {
    /// Parse `url` and pair it with a strategy. Only absolute http(s) URLs are accepted.
    pub fn new(url: &str, strategy: Strategy) -> Result<Self, InvalidUrl> {
        let parsed = url::Url::parse(url.trim())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(InvalidUrl::Scheme(parsed.scheme().to_string()));
        }
        Ok(Self {
            url: parsed,
            strategy,
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
}

/// Well-known field names. Records are keyed by [`Field::key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    TransactionId,
    Amount,
    Currency,
    Date,
    SenderAccount,
    ReceiverAccount,
    SenderName,
    ReceiverName,
    Reference,
    Status,
    TransactionType,
    Description,
    Title,
    Price,
    Rating,
    Availability,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::TransactionId,
        Field::Amount,
        Field::Currency,
        Field::Date,
        Field::SenderAccount,
        Field::ReceiverAccount,
        Field::SenderName,
        Field::ReceiverName,
        Field::Reference,
        Field::Status,
        Field::TransactionType,
        Field::Description,
        Field::Title,
        Field::Price,
        Field::Rating,
        Field::Availability,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::TransactionId => "transactionId",
            Self::Amount => "amount",
            Self::Currency => "currency",
            Self::Date => "date",
            Self::SenderAccount => "senderAccount",
            Self::ReceiverAccount => "receiverAccount",
            Self::SenderName => "senderName",
            Self::ReceiverName => "receiverName",
            Self::Reference => "reference",
            Self::Status => "status",
            Self::TransactionType => "transactionType",
            Self::Description => "description",
            Self::Title => "title",
            Self::Price => "price",
            Self::Rating => "rating",
            Self::Availability => "availability",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Field name → value. Unresolved fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionRecord {
    values: BTreeMap<String, String>,
}

impl ExtractionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(field.key()).map(String::as_str)
    }

    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(field.key())
    }

    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field.key().to_string(), value.into());
    }

    /// Insert a value under an arbitrary key (table columns with no well-known field).
    pub fn insert_key(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(Field, String)> for ExtractionRecord {
    fn from_iter<I: IntoIterator<Item = (Field, String)>>(iter: I) -> Self {
        let mut record = ExtractionRecord::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}

/// Structured description of why an envelope carries no usable data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeError {
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
}

/// The unit returned to the caller for one request.
///
/// Built only by [`crate::normalize`]; there are no mutating accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionEnvelope {
    pub(crate) success: bool,
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) extracted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<EnvelopeError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) note: Option<String>,
    pub(crate) records: Vec<ExtractionRecord>,
}

impl ExtractionEnvelope {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn extracted_at(&self) -> DateTime<Utc> {
        self.extracted_at
    }

    pub fn error(&self) -> Option<&EnvelopeError> {
        self.error.as_ref()
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }
}
