//! Extraction rules: a matcher (regex or CSS selector) paired with a validator.
//!
//! A rule turns markup into zero or more *candidates*. A candidate is a
//! captured value that survived its validator's cleanup; anything the
//! validator rejects is dropped on the spot (`ValidationRejected` is never
//! surfaced). Regexes are compiled case-insensitive. Selectors run against a
//! lazily parsed document that is shared by every rule of one extraction.

use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::BTreeMap;

use crate::error::ProfileError;
use crate::types::Field;

/// Upper bound on matches inspected per rule before giving up on it.
const MAX_MATCHES_PER_RULE: usize = 64;

fn default_name_len() -> usize {
    5
}

fn default_account_digits() -> usize {
    10
}

fn default_text_len() -> usize {
    200
}

// ── Declarative rule format ──────────────────────────────────────────────────

/// Cleanup/validation contract applied to every captured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Non-negative decimal; thousands separators are stripped.
    Decimal,
    /// Positive price; currency symbols and European separators tolerated.
    Price,
    /// Rating on a scale of at most 10.
    Rating,
    /// Person or company name. With `uppercase`, only the leading run of
    /// all-caps words is kept (receipts print names in capitals).
    Name {
        #[serde(default = "default_name_len")]
        min_len: usize,
        #[serde(default)]
        uppercase: bool,
    },
    /// Account number containing a `*` mask.
    MaskedAccount,
    /// Masked account, or a plain account of at least `min_digits` digits.
    Account {
        #[serde(default = "default_account_digits")]
        min_digits: usize,
    },
    Date,
    /// Alphanumeric reference code containing at least one digit.
    Reference,
    /// Canonicalised transaction status keyword.
    Status,
    /// Canonicalised stock availability.
    Availability,
    /// Three-letter currency code.
    Currency,
    Text {
        #[serde(default = "default_text_len")]
        max_len: usize,
    },
}

/// Where a companion value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Companion {
    /// A fixed value (e.g. the currency implied by an `ETB …` pattern).
    Literal(String),
    /// Another capture group of the same regex match.
    Group(usize),
}

/// One rule as written in a pattern library file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Attribute to read instead of element text (selectors only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    /// Capture group holding the value. Defaults to 1, or 0 for group-less patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    pub validate: Validator,
    /// Values committed alongside this one, for fields left unresolved by their own chain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub also: BTreeMap<Field, Companion>,
}

// ── Compiled rules ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Matcher {
    Regex { regex: Regex, group: usize },
    Selector { selector: Selector, attr: Option<String> },
}

/// A compiled, ready-to-run extraction rule.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    matcher: Matcher,
    validator: Validator,
    also: Vec<(Field, Companion)>,
    source: String,
}

/// A validated value produced by a rule, with its companion values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub companions: Vec<(Field, String)>,
}

/// Markup shared by every rule of one extraction; the DOM is parsed at most once.
pub struct MatchInput<'a> {
    markup: &'a str,
    document: OnceCell<Html>,
}

impl<'a> MatchInput<'a> {
    pub fn new(markup: &'a str) -> Self {
        Self {
            markup,
            document: OnceCell::new(),
        }
    }

    pub fn markup(&self) -> &'a str {
        self.markup
    }

    pub fn document(&self) -> &Html {
        self.document
            .get_or_init(|| Html::parse_document(self.markup))
    }
}

impl ExtractionRule {
    /// Compile a rule definition. `profile` and `field` only feed error messages.
    pub fn compile(def: &RuleDef, profile: &str, field: &str) -> Result<Self, ProfileError> {
        let matcher = match (&def.pattern, &def.selector) {
            (Some(pattern), None) => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ProfileError::InvalidPattern {
                        profile: profile.to_string(),
                        field: field.to_string(),
                        message: e.to_string(),
                    })?;
                let group = def
                    .group
                    .unwrap_or(if regex.captures_len() > 1 { 1 } else { 0 });
                if group >= regex.captures_len() {
                    return Err(ProfileError::InvalidPattern {
                        profile: profile.to_string(),
                        field: field.to_string(),
                        message: format!("capture group {group} does not exist in `{pattern}`"),
                    });
                }
                Matcher::Regex { regex, group }
            }
            (None, Some(css)) => {
                let selector = Selector::parse(css).map_err(|e| ProfileError::InvalidSelector {
                    profile: profile.to_string(),
                    field: field.to_string(),
                    message: format!("{e:?}"),
                })?;
                Matcher::Selector {
                    selector,
                    attr: def.attr.clone(),
                }
            }
            _ => {
                return Err(ProfileError::MissingMatcher {
                    profile: profile.to_string(),
                    field: field.to_string(),
                })
            }
        };

        Ok(Self {
            matcher,
            validator: def.validate.clone(),
            also: def.also.iter().map(|(f, c)| (*f, c.clone())).collect(),
            source: def
                .pattern
                .clone()
                .or_else(|| def.selector.clone())
                .unwrap_or_default(),
        })
    }

    /// The pattern or selector text, for diagnostics.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// First validated candidate, if any.
    pub fn first_candidate(&self, input: &MatchInput<'_>) -> Option<Candidate> {
        self.candidates(input).into_iter().next()
    }

    /// Every validated candidate, in document order.
    pub fn candidates(&self, input: &MatchInput<'_>) -> Vec<Candidate> {
        match &self.matcher {
            Matcher::Regex { regex, group } => regex
                .captures_iter(input.markup())
                .take(MAX_MATCHES_PER_RULE)
                .filter_map(|caps| {
                    let raw = caps.get(*group)?.as_str();
                    let value = self.validator.clean(raw)?;
                    let companions = self
                        .also
                        .iter()
                        .filter_map(|(field, companion)| {
                            let v = match companion {
                                Companion::Literal(v) => v.clone(),
                                Companion::Group(g) => caps.get(*g)?.as_str().trim().to_string(),
                            };
                            companion_value(*field, &v).map(|v| (*field, v))
                        })
                        .collect();
                    Some(Candidate { value, companions })
                })
                .collect(),
            Matcher::Selector { selector, attr } => input
                .document()
                .select(selector)
                .take(MAX_MATCHES_PER_RULE)
                .filter_map(|el| {
                    let raw = match attr {
                        Some(name) => el.value().attr(name)?.to_string(),
                        None => element_text(&el),
                    };
                    let value = self.validator.clean(&raw)?;
                    let companions = self
                        .also
                        .iter()
                        .filter_map(|(field, companion)| match companion {
                            Companion::Literal(v) => {
                                companion_value(*field, v).map(|v| (*field, v))
                            }
                            Companion::Group(_) => None,
                        })
                        .collect();
                    Some(Candidate { value, companions })
                })
                .collect(),
        }
    }
}

fn companion_value(field: Field, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match field {
        Field::Currency => Validator::Currency.clean(trimmed),
        _ => Some(trimmed.to_string()),
    }
}

/// Visible text of an element with whitespace collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Validators ───────────────────────────────────────────────────────────────

impl Validator {
    /// Clean `raw` and return it if it qualifies, `None` otherwise.
    pub fn clean(&self, raw: &str) -> Option<String> {
        match self {
            Self::Decimal => clean_decimal(raw),
            Self::Price => clean_price(raw),
            Self::Rating => clean_rating(raw),
            Self::Name { min_len, uppercase } => clean_name(raw, *min_len, *uppercase),
            Self::MaskedAccount => clean_account(raw).filter(|a| a.contains('*')),
            Self::Account { min_digits } => clean_account(raw).filter(|a| {
                a.contains('*') || a.chars().filter(char::is_ascii_digit).count() >= *min_digits
            }),
            Self::Date => {
                let value = collapse_whitespace(raw);
                (!value.is_empty() && value.len() <= 40 && value.chars().any(|c| c.is_ascii_digit()))
                    .then_some(value)
            }
            Self::Reference => {
                let value = raw.trim();
                (value.len() >= 4
                    && value.len() <= 40
                    && value.chars().all(|c| c.is_ascii_alphanumeric())
                    && value.chars().any(|c| c.is_ascii_digit()))
                .then(|| value.to_ascii_uppercase())
            }
            Self::Status => classify_status(raw).map(str::to_string),
            Self::Availability => classify_availability(raw).map(str::to_string),
            Self::Currency => {
                let value = raw.trim();
                (value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()))
                    .then(|| value.to_ascii_uppercase())
            }
            Self::Text { max_len } => {
                let value = collapse_whitespace(raw);
                (!value.is_empty() && value.len() <= *max_len).then_some(value)
            }
        }
    }
}

fn clean_decimal(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let cleaned = cleaned.strip_suffix('.').unwrap_or(&cleaned).to_string();
    if cleaned.is_empty()
        || !cleaned.starts_with(|c: char| c.is_ascii_digit())
        || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(cleaned)
}

fn clean_price(raw: &str) -> Option<String> {
    let numeric: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if numeric.is_empty() {
        return None;
    }
    // 1.234,56 (European) vs 1,234.56
    let normalized = match (numeric.rfind(','), numeric.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => numeric.replace('.', "").replace(',', "."),
        (Some(comma), None) if numeric.len() - comma == 3 => numeric.replace(',', "."),
        _ => numeric.replace(',', ""),
    };
    let value: f64 = normalized.parse().ok()?;
    (value.is_finite() && value > 0.0).then(|| format!("{value:.2}"))
}

fn clean_rating(raw: &str) -> Option<String> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let number: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = number.trim_end_matches('.').parse().ok()?;
    ((0.0..=10.0).contains(&value)).then(|| number.trim_end_matches('.').to_string())
}

fn clean_name(raw: &str, min_len: usize, uppercase: bool) -> Option<String> {
    let collapsed = collapse_whitespace(raw);
    let value = if uppercase {
        collapsed
            .split(' ')
            .take_while(|word| {
                word.chars().any(|c| c.is_alphabetic())
                    && word
                        .chars()
                        .all(|c| c.is_uppercase() || c == '.' || c == '\'' || c == '-')
            })
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        collapsed
    };
    let value = value
        .trim_end_matches(|c: char| !c.is_alphabetic())
        .trim()
        .to_string();
    (value.chars().count() >= min_len
        && value
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '.' || c == '\'' || c == '-'))
    .then_some(value)
}

fn clean_account(raw: &str) -> Option<String> {
    let value: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (value.chars().filter(char::is_ascii_digit).count() >= 2
        && value.chars().all(|c| c.is_ascii_digit() || c == '*'))
    .then_some(value)
}

fn classify_status(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_lowercase();
    if lower.starts_with("complete") || lower.starts_with("success") {
        Some("Completed")
    } else if lower.starts_with("fail") || lower.starts_with("declined") {
        Some("Failed")
    } else if lower.starts_with("pending") || lower.starts_with("processing") {
        Some("Pending")
    } else {
        None
    }
}

fn classify_availability(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_lowercase().replace(['-', '_'], " ");
    if lower.contains("outofstock")
        || lower.contains("out of stock")
        || lower.contains("sold out")
        || lower.contains("unavailable")
    {
        Some("OutOfStock")
    } else if lower.contains("preorder") || lower.contains("pre order") {
        Some("PreOrder")
    } else if lower.contains("limited") {
        Some("LimitedAvailability")
    } else if lower.contains("instock") || lower.contains("in stock") || lower == "available" {
        Some("InStock")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex_rule(pattern: &str, validate: Validator) -> ExtractionRule {
        let def = RuleDef {
            pattern: Some(pattern.to_string()),
            selector: None,
            attr: None,
            group: None,
            validate,
            also: BTreeMap::new(),
        };
        ExtractionRule::compile(&def, "test", "field").unwrap()
    }

    #[test]
    fn test_decimal_strips_commas() {
        assert_eq!(Validator::Decimal.clean("6,950.00"), Some("6950.00".into()));
        assert_eq!(Validator::Decimal.clean(" 1,000 "), Some("1000".into()));
        assert_eq!(Validator::Decimal.clean("150."), Some("150".into()));
        assert_eq!(Validator::Decimal.clean(",,,"), None);
        assert_eq!(Validator::Decimal.clean("-5"), None);
        assert_eq!(Validator::Decimal.clean("1.2.3"), None);
    }

    #[test]
    fn test_price_formats() {
        assert_eq!(Validator::Price.clean("$29.99"), Some("29.99".into()));
        assert_eq!(Validator::Price.clean("1.234,56 €"), Some("1234.56".into()));
        assert_eq!(Validator::Price.clean("29,99"), Some("29.99".into()));
        assert_eq!(Validator::Price.clean("$0.00"), None);
        assert_eq!(Validator::Price.clean("call us"), None);
    }

    #[test]
    fn test_rating_bounds() {
        assert_eq!(Validator::Rating.clean("4.5 out of 5"), Some("4.5".into()));
        assert_eq!(Validator::Rating.clean("85"), None);
    }

    #[test]
    fn test_uppercase_name_keeps_leading_caps() {
        let v = Validator::Name {
            min_len: 6,
            uppercase: true,
        };
        assert_eq!(
            v.clean("ADDISU MELKIE ADMASU Transaction Date"),
            Some("ADDISU MELKIE ADMASU".into())
        );
        assert_eq!(v.clean("Transferred amount"), None);
        assert_eq!(v.clean("ABE"), None);
    }

    #[test]
    fn test_name_strips_trailing_noise() {
        let v = Validator::Name {
            min_len: 5,
            uppercase: false,
        };
        assert_eq!(v.clean("Abebe Kebede :"), Some("Abebe Kebede".into()));
        assert_eq!(v.clean("Abebe 123 Kebede"), None);
    }

    #[test]
    fn test_account_validators() {
        assert_eq!(Validator::MaskedAccount.clean("4******72"), Some("4******72".into()));
        assert_eq!(Validator::MaskedAccount.clean("1000123456789"), None);
        let acct = Validator::Account { min_digits: 10 };
        assert_eq!(acct.clean("1000123456789"), Some("1000123456789".into()));
        assert_eq!(acct.clean("12345"), None);
        assert_eq!(acct.clean("1000****6789"), Some("1000****6789".into()));
    }

    #[test]
    fn test_reference_requires_digit() {
        assert_eq!(Validator::Reference.clean("erence"), None);
        assert_eq!(
            Validator::Reference.clean("ft25185n7tlh"),
            Some("FT25185N7TLH".into())
        );
    }

    #[test]
    fn test_status_and_availability() {
        assert_eq!(Validator::Status.clean("SUCCESS"), Some("Completed".into()));
        assert_eq!(Validator::Status.clean("pending"), Some("Pending".into()));
        assert_eq!(Validator::Status.clean("unknown"), None);
        assert_eq!(
            Validator::Availability.clean("https://schema.org/InStock"),
            Some("InStock".into())
        );
        assert_eq!(
            Validator::Availability.clean("Sold out"),
            Some("OutOfStock".into())
        );
    }

    #[test]
    fn test_rule_is_case_insensitive() {
        let rule = regex_rule(r"etb\s+([\d,]+\.?\d*)", Validator::Decimal);
        let input = MatchInput::new("Total: ETB 6,950.00");
        assert_eq!(rule.first_candidate(&input).unwrap().value, "6950.00");
    }

    #[test]
    fn test_rule_skips_rejected_matches() {
        let rule = regex_rule(r"Reference[:\s]*([A-Z0-9]+)", Validator::Reference);
        let input = MatchInput::new("Reference: none Reference: 47987614");
        assert_eq!(rule.first_candidate(&input).unwrap().value, "47987614");
    }

    #[test]
    fn test_group_companion() {
        let mut also = BTreeMap::new();
        also.insert(Field::Currency, Companion::Group(2));
        let def = RuleDef {
            pattern: Some(r"([0-9,]+\.?[0-9]*)\s*(ETB|USD)".into()),
            selector: None,
            attr: None,
            group: None,
            validate: Validator::Decimal,
            also,
        };
        let rule = ExtractionRule::compile(&def, "test", "amount").unwrap();
        let cand = rule.first_candidate(&MatchInput::new("paid 1,250 usd")).unwrap();
        assert_eq!(cand.value, "1250");
        assert_eq!(cand.companions, vec![(Field::Currency, "USD".to_string())]);
    }

    #[test]
    fn test_selector_rule_reads_attribute() {
        let def = RuleDef {
            pattern: None,
            selector: Some(r#"[itemprop="price"]"#.into()),
            attr: Some("content".into()),
            group: None,
            validate: Validator::Price,
            also: BTreeMap::new(),
        };
        let rule = ExtractionRule::compile(&def, "test", "price").unwrap();
        let input = MatchInput::new(r#"<meta itemprop="price" content="49.90">"#);
        assert_eq!(rule.first_candidate(&input).unwrap().value, "49.90");
    }

    #[test]
    fn test_compile_errors() {
        let bad = RuleDef {
            pattern: Some("(unclosed".into()),
            selector: None,
            attr: None,
            group: None,
            validate: Validator::Date,
            also: BTreeMap::new(),
        };
        assert!(matches!(
            ExtractionRule::compile(&bad, "p", "date"),
            Err(ProfileError::InvalidPattern { .. })
        ));

        let neither = RuleDef {
            pattern: None,
            ..bad.clone()
        };
        assert!(matches!(
            ExtractionRule::compile(&neither, "p", "date"),
            Err(ProfileError::MissingMatcher { .. })
        ));

        let missing_group = RuleDef {
            pattern: Some(r"FT\d+".into()),
            group: Some(1),
            ..bad
        };
        assert!(ExtractionRule::compile(&missing_group, "p", "reference").is_err());
    }

    #[test]
    fn test_source_reports_rule_text() {
        let rule = regex_rule(r"Reference[:\s]+(\w+)", Validator::Reference);
        assert_eq!(rule.source(), r"Reference[:\s]+(\w+)");
    }
}
