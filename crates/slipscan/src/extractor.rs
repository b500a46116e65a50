//! Pattern extraction: turns acquired markup into records via a site profile.
//!
//! Every field's rule chain is evaluated in isolation, first validated match
//! wins. Side-unspecified account rules are routed by masking: masked values
//! go to the receiver, long unmasked numbers to the sender. Derived fields
//! only run once at least one primary field matched, so a page with nothing
//! recognisable yields an empty record rather than a half-invented one.
//!
//! Everything here is synchronous and I/O free; `scraper` documents are
//! `!Send`, so async callers run it under `spawn_blocking`.

use std::collections::BTreeMap;

use crate::profiles::SiteProfile;
use crate::rules::{Candidate, ExtractionRule, MatchInput, Validator};
use crate::tables;
use crate::types::{ExtractionRecord, Field};

/// Request-level facts the markup itself does not carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionContext<'a> {
    pub url: &'a str,
    /// Transaction identifier parsed from the URL.
    pub identifier: Option<&'a str>,
}

/// Full result of one extraction: the page record, table rows and notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub record: ExtractionRecord,
    pub table_rows: Vec<ExtractionRecord>,
    /// Human-readable diagnostics (ambiguities, reassignments).
    pub notes: Vec<String>,
}

impl Extraction {
    /// Page record first (even when empty), then table rows.
    pub fn into_records(self) -> Vec<ExtractionRecord> {
        std::iter::once(self.record).chain(self.table_rows).collect()
    }
}

/// Extract the page record from `markup`. Deterministic for a given input.
pub fn extract(markup: &str, profile: &SiteProfile, context: &ExtractionContext<'_>) -> ExtractionRecord {
    extract_all(markup, profile, context).record
}

/// Extract the page record plus table rows, with diagnostics.
pub fn extract_all(
    markup: &str,
    profile: &SiteProfile,
    context: &ExtractionContext<'_>,
) -> Extraction {
    let input = MatchInput::new(markup);
    let mut notes = Vec::new();

    let mut resolved: BTreeMap<Field, Candidate> = BTreeMap::new();
    for (field, chain) in profile.fields() {
        if let Some((index, candidate)) = resolve_chain(chain, &input) {
            tracing::trace!(
                profile = profile.name(),
                field = %field,
                rule = index,
                source = chain[index].source(),
                "field resolved"
            );
            resolved.insert(*field, candidate);
        }
    }

    route_accounts(profile.accounts(), &input, &mut resolved, &mut notes);

    let mut record: ExtractionRecord = resolved
        .iter()
        .map(|(field, c)| (*field, c.value.clone()))
        .collect();

    // A companion never overrides a value its own field's chain produced.
    for candidate in resolved.values() {
        for (field, value) in &candidate.companions {
            if !record.contains(*field) {
                record.insert(*field, value.clone());
            }
        }
    }

    if !record.is_empty() {
        if let Some(id) = context.identifier {
            if !record.contains(Field::TransactionId) {
                record.insert(Field::TransactionId, id);
            }
        }
        apply_derived(profile, &mut record);
    }

    let table_rows = if profile.tables() {
        tables::extract_tables(input.document())
    } else {
        Vec::new()
    };

    tracing::debug!(
        profile = profile.name(),
        url = context.url,
        fields = record.len(),
        table_rows = table_rows.len(),
        "extraction finished"
    );

    Extraction {
        record,
        table_rows,
        notes,
    }
}

fn resolve_chain(chain: &[ExtractionRule], input: &MatchInput<'_>) -> Option<(usize, Candidate)> {
    chain
        .iter()
        .enumerate()
        .find_map(|(i, rule)| rule.first_candidate(input).map(|c| (i, c)))
}

fn is_masked(value: &str) -> bool {
    value.contains('*')
}

/// Route side-unspecified account candidates and enforce that a masked value
/// never sits in the sender slot while the receiver slot is empty.
fn route_accounts(
    rules: &[ExtractionRule],
    input: &MatchInput<'_>,
    resolved: &mut BTreeMap<Field, Candidate>,
    notes: &mut Vec<String>,
) {
    // Values a side-specific chain already claimed never fill the other side.
    let claimed: Vec<String> = [Field::SenderAccount, Field::ReceiverAccount]
        .iter()
        .filter_map(|f| resolved.get(f))
        .map(|c| c.value.clone())
        .collect();

    // The first rule that yields an unclaimed value supplies the candidate pool.
    let pool = rules
        .iter()
        .map(|rule| {
            rule.candidates(input)
                .into_iter()
                .filter(|c| !claimed.contains(&c.value))
                .collect::<Vec<_>>()
        })
        .find(|c| !c.is_empty())
        .unwrap_or_default();

    let mut masked: Vec<Candidate> = Vec::new();
    let mut unmasked: Vec<Candidate> = Vec::new();
    for candidate in pool {
        let bucket = if is_masked(&candidate.value) {
            &mut masked
        } else {
            &mut unmasked
        };
        if !bucket.iter().any(|c| c.value == candidate.value) {
            bucket.push(candidate);
        }
    }

    for (field, candidates) in [
        (Field::ReceiverAccount, masked),
        (Field::SenderAccount, unmasked),
    ] {
        if resolved.contains_key(&field) || candidates.is_empty() {
            continue;
        }
        if candidates.len() > 1 {
            notes.push(format!(
                "{} left unresolved: {} distinct account candidates",
                field,
                candidates.len()
            ));
            continue;
        }
        if let Some(candidate) = candidates.into_iter().next() {
            resolved.insert(field, candidate);
        }
    }

    let sender_masked = resolved
        .get(&Field::SenderAccount)
        .is_some_and(|c| is_masked(&c.value));
    if sender_masked && !resolved.contains_key(&Field::ReceiverAccount) {
        if let Some(candidate) = resolved.remove(&Field::SenderAccount) {
            notes.push("masked sender account moved to receiver".to_string());
            resolved.insert(Field::ReceiverAccount, candidate);
        }
    }
}

fn apply_derived(profile: &SiteProfile, record: &mut ExtractionRecord) {
    for derived in profile.derived() {
        if record.contains(derived.field) {
            continue;
        }
        let value = derived
            .from
            .iter()
            .filter_map(|f| record.get(*f))
            .find_map(|source| {
                let upper = source.to_ascii_uppercase();
                derived
                    .prefixes
                    .iter()
                    .find(|p| upper.starts_with(&p.prefix.to_ascii_uppercase()))
                    .map(|p| p.value.clone())
            });
        if let Some(value) = value {
            record.insert(derived.field, value);
        }
    }
}

/// Validate a value for `field` as the generic rules would. Used when
/// mapping JSON API payloads onto records.
pub fn clean_for_field(field: Field, raw: &str) -> Option<String> {
    let validator = match field {
        Field::Amount => Validator::Decimal,
        Field::Price => Validator::Price,
        Field::Rating => Validator::Rating,
        Field::Status => Validator::Status,
        Field::Availability => Validator::Availability,
        Field::Currency => Validator::Currency,
        Field::SenderAccount | Field::ReceiverAccount => Validator::Account { min_digits: 4 },
        Field::SenderName | Field::ReceiverName => Validator::Name {
            min_len: 2,
            uppercase: false,
        },
        _ => Validator::Text { max_len: 500 },
    };
    validator.clean(raw)
}
