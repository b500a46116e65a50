//! Site profiles and the pattern library that resolves a URL to one.
//!
//! The built-in library is embedded at compile time from `profiles.json` and
//! compiled once on first use. Callers may also load their own library with
//! [`PatternLibrary::from_json`]; it is immutable after construction and safe
//! to share across threads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use url::Url;

use crate::error::ProfileError;
use crate::rules::{ExtractionRule, RuleDef};
use crate::types::Field;

/// Embedded so the library ships without runtime file I/O.
const PROFILES_JSON: &str = include_str!("profiles.json");

// ── File format ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDef {
    #[serde(default)]
    pub profiles: Vec<ProfileDef>,
    pub fallback: ProfileDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDef {
    pub name: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub identifier_params: Vec<String>,
    #[serde(default)]
    pub requires_identifier: bool,
    #[serde(default)]
    pub fields: BTreeMap<Field, Vec<RuleDef>>,
    /// Account rules that do not name a side; routed by masking.
    #[serde(default)]
    pub accounts: Vec<RuleDef>,
    #[serde(default)]
    pub derived: Vec<DerivedDef>,
    /// Candidate JSON endpoints, relative to the URL origin; `{id}` is substituted.
    #[serde(default)]
    pub api_endpoints: Vec<String>,
    /// Also emit one record per data row of HTML tables.
    #[serde(default)]
    pub tables: bool,
}

/// A field computed from already-resolved fields by prefix lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedDef {
    pub field: Field,
    pub from: Vec<Field>,
    pub prefixes: Vec<PrefixRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub prefix: String,
    pub value: String,
}

// ── Compiled profiles ────────────────────────────────────────────────────────

/// A compiled site profile.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    name: String,
    hosts: Vec<String>,
    identifier_params: Vec<String>,
    requires_identifier: bool,
    fields: Vec<(Field, Vec<ExtractionRule>)>,
    accounts: Vec<ExtractionRule>,
    derived: Vec<DerivedDef>,
    api_endpoints: Vec<String>,
    tables: bool,
}

impl SiteProfile {
    pub fn compile(def: &ProfileDef) -> Result<Self, ProfileError> {
        let fields = def
            .fields
            .iter()
            .map(|(field, rules)| {
                let compiled = rules
                    .iter()
                    .map(|r| ExtractionRule::compile(r, &def.name, field.key()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((*field, compiled))
            })
            .collect::<Result<Vec<_>, ProfileError>>()?;

        let accounts = def
            .accounts
            .iter()
            .map(|r| ExtractionRule::compile(r, &def.name, "accounts"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: def.name.clone(),
            hosts: def.hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
            identifier_params: def.identifier_params.clone(),
            requires_identifier: def.requires_identifier,
            fields,
            accounts,
            derived: def.derived.clone(),
            api_endpoints: def.api_endpoints.clone(),
            tables: def.tables,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn identifier_params(&self) -> &[String] {
        &self.identifier_params
    }

    pub fn requires_identifier(&self) -> bool {
        self.requires_identifier
    }

    /// Per-field rule chains, in field order.
    pub fn fields(&self) -> &[(Field, Vec<ExtractionRule>)] {
        &self.fields
    }

    pub fn accounts(&self) -> &[ExtractionRule] {
        &self.accounts
    }

    pub fn derived(&self) -> &[DerivedDef] {
        &self.derived
    }

    pub fn api_endpoints(&self) -> &[String] {
        &self.api_endpoints
    }

    pub fn tables(&self) -> bool {
        self.tables
    }

    /// Total number of compiled rules, for `profiles` listings.
    pub fn rule_count(&self) -> usize {
        self.fields.iter().map(|(_, r)| r.len()).sum::<usize>() + self.accounts.len()
    }

    fn matches_host(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| host.contains(h.as_str()))
    }
}

/// Ordered set of site profiles plus the generic fallback.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    profiles: Vec<Arc<SiteProfile>>,
    fallback: Arc<SiteProfile>,
}

static BUILTIN: OnceLock<Result<PatternLibrary, ProfileError>> = OnceLock::new();

impl PatternLibrary {
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let def: LibraryDef = serde_json::from_str(json)?;
        Self::from_def(&def)
    }

    pub fn from_def(def: &LibraryDef) -> Result<Self, ProfileError> {
        let profiles = def
            .profiles
            .iter()
            .map(|p| SiteProfile::compile(p).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let fallback = Arc::new(SiteProfile::compile(&def.fallback)?);
        tracing::debug!(
            profiles = profiles.len(),
            fallback = %fallback.name(),
            "pattern library compiled"
        );
        Ok(Self { profiles, fallback })
    }

    /// The library shipped with the crate, compiled once per process.
    pub fn builtin() -> Result<&'static PatternLibrary, ProfileError> {
        BUILTIN
            .get_or_init(|| Self::from_json(PROFILES_JSON))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// First profile whose host pattern occurs in the URL's host, else the fallback.
    pub fn resolve(&self, url: &Url) -> Arc<SiteProfile> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.profiles
            .iter()
            .find(|p| p.matches_host(&host))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn profiles(&self) -> &[Arc<SiteProfile>] {
        &self.profiles
    }

    pub fn fallback(&self) -> &Arc<SiteProfile> {
        &self.fallback
    }

    pub fn get(&self, name: &str) -> Option<Arc<SiteProfile>> {
        self.profiles
            .iter()
            .chain(std::iter::once(&self.fallback))
            .find(|p| p.name() == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_library_compiles() {
        let lib = PatternLibrary::builtin().unwrap();
        assert_eq!(lib.profiles().len(), 2);
        assert_eq!(lib.fallback().name(), "generic");
        assert!(lib.profiles().iter().all(|p| p.rule_count() > 0));
    }

    #[test]
    fn test_resolve_by_host() {
        let lib = PatternLibrary::builtin().unwrap();
        let boa = Url::parse("https://cs.bankofabyssinia.com/slip/?trx=FT2518").unwrap();
        assert_eq!(lib.resolve(&boa).name(), "boa");
        let cbe = Url::parse("https://apps.cbe.com.et:100/?id=FT25185N7TLH").unwrap();
        assert_eq!(lib.resolve(&cbe).name(), "cbe");
        let other = Url::parse("https://shop.example.com/p/1").unwrap();
        assert_eq!(lib.resolve(&other).name(), "generic");
    }

    #[test]
    fn test_invalid_library_is_rejected() {
        let bad = r#"{"fallback":{"name":"g","fields":{"amount":[{"pattern":"(","validate":"decimal"}]}}}"#;
        assert!(matches!(
            PatternLibrary::from_json(bad),
            Err(ProfileError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PatternLibrary::from_json("{}"),
            Err(ProfileError::Parse(_))
        ));
    }

    #[test]
    fn test_get_by_name() {
        let lib = PatternLibrary::builtin().unwrap();
        assert!(lib.get("cbe").is_some());
        assert!(lib.get("generic").is_some());
        assert!(lib.get("nope").is_none());
    }
}
