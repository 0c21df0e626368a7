//! Type definitions for mock rules.
//!
//! `MockRule` is what the store hands out, `RuleDraft` is what callers hand
//! in, and `RuleRecord` is the flat, decoded shape used on the wire and in
//! export snapshots.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_STATUS_CODE: u16 = 200;
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by rule store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a rule for {method} {path} already exists")]
    Conflict { path: String, method: String },
    #[error("rule {0} not found")]
    NotFound(i64),
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error("rule store backend error: {0}")]
    Backend(String),
}

/// A persisted header mapping that is not a flat string-to-string object
#[derive(Debug, Error)]
#[error("malformed header mapping: {0}")]
pub struct MalformedDataError(String);

// ============================================================================
// Header mapping
// ============================================================================

/// Ordered header name to value mapping attached to a rule.
///
/// Entries keep the order they were first inserted in. Inserting a name that
/// is already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleHeaders(Vec<(String, String)>);

impl RuleHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Decode the persisted JSON text of a header mapping.
    ///
    /// Blank text decodes to an empty mapping.
    pub fn parse(raw: &str) -> Result<Self, MalformedDataError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| MalformedDataError(e.to_string()))
    }

    /// Encode the mapping as the JSON text stored alongside a rule
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuleHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = RuleHeaders::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl Serialize for RuleHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = RuleHeaders;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut headers = RuleHeaders::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.insert(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A stored mock rule.
///
/// `headers_json` is kept as persisted so that a corrupt mapping only affects
/// the header overlay and not the rest of the rule; see [`MockRule::headers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRule {
    pub id: i64,
    pub path: String,
    pub method: String,
    pub scheme: String,
    pub status_code: u16,
    pub content_type: String,
    pub headers_json: String,
    pub body: String,
    pub enabled: bool,
    pub delay_ms: u64,
}

impl MockRule {
    pub fn from_draft(id: i64, draft: RuleDraft) -> Self {
        Self {
            id,
            headers_json: draft.headers.to_json(),
            path: draft.path,
            method: draft.method,
            scheme: draft.scheme,
            status_code: draft.status_code,
            content_type: draft.content_type,
            body: draft.body,
            enabled: draft.enabled,
            delay_ms: draft.delay_ms,
        }
    }

    /// Decode the custom header overlay
    pub fn headers(&self) -> Result<RuleHeaders, MalformedDataError> {
        RuleHeaders::parse(&self.headers_json)
    }
}

/// Lookup key for an inbound request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub path: String,
    pub method: String,
    pub scheme: String,
}

impl RuleKey {
    pub fn new(path: impl Into<String>, method: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            scheme: scheme.into(),
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}://{}", self.method, self.scheme, self.path)
    }
}

/// Everything about a rule except its id; the input to insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDraft {
    pub path: String,
    pub method: String,
    pub scheme: String,
    pub status_code: u16,
    pub content_type: String,
    pub headers: RuleHeaders,
    pub body: String,
    pub enabled: bool,
    pub delay_ms: u64,
}

impl Default for RuleDraft {
    fn default() -> Self {
        Self {
            path: String::new(),
            method: DEFAULT_METHOD.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            status_code: DEFAULT_STATUS_CODE,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            headers: RuleHeaders::new(),
            body: String::new(),
            enabled: true,
            delay_ms: 0,
        }
    }
}

impl RuleDraft {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    /// Canonicalize the draft and reject values no request could ever match.
    pub fn normalize(mut self) -> Result<Self, StoreError> {
        let path = self.path.trim();
        if path.is_empty() {
            return Err(StoreError::InvalidRule("path must not be empty".into()));
        }
        // Decoded the same way inbound request paths are
        let path = urlencoding::decode(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };

        self.method = self.method.trim().to_ascii_uppercase();
        if self.method.is_empty() {
            self.method = DEFAULT_METHOD.to_string();
        }
        if hyper::Method::from_bytes(self.method.as_bytes()).is_err() {
            return Err(StoreError::InvalidRule(format!(
                "'{}' is not a valid HTTP method",
                self.method
            )));
        }

        self.scheme = self.scheme.trim().to_ascii_lowercase();
        if self.scheme.is_empty() {
            self.scheme = DEFAULT_SCHEME.to_string();
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(StoreError::InvalidRule(format!(
                "scheme must be http or https, got '{}'",
                self.scheme
            )));
        }

        if !(100..=999).contains(&self.status_code) {
            return Err(StoreError::InvalidRule(format!(
                "status code {} is out of range",
                self.status_code
            )));
        }

        let content_type = self.content_type.trim();
        self.content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type.to_string()
        };

        Ok(self)
    }
}

impl From<&MockRule> for RuleDraft {
    fn from(rule: &MockRule) -> Self {
        Self {
            path: rule.path.clone(),
            method: rule.method.clone(),
            scheme: rule.scheme.clone(),
            status_code: rule.status_code,
            content_type: rule.content_type.clone(),
            headers: rule.headers().unwrap_or_default(),
            body: rule.body.clone(),
            enabled: rule.enabled,
            delay_ms: rule.delay_ms,
        }
    }
}

/// Flat, decoded view of a rule as shown by the admin API and written to
/// export snapshots. A malformed header mapping is rendered as `{}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(default)]
    pub id: i64,
    pub path: String,
    pub method: String,
    pub scheme: String,
    pub status_code: u16,
    pub content_type: String,
    pub headers: RuleHeaders,
    pub body: String,
    pub enabled: bool,
    pub delay_ms: u64,
}

impl From<&MockRule> for RuleRecord {
    fn from(rule: &MockRule) -> Self {
        let draft = RuleDraft::from(rule);
        Self {
            id: rule.id,
            path: draft.path,
            method: draft.method,
            scheme: draft.scheme,
            status_code: draft.status_code,
            content_type: draft.content_type,
            headers: draft.headers,
            body: draft.body,
            enabled: draft.enabled,
            delay_ms: draft.delay_ms,
        }
    }
}

impl From<RuleRecord> for RuleDraft {
    fn from(record: RuleRecord) -> Self {
        Self {
            path: record.path,
            method: record.method,
            scheme: record.scheme,
            status_code: record.status_code,
            content_type: record.content_type,
            headers: record.headers,
            body: record.body,
            enabled: record.enabled,
            delay_ms: record.delay_ms,
        }
    }
}
