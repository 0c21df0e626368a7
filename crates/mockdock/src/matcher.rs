//! Rule matching and miss diagnosis.
//!
//! A request either hits exactly one enabled rule or is classified with the
//! most actionable reason it did not: a wrong path beats a wrong method,
//! which beats a wrong scheme, which beats a disabled rule.

use crate::rules::{MockRule, RuleKey, RuleStore};
use std::fmt;
use tracing::warn;

/// Why a request matched no enabled rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissReason {
    PathNotConfigured,
    MethodNotConfigured,
    SchemeMismatch,
    RuleDisabled,
    /// Unreachable while the store invariants hold; also used when the
    /// store could not be read
    OtherUnmatched,
}

impl MissReason {
    pub fn code(&self) -> &'static str {
        match self {
            MissReason::PathNotConfigured => "PATH_NOT_CONFIGURED",
            MissReason::MethodNotConfigured => "METHOD_NOT_CONFIGURED",
            MissReason::SchemeMismatch => "SCHEME_MISMATCH",
            MissReason::RuleDisabled => "RULE_DISABLED",
            MissReason::OtherUnmatched => "OTHER_UNMATCHED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MissReason::PathNotConfigured => "no rule is configured for this path",
            MissReason::MethodNotConfigured => "the path has no rule for this method",
            MissReason::SchemeMismatch => "the rule for this method expects another scheme",
            MissReason::RuleDisabled => "the matching rule is disabled",
            MissReason::OtherUnmatched => "no rule matched",
        }
    }
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Hit(MockRule),
    Miss(MissReason),
}

impl MatchOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, MatchOutcome::Hit(_))
    }

    pub fn miss_reason(&self) -> Option<MissReason> {
        match self {
            MatchOutcome::Hit(_) => None,
            MatchOutcome::Miss(reason) => Some(*reason),
        }
    }
}

/// Classify a miss from every rule registered for the request path
pub fn diagnose(rows: &[MockRule], method: &str, scheme: &str) -> MissReason {
    if rows.is_empty() {
        return MissReason::PathNotConfigured;
    }

    let same_method: Vec<&MockRule> = rows.iter().filter(|r| r.method == method).collect();
    if same_method.is_empty() {
        return MissReason::MethodNotConfigured;
    }

    let same_scheme: Vec<&MockRule> = same_method
        .into_iter()
        .filter(|r| r.scheme == scheme)
        .collect();
    if same_scheme.is_empty() {
        return MissReason::SchemeMismatch;
    }

    if !same_scheme.iter().any(|r| r.enabled) {
        return MissReason::RuleDisabled;
    }

    MissReason::OtherUnmatched
}

/// Resolve a request key against the store.
///
/// Store failures never escape: they are logged and reported as a miss.
pub fn match_request(store: &dyn RuleStore, key: &RuleKey) -> MatchOutcome {
    match store.find_enabled_match(key) {
        Ok(Some(rule)) => return MatchOutcome::Hit(rule),
        Ok(None) => {}
        Err(e) => {
            warn!("Rule lookup failed for {}: {}", key, e);
            return MatchOutcome::Miss(MissReason::OtherUnmatched);
        }
    }

    match store.list_by_path(&key.path) {
        Ok(rows) => MatchOutcome::Miss(diagnose(&rows, &key.method, &key.scheme)),
        Err(e) => {
            warn!("Miss diagnosis failed for {}: {}", key, e);
            MatchOutcome::Miss(MissReason::OtherUnmatched)
        }
    }
}
