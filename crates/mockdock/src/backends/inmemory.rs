use crate::rules::{MockRule, RuleDraft, RuleKey, RuleStore, StoreError};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory implementation of RuleStore
///
/// Rules live in a `BTreeMap` keyed by id behind a single lock, so the
/// uniqueness check and the write happen under the same write guard. Ids are
/// never reused, matching the SQLite backend's AUTOINCREMENT behavior.
/// Useful for tests, demos, and throwaway instances.
pub struct InMemoryRuleStore {
    inner: RwLock<Inner>,
}

struct Inner {
    rules: BTreeMap<i64, MockRule>,
    next_id: i64,
}

impl Inner {
    fn conflicting(&self, draft: &RuleDraft, ignore_id: Option<i64>) -> bool {
        self.rules.values().any(|rule| {
            Some(rule.id) != ignore_id && rule.path == draft.path && rule.method == draft.method
        })
    }
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                rules: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict(draft: &RuleDraft) -> StoreError {
    StoreError::Conflict {
        path: draft.path.clone(),
        method: draft.method.clone(),
    }
}

impl RuleStore for InMemoryRuleStore {
    fn insert(&self, draft: RuleDraft) -> Result<i64, StoreError> {
        let draft = draft.normalize()?;
        let mut inner = self.inner.write();

        if inner.conflicting(&draft, None) {
            return Err(conflict(&draft));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.rules.insert(id, MockRule::from_draft(id, draft));
        Ok(id)
    }

    fn update(&self, id: i64, draft: RuleDraft) -> Result<(), StoreError> {
        let draft = draft.normalize()?;
        let mut inner = self.inner.write();

        if !inner.rules.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if inner.conflicting(&draft, Some(id)) {
            return Err(conflict(&draft));
        }

        inner.rules.insert(id, MockRule::from_draft(id, draft));
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .rules
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn get(&self, id: i64) -> Result<MockRule, StoreError> {
        self.inner
            .read()
            .rules
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn find_enabled_match(&self, key: &RuleKey) -> Result<Option<MockRule>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .rules
            .values()
            .find(|rule| {
                rule.enabled
                    && rule.path == key.path
                    && rule.method == key.method
                    && rule.scheme == key.scheme
            })
            .cloned())
    }

    fn list_all(&self) -> Result<Vec<MockRule>, StoreError> {
        let mut rules: Vec<MockRule> = self.inner.read().rules.values().cloned().collect();
        rules.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));
        Ok(rules)
    }

    fn list_by_path(&self, path: &str) -> Result<Vec<MockRule>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .rules
            .values()
            .filter(|rule| rule.path == path)
            .cloned()
            .collect())
    }
}
