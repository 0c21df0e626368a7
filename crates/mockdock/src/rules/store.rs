use super::types::{MockRule, RuleDraft, RuleKey, StoreError};
use crate::export::SnapshotSink;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Backend-agnostic rule storage.
///
/// The trait is synchronous; async callers on the dispatch path move lookups
/// onto the blocking pool. Implementations must make each mutation atomic
/// with respect to the `(path, method)` uniqueness check and must normalize
/// drafts before storing them.
pub trait RuleStore: Send + Sync {
    /// Store a new rule and return its id
    fn insert(&self, draft: RuleDraft) -> Result<i64, StoreError>;

    /// Replace every field of an existing rule except its id
    fn update(&self, id: i64, draft: RuleDraft) -> Result<(), StoreError>;

    /// Remove a rule. Returns `NotFound` when nothing was removed.
    fn delete(&self, id: i64) -> Result<(), StoreError>;

    fn get(&self, id: i64) -> Result<MockRule, StoreError>;

    /// Exact match on path, method and scheme among enabled rules
    fn find_enabled_match(&self, key: &RuleKey) -> Result<Option<MockRule>, StoreError>;

    /// All rules ordered by `(path, method)`
    fn list_all(&self) -> Result<Vec<MockRule>, StoreError>;

    /// All rules registered for a path, enabled or not
    fn list_by_path(&self, path: &str) -> Result<Vec<MockRule>, StoreError>;
}

/// Decorator that publishes a snapshot of the full rule set after every
/// successful mutation of the wrapped store.
///
/// Mutate, list and publish run under one lock, so snapshots reach the sink
/// in commit order and the last one always holds every committed rule.
pub struct ExportingStore {
    inner: Arc<dyn RuleStore>,
    sink: Arc<dyn SnapshotSink>,
    mutation: Mutex<()>,
}

impl ExportingStore {
    pub fn new(inner: Arc<dyn RuleStore>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            inner,
            sink,
            mutation: Mutex::new(()),
        }
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&dyn RuleStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.mutation.lock();
        let result = op(self.inner.as_ref())?;
        match self.inner.list_all() {
            Ok(rules) => self.sink.publish(rules),
            Err(e) => warn!("Skipping snapshot export, could not list rules: {}", e),
        }
        Ok(result)
    }
}

impl RuleStore for ExportingStore {
    fn insert(&self, draft: RuleDraft) -> Result<i64, StoreError> {
        self.mutate(|store| store.insert(draft))
    }

    fn update(&self, id: i64, draft: RuleDraft) -> Result<(), StoreError> {
        self.mutate(|store| store.update(id, draft))
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.mutate(|store| store.delete(id))
    }

    fn get(&self, id: i64) -> Result<MockRule, StoreError> {
        self.inner.get(id)
    }

    fn find_enabled_match(&self, key: &RuleKey) -> Result<Option<MockRule>, StoreError> {
        self.inner.find_enabled_match(key)
    }

    fn list_all(&self) -> Result<Vec<MockRule>, StoreError> {
        self.inner.list_all()
    }

    fn list_by_path(&self, path: &str) -> Result<Vec<MockRule>, StoreError> {
        self.inner.list_by_path(path)
    }
}
