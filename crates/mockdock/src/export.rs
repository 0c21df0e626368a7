//! Snapshot export of the rule set.
//!
//! After every successful mutation the full rule set is written to a JSON
//! file (`{"mocks": [...]}`) for inspection and backup. Exports are
//! fire-and-forget: failures are logged and counted, never returned to the
//! caller that triggered them.

use crate::metrics;
use crate::rules::{MockRule, RuleDraft, RuleRecord, RuleStore, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiver of rule set snapshots. Must neither block nor fail.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, rules: Vec<MockRule>);
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk snapshot document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub mocks: Vec<RuleRecord>,
}

impl Snapshot {
    pub fn from_rules(rules: &[MockRule]) -> Self {
        Self {
            mocks: rules.iter().map(RuleRecord::from).collect(),
        }
    }
}

/// Write a snapshot next to `path` and atomically move it into place
pub fn write_snapshot(path: &Path, rules: &[MockRule]) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(&Snapshot::from_rules(rules))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Read a snapshot file back into drafts, dropping the exported ids
pub fn read_snapshot(path: &Path) -> Result<Vec<RuleDraft>, ExportError> {
    let contents = fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: Snapshot = serde_json::from_str(&contents)?;
    Ok(snapshot.mocks.into_iter().map(RuleDraft::from).collect())
}

/// Insert drafts into a store, skipping any that are rejected.
///
/// Returns the number of rules imported.
pub fn import(store: &dyn RuleStore, drafts: Vec<RuleDraft>) -> usize {
    let mut imported = 0;
    for draft in drafts {
        let label = format!("{} {}", draft.method, draft.path);
        match store.insert(draft) {
            Ok(_) => imported += 1,
            Err(e @ StoreError::Conflict { .. }) => {
                info!("Skipping imported rule {}: {}", label, e)
            }
            Err(e) => warn!("Failed to import rule {}: {}", label, e),
        }
    }
    imported
}

/// Snapshot sink that writes JSON files from a single background task.
///
/// Snapshots are queued on an unbounded channel and written in the order
/// they were published. The writer task ends once every `JsonFileExport`
/// handle has been dropped and the queue is drained.
pub struct JsonFileExport {
    tx: mpsc::UnboundedSender<Vec<MockRule>>,
}

impl JsonFileExport {
    /// Start the writer task. Must be called from within a Tokio runtime.
    pub fn spawn(path: PathBuf) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<MockRule>>();

        let handle = tokio::spawn(async move {
            while let Some(rules) = rx.recv().await {
                let target = path.clone();
                let count = rules.len();
                let result =
                    tokio::task::spawn_blocking(move || write_snapshot(&target, &rules)).await;

                match result {
                    Ok(Ok(())) => {
                        metrics::record_export("ok");
                        debug!("Exported {} rules to {}", count, path.display());
                    }
                    Ok(Err(e)) => {
                        metrics::record_export("error");
                        warn!("Snapshot export failed: {}", e);
                    }
                    Err(e) => {
                        metrics::record_export("error");
                        warn!("Snapshot export task failed: {}", e);
                    }
                }
            }
        });

        (Self { tx }, handle)
    }
}

impl SnapshotSink for JsonFileExport {
    fn publish(&self, rules: Vec<MockRule>) {
        if self.tx.send(rules).is_err() {
            warn!("Snapshot writer has stopped, dropping export");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryRuleStore;
    use crate::rules::{ExportingStore, RuleHeaders};
    use std::sync::Arc;

    fn sample_drafts() -> Vec<RuleDraft> {
        vec![
            RuleDraft {
                status_code: 201,
                headers: [("X-A", "1")].into_iter().collect(),
                body: r#"{"ok":true}"#.into(),
                ..RuleDraft::new("/foo", "GET")
            },
            RuleDraft {
                scheme: "https".into(),
                content_type: "text/xml".into(),
                body: "<a/>".into(),
                enabled: false,
                delay_ms: 150,
                ..RuleDraft::new("/bar", "POST")
            },
        ]
    }

    #[test]
    fn test_snapshot_document_shape() {
        let rule = MockRule::from_draft(3, sample_drafts().remove(0));
        let value = serde_json::to_value(Snapshot::from_rules(&[rule])).unwrap();

        let entry = &value["mocks"][0];
        assert_eq!(entry["id"], 3);
        assert_eq!(entry["path"], "/foo");
        assert_eq!(entry["status_code"], 201);
        assert_eq!(entry["headers"], serde_json::json!({"X-A": "1"}));
        assert_eq!(entry["enabled"], true);
        assert_eq!(entry["delay_ms"], 0);
    }

    #[test]
    fn test_export_then_reload_reproduces_rules() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mocks.json");

        let source = InMemoryRuleStore::new();
        for draft in sample_drafts() {
            source.insert(draft).unwrap();
        }
        let original = source.list_all().unwrap();
        write_snapshot(&file, &original).unwrap();

        let target = InMemoryRuleStore::new();
        assert_eq!(import(&target, read_snapshot(&file).unwrap()), 2);

        let reloaded = target.list_all().unwrap();
        let before: Vec<RuleDraft> = original.iter().map(RuleDraft::from).collect();
        let after: Vec<RuleDraft> = reloaded.iter().map(RuleDraft::from).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_import_skips_conflicts() {
        let store = InMemoryRuleStore::new();
        store.insert(RuleDraft::new("/foo", "GET")).unwrap();
        assert_eq!(import(&store, sample_drafts()), 1);
        assert_eq!(store.list_all().unwrap().len(), 2);
    }

    #[test]
    fn test_write_to_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing").join("mocks.json");
        assert!(matches!(
            write_snapshot(&file, &[]),
            Err(ExportError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_json_file_export_writes_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mocks.json");

        let (export, writer) = JsonFileExport::spawn(file.clone());
        let store = ExportingStore::new(Arc::new(InMemoryRuleStore::new()), Arc::new(export));

        let id = store.insert(RuleDraft::new("/a", "GET")).unwrap();
        store.insert(RuleDraft::new("/b", "GET")).unwrap();
        store.delete(id).unwrap();

        // Dropping the only sender lets the writer drain and exit
        drop(store);
        writer.await.unwrap();

        let snapshot: Snapshot =
            serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(snapshot.mocks.len(), 1);
        assert_eq!(snapshot.mocks[0].path, "/b");
        assert_eq!(snapshot.mocks[0].headers, RuleHeaders::new());
    }

    #[tokio::test]
    async fn test_export_failure_does_not_fail_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing").join("mocks.json");

        let (export, writer) = JsonFileExport::spawn(file.clone());
        let store = ExportingStore::new(Arc::new(InMemoryRuleStore::new()), Arc::new(export));

        assert!(store.insert(RuleDraft::new("/a", "GET")).is_ok());
        drop(store);
        writer.await.unwrap();
        assert!(!file.exists());
    }
}
