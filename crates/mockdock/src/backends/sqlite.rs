use crate::rules::{MockRule, RuleDraft, RuleKey, RuleStore, StoreError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS mocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    method TEXT NOT NULL,
    scheme TEXT NOT NULL DEFAULT 'http',
    status_code INTEGER NOT NULL DEFAULT 200,
    content_type TEXT NOT NULL DEFAULT 'application/json',
    headers_json TEXT NOT NULL DEFAULT '{}',
    body TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    delay_ms INTEGER NOT NULL DEFAULT 0,
    UNIQUE(path, method)
);
";

/// Columns that may be missing from stores created by older releases,
/// with the definition used to add them in place.
const MIGRATED_COLUMNS: &[(&str, &str)] = &[
    ("scheme", "TEXT NOT NULL DEFAULT 'http'"),
    ("status_code", "INTEGER NOT NULL DEFAULT 200"),
    ("content_type", "TEXT NOT NULL DEFAULT 'application/json'"),
    ("headers_json", "TEXT NOT NULL DEFAULT '{}'"),
    ("body", "TEXT NOT NULL DEFAULT ''"),
    ("enabled", "INTEGER NOT NULL DEFAULT 1"),
    ("delay_ms", "INTEGER NOT NULL DEFAULT 0"),
];

const SELECT_RULE: &str = "SELECT id, path, method, scheme, status_code, content_type, \
                           headers_json, body, enabled, delay_ms FROM mocks";

/// SQLite-backed RuleStore
///
/// One connection guarded by a mutex. Every operation, including the
/// existence check that precedes an update, runs under that lock, so the
/// `UNIQUE(path, method)` constraint can never be raced into a torn state.
pub struct SqliteRuleStore {
    conn: Mutex<Connection>,
}

impl SqliteRuleStore {
    /// Open (or create) a store at the given path and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(backend)?;
        info!("Opened rule store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory().map_err(backend)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Create the table if needed, then add any columns an older store lacks
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_TABLE)?;

    let existing: HashSet<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info(mocks)")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        names.collect::<rusqlite::Result<_>>()?
    };

    for (column, definition) in MIGRATED_COLUMNS {
        if !existing.contains(*column) {
            conn.execute_batch(&format!(
                "ALTER TABLE mocks ADD COLUMN {column} {definition}"
            ))?;
            info!("Added missing column '{}' to rule store", column);
        }
    }
    Ok(())
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn write_error(e: rusqlite::Error, draft: &RuleDraft) -> StoreError {
    if is_unique_violation(&e) {
        StoreError::Conflict {
            path: draft.path.clone(),
            method: draft.method.clone(),
        }
    } else {
        backend(e)
    }
}

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<MockRule> {
    let status_code: i64 = row.get(4)?;
    let enabled: i64 = row.get(8)?;
    let delay_ms: i64 = row.get(9)?;
    Ok(MockRule {
        id: row.get(0)?,
        path: row.get(1)?,
        method: row.get(2)?,
        scheme: row.get(3)?,
        // Out-of-range values are left for the response side to reject
        status_code: u16::try_from(status_code).unwrap_or(0),
        content_type: row.get(5)?,
        headers_json: row.get(6)?,
        body: row.get(7)?,
        enabled: enabled != 0,
        delay_ms: u64::try_from(delay_ms).unwrap_or(0),
    })
}

fn delay_param(delay_ms: u64) -> i64 {
    i64::try_from(delay_ms).unwrap_or(i64::MAX)
}

impl RuleStore for SqliteRuleStore {
    fn insert(&self, draft: RuleDraft) -> Result<i64, StoreError> {
        let draft = draft.normalize()?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO mocks (path, method, scheme, status_code, content_type, headers_json, \
             body, enabled, delay_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                draft.path,
                draft.method,
                draft.scheme,
                i64::from(draft.status_code),
                draft.content_type,
                draft.headers.to_json(),
                draft.body,
                draft.enabled,
                delay_param(draft.delay_ms),
            ],
        )
        .map_err(|e| write_error(e, &draft))?;

        let id = conn.last_insert_rowid();
        debug!("Inserted rule {} for {} {}", id, draft.method, draft.path);
        Ok(id)
    }

    fn update(&self, id: i64, draft: RuleDraft) -> Result<(), StoreError> {
        let draft = draft.normalize()?;
        let conn = self.conn.lock();

        let exists = conn
            .query_row("SELECT 1 FROM mocks WHERE id = ?1", [id], |_| Ok(()))
            .optional()
            .map_err(backend)?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(id));
        }

        conn.execute(
            "UPDATE mocks SET path = ?1, method = ?2, scheme = ?3, status_code = ?4, \
             content_type = ?5, headers_json = ?6, body = ?7, enabled = ?8, delay_ms = ?9 \
             WHERE id = ?10",
            params![
                draft.path,
                draft.method,
                draft.scheme,
                i64::from(draft.status_code),
                draft.content_type,
                draft.headers.to_json(),
                draft.body,
                draft.enabled,
                delay_param(draft.delay_ms),
                id,
            ],
        )
        .map_err(|e| write_error(e, &draft))?;
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM mocks WHERE id = ?1", [id])
            .map_err(backend)?;
        if removed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn get(&self, id: i64) -> Result<MockRule, StoreError> {
        self.conn
            .lock()
            .query_row(&format!("{SELECT_RULE} WHERE id = ?1"), [id], row_to_rule)
            .optional()
            .map_err(backend)?
            .ok_or(StoreError::NotFound(id))
    }

    fn find_enabled_match(&self, key: &RuleKey) -> Result<Option<MockRule>, StoreError> {
        self.conn
            .lock()
            .query_row(
                &format!(
                    "{SELECT_RULE} WHERE path = ?1 AND method = ?2 AND scheme = ?3 AND enabled = 1"
                ),
                params![key.path, key.method, key.scheme],
                row_to_rule,
            )
            .optional()
            .map_err(backend)
    }

    fn list_all(&self) -> Result<Vec<MockRule>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("{SELECT_RULE} ORDER BY path, method"))
            .map_err(backend)?;
        let rules = stmt
            .query_map([], row_to_rule)
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;
        Ok(rules)
    }

    fn list_by_path(&self, path: &str) -> Result<Vec<MockRule>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("{SELECT_RULE} WHERE path = ?1 ORDER BY method"))
            .map_err(backend)?;
        let rules = stmt
            .query_map([path], row_to_rule)
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;
        Ok(rules)
    }
}
