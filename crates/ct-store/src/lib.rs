//! ct-store: Case persistence for casetrack
//!
//! Cases, their message histories and optional metadata live in three flat
//! SQLite tables. Every operation goes through an explicit [`CaseStore`]
//! handle.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use ct_core::{CaseMeta, Error, Turn, TurnRole};

/// Default number of turns loaded for a case.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cases (
        id TEXT PRIMARY KEY,
        created_at REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        case_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at REAL NOT NULL,
        FOREIGN KEY(case_id) REFERENCES cases(id)
    );
    CREATE TABLE IF NOT EXISTS case_meta (
        case_id TEXT PRIMARY KEY,
        meta_json TEXT NOT NULL,
        FOREIGN KEY(case_id) REFERENCES cases(id)
    );
";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseRecord {
    pub id: String,
    /// Seconds since the Unix epoch.
    pub created_at: f64,
}

/// SQLite-backed case store.
#[derive(Clone)]
pub struct CaseStore {
    conn: Arc<Mutex<Connection>>,
}

impl CaseStore {
    /// Open (or create) the database at `path`, creating parent directories
    /// and the schema as needed.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = db_path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::storage(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(&path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;
        tracing::debug!(path = %path.display(), "Opened case database");

        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(|e| {
            Error::storage(format!("Failed to create in-memory database: {}", e))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::storage(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::storage("Database connection lock poisoned"))
    }

    pub fn get_or_create_case(&self, case_id: &str) -> Result<CaseRecord, Error> {
        let conn = self.conn()?;

        let existing = conn
            .query_row(
                "SELECT id, created_at FROM cases WHERE id = ?",
                params![case_id],
                |row| {
                    Ok(CaseRecord {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::storage(e.to_string()))?;

        if let Some(record) = existing {
            return Ok(record);
        }

        let created_at = now();
        conn.execute(
            "INSERT INTO cases (id, created_at) VALUES (?, ?)",
            params![case_id, created_at],
        )
        .map_err(|e| Error::storage(format!("Failed to create case: {}", e)))?;
        tracing::info!(case_id, "Created case");

        Ok(CaseRecord {
            id: case_id.to_string(),
            created_at,
        })
    }

    pub fn case_exists(&self, case_id: &str) -> Result<bool, Error> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT 1 FROM cases WHERE id = ?",
            params![case_id],
            |_| Ok(()),
        )
        .optional()
        .map(|row| row.is_some())
        .map_err(|e| Error::storage(e.to_string()))
    }

    /// Most recently created cases first.
    pub fn list_cases(&self, limit: usize) -> Result<Vec<CaseRecord>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, created_at FROM cases ORDER BY created_at DESC LIMIT ?")
            .map_err(|e| Error::storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(CaseRecord {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                })
            })
            .map_err(|e| Error::storage(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::storage(e.to_string()))
    }

    /// Append a turn to a case's history and return it as recorded.
    pub fn save_message(&self, case_id: &str, role: TurnRole, content: &str) -> Result<Turn, Error> {
        let created_at = now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (case_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            params![case_id, role.as_str(), content, created_at],
        )
        .map_err(|e| Error::storage(format!("Failed to save message: {}", e)))?;

        Ok(Turn::new(role, content, created_at))
    }

    /// The most recent `limit` turns of a case, returned oldest first.
    pub fn history(&self, case_id: &str, limit: usize) -> Result<Vec<Turn>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT role, content, created_at FROM messages
                 WHERE case_id = ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?",
            )
            .map_err(|e| Error::storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![case_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })
            .map_err(|e| Error::storage(e.to_string()))?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content, created_at) = row.map_err(|e| Error::storage(e.to_string()))?;
            match role.parse::<TurnRole>() {
                Ok(role) => turns.push(Turn::new(role, content, created_at)),
                Err(_) => tracing::warn!(case_id, role = %role, "Skipping message with unknown role"),
            }
        }
        turns.reverse();
        Ok(turns)
    }

    pub fn set_case_meta(&self, case_id: &str, meta: &CaseMeta) -> Result<(), Error> {
        let payload = serde_json::to_string(meta)?;
        let conn = self.conn()?;
        conn.execute(
            "REPLACE INTO case_meta (case_id, meta_json) VALUES (?, ?)",
            params![case_id, payload],
        )
        .map_err(|e| Error::storage(format!("Failed to save case metadata: {}", e)))?;

        Ok(())
    }

    /// Stored metadata for a case. Unreadable JSON is treated as absent.
    pub fn case_meta(&self, case_id: &str) -> Result<Option<CaseMeta>, Error> {
        let conn = self.conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT meta_json FROM case_meta WHERE case_id = ?",
                params![case_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::storage(e.to_string()))?;

        Ok(payload.and_then(|json| match serde_json::from_str(&json) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(case_id, error = %e, "Ignoring unreadable case metadata");
                None
            }
        }))
    }

    #[cfg(test)]
    fn raw_execute(&self, sql: &str) {
        self.conn().unwrap().execute_batch(sql).unwrap();
    }
}

fn now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_case_is_idempotent() {
        let store = CaseStore::in_memory().unwrap();
        let first = store.get_or_create_case("a1b2c3d4").unwrap();
        let second = store.get_or_create_case("a1b2c3d4").unwrap();
        assert_eq!(first, second);
        assert!(store.case_exists("a1b2c3d4").unwrap());
        assert!(!store.case_exists("missing").unwrap());
    }

    #[test]
    fn test_list_cases_newest_first() {
        let store = CaseStore::in_memory().unwrap();
        store.raw_execute(
            "INSERT INTO cases (id, created_at) VALUES ('old', 1.0), ('mid', 2.0), ('new', 3.0);",
        );

        let ids: Vec<String> = store
            .list_cases(2)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_history_in_insertion_order() {
        let store = CaseStore::in_memory().unwrap();
        store.get_or_create_case("c").unwrap();
        store.save_message("c", TurnRole::User, "first").unwrap();
        store.save_message("c", TurnRole::Assistant, "second").unwrap();
        store.save_message("c", TurnRole::User, "third").unwrap();
        store.save_message("other", TurnRole::User, "elsewhere").unwrap();

        let history = store.history("c", DEFAULT_HISTORY_LIMIT).unwrap();
        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(history[1].role, TurnRole::Assistant);
    }

    #[test]
    fn test_history_ties_break_by_insertion() {
        let store = CaseStore::in_memory().unwrap();
        store.raw_execute(
            "INSERT INTO messages (case_id, role, content, created_at) VALUES
                ('c', 'user', 'one', 5.0),
                ('c', 'assistant', 'two', 5.0),
                ('c', 'user', 'zero', 4.0);",
        );
        let contents: Vec<String> = store
            .history("c", 10)
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["zero", "one", "two"]);
    }

    #[test]
    fn test_history_limit() {
        let store = CaseStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .save_message("c", TurnRole::User, &format!("m{}", i))
                .unwrap();
        }
        let contents: Vec<String> = store
            .history("c", 3)
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_unknown_roles_are_skipped() {
        let store = CaseStore::in_memory().unwrap();
        store.raw_execute(
            "INSERT INTO messages (case_id, role, content, created_at) VALUES
                ('c', 'system', 'hidden', 1.0),
                ('c', 'user', 'visible', 2.0);",
        );
        let history = store.history("c", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "visible");
    }

    #[test]
    fn test_case_meta_roundtrip() {
        let store = CaseStore::in_memory().unwrap();
        store.get_or_create_case("c").unwrap();
        assert_eq!(store.case_meta("c").unwrap(), None);

        let meta = CaseMeta {
            user_name: Some("Sam".to_string()),
            domain: Some("hypertension".to_string()),
            goal: Some("Reach target BP".to_string()),
        };
        store.set_case_meta("c", &meta).unwrap();
        assert_eq!(store.case_meta("c").unwrap(), Some(meta));

        let replaced = CaseMeta {
            domain: Some("housing".to_string()),
            ..Default::default()
        };
        store.set_case_meta("c", &replaced).unwrap();
        assert_eq!(store.case_meta("c").unwrap(), Some(replaced));
    }

    #[test]
    fn test_corrupt_meta_reads_as_none() {
        let store = CaseStore::in_memory().unwrap();
        store.raw_execute("INSERT INTO case_meta (case_id, meta_json) VALUES ('c', '{oops');");
        assert_eq!(store.case_meta("c").unwrap(), None);
    }

    #[test]
    fn test_open_creates_parent_dirs_and_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cases.db");

        {
            let store = CaseStore::open(&path).unwrap();
            store.get_or_create_case("persisted").unwrap();
            store
                .save_message("persisted", TurnRole::User, "still here")
                .unwrap();
        }

        let reopened = CaseStore::open(&path).unwrap();
        assert_eq!(reopened.list_cases(10).unwrap().len(), 1);
        assert_eq!(
            reopened.history("persisted", 10).unwrap()[0].content,
            "still here"
        );
    }
}
