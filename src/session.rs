use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{MandataError, Result};
use crate::models::IngestStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Accumulator correlating all chunks of one logical upload. The mapping it
/// carries is the only way later chunks resolve external mandate references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub session_id: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub status: SessionStatus,
    pub stats: IngestStats,
    pub mapping: HashMap<String, i64>,
    pub touched: HashSet<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportSession {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            owner: None,
            status: SessionStatus::Pending,
            stats: IngestStats::default(),
            mapping: HashMap::new(),
            touched: HashSet::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn expired(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        matches!(self.status, SessionStatus::Completed | SessionStatus::Error)
            && self
                .completed_at
                .map(|done| now - done > grace)
                .unwrap_or(false)
    }
}

pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    format!("imp-{}", hex::encode(bytes))
}

/// Keyed store for import sessions. The in-memory implementation is only
/// valid for a single-instance deployment; the CLI uses the SQLite one so
/// chunk calls from separate processes share state.
///
/// Concurrent calls against the *same* session id must be serialized by the
/// caller; the store only serializes individual get/put operations.
pub trait SessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ImportSession>>;
    fn put(&self, session: &ImportSession) -> Result<()>;
    fn delete(&self, session_id: &str) -> Result<()>;
    /// Drop sessions whose grace window after completion has elapsed.
    /// Returns how many were removed.
    fn expire(&self, now: DateTime<Utc>, grace: Duration) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// In-process store
// ---------------------------------------------------------------------------

/// Process-wide map keyed by session id. Only valid for a single-instance
/// deployment; the CLI uses [`SqliteSessionStore`] instead so separate
/// invocations share state.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<String, ImportSession>>,
}

#[allow(dead_code)]
impl MemorySessionStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ImportSession>>> {
        self.inner
            .lock()
            .map_err(|_| MandataError::Other("session store lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ImportSession>> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    fn put(&self, session: &ImportSession) -> Result<()> {
        self.lock()?.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        self.lock()?.remove(session_id);
        Ok(())
    }

    fn expire(&self, now: DateTime<Utc>, grace: Duration) -> Result<usize> {
        let mut map = self.lock()?;
        let before = map.len();
        map.retain(|_, s| !s.expired(now, grace));
        Ok(before - map.len())
    }
}

// ---------------------------------------------------------------------------
// SQLite-backed store
// ---------------------------------------------------------------------------

pub struct SqliteSessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSessionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn list(&self) -> Result<Vec<ImportSession>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM import_sessions ORDER BY updated_at")?;
        let payloads: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut sessions = Vec::with_capacity(payloads.len());
        for payload in payloads {
            sessions.push(serde_json::from_str(&payload)?);
        }
        Ok(sessions)
    }
}

impl SessionStore for SqliteSessionStore<'_> {
    fn get(&self, session_id: &str) -> Result<Option<ImportSession>> {
        use rusqlite::OptionalExtension;
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM import_sessions WHERE session_id = ?1",
                [session_id],
                |r| r.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put(&self, session: &ImportSession) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        self.conn.execute(
            "INSERT INTO import_sessions (session_id, payload) VALUES (?1, ?2) \
             ON CONFLICT(session_id) DO UPDATE SET \
                payload = excluded.payload, \
                updated_at = datetime('now')",
            rusqlite::params![session.session_id, payload],
        )?;
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM import_sessions WHERE session_id = ?1", [session_id])?;
        Ok(())
    }

    fn expire(&self, now: DateTime<Utc>, grace: Duration) -> Result<usize> {
        let mut removed = 0;
        for session in self.list()? {
            if session.expired(now, grace) {
                self.delete(&session.session_id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
