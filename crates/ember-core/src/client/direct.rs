//! Direct-Store Knowledge Client
//!
//! SQLite-backed implementation of the knowledge capability. Schema is
//! bootstrapped on open; queries stay within the store contract: type
//! filters, case-insensitive substring matches, recency ordering, LIMIT.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, params_from_iter};
use uuid::Uuid;

use crate::error::EmberError;
use crate::knowledge::{ExchangeRole, KnowledgeItem, KnowledgeType, SessionExchange};

use super::{ClientError, ClientMode, KnowledgeClient, SearchScope};

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS knowledge_items (
    id               TEXT PRIMARY KEY,
    knowledge_type   TEXT NOT NULL,
    category         TEXT,
    title            TEXT NOT NULL,
    content          TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    importance_score INTEGER,
    access_count     INTEGER
);
CREATE INDEX IF NOT EXISTS idx_knowledge_created
    ON knowledge_items (created_at DESC);
CREATE INDEX IF NOT EXISTS idx_knowledge_type
    ON knowledge_items (knowledge_type);

CREATE TABLE IF NOT EXISTS session_exchanges (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_exchange_session
    ON session_exchanges (session_id, seq);
";

// ============================================================================
// CLIENT
// ============================================================================

/// Knowledge client that queries the store directly
///
/// Holds a single connection behind a mutex; all methods take `&self`,
/// so the client is `Send + Sync` and usable behind `Arc`.
pub struct DirectStoreClient {
    conn: Mutex<Connection>,
}

impl DirectStoreClient {
    /// Open (and if needed bootstrap) the knowledge store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EmberError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| EmberError::Config(format!("cannot open knowledge store: {e}")))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| EmberError::Config(format!("cannot configure knowledge store: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| EmberError::Config(format!("cannot bootstrap store schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, mainly for tests and the self-test harness
    pub fn open_in_memory() -> Result<Self, EmberError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EmberError::Config(format!("cannot open knowledge store: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| EmberError::Config(format!("cannot bootstrap store schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append one exchange to a session transcript
    pub fn record_exchange(
        &self,
        session_id: &str,
        role: ExchangeRole,
        content: &str,
    ) -> Result<(), ClientError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO session_exchanges (session_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![session_id, role.as_str(), content, Utc::now().to_rfc3339()],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ClientError> {
        self.conn
            .lock()
            .map_err(|_| ClientError::Permanent("store connection lock poisoned".into()))
    }

    fn query_items(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let type_tag: String = row.get("knowledge_type")?;
                let created: String = row.get("created_at")?;
                Ok(KnowledgeItem {
                    id: row.get("id")?,
                    title: row.get("title")?,
                    content: row.get("content")?,
                    knowledge_type: KnowledgeType::parse_name(&type_tag),
                    category: row.get("category")?,
                    created_at: chrono::DateTime::parse_from_rfc3339(&created)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc)),
                    importance_score: row.get("importance_score")?,
                    access_count: row.get("access_count")?,
                })
            })
            .map_err(map_sqlite_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

/// Local store errors are permanent unless the database is merely busy
fn map_sqlite_err(e: rusqlite::Error) -> ClientError {
    use rusqlite::ErrorCode;
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            ClientError::Transient(e.to_string())
        }
        _ => ClientError::Permanent(e.to_string()),
    }
}

/// Build `(placeholder list, param vec)` for a type filter
fn type_filter(types: &[KnowledgeType]) -> (String, Vec<String>) {
    let placeholders = vec!["?"; types.len()].join(", ");
    let params = types.iter().map(|t| t.as_str().to_string()).collect();
    (placeholders, params)
}

#[async_trait]
impl KnowledgeClient for DirectStoreClient {
    async fn search_knowledge(
        &self,
        query: &str,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        self.search_knowledge_scoped(query, SearchScope::FullText, types, limit)
            .await
    }

    async fn search_knowledge_scoped(
        &self,
        query: &str,
        scope: SearchScope,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if !query.trim().is_empty() {
            let needle = format!("%{}%", query.trim());
            match scope {
                SearchScope::FullText => {
                    clauses.push("(title LIKE ? OR content LIKE ? OR category LIKE ?)".into());
                    params.extend([needle.clone(), needle.clone(), needle]);
                }
                SearchScope::Category => {
                    clauses.push("category LIKE ?".into());
                    params.push(needle);
                }
                SearchScope::ContentOrCategory => {
                    clauses.push("(content LIKE ? OR category LIKE ?)".into());
                    params.extend([needle.clone(), needle]);
                }
            }
        }
        if let Some(types) = types {
            if !types.is_empty() {
                let (placeholders, type_params) = type_filter(types);
                clauses.push(format!("knowledge_type IN ({placeholders})"));
                params.extend(type_params);
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT id, knowledge_type, category, title, content, created_at,
                    importance_score, access_count
             FROM knowledge_items {where_clause}
             ORDER BY created_at DESC LIMIT {limit}"
        );
        self.query_items(&sql, &params)
    }

    async fn get_contextual_knowledge(
        &self,
        situation: &str,
        max_results: usize,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        // Match any significant word of the situation; fall back to the
        // most recent items when nothing matches.
        let words: Vec<String> = situation
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .take(5)
            .map(|w| format!("%{w}%"))
            .collect();

        if !words.is_empty() {
            let clause = vec!["content LIKE ? OR category LIKE ?"; words.len()].join(" OR ");
            let mut params = Vec::with_capacity(words.len() * 2);
            for w in &words {
                params.push(w.clone());
                params.push(w.clone());
            }
            let sql = format!(
                "SELECT id, knowledge_type, category, title, content, created_at,
                        importance_score, access_count
                 FROM knowledge_items WHERE {clause}
                 ORDER BY created_at DESC LIMIT {max_results}"
            );
            let matched = self.query_items(&sql, &params)?;
            if !matched.is_empty() {
                return Ok(matched);
            }
        }

        let sql = format!(
            "SELECT id, knowledge_type, category, title, content, created_at,
                    importance_score, access_count
             FROM knowledge_items
             ORDER BY created_at DESC LIMIT {max_results}"
        );
        self.query_items(&sql, &[])
    }

    async fn get_session_context(
        &self,
        max_items: usize,
        project: Option<&str>,
    ) -> Result<Vec<KnowledgeItem>, ClientError> {
        match project {
            Some(project) => {
                let sql = format!(
                    "SELECT id, knowledge_type, category, title, content, created_at,
                            importance_score, access_count
                     FROM knowledge_items
                     WHERE knowledge_type = 'contextual' AND category LIKE ?
                     ORDER BY created_at DESC LIMIT {max_items}"
                );
                self.query_items(&sql, &[format!("%{project}%")])
            }
            None => {
                let sql = format!(
                    "SELECT id, knowledge_type, category, title, content, created_at,
                            importance_score, access_count
                     FROM knowledge_items
                     WHERE knowledge_type = 'contextual'
                     ORDER BY created_at DESC LIMIT {max_items}"
                );
                self.query_items(&sql, &[])
            }
        }
    }

    async fn store_knowledge(
        &self,
        knowledge_type: KnowledgeType,
        title: &str,
        content: &str,
        category: Option<&str>,
        importance: Option<i64>,
    ) -> Result<String, ClientError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO knowledge_items
                 (id, knowledge_type, category, title, content, created_at,
                  importance_score, access_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            rusqlite::params![
                id,
                knowledge_type.as_str(),
                category,
                title,
                content,
                Utc::now().to_rfc3339(),
                importance,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(id)
    }

    async fn load_session_history(
        &self,
        session_id: &str,
        max_exchanges: usize,
    ) -> Result<Vec<SessionExchange>, ClientError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT role, content, created_at FROM session_exchanges
                 WHERE session_id = ?1
                 ORDER BY seq DESC LIMIT ?2",
            )
            .map_err(map_sqlite_err)?;
        let mut exchanges: Vec<SessionExchange> = stmt
            .query_map(rusqlite::params![session_id, max_exchanges as i64], |row| {
                let role: String = row.get(0)?;
                let created: String = row.get(2)?;
                Ok(SessionExchange {
                    role: ExchangeRole::parse_name(&role),
                    content: row.get(1)?,
                    created_at: chrono::DateTime::parse_from_rfc3339(&created)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(map_sqlite_err)?
            .filter_map(|r| r.ok())
            .collect();
        exchanges.reverse();
        Ok(exchanges)
    }

    fn mode(&self) -> ClientMode {
        ClientMode::Direct
    }
}

// ============================================================================
// TESTS
// ============================================================================
