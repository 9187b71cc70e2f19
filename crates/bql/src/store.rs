//! Storage abstraction and SQLite backend.
//!
//! `IssueStore` is the query engine's view of the relational store: a base
//! filtered scan plus three batch lookups keyed by an ID set and a full
//! dependency-edge scan. `SqliteStore` implements it over rusqlite and also
//! carries the mutation helpers embedding clients and tests use; mutations
//! refresh the blocked/ready cache relations the compiler's pseudo-fields
//! are tested against.
//!
//! Soft deletion is a `deleted_at` timestamp. Every scan excludes deleted
//! issues, and edge scans join against non-deleted endpoints.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::ToSqlOutput;
use rusqlite::{Connection, ToSql};
use uuid::Uuid;

use crate::domain::{Dependencies, Issue, IssueType, Priority, RelationType, Status};
use crate::error::StoreError;
use crate::graph::DependencyRow;
use crate::sql::{SqlParam, SqlQuery};

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::Text(s) => s.to_sql(),
            SqlParam::Int(i) => i.to_sql(),
        }
    }
}

/// Trait for storage backends the executor can query.
///
/// Implementations must be cheaply cloneable so the executor and the store
/// owner can share one handle.
pub trait IssueStore: Clone {
    /// Initialize the backend (idempotent).
    fn init(&self) -> Result<(), StoreError>;

    /// Run the compiled base scan. Returned issues carry empty labels,
    /// dependencies, and comment counts; the executor attaches those.
    fn query_issues(&self, sql: &SqlQuery) -> Result<Vec<Issue>, StoreError>;

    /// Batch-load dependency references touching the ID set, both
    /// directions, grouped per issue by relation.
    fn fetch_dependencies(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Dependencies>, StoreError>;

    /// Batch-load labels for the ID set.
    fn fetch_labels(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>, StoreError>;

    /// Batch-load comment counts for the ID set.
    fn fetch_comment_counts(&self, ids: &[String]) -> Result<HashMap<String, i64>, StoreError>;

    /// Fetch every non-deleted dependency edge (for graph construction).
    fn fetch_all_edges(&self) -> Result<Vec<DependencyRow>, StoreError>;
}

/// SQLite-backed issue store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS issues (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    issue_type  TEXT NOT NULL DEFAULT 'task',
    status      TEXT NOT NULL DEFAULT 'open',
    priority    INTEGER NOT NULL DEFAULT 2,
    assignee    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    closed_at   TEXT,
    deleted_at  TEXT
);

CREATE TABLE IF NOT EXISTS dependencies (
    issue_id   TEXT NOT NULL,
    target_id  TEXT NOT NULL,
    relation   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT,
    PRIMARY KEY (issue_id, target_id, relation)
);

CREATE TABLE IF NOT EXISTS labels (
    issue_id TEXT NOT NULL,
    label    TEXT NOT NULL,
    PRIMARY KEY (issue_id, label)
);

CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY,
    issue_id   TEXT NOT NULL,
    author     TEXT,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS blocked_cache ( issue_id TEXT PRIMARY KEY );
CREATE TABLE IF NOT EXISTS ready_cache   ( issue_id TEXT PRIMARY KEY );
";

impl SqliteStore {
    /// Open or create a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing and embedding).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // === Mutation helpers (store-owner surface, not used by the executor) ===

    /// Insert an issue together with its labels.
    pub fn insert_issue(&self, issue: &Issue) -> Result<(), StoreError> {
        {
            let conn = self.lock();
            conn.execute(
                "INSERT INTO issues (id, title, description, issue_type, status, priority, \
                 assignee, created_at, updated_at, closed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    issue.id,
                    issue.title,
                    issue.description,
                    issue.issue_type.as_str(),
                    issue.status.as_str(),
                    issue.priority.level(),
                    issue.assignee,
                    format_ts(issue.created_at),
                    format_ts(issue.updated_at),
                    issue.closed_at.map(format_ts),
                ],
            )?;
            for label in &issue.labels {
                conn.execute(
                    "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
                    rusqlite::params![issue.id, label],
                )?;
            }
        }
        self.refresh_block_caches()
    }

    /// Create and persist a new task with a generated ID.
    pub fn create_issue(&self, title: &str, description: &str) -> Result<Issue, StoreError> {
        let issue = Issue::new(title.to_string(), description.to_string());
        self.insert_issue(&issue)?;
        Ok(issue)
    }

    /// Record a dependency edge (subject → target).
    pub fn add_dependency(
        &self,
        issue_id: &str,
        target_id: &str,
        relation: RelationType,
    ) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT OR IGNORE INTO dependencies (issue_id, target_id, relation, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![issue_id, target_id, relation.as_str(), format_ts(Utc::now())],
        )?;
        self.refresh_block_caches()
    }

    pub fn add_label(&self, issue_id: &str, label: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            rusqlite::params![issue_id, label],
        )?;
        Ok(())
    }

    pub fn add_comment(
        &self,
        issue_id: &str,
        author: Option<&str>,
        body: &str,
    ) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT INTO comments (id, issue_id, author, body, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                issue_id,
                author,
                body,
                format_ts(Utc::now())
            ],
        )?;
        Ok(())
    }

    /// Update an issue's status; closing stamps `closed_at`.
    pub fn set_status(&self, issue_id: &str, status: Status) -> Result<(), StoreError> {
        let now = format_ts(Utc::now());
        let closed_at = (status == Status::Closed).then(|| now.clone());
        self.lock().execute(
            "UPDATE issues SET status = ?1, updated_at = ?2, closed_at = ?3 WHERE id = ?4",
            rusqlite::params![status.as_str(), now, closed_at, issue_id],
        )?;
        self.refresh_block_caches()
    }

    /// Tombstone an issue. It disappears from scans and edge loads.
    pub fn soft_delete(&self, issue_id: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "UPDATE issues SET deleted_at = ?1 WHERE id = ?2",
            rusqlite::params![format_ts(Utc::now()), issue_id],
        )?;
        self.refresh_block_caches()
    }

    /// Recompute the blocked/ready cache relations from current edges and
    /// statuses. An issue is blocked while any non-deleted blocked-by edge
    /// points at a non-closed issue; ready means open and not blocked.
    pub fn refresh_block_caches(&self) -> Result<(), StoreError> {
        self.lock().execute_batch(
            "DELETE FROM blocked_cache;
             INSERT INTO blocked_cache
             SELECT DISTINCT d.issue_id FROM dependencies d
             JOIN issues s ON s.id = d.issue_id AND s.deleted_at IS NULL
             JOIN issues t ON t.id = d.target_id AND t.deleted_at IS NULL
             WHERE d.relation = 'blocked-by' AND d.deleted_at IS NULL
               AND t.status != 'closed';
             DELETE FROM ready_cache;
             INSERT INTO ready_cache
             SELECT id FROM issues
             WHERE deleted_at IS NULL AND status = 'open'
               AND id NOT IN (SELECT issue_id FROM blocked_cache);",
        )?;
        Ok(())
    }
}

impl IssueStore for SqliteStore {
    fn init(&self) -> Result<(), StoreError> {
        self.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn query_issues(&self, sql: &SqlQuery) -> Result<Vec<Issue>, StoreError> {
        let mut stmt_sql = String::from(
            "SELECT id, title, description, issue_type, status, priority, assignee, \
             created_at, updated_at, closed_at FROM issues WHERE deleted_at IS NULL",
        );
        if !sql.where_clause.is_empty() {
            stmt_sql.push_str(" AND (");
            stmt_sql.push_str(&sql.where_clause);
            stmt_sql.push(')');
        }
        stmt_sql.push_str(" ORDER BY ");
        stmt_sql.push_str(&sql.order_by);

        let conn = self.lock();
        let mut stmt = conn.prepare(&stmt_sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(sql.params.iter()), |row| {
            Ok(RawIssue {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                issue_type: row.get(3)?,
                status: row.get(4)?,
                priority: row.get(5)?,
                assignee: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
                closed_at: row.get(9)?,
            })
        })?;

        let mut issues = Vec::new();
        for row in rows {
            issues.push(row?.into_issue()?);
        }
        Ok(issues)
    }

    fn fetch_dependencies(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Dependencies>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ph = placeholders(ids.len());
        let stmt_sql = format!(
            "SELECT d.issue_id, d.target_id, d.relation FROM dependencies d \
             JOIN issues s ON s.id = d.issue_id AND s.deleted_at IS NULL \
             JOIN issues t ON t.id = d.target_id AND t.deleted_at IS NULL \
             WHERE d.deleted_at IS NULL AND (d.issue_id IN ({ph}) OR d.target_id IN ({ph})) \
             ORDER BY d.issue_id, d.target_id",
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&stmt_sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(ids.iter().chain(ids.iter())),
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;

        let id_set: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut map: HashMap<String, Dependencies> = HashMap::new();
        for row in rows {
            let (subject, target, relation) = row?;
            let relation = RelationType::from_str(&relation).map_err(|reason| {
                StoreError::CorruptRow {
                    id: subject.clone(),
                    reason,
                }
            })?;
            match relation {
                RelationType::BlockedBy => {
                    if id_set.contains(subject.as_str()) {
                        map.entry(subject.clone())
                            .or_default()
                            .blocked_by
                            .push(target.clone());
                    }
                    if id_set.contains(target.as_str()) {
                        map.entry(target).or_default().blocks.push(subject);
                    }
                }
                RelationType::ParentChild => {
                    if id_set.contains(target.as_str()) {
                        map.entry(target).or_default().children.push(subject);
                    }
                }
                RelationType::DiscoveredFrom => {
                    if id_set.contains(target.as_str()) {
                        map.entry(target).or_default().discovered.push(subject);
                    }
                }
            }
        }
        Ok(map)
    }

    fn fetch_labels(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let stmt_sql = format!(
            "SELECT issue_id, label FROM labels WHERE issue_id IN ({}) ORDER BY label",
            placeholders(ids.len())
        );
        let conn = self.lock();
        let mut stmt = conn.prepare(&stmt_sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (issue_id, label) = row?;
            map.entry(issue_id).or_default().push(label);
        }
        Ok(map)
    }

    fn fetch_comment_counts(&self, ids: &[String]) -> Result<HashMap<String, i64>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let stmt_sql = format!(
            "SELECT issue_id, COUNT(*) FROM comments WHERE issue_id IN ({}) GROUP BY issue_id",
            placeholders(ids.len())
        );
        let conn = self.lock();
        let mut stmt = conn.prepare(&stmt_sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (issue_id, count) = row?;
            map.insert(issue_id, count);
        }
        Ok(map)
    }

    fn fetch_all_edges(&self) -> Result<Vec<DependencyRow>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT d.issue_id, d.target_id, d.relation FROM dependencies d \
             JOIN issues s ON s.id = d.issue_id AND s.deleted_at IS NULL \
             JOIN issues t ON t.id = d.target_id AND t.deleted_at IS NULL \
             WHERE d.deleted_at IS NULL",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (issue_id, target_id, relation) = row?;
            let relation = RelationType::from_str(&relation).map_err(|reason| {
                StoreError::CorruptRow {
                    id: issue_id.clone(),
                    reason,
                }
            })?;
            edges.push(DependencyRow {
                issue_id,
                target_id,
                relation,
            });
        }
        Ok(edges)
    }
}

struct RawIssue {
    id: String,
    title: String,
    description: String,
    issue_type: String,
    status: String,
    priority: i64,
    assignee: Option<String>,
    created_at: String,
    updated_at: String,
    closed_at: Option<String>,
}

impl RawIssue {
    fn into_issue(self) -> Result<Issue, StoreError> {
        let issue_type =
            IssueType::from_str(&self.issue_type).map_err(|r| corrupt_row(&self.id, r))?;
        let status = Status::from_str(&self.status).map_err(|r| corrupt_row(&self.id, r))?;
        let priority = Priority::from_level(self.priority).map_err(|r| corrupt_row(&self.id, r))?;
        let created_at = parse_ts(&self.created_at).map_err(|r| corrupt_row(&self.id, r))?;
        let updated_at = parse_ts(&self.updated_at).map_err(|r| corrupt_row(&self.id, r))?;
        let closed_at = match &self.closed_at {
            Some(ts) => Some(parse_ts(ts).map_err(|r| corrupt_row(&self.id, r))?),
            None => None,
        };
        Ok(Issue {
            id: self.id,
            title: self.title,
            description: self.description,
            issue_type,
            status,
            priority,
            assignee: self.assignee,
            created_at,
            updated_at,
            closed_at,
            labels: Vec::new(),
            dependencies: Dependencies::default(),
            comment_count: 0,
        })
    }
}

fn corrupt_row(id: &str, reason: String) -> StoreError {
    StoreError::CorruptRow {
        id: id.to_string(),
        reason,
    }
}

/// Timestamps are stored in SQLite's own `YYYY-MM-DD HH:MM:SS` (UTC) form
/// so lexicographic comparison against `date('now', ...)` and
/// `datetime('now', ...)` is consistent.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_ts(text: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("bad timestamp '{}': {}", text, err))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
