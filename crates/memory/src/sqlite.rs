//! SQLite backend.
//!
//! One database file with three append-only tables:
//! - `notes`: observations with their stored score components
//! - `decisions`: one row per cycle; plan, context and outcome as JSON
//! - `summaries`: archived period summaries
//!
//! and one mutable table, `todos`, for the planning tool.
//!
//! WAL mode lets `summarize` read a consistent snapshot while the engine
//! keeps appending.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use goalward_core::decision::{Decision, DecisionId, NewDecision};
use goalward_core::error::StorageError;
use goalward_core::memory::{ContextQuery, MemoryStore, Summary, SummaryPeriod};
use goalward_core::note::{NewNote, Note, NoteId};
use goalward_core::todo::{NewTodo, Todo, TodoFilter, TodoId, TodoPatch, TodoStatus, TodoStore};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::scoring::ScoringPolicy;
use crate::summary;

/// A persistent SQLite memory store.
pub struct SqliteStore {
    pool: SqlitePool,
    policy: ScoringPolicy,
    // Serializes writers inside this process; readers are never blocked
    write_lock: Mutex<()>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `":memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str, policy: ScoringPolicy) -> Result<Self, StorageError> {
        let in_memory = path == ":memory:" || path == "sqlite::memory:";
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StorageError::Unavailable(format!("Invalid SQLite path: {e}")))?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        let options = options.busy_timeout(Duration::from_secs(5));

        // Every connection to :memory: would open its own empty database
        let max_connections = if in_memory { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            policy,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        info!("SQLite memory store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        let statements = [
            (
                "notes table",
                r#"
                CREATE TABLE IF NOT EXISTS notes (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp       TEXT NOT NULL,
                    category        TEXT NOT NULL,
                    content         TEXT NOT NULL,
                    source          TEXT NOT NULL,
                    importance      REAL NOT NULL,
                    category_weight REAL NOT NULL,
                    novelty         REAL NOT NULL
                )
                "#,
            ),
            (
                "notes timestamp index",
                "CREATE INDEX IF NOT EXISTS idx_notes_timestamp ON notes(timestamp)",
            ),
            (
                "notes category index",
                "CREATE INDEX IF NOT EXISTS idx_notes_category ON notes(category, timestamp DESC)",
            ),
            (
                "decisions table",
                r#"
                CREATE TABLE IF NOT EXISTS decisions (
                    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp          TEXT NOT NULL,
                    goal_id            TEXT NOT NULL,
                    context            TEXT NOT NULL DEFAULT '[]',
                    request            TEXT NOT NULL,
                    response           TEXT,
                    plan               TEXT NOT NULL,
                    outcome_status     TEXT NOT NULL,
                    outcome            TEXT NOT NULL,
                    error              TEXT,
                    attempts           INTEGER NOT NULL,
                    next_interval_secs INTEGER NOT NULL
                )
                "#,
            ),
            (
                "decisions timestamp index",
                "CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions(timestamp)",
            ),
            (
                "summaries table",
                r#"
                CREATE TABLE IF NOT EXISTS summaries (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    period       TEXT NOT NULL,
                    window_start TEXT NOT NULL,
                    window_end   TEXT NOT NULL,
                    body         TEXT NOT NULL
                )
                "#,
            ),
            (
                "todos table",
                r#"
                CREATE TABLE IF NOT EXISTS todos (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    title        TEXT NOT NULL,
                    description  TEXT,
                    status       TEXT NOT NULL,
                    priority     INTEGER NOT NULL,
                    due_date     TEXT,
                    created_at   TEXT NOT NULL,
                    completed_at TEXT,
                    tags         TEXT NOT NULL DEFAULT '[]',
                    metadata     TEXT NOT NULL DEFAULT '{}'
                )
                "#,
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_note(row: &SqliteRow) -> Result<Note, StorageError> {
        let timestamp: String = column(row, "timestamp")?;
        Ok(Note {
            id: NoteId(column(row, "id")?),
            timestamp: parse_timestamp(&timestamp)?,
            category: column(row, "category")?,
            content: column(row, "content")?,
            source: column(row, "source")?,
            importance: column(row, "importance")?,
            category_weight: column(row, "category_weight")?,
            novelty: column(row, "novelty")?,
        })
    }

    fn row_to_decision(row: &SqliteRow) -> Result<Decision, StorageError> {
        let timestamp: String = column(row, "timestamp")?;
        let context: String = column(row, "context")?;
        let plan: String = column(row, "plan")?;
        let outcome: String = column(row, "outcome")?;
        let attempts: i64 = column(row, "attempts")?;
        let next_interval_secs: i64 = column(row, "next_interval_secs")?;

        Ok(Decision {
            id: DecisionId(column(row, "id")?),
            record: NewDecision {
                timestamp: parse_timestamp(&timestamp)?,
                goal_id: column(row, "goal_id")?,
                context: from_json("context", &context)?,
                request: column(row, "request")?,
                response: column(row, "response")?,
                plan: from_json("plan", &plan)?,
                outcome: from_json("outcome", &outcome)?,
                error: column(row, "error")?,
                attempts: attempts.max(0) as u32,
                next_interval_secs: next_interval_secs.max(0) as u64,
            },
        })
    }

    fn row_to_todo(row: &SqliteRow) -> Result<Todo, StorageError> {
        let status: String = column(row, "status")?;
        let priority: i64 = column(row, "priority")?;
        let due_date: Option<String> = column(row, "due_date")?;
        let created_at: String = column(row, "created_at")?;
        let completed_at: Option<String> = column(row, "completed_at")?;
        let tags: String = column(row, "tags")?;
        let metadata: String = column(row, "metadata")?;

        Ok(Todo {
            id: TodoId(column(row, "id")?),
            title: column(row, "title")?,
            description: column(row, "description")?,
            status: status.parse().map_err(StorageError::Corrupt)?,
            priority: u8::try_from(priority)
                .map_err(|_| StorageError::Corrupt(format!("todo priority {priority}")))?,
            due_date: due_date
                .map(|raw| {
                    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                        .map_err(|e| StorageError::Corrupt(format!("due_date '{raw}': {e}")))
                })
                .transpose()?,
            created_at: parse_timestamp(&created_at)?,
            completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
            tags: from_json("tags", &tags)?,
            metadata: from_json("metadata", &metadata)?,
        })
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    // Fixed width so lexical order matches chronological order
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StorageError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StorageError::Corrupt(format!("{name} column: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(what: &str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Corrupt(format!("{what} JSON: {e}")))
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value)
        .map_err(|e| StorageError::WriteFailed(format!("{what} serialization: {e}")))
}

fn is_unavailable(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

fn read_err(context: &str, e: sqlx::Error) -> StorageError {
    if is_unavailable(&e) {
        StorageError::Unavailable(format!("{context}: {e}"))
    } else {
        StorageError::QueryFailed(format!("{context}: {e}"))
    }
}

fn write_err(context: &str, e: sqlx::Error) -> StorageError {
    if is_unavailable(&e) {
        StorageError::Unavailable(format!("{context}: {e}"))
    } else {
        StorageError::WriteFailed(format!("{context}: {e}"))
    }
}

#[async_trait]
impl MemoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record_note(&self, note: NewNote) -> Result<NoteId, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| write_err("BEGIN", e))?;

        let history: Vec<String> = sqlx::query(
            "SELECT content FROM notes WHERE category = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )
        .bind(&note.category)
        .bind(self.policy.novelty_window as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| read_err("novelty history", e))?
        .iter()
        .map(|row| column(row, "content"))
        .collect::<Result<_, _>>()?;

        let score = self
            .policy
            .score_new(&note, history.iter().map(String::as_str));

        let result = sqlx::query(
            r#"
            INSERT INTO notes (timestamp, category, content, source, importance, category_weight, novelty)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(format_timestamp(&note.timestamp))
        .bind(&note.category)
        .bind(&note.content)
        .bind(&note.source)
        .bind(score.importance)
        .bind(score.category_weight)
        .bind(score.novelty)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_err("INSERT note", e))?;

        tx.commit().await.map_err(|e| write_err("COMMIT note", e))?;

        let id = NoteId(result.last_insert_rowid());
        debug!(note_id = %id, importance = score.importance, "Recorded note");
        Ok(id)
    }

    async fn record_decision(&self, decision: NewDecision) -> Result<DecisionId, StorageError> {
        let context = to_json("context", &decision.context)?;
        let plan = to_json("plan", &decision.plan)?;
        let outcome = to_json("outcome", &decision.outcome)?;

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            r#"
            INSERT INTO decisions (
                timestamp, goal_id, context, request, response, plan,
                outcome_status, outcome, error, attempts, next_interval_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(format_timestamp(&decision.timestamp))
        .bind(&decision.goal_id)
        .bind(&context)
        .bind(&decision.request)
        .bind(&decision.response)
        .bind(&plan)
        .bind(decision.outcome.label())
        .bind(&outcome)
        .bind(&decision.error)
        .bind(decision.attempts as i64)
        .bind(i64::try_from(decision.next_interval_secs).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("INSERT decision", e))?;

        let id = DecisionId(result.last_insert_rowid());
        debug!(decision_id = %id, outcome = decision.outcome.label(), "Recorded decision");
        Ok(id)
    }

    async fn retrieve_context(&self, query: ContextQuery) -> Result<Vec<Note>, StorageError> {
        if query.limit == 0 {
            return Ok(vec![]);
        }

        // Category filter uses positional parameters after the fixed three
        let category_filter = match &query.categories {
            None => String::new(),
            Some(categories) if categories.is_empty() => return Ok(vec![]),
            Some(categories) => {
                let params: Vec<String> = (0..categories.len())
                    .map(|i| format!("?{}", i + 4))
                    .collect();
                format!("AND category IN ({})", params.join(", "))
            }
        };

        let sql = format!(
            r#"
            SELECT * FROM notes
            WHERE timestamp >= ?1 AND timestamp <= ?2
            {category_filter}
            ORDER BY importance DESC, timestamp DESC, id DESC
            LIMIT ?3
            "#
        );

        let mut db_query = sqlx::query(&sql)
            .bind(format_timestamp(&query.window.since))
            .bind(format_timestamp(&query.window.until))
            .bind(query.limit as i64);
        for category in query.categories.iter().flatten() {
            db_query = db_query.bind(category);
        }

        let rows = db_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("context query", e))?;

        rows.iter().map(Self::row_to_note).collect()
    }

    async fn summarize(
        &self,
        period: SummaryPeriod,
        now: DateTime<Utc>,
    ) -> Result<Summary, StorageError> {
        let (current, previous) = summary::windows(period, now);
        let since = format_timestamp(&previous.since);
        let until = format_timestamp(&current.until);

        // All reads share one transaction, hence one WAL snapshot
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| read_err("BEGIN", e))?;

        let notes = sqlx::query("SELECT * FROM notes WHERE timestamp >= ?1 AND timestamp <= ?2")
            .bind(&since)
            .bind(&until)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| read_err("summary notes", e))?
            .iter()
            .map(Self::row_to_note)
            .collect::<Result<Vec<_>, _>>()?;

        let decisions =
            sqlx::query("SELECT * FROM decisions WHERE timestamp >= ?1 AND timestamp <= ?2")
                .bind(&since)
                .bind(&until)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| read_err("summary decisions", e))?
                .iter()
                .map(Self::row_to_decision)
                .collect::<Result<Vec<_>, _>>()?;

        let last_id: Option<i64> = sqlx::query("SELECT MAX(id) AS last_id FROM decisions")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| read_err("summary last decision", e))
            .and_then(|row| column(&row, "last_id"))?;

        tx.commit().await.map_err(|e| read_err("COMMIT", e))?;

        let mut summary = summary::compute(period, now, &notes, &decisions);
        summary.last_decision_id = last_id.map(DecisionId);
        Ok(summary)
    }

    async fn rescore(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| write_err("BEGIN", e))?;

        let notes = sqlx::query("SELECT * FROM notes")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| read_err("rescore scan", e))?
            .iter()
            .map(Self::row_to_note)
            .collect::<Result<Vec<_>, _>>()?;

        for note in &notes {
            sqlx::query("UPDATE notes SET importance = ?1 WHERE id = ?2")
                .bind(self.policy.rescore(note, now))
                .bind(note.id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| write_err("rescore update", e))?;
        }

        tx.commit().await.map_err(|e| write_err("COMMIT rescore", e))?;
        debug!(count = notes.len(), "Rescored notes");
        Ok(notes.len())
    }

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>, StorageError> {
        let row = sqlx::query("SELECT * FROM notes WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_err("GET note", e))?;

        row.as_ref().map(Self::row_to_note).transpose()
    }

    async fn last_decision(&self) -> Result<Option<Decision>, StorageError> {
        let row = sqlx::query("SELECT * FROM decisions ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_err("last decision", e))?;

        row.as_ref().map(Self::row_to_decision).transpose()
    }

    async fn recent_decisions(&self, limit: usize) -> Result<Vec<Decision>, StorageError> {
        let rows = sqlx::query("SELECT * FROM decisions ORDER BY id DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_err("recent decisions", e))?;

        rows.iter().map(Self::row_to_decision).collect()
    }

    async fn note_count(&self) -> Result<usize, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM notes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| read_err("COUNT notes", e))?;
        let cnt: i64 = column(&row, "cnt")?;
        Ok(cnt as usize)
    }

    async fn decision_count(&self) -> Result<usize, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM decisions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| read_err("COUNT decisions", e))?;
        let cnt: i64 = column(&row, "cnt")?;
        Ok(cnt as usize)
    }

    async fn record_summary(&self, summary: &Summary) -> Result<i64, StorageError> {
        let body = to_json("summary", summary)?;
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "INSERT INTO summaries (period, window_start, window_end, body) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(summary.period.as_str())
        .bind(format_timestamp(&summary.window.since))
        .bind(format_timestamp(&summary.window.until))
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("INSERT summary", e))?;

        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl TodoStore for SqliteStore {
    async fn add_todo(&self, todo: NewTodo) -> Result<TodoId, StorageError> {
        let tags = to_json("tags", &todo.tags)?;
        let metadata = to_json("metadata", &todo.metadata)?;
        let completed_at =
            (todo.status == TodoStatus::Completed).then(|| format_timestamp(&todo.created_at));

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            r#"
            INSERT INTO todos (
                title, description, status, priority, due_date,
                created_at, completed_at, tags, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.status.as_str())
        .bind(i64::from(todo.priority))
        .bind(todo.due_date.map(|d| d.to_string()))
        .bind(format_timestamp(&todo.created_at))
        .bind(completed_at)
        .bind(&tags)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err("INSERT todo", e))?;

        let id = TodoId(result.last_insert_rowid());
        debug!(todo_id = %id, "Added todo");
        Ok(id)
    }

    async fn update_todo(
        &self,
        id: TodoId,
        patch: TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Todo>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| write_err("BEGIN", e))?;

        let row = sqlx::query("SELECT * FROM todos WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| read_err("GET todo", e))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut todo = Self::row_to_todo(&row)?;
        patch.apply(&mut todo, now);

        sqlx::query(
            r#"
            UPDATE todos SET
                title = ?1, description = ?2, status = ?3, priority = ?4,
                due_date = ?5, completed_at = ?6, tags = ?7, metadata = ?8
            WHERE id = ?9
            "#,
        )
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.status.as_str())
        .bind(i64::from(todo.priority))
        .bind(todo.due_date.map(|d| d.to_string()))
        .bind(todo.completed_at.as_ref().map(format_timestamp))
        .bind(to_json("tags", &todo.tags)?)
        .bind(to_json("metadata", &todo.metadata)?)
        .bind(id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_err("UPDATE todo", e))?;

        tx.commit().await.map_err(|e| write_err("COMMIT todo", e))?;
        debug!(todo_id = %id, status = %todo.status, "Updated todo");
        Ok(Some(todo))
    }

    async fn list_todos(&self, filter: TodoFilter) -> Result<Vec<Todo>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM todos
            WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR priority = ?2)
            ORDER BY priority ASC, created_at DESC, id DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.priority.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_err("list todos", e))?;

        // Tags are a JSON array; match them after decoding
        let mut todos = Vec::with_capacity(rows.len());
        for row in &rows {
            let todo = Self::row_to_todo(row)?;
            if filter.matches(&todo) {
                todos.push(todo);
            }
        }
        Ok(todos)
    }

    async fn get_todo(&self, id: TodoId) -> Result<Option<Todo>, StorageError> {
        let row = sqlx::query("SELECT * FROM todos WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_err("GET todo", e))?;

        row.as_ref().map(Self::row_to_todo).transpose()
    }

    async fn delete_todo(&self, id: TodoId) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM todos WHERE id = ?1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| write_err("DELETE todo", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use goalward_core::decision::{ActionPlan, ContextRef, Outcome};
    use goalward_core::memory::TimeWindow;
    use std::sync::Arc;

    async fn test_store() -> SqliteStore {
        SqliteStore::new(":memory:", ScoringPolicy::default())
            .await
            .unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, 9, 0, 0).unwrap()
    }

    fn wide_window() -> TimeWindow {
        TimeWindow::new(
            t0() - ChronoDuration::days(365),
            t0() + ChronoDuration::days(365),
        )
    }

    fn make_decision(minutes: i64, outcome: Outcome) -> NewDecision {
        NewDecision {
            timestamp: t0() + ChronoDuration::minutes(minutes),
            goal_id: "fitness".into(),
            context: vec![ContextRef {
                note_id: NoteId(1),
                importance: 0.7,
            }],
            request: "<request/>".into(),
            response: Some("<decision/>".into()),
            plan: ActionPlan {
                tool: "note_take".into(),
                arguments: serde_json::json!({"text": "ran 5km"}),
                rationale: "log the run".into(),
                analysis: None,
                interval_hint_secs: Some(1800),
            },
            outcome,
            error: None,
            attempts: 2,
            next_interval_secs: 1800,
        }
    }

    #[tokio::test]
    async fn note_round_trip() {
        let store = test_store().await;
        let id = store
            .record_note(NewNote::new("progress", "ran 5km", "note_take").at(t0()))
            .await
            .unwrap();

        let note = store.get_note(id).await.unwrap().unwrap();
        assert_eq!(note.content, "ran 5km");
        assert_eq!(note.category, "progress");
        assert_eq!(note.source, "note_take");
        assert_eq!(note.timestamp, t0());
        assert_eq!(note.novelty, 1.0);
        assert!(store.get_note(NoteId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recorded_note_appears_once_in_context() {
        let store = test_store().await;
        let id = store
            .record_note(NewNote::new("progress", "ran 5km", "note_take").at(t0()))
            .await
            .unwrap();
        store
            .record_note(NewNote::new("plan", "rest tomorrow", "note_take").at(t0()))
            .await
            .unwrap();

        let notes = store
            .retrieve_context(ContextQuery::new(10, wide_window()))
            .await
            .unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes.iter().filter(|n| n.id == id).count(), 1);
    }

    #[tokio::test]
    async fn duplicate_note_has_zero_novelty() {
        let store = test_store().await;
        store
            .record_note(NewNote::new("progress", "ran 5km", "x").at(t0()))
            .await
            .unwrap();
        let id = store
            .record_note(NewNote::new("progress", "Ran 5km", "x").at(t0()))
            .await
            .unwrap();
        assert_eq!(store.get_note(id).await.unwrap().unwrap().novelty, 0.0);
    }

    #[tokio::test]
    async fn context_is_ordered_and_limited() {
        let store = test_store().await;
        store
            .record_note(NewNote::new("engine", "low weight", "engine").at(t0()))
            .await
            .unwrap();
        store
            .record_note(NewNote::new("goal", "high weight", "engine").at(t0()))
            .await
            .unwrap();
        store
            .record_note(NewNote::new("general", "middle", "engine").at(t0()))
            .await
            .unwrap();

        let notes = store
            .retrieve_context(ContextQuery::new(2, wide_window()))
            .await
            .unwrap();
        let contents: Vec<&str> = notes.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["high weight", "middle"]);
    }

    #[tokio::test]
    async fn context_filters_window_and_category() {
        let store = test_store().await;
        store
            .record_note(NewNote::new("progress", "old", "x").at(t0() - ChronoDuration::days(10)))
            .await
            .unwrap();
        store
            .record_note(NewNote::new("progress", "fresh", "x").at(t0()))
            .await
            .unwrap();
        store
            .record_note(NewNote::new("plan", "fresh plan", "x").at(t0()))
            .await
            .unwrap();

        let window = TimeWindow::ending_at(t0(), ChronoDuration::days(1));
        let notes = store
            .retrieve_context(ContextQuery::new(10, window).with_categories(vec!["progress".into()]))
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "fresh");

        let none = store
            .retrieve_context(ContextQuery::new(10, window).with_categories(vec![]))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn retrieval_is_deterministic() {
        let store = test_store().await;
        for i in 0..6 {
            store
                .record_note(NewNote::new("general", "same text", "x").at(t0() + ChronoDuration::seconds(i % 2)))
                .await
                .unwrap();
        }
        let query = ContextQuery::new(4, wide_window());
        let a = store.retrieve_context(query.clone()).await.unwrap();
        let b = store.retrieve_context(query).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn decision_round_trip() {
        let store = test_store().await;
        let id = store
            .record_decision(make_decision(
                0,
                Outcome::Executed {
                    output: "Note recorded".into(),
                    data: Some(serde_json::json!({"note_id": 1})),
                },
            ))
            .await
            .unwrap();

        let last = store.last_decision().await.unwrap().unwrap();
        assert_eq!(last.id, id);
        assert_eq!(last.record.plan.tool, "note_take");
        assert_eq!(last.record.plan.arguments["text"], "ran 5km");
        assert_eq!(last.record.context.len(), 1);
        assert_eq!(last.record.attempts, 2);
        assert_eq!(last.next_interval(), Duration::from_secs(1800));
        assert!(last.is_success());
    }

    #[tokio::test]
    async fn oversized_interval_does_not_wrap_to_zero() {
        let store = test_store().await;
        let mut decision = make_decision(0, Outcome::Rejected { error: "x".into() });
        decision.next_interval_secs = u64::MAX;
        store.record_decision(decision).await.unwrap();

        let last = store.last_decision().await.unwrap().unwrap();
        assert_eq!(last.record.next_interval_secs, i64::MAX as u64);
    }

    #[tokio::test]
    async fn recent_decisions_newest_first() {
        let store = test_store().await;
        for i in 0..4 {
            store
                .record_decision(make_decision(
                    i,
                    Outcome::ToolFailed {
                        error: "boom".into(),
                    },
                ))
                .await
                .unwrap();
        }
        let recent = store.recent_decisions(3).await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|d| d.id.0).collect();
        assert_eq!(ids, vec![4, 3, 2]);
        assert_eq!(store.decision_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn rescore_updates_every_note() {
        let store = test_store().await;
        let id = store
            .record_note(NewNote::new("progress", "tempo", "x").at(t0()))
            .await
            .unwrap();
        let before = store.get_note(id).await.unwrap().unwrap().importance;
        assert_eq!(store.rescore(t0() + ChronoDuration::days(2)).await.unwrap(), 1);
        let after = store.get_note(id).await.unwrap().unwrap().importance;
        assert!(after < before);
    }

    #[tokio::test]
    async fn summary_counts_and_archive() {
        let store = test_store().await;
        store
            .record_note(NewNote::new("progress", "ran", "x").at(t0() - ChronoDuration::hours(2)))
            .await
            .unwrap();
        store
            .record_decision(make_decision(
                -60,
                Outcome::Degraded {
                    error: "timeout".into(),
                },
            ))
            .await
            .unwrap();

        let summary = store.summarize(SummaryPeriod::Daily, t0()).await.unwrap();
        assert_eq!(summary.note_count, 1);
        assert_eq!(summary.decision_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.last_decision_id, Some(DecisionId(1)));
        assert_eq!(store.record_summary(&summary).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reopen_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goalward.db");
        let path = path.to_string_lossy().to_string();

        {
            let store = SqliteStore::new(&path, ScoringPolicy::default()).await.unwrap();
            store
                .record_note(NewNote::new("progress", "persisted", "x").at(t0()))
                .await
                .unwrap();
        }

        let store = SqliteStore::new(&path, ScoringPolicy::default()).await.unwrap();
        assert_eq!(store.note_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn summarize_during_writes_sees_whole_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concurrent.db");
        let store = Arc::new(
            SqliteStore::new(&path.to_string_lossy(), ScoringPolicy::default())
                .await
                .unwrap(),
        );
        let now = Utc::now();
        const TOTAL: usize = 40;

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..TOTAL {
                    store
                        .record_note(
                            NewNote::new("progress", format!("entry {i}"), "x")
                                .at(now - ChronoDuration::minutes(1)),
                        )
                        .await
                        .unwrap();
                }
            })
        };

        let mut last_seen = 0;
        for _ in 0..20 {
            let summary = store.summarize(SummaryPeriod::Daily, now).await.unwrap();
            assert!(summary.note_count >= last_seen);
            assert!(summary.note_count <= TOTAL);
            assert_eq!(
                summary.notes_by_category.values().sum::<usize>(),
                summary.note_count
            );
            last_seen = summary.note_count;
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
        let summary = store.summarize(SummaryPeriod::Daily, now).await.unwrap();
        assert_eq!(summary.note_count, TOTAL);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn summarize_during_decision_writes_sees_whole_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.db");
        let store = Arc::new(
            SqliteStore::new(&path.to_string_lossy(), ScoringPolicy::default())
                .await
                .unwrap(),
        );
        const TOTAL: i64 = 30;

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..TOTAL {
                    let outcome = if i % 3 == 0 {
                        Outcome::Rejected {
                            error: "unknown tool".into(),
                        }
                    } else {
                        Outcome::Executed {
                            output: format!("step {i}"),
                            data: Some(serde_json::json!({"step": i})),
                        }
                    };
                    store
                        .record_decision(make_decision(-i - 1, outcome))
                        .await
                        .unwrap();
                }
            })
        };

        let mut last_seen = 0;
        for _ in 0..20 {
            let summary = store.summarize(SummaryPeriod::Daily, t0()).await.unwrap();
            assert_eq!(
                summary.decisions_by_outcome.values().sum::<usize>(),
                summary.decision_count
            );
            // Every decision lies inside the window, so the snapshot's
            // highest id must equal its count
            let expected = (summary.decision_count > 0).then_some(DecisionId(summary.decision_count as i64));
            assert_eq!(summary.last_decision_id, expected);
            assert!(summary.decision_count >= last_seen);
            last_seen = summary.decision_count;

            for decision in store.recent_decisions(TOTAL as usize).await.unwrap() {
                assert_eq!(decision.record.plan.tool, "note_take");
                assert_eq!(decision.record.context.len(), 1);
                assert_eq!(decision.record.attempts, 2);
            }
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
        let summary = store.summarize(SummaryPeriod::Daily, t0()).await.unwrap();
        assert_eq!(summary.decision_count, TOTAL as usize);
        assert_eq!(summary.decisions_by_outcome.get("rejected"), Some(&10));
        assert_eq!(summary.failure_count, 10);
    }

    #[tokio::test]
    async fn replayed_sequence_scores_identically() {
        let sequence = [
            ("progress", "ran 5km"),
            ("plan", "ran 5km"),
            ("progress", "ran 5km"),
            ("health", "slept 8 hours"),
            ("progress", "ran 6km in 35 minutes"),
            ("health", "slept 8 hours"),
            ("general", "rest day"),
        ];

        async fn replay(sequence: &[(&str, &str)]) -> Vec<(i64, f64, f64, f64)> {
            let store = test_store().await;
            for (i, (category, content)) in sequence.iter().enumerate() {
                store
                    .record_note(
                        NewNote::new(*category, *content, "x")
                            .at(t0() + ChronoDuration::minutes(i as i64 * 7)),
                    )
                    .await
                    .unwrap();
            }
            store.rescore(t0() + ChronoDuration::days(2)).await.unwrap();
            let mut scores = Vec::new();
            for id in 1..=sequence.len() as i64 {
                let note = store.get_note(NoteId(id)).await.unwrap().unwrap();
                scores.push((note.id.0, note.importance, note.novelty, note.category_weight));
            }
            scores
        }

        let first = replay(&sequence).await;
        let second = replay(&sequence).await;
        assert_eq!(first, second);
        // Same content in another category still counts as new
        assert_eq!(first[1].2, 1.0);
        assert_eq!(first[2].2, 0.0);
    }

    #[tokio::test]
    async fn todo_lifecycle() {
        let store = test_store().await;
        let run = store
            .add_todo(
                NewTodo::new("long run")
                    .with_priority(2)
                    .with_tags(vec!["training".into()])
                    .at(t0()),
            )
            .await
            .unwrap();
        let stretch = store
            .add_todo(NewTodo::new("stretch").with_priority(1).at(t0()))
            .await
            .unwrap();

        let listed = store.list_todos(TodoFilter::default()).await.unwrap();
        let ids: Vec<TodoId> = listed.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![stretch, run]);

        let updated = store
            .update_todo(
                run,
                TodoPatch {
                    due_date: NaiveDate::from_ymd_opt(2025, 4, 20),
                    metadata: Some(serde_json::json!({"km": 18})),
                    ..TodoPatch::default()
                },
                t0(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.due_date, NaiveDate::from_ymd_opt(2025, 4, 20));

        let done = store
            .update_todo(run, TodoPatch::complete(), t0() + ChronoDuration::hours(3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, TodoStatus::Completed);

        let stored = store.get_todo(run).await.unwrap().unwrap();
        assert_eq!(stored, done);
        assert_eq!(stored.completed_at, Some(t0() + ChronoDuration::hours(3)));
        assert_eq!(stored.metadata["km"], 18);

        let tagged = store
            .list_todos(TodoFilter {
                tags: vec!["training".into()],
                status: Some(TodoStatus::Completed),
                ..TodoFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);

        assert!(store.delete_todo(stretch).await.unwrap());
        assert!(!store.delete_todo(stretch).await.unwrap());
        assert!(store.get_todo(stretch).await.unwrap().is_none());
        assert!(store
            .update_todo(stretch, TodoPatch::complete(), t0())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn store_name() {
        assert_eq!(test_store().await.name(), "sqlite");
    }
}
