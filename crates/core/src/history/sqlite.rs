//! SQLite-backed history store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    HistoryError, HistoryFilter, HistoryStats, HistoryStore, NewSessionRecord, SessionOutcome,
    SessionRecord,
};

const SESSION_COLUMNS: &str =
    "id, job_id, owner_id, title, platform, outcome, error, started_at, ended_at, duration_secs";

pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn new(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), HistoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                platform TEXT NOT NULL,
                outcome TEXT NOT NULL,
                error TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                duration_secs INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_owner_id ON sessions(owner_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_job_id ON sessions(job_id);
            "#,
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
        let outcome_str: String = row.get(5)?;
        let started_at_str: String = row.get(7)?;
        let ended_at_str: String = row.get(8)?;

        Ok(SessionRecord {
            id: row.get(0)?,
            job_id: row.get(1)?,
            owner_id: row.get(2)?,
            title: row.get(3)?,
            platform: row.get(4)?,
            outcome: SessionOutcome::parse(&outcome_str).unwrap_or(SessionOutcome::Error),
            error: row.get(6)?,
            started_at: parse_rfc3339(&started_at_str).unwrap_or_else(Utc::now),
            ended_at: parse_rfc3339(&ended_at_str).unwrap_or_else(Utc::now),
            duration_secs: row.get(9)?,
        })
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl HistoryStore for SqliteHistoryStore {
    fn insert(&self, record: NewSessionRecord) -> Result<SessionRecord, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let duration_secs = (record.ended_at - record.started_at).num_seconds().max(0);

        conn.execute(
            "INSERT INTO sessions (job_id, owner_id, title, platform, outcome, error, started_at, ended_at, duration_secs) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.job_id,
                record.owner_id,
                record.title,
                record.platform,
                record.outcome.as_str(),
                record.error,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
                duration_secs,
            ],
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();

        Ok(SessionRecord {
            id,
            job_id: record.job_id,
            owner_id: record.owner_id,
            title: record.title,
            platform: record.platform,
            outcome: record.outcome,
            error: record.error,
            started_at: record.started_at,
            ended_at: record.ended_at,
            duration_secs,
        })
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<SessionRecord>, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push("owner_id = ?");
            params.push(Box::new(owner_id.clone()));
        }
        if let Some(ref job_id) = filter.job_id {
            conditions.push("job_id = ?");
            params.push(Box::new(job_id.clone()));
        }
        if let Some(outcome) = filter.outcome {
            conditions.push("outcome = ?");
            params.push(Box::new(outcome.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let mut sql = format!(
            "SELECT {} FROM sessions {} ORDER BY ended_at DESC",
            SESSION_COLUMNS, where_clause
        );

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit));
        }

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_record)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            records.push(row_result.map_err(|e| HistoryError::Database(e.to_string()))?);
        }

        Ok(records)
    }

    fn stats(&self, owner_id: &str) -> Result<HistoryStats, HistoryError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN outcome = 'completed' THEN 1 ELSE 0 END), 0), \
             COALESCE(SUM(CASE WHEN outcome = 'error' THEN 1 ELSE 0 END), 0), \
             COALESCE(SUM(duration_secs), 0) \
             FROM sessions WHERE owner_id = ?",
            params![owner_id],
            |row| {
                Ok(HistoryStats {
                    total_sessions: row.get(0)?,
                    completed: row.get(1)?,
                    errored: row.get(2)?,
                    total_duration_secs: row.get(3)?,
                })
            },
        )
        .map_err(|e| HistoryError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(owner: &str, outcome: SessionOutcome, minutes: i64) -> NewSessionRecord {
        let ended = Utc::now();
        NewSessionRecord {
            job_id: "job-1".to_string(),
            owner_id: owner.to_string(),
            title: "Evening show".to_string(),
            platform: "Twitch".to_string(),
            outcome,
            error: match outcome {
                SessionOutcome::Completed => None,
                SessionOutcome::Error => Some("encoder exited with status 1".to_string()),
            },
            started_at: ended - Duration::minutes(minutes),
            ended_at: ended,
        }
    }

    #[test]
    fn test_insert_computes_duration() {
        let store = SqliteHistoryStore::in_memory().unwrap();

        let inserted = store
            .insert(record("alice", SessionOutcome::Completed, 30))
            .unwrap();

        assert!(inserted.id > 0);
        assert_eq!(inserted.duration_secs, 30 * 60);
        assert_eq!(inserted.outcome, SessionOutcome::Completed);
    }

    #[test]
    fn test_list_newest_first() {
        let store = SqliteHistoryStore::in_memory().unwrap();

        let mut old = record("alice", SessionOutcome::Completed, 10);
        old.ended_at = Utc::now() - Duration::hours(2);
        old.started_at = old.ended_at - Duration::minutes(10);
        store.insert(old).unwrap();

        store
            .insert(record("alice", SessionOutcome::Error, 5))
            .unwrap();

        let records = store.list(&HistoryFilter::new().with_owner("alice")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, SessionOutcome::Error);
    }

    #[test]
    fn test_list_filters() {
        let store = SqliteHistoryStore::in_memory().unwrap();

        store
            .insert(record("alice", SessionOutcome::Completed, 10))
            .unwrap();
        store
            .insert(record("alice", SessionOutcome::Error, 10))
            .unwrap();
        store
            .insert(record("bob", SessionOutcome::Completed, 10))
            .unwrap();

        let errors = store
            .list(
                &HistoryFilter::new()
                    .with_owner("alice")
                    .with_outcome(SessionOutcome::Error),
            )
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].error.is_some());

        let limited = store.list(&HistoryFilter::new().with_limit(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_stats() {
        let store = SqliteHistoryStore::in_memory().unwrap();

        store
            .insert(record("alice", SessionOutcome::Completed, 30))
            .unwrap();
        store
            .insert(record("alice", SessionOutcome::Completed, 10))
            .unwrap();
        store
            .insert(record("alice", SessionOutcome::Error, 5))
            .unwrap();
        store
            .insert(record("bob", SessionOutcome::Completed, 60))
            .unwrap();

        let stats = store.stats("alice").unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.errored, 1);
        assert_eq!(stats.total_duration_secs, 45 * 60);

        let empty = store.stats("nobody").unwrap();
        assert_eq!(empty.total_sessions, 0);
        assert_eq!(empty.total_duration_secs, 0);
    }
}
