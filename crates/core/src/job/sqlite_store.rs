//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    CreateJobRequest, Destination, EncodeParams, ErrorUpdate, Job, JobFilter, JobStore,
    JobStoreError, JobStatus, Schedule, SourceRef, TransitionUpdate, UpdateJobRequest,
};

const JOB_COLUMNS: &str = "id, owner_id, title, platform, source, rtmp_url, stream_key, encode, \
     start_at, duration_minutes, status, process_pid, started_at, ended_at, last_error, \
     created_at, updated_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                platform TEXT NOT NULL,
                source TEXT NOT NULL,
                rtmp_url TEXT NOT NULL,
                stream_key TEXT NOT NULL,
                encode TEXT NOT NULL,
                start_at TEXT,
                duration_minutes INTEGER,
                status TEXT NOT NULL,
                process_pid INTEGER,
                started_at TEXT,
                ended_at TEXT,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_owner_id ON jobs(owner_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_start_at ON jobs(start_at);
            "#,
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push("owner_id = ?");
            params.push(Box::new(owner_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let id: String = row.get(0)?;
        let owner_id: String = row.get(1)?;
        let title: String = row.get(2)?;
        let platform: String = row.get(3)?;
        let source_json: String = row.get(4)?;
        let rtmp_url: String = row.get(5)?;
        let stream_key: String = row.get(6)?;
        let encode_json: String = row.get(7)?;
        let start_at: Option<String> = row.get(8)?;
        let duration_minutes: Option<u32> = row.get(9)?;
        let status_str: String = row.get(10)?;
        let process_pid: Option<u32> = row.get(11)?;
        let started_at: Option<String> = row.get(12)?;
        let ended_at: Option<String> = row.get(13)?;
        let last_error: Option<String> = row.get(14)?;
        let created_at_str: String = row.get(15)?;
        let updated_at_str: String = row.get(16)?;

        let source: SourceRef = serde_json::from_str(&source_json).unwrap_or(SourceRef::Asset {
            name: String::new(),
        });
        let encode: EncodeParams = serde_json::from_str(&encode_json).unwrap_or_default();
        let status = JobStatus::parse(&status_str).unwrap_or(JobStatus::Error);

        Ok(Job {
            id,
            owner_id,
            title,
            platform,
            source,
            destination: Destination {
                rtmp_url,
                stream_key,
            },
            encode,
            schedule: Schedule {
                start_at: start_at.as_deref().and_then(parse_rfc3339),
                duration_minutes,
            },
            status,
            process_pid,
            started_at: started_at.as_deref().and_then(parse_rfc3339),
            ended_at: ended_at.as_deref().and_then(parse_rfc3339),
            last_error,
            created_at: parse_rfc3339(&created_at_str).unwrap_or_else(Utc::now),
            updated_at: parse_rfc3339(&updated_at_str).unwrap_or_else(Utc::now),
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<Option<Job>, JobStoreError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
            params![id],
            Self::row_to_job,
        );

        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(JobStoreError::Database(e.to_string())),
        }
    }

    fn query_jobs(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Job>, JobStoreError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params, Self::row_to_job)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(|e| JobStoreError::Database(e.to_string()))?);
        }

        Ok(jobs)
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        // A start instant puts the job straight under scheduler control.
        let status = if request.schedule.start_at.is_some() {
            JobStatus::Scheduled
        } else {
            JobStatus::Idle
        };

        let source_json = serde_json::to_string(&request.source)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        let encode_json = serde_json::to_string(&request.encode)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO jobs (id, owner_id, title, platform, source, rtmp_url, stream_key, encode, start_at, duration_minutes, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.owner_id,
                request.title,
                request.platform,
                source_json,
                request.destination.rtmp_url,
                request.destination.stream_key,
                encode_json,
                request.schedule.start_at.map(|dt| dt.to_rfc3339()),
                request.schedule.duration_minutes,
                status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(Job {
            id,
            owner_id: request.owner_id,
            title: request.title,
            platform: request.platform,
            source: request.source,
            destination: request.destination,
            encode: request.encode,
            schedule: request.schedule,
            status,
            process_pid: None,
            started_at: None,
            ended_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        Self::get_locked(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, mut params) = Self::build_where_clause(filter);

        let mut sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at ASC",
            JOB_COLUMNS, where_clause
        );

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit));
            // OFFSET is only valid after a LIMIT in sqlite.
            if let Some(offset) = filter.offset {
                sql.push_str(" OFFSET ?");
                params.push(Box::new(offset));
            }
        }

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Self::query_jobs(&conn, &sql, param_refs.as_slice())
    }

    fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM jobs WHERE status = 'scheduled' AND start_at IS NOT NULL AND start_at <= ? ORDER BY start_at ASC",
            JOB_COLUMNS
        );

        // RFC 3339 timestamps in UTC compare correctly as text.
        Self::query_jobs(&conn, &sql, &[&now.to_rfc3339()])
    }

    fn list_expired_live(&self, now: DateTime<Utc>) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM jobs WHERE status = 'live' AND duration_minutes IS NOT NULL AND started_at IS NOT NULL",
            JOB_COLUMNS
        );

        // Expiry arithmetic happens here rather than in SQL; the candidate
        // set (live jobs with a budget) is small.
        let candidates = Self::query_jobs(&conn, &sql, &[])?;
        Ok(candidates
            .into_iter()
            .filter(|job| job.expires_at().is_some_and(|at| at <= now))
            .collect())
    }

    fn list_active(&self) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM jobs WHERE status IN ('live', 'stopping') ORDER BY created_at ASC",
            JOB_COLUMNS
        );
        Self::query_jobs(&conn, &sql, &[])
    }

    fn transition(
        &self,
        id: &str,
        expected: JobStatus,
        update: TransitionUpdate,
    ) -> Result<Job, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();

        let (error_sql, error_param): (&str, Option<String>) = match &update.last_error {
            ErrorUpdate::Set(msg) => ("?", Some(msg.clone())),
            ErrorUpdate::Clear => ("NULL", None),
            ErrorUpdate::Keep => ("last_error", None),
        };

        let sql = format!(
            "UPDATE jobs SET status = ?, process_pid = ?, \
             started_at = COALESCE(?, started_at), ended_at = COALESCE(?, ended_at), \
             last_error = {}, updated_at = ? WHERE id = ? AND status = ?",
            error_sql
        );

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(update.status.as_str()),
            Box::new(update.process_pid),
            Box::new(update.started_at.map(|dt| dt.to_rfc3339())),
            Box::new(update.ended_at.map(|dt| dt.to_rfc3339())),
        ];
        if let Some(msg) = error_param {
            params.push(Box::new(msg));
        }
        params.push(Box::new(now.to_rfc3339()));
        params.push(Box::new(id.to_string()));
        params.push(Box::new(expected.as_str()));

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let changed = conn
            .execute(&sql, param_refs.as_slice())
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        if changed == 0 {
            // Distinguish a missing job from a lost CAS race.
            return match Self::get_locked(&conn, id)? {
                None => Err(JobStoreError::NotFound(id.to_string())),
                Some(job) => Err(JobStoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: job.status,
                }),
            };
        }

        Self::get_locked(&conn, id)?.ok_or_else(|| JobStoreError::NotFound(id.to_string()))
    }

    fn update_settings(&self, id: &str, request: UpdateJobRequest) -> Result<Job, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::get_locked(&conn, id)?
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;

        if current.status.is_active() {
            return Err(JobStoreError::Active {
                id: id.to_string(),
                status: current.status,
            });
        }

        let title = request.title.unwrap_or_else(|| current.title.clone());
        let platform = request.platform.unwrap_or_else(|| current.platform.clone());
        let source = request.source.unwrap_or_else(|| current.source.clone());
        let destination = request
            .destination
            .unwrap_or_else(|| current.destination.clone());
        let encode = request.encode.unwrap_or_else(|| current.encode.clone());
        let schedule = request.schedule.unwrap_or_else(|| current.schedule.clone());

        // Adding or removing a start instant moves the job in or out of
        // scheduler control; live/stopping rows were rejected above.
        let status = match (current.status, schedule.start_at) {
            (JobStatus::Idle, Some(_)) => JobStatus::Scheduled,
            (JobStatus::Scheduled, None) => JobStatus::Idle,
            (status, _) => status,
        };

        let source_json = serde_json::to_string(&source)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        let encode_json = serde_json::to_string(&encode)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let now = Utc::now();

        conn.execute(
            "UPDATE jobs SET title = ?, platform = ?, source = ?, rtmp_url = ?, stream_key = ?, encode = ?, start_at = ?, duration_minutes = ?, status = ?, updated_at = ? WHERE id = ?",
            params![
                title,
                platform,
                source_json,
                destination.rtmp_url,
                destination.stream_key,
                encode_json,
                schedule.start_at.map(|dt| dt.to_rfc3339()),
                schedule.duration_minutes,
                status.as_str(),
                now.to_rfc3339(),
                id,
            ],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(Job {
            title,
            platform,
            source,
            destination,
            encode,
            schedule,
            status,
            updated_at: now,
            ..current
        })
    }

    fn delete(&self, id: &str) -> Result<Job, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let job = Self::get_locked(&conn, id)?
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;

        // Status-guarded: a row that owns a running encoder is never deleted,
        // even when the caller's status check raced with a concurrent start.
        let changed = conn
            .execute(
                "DELETE FROM jobs WHERE id = ? AND status NOT IN ('live', 'stopping')",
                params![id],
            )
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(JobStoreError::Active {
                id: id.to_string(),
                status: job.status,
            });
        }

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    fn create_test_request() -> CreateJobRequest {
        CreateJobRequest {
            owner_id: "owner-1".to_string(),
            title: "Lo-fi radio".to_string(),
            platform: "YouTube".to_string(),
            source: SourceRef::Asset {
                name: "lofi-loop.mp4".to_string(),
            },
            destination: Destination {
                rtmp_url: "rtmp://a.rtmp.youtube.com/live2".to_string(),
                stream_key: "abcd-1234".to_string(),
            },
            encode: EncodeParams::default(),
            schedule: Schedule::default(),
        }
    }

    #[test]
    fn test_create_job() {
        let store = create_test_store();
        let request = create_test_request();

        let job = store.create(request.clone()).unwrap();

        assert!(!job.id.is_empty());
        assert_eq!(job.owner_id, request.owner_id);
        assert_eq!(job.title, request.title);
        assert_eq!(job.status, JobStatus::Idle);
        assert_eq!(job.process_pid, None);
        assert_eq!(job.last_error, None);
    }

    #[test]
    fn test_get_job() {
        let store = create_test_store();
        let created = store.create(create_test_request()).unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.source, created.source);
        assert_eq!(fetched.destination, created.destination);
        assert_eq!(fetched.encode, created.encode);
    }

    #[test]
    fn test_get_nonexistent_job() {
        let store = create_test_store();
        assert!(store.get("nonexistent-id").unwrap().is_none());
    }

    #[test]
    fn test_list_with_filters() {
        let store = create_test_store();

        let mut request = create_test_request();
        request.owner_id = "alice".to_string();
        store.create(request).unwrap();

        let mut request = create_test_request();
        request.owner_id = "bob".to_string();
        let bob_job = store.create(request).unwrap();

        let all = store.list(&JobFilter::new()).unwrap();
        assert_eq!(all.len(), 2);

        let alice_jobs = store.list(&JobFilter::new().with_owner("alice")).unwrap();
        assert_eq!(alice_jobs.len(), 1);
        assert_eq!(alice_jobs[0].owner_id, "alice");

        store
            .transition(
                &bob_job.id,
                JobStatus::Idle,
                TransitionUpdate::to_live(42, Utc::now()),
            )
            .unwrap();

        let live = store
            .list(&JobFilter::new().with_status(JobStatus::Live))
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, bob_job.id);
    }

    #[test]
    fn test_transition_cas_success() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();
        let started = Utc::now();

        let updated = store
            .transition(&job.id, JobStatus::Idle, TransitionUpdate::to_live(99, started))
            .unwrap();

        assert_eq!(updated.status, JobStatus::Live);
        assert_eq!(updated.process_pid, Some(99));
        assert_eq!(
            updated.started_at.map(|dt| dt.timestamp()),
            Some(started.timestamp())
        );
    }

    #[test]
    fn test_transition_cas_conflict() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();

        store
            .transition(&job.id, JobStatus::Idle, TransitionUpdate::to_live(99, Utc::now()))
            .unwrap();

        // Second actor still believes the job is idle.
        let result = store.transition(
            &job.id,
            JobStatus::Idle,
            TransitionUpdate::to_live(100, Utc::now()),
        );

        match result {
            Err(JobStoreError::Conflict { expected, actual, .. }) => {
                assert_eq!(expected, JobStatus::Idle);
                assert_eq!(actual, JobStatus::Live);
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        // The winner's pid is intact.
        let fetched = store.get(&job.id).unwrap().unwrap();
        assert_eq!(fetched.process_pid, Some(99));
    }

    #[test]
    fn test_transition_nonexistent_job() {
        let store = create_test_store();
        let result = store.transition(
            "nonexistent-id",
            JobStatus::Idle,
            TransitionUpdate::to_live(1, Utc::now()),
        );
        assert!(matches!(result, Err(JobStoreError::NotFound(_))));
    }

    #[test]
    fn test_transition_error_set_and_clear() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();

        let failed = store
            .transition(
                &job.id,
                JobStatus::Idle,
                TransitionUpdate::to_error("spawn failed", None),
            )
            .unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.last_error.as_deref(), Some("spawn failed"));

        // A successful restart clears the failure.
        let live = store
            .transition(
                &job.id,
                JobStatus::Error,
                TransitionUpdate::to_live(7, Utc::now()),
            )
            .unwrap();
        assert_eq!(live.last_error, None);
    }

    #[test]
    fn test_transition_keep_preserves_error() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();

        store
            .transition(
                &job.id,
                JobStatus::Idle,
                TransitionUpdate::to_error("encoder exited", None),
            )
            .unwrap();

        // to_offline keeps last_error untouched.
        let result = store
            .transition(
                &job.id,
                JobStatus::Error,
                TransitionUpdate::to_offline(Utc::now()),
            )
            .unwrap();
        assert_eq!(result.last_error.as_deref(), Some("encoder exited"));
    }

    #[test]
    fn test_stopping_then_offline_clears_pid() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();

        store
            .transition(&job.id, JobStatus::Idle, TransitionUpdate::to_live(55, Utc::now()))
            .unwrap();
        let stopping = store
            .transition(&job.id, JobStatus::Live, TransitionUpdate::to_stopping(Some(55)))
            .unwrap();
        assert_eq!(stopping.status, JobStatus::Stopping);
        assert_eq!(stopping.process_pid, Some(55));

        let offline = store
            .transition(
                &job.id,
                JobStatus::Stopping,
                TransitionUpdate::to_offline(Utc::now()),
            )
            .unwrap();
        assert_eq!(offline.status, JobStatus::Offline);
        assert_eq!(offline.process_pid, None);
        assert!(offline.ended_at.is_some());
    }

    #[test]
    fn test_list_with_limit_and_offset() {
        let store = create_test_store();
        let ids: Vec<String> = (0..3)
            .map(|_| store.create(create_test_request()).unwrap().id)
            .collect();

        let page = store
            .list(&JobFilter::new().with_limit(2))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, ids[0]);

        let rest = store
            .list(&JobFilter::new().with_limit(2).with_offset(2))
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, ids[2]);
    }

    #[test]
    fn test_list_due_scheduled() {
        let store = create_test_store();
        let now = Utc::now();

        let mut due = create_test_request();
        due.schedule.start_at = Some(now - Duration::minutes(1));
        let due_job = store.create(due).unwrap();
        assert_eq!(due_job.status, JobStatus::Scheduled);

        let mut future = create_test_request();
        future.schedule.start_at = Some(now + Duration::hours(1));
        let future_job = store.create(future).unwrap();
        assert_eq!(future_job.status, JobStatus::Scheduled);

        // No start instant, never due.
        store.create(create_test_request()).unwrap();

        let listed = store.list_due_scheduled(now).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due_job.id);
    }

    #[test]
    fn test_update_settings_moves_between_idle_and_scheduled() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();
        assert_eq!(job.status, JobStatus::Idle);

        let scheduled = store
            .update_settings(
                &job.id,
                UpdateJobRequest {
                    schedule: Some(Schedule {
                        start_at: Some(Utc::now() + Duration::hours(1)),
                        duration_minutes: Some(60),
                    }),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(scheduled.status, JobStatus::Scheduled);

        let idle = store
            .update_settings(
                &job.id,
                UpdateJobRequest {
                    schedule: Some(Schedule::default()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(idle.status, JobStatus::Idle);
    }

    #[test]
    fn test_list_expired_live() {
        let store = create_test_store();
        let now = Utc::now();

        let mut expired = create_test_request();
        expired.schedule.duration_minutes = Some(30);
        let expired_job = store.create(expired).unwrap();
        store
            .transition(
                &expired_job.id,
                JobStatus::Idle,
                TransitionUpdate::to_live(1, now - Duration::minutes(45)),
            )
            .unwrap();

        let mut running = create_test_request();
        running.schedule.duration_minutes = Some(30);
        let running_job = store.create(running).unwrap();
        store
            .transition(
                &running_job.id,
                JobStatus::Idle,
                TransitionUpdate::to_live(2, now - Duration::minutes(10)),
            )
            .unwrap();

        // Live without a budget never expires.
        let unbounded_job = store.create(create_test_request()).unwrap();
        store
            .transition(
                &unbounded_job.id,
                JobStatus::Idle,
                TransitionUpdate::to_live(3, now - Duration::days(7)),
            )
            .unwrap();

        let listed = store.list_expired_live(now).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, expired_job.id);
    }

    #[test]
    fn test_list_active() {
        let store = create_test_store();

        let live = store.create(create_test_request()).unwrap();
        store
            .transition(&live.id, JobStatus::Idle, TransitionUpdate::to_live(1, Utc::now()))
            .unwrap();

        let stopping = store.create(create_test_request()).unwrap();
        store
            .transition(&stopping.id, JobStatus::Idle, TransitionUpdate::to_live(2, Utc::now()))
            .unwrap();
        store
            .transition(
                &stopping.id,
                JobStatus::Live,
                TransitionUpdate::to_stopping(Some(2)),
            )
            .unwrap();

        store.create(create_test_request()).unwrap();

        let active = store.list_active().unwrap();
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn test_update_settings() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();

        let updated = store
            .update_settings(
                &job.id,
                UpdateJobRequest {
                    title: Some("Night radio".to_string()),
                    platform: Some("Twitch".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Night radio");
        assert_eq!(updated.platform, "Twitch");
        // Untouched fields survive.
        assert_eq!(updated.destination, job.destination);
    }

    #[test]
    fn test_update_settings_rejected_while_live() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();
        store
            .transition(&job.id, JobStatus::Idle, TransitionUpdate::to_live(1, Utc::now()))
            .unwrap();

        let result = store.update_settings(
            &job.id,
            UpdateJobRequest {
                title: Some("new title".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(JobStoreError::Active { .. })));
    }

    #[test]
    fn test_delete_job() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();

        let deleted = store.delete(&job.id).unwrap();
        assert_eq!(deleted.id, job.id);
        assert!(store.get(&job.id).unwrap().is_none());

        assert!(matches!(
            store.delete(&job.id),
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_refuses_active_rows() {
        let store = create_test_store();
        let job = store.create(create_test_request()).unwrap();

        store
            .transition(&job.id, JobStatus::Idle, TransitionUpdate::to_live(99, Utc::now()))
            .unwrap();

        match store.delete(&job.id) {
            Err(JobStoreError::Active { status, .. }) => assert_eq!(status, JobStatus::Live),
            other => panic!("expected active error, got {:?}", other),
        }
        assert!(store.get(&job.id).unwrap().is_some());

        store
            .transition(&job.id, JobStatus::Live, TransitionUpdate::to_stopping(Some(99)))
            .unwrap();
        assert!(matches!(
            store.delete(&job.id),
            Err(JobStoreError::Active { .. })
        ));

        store
            .transition(&job.id, JobStatus::Stopping, TransitionUpdate::to_offline(Utc::now()))
            .unwrap();
        assert!(store.delete(&job.id).is_ok());
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("jobs.db");

        let store = SqliteJobStore::new(&db_path).unwrap();
        let job = store.create(create_test_request()).unwrap();

        assert!(db_path.exists());
        assert!(store.get(&job.id).unwrap().is_some());
    }
}
