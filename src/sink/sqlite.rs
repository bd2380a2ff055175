//! SQLite result sink.
//!
//! Each run gets a row in `runs` and one row per detection in `detections`.
//! The returned handle reads `sqlite:<path>#<run_id>`.

use super::{ResultSink, SinkHandle};
use crate::analysis::Detection;
use crate::chunking::Speaker;
use crate::error::{FallaxError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS runs (
        id TEXT PRIMARY KEY,
        prefix TEXT NOT NULL,
        detection_count INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS detections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL REFERENCES runs(id),
        group_idx INTEGER NOT NULL,
        speaker_slug TEXT NOT NULL,
        mistake_slug TEXT NOT NULL,
        group_start_char_id INTEGER NOT NULL,
        group_end_char_id INTEGER NOT NULL,
        chunk_start_char_id INTEGER NOT NULL,
        chunk_end_char_id INTEGER NOT NULL,
        reason TEXT NOT NULL,
        how_starts TEXT NOT NULL,
        how_ends TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_detections_run_id ON detections(run_id);
"#;

/// Summary of a stored run.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRun {
    pub id: String,
    pub prefix: String,
    pub detection_count: usize,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed sink.
pub struct SqliteResultSink {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteResultSink {
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite result sink at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            location: path.display().to_string(),
        })
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: ":memory:".to_string(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FallaxError::Sink(format!("Failed to acquire lock: {}", e)))
    }

    /// Stored runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<StoredRun>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, prefix, detection_count, created_at FROM runs ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let created_at: String = row.get(3)?;
            Ok(StoredRun {
                id: row.get(0)?,
                prefix: row.get(1)?,
                detection_count: row.get::<_, i64>(2)? as usize,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }
        Ok(runs)
    }

    /// Detections of one run, in write order.
    pub fn load_run(&self, run_id: &str) -> Result<Vec<Detection>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT group_idx, speaker_slug, mistake_slug,
                   group_start_char_id, group_end_char_id,
                   chunk_start_char_id, chunk_end_char_id,
                   reason, how_starts, how_ends
            FROM detections WHERE run_id = ?1 ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            let speaker: String = row.get(1)?;
            Ok(Detection {
                window_index: row.get::<_, i64>(0)? as usize,
                speaker: Speaker::from(speaker.as_str()),
                fallacy_slug: row.get(2)?,
                window_start_char: row.get::<_, i64>(3)? as usize,
                window_end_char: row.get::<_, i64>(4)? as usize,
                focus_start_char: row.get::<_, i64>(5)? as usize,
                focus_end_char: row.get::<_, i64>(6)? as usize,
                reason: row.get(7)?,
                evidence_start: row.get(8)?,
                evidence_end: row.get(9)?,
            })
        })?;

        let mut detections = Vec::new();
        for row in rows {
            detections.push(row?);
        }
        Ok(detections)
    }
}

fn insert_run(
    conn: &mut Connection,
    run_id: &str,
    detections: &[Detection],
    prefix: &str,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO runs (id, prefix, detection_count, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![run_id, prefix, detections.len() as i64, Utc::now().to_rfc3339()],
    )?;

    for d in detections {
        tx.execute(
            r#"
            INSERT INTO detections
                (run_id, group_idx, speaker_slug, mistake_slug,
                 group_start_char_id, group_end_char_id,
                 chunk_start_char_id, chunk_end_char_id,
                 reason, how_starts, how_ends)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                run_id,
                d.window_index as i64,
                d.speaker.slug(),
                d.fallacy_slug,
                d.window_start_char as i64,
                d.window_end_char as i64,
                d.focus_start_char as i64,
                d.focus_end_char as i64,
                d.reason,
                d.evidence_start,
                d.evidence_end,
            ],
        )?;
    }

    tx.commit()
}

#[async_trait]
impl ResultSink for SqliteResultSink {
    #[instrument(skip(self, detections), fields(count = detections.len()))]
    async fn write(&self, detections: &[Detection], prefix: &str) -> Result<SinkHandle> {
        let run_id = Uuid::new_v4().to_string();
        let mut conn = self.lock()?;
        insert_run(&mut conn, &run_id, detections, prefix).map_err(|e| {
            FallaxError::Sink(format!("cannot store run in {}: {}", self.location, e))
        })?;

        info!("Stored run {} ({} detections)", run_id, detections.len());
        Ok(SinkHandle::new(format!("sqlite:{}#{}", self.location, run_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(window_index: usize, slug: &str) -> Detection {
        Detection {
            window_index,
            speaker: Speaker::named("alice"),
            fallacy_slug: slug.to_string(),
            window_start_char: 10,
            window_end_char: 90,
            focus_start_char: 50,
            focus_end_char: 90,
            reason: "reason".to_string(),
            evidence_start: "It is".to_string(),
            evidence_end: "again.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_and_load_run() {
        let sink = SqliteResultSink::in_memory().unwrap();
        let written = vec![detection(1, "Hyperbole"), detection(3, "Ad Hominem")];

        let handle = sink.write(&written, "debate").await.unwrap();
        let run_id = handle.as_str().rsplit('#').next().unwrap();
        assert!(handle.as_str().starts_with("sqlite::memory:#"));

        assert_eq!(sink.load_run(run_id).unwrap(), written);

        let runs = sink.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].prefix, "debate");
        assert_eq!(runs[0].detection_count, 2);
    }

    #[tokio::test]
    async fn test_empty_run_recorded() {
        let sink = SqliteResultSink::in_memory().unwrap();
        sink.write(&[], "nothing").await.unwrap();

        let runs = sink.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].detection_count, 0);
    }

    #[tokio::test]
    async fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.db");
        let sink = SqliteResultSink::new(&path).unwrap();

        sink.write(&[detection(0, "Straw Man")], "a").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_failed_insert_is_a_sink_error() {
        let sink = SqliteResultSink::in_memory().unwrap();
        sink.lock().unwrap().execute_batch("DROP TABLE detections;").unwrap();

        let err = sink.write(&[detection(0, "Straw Man")], "broken").await.unwrap_err();
        assert!(matches!(err, FallaxError::Sink(_)), "got {:?}", err);

        // The run row was rolled back with the failed transaction.
        assert!(sink.list_runs().unwrap().is_empty());
    }
}
