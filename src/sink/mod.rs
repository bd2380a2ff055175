//! Persistence of analysis results.
//!
//! A sink receives the detections of one run plus a naming prefix and
//! returns an opaque [`SinkHandle`] pointing at what it wrote. Records use
//! the serde form of [`Detection`].

mod json;
mod memory;
mod sqlite;

pub use json::{load_records, safe_prefix, JsonResultSink};
pub use memory::MemoryResultSink;
pub use sqlite::{SqliteResultSink, StoredRun};

use crate::analysis::Detection;
use crate::config::{Settings, SinkKind};
use crate::error::{FallaxError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Where a sink put the results (a file path, a database row, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkHandle(String);

impl SinkHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for result persistence.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist one run's detections. An empty run is still written.
    async fn write(&self, detections: &[Detection], prefix: &str) -> Result<SinkHandle>;
}

/// Read back the detections behind a handle returned by a file or SQLite sink.
pub fn load_handle(handle: &str) -> Result<Vec<Detection>> {
    match handle.strip_prefix("sqlite:") {
        Some(rest) => {
            let (path, run_id) = rest.rsplit_once('#').ok_or_else(|| {
                FallaxError::InvalidInput(format!("expected sqlite:<path>#<run id>, got {}", handle))
            })?;
            SqliteResultSink::new(Path::new(path))?.load_run(run_id)
        }
        None => load_records(Path::new(handle)),
    }
}

/// Create the sink selected in settings.
pub fn create_sink(settings: &Settings) -> Result<Arc<dyn ResultSink>> {
    Ok(match settings.sink.kind {
        SinkKind::Json => Arc::new(JsonResultSink::new(settings.results_dir())?),
        SinkKind::Sqlite => Arc::new(SqliteResultSink::new(&settings.sqlite_path())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Speaker;

    fn detection() -> Detection {
        Detection {
            window_index: 2,
            speaker: Speaker::NonSubstantive,
            fallacy_slug: "Hyperbole".to_string(),
            window_start_char: 0,
            window_end_char: 40,
            focus_start_char: 20,
            focus_end_char: 40,
            reason: "Exaggerates.".to_string(),
            evidence_start: String::new(),
            evidence_end: String::new(),
        }
    }

    #[tokio::test]
    async fn test_load_handle_for_each_sink() {
        let dir = tempfile::tempdir().unwrap();

        let json = JsonResultSink::new(dir.path()).unwrap();
        let handle = json.write(&[detection()], "run").await.unwrap();
        assert_eq!(load_handle(handle.as_str()).unwrap(), vec![detection()]);

        let db = SqliteResultSink::new(&dir.path().join("results.db")).unwrap();
        let handle = db.write(&[detection()], "run").await.unwrap();
        assert!(handle.as_str().starts_with("sqlite:"));
        assert_eq!(load_handle(handle.as_str()).unwrap(), vec![detection()]);
    }

    #[test]
    fn test_load_handle_rejects_bad_sqlite_handle() {
        assert!(matches!(
            load_handle("sqlite:/tmp/results.db"),
            Err(FallaxError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_create_sink_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.sink.results_dir = dir.path().join("json").display().to_string();
        settings.sink.sqlite_path = dir.path().join("db").join("r.db").display().to_string();

        let handle = create_sink(&settings).unwrap().write(&[], "a").await.unwrap();
        assert!(handle.as_str().ends_with(".json"));

        settings.sink.kind = SinkKind::Sqlite;
        let handle = create_sink(&settings).unwrap().write(&[], "a").await.unwrap();
        assert!(handle.as_str().starts_with("sqlite:"));
    }
}
