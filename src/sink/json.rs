//! JSON file sink.

use super::{ResultSink, SinkHandle};
use crate::analysis::Detection;
use crate::error::{FallaxError, Result};
use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Maximum length of the prefix part of a file name.
const MAX_PREFIX_CHARS: usize = 120;

/// Suffixes tried before giving up on a free file name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Writes each run to `<dir>/<prefix>-YYYY-MM-DD_HH-MM-SS[-N].json`.
pub struct JsonResultSink {
    base_dir: PathBuf,
}

impl JsonResultSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .map_err(|e| FallaxError::Sink(format!("cannot create {}: {}", base_dir.display(), e)))?;
        Ok(Self { base_dir })
    }
}

/// Make a prefix safe to use in a file name on any platform.
pub fn safe_prefix(prefix: &str) -> String {
    let reserved = Regex::new(r#"[<>:"/\\|?*]+"#).expect("reserved character pattern is valid");
    let safe = reserved.replace_all(prefix, "_").replace(' ', "_");
    let safe: String = safe.chars().take(MAX_PREFIX_CHARS).collect();
    if safe.is_empty() {
        "results".to_string()
    } else {
        safe
    }
}

#[async_trait]
impl ResultSink for JsonResultSink {
    async fn write(&self, detections: &[Detection], prefix: &str) -> Result<SinkHandle> {
        let content = serde_json::to_string_pretty(detections)
            .map_err(|e| FallaxError::Sink(format!("cannot serialize results: {}", e)))?;

        let stem = format!(
            "{}-{}",
            safe_prefix(prefix),
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        );
        let (target, mut file) = self.create_unique(&stem).await?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| FallaxError::Sink(format!("cannot write {}: {}", target.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| FallaxError::Sink(format!("cannot write {}: {}", target.display(), e)))?;

        info!("Results saved to: {}", target.display());
        Ok(SinkHandle::new(target.display().to_string()))
    }
}

impl JsonResultSink {
    /// Create `<stem>.json`, or `<stem>-N.json` when an earlier run in the
    /// same second already took the name. Never overwrites.
    async fn create_unique(&self, stem: &str) -> Result<(PathBuf, tokio::fs::File)> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}-{}.json", stem, attempt)
            };
            let target = self.base_dir.join(filename);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await
            {
                Ok(file) => return Ok((target, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(FallaxError::Sink(format!(
                        "cannot create {}: {}",
                        target.display(),
                        e
                    )))
                }
            }
        }

        Err(FallaxError::Sink(format!(
            "no free file name for {} in {}",
            stem,
            self.base_dir.display()
        )))
    }
}

/// Read a JSON results file back.
pub fn load_records(path: &Path) -> Result<Vec<Detection>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
