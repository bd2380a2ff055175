//! In-memory result sink.
//!
//! Useful for testing and for the HTTP server, which returns results inline.

use super::{ResultSink, SinkHandle};
use crate::analysis::Detection;
use crate::error::{FallaxError, Result};
use async_trait::async_trait;
use std::sync::RwLock;

/// Keeps every written run in memory.
#[derive(Default)]
pub struct MemoryResultSink {
    runs: RwLock<Vec<(String, Vec<Detection>)>>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All runs written so far as `(prefix, detections)`.
    pub fn runs(&self) -> Vec<(String, Vec<Detection>)> {
        self.runs.read().map(|runs| runs.clone()).unwrap_or_default()
    }

    /// Detections of the most recent run.
    pub fn last(&self) -> Option<Vec<Detection>> {
        self.runs
            .read()
            .ok()
            .and_then(|runs| runs.last().map(|(_, d)| d.clone()))
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn write(&self, detections: &[Detection], prefix: &str) -> Result<SinkHandle> {
        let mut runs = self
            .runs
            .write()
            .map_err(|e| FallaxError::Sink(format!("Failed to acquire lock: {}", e)))?;
        runs.push((prefix.to_string(), detections.to_vec()));
        Ok(SinkHandle::new(format!("memory:{}#{}", prefix, runs.len() - 1)))
    }
}
