//! Sequential batch analysis with pacing and a consecutive-failure breaker.

use super::{Analyzer, Detection};
use crate::catalog::FallacyCatalog;
use crate::chunking::Window;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Back-to-back analyzer failures that stop a run.
pub const DEFAULT_FAILURE_THRESHOLD: usize = 5;

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    /// Stopped at the `max_windows` ceiling.
    StoppedBudget,
    /// Stopped after too many consecutive analyzer failures.
    StoppedFailures,
    /// Every window was processed.
    Done,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::StoppedBudget => write!(f, "stopped_budget"),
            RunState::StoppedFailures => write!(f, "stopped_failures"),
            RunState::Done => write!(f, "done"),
        }
    }
}

/// Run limits and pacing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Process at most this many windows.
    pub max_windows: Option<usize>,
    /// Fixed pause between windows.
    pub pause: Duration,
    /// Consecutive failures that stop the run.
    pub failure_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_windows: None,
            pause: Duration::ZERO,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// Everything a run produced, including partial results of a stopped run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: RunState,
    pub detections: Vec<Detection>,
    /// Windows available in the document.
    pub windows_total: usize,
    /// Windows visited before the run ended (skips and failures included).
    pub windows_processed: usize,
    /// Calls that returned a usable payload.
    pub analyzed: usize,
    /// Windows anchored on a non-substantive speaker.
    pub skipped: usize,
    /// Calls that failed.
    pub failed: usize,
    /// Calls whose output could not be interpreted.
    pub malformed: usize,
}

/// Drives windows through an [`Analyzer`] one at a time.
pub struct BatchOrchestrator {
    analyzer: Arc<dyn Analyzer>,
    config: BatchConfig,
    progress: Option<ProgressBar>,
}

impl BatchOrchestrator {
    pub fn new(analyzer: Arc<dyn Analyzer>, config: BatchConfig) -> Self {
        Self {
            analyzer,
            config,
            progress: None,
        }
    }

    /// Report each processed window on a progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    #[instrument(skip_all, fields(windows = windows.len()))]
    pub async fn run(&self, windows: &[Window<'_>], catalog: &FallacyCatalog) -> RunOutcome {
        let total = windows.len();
        let limit = self.config.max_windows.map_or(total, |max| max.min(total));
        info!("Analyzing {}/{} windows", limit, total);

        if let Some(pb) = &self.progress {
            pb.set_length(limit as u64);
        }

        let mut outcome = RunOutcome {
            state: RunState::Running,
            detections: Vec::new(),
            windows_total: total,
            windows_processed: 0,
            analyzed: 0,
            skipped: 0,
            failed: 0,
            malformed: 0,
        };
        let mut consecutive_failures = 0;

        for (idx, window) in windows[..limit].iter().enumerate() {
            outcome.windows_processed += 1;

            if !window.speaker().is_substantive() {
                debug!("Skipping window {}: non-substantive anchor", idx);
                outcome.skipped += 1;
            } else {
                match self.analyzer.analyze(idx, window, catalog).await {
                    Ok(analysis) if analysis.malformed_response => {
                        outcome.malformed += 1;
                    }
                    Ok(analysis) => {
                        consecutive_failures = 0;
                        outcome.analyzed += 1;
                        outcome.detections.extend(analysis.detections);
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        outcome.failed += 1;
                        warn!("Analysis failed for window {}: {}", idx, e);

                        if consecutive_failures >= self.config.failure_threshold {
                            error!(
                                "Too many consecutive analysis errors ({}). Stopping early.",
                                consecutive_failures
                            );
                            outcome.state = RunState::StoppedFailures;
                        }
                    }
                }
            }

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }

            if outcome.state == RunState::StoppedFailures {
                break;
            }

            if idx + 1 < limit && !self.config.pause.is_zero() {
                tokio::time::sleep(self.config.pause).await;
            }
        }

        if outcome.state == RunState::Running {
            outcome.state = if limit < total {
                RunState::StoppedBudget
            } else {
                RunState::Done
            };
        }

        info!(
            "Run {}: {} detections ({} analyzed, {} skipped, {} failed, {} malformed)",
            outcome.state,
            outcome.detections.len(),
            outcome.analyzed,
            outcome.skipped,
            outcome.failed,
            outcome.malformed
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CandidateDetection, WindowAnalysis};
    use crate::chunking::{Fragment, GrouperConfig, SlidingWindowGrouper, Speaker};
    use crate::error::{FallaxError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Clone, Copy)]
    enum Reply {
        Found(usize),
        Malformed,
        Fail,
    }

    /// Analyzer whose reply depends on the window index.
    struct Scripted {
        script: Box<dyn Fn(usize) -> Reply + Send + Sync>,
        calls: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(script: impl Fn(usize) -> Reply + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Analyzer for Scripted {
        async fn analyze(
            &self,
            window_index: usize,
            window: &Window<'_>,
            _catalog: &FallacyCatalog,
        ) -> Result<WindowAnalysis> {
            self.calls.lock().unwrap().push(window_index);
            match (self.script)(window_index) {
                Reply::Found(n) => Ok(WindowAnalysis::found(
                    (0..n)
                        .map(|i| {
                            Detection::from_candidate(
                                window_index,
                                window,
                                CandidateDetection {
                                    mistake_slug: format!("Fallacy {}", i),
                                    reason: "scripted".to_string(),
                                    how_starts: String::new(),
                                    how_ends: String::new(),
                                },
                            )
                        })
                        .collect(),
                )),
                Reply::Malformed => Ok(WindowAnalysis::malformed()),
                Reply::Fail => Err(FallaxError::Analysis("connection refused".to_string())),
            }
        }
    }

    fn fragments(speakers: &[&str]) -> Vec<Fragment> {
        speakers
            .iter()
            .enumerate()
            .map(|(i, speaker)| Fragment {
                speaker: Speaker::from(*speaker),
                text: format!("Sentence number {}.", i),
                token_length: 3,
                start_char: i * 20,
                end_char: i * 20 + 18,
            })
            .collect()
    }

    fn windows(frags: &[Fragment]) -> Vec<Window<'_>> {
        SlidingWindowGrouper::new(GrouperConfig::new(100, 4, 0).unwrap())
            .unwrap()
            .group(frags)
    }

    #[tokio::test]
    async fn test_all_windows_done() {
        let frags = fragments(&["A"; 4]);
        let analyzer = Scripted::new(|_| Reply::Found(1));
        let orchestrator = BatchOrchestrator::new(analyzer.clone(), BatchConfig::default());

        let outcome = orchestrator.run(&windows(&frags), &FallacyCatalog::short()).await;

        assert_eq!(outcome.state, RunState::Done);
        assert_eq!(outcome.detections.len(), 4);
        assert_eq!(analyzer.calls(), vec![0, 1, 2, 3]);
        assert_eq!(outcome.detections[2].window_index, 2);
    }

    #[tokio::test]
    async fn test_circuit_breaker_keeps_partial_results() {
        // 1-based windows 3..=7 fail, i.e. indices 2..=6.
        let frags = fragments(&["A"; 10]);
        let analyzer = Scripted::new(|idx| if (2..=6).contains(&idx) { Reply::Fail } else { Reply::Found(1) });
        let orchestrator = BatchOrchestrator::new(analyzer.clone(), BatchConfig::default());

        let outcome = orchestrator.run(&windows(&frags), &FallacyCatalog::short()).await;

        assert_eq!(outcome.state, RunState::StoppedFailures);
        assert_eq!(analyzer.calls(), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(outcome.failed, 5);
        assert_eq!(outcome.windows_processed, 7);
        let indices: Vec<usize> = outcome.detections.iter().map(|d| d.window_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_success_resets_failure_counter() {
        let frags = fragments(&["A"; 12]);
        let analyzer = Scripted::new(|idx| if idx % 5 == 4 { Reply::Found(0) } else { Reply::Fail });
        let orchestrator = BatchOrchestrator::new(analyzer.clone(), BatchConfig::default());

        let outcome = orchestrator.run(&windows(&frags), &FallacyCatalog::short()).await;

        assert_eq!(outcome.state, RunState::Done);
        assert_eq!(outcome.failed, 10);
        assert_eq!(outcome.analyzed, 2);
    }

    #[tokio::test]
    async fn test_non_substantive_anchor_is_skipped() {
        let frags = fragments(&["A", "other", "B", "other"]);
        let analyzer = Scripted::new(|_| Reply::Found(2));
        let orchestrator = BatchOrchestrator::new(analyzer.clone(), BatchConfig::default());

        let outcome = orchestrator.run(&windows(&frags), &FallacyCatalog::short()).await;

        assert_eq!(analyzer.calls(), vec![0, 2]);
        assert_eq!(outcome.skipped, 2);
        assert!(outcome.detections.iter().all(|d| d.speaker.is_substantive()));
        assert_eq!(outcome.detections.len(), 4);
    }

    #[tokio::test]
    async fn test_skips_do_not_break_failure_streak() {
        let frags = fragments(&["A", "A", "other", "A", "A", "A", "A"]);
        let analyzer = Scripted::new(|_| Reply::Fail);
        let orchestrator = BatchOrchestrator::new(analyzer.clone(), BatchConfig::default());

        let outcome = orchestrator.run(&windows(&frags), &FallacyCatalog::short()).await;

        assert_eq!(outcome.state, RunState::StoppedFailures);
        assert_eq!(analyzer.calls(), vec![0, 1, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_malformed_leaves_failure_counter_unchanged() {
        let frags = fragments(&["A"; 8]);
        // fail, fail, malformed, fail, fail, fail -> five consecutive failures
        let analyzer = Scripted::new(|idx| if idx == 2 { Reply::Malformed } else { Reply::Fail });
        let orchestrator = BatchOrchestrator::new(analyzer.clone(), BatchConfig::default());

        let outcome = orchestrator.run(&windows(&frags), &FallacyCatalog::short()).await;

        assert_eq!(outcome.state, RunState::StoppedFailures);
        assert_eq!(outcome.malformed, 1);
        assert_eq!(analyzer.calls(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_max_windows_ceiling() {
        let frags = fragments(&["A"; 6]);
        let analyzer = Scripted::new(|_| Reply::Found(0));
        let config = BatchConfig {
            max_windows: Some(3),
            ..BatchConfig::default()
        };

        let outcome = BatchOrchestrator::new(analyzer.clone(), config)
            .run(&windows(&frags), &FallacyCatalog::short())
            .await;

        assert_eq!(outcome.state, RunState::StoppedBudget);
        assert_eq!(analyzer.calls(), vec![0, 1, 2]);

        let config = BatchConfig {
            max_windows: Some(10),
            ..BatchConfig::default()
        };
        let outcome = BatchOrchestrator::new(Scripted::new(|_| Reply::Found(0)), config)
            .run(&windows(&frags), &FallacyCatalog::short())
            .await;
        assert_eq!(outcome.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_pause_between_windows() {
        let frags = fragments(&["A", "other", "A"]);
        let config = BatchConfig {
            pause: Duration::from_millis(20),
            ..BatchConfig::default()
        };
        let orchestrator = BatchOrchestrator::new(Scripted::new(|_| Reply::Found(0)), config);

        let started = Instant::now();
        orchestrator.run(&windows(&frags), &FallacyCatalog::short()).await;

        // Two pauses: after window 0 and after the skipped window 1.
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_no_windows() {
        let outcome = BatchOrchestrator::new(Scripted::new(|_| Reply::Fail), BatchConfig::default())
            .run(&[], &FallacyCatalog::short())
            .await;

        assert_eq!(outcome.state, RunState::Done);
        assert!(outcome.detections.is_empty());
    }
}
