//! Time-bounded analysis requests with retry.
//!
//! The scheduler is the only way the rest of the crate talks to the engine.
//! Every request is bounded by a depth-scaled timeout, a search that runs
//! over is stopped and its partial lines are used, and an engine that died
//! or stalled is replaced before the next request. Requests never fail: an
//! empty result means the position could not be evaluated.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::engine::{check_fen_text, EngineError, EngineSession, SessionState};
use crate::interpreter::EngineLine;

/// Timeout scaling and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub base_timeout: Duration,
    pub per_depth: Duration,
    pub max_timeout: Duration,
    /// Depth removed on each retry.
    pub depth_decrement: u32,
    /// Retries never go below this depth, or the requested depth if lower.
    pub min_depth: u32,
    pub max_attempts: u32,
    /// Consecutive empty results after which the engine is restarted
    /// before the next attempt.
    pub restart_after_failures: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_millis(15_000),
            per_depth: Duration::from_millis(2_000),
            max_timeout: Duration::from_millis(60_000),
            depth_decrement: 4,
            min_depth: 8,
            max_attempts: 3,
            restart_after_failures: 1,
        }
    }
}

impl SchedulerConfig {
    /// Time allowed for one search to `depth`. Never decreases with depth.
    pub fn timeout_for_depth(&self, depth: u32) -> Duration {
        self.base_timeout
            .saturating_add(self.per_depth.saturating_mul(depth))
            .min(self.max_timeout)
    }

    /// Depth used for the given 1-based attempt.
    pub fn retry_depth(&self, requested: u32, attempt: u32) -> u32 {
        if attempt <= 1 {
            return requested;
        }
        let floor = self.min_depth.min(requested);
        requested
            .saturating_sub(self.depth_decrement.saturating_mul(attempt - 1))
            .max(floor)
    }
}

/// Serializes analysis requests onto one engine session.
pub struct AnalysisScheduler {
    session: Mutex<EngineSession>,
    config: SchedulerConfig,
}

impl AnalysisScheduler {
    pub fn new(session: EngineSession, config: SchedulerConfig) -> Self {
        Self {
            session: Mutex::new(session),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Starts the engine ahead of the first request.
    pub async fn start(&self) -> Result<(), EngineError> {
        self.session.lock().await.start().await
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn engine_name(&self) -> Option<String> {
        self.session.lock().await.engine_name().map(str::to_string)
    }

    /// Evaluates `fen` once, within the timeout for `depth`.
    ///
    /// Returns the lines of a completed search, the partial lines of a
    /// search that ran out of time, or nothing when the engine failed or
    /// `fen` cannot be sent to it.
    pub async fn evaluate(&self, fen: &str, depth: u32) -> Vec<EngineLine> {
        if !sendable(fen) {
            return Vec::new();
        }
        let mut session = self.session.lock().await;
        self.evaluate_locked(&mut session, fen, depth.max(1)).await
    }

    /// Evaluates `fen`, retrying at reduced depth while results are empty.
    pub async fn evaluate_with_retry(
        &self,
        fen: &str,
        depth: u32,
        max_attempts: u32,
    ) -> Vec<EngineLine> {
        if !sendable(fen) {
            return Vec::new();
        }
        let depth = depth.max(1);
        let max_attempts = max_attempts.max(1);
        let restart_after = self.config.restart_after_failures.max(1);

        let mut session = self.session.lock().await;
        let mut failures = 0;

        for attempt in 1..=max_attempts {
            if failures >= restart_after {
                if let Err(e) = session.restart().await {
                    warn!(error = %e, attempt, "Engine restart before retry failed");
                }
            }

            let attempt_depth = self.config.retry_depth(depth, attempt);
            let lines = self.evaluate_locked(&mut session, fen, attempt_depth).await;
            if !lines.is_empty() {
                if attempt > 1 {
                    info!(fen, attempt, depth = attempt_depth, "Evaluation succeeded on retry");
                }
                return lines;
            }

            failures += 1;
            warn!(fen, attempt, max_attempts, depth = attempt_depth, "Evaluation returned no lines");
        }

        error!(fen, depth, "Position could not be evaluated");
        Vec::new()
    }

    /// Resets engine state between games. Failures only mark the session
    /// for a restart on the next request.
    pub async fn new_game(&self) {
        let mut session = self.session.lock().await;
        if !session.is_alive() {
            return;
        }
        if let Err(e) = session.new_game().await {
            warn!(error = %e, "Engine did not acknowledge new game");
        }
    }

    pub async fn restart(&self) -> Result<(), EngineError> {
        self.session.lock().await.restart().await
    }

    pub async fn shutdown(&self) {
        self.session.lock().await.shutdown().await;
    }

    async fn evaluate_locked(
        &self,
        session: &mut EngineSession,
        fen: &str,
        depth: u32,
    ) -> Vec<EngineLine> {
        if !session.is_alive() {
            if let Err(e) = session.restart().await {
                error!(error = %e, fen, "Engine could not be started");
                return Vec::new();
            }
        }

        let budget = self.config.timeout_for_depth(depth);
        match timeout(budget, session.submit_analysis(fen, depth)).await {
            Ok(Ok(lines)) => lines,
            Ok(Err(e)) => {
                warn!(error = %e, fen, depth, "Analysis failed");
                Vec::new()
            }
            Err(_) => {
                warn!(fen, depth, budget = ?budget, "Analysis timed out, stopping search");
                let partial = session.stop().await;
                debug!(fen, lines = partial.len(), state = %session.state(), "Stopped search");
                partial
            }
        }
    }
}

fn sendable(fen: &str) -> bool {
    match check_fen_text(fen) {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Refusing to analyze position");
            false
        }
    }
}
