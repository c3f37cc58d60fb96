//! Per-model outcomes and the batch report.

use super::error::{BatchError, PaletteLookupError};
use super::router::{ArtifactPlan, OutputFormat};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// File name of the report inside the output directory.
pub const REPORT_FILE: &str = "batch_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LoadError,
    BindError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    PaletteLookup,
}

/// Lifecycle of one model configuration.
///
/// `Pending -> Loading -> Bound -> Running -> Completed`, leaving early as
/// `Skipped`, `Cancelled` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum RunState {
    Pending,
    Loading,
    Bound,
    Running,
    Completed,
    Skipped(SkipReason),
    Cancelled,
    Failed(FailReason),
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Skipped(_) | Self::Cancelled | Self::Failed(_)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Loading => f.write_str("loading"),
            Self::Bound => f.write_str("bound"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Skipped(SkipReason::LoadError) => f.write_str("skipped (load error)"),
            Self::Skipped(SkipReason::BindError) => f.write_str("skipped (bind error)"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed(FailReason::PaletteLookup) => f.write_str("failed (palette lookup)"),
        }
    }
}

/// One written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub format: OutputFormat,
    pub path: PathBuf,
    pub seed: i32,
    pub counter: usize,
}

/// What happened to one model configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOutcome {
    name: String,
    state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    seeds: Vec<i32>,
    iterations_completed: usize,
    artifacts: Vec<ArtifactRecord>,
    persistence_failures: usize,
    #[serde(skip)]
    fatal: Option<PaletteLookupError>,
}

impl ModelOutcome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RunState::Pending,
            reason: None,
            seeds: Vec::new(),
            iterations_completed: 0,
            artifacts: Vec::new(),
            persistence_failures: 0,
            fatal: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Seeds used, one per started iteration.
    pub fn seeds(&self) -> &[i32] {
        &self.seeds
    }

    pub fn iterations_completed(&self) -> usize {
        self.iterations_completed
    }

    /// Number of artifacts written.
    pub fn artifacts(&self) -> usize {
        self.artifacts.len()
    }

    pub fn artifact_records(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    pub fn persistence_failures(&self) -> usize {
        self.persistence_failures
    }

    /// Why the model was skipped or failed.
    pub fn error(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub(crate) fn fatal(&self) -> Option<&PaletteLookupError> {
        self.fatal.as_ref()
    }

    pub(crate) fn transition(&mut self, state: RunState) {
        debug!(model = %self.name, from = %self.state, to = %state, "state change");
        self.state = state;
    }

    pub(crate) fn skip(&mut self, reason: SkipReason, err: &dyn std::error::Error) {
        warn!(model = %self.name, error = %err, "skipping model");
        self.reason = Some(err.to_string());
        self.transition(RunState::Skipped(reason));
    }

    pub(crate) fn fail(&mut self, err: PaletteLookupError) {
        self.reason = Some(err.to_string());
        self.fatal = Some(err);
        self.transition(RunState::Failed(FailReason::PaletteLookup));
    }

    pub(crate) fn begin_iteration(&mut self, seed: i32) {
        self.seeds.push(seed);
    }

    pub(crate) fn finish_iteration(&mut self) {
        self.iterations_completed += 1;
    }

    pub(crate) fn record(&mut self, plan: ArtifactPlan, seed: i32, counter: usize) {
        self.artifacts.push(ArtifactRecord {
            format: plan.format,
            path: plan.path,
            seed,
            counter,
        });
    }

    pub(crate) fn record_failure(&mut self) {
        self.persistence_failures += 1;
    }
}

/// Aggregated counts over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub models: usize,
    pub completed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub not_started: usize,
    pub artifacts: usize,
    pub persistence_failures: usize,
}

/// Outcomes in declaration order plus their summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub elapsed_ms: u64,
    pub outcomes: Vec<ModelOutcome>,
}

impl BatchReport {
    pub fn new(outcomes: Vec<ModelOutcome>, elapsed: Duration) -> Self {
        let mut summary = BatchSummary {
            models: outcomes.len(),
            ..BatchSummary::default()
        };
        for outcome in &outcomes {
            match outcome.state {
                RunState::Completed => summary.completed += 1,
                RunState::Skipped(_) => summary.skipped += 1,
                RunState::Cancelled => summary.cancelled += 1,
                RunState::Failed(_) => summary.failed += 1,
                _ => summary.not_started += 1,
            }
            summary.artifacts += outcome.artifacts();
            summary.persistence_failures += outcome.persistence_failures;
        }
        Self {
            summary,
            elapsed_ms: elapsed.as_millis() as u64,
            outcomes,
        }
    }

    /// Write `batch_report.json` into `dir`.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf, BatchError> {
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|source| BatchError::Report {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "wrote batch report");
        Ok(path)
    }
}
