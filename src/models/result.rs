use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::TestStats;
use super::status::{RunStatus, SuiteStatus};
use super::suite::SuiteId;
use super::counts::TestCounts;

/// A structured error extracted from tool output (`file:line:col message`
/// for lint/typecheck, failing test name + message for test runners).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
}

impl SuiteError {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Per-suite record. Owned exclusively by the runner while the suite is
/// live; snapshots are what consumers see. Immutable once terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub command: String,
    pub status: SuiteStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SuiteError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub stats: TestStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_test: Option<String>,
}

impl SuiteResult {
    pub fn new(command: String) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.status.advance(SuiteStatus::Running);
        self.started_at = Some(now);
    }

    /// Apply freshly parsed stats, keeping `progress` monotone.
    pub fn apply_stats(&mut self, stats: TestStats) {
        let floor = self.stats.progress;
        self.stats = stats;
        if self.stats.progress < floor {
            self.stats.progress = floor;
        }
    }

    pub fn finish(&mut self, status: SuiteStatus, error: Option<String>, now: DateTime<Utc>) {
        self.status.advance(status);
        if self.error.is_none() {
            self.error = error;
        }
        self.finished_at = Some(now);
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds().max(0) as u64);
        }
        self.current_test = None;
        self.stats.set_progress_complete();
    }
}

/// The fixed, named set of suite slots in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSet {
    pub lint: SuiteResult,
    pub build: SuiteResult,
    pub backend: SuiteResult,
    pub component_forms: SuiteResult,
    pub component_dashboard: SuiteResult,
}

impl SuiteSet {
    pub fn get(&self, id: SuiteId) -> &SuiteResult {
        match id {
            SuiteId::Lint => &self.lint,
            SuiteId::Build => &self.build,
            SuiteId::Backend => &self.backend,
            SuiteId::ComponentForms => &self.component_forms,
            SuiteId::ComponentDashboard => &self.component_dashboard,
        }
    }

    pub fn get_mut(&mut self, id: SuiteId) -> &mut SuiteResult {
        match id {
            SuiteId::Lint => &mut self.lint,
            SuiteId::Build => &mut self.build,
            SuiteId::Backend => &mut self.backend,
            SuiteId::ComponentForms => &mut self.component_forms,
            SuiteId::ComponentDashboard => &mut self.component_dashboard,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SuiteId, &SuiteResult)> {
        SuiteId::ALL.into_iter().map(move |id| (id, self.get(id)))
    }
}

/// Run-level aggregate: everything a consumer or the history store needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub overall_success: bool,
    pub suites: SuiteSet,
    pub overall: TestStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<TestCounts>,
}

impl RunResults {
    pub fn new(execution_id: String, timestamp: DateTime<Utc>) -> Self {
        let mut suites = SuiteSet::default();
        for id in SuiteId::ALL {
            suites.get_mut(id).command = id.default_command().to_string();
        }
        Self {
            execution_id,
            timestamp,
            status: RunStatus::Running,
            overall_success: false,
            suites,
            overall: TestStats::default(),
            counts: None,
        }
    }

    /// Recompute the overall aggregate: counts are summed across suites,
    /// overall progress is the weighted combination from the suite table.
    pub fn recompute_overall(&mut self) {
        let mut overall = TestStats::default();
        let mut progress = 0.0;
        for (id, suite) in self.suites.iter() {
            overall.total += suite.stats.total;
            overall.passed += suite.stats.passed;
            overall.failed += suite.stats.failed;
            overall.skipped += suite.stats.skipped;
            progress += suite.stats.progress * id.weight();
        }
        overall.recalc_pass_rate();
        overall.progress = progress.min(100.0);
        self.overall = overall;
    }

    /// Settle the run once every executed suite is terminal. Suites still
    /// `Pending` (blocked behind a failed gate, or outside a continuation
    /// subset) don't count against success but also can't grant it.
    pub fn finalize(&mut self, executed: &[SuiteId]) {
        self.recompute_overall();
        self.overall_success = !executed.is_empty()
            && executed
                .iter()
                .all(|id| self.suites.get(*id).status == SuiteStatus::Completed);
        self.status = if self.overall_success {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
    }
}
