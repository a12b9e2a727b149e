//! Consumer side of the event stream: a state machine that turns stream
//! messages into a render-coherent view without reacting to every byte.
//!
//! Rapid `test_progress` updates are coalesced (latest per suite) and
//! applied when the caller's debounce tick calls [`Dashboard::flush`];
//! suite completions, snapshots and stream errors apply immediately.
//! Every message carrying an execution id is fenced against the tracked
//! run so a stale stream can't mutate a newer run's state.

pub mod stream;
pub mod view;

use std::collections::HashMap;

use tracing::debug;

use crate::models::{
    LiveUpdate, RunStatus, StreamMessage, SuiteId, SuiteStatus, TestStats,
};

/// What the dashboard knows about one suite.
#[derive(Debug, Clone, Default)]
pub struct SuiteView {
    pub status: SuiteStatus,
    pub stats: TestStats,
    pub current_test: Option<String>,
    /// Concrete reason for a non-running suite: the failure message, or
    /// "blocked by quality gate failure" for suites that never started.
    pub reason: Option<String>,
}

/// One entry in the "issues need attention" panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureItem {
    pub suite: SuiteId,
    pub excerpt: String,
}

const EXCERPT_LEN: usize = 140;

pub struct Dashboard {
    execution_id: Option<String>,
    pub connected: bool,
    pub run_status: Option<RunStatus>,
    pub overall: TestStats,
    pub failures: Vec<FailureItem>,
    pub stream_error: Option<String>,
    pub complete: bool,
    suites: HashMap<SuiteId, SuiteView>,
    pending: HashMap<SuiteId, LiveUpdate>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            execution_id: None,
            connected: false,
            run_status: None,
            overall: TestStats::default(),
            failures: Vec::new(),
            stream_error: None,
            complete: false,
            suites: SuiteId::ALL
                .into_iter()
                .map(|id| (id, SuiteView::default()))
                .collect(),
            pending: HashMap::new(),
        }
    }

    pub fn suite(&self, id: SuiteId) -> &SuiteView {
        &self.suites[&id]
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    /// Pin the dashboard to a run. Messages for any other execution id are
    /// discarded from here on. Tracking a new id resets all view state.
    pub fn track(&mut self, execution_id: String) {
        if self.execution_id.as_deref() == Some(execution_id.as_str()) {
            return;
        }
        *self = Self::new();
        self.execution_id = Some(execution_id);
    }

    /// Feed one stream message. Returns true when the view changed and a
    /// render is warranted now; coalesced progress waits for [`flush`].
    pub fn ingest(&mut self, message: StreamMessage) -> bool {
        if let StreamMessage::ConnectionEstablished { execution_id, .. } = &message {
            self.track(execution_id.clone());
        }

        if self.is_stale(&message) {
            debug!(
                message_id = ?message.execution_id(),
                current = ?self.execution_id,
                "discarding stale stream message"
            );
            return false;
        }

        match message {
            StreamMessage::Heartbeat { .. } => false,
            StreamMessage::TestProgress { update } => {
                self.pending.insert(update.suite, update);
                false
            }
            critical => {
                // Apply anything still buffered first so ordering holds.
                self.flush();
                self.apply(critical);
                true
            }
        }
    }

    /// Apply the coalesced progress buffer. Returns true if anything was
    /// applied. Called from the consumer's debounce tick.
    pub fn flush(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let updates: Vec<LiveUpdate> = self.pending.drain().map(|(_, u)| u).collect();
        for update in updates {
            self.apply_update(update, false);
        }
        true
    }

    /// Weighted overall completion percentage, per the suite weight table.
    pub fn overall_progress(&self) -> f64 {
        SuiteId::ALL
            .into_iter()
            .map(|id| self.suites[&id].stats.progress * id.weight())
            .sum::<f64>()
            .min(100.0)
    }

    fn is_stale(&self, message: &StreamMessage) -> bool {
        match (message.execution_id(), self.execution_id.as_deref()) {
            (Some(id), Some(current)) => id != current,
            _ => false,
        }
    }

    fn apply(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::ConnectionEstablished { .. } => {
                self.connected = true;
            }
            StreamMessage::SuiteComplete { update } => {
                self.apply_update(update, true);
            }
            StreamMessage::Snapshot { results } => {
                self.run_status = Some(results.status);
                self.overall = results.overall;
                self.failures.clear();
                for (id, suite) in results.suites.iter() {
                    let view = self.suites.entry(id).or_default();
                    view.status = suite.status;
                    view.stats = suite.stats;
                    view.current_test = suite.current_test.clone();
                    view.reason = suite.error.clone();

                    if suite.status == SuiteStatus::Failed {
                        if suite.errors.is_empty() {
                            let excerpt = suite.error.clone().unwrap_or_else(|| "failed".into());
                            self.failures.push(FailureItem {
                                suite: id,
                                excerpt: truncate(&excerpt, EXCERPT_LEN),
                            });
                        }
                        for error in &suite.errors {
                            self.failures.push(FailureItem {
                                suite: id,
                                excerpt: truncate(&error.message, EXCERPT_LEN),
                            });
                        }
                    }
                }
                self.overall.progress = self.overall_progress();
            }
            StreamMessage::StreamComplete { .. } => {
                self.complete = true;
            }
            StreamMessage::StreamError { message } => {
                self.stream_error = Some(message);
                self.complete = true;
            }
            // Handled before apply().
            StreamMessage::Heartbeat { .. } | StreamMessage::TestProgress { .. } => {}
        }
    }

    fn apply_update(&mut self, update: LiveUpdate, terminal: bool) {
        {
            let view = self.suites.entry(update.suite).or_default();
            let floor = view.stats.progress;
            view.stats = update.stats;
            if view.stats.progress < floor {
                view.stats.progress = floor;
            }
            if terminal {
                let status = if update.stats.failed > 0 {
                    SuiteStatus::Failed
                } else {
                    SuiteStatus::Completed
                };
                view.status.advance(status);
                view.current_test = None;
            } else {
                view.status.advance(SuiteStatus::Running);
                view.current_test = update.current_test;
            }
        }
        self.overall = update.overall;
        self.overall.progress = self.overall_progress();
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    }
}
