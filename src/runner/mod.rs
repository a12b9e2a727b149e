pub mod process;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::counter;
use crate::history::HistoryStore;
use crate::models::{
    LiveUpdate, RunResults, StreamMessage, SuiteId, SuiteResult, SuiteStatus, TestCounts,
};
use crate::parser;
use process::{ExitKind, ProcessTracker};

/// Interval at which a running suite's accumulated output is re-parsed
/// for interim progress reporting.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Annotation for suites that never started because a gate failed.
const BLOCKED_BY_GATE: &str = "blocked by quality gate failure";

/// Continuation options for a run. The default is a full run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunOptions {
    /// Re-run only the suites that failed (or never completed) in the most
    /// recent persisted run; everything else keeps its prior result.
    pub only_failed: bool,
    /// Explicit subset of suites to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suites: Option<Vec<SuiteId>>,
    /// Skip the lint/build gates entirely.
    pub skip_gates: bool,
    /// Reuse the previous run's test counts instead of re-scanning, so a
    /// subset re-run keeps its known denominators.
    pub reuse_counts: bool,
}

/// What `GET /api/runs` reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_execution_id: Option<String>,
}

#[derive(Default)]
struct RunState {
    running: bool,
    execution_id: Option<String>,
    cancel: Option<watch::Sender<bool>>,
    tracker: Option<Arc<ProcessTracker>>,
    task: Option<JoinHandle<()>>,
}

/// Owns all mutable run state. At most one run is live at a time;
/// starting a new run tears the previous one down first. `start`,
/// `abort` and `status` are the only entry points.
pub struct Orchestrator {
    workspace: PathBuf,
    config: Arc<Config>,
    history: HistoryStore,
    events: broadcast::Sender<StreamMessage>,
    inner: tokio::sync::Mutex<RunState>,
}

impl Orchestrator {
    pub fn new(workspace: PathBuf, config: Arc<Config>) -> Arc<Self> {
        let history = HistoryStore::new(&workspace, &config.reports.dir);
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            workspace,
            config,
            history,
            events,
            inner: tokio::sync::Mutex::new(RunState::default()),
        })
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> StatusInfo {
        let state = self.inner.lock().await;
        StatusInfo {
            is_running: state.running,
            current_execution_id: state.execution_id.clone(),
        }
    }

    /// Begin a new run and return its execution id. Any run already in
    /// flight is aborted first; its processes are force-terminated before
    /// the new run's task is spawned.
    pub async fn start(self: &Arc<Self>, options: RunOptions) -> Result<String> {
        let plan = self.plan(&options)?;

        let mut state = self.inner.lock().await;
        if state.running {
            warn!("a run is already active; superseding it");
            cancel_run(&mut state);
        }

        let execution_id = new_execution_id(Utc::now());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let tracker = Arc::new(ProcessTracker::default());

        state.running = true;
        state.execution_id = Some(execution_id.clone());
        state.cancel = Some(cancel_tx);
        state.tracker = Some(Arc::clone(&tracker));

        info!(execution_id = %execution_id, suites = ?plan, "starting run");
        let this = Arc::clone(self);
        let id = execution_id.clone();
        state.task = Some(tokio::spawn(async move {
            this.run_loop(id, options, plan, cancel_rx, tracker).await;
        }));

        Ok(execution_id)
    }

    /// Stop the active run: cancel every suite, force-kill tracked
    /// process groups, and let the run task settle its final record.
    /// Returns false when nothing was running.
    pub async fn abort(&self) -> bool {
        let mut state = self.inner.lock().await;
        if !state.running {
            return false;
        }
        info!(execution_id = ?state.execution_id, "aborting run");
        cancel_run(&mut state);
        true
    }

    /// Abort only if the given run is still the active one. Used by the
    /// stream host when a client disconnects, so a stale stream can't
    /// tear down a newer run.
    pub async fn abort_if_current(&self, execution_id: &str) -> bool {
        let mut state = self.inner.lock().await;
        if !state.running || state.execution_id.as_deref() != Some(execution_id) {
            return false;
        }
        info!(execution_id = %execution_id, "stream consumer gone; aborting run");
        cancel_run(&mut state);
        true
    }

    async fn run_loop(
        self: Arc<Self>,
        execution_id: String,
        options: RunOptions,
        plan: Vec<SuiteId>,
        cancelled: watch::Receiver<bool>,
        tracker: Arc<ProcessTracker>,
    ) {
        let results = Arc::new(Mutex::new(RunResults::new(
            execution_id.clone(),
            Utc::now(),
        )));

        if let Err(err) = self
            .drive(&execution_id, &options, &plan, cancelled, tracker, &results)
            .await
        {
            // Run-level failures become a terminal failed record instead of
            // an unhandled error.
            error!(execution_id = %execution_id, error = %err, "run failed internally");
            let snapshot = {
                let mut r = results.lock().unwrap();
                r.finalize(&[]);
                r.clone()
            };
            if let Err(persist_err) = self.history.write(&snapshot) {
                error!(error = %persist_err, "failed to persist failed run record");
            }
            self.emit(StreamMessage::Snapshot { results: snapshot });
            self.emit(StreamMessage::StreamError {
                message: format!("{err:#}"),
            });
        }

        self.emit(StreamMessage::StreamComplete {
            execution_id: execution_id.clone(),
            timestamp: Utc::now(),
        });

        // Clear run state, unless a newer run has already taken over.
        let mut state = self.inner.lock().await;
        if state.execution_id.as_deref() == Some(execution_id.as_str()) {
            *state = RunState::default();
        }
    }

    async fn drive(
        &self,
        execution_id: &str,
        options: &RunOptions,
        plan: &[SuiteId],
        cancelled: watch::Receiver<bool>,
        tracker: Arc<ProcessTracker>,
        results: &Arc<Mutex<RunResults>>,
    ) -> Result<()> {
        let prior = if options.only_failed || options.reuse_counts {
            self.history.load_latest().unwrap_or_else(|err| {
                warn!(error = %err, "could not load prior run record");
                None
            })
        } else {
            None
        };

        {
            let mut r = results.lock().unwrap();
            for id in SuiteId::ALL {
                if options.only_failed
                    && !plan.contains(&id)
                    && let Some(prior) = &prior
                {
                    // Keep the prior result visible for suites this
                    // continuation doesn't touch.
                    *r.suites.get_mut(id) = prior.suites.get(id).clone();
                } else {
                    r.suites.get_mut(id).command = self.config.command_for(id);
                }
            }
        }

        let counts = self.obtain_counts(options, prior.as_ref()).await;
        {
            let mut r = results.lock().unwrap();
            r.counts = Some(counts);
            r.recompute_overall();
        }
        self.emit_snapshot(results);

        let mut executed: Vec<SuiteId> = Vec::new();

        for gate in SuiteId::GATES {
            if !plan.contains(&gate) {
                continue;
            }
            executed.push(gate);
            let passed = self
                .run_suite(
                    gate,
                    execution_id,
                    results,
                    Arc::clone(&tracker),
                    cancelled.clone(),
                )
                .await?;
            if !passed {
                warn!(gate = %gate, "quality gate failed; remaining suites will not start");
                let snapshot = {
                    let mut r = results.lock().unwrap();
                    for id in plan {
                        let slot = r.suites.get_mut(*id);
                        if !slot.status.is_terminal() && slot.started_at.is_none() {
                            slot.error = Some(BLOCKED_BY_GATE.to_string());
                        }
                    }
                    r.finalize(&executed);
                    r.clone()
                };
                self.history.write(&snapshot)?;
                self.emit(StreamMessage::Snapshot { results: snapshot });
                return Ok(());
            }
        }

        let selected: Vec<SuiteId> = SuiteId::TEST_SUITES
            .into_iter()
            .filter(|id| plan.contains(id))
            .collect();
        executed.extend(&selected);

        let outcomes = futures_util::future::join_all(selected.iter().map(|suite| {
            self.run_suite(
                *suite,
                execution_id,
                results,
                Arc::clone(&tracker),
                cancelled.clone(),
            )
        }))
        .await;
        for outcome in outcomes {
            outcome?;
        }

        let snapshot = {
            let mut r = results.lock().unwrap();
            r.finalize(&executed);
            r.clone()
        };
        self.history.write(&snapshot)?;
        info!(
            execution_id = %execution_id,
            success = snapshot.overall_success,
            "run finished"
        );
        self.emit(StreamMessage::Snapshot { results: snapshot });
        Ok(())
    }

    /// Resolve the suites this run will actually execute.
    fn plan(&self, options: &RunOptions) -> Result<Vec<SuiteId>> {
        let mut plan: Vec<SuiteId> = match &options.suites {
            Some(subset) => SuiteId::ALL
                .into_iter()
                .filter(|id| subset.contains(id))
                .collect(),
            None => SuiteId::ALL.to_vec(),
        };
        if options.only_failed
            && let Ok(Some(prior)) = self.history.load_latest()
        {
            plan.retain(|id| prior.suites.get(*id).status != SuiteStatus::Completed);
        }
        if options.skip_gates {
            plan.retain(|id| !id.is_gate());
        }
        if plan.is_empty() {
            anyhow::bail!("nothing to run: every selected suite already completed");
        }
        Ok(plan)
    }

    async fn obtain_counts(&self, options: &RunOptions, prior: Option<&RunResults>) -> TestCounts {
        if options.reuse_counts
            && let Some(counts) = prior.and_then(|p| p.counts.clone())
        {
            debug!("reusing prior run's test counts");
            return counts;
        }
        let workspace = self.workspace.clone();
        let scan_config = self.config.scan.clone();
        match tokio::task::spawn_blocking(move || counter::scan(&workspace, &scan_config)).await {
            Ok(counts) => counts,
            Err(err) => {
                // Scan task panicked; re-scan inline rather than running
                // the suites without denominators.
                error!(error = %err, "test scan task failed");
                counter::scan(&self.workspace, &self.config.scan)
            }
        }
    }

    /// Execute one suite to its terminal state. Returns whether it
    /// completed successfully. `Err` is reserved for internal failures;
    /// tool failures, timeouts and aborts all land in the suite record.
    async fn run_suite(
        &self,
        suite: SuiteId,
        execution_id: &str,
        results: &Arc<Mutex<RunResults>>,
        tracker: Arc<ProcessTracker>,
        cancelled: watch::Receiver<bool>,
    ) -> Result<bool> {
        if *cancelled.borrow() {
            let mut r = results.lock().unwrap();
            r.suites.get_mut(suite).finish(
                SuiteStatus::Failed,
                Some("run aborted".to_string()),
                Utc::now(),
            );
            return Ok(false);
        }

        let command = self.config.command_for(suite);
        let timeout = self.config.timeout_for(suite);
        let expected = {
            let r = results.lock().unwrap();
            r.counts.as_ref().and_then(|c| c.expected_for(suite))
        };

        {
            let mut r = results.lock().unwrap();
            let slot = r.suites.get_mut(suite);
            *slot = SuiteResult::new(command.clone());
            slot.begin(Utc::now());
            r.recompute_overall();
        }
        self.emit_progress(suite, results, execution_id, false);

        let buffer = Arc::new(Mutex::new(String::new()));
        let outcome = {
            let supervise = process::supervise(
                suite,
                &command,
                &self.workspace,
                timeout,
                Arc::clone(&buffer),
                tracker,
                cancelled,
            );
            tokio::pin!(supervise);
            let mut poll = tokio::time::interval(POLL_INTERVAL);
            poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    outcome = &mut supervise => break outcome,
                    _ = poll.tick() => {
                        let raw = buffer.lock().unwrap().clone();
                        let parsed = parser::parse(&raw, suite.kind(), None, expected);
                        {
                            let mut r = results.lock().unwrap();
                            let slot = r.suites.get_mut(suite);
                            slot.apply_stats(parsed.stats);
                            slot.current_test = parsed.current_test;
                            r.recompute_overall();
                        }
                        self.emit_progress(suite, results, execution_id, false);
                    }
                }
            }
        };

        let raw = buffer.lock().unwrap().clone();
        let (status, error, exit_code) = match outcome {
            Ok(ExitKind::Exited(0)) => (SuiteStatus::Completed, None, 0),
            Ok(ExitKind::Exited(code)) => (
                SuiteStatus::Failed,
                Some(format!("{} exited with code {code}", suite.label())),
                code,
            ),
            Ok(ExitKind::TimedOut) => (
                SuiteStatus::Failed,
                Some(format!(
                    "terminated after exceeding the {}s timeout",
                    timeout.as_secs()
                )),
                -1,
            ),
            Ok(ExitKind::Cancelled) => (
                SuiteStatus::Failed,
                Some("run aborted before the suite finished".to_string()),
                -1,
            ),
            Err(err) => (
                SuiteStatus::Failed,
                Some(format!("failed to start: {err:#}")),
                -1,
            ),
        };

        let parsed = parser::parse(&raw, suite.kind(), Some(exit_code), expected);
        let snapshot = {
            let mut r = results.lock().unwrap();
            let slot = r.suites.get_mut(suite);
            slot.output = raw;
            slot.apply_stats(parsed.stats);
            slot.errors = parsed.errors;
            slot.finish(status, error, Utc::now());
            r.recompute_overall();
            r.clone()
        };

        // Incremental latest record so a crash or reload can recover.
        if let Err(err) = self.history.write_latest(&snapshot) {
            warn!(error = %err, "failed to refresh latest run record");
        }
        self.emit_progress(suite, results, execution_id, true);
        self.emit(StreamMessage::Snapshot { results: snapshot });

        Ok(status == SuiteStatus::Completed)
    }

    fn emit(&self, message: StreamMessage) {
        let _ = self.events.send(message);
    }

    fn emit_snapshot(&self, results: &Arc<Mutex<RunResults>>) {
        let snapshot = results.lock().unwrap().clone();
        self.emit(StreamMessage::Snapshot { results: snapshot });
    }

    fn emit_progress(
        &self,
        suite: SuiteId,
        results: &Arc<Mutex<RunResults>>,
        execution_id: &str,
        complete: bool,
    ) {
        let update = {
            let r = results.lock().unwrap();
            let slot = r.suites.get(suite);
            LiveUpdate {
                suite,
                current_test: slot.current_test.clone(),
                stats: slot.stats,
                overall: r.overall,
                timestamp: Utc::now(),
                execution_id: execution_id.to_string(),
            }
        };
        self.emit(if complete {
            StreamMessage::SuiteComplete { update }
        } else {
            StreamMessage::TestProgress { update }
        });
    }
}

/// Tear down the active run's resources. Caller holds the state lock.
fn cancel_run(state: &mut RunState) {
    if let Some(cancel) = state.cancel.take() {
        let _ = cancel.send(true);
    }
    if let Some(tracker) = state.tracker.take() {
        tracker.kill_all();
    }
    state.running = false;
    state.execution_id = None;
    state.task = None;
}

/// Unique per run: start-time stamp plus a random suffix for collision
/// avoidance. The leading stamp keeps persisted records sortable.
fn new_execution_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.format("%Y%m%d-%H%M%S"), &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuiteOverride;
    use crate::models::RunStatus;

    /// Build a config whose five suites run tiny shell commands with
    /// realistic captured output; `overrides` replace individual suites.
    fn test_config(overrides: &[(SuiteId, &str)]) -> Config {
        let mut config = Config::default();
        let all_pass: [(SuiteId, &str); 5] = [
            (SuiteId::Lint, "sh -c 'echo clean; exit 0'"),
            (SuiteId::Build, "sh -c 'exit 0'"),
            (
                SuiteId::Backend,
                "sh -c 'printf \" Tests  4 passed (4)\\n\"; exit 0'",
            ),
            (
                SuiteId::ComponentForms,
                "sh -c 'printf \"  3 passing (1s)\\n\"; exit 0'",
            ),
            (
                SuiteId::ComponentDashboard,
                "sh -c 'printf \"  2 passing (1s)\\n\"; exit 0'",
            ),
        ];
        for (suite, command) in all_pass.iter().chain(overrides) {
            *suite_slot(&mut config, *suite) = Some(SuiteOverride {
                command: Some(command.to_string()),
                timeout_secs: None,
            });
        }
        config
    }

    fn suite_slot(config: &mut Config, suite: SuiteId) -> &mut Option<SuiteOverride> {
        match suite {
            SuiteId::Lint => &mut config.suites.lint,
            SuiteId::Build => &mut config.suites.build,
            SuiteId::Backend => &mut config.suites.backend,
            SuiteId::ComponentForms => &mut config.suites.component_forms,
            SuiteId::ComponentDashboard => &mut config.suites.component_dashboard,
        }
    }

    async fn run_to_completion(orchestrator: &Arc<Orchestrator>, options: RunOptions) -> String {
        let mut rx = orchestrator.subscribe();
        let execution_id = orchestrator.start(options).await.unwrap();
        wait_for_stream_complete(&mut rx, &execution_id, Duration::from_secs(30)).await;
        execution_id
    }

    async fn wait_for_stream_complete(
        rx: &mut broadcast::Receiver<StreamMessage>,
        execution_id: &str,
        deadline: Duration,
    ) {
        tokio::time::timeout(deadline, async {
            loop {
                match rx.recv().await {
                    Ok(StreamMessage::StreamComplete {
                        execution_id: id, ..
                    }) if id == execution_id => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
        .await
        .expect("run did not finish in time");
    }

    #[tokio::test]
    async fn test_full_success_persists_matching_latest() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(&[]));
        let orchestrator = Orchestrator::new(dir.path().to_path_buf(), config);

        let execution_id = run_to_completion(&orchestrator, RunOptions::default()).await;

        let latest = orchestrator.history().load_latest().unwrap().unwrap();
        assert_eq!(latest.execution_id, execution_id);
        assert_eq!(latest.status, RunStatus::Completed);
        assert!(latest.overall_success);
        for suite in SuiteId::ALL {
            assert_eq!(latest.suites.get(suite).status, SuiteStatus::Completed);
        }
        assert_eq!(latest.suites.backend.stats.passed, 4);
        assert_eq!(latest.overall.progress, 100.0);

        // The timestamped record is the same snapshot as latest.json.
        let by_id = orchestrator.history().load(&execution_id).unwrap();
        assert_eq!(
            serde_json::to_string(&by_id).unwrap(),
            serde_json::to_string(&latest).unwrap()
        );

        let status = orchestrator.status().await;
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_gate_failure_blocks_test_suites() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(&[(
            SuiteId::Lint,
            "sh -c 'printf \"x 2 problems (1 error, 1 warning)\\n\"; exit 1'",
        )]));
        let orchestrator = Orchestrator::new(dir.path().to_path_buf(), config);

        run_to_completion(&orchestrator, RunOptions::default()).await;

        let latest = orchestrator.history().load_latest().unwrap().unwrap();
        assert_eq!(latest.status, RunStatus::Failed);
        assert_eq!(latest.suites.lint.status, SuiteStatus::Failed);
        // Lint fails first, so build and the test suites never spawn.
        assert!(latest.suites.build.started_at.is_none());
        for suite in SuiteId::TEST_SUITES {
            let slot = latest.suites.get(suite);
            assert_eq!(slot.status, SuiteStatus::Pending);
            assert!(slot.started_at.is_none());
            assert_eq!(slot.error.as_deref(), Some(BLOCKED_BY_GATE));
        }
    }

    #[tokio::test]
    async fn test_timeout_marks_suite_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&[]);
        *suite_slot(&mut config, SuiteId::Backend) = Some(SuiteOverride {
            command: Some("sleep 60".to_string()),
            timeout_secs: Some(1),
        });
        let orchestrator = Orchestrator::new(dir.path().to_path_buf(), Arc::new(config));

        run_to_completion(&orchestrator, RunOptions::default()).await;

        let latest = orchestrator.history().load_latest().unwrap().unwrap();
        assert_eq!(latest.suites.backend.status, SuiteStatus::Failed);
        assert!(
            latest
                .suites
                .backend
                .error
                .as_deref()
                .unwrap()
                .contains("timeout")
        );
        assert_eq!(latest.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_continuation_only_failed_reruns_failed_suite_only() {
        let dir = tempfile::tempdir().unwrap();

        // First run: backend fails, everything else passes.
        let config = Arc::new(test_config(&[(
            SuiteId::Backend,
            "sh -c 'printf \" Tests  1 failed | 3 passed (4)\\n\"; exit 1'",
        )]));
        let orchestrator = Orchestrator::new(dir.path().to_path_buf(), config);
        run_to_completion(&orchestrator, RunOptions::default()).await;
        let first = orchestrator.history().load_latest().unwrap().unwrap();
        assert_eq!(first.suites.backend.status, SuiteStatus::Failed);
        let forms_finished_at = first.suites.component_forms.finished_at;
        assert!(forms_finished_at.is_some());

        // Continuation with a now-passing backend.
        let config = Arc::new(test_config(&[]));
        let orchestrator = Orchestrator::new(dir.path().to_path_buf(), config);
        run_to_completion(
            &orchestrator,
            RunOptions {
                only_failed: true,
                reuse_counts: true,
                ..RunOptions::default()
            },
        )
        .await;

        let second = orchestrator.history().load_latest().unwrap().unwrap();
        assert_eq!(second.suites.backend.status, SuiteStatus::Completed);
        // The passing suites were seeded from the prior record, not re-run.
        assert_eq!(second.suites.component_forms.finished_at, forms_finished_at);
        assert_eq!(second.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_explicit_subset_skips_other_suites() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(&[]));
        let orchestrator = Orchestrator::new(dir.path().to_path_buf(), config);

        run_to_completion(
            &orchestrator,
            RunOptions {
                suites: Some(vec![SuiteId::Backend]),
                skip_gates: true,
                ..RunOptions::default()
            },
        )
        .await;

        let latest = orchestrator.history().load_latest().unwrap().unwrap();
        assert_eq!(latest.suites.backend.status, SuiteStatus::Completed);
        assert_eq!(latest.suites.lint.status, SuiteStatus::Pending);
        assert_eq!(latest.suites.component_forms.status, SuiteStatus::Pending);
        assert_eq!(latest.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_abort_terminates_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(&[(SuiteId::Backend, "sleep 60")]));
        let orchestrator = Orchestrator::new(dir.path().to_path_buf(), config);

        let mut rx = orchestrator.subscribe();
        let execution_id = orchestrator.start(RunOptions::default()).await.unwrap();

        // Let the gates pass and the backend suite start, then pull the plug.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(orchestrator.abort().await);

        wait_for_stream_complete(&mut rx, &execution_id, Duration::from_secs(15)).await;

        let status = orchestrator.status().await;
        assert!(!status.is_running);
        // A second abort has nothing to do.
        assert!(!orchestrator.abort().await);
    }

    #[test]
    fn test_execution_id_shape() {
        let now: DateTime<Utc> = "2026-08-05T10:15:00Z".parse().unwrap();
        let id = new_execution_id(now);
        assert!(id.starts_with("20260805-101500-"));
        assert_eq!(id.len(), "20260805-101500-".len() + 6);

        // Random suffix keeps same-second runs distinct.
        assert_ne!(id, new_execution_id(now));
    }
}
