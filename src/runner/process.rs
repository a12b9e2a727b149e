use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::SuiteId;

/// Grace period between SIGTERM and SIGKILL when tearing a process down.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How a supervised suite process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Process exited on its own; carries the exit code (-1 if killed by a
    /// signal outside our control).
    Exited(i32),
    /// Hard timeout fired; the process was force-terminated.
    TimedOut,
    /// The run-wide cancellation signal fired; the process was terminated.
    Cancelled,
}

/// Live child-process groups for the active run, so an abort can take all
/// of them down at once. Insert/remove happen on every exit path; removal
/// is idempotent.
#[derive(Default)]
pub struct ProcessTracker {
    groups: Mutex<HashMap<SuiteId, u32>>,
}

impl ProcessTracker {
    fn insert(&self, suite: SuiteId, pgid: u32) {
        self.groups.lock().unwrap().insert(suite, pgid);
    }

    fn remove(&self, suite: SuiteId) {
        self.groups.lock().unwrap().remove(&suite);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.lock().unwrap().is_empty()
    }

    /// Force-kill every tracked process group. Used when a run is aborted
    /// or superseded; the per-suite supervisors observe the exits and
    /// clean up their own tracking entries.
    pub fn kill_all(&self) {
        let groups: Vec<(SuiteId, u32)> = self
            .groups
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect();
        for (suite, pgid) in groups {
            debug!(suite = %suite, pgid, "force-killing suite process group");
            kill_group(pgid, true);
        }
    }
}

/// Guard that kills the child process (and its entire process group) on
/// drop, so an aborted run task can't leave orphans behind.
struct ChildGuard {
    child: tokio::process::Child,
    /// Process group ID saved at spawn time so we can kill the whole group.
    #[cfg(unix)]
    pgid: Option<u32>,
}

impl ChildGuard {
    fn new(child: tokio::process::Child) -> Self {
        #[cfg(unix)]
        let pgid = child.id();
        Self {
            child,
            #[cfg(unix)]
            pgid,
        }
    }

    fn pgid(&self) -> Option<u32> {
        #[cfg(unix)]
        {
            self.pgid
        }
        #[cfg(not(unix))]
        {
            self.child.id()
        }
    }

    /// SIGTERM the group, give it a grace period, then SIGKILL whatever is
    /// left. Waits until the direct child is reaped.
    async fn terminate(&mut self) {
        if let Some(pgid) = self.pgid() {
            kill_group(pgid, false);
        }
        if tokio::time::timeout(KILL_GRACE, self.child.wait())
            .await
            .is_err()
        {
            if let Some(pgid) = self.pgid() {
                kill_group(pgid, true);
            }
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        // Kill the entire process group so tool worker processes don't
        // become orphans if this future is dropped mid-run.
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            kill_group(pgid, true);
        }
        let _ = self.child.start_kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32, force: bool) {
    let sig = if force { libc::SIGKILL } else { libc::SIGTERM };
    unsafe { libc::kill(-(pgid as libc::pid_t), sig) };
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32, _force: bool) {}

/// Spawn one suite's tool command and supervise it to completion:
/// stdout/stderr accumulate into `buffer` as they arrive, a hard timeout
/// force-terminates a hung process, and the run-wide `cancelled` signal
/// tears it down early. Resolves exactly once per spawn.
pub async fn supervise(
    suite: SuiteId,
    command_line: &str,
    cwd: &Path,
    timeout: Duration,
    buffer: Arc<Mutex<String>>,
    tracker: Arc<ProcessTracker>,
    mut cancelled: watch::Receiver<bool>,
) -> Result<ExitKind> {
    let argv = shell_words::split(command_line)
        .with_context(|| format!("invalid command line for {suite}: {command_line}"))?;
    let (program, args) = argv
        .split_first()
        .context("empty command line")?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    // Put the child in its own process group so killing it also takes out
    // any worker processes the tool forks.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.as_std_mut().process_group(0);
    }

    debug!(suite = %suite, command = %command_line, "spawning suite process");
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {program} for {suite}"))?;

    let stdout = child.stdout.take().context("missing stdout")?;
    let stderr = child.stderr.take().context("missing stderr")?;
    let mut guard = ChildGuard::new(child);

    if let Some(pgid) = guard.pgid() {
        tracker.insert(suite, pgid);
    }

    let out_task = tokio::spawn(append_lines(stdout, Arc::clone(&buffer)));
    let err_task = tokio::spawn(append_lines(stderr, Arc::clone(&buffer)));

    enum Waited {
        Exited(std::io::Result<std::process::ExitStatus>),
        TimedOut,
        Cancelled,
    }

    let waited = {
        let wait = guard.child.wait();
        tokio::pin!(wait);
        tokio::select! {
            status = &mut wait => Waited::Exited(status),
            _ = tokio::time::sleep(timeout) => Waited::TimedOut,
            _ = wait_for_cancel(&mut cancelled) => Waited::Cancelled,
        }
    };

    let exit = match waited {
        Waited::Exited(status) => match status {
            Ok(status) => ExitKind::Exited(status.code().unwrap_or(-1)),
            Err(err) => {
                tracker.remove(suite);
                return Err(err).context("failed to wait for suite process");
            }
        },
        Waited::TimedOut => {
            warn!(suite = %suite, timeout_secs = timeout.as_secs(), "suite timed out, terminating");
            guard.terminate().await;
            ExitKind::TimedOut
        }
        Waited::Cancelled => {
            debug!(suite = %suite, "run cancelled, terminating suite");
            guard.terminate().await;
            ExitKind::Cancelled
        }
    };

    tracker.remove(suite);

    // Drain whatever the readers still hold. Bounded in case a grandchild
    // inherited the pipe and never closes it.
    let _ = tokio::time::timeout(KILL_GRACE, async {
        let _ = out_task.await;
        let _ = err_task.await;
    })
    .await;

    Ok(exit)
}

async fn append_lines(
    reader: impl tokio::io::AsyncRead + Unpin,
    buffer: Arc<Mutex<String>>,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut buf = buffer.lock().unwrap();
        buf.push_str(&line);
        buf.push('\n');
    }
}

/// Resolves once the watch flag flips to true. Never resolves if the
/// sender is gone (an orphaned receiver must not look like an abort).
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    if *rx.borrow() {
        return;
    }
    loop {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if *rx.borrow() {
            return;
        }
    }
}
