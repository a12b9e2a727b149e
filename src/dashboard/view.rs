//! Line-oriented terminal presenter for the dashboard state. Rendering
//! stays dumb on purpose; everything interesting happens in the state
//! machine.

use colored::Colorize;

use crate::models::{RunStatus, SuiteId, SuiteStatus};

use super::Dashboard;

const BAR_WIDTH: usize = 24;

/// Full status block: header, one line per suite, failure panel.
pub fn render(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    out.push_str(&render_header(dashboard));
    out.push('\n');
    for suite in SuiteId::ALL {
        out.push_str(&render_suite_line(dashboard, suite));
        out.push('\n');
    }
    if !dashboard.failures.is_empty() {
        out.push('\n');
        out.push_str(&render_failures(dashboard));
    }
    if let Some(err) = &dashboard.stream_error {
        out.push('\n');
        out.push_str(&format!("{} {}", "stream error:".red().bold(), err));
        out.push('\n');
    }
    out
}

fn render_header(dashboard: &Dashboard) -> String {
    let progress = dashboard.overall_progress();
    let filled = ((progress / 100.0) * BAR_WIDTH as f64).round() as usize;
    let bar = format!(
        "[{}{}]",
        "#".repeat(filled.min(BAR_WIDTH)),
        ".".repeat(BAR_WIDTH - filled.min(BAR_WIDTH))
    );

    let status = match dashboard.run_status {
        Some(RunStatus::Completed) => "completed".green().bold().to_string(),
        Some(RunStatus::Failed) => "failed".red().bold().to_string(),
        Some(RunStatus::Running) => "running".yellow().to_string(),
        None => "waiting".dimmed().to_string(),
    };

    let id = dashboard.execution_id().unwrap_or("-");
    format!("run {id}  {bar} {progress:>3.0}%  {status}")
}

fn render_suite_line(dashboard: &Dashboard, suite: SuiteId) -> String {
    let view = dashboard.suite(suite);
    let icon = match view.status {
        SuiteStatus::Completed => view.status.icon().green().to_string(),
        SuiteStatus::Failed => view.status.icon().red().to_string(),
        SuiteStatus::Running => view.status.icon().yellow().to_string(),
        SuiteStatus::Pending => view.status.icon().dimmed().to_string(),
    };

    let detail = match view.status {
        SuiteStatus::Running => {
            let counts = format!("{}/{}", view.stats.executed(), view.stats.total);
            match &view.current_test {
                Some(name) => format!("{counts} · {name}"),
                None => counts,
            }
        }
        SuiteStatus::Completed => {
            if view.stats.total > 0 {
                format!(
                    "{} passed{}",
                    view.stats.passed,
                    if view.stats.skipped > 0 {
                        format!(", {} skipped", view.stats.skipped)
                    } else {
                        String::new()
                    }
                )
            } else {
                "ok".to_string()
            }
        }
        SuiteStatus::Failed => {
            let reason = view.reason.as_deref().unwrap_or("failed");
            if view.stats.failed > 0 {
                format!("{} failed · {}", view.stats.failed, reason)
            } else {
                reason.to_string()
            }
        }
        // A pending suite always says why it isn't moving.
        SuiteStatus::Pending => view
            .reason
            .as_deref()
            .unwrap_or("queued")
            .to_string(),
    };

    format!("  {icon} {:<28} {detail}", suite.label())
}

/// The "N issues need attention" panel.
pub fn render_failures(dashboard: &Dashboard) -> String {
    let mut out = format!(
        "{}\n",
        format!("{} issue(s) need attention", dashboard.failures.len())
            .red()
            .bold()
    );
    for failure in &dashboard.failures {
        out.push_str(&format!(
            "  {} {}\n",
            format!("[{}]", failure.suite.label()).red(),
            failure.excerpt
        ));
    }
    out
}
