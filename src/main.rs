mod config;
mod counter;
mod dashboard;
mod history;
mod models;
mod parser;
mod runner;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use config::Config;
use dashboard::stream::{SseLineDecoder, StreamClient};
use dashboard::{Dashboard, view};
use models::SuiteId;
use runner::{Orchestrator, RunOptions};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Runs a web app's check suites as supervised processes and streams live progress"
)]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host the HTTP/SSE endpoints.
    Serve {
        /// Override the configured bind address.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Execute a run in-process and render progress in the terminal.
    Run {
        /// Re-run only the suites that failed last time.
        #[arg(long)]
        only_failed: bool,
        /// Run an explicit subset of suites (repeatable).
        #[arg(long = "suite", value_name = "SUITE")]
        suites: Vec<SuiteId>,
        /// Skip the lint/build quality gates.
        #[arg(long)]
        skip_gates: bool,
        /// Reuse the previous run's test counts instead of re-scanning.
        #[arg(long)]
        reuse_counts: bool,
    },
    /// Attach to a serving host, start a run, and render its stream.
    Watch {
        /// Base URL of the serving host.
        #[arg(long, default_value = "http://127.0.0.1:4477")]
        url: String,
        #[arg(long)]
        only_failed: bool,
        #[arg(long = "suite", value_name = "SUITE")]
        suites: Vec<SuiteId>,
        #[arg(long)]
        skip_gates: bool,
    },
    /// Scan the test tree and print the counts.
    Counts {
        /// Emit the raw JSON document.
        #[arg(long)]
        json: bool,
    },
}

fn build_options(
    only_failed: bool,
    suites: Vec<SuiteId>,
    skip_gates: bool,
    reuse_counts: bool,
) -> RunOptions {
    RunOptions {
        only_failed,
        suites: if suites.is_empty() {
            None
        } else {
            Some(suites)
        },
        skip_gates,
        reuse_counts,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulse=info")),
        )
        .init();

    let cli = Cli::parse();
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().context("cannot resolve current directory")?,
    };
    let config = Arc::new(Config::load(&workspace));

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let state = server::AppState {
                orchestrator: Orchestrator::new(workspace.clone(), Arc::clone(&config)),
                config,
                workspace,
            };
            server::serve(state, &bind).await
        }
        Command::Run {
            only_failed,
            suites,
            skip_gates,
            reuse_counts,
        } => {
            let options = build_options(only_failed, suites, skip_gates, reuse_counts);
            let success = run_local(workspace, config, options).await?;
            if !success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Watch {
            url,
            only_failed,
            suites,
            skip_gates,
        } => {
            let options = build_options(only_failed, suites, skip_gates, only_failed);
            let success = watch_remote(&url, options).await?;
            if !success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Counts { json } => {
            let counts = counter::scan(&workspace, &config.scan);
            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else {
                println!(
                    "{} tests in {} files ({} component, {} backend), scanned in {}ms",
                    counts.total,
                    counts.file_count,
                    counts.component_tests.total,
                    counts.backend_tests.total,
                    counts.scan_duration_ms
                );
                for file in counts
                    .component_tests
                    .files
                    .iter()
                    .chain(&counts.backend_tests.files)
                {
                    println!("  {:>4}  {}", file.count, file.path);
                }
            }
            Ok(())
        }
    }
}

/// Drive a run end-to-end in this process, rendering on the debounce tick.
async fn run_local(workspace: PathBuf, config: Arc<Config>, options: RunOptions) -> Result<bool> {
    let orchestrator = Orchestrator::new(workspace, config);
    let mut rx = orchestrator.subscribe();
    let execution_id = orchestrator.start(options).await?;

    let mut dashboard = Dashboard::new();
    dashboard.track(execution_id);
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Ok(message) => {
                    if dashboard.ingest(message) {
                        redraw(&dashboard);
                    }
                    if dashboard.complete {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "renderer lagged behind the event stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tick.tick() => {
                if dashboard.flush() {
                    redraw(&dashboard);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("aborting run...");
                orchestrator.abort().await;
            }
        }
    }

    redraw(&dashboard);
    Ok(dashboard.run_status == Some(models::RunStatus::Completed))
}

/// Consume a remote host's SSE stream and render it.
async fn watch_remote(url: &str, options: RunOptions) -> Result<bool> {
    let client = StreamClient::new(url)?;
    let response = client.start_run(&options).await?;
    let mut stream = response.bytes_stream();

    let mut decoder = SseLineDecoder::new();
    let mut dashboard = Dashboard::new();
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            chunk = stream.next() => match chunk {
                Some(Ok(chunk)) => {
                    let mut render = false;
                    for message in decoder.push(&chunk) {
                        render |= dashboard.ingest(message);
                    }
                    if render {
                        redraw(&dashboard);
                    }
                    if dashboard.complete {
                        break;
                    }
                }
                Some(Err(err)) => {
                    // A dropped stream is a cancellation, not a failure to report.
                    warn!(error = %err, "stream closed");
                    break;
                }
                None => break,
            },
            _ = tick.tick() => {
                if dashboard.flush() {
                    redraw(&dashboard);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("aborting run...");
                client.abort().await?;
            }
        }
    }

    redraw(&dashboard);
    Ok(dashboard.run_status == Some(models::RunStatus::Completed))
}

fn redraw(dashboard: &Dashboard) {
    // Clear and repaint; the block is small enough to redraw whole.
    print!("\x1b[2J\x1b[H{}", view::render(dashboard));
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
