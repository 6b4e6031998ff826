//! `threadvisor` binary: starts the well-known threads and runs until a
//! termination signal or the operator `quit` command.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use threadvisor::{Runtime, Settings, wait_for_shutdown_signal};

/// Thread supervisor for a client/server networking runtime.
#[derive(Parser, Debug)]
#[command(name = "threadvisor")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML settings file (defaults apply when omitted)
    #[arg(short, long, env = "THREADVISOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive, overrides RUST_LOG (e.g. "debug")
    #[arg(long)]
    log_level: Option<String>,

    /// Comma-separated thread labels to suppress, overrides [debug].suppress_threads
    #[arg(long)]
    suppress: Option<String>,
}

fn setup_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(d) => EnvFilter::new(d),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing(args.log_level.as_deref());

    let mut settings = match args.config.as_deref() {
        Some(path) => match Settings::load(path) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, label = e.as_label(), "settings not loaded");
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };
    if let Some(list) = args.suppress {
        settings.debug.suppress_threads = list;
    }

    let runtime = Runtime::new(settings);
    let threads = runtime.well_known_threads();
    match runtime.start(threads) {
        Ok(report) => {
            tracing::info!(
                started = ?report.started,
                suppressed = ?report.suppressed,
                failed = report.failed.len(),
                "threads started"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            runtime.cleanup();
            return ExitCode::FAILURE;
        }
    }

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    match signals {
        Ok(rt) => rt.block_on(async {
            tokio::select! {
                res = wait_for_shutdown_signal() => {
                    if let Err(e) = res {
                        tracing::warn!(error = %e, "signal handlers not installed");
                    }
                }
                _ = runtime.token().cancelled() => {}
            }
        }),
        Err(e) => {
            tracing::error!(error = %e, "signal runtime not built");
        }
    }

    let code = match runtime.shutdown_with_grace() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, label = e.as_label(), "shutdown incomplete");
            ExitCode::FAILURE
        }
    };
    runtime.cleanup();
    code
}
