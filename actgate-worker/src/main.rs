//! ActGate worker binary.
//!
//! Loads configuration from the environment (and an optional .env
//! file), registers the built-in activity set, and runs the worker
//! against the configured orchestration engine until SIGINT or
//! SIGTERM.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use actgate_core::config::WorkerConfig;
use actgate_worker::Worker;
use actgate_worker::builtin;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "actgate-worker", version, about = "Governed activity worker")]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, env = "ACTGATE_LOG_JSON", default_value_t = false)]
    log_json: bool,

    /// Log directory; when set, logs also go to a daily-rotated file.
    #[arg(long, env = "ACTGATE_LOG_DIR")]
    log_dir: Option<String>,
}

fn init_tracing(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "actgate-worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if cli.log_json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .json()
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
            Some(guard)
        }
        None => {
            if cli.log_json {
                tracing_subscriber::fmt().with_env_filter(filter).json().init();
            } else {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
            None
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env first so config sees it; missing files are fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli);

    if let Err(e) = run().await {
        error!(error = %e, "Worker exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), actgate_core::error::ActGateError> {
    let config = WorkerConfig::from_env()?;
    info!(
        task_queue = %config.task_queue,
        pool_size = config.executor_pool_size,
        governance = config.governance.is_some(),
        "Starting ActGate worker"
    );

    let mut worker = Worker::new(config);
    builtin::register_builtin(worker.registry_mut())?;

    let lifecycle = worker.lifecycle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining");
        lifecycle.request_shutdown();
    });

    worker.run_configured().await
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
