// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use tokio::select;
use tokio::task::JoinSet;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use edwatch::actions::{handle_records, ActionRunner, CommandMap};
use edwatch::bounded_channel::bounded;
use edwatch::init::args::WatchArgs;
use edwatch::init::wait;
use edwatch::journal::{JournalConfig, JournalWatcher};
use edwatch::{BoxError, Shutdown};

const ACTION_QUEUE_SIZE: usize = 16;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "edwatch")]
#[command(bin_name = "edwatch")]
#[command(version, about, long_about = None)]
struct Arguments {
    #[arg(value_enum, long, env = "EDWATCH_LOG_FORMAT", default_value = "text")]
    /// Log format
    log_format: LogFormatArg,

    #[command(flatten)]
    watch: WatchArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    let _guard = match setup_logging(&opt.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    let config = match opt.watch.build_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::from(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("ERROR: {}", e);
        eprintln!("Usage: edwatch [OPTIONS] <path to elite dangerous journal>");
        return ExitCode::from(1);
    }

    let commands = match &opt.watch.actions {
        Some(path) => match CommandMap::load(path) {
            Ok(commands) => commands,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return ExitCode::from(1);
            }
        },
        None => CommandMap::default(),
    };

    info!(
        version = get_version(),
        directory = %config.directory.display(),
        actions = commands.len(),
        "Starting edwatch"
    );

    match run_watcher(config, commands) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to run journal watcher.");
            eprintln!("ERROR: {}", e);
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn run_watcher(config: JournalConfig, commands: CommandMap) -> Result<(), BoxError> {
    let shutdown = Shutdown::new();
    let start_time = Utc::now();

    let (watcher, records) = JournalWatcher::new(config, shutdown.clone());
    let (actions_tx, actions_rx) = bounded(ACTION_QUEUE_SIZE);

    let mut tasks: JoinSet<Result<(), BoxError>> = JoinSet::new();
    tasks.spawn(async move { watcher.run_native().await.map_err(Into::into) });
    tasks.spawn(handle_records(
        records,
        commands,
        actions_tx,
        start_time,
        shutdown.clone(),
    ));
    tasks.spawn(ActionRunner::new(actions_rx).run(shutdown.clone()));

    select! {
        _ = signal_wait() => {
            info!("Shutdown signal received.");
            shutdown.kill("interrupted");
        },
        e = wait::wait_for_any_task(&mut tasks) => {
            match e {
                Ok(()) => warn!("Unexpected early exit of task."),
                Err(e) => {
                    shutdown.kill(e.to_string());
                    return Err(e);
                }
            }
            shutdown.kill("task exited");
        },
    }

    wait::wait_for_tasks_with_timeout(&mut tasks, SHUTDOWN_TIMEOUT).await?;
    info!("done...");

    Ok(())
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io;
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = io::stdout().is_terminal();

        let stdout_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(stdout_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

#[cfg(unix)]
async fn signal_wait() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sig_term = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            warn!(error = %e, "Unable to listen for SIGTERM");
            return ctrl_c().await;
        }
    };

    select! {
        _ = sig_term.recv() => {},
        _ = ctrl_c() => {},
    }
}

#[cfg(not(unix))]
async fn signal_wait() {
    ctrl_c().await
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Unable to listen for interrupt signal");
        std::future::pending::<()>().await;
    }
}
