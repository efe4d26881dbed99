// bashcord/src/main.rs
use std::time::Duration;
use std::{env, fs, process};

use bashcord_common::config::Config;
use bashcord_common::error::{BashcordError, Result as bcResult};
use bashcord_core::update::installer::{cleanup_stale_backup, running_tag};
use bashcord_core::{Engine, UpdateStatus};
use clap::Parser;
use colored::Colorize;
use tokio::sync::oneshot;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod remediation;
mod ui;

use cli::CliArgs;

/// How long to wait for the background update check once the command is done.
const UPDATE_CHECK_GRACE: Duration = Duration::from_secs(3);

fn init_logging(config: &Config, verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("BASHCORD_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if verbose > 0 {
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!(
                "{} Failed to create log directory {}: {}",
                "Warning:".yellow().bold(),
                log_dir.display(),
                e
            );
        } else {
            let file_appender = tracing_appender::rolling::daily(&log_dir, "bashcord.log");
            let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

            let stderr_writer = std::io::stderr.with_max_level(max_log_level);
            let file_writer = non_blocking_appender.with_max_level(max_log_level);

            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(stderr_writer.and(file_writer))
                .with_ansi(true)
                .without_time()
                .try_init();

            Box::leak(Box::new(guard));
            debug!(
                "Verbose logging enabled. Writing logs to: {}/bashcord.log",
                log_dir.display()
            );
            return;
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

#[tokio::main]
async fn main() -> bcResult<()> {
    let cli_args = CliArgs::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: Could not load configuration: {:#}", "Error".red().bold(), e);
            process::exit(1);
        }
    };
    init_logging(&config, cli_args.verbose);

    if let Ok(exe) = env::current_exe() {
        cleanup_stale_backup(&exe);
    }

    let engine = Engine::new(config);

    let update_check = if cli_args.command.wants_update_check()
        && !env::var("BASHCORD_NO_UPDATE_CHECK").is_ok_and(|v| v == "1")
    {
        Some(engine.spawn_update_check())
    } else {
        debug!("Skipping background update check for {:?}", cli_args.command);
        None
    };

    if let Err(e) = cli_args.command.run(&engine).await {
        report_failure(&e);
        process::exit(1);
    }

    if let Some(rx) = update_check {
        report_pending_updates(rx).await;
    }

    debug!("Command completed successfully.");
    Ok(())
}

fn report_failure(e: &BashcordError) {
    error!("Command failed: {:#}", e);
    eprintln!("{}: {:#}", "Error".red().bold(), e);
    if let Some(hint) = remediation::explain(e) {
        eprintln!("{} {}", "Hint:".yellow().bold(), hint);
    }
}

async fn report_pending_updates(rx: oneshot::Receiver<UpdateStatus>) {
    let status = match tokio::time::timeout(UPDATE_CHECK_GRACE, rx).await {
        Ok(Ok(status)) => status,
        Ok(Err(_)) => return,
        Err(_) => {
            debug!("Update check still running, not waiting for it");
            return;
        }
    };
    for (kind, e) in &status.errors {
        debug!("{} feed unavailable: {}", kind, e);
    }
    if status.payload_stale {
        println!(
            "{} A newer Vencord build is available. Run {} and patch again.",
            "==>".bold().blue(),
            "bashcord update".bold()
        );
    }
    if status.installer_stale {
        if let Some(latest) = &status.installer {
            println!(
                "{} Installer {} is available (running {}). Run {}.",
                "==>".bold().blue(),
                latest.tag.bold(),
                running_tag(),
                "bashcord self-update".bold()
            );
        }
    }
}
