// src/lib.rs

pub mod cli;
pub mod clock;
pub mod config;
pub mod display;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod registry;
pub mod task;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, JobKind, JobSettings, default_config_path, load_and_validate};
use crate::display::LogTable;
use crate::engine::{SupervisorHandle, spawn_supervisor};
use crate::types::QueueMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the supervisor loop and its log display
/// - one worker per selected job
/// - Ctrl-C handling (cancel everything, then stop)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config '{}'", config_path.display()))?;

    let jobs = select_jobs(&cfg, &args.jobs)?;

    if args.dry_run {
        print_dry_run(&cfg, &jobs);
        return Ok(());
    }

    let mut settings = cfg.supervisor;
    if args.queue_renders {
        settings.queue_mode = QueueMode::Queued;
    }
    info!(
        jobs = jobs.len(),
        queue_mode = ?settings.queue_mode,
        max_concurrent = settings.max_concurrent,
        "starting render jobs"
    );

    let (handle, supervisor) = spawn_supervisor(settings.supervisor_options(true), LogTable);

    let names: Vec<String> = jobs.iter().map(|job| job.name.clone()).collect();
    spawn_ctrl_c_handler(handle.clone(), names);

    let workers: Vec<_> = jobs
        .iter()
        .map(|job| crate::exec::spawn_job(job, &handle))
        .collect();
    drop(handle);

    supervisor
        .await
        .context("supervisor task panicked")??;

    // A job may reach 100% before its process exits; let it exit.
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "job worker panicked");
        }
    }

    info!("all render jobs done");
    Ok(())
}

/// Jobs named on the command line, or every job when none are.
fn select_jobs<'a>(cfg: &'a ConfigFile, names: &[String]) -> Result<Vec<&'a JobSettings>> {
    if names.is_empty() {
        return Ok(cfg.jobs.values().collect());
    }

    let mut jobs = Vec::with_capacity(names.len());
    for name in names {
        match cfg.jobs.get(name) {
            Some(job) => jobs.push(job),
            None => bail!("unknown job '{name}' (not in config)"),
        }
    }
    Ok(jobs)
}

fn spawn_ctrl_c_handler(handle: SupervisorHandle, names: Vec<String>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received; canceling jobs");
        // The supervisor may already be gone.
        let _ = handle.cancel(names);
        let _ = handle.shutdown();
    });
}

/// Print the validated jobs without running them.
fn print_dry_run(cfg: &ConfigFile, jobs: &[&JobSettings]) {
    let s = &cfg.supervisor;
    println!("rendertrack dry-run");
    println!("  supervisor.queue_mode = {:?}", s.queue_mode);
    println!("  supervisor.max_concurrent = {}", s.max_concurrent);
    println!("  supervisor.smoothing = {}", s.estimator.smoothing);
    println!("  supervisor.stale_after = {:?}", s.estimator.stale_after);
    println!("  supervisor.refresh_interval = {:?}", s.refresh_interval);
    println!("  supervisor.remove_finished = {}", s.remove_finished);
    println!();

    println!("jobs ({}):", jobs.len());
    for job in jobs {
        let range = job.frame_range;
        println!("  - {}", job.name);
        println!("      message: {}", job.message);
        println!(
            "      frames: {}-{} step {} ({} frames)",
            range.first,
            range.last,
            range.step,
            range.frame_count()
        );
        println!(
            "      can_pause: {}, can_cancel: {}",
            job.capabilities.can_pause, job.capabilities.can_cancel
        );
        match &job.kind {
            JobKind::Simulated { frame_time } => {
                println!("      simulated: {frame_time:?} per frame");
            }
            JobKind::Command { cmd, frame_pattern } => {
                println!("      cmd: {cmd}");
                println!("      frame_pattern: {}", frame_pattern.as_str());
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
