// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod processes;
pub mod registry;
pub mod schedule;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{build_pipeline, load_and_validate, PipelineFile};
use crate::pipeline::export_dot;
use crate::registry::{process_registry, schedule_registry};

/// Register the built-in schedules and processes. Idempotent.
pub fn register_builtins() -> errors::Result<()> {
    schedule::register_schedules()?;
    processes::register_processes()?;
    Ok(())
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - built-in registration
/// - pipeline file loading and assembly
/// - schedule creation, start and wait
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    register_builtins()?;

    if args.list_schedules {
        print_schedules();
        return Ok(());
    }

    let pipeline_path = PathBuf::from(&args.pipeline);
    let file = load_and_validate(&pipeline_path)
        .with_context(|| format!("loading pipeline file {:?}", pipeline_path))?;

    let schedule_type = args
        .schedule
        .clone()
        .unwrap_or_else(|| file.schedule_type().to_string());

    if args.dry_run {
        print_dry_run(&file, &schedule_type);
        return Ok(());
    }

    let pipeline = Arc::new(build_pipeline(&file, process_registry())?);

    if args.dot {
        let mut out = io::stdout().lock();
        export_dot(&mut out, &pipeline, &graph_name(&pipeline_path))?;
        return Ok(());
    }

    let mut schedule = schedule_registry().create_schedule(
        &schedule_type,
        file.schedule_config(),
        Arc::clone(&pipeline),
    )?;

    // Ctrl-C → cooperative stop; a second Ctrl-C aborts.
    {
        let stop = schedule.stop_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Ctrl-C received; stopping (press Ctrl-C again to abort)");
            stop.set();

            if tokio::signal::ctrl_c().await.is_ok() {
                error!("second Ctrl-C received; aborting");
                std::process::exit(130);
            }
        });
    }

    info!(
        schedule = %schedule_type,
        processes = pipeline.process_names().len(),
        "starting pipeline"
    );
    schedule.start()?;

    // `wait` joins OS threads; keep it off the async runtime.
    tokio::task::spawn_blocking(move || schedule.wait())
        .await
        .context("joining schedule wait task")??;

    info!("pipeline finished");
    Ok(())
}

/// Graph name for dot output: the pipeline file stem.
fn graph_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pipeline".to_string())
}

fn print_schedules() {
    let reg = schedule_registry();
    println!("schedules:");
    for name in reg.types() {
        let description = reg.description(&name).unwrap_or_default();
        println!("  - {name}: {description}");
    }
}

/// Simple dry-run output: print the schedule, processes and connections.
fn print_dry_run(file: &PipelineFile, schedule_type: &str) {
    println!("procsched dry-run");
    println!("  schedule = {schedule_type}");
    for key in file.schedule_config().keys() {
        println!(
            "    {key} = {}",
            file.schedule_config().raw_value(key).unwrap_or_default()
        );
    }
    println!();

    println!("processes ({}):", file.processes().len());
    for decl in file.processes() {
        println!("  - {} :: {}", decl.name, decl.type_name);
        for key in decl.config.keys() {
            println!("      {key} = {}", decl.config.raw_value(key).unwrap_or_default());
        }
    }
    println!();

    println!("connections ({}):", file.connections().len());
    for conn in file.connections() {
        println!("  - {} -> {}", conn.upstream, conn.downstream);
    }

    debug!("dry-run complete (no execution)");
}
