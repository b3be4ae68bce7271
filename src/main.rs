//! Architectum CLI
//!
//! Usage: architectum <command> [arguments]
//!
//! Results go to stdout as JSON; logs and progress go to stderr.

mod blueprint_cmd;
mod cli;
mod sync_cmd;

use anyhow::Result;
use architectum::output::{generate_execution_id, output_json, ErrorResponse, JsonResponse};
use architectum::{Architectum, ArchitectumError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::Command;

const DEFAULT_LOG_FILTER: &str = "architectum=info";

/// Install the stderr subscriber: `ARCHITECTUM_LOG`, then `RUST_LOG`, then the default.
fn init_tracing() {
    let filter = std::env::var("ARCHITECTUM_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_status(root: PathBuf) -> Result<()> {
    let workspace = Architectum::open(&root)?;
    let status = workspace.status()?;
    output_json(&JsonResponse::new(status, &generate_execution_id()))
}

fn run_verify(root: PathBuf) -> Result<bool> {
    let workspace = Architectum::open(&root)?;
    let report = workspace.verify()?;
    let clean = report.is_clean();
    output_json(&JsonResponse::new(report, &generate_execution_id()).with_partial(!clean))?;
    Ok(clean)
}

fn run_export(root: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let workspace = Architectum::open(&root)?;
    let json = workspace.export_graph()?;
    match output {
        Some(path) => {
            let path = std::env::current_dir()?.join(path);
            architectum::common::write_atomic(&path, json.as_bytes())?
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Print the error as `{ "error": {...} }` when it is a library error.
fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<ArchitectumError>() {
        Some(arch) => {
            if output_json(&ErrorResponse::from(arch)).is_err() {
                eprintln!("Error: {}", arch);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

fn main() -> ExitCode {
    let command = match cli::parse_args() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            cli::print_usage();
            return ExitCode::from(1);
        }
    };
    init_tracing();

    let result = match command {
        Command::Sync {
            root,
            paths,
            recursive,
            force,
        } => sync_cmd::run_sync(root, paths, recursive, force),
        Command::Blueprint { root, target, args } => blueprint_cmd::run_blueprint(root, target, args),
        Command::BlueprintShow { root, name, version } => {
            blueprint_cmd::run_blueprint_show(root, name, version)
        }
        Command::BlueprintDiff { root, name, from, to } => {
            blueprint_cmd::run_blueprint_diff(root, name, from, to)
        }
        Command::Status { root } => run_status(root),
        Command::Verify { root } => match run_verify(root) {
            Ok(true) => Ok(()),
            Ok(false) => return ExitCode::from(1),
            Err(e) => Err(e),
        },
        Command::Export { root, output } => run_export(root, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(1)
        }
    }
}
