//! Sync command implementation

use anyhow::{Context, Result};
use architectum::output::{generate_execution_id, output_json, JsonResponse};
use architectum::{Architectum, CancellationToken, SkipReason, SyncDiagnostic, SyncOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

/// Run one sync over `paths` (the root when empty).
///
/// Per-file failures do not fail the command; they are listed in the report
/// and the response is marked partial.
pub fn run_sync(root: PathBuf, paths: Vec<PathBuf>, recursive: bool, force: bool) -> Result<()> {
    let workspace = Architectum::open(&root)?;
    let cwd = std::env::current_dir().context("reading the current directory")?;
    let paths: Vec<PathBuf> = if paths.is_empty() {
        vec![workspace.root().to_path_buf()]
    } else {
        paths
            .into_iter()
            .map(|p| if p.is_absolute() { p } else { cwd.join(p) })
            .collect()
    };

    let cancel = CancellationToken::new();
    // Register signal handlers for SIGINT and SIGTERM
    #[cfg(unix)]
    {
        use signal_hook::consts::signal;
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([signal::SIGTERM, signal::SIGINT])?;
        let token = cancel.clone();
        std::thread::spawn(move || {
            for _ in &mut signals {
                token.cancel();
                break;
            }
        });
    }

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("progress template")?
            .progress_chars("=> "),
    );
    let bar = progress.clone();

    let mut options = SyncOptions {
        recursive,
        force,
        ..SyncOptions::default()
    }
    .with_cancel(cancel);
    options.progress = Some(Arc::new(move |done: usize, total: usize, path: &str| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
        bar.set_message(path.to_string());
    }));

    let report = workspace.sync(&paths, &options)?;
    progress.finish_and_clear();

    for diagnostic in report.diagnostics() {
        if matches!(diagnostic, SyncDiagnostic::Error { .. }) {
            eprintln!("{}", diagnostic.format_stderr());
        }
    }
    if report.cancelled {
        let left = report
            .skipped_reasons
            .values()
            .filter(|reason| **reason == SkipReason::Cancelled)
            .count();
        eprintln!("Sync cancelled; {} file(s) left for the next run", left);
    }

    let partial = !report.is_clean();
    let response = JsonResponse::new(report, &generate_execution_id()).with_partial(partial);
    output_json(&response)
}
