//! Folder-wide fix / refactor / rewrite

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::{RunContext, RunStatus};
use crate::collect::FileCollector;
use crate::domain::FolderTransform;
use crate::error::AppError;
use crate::model::ModelClient;
use crate::router::{
    ensure_writable, output_root_for, run_folder_transform, FolderOptions, FolderStatus,
};

pub(super) fn run(
    transform: FolderTransform,
    root: &Path,
    ctx: &RunContext,
    client: &dyn ModelClient,
) -> Result<RunStatus, AppError> {
    let metadata = fs::metadata(root).map_err(|e| AppError::io("inspecting", root, e))?;
    if !metadata.is_dir() {
        return Err(AppError::Argument(format!("{} is not a directory", root.display())));
    }

    let out_root = output_root_for(root, transform);
    ensure_writable(&out_root, ctx.force)?;

    let mut collector = FileCollector::from_config(&ctx.config)
        .include_extensions(ctx.config.include_extensions.clone());
    let snapshot = collector.collect(root)?;
    debug!("Collection stats: {:?}", collector.stats());

    if snapshot.is_empty() {
        warn!("No eligible files under {}; nothing to do", root.display());
        return Ok(RunStatus::Success);
    }

    let progress = if ctx.show_progress {
        ProgressBar::new(snapshot.files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(bar_style) =
        ProgressStyle::with_template("{prefix} [{bar:30.cyan/blue}] {pos}/{len} files ({elapsed})")
    {
        progress.set_style(bar_style.progress_chars("=> "));
    }
    progress.set_prefix(transform.suffix().trim_start_matches('_').to_string());

    let options = FolderOptions {
        out_root,
        prompt_ceiling: ctx.config.max_prompt_bytes,
        jobs: ctx.config.jobs,
        force: ctx.force,
    };
    let report =
        run_folder_transform(&snapshot, transform, client, &ctx.model, &options, &progress)?;
    progress.finish_and_clear();

    for failure in &report.failed {
        eprintln!("{} {}: {}", style("failed").for_stderr().red(), failure.path, failure.error);
    }

    match report.status() {
        FolderStatus::Failed => Err(AppError::FolderFailed { failed: report.failed.len() }),
        status => {
            eprintln!(
                "{} {} {}/{} files into {}",
                style("ok").for_stderr().green(),
                transform.verb(),
                report.succeeded.len(),
                report.total(),
                report.out_root.display()
            );
            if status == FolderStatus::CompletedWithWarnings {
                Ok(RunStatus::CompletedWithWarnings)
            } else {
                Ok(RunStatus::Success)
            }
        }
    }
}
