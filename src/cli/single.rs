//! Modes that send one request: one-shot, single-file, diff, analyze,
//! project Q&A and file generation.

use console::style;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{RunContext, RunStatus};
use crate::assemble::{assemble, tasks};
use crate::collect::{collect, FileCollector};
use crate::domain::{FileRecord, ModeSelection, ProjectSnapshot, TaskSpec};
use crate::error::AppError;
use crate::model::ModelClient;
use crate::router::{ensure_writable, route_text, RouterOutcome};
use crate::utils::{format_with_commas, normalize_path};

/// A request ready for assembly.
struct Request {
    snapshot: ProjectSnapshot,
    task: TaskSpec,
    /// Every file must be sent whole (single-file and diff modes)
    whole_files: bool,
}

pub(super) fn run<W: Write>(
    mode: &ModeSelection,
    ctx: &RunContext,
    client: &dyn ModelClient,
    stdout: &mut W,
) -> Result<RunStatus, AppError> {
    let out = output_path(mode);
    if let Some(path) = out {
        ensure_writable(path, ctx.force)?;
    }

    let request = build_request(mode, ctx)?;
    let ceiling = ctx.config.max_prompt_bytes;
    let envelope = assemble(&request.snapshot, &request.task, ceiling)?;

    let omitted: Vec<&str> = envelope.omitted_files().collect();
    if let Some(path) = omitted.first() {
        if request.whole_files {
            return Err(AppError::PromptTooLarge { path: path.to_string(), ceiling });
        }
        warn!(
            "{} of {} files omitted to fit the {} byte prompt ceiling",
            omitted.len(),
            envelope.manifest.len(),
            format_with_commas(ceiling as u64)
        );
    }
    debug!(
        "Prompt: {} bytes, ~{} tokens, {} files",
        format_with_commas(envelope.body.len() as u64),
        format_with_commas(envelope.estimated_token_count as u64),
        envelope.manifest.len()
    );

    let reply = client.generate(&envelope, &ctx.model)?;
    if let RouterOutcome::Written { path } = route_text(&reply, out, ctx.force, stdout)? {
        eprintln!("{} wrote {}", style("ok").for_stderr().green(), path.display());
    }
    Ok(RunStatus::Success)
}

fn output_path(mode: &ModeSelection) -> Option<&Path> {
    match mode {
        ModeSelection::OneShot { out, .. }
        | ModeSelection::FileFix { out, .. }
        | ModeSelection::FileExplain { out, .. }
        | ModeSelection::FileRefactor { out, .. }
        | ModeSelection::FileDiff { out, .. }
        | ModeSelection::Analyze { out, .. }
        | ModeSelection::ProjectQA { out, .. } => out.as_deref(),
        ModeSelection::GenerateFile { out, .. } => Some(out.as_path()),
        _ => None,
    }
}

fn build_request(mode: &ModeSelection, ctx: &RunContext) -> Result<Request, AppError> {
    let request = match mode {
        ModeSelection::OneShot { prompt, attach, .. } => {
            let snapshot = match attach {
                Some(path) => collect_file(path, ctx)?,
                None => ProjectSnapshot::default(),
            };
            let task = tasks::one_shot(prompt, attach.is_some());
            Request { task, snapshot, whole_files: true }
        }
        ModeSelection::FileFix { path, .. } => {
            let snapshot = collect_file(path, ctx)?;
            Request { task: tasks::fix(&language_of(&snapshot)), snapshot, whole_files: true }
        }
        ModeSelection::FileExplain { path, .. } => Request {
            snapshot: collect_file(path, ctx)?,
            task: tasks::explain(),
            whole_files: true,
        },
        ModeSelection::FileRefactor { path, .. } => {
            let snapshot = collect_file(path, ctx)?;
            let task = tasks::refactor(&language_of(&snapshot));
            Request { task, snapshot, whole_files: true }
        }
        ModeSelection::FileDiff { old, new, .. } => Request {
            snapshot: diff_snapshot(old, new, ctx)?,
            task: tasks::diff(),
            whole_files: true,
        },
        ModeSelection::Analyze { root, focus, .. } => Request {
            snapshot: collect_project(root, ctx)?,
            task: tasks::analyze(focus.as_deref()),
            whole_files: false,
        },
        ModeSelection::ProjectQA { root, question, .. } => Request {
            snapshot: collect_project(root, ctx)?,
            task: tasks::project_qa(question),
            whole_files: false,
        },
        ModeSelection::GenerateFile { description, out, project_root } => {
            let snapshot = match project_root {
                Some(root) => collect_project(root, ctx)?,
                None => ProjectSnapshot::default(),
            };
            let target = out.file_name().map(Path::new).unwrap_or(out.as_path());
            Request {
                snapshot,
                task: tasks::generate(description, &normalize_path(target)),
                whole_files: false,
            }
        }
        other => {
            let message = format!("{} is not a single-request mode", other.name());
            return Err(AppError::Argument(message));
        }
    };
    Ok(request)
}

fn language_of(snapshot: &ProjectSnapshot) -> String {
    snapshot.files.first().map(FileRecord::language).unwrap_or_else(|| "text".to_string())
}

/// Collect exactly one text file.
fn collect_file(path: &Path, ctx: &RunContext) -> Result<ProjectSnapshot, AppError> {
    let metadata = fs::metadata(path).map_err(|e| AppError::io("inspecting", path, e))?;
    if metadata.is_dir() {
        let message = format!("{} is a directory, expected a file", path.display());
        return Err(AppError::Argument(message));
    }
    collect(path, false, &ctx.config)
}

/// Collect every text file of a project folder; an empty result is an error.
fn collect_project(root: &Path, ctx: &RunContext) -> Result<ProjectSnapshot, AppError> {
    let metadata = fs::metadata(root).map_err(|e| AppError::io("inspecting", root, e))?;
    if !metadata.is_dir() {
        return Err(AppError::Argument(format!("{} is not a directory", root.display())));
    }

    let mut collector = FileCollector::from_config(&ctx.config);
    let snapshot = collector.collect(root)?;
    let stats = collector.stats();
    debug!(
        "Collected {} of {} files from {} ({} truncated, {} binary, {} excluded)",
        stats.files_collected,
        stats.files_seen,
        root.display(),
        stats.files_truncated,
        stats.skipped_binary,
        stats.skipped_excluded
    );

    if snapshot.is_empty() {
        let message = format!("no eligible text files found in {}", root.display());
        return Err(AppError::Argument(message));
    }
    Ok(snapshot)
}

/// Both sides of a diff, old first. Identical labels get `old/` and `new/` prefixes.
fn diff_snapshot(old: &Path, new: &Path, ctx: &RunContext) -> Result<ProjectSnapshot, AppError> {
    let mut old_record = single_record(old, ctx)?;
    let mut new_record = single_record(new, ctx)?;
    if old_record.relative_path == new_record.relative_path {
        old_record.relative_path = format!("old/{}", old_record.relative_path);
        new_record.relative_path = format!("new/{}", new_record.relative_path);
    }
    Ok(ProjectSnapshot::new(PathBuf::new(), vec![old_record, new_record]))
}

fn single_record(path: &Path, ctx: &RunContext) -> Result<FileRecord, AppError> {
    collect_file(path, ctx)?
        .files
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Binary { path: path.to_path_buf() })
}
