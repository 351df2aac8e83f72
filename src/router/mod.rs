//! Output routing
//!
//! Model text goes to stdout, to an `--out` file, or, for folder transforms,
//! to a mirrored output tree next to the input root.

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::assemble::{assemble, tasks};
use crate::domain::{FileRecord, FolderTransform, ProjectSnapshot};
use crate::error::AppError;
use crate::model::{ModelClient, ModelConfig};
use crate::utils::paths::sibling_with_suffix;

/// Where a single response ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterOutcome {
    Printed,
    Written { path: PathBuf },
}

/// Print `text` to `stdout`, or write it verbatim to `out`.
pub fn route_text<W: Write>(
    text: &str,
    out: Option<&Path>,
    force: bool,
    stdout: &mut W,
) -> Result<RouterOutcome, AppError> {
    match out {
        Some(path) => {
            write_output_file(path, text, force)?;
            Ok(RouterOutcome::Written { path: path.to_path_buf() })
        }
        None => {
            let write = |stdout: &mut W| -> std::io::Result<()> {
                stdout.write_all(text.as_bytes())?;
                if !text.ends_with('\n') {
                    stdout.write_all(b"\n")?;
                }
                stdout.flush()
            };
            write(stdout).map_err(|e| AppError::io("writing", "<stdout>", e))?;
            Ok(RouterOutcome::Printed)
        }
    }
}

/// Fail early when `path` exists and overwriting was not requested.
pub fn ensure_writable(path: &Path, force: bool) -> Result<(), AppError> {
    if path.exists() && !force {
        return Err(AppError::OutputExists { path: path.to_path_buf() });
    }
    Ok(())
}

/// Write `text` to `path` byte-for-byte, creating parent directories.
pub fn write_output_file(path: &Path, text: &str, force: bool) -> Result<(), AppError> {
    ensure_writable(path, force)?;
    create_parent(path)?;
    fs::write(path, text).map_err(|e| AppError::io("writing", path, e))?;
    debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::io("creating", parent, e))?;
    }
    Ok(())
}

/// Output root for a folder transform: a sibling of `root` with the mode suffix.
pub fn output_root_for(root: &Path, transform: FolderTransform) -> PathBuf {
    sibling_with_suffix(root, transform.suffix())
}

/// Settings for one folder transform run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderOptions {
    pub out_root: PathBuf,
    pub prompt_ceiling: usize,
    pub jobs: usize,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Per-file results of a folder transform, in collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderReport {
    pub out_root: PathBuf,
    pub succeeded: Vec<String>,
    pub failed: Vec<FileFailure>,
}

/// Overall result of a folder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    Complete,
    CompletedWithWarnings,
    Failed,
}

impl FolderReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn status(&self) -> FolderStatus {
        match (self.succeeded.len(), self.failed.len()) {
            (_, 0) => FolderStatus::Complete,
            (0, _) => FolderStatus::Failed,
            _ => FolderStatus::CompletedWithWarnings,
        }
    }
}

/// Transform every file of `snapshot` independently and mirror the results
/// under `options.out_root`.
///
/// Requests run on a pool of `options.jobs` threads. A failure is recorded
/// against its file and never cancels the others; the input tree is only read.
/// The output root is created by the first successful write.
pub fn run_folder_transform(
    snapshot: &ProjectSnapshot,
    transform: FolderTransform,
    client: &dyn ModelClient,
    model_config: &ModelConfig,
    options: &FolderOptions,
    progress: &ProgressBar,
) -> Result<FolderReport, AppError> {
    ensure_writable(&options.out_root, options.force)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .build()
        .map_err(|e| AppError::Config(format!("failed to start worker pool: {e}")))?;

    let results: Vec<(String, Result<(), AppError>)> = pool.install(|| {
        snapshot
            .files
            .par_iter()
            .map(|record| {
                let result = transform_file(record, transform, client, model_config, options);
                if let Err(err) = &result {
                    warn!("{}: {}", record.relative_path, err);
                }
                progress.inc(1);
                (record.relative_path.clone(), result)
            })
            .collect()
    });

    let mut report = FolderReport {
        out_root: options.out_root.clone(),
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (path, result) in results {
        match result {
            Ok(()) => report.succeeded.push(path),
            Err(err) => report.failed.push(FileFailure { path, error: err.to_string() }),
        }
    }
    Ok(report)
}

fn transform_file(
    record: &FileRecord,
    transform: FolderTransform,
    client: &dyn ModelClient,
    model_config: &ModelConfig,
    options: &FolderOptions,
) -> Result<(), AppError> {
    let single = ProjectSnapshot::new(PathBuf::new(), vec![record.clone()]);
    let task = tasks::for_transform(transform, &record.language());
    let envelope = assemble(&single, &task, options.prompt_ceiling)?;
    if envelope.omitted_files().next().is_some() {
        return Err(AppError::PromptTooLarge {
            path: record.relative_path.clone(),
            ceiling: options.prompt_ceiling,
        });
    }

    let reply = client.generate(&envelope, model_config)?;
    let target = options.out_root.join(&record.relative_path);
    create_parent(&target)?;
    fs::write(&target, reply).map_err(|e| AppError::io("writing", &target, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{begin_marker, end_marker};
    use crate::domain::PromptEnvelope;
    use crate::error::ModelError;
    use tempfile::TempDir;

    /// Returns the first file section of the envelope unchanged.
    struct EchoClient;

    impl ModelClient for EchoClient {
        fn generate(
            &self,
            envelope: &PromptEnvelope,
            _: &ModelConfig,
        ) -> Result<String, ModelError> {
            let path = &envelope.manifest[0].path;
            let begin = begin_marker(path) + "\n";
            let start = envelope.body.find(&begin).map(|i| i + begin.len()).unwrap_or(0);
            let end = envelope.body.find(&end_marker(path)).unwrap_or(envelope.body.len());
            Ok(envelope.body[start..end].to_string())
        }
    }

    /// Fails for any file whose path contains `bad`.
    struct PickyClient;

    impl ModelClient for PickyClient {
        fn generate(
            &self,
            envelope: &PromptEnvelope,
            _: &ModelConfig,
        ) -> Result<String, ModelError> {
            if envelope.manifest[0].path.contains("bad") {
                Err(ModelError::permanent(Some(400), "rejected"))
            } else {
                Ok(format!("done: {}", envelope.manifest[0].path))
            }
        }
    }

    fn record(path: &str, content: &str) -> FileRecord {
        FileRecord {
            relative_path: path.to_string(),
            content: content.to_string(),
            truncated: false,
            size_bytes: content.len() as u64,
        }
    }

    fn options(out_root: PathBuf) -> FolderOptions {
        FolderOptions { out_root, prompt_ceiling: 100_000, jobs: 3, force: false }
    }

    #[test]
    fn stdout_gets_trailing_newline_file_gets_exact_text() {
        let mut stdout = Vec::new();
        let outcome = route_text("hello", None, false, &mut stdout).expect("print");
        assert_eq!(outcome, RouterOutcome::Printed);
        assert_eq!(stdout, b"hello\n");

        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested/out.txt");
        let outcome = route_text("hello", Some(&path), false, &mut stdout).expect("write");
        assert_eq!(outcome, RouterOutcome::Written { path: path.clone() });
        assert_eq!(fs::read_to_string(&path).expect("read"), "hello");
    }

    #[test]
    fn existing_output_requires_force() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("out.txt");
        fs::write(&path, "old").expect("seed");

        let err = write_output_file(&path, "new", false).unwrap_err();
        assert!(matches!(err, AppError::OutputExists { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), "old");

        write_output_file(&path, "new", true).expect("forced write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "new");
    }

    #[test]
    fn output_root_is_a_sibling() {
        let root = Path::new("work/src");
        assert_eq!(output_root_for(root, FolderTransform::Fix), PathBuf::from("work/src_fixed"));
        assert_eq!(
            output_root_for(root, FolderTransform::Rewrite),
            PathBuf::from("work/src_rewritten")
        );
    }

    #[test]
    fn folder_transform_mirrors_tree() {
        let dir = TempDir::new().expect("temp dir");
        let out_root = dir.path().join("src_fixed");
        let snapshot = ProjectSnapshot::new(
            dir.path().join("src"),
            vec![record("a/one.py", "print(1)\n"), record("two.rs", "fn main() {}\n")],
        );

        let report = run_folder_transform(
            &snapshot,
            FolderTransform::Fix,
            &EchoClient,
            &ModelConfig::default(),
            &options(out_root.clone()),
            &ProgressBar::hidden(),
        )
        .expect("run");

        assert_eq!(report.status(), FolderStatus::Complete);
        assert_eq!(report.succeeded, vec!["a/one.py", "two.rs"]);
        assert_eq!(fs::read_to_string(out_root.join("a/one.py")).expect("read"), "print(1)\n");
        assert_eq!(fs::read_to_string(out_root.join("two.rs")).expect("read"), "fn main() {}\n");
    }

    #[test]
    fn failures_do_not_cancel_siblings() {
        let dir = TempDir::new().expect("temp dir");
        let out_root = dir.path().join("proj_refactored");
        let snapshot = ProjectSnapshot::new(
            dir.path().join("proj"),
            vec![
                record("bad.py", "x"),
                record("good1.py", "y"),
                record("lib/bad_too.js", "z"),
                record("lib/good2.js", "w"),
            ],
        );

        let report = run_folder_transform(
            &snapshot,
            FolderTransform::Refactor,
            &PickyClient,
            &ModelConfig::default(),
            &options(out_root.clone()),
            &ProgressBar::hidden(),
        )
        .expect("run");

        assert_eq!(report.status(), FolderStatus::CompletedWithWarnings);
        assert_eq!(report.total(), 4);
        assert_eq!(report.succeeded, vec!["good1.py", "lib/good2.js"]);
        let failed: Vec<&str> = report.failed.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(failed, vec!["bad.py", "lib/bad_too.js"]);
        assert!(report.failed[0].error.contains("rejected"));

        assert!(out_root.join("good1.py").is_file());
        assert!(out_root.join("lib/good2.js").is_file());
        assert!(!out_root.join("bad.py").exists());
    }

    #[test]
    fn oversized_file_fails_without_a_request() {
        let dir = TempDir::new().expect("temp dir");
        let files = vec![record("big.txt", &"x".repeat(5_000))];
        let snapshot = ProjectSnapshot::new(dir.path().join("src"), files);
        let mut opts = options(dir.path().join("src_fixed"));
        opts.prompt_ceiling = 1_000;

        let report = run_folder_transform(
            &snapshot,
            FolderTransform::Fix,
            &PickyClient,
            &ModelConfig::default(),
            &opts,
            &ProgressBar::hidden(),
        )
        .expect("run");
        assert_eq!(report.status(), FolderStatus::Failed);
        assert!(report.failed[0].error.contains("prompt ceiling"));
    }

    #[test]
    fn existing_output_root_requires_force() {
        let dir = TempDir::new().expect("temp dir");
        let out_root = dir.path().join("src_fixed");
        fs::create_dir_all(&out_root).expect("seed");
        let snapshot = ProjectSnapshot::new(dir.path().join("src"), vec![record("a.py", "x")]);

        let err = run_folder_transform(
            &snapshot,
            FolderTransform::Fix,
            &EchoClient,
            &ModelConfig::default(),
            &options(out_root),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::OutputExists { .. }));
    }

    #[test]
    fn total_failure_leaves_no_output_root_behind() {
        let dir = TempDir::new().expect("temp dir");
        let out_root = dir.path().join("src_fixed");
        let snapshot = ProjectSnapshot::new(
            dir.path().join("src"),
            vec![record("bad.py", "x"), record("lib/bad.rs", "y")],
        );

        let report = run_folder_transform(
            &snapshot,
            FolderTransform::Fix,
            &PickyClient,
            &ModelConfig::default(),
            &options(out_root.clone()),
            &ProgressBar::hidden(),
        )
        .expect("run");
        assert_eq!(report.status(), FolderStatus::Failed);
        assert!(!out_root.exists());

        // A second run does not trip over the failed one.
        let report = run_folder_transform(
            &snapshot,
            FolderTransform::Fix,
            &EchoClient,
            &ModelConfig::default(),
            &options(out_root.clone()),
            &ProgressBar::hidden(),
        )
        .expect("rerun without --force");
        assert_eq!(report.status(), FolderStatus::Complete);
        assert_eq!(fs::read_to_string(out_root.join("lib/bad.rs")).expect("read"), "y");
    }
}
