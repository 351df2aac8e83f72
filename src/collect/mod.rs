//! File collection
//!
//! Turns a file or directory path into a `ProjectSnapshot`: a deterministic,
//! pre-order list of text files with per-file byte caps applied.

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::domain::{Config, FileRecord, ProjectSnapshot};
use crate::error::AppError;
use crate::utils::{decode_text, is_binary_sample, normalize_path, read_capped};

/// Counters from one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub files_seen: usize,
    pub files_collected: usize,
    pub files_truncated: usize,
    pub skipped_binary: usize,
    pub skipped_extension: usize,
    pub skipped_excluded: usize,
    pub skipped_unreadable: usize,
}

/// Collects text files below a root path.
#[derive(Debug, Clone)]
pub struct FileCollector {
    max_file_bytes: u64,
    sample_bytes: usize,
    recursive: bool,
    respect_gitignore: bool,
    include_extensions: Option<HashSet<String>>,
    exclude_globs: Vec<String>,
    stats: CollectStats,
}

impl Default for FileCollector {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FileCollector {
    /// Collector with the limits and filters from `config`. Every text file is
    /// accepted until `include_extensions` is called.
    pub fn from_config(config: &Config) -> Self {
        let mut exclude_globs: Vec<String> = config.exclude_globs.iter().cloned().collect();
        exclude_globs.sort();
        Self {
            max_file_bytes: config.max_file_bytes,
            sample_bytes: config.sample_bytes,
            recursive: true,
            respect_gitignore: config.respect_gitignore,
            include_extensions: None,
            exclude_globs,
            stats: CollectStats::default(),
        }
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Restrict directory walks to these dot-prefixed extensions.
    pub fn include_extensions(mut self, extensions: HashSet<String>) -> Self {
        self.include_extensions = Some(extensions);
        self
    }

    pub fn stats(&self) -> &CollectStats {
        &self.stats
    }

    /// Collect `path` into a snapshot.
    ///
    /// A single file is fatal on any read problem; inside a directory walk,
    /// unreadable entries are logged and skipped.
    pub fn collect(&mut self, path: &Path) -> Result<ProjectSnapshot, AppError> {
        self.stats = CollectStats::default();
        let metadata = std::fs::metadata(path).map_err(|e| AppError::io("inspecting", path, e))?;

        if metadata.is_file() {
            return self.collect_single(path);
        }
        self.collect_dir(path)
    }

    fn collect_single(&mut self, path: &Path) -> Result<ProjectSnapshot, AppError> {
        self.stats.files_seen = 1;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let relative = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| normalize_path(path));

        match self.read_record(path, relative)? {
            Some(record) => {
                self.note_collected(&record);
                Ok(ProjectSnapshot::new(root, vec![record]))
            }
            None => {
                self.stats.skipped_binary += 1;
                Err(AppError::Binary { path: path.to_path_buf() })
            }
        }
    }

    fn collect_dir(&mut self, root: &Path) -> Result<ProjectSnapshot, AppError> {
        let (file_globs, dir_globs) = build_exclude_globsets(&self.exclude_globs)?;

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .follow_links(false)
            .require_git(false)
            .git_global(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .parents(self.respect_gitignore)
            .sort_by_file_name(|a, b| a.cmp(b));
        if !self.recursive {
            builder.max_depth(Some(1));
        }

        let dir_root = root.to_path_buf();
        builder.filter_entry(move |entry| {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) || entry.depth() == 0 {
                return true;
            }
            let relative = relative_to(&dir_root, entry.path());
            let name = entry.file_name().to_string_lossy();
            !(dir_globs.is_match(&relative) || dir_globs.is_match(name.as_ref()))
        });

        let mut files = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry: {err}");
                    self.stats.skipped_unreadable += 1;
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            self.stats.files_seen += 1;
            let path = entry.path();
            let relative = relative_to(root, path);

            if file_globs.is_match(&relative) {
                debug!("Excluded by glob: {relative}");
                self.stats.skipped_excluded += 1;
                continue;
            }
            if !self.extension_allowed(path) {
                self.stats.skipped_extension += 1;
                continue;
            }

            match self.read_record(path, relative) {
                Ok(Some(record)) => {
                    self.note_collected(&record);
                    files.push(record);
                }
                Ok(None) => {
                    debug!("Skipping binary file: {}", path.display());
                    self.stats.skipped_binary += 1;
                }
                Err(err) => {
                    warn!("Skipping {}: {err}", path.display());
                    self.stats.skipped_unreadable += 1;
                }
            }
        }

        debug!(
            "Collected {} of {} files under {}",
            self.stats.files_collected,
            self.stats.files_seen,
            root.display()
        );
        Ok(ProjectSnapshot::new(root.to_path_buf(), files))
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        let Some(allowed) = &self.include_extensions else {
            return true;
        };
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| allowed.contains(&format!(".{}", e.to_lowercase())))
            .unwrap_or(false)
    }

    /// Read one file. `Ok(None)` means it looked binary.
    fn read_record(&self, path: &Path, relative: String) -> Result<Option<FileRecord>, AppError> {
        let (bytes, truncated) =
            read_capped(path, self.max_file_bytes).map_err(|e| AppError::io("reading", path, e))?;

        let sample = &bytes[..bytes.len().min(self.sample_bytes)];
        if is_binary_sample(sample) {
            return Ok(None);
        }
        let Some(content) = decode_text(&bytes) else {
            return Ok(None);
        };

        let size_bytes = if truncated { self.max_file_bytes } else { bytes.len() as u64 };
        Ok(Some(FileRecord { relative_path: relative, content, truncated, size_bytes }))
    }

    fn note_collected(&mut self, record: &FileRecord) {
        self.stats.files_collected += 1;
        if record.truncated {
            self.stats.files_truncated += 1;
        }
    }
}

/// Collect `path` with the limits and filters from `config`. A directory is
/// walked in full when `recursive`, otherwise only its top level is read.
pub fn collect(path: &Path, recursive: bool, config: &Config) -> Result<ProjectSnapshot, AppError> {
    FileCollector::from_config(config).recursive(recursive).collect(path)
}

fn relative_to(root: &Path, path: &Path) -> String {
    normalize_path(path.strip_prefix(root).unwrap_or(path))
}

/// Build the file and directory exclusion sets.
///
/// Directory patterns are the `dir/**` entries with the suffix removed, so a
/// matching directory is pruned instead of walked.
fn build_exclude_globsets(patterns: &[String]) -> Result<(GlobSet, GlobSet), AppError> {
    let mut files = GlobSetBuilder::new();
    let mut dirs = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| AppError::Config(format!("invalid exclude glob '{pattern}': {e}")))?;
        files.add(glob);
        if let Some(dir) = pattern.strip_suffix("/**") {
            let dir_glob = Glob::new(dir)
                .map_err(|e| AppError::Config(format!("invalid exclude glob '{pattern}': {e}")))?;
            dirs.add(dir_glob);
        }
    }
    let build = |builder: GlobSetBuilder| {
        builder.build().map_err(|e| AppError::Config(format!("invalid exclude globs: {e}")))
    };
    Ok((build(files)?, build(dirs)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path();
        write(root, "b.py", b"print('b')\n");
        write(root, "a/z.py", b"print('z')\n");
        write(root, "a-b.py", b"print('ab')\n");
        write(root, "a/y.txt", b"notes\n");
        write(root, "img.png", b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR");
        write(root, ".git/config", b"[core]\n");
        write(root, "node_modules/pkg/index.js", b"module.exports = 1;\n");
        dir
    }

    #[test]
    fn directory_walk_is_sorted_preorder_and_stable() {
        let dir = fixture();
        let first = FileCollector::default().collect(dir.path()).expect("collect");
        let second = FileCollector::default().collect(dir.path()).expect("collect");

        assert_eq!(first.paths(), vec!["a/y.txt", "a/z.py", "a-b.py", "b.py"]);
        assert_eq!(first, second);
    }

    #[test]
    fn binary_and_excluded_files_are_skipped() {
        let dir = fixture();
        let mut collector = FileCollector::default();
        let snapshot = collector.collect(dir.path()).expect("collect");

        assert!(!snapshot.paths().contains(&"img.png"));
        assert!(!snapshot.paths().iter().any(|p| p.starts_with(".git")));
        assert!(!snapshot.paths().iter().any(|p| p.starts_with("node_modules")));
        assert_eq!(collector.stats().skipped_binary, 1);
    }

    #[test]
    fn extension_filter_limits_folder_walks() {
        let dir = fixture();
        let snapshot = FileCollector::default()
            .include_extensions(HashSet::from([".py".to_string()]))
            .collect(dir.path())
            .expect("collect");
        assert_eq!(snapshot.paths(), vec!["a/z.py", "a-b.py", "b.py"]);
    }

    #[test]
    fn non_recursive_collects_top_level_only() {
        let dir = fixture();
        let snapshot =
            FileCollector::default().recursive(false).collect(dir.path()).expect("collect");
        assert_eq!(snapshot.paths(), vec!["a-b.py", "b.py"]);
    }

    #[test]
    fn oversized_file_is_truncated_at_cap() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "big.txt", "x".repeat(100).as_bytes());
        write(dir.path(), "small.txt", b"tiny");

        let snapshot =
            FileCollector::default().max_file_bytes(16).collect(dir.path()).expect("collect");

        let big = &snapshot.files[0];
        assert_eq!(big.relative_path, "big.txt");
        assert!(big.truncated);
        assert_eq!(big.size_bytes, 16);
        assert_eq!(big.content.len(), 16);

        let small = &snapshot.files[1];
        assert!(!small.truncated);
        assert_eq!(small.size_bytes, 4);
    }

    #[test]
    fn single_file_snapshot_uses_file_name() {
        let dir = fixture();
        let snapshot =
            FileCollector::default().collect(&dir.path().join("a/z.py")).expect("collect");
        assert_eq!(snapshot.root, dir.path().join("a"));
        assert_eq!(snapshot.paths(), vec!["z.py"]);
        assert_eq!(snapshot.files[0].content, "print('z')\n");
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let err = FileCollector::default().collect(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn binary_single_file_is_rejected() {
        let dir = fixture();
        let err = FileCollector::default().collect(&dir.path().join("img.png")).unwrap_err();
        assert!(matches!(err, AppError::Binary { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_skipped_in_folder_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = fixture();
        let locked = dir.path().join("b.py");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        if fs::read(&locked).is_ok() {
            // Running as root: permissions are not enforced.
            return;
        }

        let mut collector = FileCollector::default();
        let snapshot = collector.collect(dir.path()).expect("collect");
        assert!(!snapshot.paths().contains(&"b.py"));
        assert_eq!(collector.stats().skipped_unreadable, 1);

        let err = FileCollector::default().collect(&locked).unwrap_err();
        assert!(matches!(err, AppError::Permission { .. }));
    }

    #[test]
    fn collect_applies_config_limits_and_gitignore() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), ".gitignore", b"secret.txt\n");
        write(dir.path(), "secret.txt", b"hunter2\n");
        write(dir.path(), "notes.md", b"# Notes about the project\n");
        write(dir.path(), "sub/deep.rs", b"fn deep() {}\n");
        let config = Config { max_file_bytes: 8, ..Config::default() };

        let snapshot = collect(dir.path(), true, &config).expect("collect");
        assert_eq!(snapshot.paths(), vec![".gitignore", "notes.md", "sub/deep.rs"]);
        assert!(snapshot.files.iter().all(|f| f.size_bytes <= 8));
        assert!(snapshot.files[1].truncated);

        let config = Config { respect_gitignore: false, ..Config::default() };
        let top_level = collect(dir.path(), false, &config).expect("collect");
        assert_eq!(top_level.paths(), vec![".gitignore", "notes.md", "secret.txt"]);
    }
}
