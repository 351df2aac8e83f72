//! Core domain types and models
//!
//! Defines the collected file records, prompt envelopes, mode selections,
//! chat transcripts and the runtime `Config`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A single collected text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the snapshot root, always `/`-separated
    pub relative_path: String,

    /// Decoded file content (possibly cut at the per-file cap)
    pub content: String,

    /// Whether content beyond the per-file cap was dropped
    #[serde(default)]
    pub truncated: bool,

    /// Source bytes represented by `content` (equal to the cap when truncated)
    pub size_bytes: u64,
}

impl FileRecord {
    /// Detected language, derived from the file extension.
    pub fn language(&self) -> String {
        let path = Path::new(&self.relative_path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        get_language(&extension, filename)
    }
}

/// Ordered file records collected from one root path.
///
/// Order is the collector's traversal order: pre-order, entries sorted by
/// name within each directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub root: PathBuf,
    pub files: Vec<FileRecord>,
}

impl ProjectSnapshot {
    pub fn new(root: PathBuf, files: Vec<FileRecord>) -> Self {
        Self { root, files }
    }

    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// How a manifest entry ended up in the envelope body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestStatus {
    Included,
    IncludedTruncated,
    OmittedForSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub status: ManifestStatus,
}

/// Fully assembled payload for one model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEnvelope {
    pub system_role: String,
    pub manifest: Vec<ManifestEntry>,
    pub body: String,
    pub estimated_token_count: usize,
}

impl PromptEnvelope {
    pub fn omitted_files(&self) -> impl Iterator<Item = &str> {
        self.manifest
            .iter()
            .filter(|e| e.status == ManifestStatus::OmittedForSize)
            .map(|e| e.path.as_str())
    }
}

/// Kind of work requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    OneShot,
    Explain,
    Fix,
    Refactor,
    Rewrite,
    Diff,
    Analyze,
    ProjectQa,
    Generate,
    Chat,
}

/// Mode-specific instruction plus the free-form user input that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub instruction: String,
    pub question: Option<String>,
    pub focus: Option<String>,
}

/// Folder-wide transform flavour. Each writes into its own sibling tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderTransform {
    Fix,
    Refactor,
    Rewrite,
}

impl FolderTransform {
    pub fn suffix(self) -> &'static str {
        match self {
            FolderTransform::Fix => "_fixed",
            FolderTransform::Refactor => "_refactored",
            FolderTransform::Rewrite => "_rewritten",
        }
    }

    pub fn task_kind(self) -> TaskKind {
        match self {
            FolderTransform::Fix => TaskKind::Fix,
            FolderTransform::Refactor => TaskKind::Refactor,
            FolderTransform::Rewrite => TaskKind::Rewrite,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            FolderTransform::Fix => "Fixed",
            FolderTransform::Refactor => "Refactored",
            FolderTransform::Rewrite => "Rewrote",
        }
    }
}

/// The one operation selected for an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSelection {
    OneShot { prompt: String, attach: Option<PathBuf>, out: Option<PathBuf> },
    FileFix { path: PathBuf, out: Option<PathBuf> },
    FileExplain { path: PathBuf, out: Option<PathBuf> },
    FileRefactor { path: PathBuf, out: Option<PathBuf> },
    FileDiff { old: PathBuf, new: PathBuf, out: Option<PathBuf> },
    FolderFix { root: PathBuf },
    FolderRefactor { root: PathBuf },
    FolderRewrite { root: PathBuf },
    Analyze { root: PathBuf, focus: Option<String>, out: Option<PathBuf> },
    ProjectQA { root: PathBuf, question: String, out: Option<PathBuf> },
    GenerateFile { description: String, out: PathBuf, project_root: Option<PathBuf> },
    Chat,
}

impl ModeSelection {
    pub fn name(&self) -> &'static str {
        match self {
            ModeSelection::OneShot { .. } => "one-shot",
            ModeSelection::FileFix { .. } => "fix",
            ModeSelection::FileExplain { .. } => "explain",
            ModeSelection::FileRefactor { .. } => "refactor",
            ModeSelection::FileDiff { .. } => "diff",
            ModeSelection::FolderFix { .. } => "fix-folder",
            ModeSelection::FolderRefactor { .. } => "refactor-folder",
            ModeSelection::FolderRewrite { .. } => "rewrite-folder",
            ModeSelection::Analyze { .. } => "analyze-folder",
            ModeSelection::ProjectQA { .. } => "project-qa",
            ModeSelection::GenerateFile { .. } => "generate-file",
            ModeSelection::Chat => "chat",
        }
    }

    /// Folder-wide transform and its input root, if this is one.
    pub fn folder_transform(&self) -> Option<(FolderTransform, &Path)> {
        match self {
            ModeSelection::FolderFix { root } => Some((FolderTransform::Fix, root)),
            ModeSelection::FolderRefactor { root } => Some((FolderTransform::Refactor, root)),
            ModeSelection::FolderRewrite { root } => Some((FolderTransform::Rewrite, root)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Everything a chat session remembers. Cleared only by `/clear`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTranscript {
    pub turns: Vec<ChatTurn>,
    pub files: Vec<FileRecord>,
    pub project: Option<ProjectSnapshot>,
}

impl ChatTranscript {
    pub fn push(&mut self, role: ChatRole, text: impl Into<String>) {
        self.turns.push(ChatTurn { role, text: text.into() });
    }

    /// Attach a file, replacing an earlier attachment with the same path.
    pub fn attach_file(&mut self, record: FileRecord) {
        self.files.retain(|f| f.relative_path != record.relative_path);
        self.files.push(record);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.files.clear();
        self.project = None;
    }
}

/// Custom deserializer for extensions: normalizes to dot-prefixed format.
///
/// Accepts a comma-separated string (as environment variables provide) or a
/// list, adds a leading dot if missing and strips whitespace.
fn deserialize_extensions<'de, D>(deserializer: D) -> Result<HashSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct ExtensionsVisitor;

    fn normalize(ext: &str) -> Option<String> {
        let trimmed = ext.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lowered = trimmed.to_lowercase();
        if lowered.starts_with('.') {
            Some(lowered)
        } else {
            Some(format!(".{}", lowered))
        }
    }

    impl<'de> Visitor<'de> for ExtensionsVisitor {
        type Value = HashSet<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or array of extensions")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.split(',').filter_map(normalize).collect())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut result = HashSet::new();
            while let Some(ext) = seq.next_element::<String>()? {
                if let Some(normalized) = normalize(&ext) {
                    result.insert(normalized);
                }
            }
            Ok(result)
        }
    }

    deserializer.deserialize_any(ExtensionsVisitor)
}

/// Custom deserializer for globs: accepts string (comma-separated) or array.
fn deserialize_globs<'de, D>(deserializer: D) -> Result<HashSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct GlobsVisitor;

    impl<'de> Visitor<'de> for GlobsVisitor {
        type Value = HashSet<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or array of glob patterns")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut result = HashSet::new();
            while let Some(glob) = seq.next_element::<String>()? {
                let trimmed = glob.trim();
                if !trimmed.is_empty() {
                    result.insert(trimmed.to_string());
                }
            }
            Ok(result)
        }
    }

    deserializer.deserialize_any(GlobsVisitor)
}

/// Main configuration for repo-assist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Model
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    // Transport
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Name of the environment variable holding the API credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    // Collection limits
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default = "default_max_prompt_bytes")]
    pub max_prompt_bytes: usize,

    #[serde(default = "default_sample_bytes")]
    pub sample_bytes: usize,

    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    /// Extensions eligible for folder-wide transforms
    #[serde(
        default = "default_include_extensions",
        alias = "include_ext",
        deserialize_with = "deserialize_extensions"
    )]
    pub include_extensions: HashSet<String>,

    #[serde(
        default = "default_exclude_globs",
        alias = "exclude_glob",
        deserialize_with = "deserialize_globs"
    )]
    pub exclude_globs: HashSet<String>,

    /// Worker threads for folder-wide transforms
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_file_bytes: default_max_file_bytes(),
            max_prompt_bytes: default_max_prompt_bytes(),
            sample_bytes: default_sample_bytes(),
            respect_gitignore: true,
            include_extensions: default_include_extensions(),
            exclude_globs: default_exclude_globs(),
            jobs: default_jobs(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.1
}

fn default_api_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_max_file_bytes() -> u64 {
    262_144 // 256 KiB
}

fn default_max_prompt_bytes() -> usize {
    600_000
}

fn default_sample_bytes() -> usize {
    8192
}

fn default_jobs() -> usize {
    4
}

/// Source extensions that folder-wide transforms rewrite.
pub fn default_include_extensions() -> HashSet<String> {
    [
        // Python
        ".py",
        ".pyw",
        // C/C++
        ".c",
        ".cpp",
        ".cc",
        ".cxx",
        ".h",
        ".hpp",
        // JVM
        ".java",
        ".kt",
        ".kts",
        // JavaScript/TypeScript
        ".js",
        ".jsx",
        ".ts",
        ".tsx",
        // C#
        ".cs",
        // Go
        ".go",
        // Rust
        ".rs",
        // PHP
        ".php",
        // Web
        ".html",
        ".htm",
        ".css",
        // Data
        ".json",
        ".yaml",
        ".yml",
        ".xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_exclude_globs() -> HashSet<String> {
    [
        // Version control
        ".git/**",
        ".svn/**",
        ".hg/**",
        // Dependencies and build outputs
        "node_modules/**",
        "target/**",
        ".venv/**",
        "venv/**",
        "__pycache__/**",
        "dist/**",
        "build/**",
        // IDE/Editor
        ".idea/**",
        ".vscode/**",
        // Caches
        ".cache/**",
        ".pytest_cache/**",
        ".mypy_cache/**",
        "*.pyc",
        // Misc
        ".DS_Store",
        "*.min.js",
        "*.min.css",
        "*.map",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Get language from file extension or special filename.
pub fn get_language(extension: &str, filename: &str) -> String {
    let ext = extension.to_lowercase();
    let lang = match ext.as_str() {
        ".py" | ".pyw" | ".pyi" => "python",
        ".c" | ".cpp" | ".cc" | ".cxx" | ".h" | ".hpp" => "cpp",
        ".java" => "java",
        ".kt" | ".kts" => "kotlin",
        ".js" | ".jsx" | ".mjs" | ".cjs" => "javascript",
        ".ts" | ".tsx" => "typescript",
        ".cs" => "csharp",
        ".go" => "go",
        ".rs" => "rust",
        ".php" => "php",
        ".html" | ".htm" => "html",
        ".css" => "css",
        ".json" => "json",
        ".yaml" | ".yml" => "yaml",
        ".xml" => "xml",
        ".toml" => "toml",
        ".md" => "markdown",
        ".sh" | ".bash" => "bash",
        _ => {
            let name = filename.to_lowercase();
            if name == "dockerfile" {
                return "dockerfile".to_string();
            }
            if name == "makefile" {
                return "makefile".to_string();
            }
            "text"
        }
    };
    lang.to_string()
}
