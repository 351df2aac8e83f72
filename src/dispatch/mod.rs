//! Argument parsing and mode selection
//!
//! Parsing is pure: argv in, `Invocation` out. Exactly one mode is selected by
//! a fixed priority, regardless of the order flags appear in:
//!
//! 1. `--chat`
//! 2. `--analyze-folder`
//! 3. `--project-qa`
//! 4. `--generate-file`
//! 5. `--fix-folder` / `--refactor-folder` / `--rewrite-folder`
//! 6. `--fix` / `--explain` / `--refactor` / `--diff` / `-f`
//! 7. one-shot prompt
//!
//! Two flags from the same tier conflict; flags from lower tiers than the
//! selected mode are ignored.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::CliOverrides;
use crate::domain::ModeSelection;
use crate::error::AppError;

/// Send files, folders and prompts to a hosted LLM and write back the response
#[derive(Parser, Debug, Default)]
#[command(name = "repo-assist")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Prompt text (one-shot mode, the question for -f, or for --project-qa)
    #[arg(value_name = "PROMPT")]
    pub prompt: Vec<String>,

    /// Attach a file to the prompt
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Fix bugs in a single file
    #[arg(long, value_name = "FILE")]
    pub fix: Option<PathBuf>,

    /// Explain a single file
    #[arg(long, value_name = "FILE")]
    pub explain: Option<PathBuf>,

    /// Refactor a single file
    #[arg(long, value_name = "FILE")]
    pub refactor: Option<PathBuf>,

    /// Compare two files
    #[arg(long, num_args = 1..=2, value_names = ["FILE_OLD", "FILE_NEW"])]
    pub diff: Option<Vec<PathBuf>>,

    /// Fix every eligible file under a folder into <FOLDER>_fixed
    #[arg(long, value_name = "FOLDER")]
    pub fix_folder: Option<PathBuf>,

    /// Refactor every eligible file under a folder into <FOLDER>_refactored
    #[arg(long, value_name = "FOLDER")]
    pub refactor_folder: Option<PathBuf>,

    /// Rewrite every eligible file under a folder into <FOLDER>_rewritten
    #[arg(long, value_name = "FOLDER")]
    pub rewrite_folder: Option<PathBuf>,

    /// Analyze a whole project
    #[arg(long, value_name = "FOLDER")]
    pub analyze_folder: Option<PathBuf>,

    /// Focus area for --analyze-folder
    #[arg(long, value_name = "TEXT")]
    pub focus: Option<String>,

    /// Ask a question about a project
    #[arg(long, value_name = "FOLDER")]
    pub project_qa: Option<PathBuf>,

    /// Question for --project-qa (alternative to the positional prompt)
    #[arg(long, value_name = "TEXT")]
    pub question: Option<String>,

    /// Generate a new file from a description (requires --out)
    #[arg(long, value_name = "DESCRIPTION")]
    pub generate_file: Option<String>,

    /// Project used as context for --generate-file
    #[arg(long, value_name = "FOLDER")]
    pub project_root: Option<PathBuf>,

    /// Start an interactive chat session
    #[arg(long)]
    pub chat: bool,

    /// Write the response to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Overwrite existing output files and folders
    #[arg(long)]
    pub force: bool,

    /// Model identifier
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Maximum tokens in the response
    #[arg(long, value_name = "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Per-file read cap in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_file_bytes: Option<u64>,

    /// Prompt body ceiling in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_prompt_bytes: Option<usize>,

    /// Ignore .gitignore rules when walking folders
    #[arg(long)]
    pub no_gitignore: bool,

    /// Worker threads for folder transforms
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Path to config file (repo-assist.toml or .repo-assist.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Options shared by every mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub verbose: bool,
    pub force: bool,
    pub config: Option<PathBuf>,
    pub overrides: CliOverrides,
}

/// The parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub mode: ModeSelection,
    pub options: GlobalOptions,
    /// Flags that were given but have no effect on the selected mode
    pub ignored_flags: Vec<&'static str>,
}

/// Parse argv (including the program name) into an invocation.
///
/// Help, version and malformed flags come back as `AppError::Usage`.
pub fn dispatch<I, T>(argv: I) -> Result<Invocation, AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = CliArgs::try_parse_from(argv)?;
    select(args)
}

/// Pick the mode for already-parsed arguments.
pub fn select(args: CliArgs) -> Result<Invocation, AppError> {
    let options = GlobalOptions {
        verbose: args.verbose,
        force: args.force,
        config: args.config.clone(),
        overrides: CliOverrides {
            model: args.model.clone(),
            max_tokens: args.max_tokens,
            temperature: args.temperature,
            max_file_bytes: args.max_file_bytes,
            max_prompt_bytes: args.max_prompt_bytes,
            respect_gitignore: args.no_gitignore.then_some(false),
            jobs: args.jobs,
        },
    };

    let given = GivenFlags::from(&args);
    let mode = select_mode(args)?;
    let ignored_flags = given.unused_by(&mode);

    Ok(Invocation { mode, options, ignored_flags })
}

fn select_mode(args: CliArgs) -> Result<ModeSelection, AppError> {
    let prompt = joined_prompt(&args.prompt);

    if args.chat {
        return Ok(ModeSelection::Chat);
    }

    if let Some(root) = args.analyze_folder {
        return Ok(ModeSelection::Analyze { root, focus: args.focus, out: args.out });
    }

    if let Some(root) = args.project_qa {
        let question = non_blank(args.question)
            .or(prompt)
            .ok_or_else(|| AppError::missing("question for --project-qa (PROMPT or --question)"))?;
        return Ok(ModeSelection::ProjectQA { root, question, out: args.out });
    }

    if let Some(description) = args.generate_file {
        let description = non_blank(Some(description))
            .ok_or_else(|| AppError::missing("description for --generate-file"))?;
        let out = args.out.ok_or_else(|| AppError::missing("--out for --generate-file"))?;
        let project_root = args.project_root;
        return Ok(ModeSelection::GenerateFile { description, out, project_root });
    }

    let folder_flags = [
        ("--fix-folder", args.fix_folder.is_some()),
        ("--refactor-folder", args.refactor_folder.is_some()),
        ("--rewrite-folder", args.rewrite_folder.is_some()),
    ];
    check_tier(&folder_flags)?;
    if let Some(root) = args.fix_folder {
        return Ok(ModeSelection::FolderFix { root });
    }
    if let Some(root) = args.refactor_folder {
        return Ok(ModeSelection::FolderRefactor { root });
    }
    if let Some(root) = args.rewrite_folder {
        return Ok(ModeSelection::FolderRewrite { root });
    }

    let file_flags = [
        ("--fix", args.fix.is_some()),
        ("--explain", args.explain.is_some()),
        ("--refactor", args.refactor.is_some()),
        ("--diff", args.diff.is_some()),
        ("--file", args.file.is_some()),
    ];
    check_tier(&file_flags)?;
    let out = args.out;
    if let Some(path) = args.fix {
        return Ok(ModeSelection::FileFix { path, out });
    }
    if let Some(path) = args.explain {
        return Ok(ModeSelection::FileExplain { path, out });
    }
    if let Some(path) = args.refactor {
        return Ok(ModeSelection::FileRefactor { path, out });
    }
    if let Some(paths) = args.diff {
        let mut paths = paths.into_iter();
        return match (paths.next(), paths.next()) {
            (Some(old), Some(new)) => Ok(ModeSelection::FileDiff { old, new, out }),
            (Some(_), None) => Err(AppError::missing("FILE_NEW for --diff")),
            _ => Err(AppError::missing("FILE_OLD and FILE_NEW for --diff")),
        };
    }
    if let Some(path) = args.file {
        let prompt = prompt.ok_or_else(|| AppError::missing("PROMPT for --file"))?;
        return Ok(ModeSelection::OneShot { prompt, attach: Some(path), out });
    }

    let prompt = prompt.ok_or_else(|| AppError::missing("PROMPT"))?;
    Ok(ModeSelection::OneShot { prompt, attach: None, out })
}

/// Reject two set flags from the same tier, naming them in declaration order.
fn check_tier(flags: &[(&'static str, bool)]) -> Result<(), AppError> {
    let mut set = flags.iter().filter(|(_, present)| *present).map(|(name, _)| *name);
    match (set.next(), set.next()) {
        (Some(first), Some(second)) => Err(AppError::conflict(first, second)),
        _ => Ok(()),
    }
}

fn joined_prompt(words: &[String]) -> Option<String> {
    non_blank(Some(words.join(" ")))
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Which mode-shaping flags were present on the command line.
#[derive(Debug, Default)]
struct GivenFlags {
    flags: Vec<&'static str>,
}

impl From<&CliArgs> for GivenFlags {
    fn from(args: &CliArgs) -> Self {
        let candidates = [
            ("--analyze-folder", args.analyze_folder.is_some()),
            ("--focus", args.focus.is_some()),
            ("--project-qa", args.project_qa.is_some()),
            ("--question", args.question.is_some()),
            ("--generate-file", args.generate_file.is_some()),
            ("--project-root", args.project_root.is_some()),
            ("--fix-folder", args.fix_folder.is_some()),
            ("--refactor-folder", args.refactor_folder.is_some()),
            ("--rewrite-folder", args.rewrite_folder.is_some()),
            ("--fix", args.fix.is_some()),
            ("--explain", args.explain.is_some()),
            ("--refactor", args.refactor.is_some()),
            ("--diff", args.diff.is_some()),
            ("--file", args.file.is_some()),
            ("--out", args.out.is_some()),
            ("PROMPT", !args.prompt.is_empty()),
        ];
        Self { flags: candidates.iter().filter(|(_, set)| *set).map(|(name, _)| *name).collect() }
    }
}

impl GivenFlags {
    fn unused_by(&self, mode: &ModeSelection) -> Vec<&'static str> {
        let used: &[&str] = match mode {
            ModeSelection::Chat => &[],
            ModeSelection::Analyze { .. } => &["--analyze-folder", "--focus", "--out"],
            ModeSelection::ProjectQA { .. } => &["--project-qa", "--question", "PROMPT", "--out"],
            ModeSelection::GenerateFile { .. } => &["--generate-file", "--project-root", "--out"],
            ModeSelection::FolderFix { .. } => &["--fix-folder"],
            ModeSelection::FolderRefactor { .. } => &["--refactor-folder"],
            ModeSelection::FolderRewrite { .. } => &["--rewrite-folder"],
            ModeSelection::FileFix { .. } => &["--fix", "--out"],
            ModeSelection::FileExplain { .. } => &["--explain", "--out"],
            ModeSelection::FileRefactor { .. } => &["--refactor", "--out"],
            ModeSelection::FileDiff { .. } => &["--diff", "--out"],
            ModeSelection::OneShot { .. } => &["--file", "PROMPT", "--out"],
        };
        self.flags.iter().copied().filter(|flag| !used.contains(flag)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(args: &[&str]) -> Result<Invocation, AppError> {
        dispatch(std::iter::once("repo-assist").chain(args.iter().copied()))
    }

    fn mode(args: &[&str]) -> ModeSelection {
        parse(args).expect("valid invocation").mode
    }

    #[test]
    fn one_shot_joins_positional_words() {
        assert_eq!(
            mode(&["explain", "monads", "briefly"]),
            ModeSelection::OneShot {
                prompt: "explain monads briefly".to_string(),
                attach: None,
                out: None
            }
        );
    }

    #[test]
    fn chat_wins_regardless_of_flag_order() {
        assert_eq!(mode(&["--chat", "--fix", "a.py"]), ModeSelection::Chat);
        assert_eq!(mode(&["--fix", "a.py", "--chat"]), ModeSelection::Chat);

        let invocation = parse(&["--fix", "a.py", "--chat"]).expect("valid");
        assert_eq!(invocation.ignored_flags, vec!["--fix"]);
    }

    #[test]
    fn higher_tier_beats_lower_tier() {
        let selected =
            mode(&["--fix-folder", "src", "--analyze-folder", "proj", "--focus", "perf"]);
        assert_eq!(
            selected,
            ModeSelection::Analyze {
                root: PathBuf::from("proj"),
                focus: Some("perf".to_string()),
                out: None
            }
        );

        let selected = mode(&["--explain", "a.rs", "--rewrite-folder", "src"]);
        assert_eq!(selected, ModeSelection::FolderRewrite { root: PathBuf::from("src") });
    }

    #[test]
    fn same_tier_flags_conflict() {
        let err = parse(&["--fix", "a.py", "--refactor", "b.py"]).unwrap_err();
        match err {
            AppError::ArgumentConflict { first, second } => {
                assert_eq!(first, "--fix");
                assert_eq!(second, "--refactor");
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let err = parse(&["--fix-folder", "a", "--rewrite-folder", "b"]).unwrap_err();
        assert!(matches!(err, AppError::ArgumentConflict { .. }));
    }

    #[test]
    fn diff_requires_two_paths() {
        let err = parse(&["--diff", "old.rs"]).unwrap_err();
        assert!(matches!(err, AppError::Argument(_)));
        assert!(err.to_string().contains("FILE_NEW"));

        assert_eq!(
            mode(&["--diff", "old.rs", "new.rs"]),
            ModeSelection::FileDiff {
                old: PathBuf::from("old.rs"),
                new: PathBuf::from("new.rs"),
                out: None
            }
        );
    }

    #[test]
    fn generate_file_requires_out() {
        let err = parse(&["--generate-file", "a CLI parser"]).unwrap_err();
        assert!(err.to_string().contains("--out"));

        assert_eq!(
            mode(&["--generate-file", "a CLI parser", "--out", "parser.rs"]),
            ModeSelection::GenerateFile {
                description: "a CLI parser".to_string(),
                out: PathBuf::from("parser.rs"),
                project_root: None
            }
        );
    }

    #[test]
    fn project_qa_takes_question_from_flag_or_prompt() {
        let from_flag = mode(&["--project-qa", "proj", "--question", "where is main?"]);
        let from_prompt = mode(&["--project-qa", "proj", "where", "is", "main?"]);
        assert_eq!(from_flag, from_prompt);

        let err = parse(&["--project-qa", "proj"]).unwrap_err();
        assert!(err.to_string().contains("missing required value"));
    }

    #[test]
    fn attach_file_needs_a_prompt() {
        let err = parse(&["-f", "notes.md"]).unwrap_err();
        assert!(err.to_string().contains("PROMPT"));

        match mode(&["-f", "notes.md", "summarize", "this"]) {
            ModeSelection::OneShot { prompt, attach, .. } => {
                assert_eq!(prompt, "summarize this");
                assert_eq!(attach.as_deref(), Some(Path::new("notes.md")));
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn empty_invocation_is_an_argument_error() {
        let err = parse(&[]).unwrap_err();
        assert!(matches!(err, AppError::Argument(_)));
    }

    #[test]
    fn global_options_become_overrides() {
        let invocation = parse(&[
            "--model", "m", "--max-tokens", "10", "--jobs", "2", "--no-gitignore", "--force", "hi",
        ])
        .expect("valid");
        let options = invocation.options;
        assert!(options.force);
        assert_eq!(options.overrides.model.as_deref(), Some("m"));
        assert_eq!(options.overrides.max_tokens, Some(10));
        assert_eq!(options.overrides.jobs, Some(2));
        assert_eq!(options.overrides.respect_gitignore, Some(false));
    }
}
