//! Command-line entry point for repo-assist
//!
//! Parses argv, sets up logging, loads configuration, checks the credential
//! and runs the selected mode.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::{self, Write};
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod folder;
mod single;

use crate::chat::{ChatSession, TerminalReader};
use crate::config::{load_config, merge_cli_with_config};
use crate::dispatch::dispatch;
use crate::domain::{Config, ModeSelection};
use crate::error::AppError;
use crate::model::{AnthropicClient, ModelClient, ModelConfig};

/// Everything a mode needs besides the client.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Config,
    pub model: ModelConfig,
    pub force: bool,
    pub show_progress: bool,
}

impl RunContext {
    pub fn new(config: Config, force: bool) -> Self {
        Self {
            model: ModelConfig::from_config(&config),
            config,
            force,
            show_progress: false,
        }
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// Folder transform where some, but not all, files failed
    CompletedWithWarnings,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::CompletedWithWarnings => 3,
        }
    }
}

pub fn run<I, T>(argv: I) -> Result<RunStatus>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let invocation = match dispatch(argv) {
        Ok(invocation) => invocation,
        // Help, version and malformed flags are printed by clap itself.
        Err(AppError::Usage(err)) => err.exit(),
        Err(err) => return Err(err.into()),
    };

    // Wire verbose flag to the tracing log level.
    // RUST_LOG in the environment always takes precedence; --verbose falls back
    // to DEBUG.
    let filter = if invocation.options.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    for flag in &invocation.ignored_flags {
        debug!("Ignoring {} for {} mode", flag, invocation.mode.name());
    }

    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    let file_config = load_config(&cwd, invocation.options.config.as_deref())?;
    let config = merge_cli_with_config(file_config, invocation.options.overrides.clone());

    let api_key = read_credential(&config.api_key_env)?;
    let client = AnthropicClient::new(api_key, &config)?;

    let mut ctx = RunContext::new(config, invocation.options.force);
    ctx.show_progress = console::Term::stderr().is_term();
    info!("Running {} mode with model {}", invocation.mode.name(), ctx.model.model);

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    Ok(execute(&invocation.mode, &ctx, &client, &mut stdout)?)
}

/// Read the API credential from `var`. Blank values count as missing.
pub fn read_credential(var: &str) -> Result<String, AppError> {
    std::env::var(var)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::MissingCredential { var: var.to_string() })
}

/// Run one mode against `client`, sending model text to `stdout`.
pub fn execute<W: Write>(
    mode: &ModeSelection,
    ctx: &RunContext,
    client: &dyn ModelClient,
    stdout: &mut W,
) -> Result<RunStatus, AppError> {
    if let Some((transform, root)) = mode.folder_transform() {
        return folder::run(transform, root, ctx, client);
    }
    match mode {
        ModeSelection::Chat => {
            let mut input =
                TerminalReader::new().map_err(|e| AppError::io("opening", "<terminal>", e))?;
            ChatSession::new(client, ctx.model.clone(), ctx.config.clone())
                .run(&mut input, stdout)
                .map_err(|e| AppError::io("reading", "<stdin>", e))?;
            Ok(RunStatus::Success)
        }
        _ => single::run(mode, ctx, client, stdout),
    }
}
