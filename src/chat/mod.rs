//! Interactive chat session
//!
//! A line-oriented loop: input comes from a `LineReader` (a rustyline editor
//! on the terminal), output goes to any `Write`. Lines starting with `/` are
//! directives; everything else is a user turn sent to the model with the
//! whole transcript and the attached files.

use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use crate::assemble::assemble_chat;
use crate::collect::collect;
use crate::domain::{ChatRole, ChatTranscript, Config};
use crate::error::AppError;
use crate::model::{ModelClient, ModelConfig};
use crate::utils::normalize_path;

pub const HELP: &str = "\
Commands:
  /file <path>      attach a file to the conversation
  /project <path>   attach a project folder (replaces the previous one)
  /clear            forget the conversation and all attachments
  /exit             leave the session
  /help             show this message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Processing,
    Terminated,
}

/// A parsed `/` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    File(&'a str),
    Project(&'a str),
    Clear,
    Exit,
    Help,
    /// A known directive missing its argument
    MissingArgument(&'static str),
    Unknown(&'a str),
}

/// Parse a directive line; `None` when the line is a normal message.
pub fn parse_directive(line: &str) -> Option<Directive<'_>> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let directive = match (name, arg.is_empty()) {
        ("file", false) => Directive::File(arg),
        ("file", true) => Directive::MissingArgument("/file <path>"),
        ("project", false) => Directive::Project(arg),
        ("project", true) => Directive::MissingArgument("/project <path>"),
        ("clear", _) => Directive::Clear,
        ("exit" | "quit", _) => Directive::Exit,
        ("help", _) => Directive::Help,
        _ => Directive::Unknown(name),
    };
    Some(directive)
}

/// Where chat input lines come from.
pub trait LineReader {
    /// Show `prompt` and read the next line. `None` ends the session.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Line editor on the controlling terminal, with in-session history.
pub struct TerminalReader {
    editor: DefaultEditor,
}

impl TerminalReader {
    pub fn new() -> io::Result<Self> {
        let editor = DefaultEditor::new().map_err(readline_to_io)?;
        Ok(Self { editor })
    }
}

impl LineReader for TerminalReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            // Ctrl-C and Ctrl-D both leave the session
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(readline_to_io(err)),
        }
    }
}

fn readline_to_io(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(err) => err,
        other => io::Error::other(other.to_string()),
    }
}

pub struct ChatSession<'a> {
    client: &'a dyn ModelClient,
    model_config: ModelConfig,
    config: Config,
    transcript: ChatTranscript,
    state: SessionState,
}

impl<'a> ChatSession<'a> {
    pub fn new(client: &'a dyn ModelClient, model_config: ModelConfig, config: Config) -> Self {
        Self {
            client,
            model_config,
            config,
            transcript: ChatTranscript::default(),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    /// Run until `/exit`, end of input or an interrupt.
    pub fn run<L: LineReader, W: Write>(&mut self, input: &mut L, out: &mut W) -> io::Result<()> {
        let banner = "Chat session started. Type /help for commands, /exit to quit.";
        writeln!(out, "{}", style(banner).dim())?;
        out.flush()?;
        self.state = SessionState::AwaitingInput;

        let prompt = format!("{} ", style("you>").cyan().bold());
        while self.state != SessionState::Terminated {
            match input.read_line(&prompt)? {
                Some(line) => {
                    self.handle_line(&line, out)?;
                    out.flush()?;
                }
                None => {
                    writeln!(out)?;
                    self.state = SessionState::Terminated;
                }
            }
        }
        Ok(())
    }

    /// Handle one input line and return the resulting state.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<SessionState> {
        if self.state == SessionState::Terminated {
            return Ok(self.state);
        }
        let message = line.trim();
        if message.is_empty() {
            self.state = SessionState::AwaitingInput;
            return Ok(self.state);
        }

        match parse_directive(message) {
            Some(directive) => self.apply_directive(directive, out)?,
            None => self.send(message, out)?,
        }
        if self.state != SessionState::Terminated {
            self.state = SessionState::AwaitingInput;
        }
        Ok(self.state)
    }

    fn apply_directive<W: Write>(
        &mut self,
        directive: Directive<'_>,
        out: &mut W,
    ) -> io::Result<()> {
        match directive {
            Directive::File(path) => match self.load_file(Path::new(path)) {
                Ok(name) => writeln!(out, "{} attached {name}", style("ok").green())?,
                Err(err) => report_error(out, &err)?,
            },
            Directive::Project(path) => match self.load_project(Path::new(path)) {
                Ok(count) => {
                    let ok = style("ok").green();
                    writeln!(out, "{ok} attached project {path} ({count} files)")?
                }
                Err(err) => report_error(out, &err)?,
            },
            Directive::Clear => {
                self.transcript.clear();
                writeln!(out, "{} conversation cleared", style("ok").green())?;
            }
            Directive::Exit => self.state = SessionState::Terminated,
            Directive::Help => writeln!(out, "{HELP}")?,
            Directive::MissingArgument(usage) => writeln!(out, "usage: {usage}")?,
            Directive::Unknown(name) => {
                writeln!(out, "unknown command: /{name}")?;
                writeln!(out, "{HELP}")?;
            }
        }
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<String, AppError> {
        if path.is_dir() {
            return Err(AppError::Argument(format!(
                "{} is a directory (use /project)",
                path.display()
            )));
        }
        let snapshot = collect(path, false, &self.config)?;
        let mut names = Vec::new();
        for mut record in snapshot.files {
            // Label by the path as typed; bare file names can collide.
            record.relative_path = normalize_path(path);
            names.push(record.relative_path.clone());
            self.transcript.attach_file(record);
        }
        Ok(names.join(", "))
    }

    fn load_project(&mut self, path: &Path) -> Result<usize, AppError> {
        let snapshot = collect(path, true, &self.config)?;
        let count = snapshot.files.len();
        self.transcript.project = Some(snapshot);
        Ok(count)
    }

    fn send<W: Write>(&mut self, message: &str, out: &mut W) -> io::Result<()> {
        self.state = SessionState::Processing;
        self.transcript.push(ChatRole::User, message);

        let ceiling = self.config.max_prompt_bytes;
        let reply = assemble_chat(&self.transcript, ceiling).and_then(|envelope| {
            debug!(
                "Chat request: {} turns, ~{} tokens",
                self.transcript.turns.len(),
                envelope.estimated_token_count
            );
            self.client.generate(&envelope, &self.model_config).map_err(AppError::from)
        });

        match reply {
            Ok(reply) => {
                writeln!(out, "{} {}", style("assistant>").magenta().bold(), reply.trim_end())?;
                self.transcript.push(ChatRole::Assistant, reply);
            }
            Err(err) => {
                // Withdraw the unanswered turn.
                self.transcript.turns.pop();
                report_error(out, &err)?;
            }
        }
        Ok(())
    }
}

fn report_error<W: Write>(out: &mut W, err: &AppError) -> io::Result<()> {
    writeln!(out, "{} {err}", style("error:").red().bold())
}
