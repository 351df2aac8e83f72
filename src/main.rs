//! repo-assist: send files, folders and prompts to a hosted LLM

use std::process::ExitCode;

use repo_assist::cli;

fn main() -> ExitCode {
    match cli::run(std::env::args_os()) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            eprintln!("{} {:#}", console::style("error:").for_stderr().red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
