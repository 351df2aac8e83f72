//! CLI argument merging with config

use crate::domain::Config;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub max_file_bytes: Option<u64>,
    pub max_prompt_bytes: Option<usize>,
    pub respect_gitignore: Option<bool>,
    pub jobs: Option<usize>,
}

pub fn merge_cli_with_config(mut base_config: Config, cli: CliOverrides) -> Config {
    if let Some(model) = cli.model {
        base_config.model = model;
    }
    if let Some(max_tokens) = cli.max_tokens {
        base_config.max_tokens = max_tokens;
    }
    if let Some(temperature) = cli.temperature {
        base_config.temperature = temperature;
    }

    if let Some(max_file_bytes) = cli.max_file_bytes {
        base_config.max_file_bytes = max_file_bytes;
    }
    if let Some(max_prompt_bytes) = cli.max_prompt_bytes {
        base_config.max_prompt_bytes = max_prompt_bytes;
    }
    if let Some(respect_gitignore) = cli.respect_gitignore {
        base_config.respect_gitignore = respect_gitignore;
    }

    if let Some(jobs) = cli.jobs {
        base_config.jobs = jobs.max(1);
    }

    base_config
}
