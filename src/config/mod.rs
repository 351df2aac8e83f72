//! Configuration loading
//!
//! Layers, lowest to highest: built-in defaults, a config file, `REPO_ASSIST_*`
//! environment variables, then command-line overrides.

mod merge;

pub use merge::{merge_cli_with_config, CliOverrides};

use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::Config;
use crate::error::AppError;

pub const ENV_PREFIX: &str = "REPO_ASSIST_";

/// File names searched in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAMES: [&str; 4] =
    ["repo-assist.toml", ".repo-assist.toml", ".repo-assist.yml", ".repo-assist.yaml"];

/// Locate the config file: the explicit path, else the first known name under `anchor`.
pub fn find_config_file(
    anchor: &Path,
    explicit: Option<&Path>,
) -> Result<Option<PathBuf>, AppError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(AppError::NotFound { path: path.to_path_buf() });
        }
        return Ok(Some(path.to_path_buf()));
    }
    Ok(CONFIG_FILE_NAMES.iter().map(|name| anchor.join(name)).find(|p| p.is_file()))
}

/// Load the layered configuration (without CLI overrides).
pub fn load_config(anchor: &Path, explicit: Option<&Path>) -> Result<Config, AppError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(path) = find_config_file(anchor, explicit)? {
        debug!("Loading config from {}", path.display());
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        figment = if is_yaml {
            figment.merge(Yaml::file(&path))
        } else {
            figment.merge(Toml::file(&path))
        };
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX))
        .extract::<Config>()
        .map_err(|e| AppError::Config(e.to_string()))
}
