//! Configuration loading for tddgen.
//!
//! The config file is a list of `key=value` lines:
//!
//! ```text
//! monitor_folder=/srv/intake
//! output_folder=/srv/tdd
//! # optional
//! max_attempts=5
//! ```
//!
//! Lines are collected into a TOML table of strings and deserialized with
//! serde, so the rest of the code works with a typed [`Config`].

use crate::error::ConfigError;
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File name looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = ".config";

/// Template looked up next to the executable when `template` is not set.
pub const DEFAULT_TEMPLATE_NAME: &str = "blank.tdd";

/// Injector binary name, without the platform executable suffix.
pub const INJECTOR_NAME: &str = "tddgen";

pub const DEFAULT_EXTENSION: &str = "pdf";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
pub const DEFAULT_DELETE_ATTEMPTS: u32 = 10;
pub const DEFAULT_DELETE_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub output_folder: Option<PathBuf>,
    pub monitor_folder: Option<PathBuf>,
    pub template: Option<PathBuf>,
    /// Injector binary run by the watcher
    pub injector: Option<PathBuf>,
    pub extension: Option<String>,
    #[serde(default, deserialize_with = "from_str")]
    pub max_attempts: Option<u32>,
    #[serde(default, deserialize_with = "from_str")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, deserialize_with = "from_str")]
    pub settle_delay_ms: Option<u64>,
    #[serde(default, deserialize_with = "from_str")]
    pub delete_attempts: Option<u32>,
    #[serde(default, deserialize_with = "from_str")]
    pub delete_delay_ms: Option<u64>,

    /// File this config was loaded from
    #[serde(skip)]
    pub source: PathBuf,
}

impl Config {
    pub fn output_folder(&self) -> Result<&Path, ConfigError> {
        self.require("output_folder", self.output_folder.as_deref())
    }

    pub fn monitor_folder(&self) -> Result<&Path, ConfigError> {
        self.require("monitor_folder", self.monitor_folder.as_deref())
    }

    /// Configured template, or `blank.tdd` next to the executable.
    pub fn template_path(&self) -> PathBuf {
        self.template.clone().unwrap_or_else(|| {
            executable_dir()
                .map(|dir| dir.join(DEFAULT_TEMPLATE_NAME))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_NAME))
        })
    }

    /// Configured injector, else `tddgen` next to the executable, else the
    /// bare name for a PATH lookup.
    pub fn injector_path(&self) -> PathBuf {
        if let Some(path) = self
            .injector
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
        {
            return path.clone();
        }
        let name = format!("{INJECTOR_NAME}{}", std::env::consts::EXE_SUFFIX);
        executable_dir()
            .map(|dir| dir.join(&name))
            .filter(|path| path.exists())
            .unwrap_or_else(|| PathBuf::from(name))
    }

    /// Source document extension without the leading dot, lowercased.
    pub fn extension(&self) -> String {
        self.extension
            .as_deref()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS))
    }

    pub fn delete_attempts(&self) -> u32 {
        self.delete_attempts.unwrap_or(DEFAULT_DELETE_ATTEMPTS).max(1)
    }

    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.delete_delay_ms.unwrap_or(DEFAULT_DELETE_DELAY_MS))
    }

    fn require<'a>(
        &self,
        key: &'static str,
        value: Option<&'a Path>,
    ) -> Result<&'a Path, ConfigError> {
        value
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                key,
                path: self.source.clone(),
            })
    }
}

fn from_str<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| s.trim().parse().map_err(serde::de::Error::custom))
        .transpose()
}

/// Directory holding the running executable.
pub fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// `.config` next to the executable if present, else the platform config dir.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = executable_dir() {
        let local = dir.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Ok(local);
        }
    }
    let dirs = ProjectDirs::from("", "", "tddgen").ok_or(ConfigError::NoConfigDir)?;
    Ok(dirs.config_dir().join("config"))
}

/// Load a config file. A missing file yields an empty config, so required
/// keys are reported by the accessors rather than here.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file {} not found", path.display());
        return Ok(Config {
            source: path.to_path_buf(),
            ..Config::default()
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

/// Parse `key=value` lines. `path` is only used for error messages.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config, ConfigError> {
    let mut table = toml::Table::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax {
                path: path.to_path_buf(),
                line: index + 1,
                text: line.to_string(),
            });
        };
        table.insert(
            key.trim().to_string(),
            toml::Value::String(unquote(value.trim()).to_string()),
        );
    }

    let mut config: Config =
        toml::Value::Table(table)
            .try_into()
            .map_err(|source| ConfigError::Value {
                path: path.to_path_buf(),
                source,
            })?;
    config.source = path.to_path_buf();
    Ok(config)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
