//! TOML-based configuration for adoc-content.
//!
//! Supports a config file (adoc-content.toml) with environment variable
//! expansion in executable paths.
//!
//! Example configuration:
//! ```toml
//! [worker]
//! mode = "process"          # or "thread"
//! path = "${HOME}/.cargo/bin/adoc-content"
//! highlighters = ["rouge"]
//! asciidoctor = "asciidoctor"
//!
//! [processor]
//! safe = "safe"
//! doctype = "article"
//!
//! [processor.attributes]
//! icons = "font"
//! sectnums = true
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::worker::{InitOptions, ProcessorOptions};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ADOC_CONTENT_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "adoc-content.toml";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Worker configuration.
    pub worker: WorkerSettings,

    /// Processor options sent with every conversion request.
    pub processor: ProcessorOptions,

    /// Logging configuration.
    pub logging: LoggingSettings,

    /// File these settings were loaded from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Where the conversion worker runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// A child process speaking NDJSON over stdio.
    #[default]
    Process,
    /// A dedicated OS thread in this process.
    Thread,
}

/// Worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Process or thread worker.
    pub mode: WorkerMode,

    /// Worker executable (defaults to the current executable).
    pub path: Option<String>,

    /// Source highlighters, in order of preference.
    pub highlighters: Vec<String>,

    /// Asciidoctor executable used by the worker.
    pub asciidoctor: Option<String>,
}

impl WorkerSettings {
    /// Options fixed for the worker's lifetime.
    ///
    /// The Asciidoctor path has environment variables expanded; if expansion
    /// fails the path is passed through unchanged.
    pub fn init_options(&self) -> InitOptions {
        InitOptions {
            highlighters: self.highlighters.clone(),
            processor: self
                .asciidoctor
                .as_ref()
                .map(|path| expand_env_vars(path).unwrap_or_else(|_| path.clone())),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&content)?;
        settings.source = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `ADOC_CONTENT_CONFIG`
    /// 2. `./adoc-content.toml`
    /// 3. `~/.config/adoc-content/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("adoc-content").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.next_if_eq(&'{').is_some() {
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
