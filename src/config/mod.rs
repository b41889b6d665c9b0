//! Configuration module for adoc-content.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, LogFormat, LoggingSettings, Settings, SettingsError, WorkerMode,
    WorkerSettings, CONFIG_ENV_VAR, LOCAL_CONFIG_FILE,
};
