//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! issuelens has two configuration scopes:
//! - **Global**: User-level settings, usually the tracker connection
//! - **Workspace**: Per-directory analysis tuning
//!
//! Configuration is only ever read.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Workspace config file
//! 4. Environment (`ISSUELENS_URL`, `ISSUELENS_USER`, `ISSUELENS_TOKEN`)
//! 5. CLI flags (applied with [`Config::override_tracker`])
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$ISSUELENS_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/issuelens/config.toml`
//! 3. `~/.issuelens/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use issuelens::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/workspace"))).unwrap();
//! let config = result.config;
//!
//! let settings = config.tracker_settings().unwrap();
//! println!("Tracker: {}", settings.base_url);
//! println!("Depth: {}", config.analysis_config().max_depth);
//! ```

pub mod schema;

pub use schema::{
    AnalysisSection, ContentSection, CrossRefSection, GlobalConfig, TrackerSection,
    WorkspaceConfig,
};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::analysis::{AnalysisConfig, ContentConfig, CrossRefConfig};

/// Environment variable naming the global config file.
pub const CONFIG_ENV: &str = "ISSUELENS_CONFIG";
pub const URL_ENV: &str = "ISSUELENS_URL";
pub const USER_ENV: &str = "ISSUELENS_USER";
pub const TOKEN_ENV: &str = "ISSUELENS_TOKEN";

/// Workspace config location, relative to the working directory.
pub const WORKSPACE_CONFIG: &str = ".issuelens/config.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("missing config value: {0}")]
    MissingValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Tracker values taken from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub url: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
}

impl std::fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvOverrides")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`; empty values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name| lookup(name).filter(|v: &String| !v.trim().is_empty());
        Self {
            url: get(URL_ENV),
            user: get(USER_ENV),
            token: get(TOKEN_ENV),
        }
    }
}

/// Resolved tracker connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub base_url: String,
    pub username: Option<String>,
    pub token: Option<String>,
    pub epic_field: Option<String>,
}

impl std::fmt::Debug for TrackerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("epic_field", &self.epic_field)
            .finish()
    }
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules automatically.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Workspace configuration (if present)
    pub workspace: Option<WorkspaceConfig>,
    /// Environment overrides
    pub env: EnvOverrides,
    /// CLI overrides for the tracker connection
    cli: TrackerSection,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Path to the workspace config file (if loaded)
    workspace_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations and the environment.
    ///
    /// If `workspace` is provided, also loads `.issuelens/config.toml` there.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(workspace: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_from(Self::find_global(), workspace, EnvOverrides::from_env())
    }

    /// Load configuration from explicit sources.
    pub fn load_from(
        global_path: Option<PathBuf>,
        workspace: Option<&Path>,
        env: EnvOverrides,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let global = match &global_path {
            Some(path) => read_config::<GlobalConfig>(path)?,
            None => GlobalConfig::default(),
        };

        let workspace_path = workspace
            .map(|dir| dir.join(WORKSPACE_CONFIG))
            .filter(|path| path.exists());
        let workspace = match &workspace_path {
            Some(path) => Some(read_config::<WorkspaceConfig>(path)?),
            None => None,
        };

        global.validate()?;
        if let Some(ref w) = workspace {
            w.validate()?;
            if w.tracker.as_ref().is_some_and(|t| t.token.is_some()) {
                if let Some(path) = &workspace_path {
                    warnings.push(ConfigWarning {
                        message: format!(
                            "API token stored in workspace config; prefer the global config or ${}",
                            TOKEN_ENV
                        ),
                        path: path.clone(),
                    });
                }
            }
        }
        if let Some(url) = &env.url {
            schema::validate_url(url)?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                workspace,
                env,
                cli: TrackerSection::default(),
                global_path,
                workspace_path,
            },
            warnings,
        })
    }

    /// Locate the global config file.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $ISSUELENS_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/issuelens/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("issuelens/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.issuelens/config.toml
        dirs::home_dir()
            .map(|home| home.join(".issuelens/config.toml"))
            .filter(|path| path.exists())
    }

    /// Apply tracker overrides from command-line flags.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for a malformed URL.
    pub fn override_tracker(
        &mut self,
        base_url: Option<String>,
        username: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = &base_url {
            schema::validate_url(url)?;
        }
        if base_url.is_some() {
            self.cli.base_url = base_url;
        }
        if username.is_some() {
            self.cli.username = username;
        }
        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Resolve the tracker connection.
    ///
    /// # Errors
    ///
    /// Returns `MissingValue` if no base URL is configured anywhere.
    pub fn tracker_settings(&self) -> Result<TrackerSettings, ConfigError> {
        let base_url = self
            .tracker_value(|t| t.base_url.as_ref(), self.env.url.as_ref())
            .ok_or_else(|| {
                ConfigError::MissingValue(format!(
                    "tracker.base_url (set it in the global config, ${} or --url)",
                    URL_ENV
                ))
            })?;

        Ok(TrackerSettings {
            base_url,
            username: self.tracker_value(|t| t.username.as_ref(), self.env.user.as_ref()),
            token: self.tracker_value(|t| t.token.as_ref(), self.env.token.as_ref()),
            epic_field: self.tracker_value(|t| t.epic_field.as_ref(), None),
        })
    }

    /// Resolve analysis tuning.
    pub fn analysis_config(&self) -> AnalysisConfig {
        let mut config = AnalysisConfig::default();

        let workspace = self.workspace.as_ref();
        let analysis = [
            self.global.analysis.as_ref(),
            workspace.and_then(|w| w.analysis.as_ref()),
        ];
        for section in analysis.into_iter().flatten() {
            apply(&mut config.max_depth, section.max_depth);
            apply(&mut config.max_concurrency, section.max_concurrency);
            apply(&mut config.search_limit, section.search_limit);
            apply(&mut config.crossref.search_limit, section.search_limit);
            apply(&mut config.content_window_days, section.content_window_days);
            if let Some(secs) = section.time_budget_secs {
                config.time_budget = Some(Duration::from_secs(secs));
            }
        }

        if let Some(content) = workspace.and_then(|w| w.content.as_ref()) {
            let ContentConfig {
                common_term_ratio,
                top_terms,
                anomaly_factor,
                anomaly_min_repeats,
            } = &mut config.content;
            apply(common_term_ratio, content.common_term_ratio);
            apply(top_terms, content.top_terms);
            apply(anomaly_factor, content.anomaly_factor);
            apply(anomaly_min_repeats, content.anomaly_min_repeats);
        }

        if let Some(crossref) = workspace.and_then(|w| w.crossref.as_ref()) {
            let CrossRefConfig {
                max_evidence_pairs,
                detect_mentions,
                ..
            } = &mut config.crossref;
            apply(max_evidence_pairs, crossref.max_evidence_pairs);
            apply(detect_mentions, crossref.detect_mentions);
        }

        config
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded workspace config file.
    pub fn workspace_config_loaded_from(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }

    /// First tracker value by precedence: CLI, environment, workspace, global.
    fn tracker_value<'a>(
        &'a self,
        field: impl Fn(&'a TrackerSection) -> Option<&'a String>,
        env: Option<&'a String>,
    ) -> Option<String> {
        let workspace = self.workspace.as_ref().and_then(|w| w.tracker.as_ref());
        field(&self.cli)
            .or(env)
            .or_else(|| workspace.and_then(&field))
            .or_else(|| self.global.tracker.as_ref().and_then(&field))
            .cloned()
    }
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Read and parse a config file.
fn read_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
