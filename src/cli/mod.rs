//! cli
//!
//! Command-line interface layer for issuelens.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It resolves configuration, builds an
//! [`Analyzer`](crate::analysis::Analyzer) over the Jira client, and renders
//! whatever report the analysis core returns.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::analysis::Analyzer;
use crate::core::config::Config;
use crate::tracker::jira::JiraTracker;
use crate::ui::output::{self, Verbosity};

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// JSON output.
    pub json: bool,
    /// Tracker URL override.
    pub url: Option<String>,
    /// Tracker account override.
    pub user: Option<String>,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// The directory to look for workspace config in.
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to determine working directory"),
        }
    }

    /// Load configuration with this context's overrides applied.
    pub fn load_config(&self) -> Result<Config> {
        let cwd = self.working_dir()?;
        let result = Config::load(Some(&cwd)).context("Failed to load config")?;
        for warning in &result.warnings {
            output::warn(
                format!("{} ({})", warning.message, warning.path.display()),
                self.verbosity(),
            );
        }

        let mut config = result.config;
        config
            .override_tracker(self.url.clone(), self.user.clone())
            .context("Invalid command-line tracker settings")?;
        Ok(config)
    }

    /// Build an analyzer over the configured tracker.
    pub fn analyzer(&self) -> Result<Analyzer> {
        let config = self.load_config()?;
        let settings = config
            .tracker_settings()
            .context("Tracker connection is not configured")?;
        let tracker = JiraTracker::from_settings(&settings).context("Failed to create tracker client")?;
        Ok(Analyzer::new(Arc::new(tracker), config.analysis_config()))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        json: cli.json,
        url: cli.url.clone(),
        user: cli.user.clone(),
    };

    commands::dispatch(cli.command, &ctx)
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins; otherwise `--debug` turns on this crate's debug logs.
fn init_tracing(debug: bool) {
    let default = if debug { "issuelens=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
