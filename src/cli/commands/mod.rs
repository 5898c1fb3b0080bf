//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the analysis core
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Tracker access is async. Handlers that talk to the tracker build a tokio
//! runtime and block on their async implementation, so the command surface
//! stays synchronous.

mod completion;
mod config_cmd;
mod content;
mod cross_ref;
mod issue;
mod metrics;
mod relationships;
mod search;

pub use completion::completion;
pub use config_cmd::config;
pub use content::content;
pub use cross_ref::cross_ref;
pub use issue::issue;
pub use metrics::metrics;
pub use relationships::relationships;
pub use search::search;

use anyhow::{Context as _, Result};

use super::args::Command;
use super::Context;
use crate::core::types::{IssueKey, ProjectKey};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Issue { key } => issue(ctx, &key),
        Command::Search {
            project,
            filter,
            limit,
        } => search(ctx, &project, filter, limit),
        Command::Metrics { project } => metrics(ctx, &project),
        Command::Relationships { key, depth } => relationships(ctx, &key, depth),
        Command::CrossRef {
            project_a,
            project_b,
        } => cross_ref(ctx, &project_a, &project_b),
        Command::Content {
            project,
            days,
            issues,
        } => content(ctx, project.as_deref(), days, &issues),
        Command::Config => config(ctx),
        Command::Completion { shell } => completion(shell),
    }
}

fn parse_issue_key(text: &str) -> Result<IssueKey> {
    IssueKey::parse(text).with_context(|| format!("Invalid issue key '{}'", text))
}

fn parse_project_key(text: &str) -> Result<ProjectKey> {
    ProjectKey::new(text).with_context(|| format!("Invalid project key '{}'", text))
}
