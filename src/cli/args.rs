//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output
//! - `--url <url>` / `--user <name>`: Tracker connection overrides

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ilens - Read-only relationship and content analysis for issue trackers
#[derive(Parser, Debug)]
#[command(name = "ilens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if ilens was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Tracker base URL (overrides config and ISSUELENS_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Tracker account name (overrides config and ISSUELENS_USER)
    #[arg(long, global = true, value_name = "NAME")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show one issue with its links, comments and history
    #[command(
        name = "issue",
        after_help = "\
EXAMPLES:
    ilens issue PROJ-123
    ilens issue PROJ-123 --json"
    )]
    Issue {
        /// Issue key, e.g. PROJ-123
        key: String,
    },

    /// Search a project's issues
    #[command(
        name = "search",
        after_help = "\
EXAMPLES:
    # Most recent issues first
    ilens search PROJ --filter 'status = \"In Progress\" ORDER BY updated DESC'

    # More results
    ilens search PROJ --limit 200"
    )]
    Search {
        /// Project key
        project: String,

        /// Additional tracker query clause
        #[arg(long, short)]
        filter: Option<String>,

        /// Maximum number of issues to return (default from config, else 50)
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Count a project's issues by type, status and priority
    #[command(
        name = "metrics",
        after_help = "\
EXAMPLES:
    ilens metrics PROJ

    # Machine-readable counts
    ilens metrics PROJ --json"
    )]
    Metrics {
        /// Project key
        project: String,
    },

    /// Map the relationship graph around an issue
    #[command(
        name = "relationships",
        long_about = "Map the relationship graph around an issue.\n\n\
            Follows blocks, duplicates, relates-to, epic and subtask links breadth-first \
            up to --depth hops. Issues beyond the depth limit, or that could not be \
            fetched, are listed as truncated or unresolved instead of failing the command.",
        after_help = "\
EXAMPLES:
    ilens relationships PROJ-123
    ilens relationships PROJ-123 --depth 3 --json"
    )]
    Relationships {
        /// Root issue key
        key: String,

        /// Maximum traversal depth (default from config, else 2)
        #[arg(long, short)]
        depth: Option<usize>,
    },

    /// Find references between two projects
    #[command(
        name = "cross-ref",
        long_about = "Find references between the active issues of two projects.\n\n\
            Reports explicit links crossing the projects, shared components and labels \
            (compared case-insensitively), and issue-key mentions in text. Every \
            reference lists the issue pairs it was found on.",
        after_help = "\
EXAMPLES:
    ilens cross-ref WEB API"
    )]
    CrossRef {
        /// First project key
        project_a: String,

        /// Second project key
        project_b: String,
    },

    /// Analyze content patterns of a project or a set of issues
    #[command(
        name = "content",
        after_help = "\
EXAMPLES:
    # Issues updated in the last 30 days (the default window)
    ilens content PROJ

    # A wider window
    ilens content PROJ --days 90

    # Specific issues
    ilens content --issues PROJ-1,PROJ-7,PROJ-9"
    )]
    Content {
        /// Project key
        #[arg(required_unless_present = "issues", conflicts_with = "issues")]
        project: Option<String>,

        /// Only issues updated within this many days (default from config, else 30)
        #[arg(long)]
        days: Option<u32>,

        /// Analyze these issues instead of a project
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        issues: Vec<String>,
    },

    /// Show the effective configuration
    #[command(name = "config")]
    Config,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for ilens commands.",
        after_help = "\
EXAMPLES:
    # Bash (add to ~/.bashrc)
    ilens completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    ilens completion zsh >> ~/.zshrc

    # Fish
    ilens completion fish > ~/.config/fish/completions/ilens.fish

    # PowerShell
    ilens completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ilens", "issue", "PROJ-1", "--json", "--url", "https://x.io"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.url.as_deref(), Some("https://x.io"));
        assert!(matches!(cli.command, Command::Issue { key } if key == "PROJ-1"));
    }

    #[test]
    fn content_issue_list() {
        let cli = Cli::try_parse_from(["ilens", "content", "--issues", "A-1,A-2"]).unwrap();
        match cli.command {
            Command::Content {
                project, issues, ..
            } => {
                assert!(project.is_none());
                assert_eq!(issues, vec!["A-1", "A-2"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn content_requires_a_target() {
        assert!(Cli::try_parse_from(["ilens", "content"]).is_err());
        assert!(Cli::try_parse_from(["ilens", "content", "A", "--issues", "A-1"]).is_err());
    }

    #[test]
    fn metrics_takes_a_project() {
        let cli = Cli::try_parse_from(["ilens", "metrics", "PROJ"]).unwrap();
        assert!(matches!(cli.command, Command::Metrics { project } if project == "PROJ"));
        assert!(Cli::try_parse_from(["ilens", "metrics"]).is_err());
    }

    #[test]
    fn search_defaults() {
        let cli = Cli::try_parse_from(["ilens", "search", "PROJ"]).unwrap();
        match cli.command {
            Command::Search { limit, filter, .. } => {
                assert_eq!(limit, None);
                assert!(filter.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
