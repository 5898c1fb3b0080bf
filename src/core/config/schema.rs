//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$ISSUELENS_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/issuelens/config.toml`
//! 3. `~/.issuelens/config.toml`
//!
//! # Workspace Config
//!
//! Located at `.issuelens/config.toml` in the working directory.
//!
//! # Validation
//!
//! Values are validated after parsing: URLs must be http(s), ratios must lie
//! in (0, 1], and counts must be positive.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// [tracker]
/// base_url = "https://example.atlassian.net"
/// username = "me@example.com"
/// token = "..."
/// epic_field = "customfield_10014"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Tracker connection
    pub tracker: Option<TrackerSection>,

    /// Analysis defaults shared by every workspace
    pub analysis: Option<AnalysisSection>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tracker) = &self.tracker {
            tracker.validate()?;
        }
        if let Some(analysis) = &self.analysis {
            analysis.validate()?;
        }
        Ok(())
    }
}

/// Workspace configuration.
///
/// # Example
///
/// ```toml
/// [analysis]
/// max_depth = 3
/// time_budget_secs = 20
///
/// [content]
/// common_term_ratio = 0.2
///
/// [crossref]
/// detect_mentions = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Tracker overrides for this workspace
    pub tracker: Option<TrackerSection>,

    pub analysis: Option<AnalysisSection>,

    pub content: Option<ContentSection>,

    pub crossref: Option<CrossRefSection>,
}

impl WorkspaceConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tracker) = &self.tracker {
            tracker.validate()?;
        }
        if let Some(analysis) = &self.analysis {
            analysis.validate()?;
        }
        if let Some(content) = &self.content {
            content.validate()?;
        }
        if let Some(crossref) = &self.crossref {
            crossref.validate()?;
        }
        Ok(())
    }
}

/// Tracker connection settings.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerSection {
    /// Base URL, e.g. "https://example.atlassian.net"
    pub base_url: Option<String>,

    /// Account name for basic auth
    pub username: Option<String>,

    /// API token
    pub token: Option<String>,

    /// Custom field holding the epic key on older instances
    pub epic_field: Option<String>,
}

impl std::fmt::Debug for TrackerSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerSection")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("epic_field", &self.epic_field)
            .finish()
    }
}

impl TrackerSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.base_url {
            validate_url(url)?;
        }
        if let Some(field) = &self.epic_field {
            if field.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "tracker.epic_field cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Check that `url` is an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "invalid tracker URL '{}', must start with http:// or https://",
                url
            ))
        })?;
    if rest.trim_matches('/').is_empty() {
        return Err(ConfigError::InvalidValue(format!(
            "invalid tracker URL '{}', missing host",
            url
        )));
    }
    Ok(())
}

/// Traversal and search tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
    /// Relationship traversal depth (default: 2)
    pub max_depth: Option<usize>,

    /// Concurrent fetches per traversal level (default: 8)
    pub max_concurrency: Option<usize>,

    /// Wall-clock budget per operation, in seconds
    pub time_budget_secs: Option<u64>,

    /// Maximum issues loaded by project searches (default: 1000)
    pub search_limit: Option<usize>,

    /// Content analysis window, in days (default: 30)
    pub content_window_days: Option<u32>,
}

impl AnalysisSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("analysis.max_depth", self.max_depth)?;
        positive("analysis.max_concurrency", self.max_concurrency)?;
        positive("analysis.search_limit", self.search_limit)?;
        positive("analysis.time_budget_secs", self.time_budget_secs)?;
        positive("analysis.content_window_days", self.content_window_days)?;
        Ok(())
    }
}

/// Content analysis tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ContentSection {
    /// Fraction of issues a common term must appear in (default: 0.1)
    pub common_term_ratio: Option<f64>,

    pub top_terms: Option<usize>,

    pub anomaly_factor: Option<f64>,

    pub anomaly_min_repeats: Option<usize>,
}

impl ContentSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ratio) = self.common_term_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "content.common_term_ratio must be in (0, 1], got {}",
                    ratio
                )));
            }
        }
        if let Some(factor) = self.anomaly_factor {
            if !(factor >= 1.0 && factor.is_finite()) {
                return Err(ConfigError::InvalidValue(format!(
                    "content.anomaly_factor must be at least 1, got {}",
                    factor
                )));
            }
        }
        positive("content.top_terms", self.top_terms)?;
        positive("content.anomaly_min_repeats", self.anomaly_min_repeats)?;
        Ok(())
    }
}

/// Cross-reference tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CrossRefSection {
    /// Evidence pairs kept per reference (default: 100)
    pub max_evidence_pairs: Option<usize>,

    /// Look for issue-key mentions in text (default: true)
    pub detect_mentions: Option<bool>,
}

impl CrossRefSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("crossref.max_evidence_pairs", self.max_evidence_pairs)
    }
}

fn positive<T>(name: &str, value: Option<T>) -> Result<(), ConfigError>
where
    T: PartialEq + Default,
{
    match value {
        Some(v) if v == T::default() => Err(ConfigError::InvalidValue(format!(
            "{} must be greater than zero",
            name
        ))),
        _ => Ok(()),
    }
}
