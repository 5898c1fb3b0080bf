//! core::types
//!
//! Strong types for tracker identifiers.
//!
//! # Types
//!
//! - [`ProjectKey`] - Validated project key (e.g. `PROJ`)
//! - [`IssueKey`] - Validated issue key (project key + sequence number)
//!
//! # Validation
//!
//! These types enforce validity at construction time. A key that parses is
//! safe to embed in a tracker query, and two keys that compare equal refer to
//! the same issue regardless of how the user typed them.
//!
//! # Examples
//!
//! ```
//! use issuelens::core::types::{IssueKey, ProjectKey};
//!
//! let key = IssueKey::parse("proj-42").unwrap();
//! assert_eq!(key.to_string(), "PROJ-42");
//! assert_eq!(key.project(), &ProjectKey::new("PROJ").unwrap());
//!
//! assert!(IssueKey::parse("PROJ").is_err());
//! assert!(ProjectKey::new("1ABC").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from identifier validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid project key: {0}")]
    InvalidProjectKey(String),

    #[error("invalid issue key: {0}")]
    InvalidIssueKey(String),
}

/// A validated project key.
///
/// Project keys must:
/// - Be non-empty
/// - Start with an ASCII letter
/// - Contain only ASCII letters, digits and `_`
///
/// Keys are stored uppercase; parsing is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectKey(String);

impl ProjectKey {
    /// Create a new validated project key.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidProjectKey` if the key is malformed.
    pub fn new(key: impl AsRef<str>) -> Result<Self, TypeError> {
        let key = key.as_ref().trim();

        let mut chars = key.chars();
        match chars.next() {
            None => {
                return Err(TypeError::InvalidProjectKey(
                    "project key cannot be empty".into(),
                ))
            }
            Some(c) if !c.is_ascii_alphabetic() => {
                return Err(TypeError::InvalidProjectKey(format!(
                    "'{key}' must start with a letter"
                )))
            }
            Some(_) => {}
        }

        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(TypeError::InvalidProjectKey(format!(
                "'{key}' cannot contain '{bad}'"
            )));
        }

        Ok(Self(key.to_ascii_uppercase()))
    }

    /// Get the project key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectKey> for String {
    fn from(key: ProjectKey) -> Self {
        key.0
    }
}

impl FromStr for ProjectKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated issue key (`PROJ-123`).
///
/// Ordering is by project key, then numerically by sequence number, so
/// `PROJ-2` sorts before `PROJ-10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueKey {
    project: ProjectKey,
    number: u64,
}

impl IssueKey {
    /// Build a key from its parts.
    pub fn new(project: ProjectKey, number: u64) -> Self {
        Self { project, number }
    }

    /// Parse a key of the form `PROJ-123`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidIssueKey` if the text is not a valid key.
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let text = text.trim();
        let (project, number) = text
            .rsplit_once('-')
            .ok_or_else(|| TypeError::InvalidIssueKey(format!("'{text}' has no '-'")))?;

        let project = ProjectKey::new(project)
            .map_err(|e| TypeError::InvalidIssueKey(format!("'{text}': {e}")))?;

        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidIssueKey(format!(
                "'{text}' must end with a sequence number"
            )));
        }
        let number = number
            .parse::<u64>()
            .map_err(|e| TypeError::InvalidIssueKey(format!("'{text}': {e}")))?;

        Ok(Self { project, number })
    }

    /// The project this issue belongs to.
    pub fn project(&self) -> &ProjectKey {
        &self.project
    }

    /// The sequence number within the project.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Check whether this issue belongs to `project`.
    pub fn in_project(&self, project: &ProjectKey) -> bool {
        &self.project == project
    }
}

impl TryFrom<String> for IssueKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IssueKey> for String {
    fn from(key: IssueKey) -> Self {
        key.to_string()
    }
}

impl FromStr for IssueKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.number)
    }
}
