//! core::issue
//!
//! Normalized issue records.
//!
//! An [`Issue`] is built once per session from the tracker's raw record
//! (see [`crate::analysis::cache`]) and never mutated afterwards. Labels and
//! components are kept as ordered sets so that every report derived from
//! them is deterministic.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::link::Link;
use super::types::IssueKey;

/// Coarse workflow bucket reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Not started.
    Todo,
    /// Work underway.
    InProgress,
    /// Resolved or closed.
    Done,
    /// The tracker did not report a category.
    #[default]
    Unknown,
}

impl StatusCategory {
    /// Map a tracker category key (`new`, `indeterminate`, `done`).
    pub fn from_tracker_key(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "new" | "todo" | "to do" => StatusCategory::Todo,
            "indeterminate" | "in_progress" | "in progress" => StatusCategory::InProgress,
            "done" => StatusCategory::Done,
            _ => StatusCategory::Unknown,
        }
    }

    /// Returns true unless the issue is resolved.
    pub fn is_active(&self) -> bool {
        !matches!(self, StatusCategory::Done)
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCategory::Todo => write!(f, "todo"),
            StatusCategory::InProgress => write!(f, "in_progress"),
            StatusCategory::Done => write!(f, "done"),
            StatusCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Display name of the author.
    pub author: String,
    /// When the comment was created, if the tracker gave a usable timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Comment text.
    pub body: String,
}

/// A single field change from the issue's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Field that changed.
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// When the change happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    /// Display name of whoever made the change.
    pub author: String,
}

/// A normalized issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: IssueKey,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub issue_type: String,
    /// Tracker status name (e.g. "In Review").
    pub status: String,
    pub status_category: StatusCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    pub labels: BTreeSet<String>,
    pub components: BTreeSet<String>,
    /// Comments in chronological (source) order.
    pub comments: Vec<Comment>,
    /// Normalized links in source order.
    pub links: Vec<Link>,
    /// Change history in source order.
    pub history: Vec<ChangeEvent>,
    /// Browse URL, when the tracker exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Issue {
    /// Creates a minimal issue; remaining fields start empty.
    pub fn new(key: IssueKey, summary: impl Into<String>) -> Self {
        Issue {
            key,
            summary: summary.into(),
            description: None,
            issue_type: "Task".to_string(),
            status: "Open".to_string(),
            status_category: StatusCategory::Unknown,
            priority: None,
            assignee: None,
            reporter: None,
            created: None,
            updated: None,
            labels: BTreeSet::new(),
            components: BTreeSet::new(),
            comments: Vec::new(),
            links: Vec::new(),
            history: Vec::new(),
            url: None,
        }
    }

    /// Returns true unless the issue is resolved.
    pub fn is_active(&self) -> bool {
        self.status_category.is_active()
    }

    /// All free text of the issue: summary, description, comment bodies.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.summary.as_str())
            .chain(self.description.as_deref())
            .chain(self.comments.iter().map(|c| c.body.as_str()))
    }

    /// A compact view for listings.
    pub fn summary_view(&self) -> IssueSummary {
        IssueSummary {
            key: self.key.clone(),
            summary: self.summary.clone(),
            issue_type: self.issue_type.clone(),
            status: self.status.clone(),
            priority: self.priority.clone(),
            assignee: self.assignee.clone(),
            updated: self.updated,
            url: self.url.clone(),
        }
    }
}

/// Listing view of an issue, as returned by searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub key: IssueKey,
    pub summary: String,
    pub issue_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
