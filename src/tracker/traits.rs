//! tracker::traits
//!
//! Tracker trait definition and the raw records it returns.
//!
//! # Design
//!
//! The `Tracker` trait is async because every call is network I/O. It is
//! deliberately read-only: there is no method that creates, updates or
//! deletes anything, so no code path in the analysis core can mutate tracker
//! state.
//!
//! Records come back in a raw, provider-shaped form ([`RawIssue`],
//! [`RawLink`]). Normalization into [`crate::core::issue::Issue`] happens in
//! the analysis layer, where the link lookup table lives.
//!
//! # Example
//!
//! ```ignore
//! use futures::TryStreamExt;
//! use issuelens::tracker::Tracker;
//!
//! async fn count_open(tracker: &dyn Tracker, project: &ProjectKey) -> Result<usize, TrackerError> {
//!     let issues: Vec<_> = tracker
//!         .search_issues(project, Some("statusCategory != Done"), 500)
//!         .try_collect()
//!         .await?;
//!     Ok(issues.len())
//! }
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

use crate::core::issue::{ChangeEvent, Comment};
use crate::core::link::Direction;
use crate::core::types::{IssueKey, ProjectKey};

/// Page size requested from the tracker when paginating searches.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Errors from tracker operations.
///
/// `NotFound` and `AccessDenied` are distinct on purpose: a permission
/// failure must never be reported as "no such issue".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The requested issue or project does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The credentials are valid but may not see the resource.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Authentication is required but not configured.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// The tracker returned data that could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TrackerError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerError::NotFound(_) => "not_found",
            TrackerError::AccessDenied(_) => "access_denied",
            TrackerError::AuthRequired => "auth_required",
            TrackerError::AuthFailed(_) => "auth_failed",
            TrackerError::RateLimited => "rate_limited",
            TrackerError::Api { .. } => "api",
            TrackerError::Network(_) => "network",
            TrackerError::Malformed(_) => "malformed",
        }
    }
}

/// A link as the tracker reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    /// Link type name (e.g. "Blocks", "Duplicate", "Cloners").
    pub type_name: String,
    /// Description from the inward side (e.g. "is blocked by").
    pub inward: String,
    /// Description from the outward side (e.g. "blocks").
    pub outward: String,
    /// Which side of the link the owning issue is on.
    pub direction: Direction,
    /// Key of the other issue, unvalidated.
    pub target: String,
}

impl RawLink {
    /// Outbound link of the given type name with standard descriptions.
    pub fn outbound(type_name: &str, outward: &str, target: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            inward: String::new(),
            outward: outward.to_string(),
            direction: Direction::Outbound,
            target: target.to_string(),
        }
    }

    /// Inbound link of the given type name with standard descriptions.
    pub fn inbound(type_name: &str, inward: &str, target: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            inward: inward.to_string(),
            outward: String::new(),
            direction: Direction::Inbound,
            target: target.to_string(),
        }
    }

    /// The description that applies to the owning issue's side.
    pub fn description(&self) -> &str {
        match self.direction {
            Direction::Outbound => &self.outward,
            Direction::Inbound => &self.inward,
        }
    }
}

/// An issue as the tracker reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawIssue {
    /// Issue key, unvalidated.
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub issue_type: String,
    pub status: String,
    /// Tracker status category key (`new`, `indeterminate`, `done`).
    pub status_category: String,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub comments: Vec<Comment>,
    pub history: Vec<ChangeEvent>,
    pub links: Vec<RawLink>,
    /// Parent issue key when this is a subtask.
    pub parent: Option<String>,
    /// Subtask keys when this is a parent.
    pub subtasks: Vec<String>,
    /// Epic key when the issue belongs to one.
    pub epic: Option<String>,
    /// Issue keys in this epic.
    pub epic_children: Vec<String>,
    /// Why `epic_children` could not be loaded, when it could not.
    pub epic_children_error: Option<TrackerError>,
    pub url: Option<String>,
}

impl RawIssue {
    /// Creates a raw issue with the given key and summary.
    pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: summary.into(),
            issue_type: "Task".to_string(),
            status: "To Do".to_string(),
            status_category: "new".to_string(),
            ..Default::default()
        }
    }

    /// Sets the description (builder pattern).
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets status name and category key (builder pattern).
    pub fn with_status(mut self, status: impl Into<String>, category: impl Into<String>) -> Self {
        self.status = status.into();
        self.status_category = category.into();
        self
    }

    /// Adds a label (builder pattern).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Adds a component (builder pattern).
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Adds a comment (builder pattern).
    pub fn with_comment(mut self, author: impl Into<String>, body: impl Into<String>) -> Self {
        let created = Some(self.updated.or(self.created).unwrap_or_else(Utc::now));
        self.comments.push(Comment {
            author: author.into(),
            created,
            body: body.into(),
        });
        self
    }

    /// Adds a raw link (builder pattern).
    pub fn with_link(mut self, link: RawLink) -> Self {
        self.links.push(link);
        self
    }

    /// Sets the parent issue (builder pattern).
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the epic (builder pattern).
    pub fn with_epic(mut self, epic: impl Into<String>) -> Self {
        self.epic = Some(epic.into());
        self
    }

    /// Adds an issue to this epic (builder pattern).
    pub fn with_epic_child(mut self, child: impl Into<String>) -> Self {
        self.epic_children.push(child.into());
        self
    }

    /// Records that the epic's children could not be loaded (builder pattern).
    pub fn with_epic_children_error(mut self, err: TrackerError) -> Self {
        self.epic_children_error = Some(err);
        self
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Issues on this page.
    pub issues: Vec<RawIssue>,
    /// Offset of the first issue on this page.
    pub start_at: usize,
    /// Total matches, when the tracker reports it.
    pub total: Option<usize>,
}

impl SearchPage {
    /// Whether more pages follow this one.
    pub fn has_more(&self) -> bool {
        if self.issues.is_empty() {
            return false;
        }
        match self.total {
            Some(total) => self.start_at + self.issues.len() < total,
            None => true,
        }
    }
}

/// Cursor state for lazy pagination.
struct PageCursor {
    start_at: usize,
    buffered: VecDeque<RawIssue>,
    exhausted: bool,
    yielded: usize,
}

/// The read-only tracker collaborator.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; sibling fetches during graph
/// traversal run concurrently against one shared tracker.
///
/// # Error Handling
///
/// All methods return `Result<T, TrackerError>`. Retrying transient
/// failures is the implementation's business; the analysis core never
/// retries.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Get the tracker name (e.g., "jira", "mock").
    fn name(&self) -> &'static str;

    /// Fetch one issue with comments, links and change history.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the issue doesn't exist
    /// - `AccessDenied` if the credentials may not see it
    async fn fetch_issue(&self, key: &IssueKey) -> Result<RawIssue, TrackerError>;

    /// Fetch one page of a project search.
    ///
    /// `filter` is an additional tracker query clause, combined with the
    /// project restriction by the implementation.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project doesn't exist
    /// - `AccessDenied` if the credentials may not browse it
    async fn search_page(
        &self,
        project: &ProjectKey,
        filter: Option<&str>,
        start_at: usize,
        page_size: usize,
    ) -> Result<SearchPage, TrackerError>;

    /// Lazily search a project, following pagination.
    ///
    /// Pages are requested only as the stream is polled; at most `limit`
    /// issues are yielded. An error ends the stream after being yielded.
    fn search_issues<'a>(
        &'a self,
        project: &'a ProjectKey,
        filter: Option<&'a str>,
        limit: usize,
    ) -> BoxStream<'a, Result<RawIssue, TrackerError>> {
        let cursor = PageCursor {
            start_at: 0,
            buffered: VecDeque::new(),
            exhausted: false,
            yielded: 0,
        };

        stream::try_unfold(cursor, move |mut cursor| async move {
            loop {
                if cursor.yielded >= limit {
                    return Ok::<_, TrackerError>(None);
                }
                if let Some(issue) = cursor.buffered.pop_front() {
                    cursor.yielded += 1;
                    return Ok(Some((issue, cursor)));
                }
                if cursor.exhausted {
                    return Ok(None);
                }

                let page_size = DEFAULT_PAGE_SIZE.min(limit - cursor.yielded).max(1);
                let page = self
                    .search_page(project, filter, cursor.start_at, page_size)
                    .await?;

                cursor.exhausted = !page.has_more();
                cursor.start_at = page.start_at + page.issues.len();
                cursor.buffered.extend(page.issues);
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_error_display() {
        assert_eq!(
            format!("{}", TrackerError::NotFound("PROJ-1".into())),
            "not found: PROJ-1"
        );
        assert_eq!(
            format!("{}", TrackerError::AccessDenied("PROJ-1".into())),
            "access denied: PROJ-1"
        );
        assert_eq!(
            format!("{}", TrackerError::AuthRequired),
            "authentication required"
        );
        assert_eq!(format!("{}", TrackerError::RateLimited), "rate limited");
        assert_eq!(
            format!(
                "{}",
                TrackerError::Api {
                    status: 500,
                    message: "boom".into()
                }
            ),
            "API error: 500 - boom"
        );
        assert_eq!(
            format!("{}", TrackerError::Network("connection refused".into())),
            "network error: connection refused"
        );
    }

    #[test]
    fn tracker_error_kinds_are_distinct() {
        assert_ne!(
            TrackerError::NotFound(String::new()).kind(),
            TrackerError::AccessDenied(String::new()).kind()
        );
    }

    #[test]
    fn raw_link_description_follows_direction() {
        let out = RawLink::outbound("Blocks", "blocks", "A-2");
        assert_eq!(out.description(), "blocks");
        let inb = RawLink::inbound("Blocks", "is blocked by", "A-2");
        assert_eq!(inb.description(), "is blocked by");
    }

    #[test]
    fn search_page_has_more() {
        let page = SearchPage {
            issues: vec![RawIssue::new("A-1", "x"), RawIssue::new("A-2", "y")],
            start_at: 0,
            total: Some(3),
        };
        assert!(page.has_more());

        let last = SearchPage {
            issues: vec![RawIssue::new("A-3", "z")],
            start_at: 2,
            total: Some(3),
        };
        assert!(!last.has_more());

        let empty = SearchPage::default();
        assert!(!empty.has_more());
    }

    #[test]
    fn raw_issue_builder() {
        let raw = RawIssue::new("A-1", "Summary")
            .with_label("backend")
            .with_component("Auth")
            .with_parent("A-0")
            .with_status("Done", "done");
        assert_eq!(raw.labels, vec!["backend"]);
        assert_eq!(raw.components, vec!["Auth"]);
        assert_eq!(raw.parent.as_deref(), Some("A-0"));
        assert_eq!(raw.status_category, "done");
    }
}
