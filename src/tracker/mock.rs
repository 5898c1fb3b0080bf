//! tracker::mock
//!
//! Mock tracker implementation for deterministic testing.
//!
//! # Design
//!
//! The mock tracker stores raw issues in memory and serves them through the
//! `Tracker` trait. Failures can be injected per issue key or per project,
//! every call is recorded, and an optional per-call latency makes
//! concurrency and deadline behavior observable.
//!
//! # Example
//!
//! ```
//! use issuelens::core::types::IssueKey;
//! use issuelens::tracker::mock::MockTracker;
//! use issuelens::tracker::{RawIssue, Tracker, TrackerError};
//!
//! # tokio_test::block_on(async {
//! let tracker = MockTracker::with_issues(vec![RawIssue::new("PROJ-1", "Login fails")]);
//!
//! let issue = tracker.fetch_issue(&IssueKey::parse("PROJ-1").unwrap()).await.unwrap();
//! assert_eq!(issue.summary, "Login fails");
//!
//! let missing = tracker.fetch_issue(&IssueKey::parse("PROJ-2").unwrap()).await;
//! assert!(matches!(missing, Err(TrackerError::NotFound(_))));
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{RawIssue, SearchPage, Tracker, TrackerError};
use crate::core::types::{IssueKey, ProjectKey};

/// Mock tracker for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockTracker {
    inner: Arc<Mutex<MockTrackerInner>>,
}

#[derive(Debug, Default)]
struct MockTrackerInner {
    /// Stored issues by canonical key text.
    issues: BTreeMap<String, RawIssue>,
    /// Injected fetch failures by canonical key text.
    issue_failures: HashMap<String, TrackerError>,
    /// Injected search failures by project key.
    project_failures: HashMap<String, TrackerError>,
    /// Maximum page size served, regardless of what was asked.
    page_size: Option<usize>,
    /// Artificial delay per call.
    latency: Option<Duration>,
    /// Calls currently in flight.
    in_flight: usize,
    /// Highest number of concurrent calls observed.
    max_in_flight: usize,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    FetchIssue {
        key: String,
    },
    SearchPage {
        project: String,
        filter: Option<String>,
        start_at: usize,
    },
}

impl MockTracker {
    /// Create a new empty mock tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTrackerInner::default())),
        }
    }

    /// Create a mock tracker with pre-existing issues.
    pub fn with_issues(issues: Vec<RawIssue>) -> Self {
        let tracker = Self::new();
        for issue in issues {
            tracker.add_issue(issue);
        }
        tracker
    }

    /// Add or replace an issue.
    pub fn add_issue(&self, issue: RawIssue) {
        let key = canonical(&issue.key);
        self.state().issues.insert(key, issue);
    }

    /// Make fetches of `key` fail with `error`.
    pub fn fail_issue(self, key: &str, error: TrackerError) -> Self {
        self.state().issue_failures.insert(canonical(key), error);
        self
    }

    /// Make searches of `project` fail with `error`.
    pub fn fail_project(self, project: &str, error: TrackerError) -> Self {
        self.state()
            .project_failures
            .insert(project.to_ascii_uppercase(), error);
        self
    }

    /// Serve at most `size` issues per search page.
    pub fn with_page_size(self, size: usize) -> Self {
        self.state().page_size = Some(size.max(1));
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state().latency = Some(latency);
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// Number of `fetch_issue` calls made for `key`.
    pub fn fetch_count(&self, key: &str) -> usize {
        let key = canonical(key);
        self.state()
            .operations
            .iter()
            .filter(|op| matches!(op, MockOperation::FetchIssue { key: k } if *k == key))
            .count()
    }

    /// Total number of `fetch_issue` calls.
    pub fn total_fetches(&self) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| matches!(op, MockOperation::FetchIssue { .. }))
            .count()
    }

    /// Number of `search_page` calls made.
    pub fn search_calls(&self) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| matches!(op, MockOperation::SearchPage { .. }))
            .count()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }

    fn state(&self) -> MutexGuard<'_, MockTrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, track concurrency and return the configured latency.
    fn begin(&self, op: MockOperation) -> Option<Duration> {
        let mut inner = self.state();
        inner.operations.push(op);
        inner.in_flight += 1;
        inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
        inner.latency
    }

    fn end(&self) {
        let mut inner = self.state();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }

    async fn simulate_latency(latency: Option<Duration>) {
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

#[async_trait]
impl Tracker for MockTracker {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_issue(&self, key: &IssueKey) -> Result<RawIssue, TrackerError> {
        let text = key.to_string();
        let latency = self.begin(MockOperation::FetchIssue { key: text.clone() });
        Self::simulate_latency(latency).await;

        let result = {
            let inner = self.state();
            if let Some(err) = inner.issue_failures.get(&text) {
                Err(err.clone())
            } else {
                inner
                    .issues
                    .get(&text)
                    .cloned()
                    .ok_or_else(|| TrackerError::NotFound(format!("issue {}", text)))
            }
        };

        self.end();
        result
    }

    async fn search_page(
        &self,
        project: &ProjectKey,
        filter: Option<&str>,
        start_at: usize,
        page_size: usize,
    ) -> Result<SearchPage, TrackerError> {
        let latency = self.begin(MockOperation::SearchPage {
            project: project.to_string(),
            filter: filter.map(str::to_string),
            start_at,
        });
        Self::simulate_latency(latency).await;

        let result = {
            let inner = self.state();
            if let Some(err) = inner.project_failures.get(project.as_str()) {
                Err(err.clone())
            } else {
                let mut matching: Vec<(IssueKey, &RawIssue)> = inner
                    .issues
                    .values()
                    .filter_map(|raw| IssueKey::parse(&raw.key).ok().map(|k| (k, raw)))
                    .filter(|(k, _)| k.in_project(project))
                    .collect();
                matching.sort_by(|a, b| a.0.cmp(&b.0));

                let size = inner.page_size.map_or(page_size, |cap| cap.min(page_size));
                let issues = matching
                    .iter()
                    .skip(start_at)
                    .take(size)
                    .map(|(_, raw)| (*raw).clone())
                    .collect();

                Ok(SearchPage {
                    issues,
                    start_at,
                    total: Some(matching.len()),
                })
            }
        };

        self.end();
        result
    }
}
