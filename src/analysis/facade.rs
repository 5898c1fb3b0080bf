//! analysis::facade
//!
//! The request interface: one method per top-level operation.
//!
//! # Design
//!
//! `Analyzer` owns the tracker handle and the tuning values. Every operation
//! is one session: it creates a fresh [`IssueCache`], derives a deadline from
//! the configured time budget, and returns a serializable report. Nothing
//! survives between calls.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use issuelens::analysis::{AnalysisConfig, Analyzer};
//! use issuelens::core::types::IssueKey;
//! use issuelens::tracker::mock::MockTracker;
//! use issuelens::tracker::{RawIssue, RawLink};
//!
//! # tokio_test::block_on(async {
//! let tracker = MockTracker::with_issues(vec![
//!     RawIssue::new("APP-1", "Checkout").with_link(RawLink::outbound("Blocks", "blocks", "APP-2")),
//!     RawIssue::new("APP-2", "Payments"),
//! ]);
//! let analyzer = Analyzer::new(Arc::new(tracker), AnalysisConfig::default());
//!
//! let root = IssueKey::parse("APP-1").unwrap();
//! let report = analyzer.analyze_relationships(&root, None).await.unwrap();
//! assert!(report.related.contains(&IssueKey::parse("APP-2").unwrap()));
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::core::issue::{Issue, IssueSummary};
use crate::core::link::LinkKind;
use crate::core::types::{IssueKey, ProjectKey};
use crate::tracker::Tracker;

use super::cache::{collect_bounded, IssueCache};
use super::content::{ContentAnalyzer, ContentConfig, ContentReport};
use super::crossref::{CrossRefConfig, CrossReferenceDetector, CrossReferenceReport};
use super::error::{AnalysisError, Completeness, DataAnomaly};
use super::graph::{GraphBuilder, RelationshipGraph, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_DEPTH};

/// Default number of issues a search returns.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Default content window, in days.
pub const DEFAULT_CONTENT_WINDOW_DAYS: u32 = 30;

/// Priority bucket for issues with no priority set.
pub const NO_PRIORITY: &str = "No Priority";

/// Link kinds checked for cycles in relationship reports.
const CYCLE_KINDS: [LinkKind; 2] = [LinkKind::Blocks, LinkKind::Duplicates];

/// Tuning for every analysis operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub max_depth: usize,
    pub max_concurrency: usize,
    /// Wall-clock budget per operation; `None` means unbounded.
    pub time_budget: Option<Duration>,
    /// Maximum issues loaded by a project-wide search.
    pub search_limit: usize,
    pub content_window_days: u32,
    pub content: ContentConfig,
    pub crossref: CrossRefConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let crossref = CrossRefConfig::default();
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            time_budget: None,
            search_limit: crossref.search_limit,
            content_window_days: DEFAULT_CONTENT_WINDOW_DAYS,
            content: ContentConfig::default(),
            crossref,
        }
    }
}

/// Full details of one issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueDetails {
    pub issue: Issue,
    pub anomalies: Vec<DataAnomaly>,
}

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Extra tracker filter clause.
    pub filter: Option<String>,
    pub limit: usize,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            filter: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Search hits, in tracker order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub project: ProjectKey,
    pub issues: Vec<IssueSummary>,
    /// More issues matched than `limit`.
    pub truncated: bool,
}

/// Relationship graph around one issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipReport {
    pub root: IssueKey,
    pub max_depth: usize,
    pub graph: RelationshipGraph,
    /// Every issue connected to the root, excluding the root.
    pub related: std::collections::BTreeSet<IssueKey>,
    /// Cycles per link kind; kinds without cycles are omitted.
    pub cycles: BTreeMap<LinkKind, Vec<Vec<IssueKey>>>,
}

impl RelationshipReport {
    pub fn completeness(&self) -> &Completeness {
        self.graph.completeness()
    }
}

/// Issue counts of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectMetrics {
    pub project: ProjectKey,
    /// Issues counted; at most the configured search limit.
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    /// Issues without a priority are counted under [`NO_PRIORITY`].
    pub by_priority: BTreeMap<String, usize>,
    pub completeness: Completeness,
}

impl ProjectMetrics {
    fn new(project: ProjectKey) -> Self {
        Self {
            project,
            total: 0,
            by_type: BTreeMap::new(),
            by_status: BTreeMap::new(),
            by_priority: BTreeMap::new(),
            completeness: Completeness::default(),
        }
    }

    fn count(&mut self, issue: &Issue) {
        self.total += 1;
        *self.by_type.entry(issue.issue_type.clone()).or_default() += 1;
        *self.by_status.entry(issue.status.clone()).or_default() += 1;
        let priority = issue.priority.as_deref().unwrap_or(NO_PRIORITY);
        *self.by_priority.entry(priority.to_string()).or_default() += 1;
    }
}

/// Issues to analyze for content patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTarget {
    /// A project's issues, optionally only those updated recently.
    Project {
        key: ProjectKey,
        updated_within_days: Option<u32>,
    },
    /// An explicit set of issues.
    Issues(Vec<IssueKey>),
}

/// Entry point for all read-only analysis.
#[derive(Clone)]
pub struct Analyzer {
    tracker: Arc<dyn Tracker>,
    config: AnalysisConfig,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("tracker", &self.tracker.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Analyzer {
    pub fn new(tracker: Arc<dyn Tracker>, config: AnalysisConfig) -> Self {
        Self { tracker, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Fetch one issue with its normalized links.
    ///
    /// # Errors
    ///
    /// `NotFound` if the issue does not exist, `AccessDenied` if it is not
    /// visible.
    #[instrument(skip(self), fields(tracker = self.tracker.name()))]
    pub async fn get_issue_details(&self, key: &IssueKey) -> Result<IssueDetails, AnalysisError> {
        let cache = self.session();
        let issue = cache.get(key).await?;
        Ok(IssueDetails {
            issue: Issue::clone(&issue),
            anomalies: cache.anomalies_for(key),
        })
    }

    /// Search a project.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a zero limit; tracker errors otherwise.
    #[instrument(skip(self), fields(tracker = self.tracker.name()))]
    pub async fn search(
        &self,
        project: &ProjectKey,
        criteria: &SearchCriteria,
    ) -> Result<SearchResult, AnalysisError> {
        if criteria.limit == 0 {
            return Err(AnalysisError::InvalidInput(
                "search limit must be at least 1".to_string(),
            ));
        }

        let cache = self.session();
        let mut completeness = Completeness::default();
        let stream = cache.get_many(
            project,
            criteria.filter.as_deref(),
            criteria.limit.saturating_add(1),
        );
        let issues = collect_bounded(stream, criteria.limit, self.deadline(), &mut completeness).await?;

        Ok(SearchResult {
            project: project.clone(),
            issues: issues.iter().map(|i| i.summary_view()).collect(),
            truncated: !completeness.is_complete(),
        })
    }

    /// Count a project's issues by type, status and priority.
    ///
    /// At most `search_limit` issues are counted; a larger project yields a
    /// partial result.
    ///
    /// # Errors
    ///
    /// Search errors, including `NotFound` for an unknown project.
    #[instrument(skip(self), fields(tracker = self.tracker.name()))]
    pub async fn project_metrics(
        &self,
        project: &ProjectKey,
    ) -> Result<ProjectMetrics, AnalysisError> {
        let cache = self.session();
        let mut metrics = ProjectMetrics::new(project.clone());
        let limit = self.config.search_limit;
        let stream = cache.get_many(project, None, limit.saturating_add(1));
        let issues =
            collect_bounded(stream, limit, self.deadline(), &mut metrics.completeness).await?;

        for issue in &issues {
            metrics.count(issue);
        }
        debug!(project = %project, total = metrics.total, "project metrics counted");
        Ok(metrics)
    }

    /// Build the relationship graph around `key`.
    ///
    /// `max_depth` falls back to the configured depth.
    ///
    /// # Errors
    ///
    /// Errors fetching the root itself are returned; errors on other issues
    /// become unresolved nodes.
    #[instrument(skip(self), fields(tracker = self.tracker.name()))]
    pub async fn analyze_relationships(
        &self,
        key: &IssueKey,
        max_depth: Option<usize>,
    ) -> Result<RelationshipReport, AnalysisError> {
        let max_depth = max_depth.unwrap_or(self.config.max_depth);
        let cache = self.session();
        let graph = GraphBuilder::new(&cache)
            .with_concurrency(self.config.max_concurrency)
            .with_deadline(self.deadline())
            .build(std::slice::from_ref(key), max_depth)
            .await?;

        let cycles = CYCLE_KINDS
            .into_iter()
            .map(|kind| (kind, graph.find_cycles_of(kind)))
            .filter(|(_, found)| !found.is_empty())
            .collect();
        debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            fetches = cache.fetch_count(),
            "relationship graph built"
        );

        Ok(RelationshipReport {
            root: key.clone(),
            max_depth,
            related: graph.related(key),
            cycles,
            graph,
        })
    }

    /// Find references between two projects' active issues.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if both projects are the same; search errors otherwise.
    #[instrument(skip(self), fields(tracker = self.tracker.name()))]
    pub async fn cross_reference(
        &self,
        project_a: &ProjectKey,
        project_b: &ProjectKey,
    ) -> Result<CrossReferenceReport, AnalysisError> {
        let cache = self.session();
        CrossReferenceDetector::new(&cache, self.config.crossref.clone())
            .with_deadline(self.deadline())
            .detect(project_a, project_b)
            .await
    }

    /// Analyze content patterns of a project or an issue set.
    ///
    /// # Errors
    ///
    /// For an issue set, any issue that cannot be fetched fails the call:
    /// each one was asked for by name.
    #[instrument(skip(self), fields(tracker = self.tracker.name()))]
    pub async fn analyze_content(&self, target: &ContentTarget) -> Result<ContentReport, AnalysisError> {
        let cache = self.session();
        let deadline = self.deadline();
        let mut completeness = Completeness::default();

        let issues = match target {
            ContentTarget::Project {
                key,
                updated_within_days,
            } => {
                let filter = updated_within_days.map(|days| format!("updated >= -{days}d"));
                let limit = self.config.search_limit;
                let stream = cache.get_many(key, filter.as_deref(), limit.saturating_add(1));
                collect_bounded(stream, limit, deadline, &mut completeness).await?
            }
            ContentTarget::Issues(keys) => {
                if keys.is_empty() {
                    return Err(AnalysisError::InvalidInput(
                        "no issues given for content analysis".to_string(),
                    ));
                }
                let cache = &cache;
                stream::iter(keys)
                    .map(|key| cache.get(key))
                    .buffered(self.config.max_concurrency.max(1))
                    .try_collect()
                    .await?
            }
        };

        let mut report = ContentAnalyzer::new(self.config.content.clone())
            .analyze(issues.iter().map(|issue| issue.as_ref()));
        report.completeness = completeness;
        Ok(report)
    }

    fn session(&self) -> IssueCache {
        IssueCache::new(Arc::clone(&self.tracker))
    }

    fn deadline(&self) -> Option<Instant> {
        self.config.time_budget.map(|budget| Instant::now() + budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::error::PartialReason;
    use crate::tracker::mock::MockTracker;
    use crate::tracker::{RawIssue, RawLink, TrackerError};

    fn key(s: &str) -> IssueKey {
        IssueKey::parse(s).unwrap()
    }

    fn project(s: &str) -> ProjectKey {
        ProjectKey::new(s).unwrap()
    }

    fn analyzer(tracker: &MockTracker) -> Analyzer {
        Analyzer::new(Arc::new(tracker.clone()), AnalysisConfig::default())
    }

    mod details {
        use super::*;

        #[tokio::test]
        async fn returns_issue() {
            let tracker = MockTracker::with_issues(vec![RawIssue::new("A-1", "Login fails")]);
            let details = analyzer(&tracker).get_issue_details(&key("A-1")).await.unwrap();
            assert_eq!(details.issue.summary, "Login fails");
            assert!(details.anomalies.is_empty());
        }

        #[tokio::test]
        async fn missing_issue_is_not_found() {
            let err = analyzer(&MockTracker::new())
                .get_issue_details(&key("A-404"))
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::NotFound(_)));
        }

        #[tokio::test]
        async fn each_call_is_a_fresh_session() {
            let tracker = MockTracker::with_issues(vec![RawIssue::new("A-1", "x")]);
            let analyzer = analyzer(&tracker);
            analyzer.get_issue_details(&key("A-1")).await.unwrap();
            analyzer.get_issue_details(&key("A-1")).await.unwrap();
            assert_eq!(tracker.fetch_count("A-1"), 2);
        }
    }

    mod search {
        use super::*;

        fn tracker() -> MockTracker {
            MockTracker::with_issues(
                (1..=4)
                    .map(|n| RawIssue::new(format!("A-{n}"), format!("issue {n}")))
                    .collect(),
            )
        }

        #[tokio::test]
        async fn truncates_at_limit() {
            let criteria = SearchCriteria {
                filter: None,
                limit: 3,
            };
            let result = analyzer(&tracker()).search(&project("A"), &criteria).await.unwrap();
            assert_eq!(result.issues.len(), 3);
            assert!(result.truncated);
        }

        #[tokio::test]
        async fn exact_fit_is_not_truncated() {
            let criteria = SearchCriteria {
                filter: None,
                limit: 4,
            };
            let result = analyzer(&tracker()).search(&project("A"), &criteria).await.unwrap();
            assert_eq!(result.issues.len(), 4);
            assert!(!result.truncated);
        }

        #[tokio::test]
        async fn zero_limit_rejected() {
            let criteria = SearchCriteria {
                filter: None,
                limit: 0,
            };
            let err = analyzer(&tracker()).search(&project("A"), &criteria).await.unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInput(_)));
        }

        #[tokio::test]
        async fn project_errors_propagate() {
            let tracker = tracker().fail_project("A", TrackerError::AccessDenied("A".into()));
            let err = analyzer(&tracker)
                .search(&project("A"), &SearchCriteria::default())
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::AccessDenied(_)));
        }
    }

    mod metrics {
        use super::*;

        fn issue(key: &str, issue_type: &str, status: &str, priority: Option<&str>) -> RawIssue {
            let mut raw = RawIssue::new(key, "x").with_status(status, "new");
            raw.issue_type = issue_type.to_string();
            raw.priority = priority.map(str::to_string);
            raw
        }

        #[tokio::test]
        async fn counts_by_type_status_and_priority() {
            let tracker = MockTracker::with_issues(vec![
                issue("A-1", "Bug", "Open", Some("High")),
                issue("A-2", "Bug", "Done", None),
                issue("A-3", "Story", "Open", Some("High")),
                issue("B-1", "Bug", "Open", Some("Low")),
            ]);
            let metrics = analyzer(&tracker).project_metrics(&project("A")).await.unwrap();

            assert_eq!(metrics.total, 3);
            assert_eq!(
                metrics.by_type,
                BTreeMap::from([("Bug".to_string(), 2), ("Story".to_string(), 1)])
            );
            assert_eq!(
                metrics.by_status,
                BTreeMap::from([("Done".to_string(), 1), ("Open".to_string(), 2)])
            );
            assert_eq!(
                metrics.by_priority,
                BTreeMap::from([("High".to_string(), 2), (NO_PRIORITY.to_string(), 1)])
            );
            assert!(metrics.completeness.is_complete());
        }

        #[tokio::test]
        async fn large_project_is_partial() {
            let tracker = MockTracker::with_issues(
                (1..=5)
                    .map(|n| issue(&format!("A-{n}"), "Task", "Open", None))
                    .collect(),
            );
            let config = AnalysisConfig {
                search_limit: 3,
                ..AnalysisConfig::default()
            };
            let metrics = Analyzer::new(Arc::new(tracker), config)
                .project_metrics(&project("A"))
                .await
                .unwrap();

            assert_eq!(metrics.total, 3);
            assert_eq!(metrics.by_priority[NO_PRIORITY], 3);
            assert_eq!(metrics.completeness.reasons(), vec![PartialReason::SearchLimit]);
        }

        #[tokio::test]
        async fn empty_project_has_no_counts() {
            let metrics = analyzer(&MockTracker::new())
                .project_metrics(&project("A"))
                .await
                .unwrap();
            assert_eq!(metrics.total, 0);
            assert!(metrics.by_type.is_empty());
        }

        #[tokio::test]
        async fn project_errors_propagate() {
            let tracker = MockTracker::new().fail_project("A", TrackerError::NotFound("A".into()));
            let err = analyzer(&tracker)
                .project_metrics(&project("A"))
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::NotFound(_)));
        }
    }

    mod relationships {
        use super::*;

        #[tokio::test]
        async fn reports_related_and_cycles() {
            let tracker = MockTracker::with_issues(vec![
                RawIssue::new("A-1", "x").with_link(RawLink::outbound("Blocks", "blocks", "A-2")),
                RawIssue::new("A-2", "y").with_link(RawLink::outbound("Blocks", "blocks", "A-1")),
            ]);
            let report = analyzer(&tracker)
                .analyze_relationships(&key("A-1"), None)
                .await
                .unwrap();

            assert_eq!(report.max_depth, DEFAULT_MAX_DEPTH);
            assert!(report.related.contains(&key("A-2")));
            assert!(!report.related.contains(&key("A-1")));
            assert_eq!(
                report.cycles.get(&LinkKind::Blocks),
                Some(&vec![vec![key("A-1"), key("A-2")]])
            );
            assert!(!report.cycles.contains_key(&LinkKind::Duplicates));
        }

        #[tokio::test]
        async fn explicit_depth_overrides_config() {
            let tracker = MockTracker::with_issues(vec![
                RawIssue::new("A-1", "x").with_link(RawLink::outbound("Blocks", "blocks", "A-2")),
                RawIssue::new("A-2", "y").with_link(RawLink::outbound("Blocks", "blocks", "A-3")),
                RawIssue::new("A-3", "z"),
            ]);
            let report = analyzer(&tracker)
                .analyze_relationships(&key("A-1"), Some(1))
                .await
                .unwrap();
            assert_eq!(report.max_depth, 1);
            assert!(report.graph.node(&key("A-3")).is_some_and(|n| n.is_truncated()));
            assert!(report.completeness().reasons().contains(&PartialReason::DepthLimit));
        }
    }

    mod content {
        use super::*;

        #[tokio::test]
        async fn issue_set_is_analyzed() {
            let tracker = MockTracker::with_issues(vec![
                RawIssue::new("A-1", "timeout on login"),
                RawIssue::new("A-2", "timeout on export"),
            ]);
            let report = analyzer(&tracker)
                .analyze_content(&ContentTarget::Issues(vec![key("A-1"), key("A-2")]))
                .await
                .unwrap();
            assert_eq!(report.issues_analyzed, 2);
            assert_eq!(report.terms.count("timeout"), 2);
            assert!(report.completeness.is_complete());
        }

        #[tokio::test]
        async fn missing_issue_in_set_fails() {
            let tracker = MockTracker::with_issues(vec![RawIssue::new("A-1", "x")]);
            let err = analyzer(&tracker)
                .analyze_content(&ContentTarget::Issues(vec![key("A-1"), key("A-9")]))
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::NotFound(_)));
        }

        #[tokio::test]
        async fn empty_issue_set_rejected() {
            let err = analyzer(&MockTracker::new())
                .analyze_content(&ContentTarget::Issues(Vec::new()))
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInput(_)));
        }

        #[tokio::test]
        async fn project_window_uses_updated_filter() {
            let tracker = MockTracker::with_issues(vec![RawIssue::new("A-1", "x")]);
            let target = ContentTarget::Project {
                key: project("A"),
                updated_within_days: Some(30),
            };
            let report = analyzer(&tracker).analyze_content(&target).await.unwrap();
            assert_eq!(report.issues_analyzed, 1);

            let ops = tracker.operations();
            assert!(ops.iter().any(|op| matches!(
                op,
                crate::tracker::mock::MockOperation::SearchPage { filter: Some(f), .. }
                    if f == "updated >= -30d"
            )));
        }
    }

    #[tokio::test]
    async fn cross_reference_same_project_rejected() {
        let err = analyzer(&MockTracker::new())
            .cross_reference(&project("A"), &project("A"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }
}
