//! analysis::crossref
//!
//! Cross-reference detection between two projects.
//!
//! # Design
//!
//! The detector loads the active issues of both projects and runs
//! independent passes over them:
//!
//! 1. explicit links whose endpoints lie in the two projects
//! 2. components used in both projects
//! 3. labels used in both projects
//! 4. literal issue-key mentions of one project in the other's text
//!
//! Component and label names are normalized once (trimmed, lowercased)
//! before comparison. Every reference carries evidence: pairs of issue keys,
//! first element from the first project. A reference without evidence is
//! never produced.
//!
//! The passes are pure functions of the two issue sets; swapping the
//! projects swaps the pair elements and nothing else.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::core::issue::Issue;
use crate::core::types::{IssueKey, ProjectKey};

use super::cache::{collect_bounded, IssueCache};
use super::error::{AnalysisError, Completeness};
use super::graph::GraphBuilder;

/// Tracker filter selecting unresolved issues.
pub const ACTIVE_FILTER: &str = "statusCategory != Done";

/// Subject of mention references.
const MENTION_SUBJECT: &str = "issue-key";

/// Tuning for cross-reference detection.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossRefConfig {
    /// Evidence pairs kept per reference.
    pub max_evidence_pairs: usize,
    /// Whether to run the mention pass.
    pub detect_mentions: bool,
    /// Maximum issues loaded per project.
    pub search_limit: usize,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            max_evidence_pairs: 100,
            detect_mentions: true,
            search_limit: 1000,
        }
    }
}

/// How two projects are related.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    ExplicitLink,
    SharedComponent,
    SharedLabel,
    Mention,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::ExplicitLink => "explicit-link",
            ReferenceKind::SharedComponent => "shared-component",
            ReferenceKind::SharedLabel => "shared-label",
            ReferenceKind::Mention => "mention",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of evidence that two projects are related.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReference {
    /// The project pair, in request order.
    pub projects: (ProjectKey, ProjectKey),
    pub kind: ReferenceKind,
    /// Normalized component/label name, link kind, or `issue-key`.
    pub subject: String,
    /// Issue pairs, first element from the first project; sorted.
    pub evidence: Vec<(IssueKey, IssueKey)>,
    /// Number of pairs before capping.
    pub evidence_total: usize,
    /// Whether `evidence` was capped.
    pub evidence_truncated: bool,
}

/// Result of comparing two projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReferenceReport {
    pub projects: (ProjectKey, ProjectKey),
    /// Active issues examined in each project.
    pub issues_examined: (usize, usize),
    /// References ordered by kind, then subject.
    pub references: Vec<CrossReference>,
    pub completeness: Completeness,
}

impl CrossReferenceReport {
    /// References of one kind.
    pub fn of_kind(&self, kind: ReferenceKind) -> impl Iterator<Item = &CrossReference> {
        self.references.iter().filter(move |r| r.kind == kind)
    }
}

/// Finds references between two projects.
#[derive(Debug)]
pub struct CrossReferenceDetector<'a> {
    cache: &'a IssueCache,
    config: CrossRefConfig,
    deadline: Option<Instant>,
}

impl<'a> CrossReferenceDetector<'a> {
    pub fn new(cache: &'a IssueCache, config: CrossRefConfig) -> Self {
        Self {
            cache,
            config,
            deadline: None,
        }
    }

    /// Stop loading issues at `deadline`, keeping what was loaded.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Compare the active issues of two projects.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if both projects are the same
    /// - `NotFound` / `AccessDenied` if either project search fails
    pub async fn detect(
        &self,
        project_a: &ProjectKey,
        project_b: &ProjectKey,
    ) -> Result<CrossReferenceReport, AnalysisError> {
        if project_a == project_b {
            return Err(AnalysisError::InvalidInput(format!(
                "cannot cross-reference project {} with itself",
                project_a
            )));
        }

        let mut completeness = Completeness::default();
        let issues_a = self.load_active(project_a, &mut completeness).await?;
        let issues_b = self.load_active(project_b, &mut completeness).await?;
        debug!(
            a = %project_a,
            b = %project_b,
            count_a = issues_a.len(),
            count_b = issues_b.len(),
            "cross-referencing projects"
        );

        let references = find_references(
            (project_a, &issues_a),
            (project_b, &issues_b),
            &self.config,
        );

        Ok(CrossReferenceReport {
            projects: (project_a.clone(), project_b.clone()),
            issues_examined: (issues_a.len(), issues_b.len()),
            references,
            completeness,
        })
    }

    async fn load_active(
        &self,
        project: &ProjectKey,
        completeness: &mut Completeness,
    ) -> Result<Vec<Arc<Issue>>, AnalysisError> {
        let limit = self.config.search_limit;
        let stream = self
            .cache
            .get_many(project, Some(ACTIVE_FILTER), limit.saturating_add(1));
        let mut issues = collect_bounded(stream, limit, self.deadline, completeness).await?;
        issues.retain(|i| i.is_active() && i.key.in_project(project));
        Ok(issues)
    }
}

/// Run every pass over two issue sets.
pub fn find_references(
    (project_a, issues_a): (&ProjectKey, &[Arc<Issue>]),
    (project_b, issues_b): (&ProjectKey, &[Arc<Issue>]),
    config: &CrossRefConfig,
) -> Vec<CrossReference> {
    let projects = (project_a.clone(), project_b.clone());
    let mut found: BTreeMap<(ReferenceKind, String), BTreeSet<(IssueKey, IssueKey)>> =
        BTreeMap::new();

    // Explicit links
    let all: Vec<Arc<Issue>> = issues_a.iter().chain(issues_b).cloned().collect();
    let graph = GraphBuilder::from_issues(&all);
    for edge in graph.cross_project_edges() {
        let pair = if edge.source.in_project(project_a) && edge.target.in_project(project_b) {
            (edge.source.clone(), edge.target.clone())
        } else if edge.source.in_project(project_b) && edge.target.in_project(project_a) {
            (edge.target.clone(), edge.source.clone())
        } else {
            continue;
        };
        found
            .entry((ReferenceKind::ExplicitLink, edge.kind.as_str().to_string()))
            .or_default()
            .insert(pair);
    }

    // Shared components and labels
    for (kind, names) in [
        (ReferenceKind::SharedComponent, components as fn(&Issue) -> &BTreeSet<String>),
        (ReferenceKind::SharedLabel, labels),
    ] {
        let index_a = name_index(issues_a, names);
        let index_b = name_index(issues_b, names);
        for (name, keys_a) in &index_a {
            let Some(keys_b) = index_b.get(name) else {
                continue;
            };
            let pairs = found.entry((kind, name.clone())).or_default();
            for a in keys_a {
                for b in keys_b {
                    pairs.insert((a.clone(), b.clone()));
                }
            }
        }
    }

    // Mentions
    if config.detect_mentions {
        let mut pairs = BTreeSet::new();
        if let Some(pattern) = mention_pattern(project_b) {
            for issue in issues_a {
                for mentioned in mentions(issue, &pattern) {
                    pairs.insert((issue.key.clone(), mentioned));
                }
            }
        }
        if let Some(pattern) = mention_pattern(project_a) {
            for issue in issues_b {
                for mentioned in mentions(issue, &pattern) {
                    pairs.insert((mentioned, issue.key.clone()));
                }
            }
        }
        if !pairs.is_empty() {
            found.insert((ReferenceKind::Mention, MENTION_SUBJECT.to_string()), pairs);
        }
    }

    found
        .into_iter()
        .filter(|(_, pairs)| !pairs.is_empty())
        .map(|((kind, subject), pairs)| {
            let evidence_total = pairs.len();
            let evidence: Vec<(IssueKey, IssueKey)> =
                pairs.into_iter().take(config.max_evidence_pairs).collect();
            CrossReference {
                projects: projects.clone(),
                kind,
                subject,
                evidence_truncated: evidence.len() < evidence_total,
                evidence,
                evidence_total,
            }
        })
        .filter(|r| !r.evidence.is_empty())
        .collect()
}

/// Trim and lowercase a component or label name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn components(issue: &Issue) -> &BTreeSet<String> {
    &issue.components
}

fn labels(issue: &Issue) -> &BTreeSet<String> {
    &issue.labels
}

/// Normalized name to the issues using it.
fn name_index(
    issues: &[Arc<Issue>],
    names: fn(&Issue) -> &BTreeSet<String>,
) -> BTreeMap<String, BTreeSet<IssueKey>> {
    let mut index: BTreeMap<String, BTreeSet<IssueKey>> = BTreeMap::new();
    for issue in issues {
        for name in names(issue) {
            let name = normalize_name(name);
            if !name.is_empty() {
                index.entry(name).or_default().insert(issue.key.clone());
            }
        }
    }
    index
}

fn mention_pattern(project: &ProjectKey) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b{}-(\d+)\b", regex::escape(project.as_str()))).ok()
}

/// Keys matching `pattern` written anywhere in an issue's text.
fn mentions(issue: &Issue, pattern: &Regex) -> BTreeSet<IssueKey> {
    issue
        .text_fields()
        .flat_map(|text| pattern.find_iter(text))
        .filter_map(|m| IssueKey::parse(m.as_str()).ok())
        .filter(|k| k != &issue.key)
        .collect()
}
