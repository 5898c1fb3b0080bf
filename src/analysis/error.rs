//! analysis::error
//!
//! Errors, completeness qualifiers and data anomalies.
//!
//! # Design
//!
//! An [`AnalysisError`] means the request produced no result. A result that
//! was produced but is incomplete carries a [`Completeness`] instead; the
//! caller always knows whether it is looking at the whole picture.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{IssueKey, TypeError};
use crate::tracker::TrackerError;

/// Errors from analysis operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The requested issue or project does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The tracker refused access; distinct from `NotFound`.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Tracker data could not be interpreted.
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// The request itself is invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other tracker failure.
    #[error(transparent)]
    Tracker(TrackerError),
}

impl From<TrackerError> for AnalysisError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::NotFound(msg) => AnalysisError::NotFound(msg),
            TrackerError::AccessDenied(msg) => AnalysisError::AccessDenied(msg),
            TrackerError::Malformed(msg) => AnalysisError::MalformedData(msg),
            other => AnalysisError::Tracker(other),
        }
    }
}

impl From<TypeError> for AnalysisError {
    fn from(err: TypeError) -> Self {
        AnalysisError::InvalidInput(err.to_string())
    }
}

/// Why a result is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartialReason {
    /// Traversal stopped at the configured depth.
    DepthLimit,
    /// The time budget ran out.
    TimeBudget,
    /// Some nodes could not be fetched.
    UnresolvedNodes,
    /// A project search hit the configured result cap.
    SearchLimit,
}

impl fmt::Display for PartialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PartialReason::DepthLimit => "depth-limit",
            PartialReason::TimeBudget => "time-budget",
            PartialReason::UnresolvedNodes => "unresolved-nodes",
            PartialReason::SearchLimit => "search-limit",
        };
        f.write_str(s)
    }
}

/// Completeness qualifier attached to successful results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completeness {
    #[default]
    Complete,
    Partial { reasons: BTreeSet<PartialReason> },
}

impl Completeness {
    /// Whether the result is complete.
    pub fn is_complete(&self) -> bool {
        matches!(self, Completeness::Complete)
    }

    /// Record a reason, turning the qualifier partial.
    pub fn mark(&mut self, reason: PartialReason) {
        match self {
            Completeness::Complete => {
                *self = Completeness::Partial {
                    reasons: BTreeSet::from([reason]),
                }
            }
            Completeness::Partial { reasons } => {
                reasons.insert(reason);
            }
        }
    }

    /// Combine with another qualifier.
    pub fn merge(&mut self, other: &Completeness) {
        for reason in other.reasons() {
            self.mark(reason);
        }
    }

    /// The recorded reasons, in order.
    pub fn reasons(&self) -> Vec<PartialReason> {
        match self {
            Completeness::Complete => Vec::new(),
            Completeness::Partial { reasons } => reasons.iter().copied().collect(),
        }
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completeness::Complete => f.write_str("complete"),
            Completeness::Partial { reasons } => {
                let reasons: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
                write!(f, "partial ({})", reasons.join(", "))
            }
        }
    }
}

/// Tracker data that was caught and set aside instead of crashing analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DataAnomaly {
    /// An issue links to itself.
    SelfLink { issue: IssueKey, link_type: String },
    /// A link could not be interpreted.
    UnparseableLink {
        issue: IssueKey,
        link_type: String,
        target: String,
        reason: String,
    },
    /// An inbound link whose declaring issue does not list it.
    OneSidedLink {
        issue: IssueKey,
        link_type: String,
        counterpart: IssueKey,
    },
    /// Part of an issue's relationships could not be loaded.
    UnloadedLinks {
        issue: IssueKey,
        relation: String,
        error: String,
    },
}

impl DataAnomaly {
    /// The issue the anomaly was found on.
    pub fn issue(&self) -> &IssueKey {
        match self {
            DataAnomaly::SelfLink { issue, .. } => issue,
            DataAnomaly::UnparseableLink { issue, .. } => issue,
            DataAnomaly::OneSidedLink { issue, .. } => issue,
            DataAnomaly::UnloadedLinks { issue, .. } => issue,
        }
    }

    /// Whether the anomaly means relationships are missing from the data.
    pub fn hides_links(&self) -> bool {
        matches!(self, DataAnomaly::UnloadedLinks { .. })
    }
}

impl fmt::Display for DataAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataAnomaly::SelfLink { issue, link_type } => {
                write!(f, "{} links to itself ({})", issue, link_type)
            }
            DataAnomaly::UnparseableLink {
                issue,
                link_type,
                target,
                reason,
            } => write!(
                f,
                "{} has an unparseable link '{}' to '{}': {}",
                issue, link_type, target, reason
            ),
            DataAnomaly::OneSidedLink {
                issue,
                link_type,
                counterpart,
            } => write!(
                f,
                "{} has '{}' from {}, which does not list it",
                issue, link_type, counterpart
            ),
            DataAnomaly::UnloadedLinks {
                issue,
                relation,
                error,
            } => write!(f, "{} {} could not be loaded: {}", issue, relation, error),
        }
    }
}
