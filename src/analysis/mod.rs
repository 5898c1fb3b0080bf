//! analysis
//!
//! The read-only analysis core.
//!
//! # Architecture
//!
//! - [`cache`] - Per-session issue cache; one fetch per issue per session
//! - [`links`] - Normalizes raw tracker links into typed links
//! - [`graph`] - Bounded breadth-first relationship graph
//! - [`crossref`] - References between two projects
//! - [`content`] - Term, label and comment patterns
//! - [`facade`] - The request interface ([`Analyzer`])
//!
//! All results are deterministic for a given tracker state. Partial results
//! carry a [`Completeness`] qualifier instead of failing.

pub mod cache;
pub mod content;
pub mod crossref;
pub mod error;
pub mod facade;
pub mod graph;
pub mod links;

pub use content::{ContentAnalyzer, ContentConfig, ContentReport};
pub use crossref::{CrossRefConfig, CrossReference, CrossReferenceReport, ReferenceKind};
pub use error::{AnalysisError, Completeness, DataAnomaly, PartialReason};
pub use facade::{
    AnalysisConfig, Analyzer, ContentTarget, IssueDetails, ProjectMetrics, RelationshipReport,
    SearchCriteria, SearchResult, NO_PRIORITY,
};
pub use graph::{GraphEdge, GraphNode, NodeState, RelationshipGraph};
