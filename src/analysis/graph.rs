//! analysis::graph
//!
//! Relationship graph construction.
//!
//! # Architecture
//!
//! The relationship graph is a directed multigraph where:
//! - Nodes are issues, keyed by [`IssueKey`]
//! - Edges are canonical [`GraphEdge`]s: inverse kinds are flipped to their
//!   forward kind and `relates-to` is oriented smaller key first, so
//!   "A blocks B" seen from A and "B is blocked by A" seen from B are the
//!   same edge
//!
//! [`GraphBuilder`] walks links breadth-first from one or more seeds, one
//! depth level at a time. Fetches within a level run concurrently on a
//! bounded pool; results are folded into ordered maps, so the graph does not
//! depend on completion order.
//!
//! # Invariants
//!
//! - Each key is visited at most once (cycles terminate)
//! - No self-loops; they are reported as anomalies instead
//! - Nodes at depth `<= max_depth` are fetched; keys first seen at
//!   `max_depth + 1` become truncated placeholders and are never fetched

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::issue::Issue;
use crate::core::link::{Link, LinkKind};
use crate::core::types::IssueKey;

use super::cache::IssueCache;
use super::error::{AnalysisError, Completeness, DataAnomaly, PartialReason};
use super::links::LinkResolver;

/// Default traversal depth.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Default number of concurrent fetches within a level.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// A canonical edge between two issues.
///
/// Identity is `(source, target, kind)`; `unmapped_type` is an annotation
/// and takes no part in equality or ordering.
#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub source: IssueKey,
    pub target: IssueKey,
    pub kind: LinkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_type: Option<String>,
}

impl GraphEdge {
    /// Canonical edge for a link seen from `owner`.
    ///
    /// Returns `None` for a self-loop.
    pub fn canonical(owner: &IssueKey, link: &Link) -> Option<GraphEdge> {
        if owner == &link.target {
            return None;
        }

        let (mut source, mut target, mut kind) = (owner, &link.target, link.kind);
        if !kind.is_forward() {
            std::mem::swap(&mut source, &mut target);
            kind = kind.inverse();
        }
        if kind.is_symmetric() && source > target {
            std::mem::swap(&mut source, &mut target);
        }

        Some(GraphEdge {
            source: source.clone(),
            target: target.clone(),
            kind,
            unmapped_type: link.unmapped_type.clone(),
        })
    }

    /// Whether the endpoints are in different projects.
    pub fn is_cross_project(&self) -> bool {
        self.source.project() != self.target.project()
    }

    /// The endpoint that is not `key`, if `key` is an endpoint.
    pub fn other(&self, key: &IssueKey) -> Option<&IssueKey> {
        if &self.source == key {
            Some(&self.target)
        } else if &self.target == key {
            Some(&self.source)
        } else {
            None
        }
    }

    fn identity(&self) -> (&IssueKey, &IssueKey, LinkKind) {
        (&self.source, &self.target, self.kind)
    }
}

impl PartialEq for GraphEdge {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for GraphEdge {}

impl PartialOrd for GraphEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GraphEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

/// What is known about a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    /// Fetched successfully.
    Resolved {
        summary: String,
        status: String,
        issue_type: String,
        active: bool,
    },
    /// The fetch failed.
    Unresolved { error: String, message: String },
    /// Known only as a link target; not fetched.
    Truncated,
}

/// A node in the relationship graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub key: IssueKey,
    /// BFS depth from the nearest seed.
    pub depth: usize,
    #[serde(flatten)]
    pub state: NodeState,
    /// Edges whose source is this node.
    pub outgoing: BTreeSet<GraphEdge>,
    /// Edges whose target is this node.
    pub incoming: BTreeSet<GraphEdge>,
}

impl GraphNode {
    fn new(key: IssueKey, depth: usize, state: NodeState) -> Self {
        Self {
            key,
            depth,
            state,
            outgoing: BTreeSet::new(),
            incoming: BTreeSet::new(),
        }
    }

    fn resolved(key: IssueKey, issue: &Issue, depth: usize) -> Self {
        Self::new(
            key,
            depth,
            NodeState::Resolved {
                summary: issue.summary.clone(),
                status: issue.status.clone(),
                issue_type: issue.issue_type.clone(),
                active: issue.is_active(),
            },
        )
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, NodeState::Resolved { .. })
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.state, NodeState::Truncated)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self.state, NodeState::Unresolved { .. })
    }
}

/// The relationship graph derived from issue links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipGraph {
    nodes: BTreeMap<IssueKey, GraphNode>,
    edges: BTreeSet<GraphEdge>,
    anomalies: BTreeSet<DataAnomaly>,
    completeness: Completeness,
}

impl RelationshipGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// All edges, ordered.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check whether an edge exists.
    pub fn has_edge(&self, source: &IssueKey, target: &IssueKey, kind: LinkKind) -> bool {
        self.edges
            .iter()
            .any(|e| e.identity() == (source, target, kind))
    }

    /// Get a node.
    pub fn node(&self, key: &IssueKey) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    /// All nodes, ordered by key.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keys reachable from `key` along edges in either direction, excluding
    /// `key` itself.
    pub fn related(&self, key: &IssueKey) -> BTreeSet<IssueKey> {
        let mut adjacency: BTreeMap<&IssueKey, Vec<&IssueKey>> = BTreeMap::new();
        for edge in &self.edges {
            adjacency.entry(&edge.source).or_default().push(&edge.target);
            adjacency.entry(&edge.target).or_default().push(&edge.source);
        }

        let mut seen: HashSet<&IssueKey> = HashSet::from([key]);
        let mut queue = VecDeque::from([key]);
        while let Some(current) = queue.pop_front() {
            for &next in adjacency.get(current).into_iter().flatten() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        seen.into_iter()
            .filter(|k| *k != key)
            .cloned()
            .collect()
    }

    /// Edges whose endpoints are in different projects.
    pub fn cross_project_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|e| e.is_cross_project())
    }

    /// Keys of truncated nodes.
    pub fn truncated(&self) -> Vec<&IssueKey> {
        self.nodes
            .values()
            .filter(|n| n.is_truncated())
            .map(|n| &n.key)
            .collect()
    }

    /// Keys of nodes whose fetch failed.
    pub fn unresolved(&self) -> Vec<&IssueKey> {
        self.nodes
            .values()
            .filter(|n| n.is_unresolved())
            .map(|n| &n.key)
            .collect()
    }

    /// Anomalies found on the graph's issues.
    pub fn anomalies(&self) -> impl Iterator<Item = &DataAnomaly> {
        self.anomalies.iter()
    }

    /// Whether the graph covers everything that was asked for.
    pub fn completeness(&self) -> &Completeness {
        &self.completeness
    }

    /// Directed cycles among edges of `kind`.
    ///
    /// Each entry is a group of issues that reach each other along `kind`
    /// edges (a strongly connected component with more than one node),
    /// sorted by key. Symmetric kinds have no cycles.
    pub fn find_cycles_of(&self, kind: LinkKind) -> Vec<Vec<IssueKey>> {
        if kind.is_symmetric() {
            return Vec::new();
        }

        let mut adjacency: BTreeMap<&IssueKey, Vec<&IssueKey>> = BTreeMap::new();
        for edge in self.edges.iter().filter(|e| e.kind == kind) {
            adjacency.entry(&edge.source).or_default().push(&edge.target);
            adjacency.entry(&edge.target).or_default();
        }

        let mut tarjan = Tarjan::new(&adjacency);
        for &node in adjacency.keys() {
            if !tarjan.index.contains_key(node) {
                tarjan.visit(node);
            }
        }

        let mut cycles: Vec<Vec<IssueKey>> = tarjan
            .components
            .into_iter()
            .filter(|c| c.len() > 1)
            .map(|c| {
                let mut keys: Vec<IssueKey> = c.into_iter().cloned().collect();
                keys.sort();
                keys
            })
            .collect();
        cycles.sort();
        cycles
    }

    fn insert_node(&mut self, node: GraphNode) {
        self.nodes.entry(node.key.clone()).or_insert(node);
    }

    fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.insert(edge);
    }

    fn mark(&mut self, reason: PartialReason) {
        self.completeness.mark(reason);
    }

    /// Copy edges into the per-node incoming/outgoing sets.
    fn finalize(mut self) -> Self {
        for edge in &self.edges {
            if let Some(node) = self.nodes.get_mut(&edge.source) {
                node.outgoing.insert(edge.clone());
            }
            if let Some(node) = self.nodes.get_mut(&edge.target) {
                node.incoming.insert(edge.clone());
            }
        }
        self
    }
}

/// Tarjan's strongly connected components over borrowed keys.
struct Tarjan<'g> {
    adjacency: &'g BTreeMap<&'g IssueKey, Vec<&'g IssueKey>>,
    next_index: usize,
    index: BTreeMap<&'g IssueKey, usize>,
    lowlink: BTreeMap<&'g IssueKey, usize>,
    stack: Vec<&'g IssueKey>,
    on_stack: HashSet<&'g IssueKey>,
    components: Vec<Vec<&'g IssueKey>>,
}

impl<'g> Tarjan<'g> {
    fn new(adjacency: &'g BTreeMap<&'g IssueKey, Vec<&'g IssueKey>>) -> Self {
        Self {
            adjacency,
            next_index: 0,
            index: BTreeMap::new(),
            lowlink: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: HashSet::new(),
            components: Vec::new(),
        }
    }

    fn visit(&mut self, node: &'g IssueKey) {
        self.index.insert(node, self.next_index);
        self.lowlink.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let adjacency = self.adjacency;
        let successors = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
        for &next in successors {
            if !self.index.contains_key(next) {
                self.visit(next);
                let low = self.lowlink[node].min(self.lowlink[next]);
                self.lowlink.insert(node, low);
            } else if self.on_stack.contains(next) {
                let low = self.lowlink[node].min(self.index[next]);
                self.lowlink.insert(node, low);
            }
        }

        if self.lowlink[node] == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member);
                if member == node {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Outcome of one node fetch within a level.
enum Fetched {
    Issue(Arc<Issue>),
    Failed(AnalysisError),
    TimedOut,
}

/// Builds relationship graphs by bounded breadth-first traversal.
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    cache: &'a IssueCache,
    max_concurrency: usize,
    deadline: Option<Instant>,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder that fetches through `cache`.
    pub fn new(cache: &'a IssueCache) -> Self {
        Self {
            cache,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            deadline: None,
        }
    }

    /// Limit concurrent fetches within a level (builder pattern).
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Stop traversal when `deadline` passes (builder pattern).
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Build the graph reachable from `seeds` within `max_depth` hops.
    ///
    /// # Errors
    ///
    /// A seed that cannot be fetched fails the whole build with the
    /// underlying error. Failures below the seeds become unresolved nodes.
    pub async fn build(
        &self,
        seeds: &[IssueKey],
        max_depth: usize,
    ) -> Result<RelationshipGraph, AnalysisError> {
        let mut graph = RelationshipGraph::new();
        let mut visited: HashSet<IssueKey> = seeds.iter().cloned().collect();
        let mut frontier: Vec<IssueKey> = visited.iter().cloned().collect();
        frontier.sort();
        let mut resolved: Vec<Arc<Issue>> = Vec::new();
        let mut depth = 0;

        while !frontier.is_empty() {
            if self.deadline_passed() {
                warn!(depth, pending = frontier.len(), "time budget exhausted");
                for key in frontier.drain(..) {
                    graph.insert_node(GraphNode::new(key, depth, NodeState::Truncated));
                }
                graph.mark(PartialReason::TimeBudget);
                break;
            }

            debug!(depth, count = frontier.len(), "fetching level");
            let results = self.fetch_level(&frontier).await;
            let mut next = BTreeSet::new();

            for (key, fetched) in results {
                match fetched {
                    Fetched::Issue(issue) => {
                        graph.insert_node(GraphNode::resolved(key.clone(), &issue, depth));
                        for anomaly in self.cache.anomalies_for(&key) {
                            if anomaly.hides_links() {
                                graph.mark(PartialReason::UnresolvedNodes);
                            }
                            graph.anomalies.insert(anomaly);
                        }

                        for link in &issue.links {
                            let Some(edge) = GraphEdge::canonical(&key, link) else {
                                continue;
                            };
                            graph.add_edge(edge);

                            if visited.insert(link.target.clone()) {
                                if depth < max_depth {
                                    next.insert(link.target.clone());
                                } else {
                                    graph.insert_node(GraphNode::new(
                                        link.target.clone(),
                                        depth + 1,
                                        NodeState::Truncated,
                                    ));
                                    graph.mark(PartialReason::DepthLimit);
                                }
                            }
                        }
                        resolved.push(issue);
                    }
                    Fetched::Failed(err) if depth == 0 => return Err(err),
                    Fetched::Failed(err) => {
                        warn!(key = %key, error = %err, "could not fetch linked issue");
                        graph.insert_node(GraphNode::new(
                            key,
                            depth,
                            NodeState::Unresolved {
                                error: error_kind(&err).to_string(),
                                message: err.to_string(),
                            },
                        ));
                        graph.mark(PartialReason::UnresolvedNodes);
                    }
                    Fetched::TimedOut => {
                        graph.insert_node(GraphNode::new(key, depth, NodeState::Truncated));
                        graph.mark(PartialReason::TimeBudget);
                    }
                }
            }

            frontier = next.into_iter().collect();
            depth += 1;
        }

        let asymmetric = LinkResolver::new().asymmetric_links(resolved.iter().map(Arc::as_ref));
        if !asymmetric.is_empty() {
            debug!(count = asymmetric.len(), "links declared on one side only");
        }
        graph
            .anomalies
            .extend(asymmetric.into_iter().map(DataAnomaly::from));

        Ok(graph.finalize())
    }

    /// Build a graph from already fetched issues, without traversal.
    ///
    /// Link targets outside `issues` become truncated nodes at depth 1.
    pub fn from_issues(issues: &[Arc<Issue>]) -> RelationshipGraph {
        let mut graph = RelationshipGraph::new();
        for issue in issues {
            graph.insert_node(GraphNode::resolved(issue.key.clone(), issue, 0));
        }

        for issue in issues {
            for link in &issue.links {
                if let Some(edge) = GraphEdge::canonical(&issue.key, link) {
                    graph.add_edge(edge);
                }
                if !graph.nodes.contains_key(&link.target) && link.target != issue.key {
                    graph.insert_node(GraphNode::new(
                        link.target.clone(),
                        1,
                        NodeState::Truncated,
                    ));
                    graph.mark(PartialReason::DepthLimit);
                }
            }
        }

        graph.finalize()
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fetch one level concurrently; results are ordered by key.
    async fn fetch_level(&self, keys: &[IssueKey]) -> BTreeMap<IssueKey, Fetched> {
        let cache = self.cache;
        let deadline = self.deadline;

        stream::iter(keys.iter().cloned())
            .map(move |key| async move {
                let fetch = cache.get(&key);
                let result = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, fetch).await.ok(),
                    None => Some(fetch.await),
                };
                let fetched = match result {
                    Some(Ok(issue)) => Fetched::Issue(issue),
                    Some(Err(err)) => Fetched::Failed(err),
                    None => Fetched::TimedOut,
                };
                (key, fetched)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await
    }
}

fn error_kind(err: &AnalysisError) -> &'static str {
    match err {
        AnalysisError::NotFound(_) => "not_found",
        AnalysisError::AccessDenied(_) => "access_denied",
        AnalysisError::MalformedData(_) => "malformed",
        AnalysisError::InvalidInput(_) => "invalid_input",
        AnalysisError::Tracker(e) => e.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::link::Direction;
    use crate::tracker::mock::MockTracker;
    use crate::tracker::{RawIssue, RawLink, TrackerError};

    fn key(s: &str) -> IssueKey {
        IssueKey::parse(s).unwrap()
    }

    fn blocks(from: &str, to: &str) -> RawIssue {
        RawIssue::new(from, from).with_link(RawLink::outbound("Blocks", "blocks", to))
    }

    fn cache(issues: Vec<RawIssue>) -> (MockTracker, IssueCache) {
        let tracker = MockTracker::with_issues(issues);
        let cache = IssueCache::new(Arc::new(tracker.clone()));
        (tracker, cache)
    }

    mod canonical {
        use super::*;

        #[test]
        fn inverse_kind_is_flipped() {
            let link = Link::new(LinkKind::BlockedBy, key("A-1"), Direction::Inbound);
            let edge = GraphEdge::canonical(&key("A-2"), &link).unwrap();
            assert_eq!(edge.source, key("A-1"));
            assert_eq!(edge.target, key("A-2"));
            assert_eq!(edge.kind, LinkKind::Blocks);
        }

        #[test]
        fn both_sides_give_same_edge() {
            let from_a = GraphEdge::canonical(
                &key("A-1"),
                &Link::new(LinkKind::Blocks, key("A-2"), Direction::Outbound),
            );
            let from_b = GraphEdge::canonical(
                &key("A-2"),
                &Link::new(LinkKind::BlockedBy, key("A-1"), Direction::Inbound),
            );
            assert_eq!(from_a, from_b);
        }

        #[test]
        fn relates_to_oriented_smaller_first() {
            let edge = GraphEdge::canonical(
                &key("A-10"),
                &Link::new(LinkKind::RelatesTo, key("A-2"), Direction::Outbound),
            )
            .unwrap();
            assert_eq!(edge.source, key("A-2"));
        }

        #[test]
        fn self_loop_rejected() {
            let link = Link::new(LinkKind::Blocks, key("A-1"), Direction::Outbound);
            assert!(GraphEdge::canonical(&key("A-1"), &link).is_none());
        }

        #[test]
        fn unmapped_annotation_ignored_for_identity() {
            let a = GraphEdge::canonical(
                &key("A-1"),
                &Link::unmapped("Cloners", key("A-2"), Direction::Outbound),
            );
            let b = GraphEdge::canonical(
                &key("A-1"),
                &Link::new(LinkKind::RelatesTo, key("A-2"), Direction::Outbound),
            );
            assert_eq!(a, b);
        }
    }

    mod build {
        use super::*;

        #[tokio::test]
        async fn chain_truncated_at_depth() {
            let (tracker, cache) = cache(vec![
                blocks("A-1", "A-2"),
                blocks("A-2", "A-3"),
                blocks("A-3", "A-4"),
                RawIssue::new("A-4", "end"),
            ]);
            let graph = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 1)
                .await
                .unwrap();

            let edges: Vec<(String, String)> = graph
                .edges()
                .map(|e| (e.source.to_string(), e.target.to_string()))
                .collect();
            assert_eq!(
                edges,
                vec![
                    ("A-1".to_string(), "A-2".to_string()),
                    ("A-2".to_string(), "A-3".to_string())
                ]
            );
            assert_eq!(graph.truncated(), vec![&key("A-3")]);
            assert!(graph.node(&key("A-4")).is_none());
            assert_eq!(tracker.fetch_count("A-3"), 0);
            assert_eq!(graph.completeness().reasons(), vec![PartialReason::DepthLimit]);
        }

        #[tokio::test]
        async fn cycle_terminates_and_visits_once() {
            let (tracker, cache) = cache(vec![
                blocks("A-1", "A-2"),
                blocks("A-2", "A-3"),
                blocks("A-3", "A-1"),
            ]);
            let graph = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 10)
                .await
                .unwrap();

            assert_eq!(graph.len(), 3);
            assert_eq!(graph.edge_count(), 3);
            for k in ["A-1", "A-2", "A-3"] {
                assert_eq!(tracker.fetch_count(k), 1);
            }
            assert!(graph.completeness().is_complete());
            assert_eq!(
                graph.find_cycles_of(LinkKind::Blocks),
                vec![vec![key("A-1"), key("A-2"), key("A-3")]]
            );
        }

        #[tokio::test]
        async fn missing_seed_is_error() {
            let (_, cache) = cache(vec![]);
            let err = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 2)
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::NotFound(_)));
        }

        #[tokio::test]
        async fn missing_neighbor_is_unresolved() {
            let (_, cache) = cache(vec![blocks("A-1", "A-2")]);
            let graph = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 2)
                .await
                .unwrap();

            assert_eq!(graph.unresolved(), vec![&key("A-2")]);
            assert!(graph.has_edge(&key("A-1"), &key("A-2"), LinkKind::Blocks));
            assert_eq!(
                graph.completeness().reasons(),
                vec![PartialReason::UnresolvedNodes]
            );
        }

        #[tokio::test]
        async fn denied_neighbor_keeps_error_kind() {
            let tracker = MockTracker::with_issues(vec![blocks("A-1", "A-2")])
                .fail_issue("A-2", TrackerError::AccessDenied("A-2".into()));
            let cache = IssueCache::new(Arc::new(tracker));
            let graph = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 2)
                .await
                .unwrap();

            let node = graph.node(&key("A-2")).unwrap();
            assert!(matches!(
                &node.state,
                NodeState::Unresolved { error, .. } if error == "access_denied"
            ));
        }

        #[tokio::test]
        async fn node_edge_sets_are_filled() {
            let (_, cache) = cache(vec![
                blocks("A-1", "A-2"),
                RawIssue::new("A-2", "two")
                    .with_link(RawLink::inbound("Blocks", "is blocked by", "A-1")),
            ]);
            let graph = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 2)
                .await
                .unwrap();

            assert_eq!(graph.edge_count(), 1);
            assert_eq!(graph.node(&key("A-1")).unwrap().outgoing.len(), 1);
            assert_eq!(graph.node(&key("A-2")).unwrap().incoming.len(), 1);
        }

        #[tokio::test]
        async fn self_link_recorded_as_anomaly() {
            let (_, cache) = cache(vec![blocks("A-1", "A-1")]);
            let graph = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 2)
                .await
                .unwrap();
            assert_eq!(graph.edge_count(), 0);
            assert_eq!(graph.anomalies().count(), 1);
        }

        #[tokio::test]
        async fn one_sided_link_recorded_as_anomaly() {
            let (_, cache) = cache(vec![
                RawIssue::new("A-1", "one")
                    .with_link(RawLink::outbound("Relates", "relates to", "A-2")),
                RawIssue::new("A-2", "two")
                    .with_link(RawLink::inbound("Blocks", "is blocked by", "A-1")),
            ]);
            let graph = GraphBuilder::new(&cache)
                .build(&[key("A-1")], 2)
                .await
                .unwrap();

            let anomalies: Vec<_> = graph.anomalies().collect();
            assert_eq!(
                anomalies,
                vec![&DataAnomaly::OneSidedLink {
                    issue: key("A-2"),
                    link_type: "blocked-by".to_string(),
                    counterpart: key("A-1"),
                }]
            );
            assert!(graph.completeness().is_complete());
        }

        #[tokio::test]
        async fn unloaded_epic_children_make_graph_partial() {
            let epic = RawIssue::new("E-1", "epic")
                .with_epic_child("E-2")
                .with_epic_children_error(TrackerError::AccessDenied("E-1".into()));
            let (_, cache) = cache(vec![epic, RawIssue::new("E-2", "story").with_epic("E-1")]);
            let graph = GraphBuilder::new(&cache)
                .build(&[key("E-1")], 2)
                .await
                .unwrap();

            assert!(graph.has_edge(&key("E-1"), &key("E-2"), LinkKind::EpicOf));
            assert!(graph.anomalies().any(DataAnomaly::hides_links));
            assert_eq!(
                graph.completeness().reasons(),
                vec![PartialReason::UnresolvedNodes]
            );
        }

        #[tokio::test]
        async fn expired_deadline_returns_partial() {
            let (tracker, cache) = cache(vec![blocks("A-1", "A-2")]);
            let graph = GraphBuilder::new(&cache)
                .with_deadline(Some(Instant::now()))
                .build(&[key("A-1")], 2)
                .await
                .unwrap();

            assert_eq!(graph.truncated(), vec![&key("A-1")]);
            assert_eq!(tracker.total_fetches(), 0);
            assert_eq!(graph.completeness().reasons(), vec![PartialReason::TimeBudget]);
        }
    }

    mod queries {
        use super::*;

        fn issue(raw: RawIssue) -> Arc<Issue> {
            Arc::new(LinkResolver::new().normalize(raw).unwrap().0)
        }

        #[test]
        fn related_follows_both_directions() {
            let graph = GraphBuilder::from_issues(&[
                issue(blocks("A-1", "A-2")),
                issue(blocks("A-3", "A-2")),
                issue(RawIssue::new("A-9", "isolated")),
            ]);
            let related = graph.related(&key("A-1"));
            assert_eq!(related, BTreeSet::from([key("A-2"), key("A-3")]));
            assert!(graph.related(&key("A-9")).is_empty());
        }

        #[test]
        fn cross_project_edges_only() {
            let graph = GraphBuilder::from_issues(&[
                issue(blocks("A-1", "B-1")),
                issue(blocks("A-2", "A-3")),
            ]);
            let cross: Vec<&GraphEdge> = graph.cross_project_edges().collect();
            assert_eq!(cross.len(), 1);
            assert_eq!(cross[0].target, key("B-1"));
        }

        #[test]
        fn from_issues_marks_outside_targets_truncated() {
            let graph = GraphBuilder::from_issues(&[issue(blocks("A-1", "A-2"))]);
            assert_eq!(graph.truncated(), vec![&key("A-2")]);
        }

        #[test]
        fn no_cycles_in_chain() {
            let graph = GraphBuilder::from_issues(&[
                issue(blocks("A-1", "A-2")),
                issue(blocks("A-2", "A-3")),
            ]);
            assert!(graph.find_cycles_of(LinkKind::Blocks).is_empty());
            assert!(graph.find_cycles_of(LinkKind::RelatesTo).is_empty());
        }
    }
}
