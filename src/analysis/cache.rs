//! analysis::cache
//!
//! Per-session issue cache.
//!
//! # Design
//!
//! One `IssueCache` lives for one top-level analysis request. Every issue is
//! fetched from the tracker at most once per session: each key owns a
//! `tokio::sync::OnceCell`, so concurrent `get`s of the same key wait on one
//! in-flight fetch instead of issuing their own.
//!
//! # Invariants
//!
//! - Append-only: a cached issue is never replaced (first write wins).
//! - Failed fetches are not cached; a later `get` tries again.
//! - The key map lock is held only for the map lookup, never across I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tokio::sync::OnceCell;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::core::issue::Issue;
use crate::core::types::{IssueKey, ProjectKey};
use crate::tracker::{RawIssue, Tracker};

use super::error::{AnalysisError, Completeness, DataAnomaly, PartialReason};
use super::links::LinkResolver;

type Slot = Arc<OnceCell<Arc<Issue>>>;

/// Session cache of normalized issues.
pub struct IssueCache {
    tracker: Arc<dyn Tracker>,
    resolver: LinkResolver,
    slots: Mutex<HashMap<IssueKey, Slot>>,
    anomalies: Mutex<BTreeMap<IssueKey, Vec<DataAnomaly>>>,
    fetches: AtomicUsize,
}

impl std::fmt::Debug for IssueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueCache")
            .field("tracker", &self.tracker.name())
            .field("len", &self.len())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

impl IssueCache {
    /// Create an empty cache over `tracker`.
    pub fn new(tracker: Arc<dyn Tracker>) -> Self {
        Self {
            tracker,
            resolver: LinkResolver::new(),
            slots: Mutex::new(HashMap::new()),
            anomalies: Mutex::new(BTreeMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Get an issue, fetching it on first access.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the issue does not exist
    /// - `AccessDenied` if the tracker refuses access
    pub async fn get(&self, key: &IssueKey) -> Result<Arc<Issue>, AnalysisError> {
        let slot = self.slot(key);
        let issue = slot.get_or_try_init(|| self.fetch(key)).await?;
        Ok(Arc::clone(issue))
    }

    /// Lazily search a project, caching every issue yielded.
    ///
    /// Pages are fetched only as the stream is polled.
    pub fn get_many<'a>(
        &'a self,
        project: &'a ProjectKey,
        filter: Option<&'a str>,
        limit: usize,
    ) -> BoxStream<'a, Result<Arc<Issue>, AnalysisError>> {
        self.tracker
            .search_issues(project, filter, limit)
            .map_err(AnalysisError::from)
            .and_then(move |raw| self.insert(raw))
            .boxed()
    }

    /// Normalize and store a raw issue.
    ///
    /// Returns the cached issue, which is the existing one if the key was
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns `MalformedData` if the raw issue's key is invalid.
    pub async fn insert(&self, raw: RawIssue) -> Result<Arc<Issue>, AnalysisError> {
        let (issue, anomalies) = self.resolver.normalize(raw)?;
        let key = issue.key.clone();
        let slot = self.slot(&key);

        let cached = slot
            .get_or_init(|| async move {
                self.record_anomalies(&key, anomalies);
                Arc::new(issue)
            })
            .await;
        Ok(Arc::clone(cached))
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &IssueKey) -> bool {
        self.lock_slots()
            .get(key)
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of cached issues.
    pub fn len(&self) -> usize {
        self.lock_slots()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of single-issue fetches sent to the tracker.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Anomalies found while normalizing `key`.
    pub fn anomalies_for(&self, key: &IssueKey) -> Vec<DataAnomaly> {
        self.lock_anomalies().get(key).cloned().unwrap_or_default()
    }

    /// All anomalies found so far, ordered by issue.
    pub fn anomalies(&self) -> Vec<DataAnomaly> {
        self.lock_anomalies().values().flatten().cloned().collect()
    }

    fn slot(&self, key: &IssueKey) -> Slot {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    async fn fetch(&self, key: &IssueKey) -> Result<Arc<Issue>, AnalysisError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, tracker = self.tracker.name(), "fetching issue");

        let raw = self.tracker.fetch_issue(key).await?;
        let (issue, anomalies) = self.resolver.normalize(raw)?;
        if &issue.key != key {
            debug!(requested = %key, returned = %issue.key, "tracker returned a moved issue");
        }
        self.record_anomalies(key, anomalies);
        Ok(Arc::new(issue))
    }

    fn record_anomalies(&self, key: &IssueKey, anomalies: Vec<DataAnomaly>) {
        if anomalies.is_empty() {
            return;
        }
        for anomaly in &anomalies {
            debug!(%anomaly, "data anomaly");
        }
        self.lock_anomalies().insert(key.clone(), anomalies);
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<IssueKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_anomalies(&self) -> MutexGuard<'_, BTreeMap<IssueKey, Vec<DataAnomaly>>> {
        self.anomalies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drain a search stream, stopping after `limit` issues or at `deadline`.
///
/// Callers should ask the stream for `limit + 1` issues: seeing the extra
/// one marks `SearchLimit`. An expired deadline marks `TimeBudget` and keeps
/// what was collected so far.
pub async fn collect_bounded(
    mut stream: BoxStream<'_, Result<Arc<Issue>, AnalysisError>>,
    limit: usize,
    deadline: Option<Instant>,
    completeness: &mut Completeness,
) -> Result<Vec<Arc<Issue>>, AnalysisError> {
    let mut issues = Vec::new();
    loop {
        let next = match deadline {
            Some(at) => match timeout_at(at, stream.try_next()).await {
                Ok(next) => next?,
                Err(_) => {
                    warn!(collected = issues.len(), "time budget expired during search");
                    completeness.mark(PartialReason::TimeBudget);
                    break;
                }
            },
            None => stream.try_next().await?,
        };
        let Some(issue) = next else { break };
        if issues.len() == limit {
            completeness.mark(PartialReason::SearchLimit);
            break;
        }
        issues.push(issue);
    }
    Ok(issues)
}
