//! analysis::links
//!
//! Link resolution: raw tracker links into normalized [`Link`]s.
//!
//! # Design
//!
//! Resolution goes through an explicit lookup table rather than string
//! matching scattered over the code. A link is resolved by, in order:
//!
//! 1. its direction-specific description ("is blocked by"), which already
//!    encodes direction;
//! 2. its type name ("Blocks"), combined with the raw direction: outbound
//!    gives the forward kind, inbound its inverse.
//!
//! Anything else becomes `relates-to` with the original type kept in
//! [`Link::unmapped_type`]. Links that cannot be interpreted at all, and
//! self-links, are reported as [`DataAnomaly`] values.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::core::issue::{Issue, StatusCategory};
use crate::core::link::{Direction, Link, LinkKind};
use crate::core::types::IssueKey;
use crate::tracker::{RawIssue, RawLink};

use super::error::{AnalysisError, DataAnomaly};

/// Direction-specific link descriptions.
const DESCRIPTIONS: &[(&str, LinkKind)] = &[
    ("blocks", LinkKind::Blocks),
    ("is blocked by", LinkKind::BlockedBy),
    ("duplicates", LinkKind::Duplicates),
    ("is duplicated by", LinkKind::DuplicatedBy),
    ("relates to", LinkKind::RelatesTo),
    ("is epic of", LinkKind::EpicOf),
    ("has epic", LinkKind::EpicParent),
    ("is subtask of", LinkKind::SubtaskOf),
    ("is parent of", LinkKind::ParentOf),
];

/// Link type names, mapped to the kind seen from the outward side.
const TYPE_NAMES: &[(&str, LinkKind)] = &[
    ("blocks", LinkKind::Blocks),
    ("duplicate", LinkKind::Duplicates),
    ("relates", LinkKind::RelatesTo),
    ("epic-story link", LinkKind::EpicOf),
    ("jira_subtask_link", LinkKind::ParentOf),
];

/// Output of resolving one issue's links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Normalized links, duplicates collapsed, source order kept.
    pub links: Vec<Link>,
    /// Problems found while resolving.
    pub anomalies: Vec<DataAnomaly>,
}

/// An inbound link whose declaring side does not list it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsymmetricLink {
    /// The issue holding the inbound link.
    pub issue: IssueKey,
    /// The link as seen from `issue`.
    pub link: Link,
}

impl From<AsymmetricLink> for DataAnomaly {
    fn from(asymmetric: AsymmetricLink) -> Self {
        DataAnomaly::OneSidedLink {
            issue: asymmetric.issue,
            link_type: asymmetric
                .link
                .unmapped_type
                .unwrap_or_else(|| asymmetric.link.kind.as_str().to_string()),
            counterpart: asymmetric.link.target,
        }
    }
}

/// Maps raw link data to normalized links.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    descriptions: HashMap<&'static str, LinkKind>,
    type_names: HashMap<&'static str, LinkKind>,
}

impl Default for LinkResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkResolver {
    /// Create a resolver with the standard lookup table.
    pub fn new() -> Self {
        Self {
            descriptions: DESCRIPTIONS.iter().copied().collect(),
            type_names: TYPE_NAMES.iter().copied().collect(),
        }
    }

    /// Map a raw link to a kind, or `None` when nothing in the table matches.
    pub fn lookup(&self, raw: &RawLink) -> Option<LinkKind> {
        let description = raw.description().trim().to_lowercase();
        if let Some(kind) = self.descriptions.get(description.as_str()) {
            return Some(*kind);
        }

        let type_name = raw.type_name.trim().to_lowercase();
        self.type_names
            .get(type_name.as_str())
            .map(|kind| match raw.direction {
                Direction::Outbound => *kind,
                Direction::Inbound => kind.inverse(),
            })
    }

    /// Resolve all links and hierarchy fields of a raw issue.
    pub fn resolve(&self, owner: &IssueKey, raw: &RawIssue) -> Resolution {
        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();

        for link in &raw.links {
            if let Some(link) = self.resolve_link(owner, link, &mut resolution.anomalies) {
                push_unique(&mut resolution.links, &mut seen, link);
            }
        }

        let hierarchy = raw
            .parent
            .iter()
            .map(|k| ("parent", k, LinkKind::SubtaskOf))
            .chain(raw.subtasks.iter().map(|k| ("subtask", k, LinkKind::ParentOf)))
            .chain(raw.epic.iter().map(|k| ("epic", k, LinkKind::EpicParent)))
            .chain(
                raw.epic_children
                    .iter()
                    .map(|k| ("epic child", k, LinkKind::EpicOf)),
            );

        for (field, target, kind) in hierarchy {
            if let Some(target) = self.target(owner, field, target, &mut resolution.anomalies) {
                let link = Link::new(kind, target, Direction::Outbound);
                push_unique(&mut resolution.links, &mut seen, link);
            }
        }

        if let Some(err) = &raw.epic_children_error {
            resolution.anomalies.push(DataAnomaly::UnloadedLinks {
                issue: owner.clone(),
                relation: "epic children".to_string(),
                error: err.to_string(),
            });
        }

        resolution
    }

    fn resolve_link(
        &self,
        owner: &IssueKey,
        raw: &RawLink,
        anomalies: &mut Vec<DataAnomaly>,
    ) -> Option<Link> {
        let label = [
            raw.type_name.as_str(),
            raw.description(),
            raw.outward.as_str(),
            raw.inward.as_str(),
        ]
        .into_iter()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string();

        if label.is_empty() {
            anomalies.push(DataAnomaly::UnparseableLink {
                issue: owner.clone(),
                link_type: String::new(),
                target: raw.target.clone(),
                reason: "link has no type".to_string(),
            });
            return None;
        }

        let target = self.target(owner, &label, &raw.target, anomalies)?;

        Some(match self.lookup(raw) {
            Some(kind) => Link::new(kind, target, raw.direction),
            None => Link::unmapped(label, target, raw.direction),
        })
    }

    /// Parse a target key, reporting bad keys and self-links.
    fn target(
        &self,
        owner: &IssueKey,
        link_type: &str,
        text: &str,
        anomalies: &mut Vec<DataAnomaly>,
    ) -> Option<IssueKey> {
        match IssueKey::parse(text) {
            Ok(key) if &key == owner => {
                anomalies.push(DataAnomaly::SelfLink {
                    issue: owner.clone(),
                    link_type: link_type.to_string(),
                });
                None
            }
            Ok(key) => Some(key),
            Err(err) => {
                anomalies.push(DataAnomaly::UnparseableLink {
                    issue: owner.clone(),
                    link_type: link_type.to_string(),
                    target: text.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Normalize a raw issue, resolving its links.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::MalformedData` if the issue key is invalid.
    pub fn normalize(&self, raw: RawIssue) -> Result<(Issue, Vec<DataAnomaly>), AnalysisError> {
        let key = IssueKey::parse(&raw.key)
            .map_err(|e| AnalysisError::MalformedData(format!("issue key: {}", e)))?;
        let Resolution { links, anomalies } = self.resolve(&key, &raw);

        let issue = Issue {
            key,
            summary: raw.summary,
            description: raw.description,
            issue_type: raw.issue_type,
            status: raw.status,
            status_category: StatusCategory::from_tracker_key(&raw.status_category),
            priority: raw.priority,
            assignee: raw.assignee,
            reporter: raw.reporter,
            created: raw.created,
            updated: raw.updated,
            labels: raw.labels.into_iter().collect(),
            components: raw.components.into_iter().collect(),
            comments: raw.comments,
            links,
            history: raw.history,
            url: raw.url,
        };
        Ok((issue, anomalies))
    }

    /// Inbound links whose declaring issue is known but does not list the
    /// counterpart.
    ///
    /// Missing counterparts are not errors; analysis proceeds from the side
    /// that is available.
    pub fn asymmetric_links<'a>(
        &self,
        issues: impl IntoIterator<Item = &'a Issue>,
    ) -> Vec<AsymmetricLink> {
        let issues: BTreeMap<&IssueKey, &Issue> =
            issues.into_iter().map(|i| (&i.key, i)).collect();

        let mut result = Vec::new();
        for (key, issue) in &issues {
            for link in issue.links.iter().filter(|l| l.direction == Direction::Inbound) {
                let Some(declarer) = issues.get(&link.target) else {
                    continue;
                };
                let expected = link.kind.inverse();
                let listed = declarer
                    .links
                    .iter()
                    .any(|l| l.kind == expected && &l.target == *key);
                if !listed {
                    result.push(AsymmetricLink {
                        issue: (*key).clone(),
                        link: link.clone(),
                    });
                }
            }
        }
        result
    }
}

fn push_unique(links: &mut Vec<Link>, seen: &mut HashSet<(LinkKind, IssueKey)>, link: Link) {
    if seen.insert((link.kind, link.target.clone())) {
        links.push(link);
    }
}

/// Distinct original type strings of unmapped links.
pub fn unmapped_types<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> BTreeSet<String> {
    issues
        .into_iter()
        .flat_map(|i| i.links.iter())
        .filter_map(|l| l.unmapped_type.clone())
        .collect()
}
