//! core::link
//!
//! Normalized issue-to-issue relationships.
//!
//! # Design
//!
//! Trackers describe links with free-form strings ("blocks", "is cloned by",
//! custom types). The analysis core only ever sees the closed [`LinkKind`]
//! set. Strings that do not map to a known kind become
//! [`LinkKind::RelatesTo`] with [`Link::unmapped_type`] carrying the original
//! text, so no relationship is lost to normalization.
//!
//! # Invariants
//!
//! - Every kind has an inverse ([`LinkKind::inverse`]); applying it twice
//!   yields the original kind.
//! - [`LinkKind::RelatesTo`] is its own inverse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::IssueKey;

/// Closed set of relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// Owner blocks the target.
    Blocks,
    /// Owner is blocked by the target.
    BlockedBy,
    /// Owner duplicates the target.
    Duplicates,
    /// Owner is duplicated by the target.
    DuplicatedBy,
    /// Undirected association.
    RelatesTo,
    /// Owner is an epic containing the target.
    EpicOf,
    /// Target is the epic containing the owner.
    EpicParent,
    /// Owner is a subtask of the target.
    SubtaskOf,
    /// Owner is the parent of the target subtask.
    ParentOf,
}

impl LinkKind {
    /// All kinds, in declaration order.
    pub const ALL: [LinkKind; 9] = [
        LinkKind::Blocks,
        LinkKind::BlockedBy,
        LinkKind::Duplicates,
        LinkKind::DuplicatedBy,
        LinkKind::RelatesTo,
        LinkKind::EpicOf,
        LinkKind::EpicParent,
        LinkKind::SubtaskOf,
        LinkKind::ParentOf,
    ];

    /// Returns the string representation used in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Blocks => "blocks",
            LinkKind::BlockedBy => "blocked-by",
            LinkKind::Duplicates => "duplicates",
            LinkKind::DuplicatedBy => "duplicated-by",
            LinkKind::RelatesTo => "relates-to",
            LinkKind::EpicOf => "epic-of",
            LinkKind::EpicParent => "epic-parent",
            LinkKind::SubtaskOf => "subtask-of",
            LinkKind::ParentOf => "parent-of",
        }
    }

    /// The kind seen from the other end of the link.
    pub fn inverse(&self) -> LinkKind {
        match self {
            LinkKind::Blocks => LinkKind::BlockedBy,
            LinkKind::BlockedBy => LinkKind::Blocks,
            LinkKind::Duplicates => LinkKind::DuplicatedBy,
            LinkKind::DuplicatedBy => LinkKind::Duplicates,
            LinkKind::RelatesTo => LinkKind::RelatesTo,
            LinkKind::EpicOf => LinkKind::EpicParent,
            LinkKind::EpicParent => LinkKind::EpicOf,
            LinkKind::SubtaskOf => LinkKind::ParentOf,
            LinkKind::ParentOf => LinkKind::SubtaskOf,
        }
    }

    /// Whether this is the canonical orientation of its pair.
    ///
    /// Graph edges are always stored in forward orientation.
    pub fn is_forward(&self) -> bool {
        matches!(
            self,
            LinkKind::Blocks
                | LinkKind::Duplicates
                | LinkKind::RelatesTo
                | LinkKind::EpicOf
                | LinkKind::ParentOf
        )
    }

    /// Whether the relationship has no direction.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, LinkKind::RelatesTo)
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinkKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown link kind '{s}'"))
    }
}

/// Which side of a tracker link the owning issue was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The owning issue declared the link.
    Outbound,
    /// The link was declared by the target and is seen here in reverse.
    Inbound,
}

impl Direction {
    /// The opposite direction.
    pub fn flip(&self) -> Direction {
        match self {
            Direction::Outbound => Direction::Inbound,
            Direction::Inbound => Direction::Outbound,
        }
    }
}

/// A normalized link attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Relationship kind, as seen from the owning issue.
    pub kind: LinkKind,
    /// The other end of the link.
    pub target: IssueKey,
    /// Which side declared the link.
    pub direction: Direction,
    /// Original tracker type string when it had no mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_type: Option<String>,
}

impl Link {
    /// Creates a link with a mapped kind.
    pub fn new(kind: LinkKind, target: IssueKey, direction: Direction) -> Self {
        Self {
            kind,
            target,
            direction,
            unmapped_type: None,
        }
    }

    /// Creates a `relates-to` link annotated with the unmapped type string.
    pub fn unmapped(original: impl Into<String>, target: IssueKey, direction: Direction) -> Self {
        Self {
            kind: LinkKind::RelatesTo,
            target,
            direction,
            unmapped_type: Some(original.into()),
        }
    }

    /// Whether the kind came from the fallback mapping.
    pub fn is_unmapped(&self) -> bool {
        self.unmapped_type.is_some()
    }
}
