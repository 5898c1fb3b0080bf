//! issuelens - Read-only relationship and content analysis for issue trackers
//!
//! issuelens reads issues from a tracker and derives structure from them:
//! the relationship graph around an issue, references between two projects,
//! and recurring content patterns across a set of issues.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, renders reports)
//! - [`analysis`] - The analysis core and its request interface
//! - [`tracker`] - Read-only tracker abstraction (Jira v2 REST, in-memory mock)
//! - [`core`] - Domain types and configuration
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. The tracker interface has no mutating operation
//! 2. Each issue is fetched at most once per request
//! 3. Results are deterministic for a given tracker state
//! 4. Truncated or partially failed analyses say so instead of failing

pub mod analysis;
pub mod cli;
pub mod core;
pub mod tracker;
pub mod ui;
