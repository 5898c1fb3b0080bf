//! core
//!
//! Core domain types and configuration for issuelens.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ProjectKey, IssueKey
//! - [`issue`] - The normalized issue model
//! - [`link`] - Typed relationship kinds and links
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid keys at construction time
//! - Schemas are strict and self-describing
//! - Collections are ordered so output is deterministic

pub mod config;
pub mod issue;
pub mod link;
pub mod types;
