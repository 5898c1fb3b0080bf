//! tracker
//!
//! Read-only access to a remote issue tracker.
//!
//! # Architecture
//!
//! The `Tracker` trait is the only way the analysis core reaches tracker
//! data. It has fetch and search methods and nothing else, so the read-only
//! guarantee is carried by the interface itself.
//!
//! # Modules
//!
//! - `traits`: Core `Tracker` trait, errors and raw record types
//! - [`jira`]: Jira REST v2 implementation
//! - [`mock`]: Mock implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use issuelens::tracker::{jira::JiraTracker, Tracker};
//!
//! let tracker: Arc<dyn Tracker> = Arc::new(JiraTracker::from_settings(&settings)?);
//! let raw = tracker.fetch_issue(&key).await?;
//! println!("{}: {}", raw.key, raw.summary);
//! ```

pub mod jira;
pub mod mock;
mod traits;

pub use traits::*;
