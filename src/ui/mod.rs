//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All user-facing output goes through this module so quiet and JSON modes
//! behave the same in every command. Diagnostics go through `tracing`.

pub mod output;
