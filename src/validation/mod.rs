//! Validation functionality
//!
//! Provides validation logic for:
//! - Manifest referential integrity (orphaned annotations, items, folders)
//! - Folder hierarchy (cycles, nesting depth)

pub mod hierarchy;
pub mod manifest;

pub use hierarchy::FolderGraph;
pub use manifest::{ValidationIssue, ValidationSummary, validate};
