//! Manifest structural validation
//!
//! Enumerates every referential-integrity problem in a manifest. Validation
//! never stops at the first problem and never mutates its input; an empty
//! result means the structure is sound, not that the contents make sense.

use std::fmt;

use serde::Serialize;

use super::hierarchy::FolderGraph;
use crate::models::{FolderParent, Manifest};

/// Number of issues shown by [`ValidationSummary`] before truncating
pub const DISPLAY_LIMIT: usize = 10;

/// A single structural problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Annotation whose `itemId` is not in the manifest
    OrphanedAnnotation {
        annotation_id: String,
        item_id: String,
    },
    /// Item whose `folderId` is not in the manifest
    OrphanedItem { item_id: String, folder_id: String },
    /// Folder whose parent folder is not in the manifest
    BrokenFolderHierarchy { folder_id: String, parent_id: String },
    /// Folders that are their own ancestors
    FolderCycle { folder_ids: Vec<String> },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::OrphanedAnnotation {
                annotation_id,
                item_id,
            } => write!(
                f,
                "Orphaned annotation {}: references non-existent item {}",
                annotation_id, item_id
            ),
            ValidationIssue::OrphanedItem { item_id, folder_id } => write!(
                f,
                "Orphaned item {}: references non-existent folder {}",
                item_id, folder_id
            ),
            ValidationIssue::BrokenFolderHierarchy {
                folder_id,
                parent_id,
            } => write!(
                f,
                "Broken folder hierarchy: {} references non-existent parent {}",
                folder_id, parent_id
            ),
            ValidationIssue::FolderCycle { folder_ids } => {
                write!(f, "Folder cycle: {}", folder_ids.join(" -> "))
            }
        }
    }
}

/// Validate a manifest and return every issue found.
///
/// Order: orphaned annotations, orphaned items, broken folder hierarchy,
/// folder cycles; each group in id order.
pub fn validate(manifest: &Manifest) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (annotation_id, annotation) in &manifest.annotations {
        if !manifest.items.contains_key(&annotation.item_id) {
            issues.push(ValidationIssue::OrphanedAnnotation {
                annotation_id: annotation_id.clone(),
                item_id: annotation.item_id.clone(),
            });
        }
    }

    for (item_id, item) in &manifest.items {
        if !manifest.folders.contains_key(&item.folder_id) {
            issues.push(ValidationIssue::OrphanedItem {
                item_id: item_id.clone(),
                folder_id: item.folder_id.clone(),
            });
        }
    }

    for (folder_id, folder) in &manifest.folders {
        if let FolderParent::Folder(parent_id) = folder.parent()
            && !manifest.folders.contains_key(parent_id)
        {
            issues.push(ValidationIssue::BrokenFolderHierarchy {
                folder_id: folder_id.clone(),
                parent_id: parent_id.to_string(),
            });
        }
    }

    issues.extend(
        FolderGraph::build(manifest)
            .cycles()
            .into_iter()
            .map(|folder_ids| ValidationIssue::FolderCycle { folder_ids }),
    );

    issues
}

/// Display helper: the full issue list with a capped rendering
#[derive(Debug, Clone)]
pub struct ValidationSummary {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationSummary {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total issues found: {}", self.issues.len())?;
        if self.issues.is_empty() {
            return writeln!(f, "✓ Export is valid");
        }
        writeln!(f)?;
        writeln!(f, "Issues:")?;
        for issue in self.issues.iter().take(DISPLAY_LIMIT) {
            writeln!(f, "  - {}", issue)?;
        }
        if self.issues.len() > DISPLAY_LIMIT {
            writeln!(
                f,
                "  ... and {} more issues",
                self.issues.len() - DISPLAY_LIMIT
            )?;
        }
        Ok(())
    }
}
