//! Manifest import
//!
//! Replays a manifest into a target repository with find-or-create
//! semantics, building an [`IdMap`](crate::models::IdMap) from source ids to
//! target ids:
//! - Collections, then folders (shallowest first), items, annotations
//! - Entities already present under the same natural key are reused
//! - Entities whose parent could not be resolved are warned about and skipped

pub mod importer;
pub mod verify;

pub use importer::{
    EntityStats, ImportOutcome, ImportStats, ManifestImporter, preview_import,
};
pub use verify::{ImportVerification, MappedCount, verify_import};

use crate::models::EntityKind;
use crate::repository::RepositoryError;

/// Error during an import run
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// A repository call failed and the error policy is `Abort`.
    ///
    /// `partial` holds everything mapped before the failure so the caller
    /// can still save the id mapping.
    #[error("Failed to import {kind} {source_id}: {source}")]
    Repository {
        kind: EntityKind,
        source_id: String,
        #[source]
        source: RepositoryError,
        partial: Box<ImportOutcome>,
    },
}

impl ImportError {
    /// Outcome of the phases that ran before the run stopped
    pub fn partial_outcome(&self) -> &ImportOutcome {
        match self {
            ImportError::Repository { partial, .. } => partial,
        }
    }
}
