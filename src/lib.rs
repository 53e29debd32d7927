//! Annotation Manifest SDK - overlay rendering and export/import reconciliation
//! for Girder-style annotation stores
//!
//! Provides unified interfaces for:
//! - Manifest loading/saving, validation, comparison and subsetting
//! - Find-or-create import of manifests into a repository
//! - Manifest export from a repository and backup archive packaging
//! - Annotation overlay rendering onto images
//! - Repository backends (in-memory, Girder REST API)

pub mod analysis;
pub mod config;
pub mod export;
pub mod import;
pub mod models;
pub mod repository;
pub mod validation;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use config::{
    ArchiveConfig, ConfigError, ErrorPolicy, ImportConfig, RenderConfig, RepositoryConfig,
    SdkConfig,
};

pub use repository::{InMemoryRepository, Repository, RepositoryError};
#[cfg(feature = "api-backend")]
pub use repository::GirderRepository;

pub use analysis::{KeyDiff, ManifestDiff, ManifestReport, SubsetFilter, compare, extract_subset};
pub use import::{
    ImportError, ImportOutcome, ImportVerification, ManifestImporter, preview_import,
    verify_import,
};
pub use export::{ArchiveError, DedupOutcome, ExportError, ManifestExporter};
#[cfg(feature = "render")]
pub use export::{AnnotationRenderer, RenderError, render_annotations};
pub use validation::{ValidationIssue, ValidationSummary, validate};

// Re-export models
pub use models::{
    AnnotationDocument, AnnotationElement, AnnotationRecord, CollectionRecord, EntityKind,
    FolderRecord, IdMap, ItemRecord, Manifest, ManifestError,
};
