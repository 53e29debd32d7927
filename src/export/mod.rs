//! Export functionality
//!
//! - Annotation overlays rendered onto JPEG images (feature `render`)
//! - Manifest export from a repository
//! - Backup archive packaging and de-duplication

pub mod archive;
pub mod exporter;
#[cfg(feature = "render")]
pub mod overlay;

pub use archive::{
    ArchiveError, DedupOutcome, ExtractedArchive, content_hash, create_archive, extract_archive,
    is_duplicate, remove_if_duplicate,
};
pub use exporter::ManifestExporter;
#[cfg(feature = "render")]
pub use overlay::{AnnotationRenderer, RenderError, RenderSummary, render_annotations};

use crate::repository::RepositoryError;

/// Error during a manifest export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
