//! Manifest analysis
//!
//! Local operations over in-memory manifests (no repository access):
//! - Comparison of two exports by id
//! - Subset extraction with referential closure
//! - Markdown reports

pub mod compare;
pub mod report;
pub mod subset;

pub use compare::{KeyDiff, ManifestDiff, compare};
pub use report::ManifestReport;
pub use subset::{SubsetCounts, SubsetFilter, extract_subset};
