//! Data models
//!
//! - Manifest records (collections, folders, items, annotations)
//! - Annotation documents and their shape elements
//! - Id mappings produced by imports

pub mod annotation;
pub mod id_map;
pub mod manifest;

pub use annotation::{AnnotationDocument, AnnotationElement, AnnotationLayer, AnnotationSource};
pub use id_map::{EntityKind, IdMap};
pub use manifest::{
    AccessControl, AccessEntry, AnnotationRecord, CollectionRecord, FolderParent, FolderRecord,
    ItemRecord, Manifest, ManifestError, SubsetCriteria,
};
