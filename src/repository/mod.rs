//! Hierarchical repository abstraction
//!
//! Defines the Repository trait that imports and exports run against, and its
//! implementations:
//! - InMemoryRepository: process-local store (tests, dry runs)
//! - GirderRepository: Girder REST API (feature `api-backend`)
//!
//! Lookups go through typed natural keys. Matching is exact: names are
//! compared byte for byte, never case-folded or substring-matched.

use serde_json::{Map, Value};

use crate::models::{AccessControl, AnnotationDocument};

pub mod memory;

#[cfg(feature = "api-backend")]
pub mod girder;

pub use memory::InMemoryRepository;

#[cfg(feature = "api-backend")]
pub use girder::GirderRepository;

/// Error type for repository operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Repository backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}

/// Parent of a folder in the target repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParentRef {
    Collection(String),
    Folder(String),
}

impl ParentRef {
    /// Girder parent-type tag
    pub fn kind(&self) -> &'static str {
        match self {
            ParentRef::Collection(_) => "collection",
            ParentRef::Folder(_) => "folder",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ParentRef::Collection(id) | ParentRef::Folder(id) => id,
        }
    }
}

/// Natural key of a collection: its name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub name: String,
}

/// Natural key of a folder: name within a parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderKey {
    pub parent: ParentRef,
    pub name: String,
}

/// Natural key of an item: name within a folder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub folder_id: String,
    pub name: String,
}

/// Natural key of an annotation: annotator on an item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationKey {
    pub item_id: String,
    pub annotator: String,
}

/// Entity that can carry a metadata blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataTarget {
    Collection(String),
    Folder(String),
    Item(String),
}

impl MetadataTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataTarget::Collection(_) => "collection",
            MetadataTarget::Folder(_) => "folder",
            MetadataTarget::Item(_) => "item",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MetadataTarget::Collection(id)
            | MetadataTarget::Folder(id)
            | MetadataTarget::Item(id) => id,
        }
    }
}

/// A collection, folder or item as stored in the repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteNode {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub meta: Map<String, Value>,
    pub size: Option<u64>,
}

/// An annotation as stored in the repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAnnotation {
    pub id: String,
    pub item_id: String,
    pub creator_id: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub annotation: AnnotationDocument,
}

/// Trait for hierarchical stores.
///
/// All calls are synchronous request/response. The `find_*` methods have
/// default implementations on top of the listing calls; backends with an
/// indexed lookup should override them.
pub trait Repository {
    /// List all collections visible to the caller
    fn list_collections(&self) -> Result<Vec<RemoteNode>, RepositoryError>;

    /// List the folders directly under a parent
    fn list_folders(&self, parent: &ParentRef) -> Result<Vec<RemoteNode>, RepositoryError>;

    /// List the items in a folder
    fn list_items(&self, folder_id: &str) -> Result<Vec<RemoteNode>, RepositoryError>;

    /// List the annotations on an item
    fn list_annotations(&self, item_id: &str) -> Result<Vec<RemoteAnnotation>, RepositoryError>;

    /// Fetch a single annotation with its full element list
    fn get_annotation(&self, annotation_id: &str) -> Result<RemoteAnnotation, RepositoryError>;

    /// Fetch the access-control block of an annotation
    fn get_annotation_access(&self, annotation_id: &str)
    -> Result<AccessControl, RepositoryError>;

    fn create_collection(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<RemoteNode, RepositoryError>;

    fn create_folder(&mut self, parent: &ParentRef, name: &str)
    -> Result<RemoteNode, RepositoryError>;

    fn create_item(&mut self, folder_id: &str, name: &str) -> Result<RemoteNode, RepositoryError>;

    fn create_annotation(
        &mut self,
        item_id: &str,
        document: &AnnotationDocument,
    ) -> Result<RemoteAnnotation, RepositoryError>;

    /// Merge a metadata blob into a collection, folder or item
    fn set_metadata(
        &mut self,
        target: &MetadataTarget,
        meta: &Map<String, Value>,
    ) -> Result<(), RepositoryError>;

    /// Replace the access-control block of an annotation
    fn set_annotation_access(
        &mut self,
        annotation_id: &str,
        access: &AccessControl,
    ) -> Result<(), RepositoryError>;

    /// Find a collection id by name
    fn find_collection(&self, key: &CollectionKey) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .list_collections()?
            .into_iter()
            .find(|c| c.name == key.name)
            .map(|c| c.id))
    }

    /// Find a folder id by parent and name
    fn find_folder(&self, key: &FolderKey) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .list_folders(&key.parent)?
            .into_iter()
            .find(|f| f.name == key.name)
            .map(|f| f.id))
    }

    /// Find an item id by folder and name
    fn find_item(&self, key: &ItemKey) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .list_items(&key.folder_id)?
            .into_iter()
            .find(|i| i.name == key.name)
            .map(|i| i.id))
    }

    /// Find an annotation id by item and annotator
    fn find_annotation(&self, key: &AnnotationKey) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .list_annotations(&key.item_id)?
            .into_iter()
            .find(|a| a.annotation.annotator_key() == key.annotator)
            .map(|a| a.id))
    }
}
