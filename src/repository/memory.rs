//! In-memory repository
//!
//! Keeps the whole hierarchy in ordered maps. Ids are UUID v5 values derived
//! from each entity's natural key, so two stores fed the same operations end
//! up byte-identical. Used by tests and by the import dry run.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
    MetadataTarget, ParentRef, RemoteAnnotation, RemoteNode, Repository, RepositoryError,
};
use crate::models::{AccessControl, AnnotationDocument};

#[derive(Debug, Clone, Default, PartialEq)]
struct StoredFolder {
    parent: Option<ParentRef>,
    node: RemoteNode,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct StoredItem {
    folder_id: String,
    node: RemoteNode,
}

/// Process-local hierarchical store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryRepository {
    collections: BTreeMap<String, RemoteNode>,
    folders: BTreeMap<String, StoredFolder>,
    items: BTreeMap<String, StoredItem>,
    annotations: BTreeMap<String, RemoteAnnotation>,
    access: BTreeMap<String, AccessControl>,
    failing_names: BTreeSet<String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create call for an entity with this name (or, for
    /// annotations, this annotator) fail with a backend error.
    pub fn fail_creates_named(mut self, name: impl Into<String>) -> Self {
        self.failing_names.insert(name.into());
        self
    }

    fn generate_id(key: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
    }

    fn check_failure(&self, name: &str) -> Result<(), RepositoryError> {
        if self.failing_names.contains(name) {
            return Err(RepositoryError::Backend(format!(
                "Injected failure creating {}",
                name
            )));
        }
        Ok(())
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Metadata currently stored on a collection, folder or item
    pub fn metadata(&self, target: &MetadataTarget) -> Option<&Map<String, Value>> {
        let node = match target {
            MetadataTarget::Collection(id) => self.collections.get(id),
            MetadataTarget::Folder(id) => self.folders.get(id).map(|f| &f.node),
            MetadataTarget::Item(id) => self.items.get(id).map(|i| &i.node),
        };
        node.map(|n| &n.meta)
    }

    /// Access block stored for an annotation, if one was set
    pub fn access(&self, annotation_id: &str) -> Option<&AccessControl> {
        self.access.get(annotation_id)
    }

    /// Seed a user-owned top-level folder (outside any collection)
    pub fn insert_detached_folder(&mut self, name: &str) -> RemoteNode {
        let node = RemoteNode {
            id: Self::generate_id(&format!("folder:detached:{}", name)),
            name: name.to_string(),
            ..Default::default()
        };
        self.folders.insert(
            node.id.clone(),
            StoredFolder {
                parent: None,
                node: node.clone(),
            },
        );
        node
    }

    fn parent_exists(&self, parent: &ParentRef) -> bool {
        match parent {
            ParentRef::Collection(id) => self.collections.contains_key(id),
            ParentRef::Folder(id) => self.folders.contains_key(id),
        }
    }
}

impl Repository for InMemoryRepository {
    fn list_collections(&self) -> Result<Vec<RemoteNode>, RepositoryError> {
        Ok(self.collections.values().cloned().collect())
    }

    fn list_folders(&self, parent: &ParentRef) -> Result<Vec<RemoteNode>, RepositoryError> {
        if !self.parent_exists(parent) {
            return Err(RepositoryError::NotFound(format!(
                "{} {}",
                parent.kind(),
                parent.id()
            )));
        }
        Ok(self
            .folders
            .values()
            .filter(|f| f.parent.as_ref() == Some(parent))
            .map(|f| f.node.clone())
            .collect())
    }

    fn list_items(&self, folder_id: &str) -> Result<Vec<RemoteNode>, RepositoryError> {
        if !self.folders.contains_key(folder_id) {
            return Err(RepositoryError::NotFound(format!("folder {}", folder_id)));
        }
        Ok(self
            .items
            .values()
            .filter(|i| i.folder_id == folder_id)
            .map(|i| i.node.clone())
            .collect())
    }

    fn list_annotations(&self, item_id: &str) -> Result<Vec<RemoteAnnotation>, RepositoryError> {
        if !self.items.contains_key(item_id) {
            return Err(RepositoryError::NotFound(format!("item {}", item_id)));
        }
        Ok(self
            .annotations
            .values()
            .filter(|a| a.item_id == item_id)
            .cloned()
            .collect())
    }

    fn get_annotation(&self, annotation_id: &str) -> Result<RemoteAnnotation, RepositoryError> {
        self.annotations
            .get(annotation_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("annotation {}", annotation_id)))
    }

    fn get_annotation_access(
        &self,
        annotation_id: &str,
    ) -> Result<AccessControl, RepositoryError> {
        if !self.annotations.contains_key(annotation_id) {
            return Err(RepositoryError::NotFound(format!(
                "annotation {}",
                annotation_id
            )));
        }
        Ok(self.access.get(annotation_id).cloned().unwrap_or_default())
    }

    fn create_collection(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<RemoteNode, RepositoryError> {
        self.check_failure(name)?;
        let node = RemoteNode {
            id: Self::generate_id(&format!("collection:{}", name)),
            name: name.to_string(),
            description: Some(description.to_string()),
            ..Default::default()
        };
        if self.collections.contains_key(&node.id) {
            return Err(RepositoryError::Backend(format!(
                "A collection with that name already exists: {}",
                name
            )));
        }
        self.collections.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    fn create_folder(
        &mut self,
        parent: &ParentRef,
        name: &str,
    ) -> Result<RemoteNode, RepositoryError> {
        self.check_failure(name)?;
        if !self.parent_exists(parent) {
            return Err(RepositoryError::NotFound(format!(
                "{} {}",
                parent.kind(),
                parent.id()
            )));
        }
        let node = RemoteNode {
            id: Self::generate_id(&format!("folder:{}:{}:{}", parent.kind(), parent.id(), name)),
            name: name.to_string(),
            ..Default::default()
        };
        if self.folders.contains_key(&node.id) {
            return Err(RepositoryError::Backend(format!(
                "A folder with that name already exists here: {}",
                name
            )));
        }
        self.folders.insert(
            node.id.clone(),
            StoredFolder {
                parent: Some(parent.clone()),
                node: node.clone(),
            },
        );
        Ok(node)
    }

    fn create_item(&mut self, folder_id: &str, name: &str) -> Result<RemoteNode, RepositoryError> {
        self.check_failure(name)?;
        if !self.folders.contains_key(folder_id) {
            return Err(RepositoryError::NotFound(format!("folder {}", folder_id)));
        }
        // Girder allows duplicate item names within a folder.
        let ordinal = self
            .items
            .values()
            .filter(|i| i.folder_id == folder_id && i.node.name == name)
            .count();
        let node = RemoteNode {
            id: Self::generate_id(&format!("item:{}:{}:{}", folder_id, name, ordinal)),
            name: name.to_string(),
            ..Default::default()
        };
        self.items.insert(
            node.id.clone(),
            StoredItem {
                folder_id: folder_id.to_string(),
                node: node.clone(),
            },
        );
        Ok(node)
    }

    fn create_annotation(
        &mut self,
        item_id: &str,
        document: &AnnotationDocument,
    ) -> Result<RemoteAnnotation, RepositoryError> {
        self.check_failure(document.annotator_key())?;
        if !self.items.contains_key(item_id) {
            return Err(RepositoryError::NotFound(format!("item {}", item_id)));
        }
        let ordinal = self
            .annotations
            .values()
            .filter(|a| {
                a.item_id == item_id
                    && a.annotation.annotator_key() == document.annotator_key()
            })
            .count();
        let annotation = RemoteAnnotation {
            id: Self::generate_id(&format!(
                "annotation:{}:{}:{}",
                item_id,
                document.annotator_key(),
                ordinal
            )),
            item_id: item_id.to_string(),
            annotation: document.clone(),
            ..Default::default()
        };
        self.annotations
            .insert(annotation.id.clone(), annotation.clone());
        Ok(annotation)
    }

    fn set_metadata(
        &mut self,
        target: &MetadataTarget,
        meta: &Map<String, Value>,
    ) -> Result<(), RepositoryError> {
        let node = match target {
            MetadataTarget::Collection(id) => self.collections.get_mut(id),
            MetadataTarget::Folder(id) => self.folders.get_mut(id).map(|f| &mut f.node),
            MetadataTarget::Item(id) => self.items.get_mut(id).map(|i| &mut i.node),
        }
        .ok_or_else(|| RepositoryError::NotFound(format!("{} {}", target.kind(), target.id())))?;

        for (key, value) in meta {
            if value.is_null() {
                node.meta.remove(key);
            } else {
                node.meta.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn set_annotation_access(
        &mut self,
        annotation_id: &str,
        access: &AccessControl,
    ) -> Result<(), RepositoryError> {
        if !self.annotations.contains_key(annotation_id) {
            return Err(RepositoryError::NotFound(format!(
                "annotation {}",
                annotation_id
            )));
        }
        self.access
            .insert(annotation_id.to_string(), access.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{AnnotationKey, CollectionKey, FolderKey, ItemKey};

    #[test]
    fn test_natural_key_lookups() {
        let mut repo = InMemoryRepository::new();
        let collection = repo.create_collection("Skin", "").unwrap();
        let parent = ParentRef::Collection(collection.id.clone());
        let folder = repo.create_folder(&parent, "Cases").unwrap();
        let item = repo.create_item(&folder.id, "a.jpg").unwrap();
        let annotation = repo
            .create_annotation(&item.id, &AnnotationDocument::new("alice"))
            .unwrap();

        let key = CollectionKey {
            name: "Skin".into(),
        };
        assert_eq!(repo.find_collection(&key).unwrap(), Some(collection.id));
        let key = CollectionKey {
            name: "skin".into(),
        };
        assert_eq!(repo.find_collection(&key).unwrap(), None);

        let key = FolderKey {
            parent,
            name: "Cases".into(),
        };
        assert_eq!(repo.find_folder(&key).unwrap(), Some(folder.id.clone()));

        let key = ItemKey {
            folder_id: folder.id,
            name: "a.jpg".into(),
        };
        assert_eq!(repo.find_item(&key).unwrap(), Some(item.id.clone()));

        let key = AnnotationKey {
            item_id: item.id.clone(),
            annotator: "alice".into(),
        };
        assert_eq!(repo.find_annotation(&key).unwrap(), Some(annotation.id));
        let key = AnnotationKey {
            item_id: item.id,
            annotator: "bob".into(),
        };
        assert_eq!(repo.find_annotation(&key).unwrap(), None);
    }

    #[test]
    fn test_ids_are_deterministic() {
        let build = || {
            let mut repo = InMemoryRepository::new();
            let c = repo.create_collection("A", "").unwrap();
            repo.create_folder(&ParentRef::Collection(c.id), "B")
                .unwrap();
            repo
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_missing_parents_are_not_found() {
        let mut repo = InMemoryRepository::new();
        let err = repo
            .create_folder(&ParentRef::Folder("nope".into()), "x")
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.list_items("nope").unwrap_err().is_not_found());
        assert!(
            repo.create_annotation("nope", &AnnotationDocument::new("a"))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_metadata_merge() {
        let mut repo = InMemoryRepository::new();
        let c = repo.create_collection("A", "").unwrap();
        let target = MetadataTarget::Collection(c.id);

        let mut meta = Map::new();
        meta.insert("site".into(), Value::from("Leeds"));
        meta.insert("year".into(), Value::from(2024));
        repo.set_metadata(&target, &meta).unwrap();

        let mut update = Map::new();
        update.insert("year".into(), Value::Null);
        repo.set_metadata(&target, &update).unwrap();

        let stored = repo.metadata(&target).unwrap();
        assert_eq!(stored.get("site"), Some(&Value::from("Leeds")));
        assert!(!stored.contains_key("year"));
    }

    #[test]
    fn test_injected_failure() {
        let mut repo = InMemoryRepository::new().fail_creates_named("Broken");
        assert!(matches!(
            repo.create_collection("Broken", ""),
            Err(RepositoryError::Backend(_))
        ));
        assert!(repo.create_collection("Fine", "").is_ok());
    }
}
