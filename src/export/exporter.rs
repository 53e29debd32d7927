//! Manifest export from a repository
//!
//! Walks collections → folders (recursively) → items → annotations and
//! records everything into a [`Manifest`], together with the users and
//! groups referenced by annotation access blocks.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::ExportError;
use crate::models::{
    AnnotationRecord, CollectionRecord, FolderRecord, ItemRecord, Manifest,
};
use crate::repository::{ParentRef, RemoteNode, Repository};

pub struct ManifestExporter<'a, R: Repository> {
    repo: &'a R,
    source_url: Option<String>,
}

impl<'a, R: Repository> ManifestExporter<'a, R> {
    pub fn new(repo: &'a R, source_url: Option<String>) -> Self {
        Self { repo, source_url }
    }

    /// Export every visible collection, or only those in `collection_ids`.
    ///
    /// Listing failures for collections, folders and items abort the export.
    /// An item whose annotations cannot be listed is exported without them,
    /// and an annotation whose access block cannot be read is exported with
    /// an empty one.
    pub fn export(&self, collection_ids: Option<&BTreeSet<String>>) -> Result<Manifest, ExportError> {
        let mut manifest = Manifest::new(self.source_url.clone());

        info!("Fetching collections");
        let collections = self.repo.list_collections()?;
        for collection in collections {
            if collection_ids.is_some_and(|ids| !ids.contains(&collection.id)) {
                continue;
            }
            info!("Processing collection: {} ({})", collection.name, collection.id);

            let parent = ParentRef::Collection(collection.id.clone());
            manifest.collections.insert(
                collection.id.clone(),
                CollectionRecord {
                    name: collection.name,
                    description: collection.description.unwrap_or_default(),
                    created: collection.created,
                    updated: collection.updated,
                    meta: collection.meta,
                    extra: Default::default(),
                },
            );
            self.export_folders(&parent, None, &mut manifest)?;
        }

        info!(
            "Exported {} annotations on {} items",
            manifest.annotations.len(),
            manifest.items.len()
        );
        Ok(manifest)
    }

    fn export_folders(
        &self,
        parent: &ParentRef,
        parent_path: Option<&str>,
        manifest: &mut Manifest,
    ) -> Result<(), ExportError> {
        for folder in self.repo.list_folders(parent)? {
            let export_path = match parent_path {
                Some(path) => format!("{}/{}", path, folder.name),
                None => folder.name.clone(),
            };
            debug!("Processing folder: {}", export_path);

            let folder_id = folder.id.clone();
            manifest.folders.insert(
                folder_id.clone(),
                FolderRecord {
                    name: folder.name,
                    parent_id: Some(parent.id().to_string()),
                    parent_collection: Some(parent.kind().to_string()),
                    export_path: Some(export_path.clone()),
                    created: folder.created,
                    updated: folder.updated,
                    meta: folder.meta,
                    extra: Default::default(),
                },
            );

            for item in self.repo.list_items(&folder_id)? {
                self.export_item(&folder_id, item, manifest);
            }

            self.export_folders(&ParentRef::Folder(folder_id), Some(&export_path), manifest)?;
        }
        Ok(())
    }

    fn export_item(&self, folder_id: &str, item: RemoteNode, manifest: &mut Manifest) {
        let item_id = item.id.clone();
        let annotations = match self.repo.list_annotations(&item_id) {
            Ok(annotations) => annotations,
            Err(e) => {
                warn!("Could not list annotations of item {}: {}", item.name, e);
                Vec::new()
            }
        };
        if !annotations.is_empty() {
            debug!(
                "Found {} annotations for item: {}",
                annotations.len(),
                item.name
            );
        }

        manifest.items.insert(
            item_id.clone(),
            ItemRecord {
                name: item.name,
                folder_id: folder_id.to_string(),
                created: item.created,
                updated: item.updated,
                meta: item.meta,
                size: item.size,
                extra: Default::default(),
            },
        );

        for summary in annotations {
            let full = match self.repo.get_annotation(&summary.id) {
                Ok(full) => full,
                Err(e) => {
                    warn!("Skipping annotation {}: {}", summary.id, e);
                    continue;
                }
            };
            let access_control = match self.repo.get_annotation_access(&summary.id) {
                Ok(access) => access,
                Err(e) => {
                    debug!("No access block for annotation {}: {}", summary.id, e);
                    Default::default()
                }
            };

            for user in &access_control.users {
                manifest.users.insert(user.id.clone(), user.to_value());
            }
            for group in &access_control.groups {
                manifest.groups.insert(group.id.clone(), group.to_value());
            }

            manifest.annotations.insert(
                summary.id,
                AnnotationRecord {
                    item_id: item_id.clone(),
                    creator_id: full.creator_id,
                    created: full.created,
                    updated: full.updated,
                    annotation: full.annotation,
                    access_control,
                    extra: Default::default(),
                },
            );
        }
    }
}
