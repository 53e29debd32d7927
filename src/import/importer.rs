//! Find-or-create importer

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::ImportError;
use crate::config::{ErrorPolicy, ImportConfig};
use crate::models::{
    AnnotationRecord, CollectionRecord, EntityKind, FolderParent, FolderRecord, IdMap,
    ItemRecord, Manifest,
};
use crate::repository::{
    AnnotationKey, CollectionKey, FolderKey, InMemoryRepository, ItemKey, MetadataTarget,
    ParentRef, Repository, RepositoryError,
};
use crate::validation::FolderGraph;

/// Per-class counters of an import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityStats {
    /// Created in the target repository
    pub created: usize,
    /// Already present under the same natural key and reused
    pub existing: usize,
    /// Skipped because a parent mapping was missing
    pub unresolved: usize,
    /// Skipped after a repository error (error policy `SkipEntity`)
    pub failed: usize,
}

impl EntityStats {
    /// Entities that ended up with a mapping
    pub fn mapped(&self) -> usize {
        self.created + self.existing
    }
}

/// Statistics from an import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub collections: EntityStats,
    pub folders: EntityStats,
    pub items: EntityStats,
    pub annotations: EntityStats,
}

impl ImportStats {
    pub fn get(&self, kind: EntityKind) -> &EntityStats {
        match kind {
            EntityKind::Collection => &self.collections,
            EntityKind::Folder => &self.folders,
            EntityKind::Item => &self.items,
            EntityKind::Annotation => &self.annotations,
        }
    }

    fn get_mut(&mut self, kind: EntityKind) -> &mut EntityStats {
        match kind {
            EntityKind::Collection => &mut self.collections,
            EntityKind::Folder => &mut self.folders,
            EntityKind::Item => &mut self.items,
            EntityKind::Annotation => &mut self.annotations,
        }
    }

    pub fn total_created(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.get(*k).created).sum()
    }

    pub fn total_failed(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.get(*k).failed).sum()
    }
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in EntityKind::ALL {
            let stats = self.get(kind);
            writeln!(
                f,
                "{}: {} created, {} existing, {} unresolved, {} failed",
                kind.plural(),
                stats.created,
                stats.existing,
                stats.unresolved,
                stats.failed
            )?;
        }
        Ok(())
    }
}

/// Result of an import run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub id_map: IdMap,
    pub stats: ImportStats,
    /// Phases that ran to completion, in order
    pub completed_phases: Vec<EntityKind>,
    /// The run stopped early because cancellation was requested
    pub cancelled: bool,
}

enum Resolution {
    Created(String),
    Existing(String),
}

/// Replays a manifest into a repository.
///
/// # Example
///
/// ```rust
/// use annotation_manifest_sdk::config::ImportConfig;
/// use annotation_manifest_sdk::import::ManifestImporter;
/// use annotation_manifest_sdk::models::Manifest;
/// use annotation_manifest_sdk::repository::InMemoryRepository;
///
/// let manifest = Manifest::new(None);
/// let mut repo = InMemoryRepository::new();
/// let outcome = ManifestImporter::new(&mut repo, ImportConfig::default())
///     .import(&manifest)
///     .unwrap();
/// assert!(outcome.id_map.is_empty());
/// ```
pub struct ManifestImporter<'a, R: Repository> {
    repo: &'a mut R,
    config: ImportConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, R: Repository> ManifestImporter<'a, R> {
    pub fn new(repo: &'a mut R, config: ImportConfig) -> Self {
        Self {
            repo,
            config,
            cancel: None,
        }
    }

    /// Stop between phases once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run all phases against `manifest`
    pub fn import(&mut self, manifest: &Manifest) -> Result<ImportOutcome, ImportError> {
        let mut outcome = ImportOutcome::default();

        for phase in EntityKind::ALL {
            if self.is_cancelled() {
                warn!("Import cancelled before {} phase", phase);
                outcome.cancelled = true;
                return Ok(outcome);
            }

            info!("Importing {}", phase.plural());
            match phase {
                EntityKind::Collection => self.import_collections(manifest, &mut outcome)?,
                EntityKind::Folder => self.import_folders(manifest, &mut outcome)?,
                EntityKind::Item => self.import_items(manifest, &mut outcome)?,
                EntityKind::Annotation => self.import_annotations(manifest, &mut outcome)?,
            }
            outcome.completed_phases.push(phase);
        }

        info!(
            "Import finished: {} entities created, {} mapped",
            outcome.stats.total_created(),
            outcome.id_map.total()
        );
        Ok(outcome)
    }

    /// Record the result of one entity, applying the error policy
    fn settle(
        &self,
        outcome: &mut ImportOutcome,
        kind: EntityKind,
        source_id: &str,
        label: &str,
        result: Result<Resolution, RepositoryError>,
    ) -> Result<(), ImportError> {
        match result {
            Ok(Resolution::Created(new_id)) => {
                info!("Created {} {}", kind, label);
                outcome.id_map.record(kind, source_id, new_id);
                outcome.stats.get_mut(kind).created += 1;
                Ok(())
            }
            Ok(Resolution::Existing(new_id)) => {
                debug!("Found existing {} {}", kind, label);
                outcome.id_map.record(kind, source_id, new_id);
                outcome.stats.get_mut(kind).existing += 1;
                Ok(())
            }
            Err(source) => match self.config.error_policy {
                ErrorPolicy::Abort => Err(ImportError::Repository {
                    kind,
                    source_id: source_id.to_string(),
                    source,
                    partial: Box::new(std::mem::take(outcome)),
                }),
                ErrorPolicy::SkipEntity => {
                    warn!("Skipping {} {} ({}): {}", kind, label, source_id, source);
                    outcome.stats.get_mut(kind).failed += 1;
                    Ok(())
                }
            },
        }
    }

    fn unresolved(outcome: &mut ImportOutcome, kind: EntityKind, label: &str, reason: &str) {
        warn!("Skipping {} {}: {}", kind, label, reason);
        outcome.stats.get_mut(kind).unresolved += 1;
    }

    fn apply_metadata(
        &mut self,
        target: MetadataTarget,
        meta: &Map<String, Value>,
    ) -> Result<(), RepositoryError> {
        if self.config.apply_metadata && !meta.is_empty() {
            self.repo.set_metadata(&target, meta)?;
        }
        Ok(())
    }

    fn import_collections(
        &mut self,
        manifest: &Manifest,
        outcome: &mut ImportOutcome,
    ) -> Result<(), ImportError> {
        for (id, record) in &manifest.collections {
            let result = self.resolve_collection(record);
            self.settle(outcome, EntityKind::Collection, id, &record.name, result)?;
        }
        Ok(())
    }

    fn resolve_collection(&mut self, record: &CollectionRecord) -> Result<Resolution, RepositoryError> {
        let key = CollectionKey {
            name: record.name.clone(),
        };
        if let Some(existing) = self.repo.find_collection(&key)? {
            return Ok(Resolution::Existing(existing));
        }
        let node = self
            .repo
            .create_collection(&record.name, &record.description)?;
        self.apply_metadata(MetadataTarget::Collection(node.id.clone()), &record.meta)?;
        Ok(Resolution::Created(node.id))
    }

    fn import_folders(
        &mut self,
        manifest: &Manifest,
        outcome: &mut ImportOutcome,
    ) -> Result<(), ImportError> {
        for (id, record) in folders_by_depth(manifest) {
            let label = record.export_path.as_deref().unwrap_or(&record.name);
            let parent = match record.parent() {
                FolderParent::Collection(cid) => outcome
                    .id_map
                    .get(EntityKind::Collection, cid)
                    .map(|new| ParentRef::Collection(new.to_string())),
                FolderParent::Folder(fid) => outcome
                    .id_map
                    .get(EntityKind::Folder, fid)
                    .map(|new| ParentRef::Folder(new.to_string())),
                FolderParent::Detached => None,
            };
            let Some(parent) = parent else {
                Self::unresolved(outcome, EntityKind::Folder, label, "parent not found");
                continue;
            };
            let result = self.resolve_folder(&parent, record);
            self.settle(outcome, EntityKind::Folder, id, label, result)?;
        }
        Ok(())
    }

    fn resolve_folder(
        &mut self,
        parent: &ParentRef,
        record: &FolderRecord,
    ) -> Result<Resolution, RepositoryError> {
        let key = FolderKey {
            parent: parent.clone(),
            name: record.name.clone(),
        };
        if let Some(existing) = self.repo.find_folder(&key)? {
            return Ok(Resolution::Existing(existing));
        }
        let node = self.repo.create_folder(parent, &record.name)?;
        self.apply_metadata(MetadataTarget::Folder(node.id.clone()), &record.meta)?;
        Ok(Resolution::Created(node.id))
    }

    fn import_items(
        &mut self,
        manifest: &Manifest,
        outcome: &mut ImportOutcome,
    ) -> Result<(), ImportError> {
        for (id, record) in &manifest.items {
            let Some(folder_id) = outcome
                .id_map
                .get(EntityKind::Folder, &record.folder_id)
                .map(str::to_string)
            else {
                Self::unresolved(outcome, EntityKind::Item, &record.name, "folder not found");
                continue;
            };
            let result = self.resolve_item(&folder_id, record);
            self.settle(outcome, EntityKind::Item, id, &record.name, result)?;
        }
        Ok(())
    }

    fn resolve_item(
        &mut self,
        folder_id: &str,
        record: &ItemRecord,
    ) -> Result<Resolution, RepositoryError> {
        let key = ItemKey {
            folder_id: folder_id.to_string(),
            name: record.name.clone(),
        };
        if let Some(existing) = self.repo.find_item(&key)? {
            return Ok(Resolution::Existing(existing));
        }
        let node = self.repo.create_item(folder_id, &record.name)?;
        self.apply_metadata(MetadataTarget::Item(node.id.clone()), &record.meta)?;
        Ok(Resolution::Created(node.id))
    }

    fn import_annotations(
        &mut self,
        manifest: &Manifest,
        outcome: &mut ImportOutcome,
    ) -> Result<(), ImportError> {
        for (id, record) in &manifest.annotations {
            let Some(item_id) = outcome
                .id_map
                .get(EntityKind::Item, &record.item_id)
                .map(str::to_string)
            else {
                Self::unresolved(outcome, EntityKind::Annotation, id, "item not found");
                continue;
            };
            let label = format!("by {}", record.annotator());
            let result = self.resolve_annotation(&item_id, record);
            self.settle(outcome, EntityKind::Annotation, id, &label, result)?;
        }
        Ok(())
    }

    fn resolve_annotation(
        &mut self,
        item_id: &str,
        record: &AnnotationRecord,
    ) -> Result<Resolution, RepositoryError> {
        let key = AnnotationKey {
            item_id: item_id.to_string(),
            annotator: record.annotator().to_string(),
        };
        if let Some(existing) = self.repo.find_annotation(&key)? {
            return Ok(Resolution::Existing(existing));
        }
        let created = self.repo.create_annotation(item_id, &record.annotation)?;

        if self.config.apply_access_control
            && !record.access_control.is_empty()
            && let Err(e) = self
                .repo
                .set_annotation_access(&created.id, &record.access_control)
        {
            warn!("Could not set access control on {}: {}", created.id, e);
        }
        Ok(Resolution::Created(created.id))
    }
}

/// Folders ordered so that parents come before children: by export path
/// depth (parent chain depth when the path is missing), then by id. Folders
/// on a parent cycle sort last.
fn folders_by_depth(manifest: &Manifest) -> Vec<(&String, &FolderRecord)> {
    let graph = FolderGraph::build(manifest);
    let depths: BTreeMap<&str, usize> = manifest
        .folders
        .iter()
        .map(|(id, folder)| {
            let depth = folder
                .path_depth()
                .or_else(|| graph.depth(id))
                .unwrap_or(usize::MAX);
            (id.as_str(), depth)
        })
        .collect();

    let mut folders: Vec<_> = manifest.folders.iter().collect();
    folders.sort_by(|(a, _), (b, _)| {
        depths
            .get(a.as_str())
            .cmp(&depths.get(b.as_str()))
            .then_with(|| a.cmp(b))
    });
    folders
}

/// Import into a fresh in-memory repository to show what a real run would
/// create. Entity failures are counted rather than fatal.
pub fn preview_import(manifest: &Manifest) -> ImportOutcome {
    let mut repo = InMemoryRepository::new();
    let config = ImportConfig::default().with_error_policy(ErrorPolicy::SkipEntity);
    match ManifestImporter::new(&mut repo, config).import(manifest) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Preview import failed: {}", e);
            ImportOutcome::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnnotationDocument;

    fn folder_without_path(name: &str, parent: &str) -> FolderRecord {
        FolderRecord {
            name: name.into(),
            parent_id: Some(parent.into()),
            parent_collection: Some("folder".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_folders_sorted_parents_first() {
        let mut m = Manifest::default();
        m.collections.insert("c".into(), CollectionRecord::new("C"));
        // Ids chosen so lexical order would put children first
        m.folders.insert("a3".into(), FolderRecord::in_folder("deep", "b2", "top/mid"));
        m.folders.insert("b2".into(), FolderRecord::in_folder("mid", "z1", "top"));
        m.folders.insert("z1".into(), FolderRecord::in_collection("top", "c"));

        let order: Vec<_> = folders_by_depth(&m).into_iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["z1", "b2", "a3"]);
    }

    #[test]
    fn test_folders_without_path_use_chain_depth() {
        let mut m = Manifest::default();
        m.folders.insert("a".into(), folder_without_path("child", "b"));
        m.folders.insert("b".into(), FolderRecord::in_collection("top", "c"));

        let order: Vec<_> = folders_by_depth(&m).into_iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_cyclic_folders_sort_last() {
        let mut m = Manifest::default();
        m.folders.insert("x".into(), folder_without_path("x", "y"));
        m.folders.insert("y".into(), folder_without_path("y", "x"));
        m.folders.insert("z".into(), folder_without_path("z", "missing"));
        m.folders.insert("w".into(), FolderRecord::in_collection("top", "c"));

        let order: Vec<_> = folders_by_depth(&m).into_iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["w", "z", "x", "y"]);
    }

    #[test]
    fn test_cancel_before_first_phase() {
        let mut m = Manifest::default();
        m.collections.insert("c".into(), CollectionRecord::new("C"));
        let flag = Arc::new(AtomicBool::new(true));

        let mut repo = InMemoryRepository::new();
        let outcome = ManifestImporter::new(&mut repo, ImportConfig::default())
            .with_cancel_flag(flag)
            .import(&m)
            .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.completed_phases.is_empty());
        assert_eq!(repo.collection_count(), 0);
    }

    #[test]
    fn test_access_control_applied_on_create() {
        let mut m = Manifest::default();
        m.collections.insert("c".into(), CollectionRecord::new("C"));
        m.folders.insert("f".into(), FolderRecord::in_collection("F", "c"));
        m.items.insert("i".into(), ItemRecord::new("x.jpg", "f"));
        let mut record = AnnotationRecord::new("i", AnnotationDocument::new("alice"));
        record
            .access_control
            .users
            .push(crate::models::AccessEntry::new("u1", 2));
        m.annotations.insert("a".into(), record.clone());

        let mut repo = InMemoryRepository::new();
        let outcome = ManifestImporter::new(&mut repo, ImportConfig::default())
            .import(&m)
            .unwrap();
        let new_id = outcome.id_map.get(EntityKind::Annotation, "a").unwrap();
        assert_eq!(repo.access(new_id), Some(&record.access_control));

        let mut repo = InMemoryRepository::new();
        let outcome = ManifestImporter::new(
            &mut repo,
            ImportConfig::default().with_access_control(false),
        )
        .import(&m)
        .unwrap();
        let new_id = outcome.id_map.get(EntityKind::Annotation, "a").unwrap();
        assert!(repo.access(new_id).is_none());
    }

    #[test]
    fn test_stats_display() {
        let mut stats = ImportStats::default();
        stats.items.created = 3;
        stats.items.unresolved = 1;
        let text = stats.to_string();
        assert!(text.contains("items: 3 created, 0 existing, 1 unresolved, 0 failed"));
        assert_eq!(stats.total_created(), 3);
        assert_eq!(stats.items.mapped(), 3);
    }
}
