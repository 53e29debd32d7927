//! Subset extraction
//!
//! Produces a new manifest restricted by collection, item and annotator
//! filters while keeping every reference inside the subset resolvable.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::models::manifest::now_timestamp;
use crate::models::{Manifest, SubsetCriteria};

/// Filters for [`extract_subset`]. An empty or absent set places no
/// restriction on its axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsetFilter {
    pub collection_ids: Option<BTreeSet<String>>,
    pub item_ids: Option<BTreeSet<String>>,
    pub annotators: Option<BTreeSet<String>>,
}

impl SubsetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collections<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collection_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_items<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.item_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_annotators<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotators = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn active(set: &Option<BTreeSet<String>>) -> Option<&BTreeSet<String>> {
        set.as_ref().filter(|s| !s.is_empty())
    }

    fn criteria(&self) -> SubsetCriteria {
        let as_vec = |set: &Option<BTreeSet<String>>| {
            Self::active(set).map(|s| s.iter().cloned().collect::<Vec<_>>())
        };
        SubsetCriteria {
            collection_ids: as_vec(&self.collection_ids),
            item_ids: as_vec(&self.item_ids),
            user_names: as_vec(&self.annotators),
        }
    }
}

/// Extract a subset of `manifest`. The source is not modified.
///
/// - Collection filter: the listed collections that exist, and the folders
///   whose owning collection is one of them. Without it, everything.
/// - Item filter: the listed items whose folder exists, with that folder and
///   its ancestor folders backfilled. Collections are never backfilled.
///   Without it, every item whose folder was selected.
/// - Annotations: those on selected items, restricted to the listed
///   annotators when an annotator filter is given.
/// - Users and groups are copied unfiltered.
pub fn extract_subset(manifest: &Manifest, filter: &SubsetFilter) -> Manifest {
    let collection_filter = SubsetFilter::active(&filter.collection_ids);
    let item_filter = SubsetFilter::active(&filter.item_ids);
    let annotator_filter = SubsetFilter::active(&filter.annotators);

    let collections: BTreeMap<_, _> = match collection_filter {
        Some(ids) => manifest
            .collections
            .iter()
            .filter(|(id, _)| ids.contains(*id))
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect(),
        None => manifest.collections.clone(),
    };

    let mut folders: BTreeMap<_, _> = match collection_filter {
        Some(_) => manifest
            .folders
            .iter()
            .filter(|(id, _)| {
                manifest
                    .owning_collection(id)
                    .is_some_and(|c| collections.contains_key(c))
            })
            .map(|(id, f)| (id.clone(), f.clone()))
            .collect(),
        None => manifest.folders.clone(),
    };

    let items: BTreeMap<_, _> = match item_filter {
        Some(ids) => {
            let mut selected = BTreeMap::new();
            for id in ids {
                let Some(item) = manifest.items.get(id) else {
                    debug!("Item {} not in manifest, ignoring", id);
                    continue;
                };
                if !manifest.folders.contains_key(&item.folder_id) {
                    debug!("Item {} has no folder in manifest, ignoring", id);
                    continue;
                }
                for folder_id in manifest.folder_ancestry(&item.folder_id) {
                    if let Some(folder) = manifest.folders.get(folder_id) {
                        folders
                            .entry(folder_id.to_string())
                            .or_insert_with(|| folder.clone());
                    }
                }
                selected.insert(id.clone(), item.clone());
            }
            selected
        }
        None => manifest
            .items
            .iter()
            .filter(|(_, item)| folders.contains_key(&item.folder_id))
            .map(|(id, i)| (id.clone(), i.clone()))
            .collect(),
    };

    let annotations = manifest
        .annotations
        .iter()
        .filter(|(_, a)| items.contains_key(&a.item_id))
        .filter(|(_, a)| annotator_filter.is_none_or(|names| names.contains(a.annotator())))
        .map(|(id, a)| (id.clone(), a.clone()))
        .collect();

    Manifest {
        export_date: Some(now_timestamp()),
        source_url: manifest.source_url.clone(),
        original_export: manifest.export_date.clone(),
        subset_criteria: Some(filter.criteria()),
        collections,
        folders,
        items,
        annotations,
        users: manifest.users.clone(),
        groups: manifest.groups.clone(),
        access_control: manifest.access_control.clone(),
        extra: Default::default(),
    }
}

/// "kept / total" counts per entity class, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsetCounts {
    pub collections: (usize, usize),
    pub folders: (usize, usize),
    pub items: (usize, usize),
    pub annotations: (usize, usize),
}

impl SubsetCounts {
    pub fn new(source: &Manifest, subset: &Manifest) -> Self {
        Self {
            collections: (subset.collections.len(), source.collections.len()),
            folders: (subset.folders.len(), source.folders.len()),
            items: (subset.items.len(), source.items.len()),
            annotations: (subset.annotations.len(), source.annotations.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnnotationDocument, AnnotationRecord, FolderRecord, ItemRecord};
    use crate::models::CollectionRecord;
    use crate::validation::validate;

    /// c1/{f1/{f1a}} with i1 in f1a; c2/f2 with i2; annotations by alice and bob
    fn nested() -> Manifest {
        let mut m = Manifest::new(None);
        m.collections.insert("c1".into(), CollectionRecord::new("One"));
        m.collections.insert("c2".into(), CollectionRecord::new("Two"));
        m.folders
            .insert("f1".into(), FolderRecord::in_collection("F1", "c1"));
        m.folders
            .insert("f1a".into(), FolderRecord::in_folder("F1a", "f1", "F1"));
        m.folders
            .insert("f2".into(), FolderRecord::in_collection("F2", "c2"));
        m.items.insert("i1".into(), ItemRecord::new("one.jpg", "f1a"));
        m.items.insert("i2".into(), ItemRecord::new("two.jpg", "f2"));
        m.annotations.insert(
            "a1".into(),
            AnnotationRecord::new("i1", AnnotationDocument::new("alice")),
        );
        m.annotations.insert(
            "a2".into(),
            AnnotationRecord::new("i1", AnnotationDocument::new("bob")),
        );
        m.annotations.insert(
            "a3".into(),
            AnnotationRecord::new("i2", AnnotationDocument::new("alice")),
        );
        m.users.insert("u1".into(), serde_json::json!({"id": "u1"}));
        m
    }

    #[test]
    fn test_collection_filter_includes_nested_folders() {
        let source = nested();
        let subset = extract_subset(&source, &SubsetFilter::new().with_collections(["c1"]));

        assert_eq!(subset.collections.keys().collect::<Vec<_>>(), ["c1"]);
        assert_eq!(subset.folders.keys().collect::<Vec<_>>(), ["f1", "f1a"]);
        assert_eq!(subset.items.keys().collect::<Vec<_>>(), ["i1"]);
        assert_eq!(subset.annotations.keys().collect::<Vec<_>>(), ["a1", "a2"]);
        assert_eq!(subset.users.len(), 1);
        assert!(validate(&subset).is_empty());
    }

    #[test]
    fn test_item_filter_backfills_ancestors() {
        let source = nested();
        let subset = extract_subset(
            &source,
            &SubsetFilter::new()
                .with_collections(["c2"])
                .with_items(["i1"]),
        );

        assert_eq!(subset.collections.keys().collect::<Vec<_>>(), ["c2"]);
        assert!(subset.folders.contains_key("f1a"));
        assert!(subset.folders.contains_key("f1"));
        assert_eq!(subset.items.keys().collect::<Vec<_>>(), ["i1"]);
        assert!(validate(&subset).is_empty());
    }

    #[test]
    fn test_annotator_filter() {
        let source = nested();
        let subset = extract_subset(&source, &SubsetFilter::new().with_annotators(["alice"]));
        assert_eq!(subset.annotations.keys().collect::<Vec<_>>(), ["a1", "a3"]);
        assert_eq!(subset.items.len(), 2);
    }

    #[test]
    fn test_empty_filters_mean_no_restriction() {
        let source = nested();
        let filter = SubsetFilter::new()
            .with_collections(Vec::<String>::new())
            .with_items(Vec::<String>::new());
        let subset = extract_subset(&source, &filter);
        assert_eq!(subset.entity_count(), source.entity_count());
        assert_eq!(subset.subset_criteria, Some(SubsetCriteria::default()));
    }

    #[test]
    fn test_unknown_ids_are_ignored_and_source_untouched() {
        let source = nested();
        let before = source.clone();
        let subset = extract_subset(&source, &SubsetFilter::new().with_items(["nope"]));
        assert!(subset.items.is_empty());
        assert!(subset.annotations.is_empty());
        assert_eq!(source, before);
        assert_eq!(subset.original_export, source.export_date);
    }

    #[test]
    fn test_counts() {
        let source = nested();
        let subset = extract_subset(&source, &SubsetFilter::new().with_collections(["c2"]));
        let counts = SubsetCounts::new(&source, &subset);
        assert_eq!(counts.collections, (1, 2));
        assert_eq!(counts.folders, (1, 3));
        assert_eq!(counts.items, (1, 2));
        assert_eq!(counts.annotations, (1, 3));
    }
}
