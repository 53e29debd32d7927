//! Manifest data model
//!
//! A manifest is the serialized export of a collection → folder → item →
//! annotation forest, keyed by the ids of the system it was exported from,
//! plus the user and group tables referenced by annotation access blocks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::annotation::AnnotationDocument;

/// Girder parent-type tags stored in a folder's `parentCollection` field
const PARENT_TYPE_COLLECTION: &str = "collection";
const PARENT_TYPE_FOLDER: &str = "folder";
const PARENT_TYPE_USER: &str = "user";

/// Errors reading or writing a manifest file
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Root export artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default, alias = "girder_url", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Export date of the manifest this one was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_export: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset_criteria: Option<SubsetCriteria>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionRecord>,
    #[serde(default)]
    pub folders: BTreeMap<String, FolderRecord>,
    #[serde(default)]
    pub items: BTreeMap<String, ItemRecord>,
    #[serde(default)]
    pub annotations: BTreeMap<String, AnnotationRecord>,
    #[serde(default)]
    pub users: BTreeMap<String, Value>,
    #[serde(default)]
    pub groups: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Create an empty manifest stamped with the current time
    pub fn new(source_url: Option<String>) -> Self {
        Self {
            export_date: Some(now_timestamp()),
            source_url,
            ..Default::default()
        }
    }

    /// Parse a manifest from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a manifest from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the manifest to a file, replacing any existing content
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the collection a folder ultimately belongs to by walking its
    /// folder parents. Returns `None` for detached folders, broken chains and
    /// cycles.
    pub fn owning_collection(&self, folder_id: &str) -> Option<&str> {
        let mut current = folder_id;
        // A chain longer than the folder count must contain a cycle.
        for _ in 0..=self.folders.len() {
            let folder = self.folders.get(current)?;
            match folder.parent() {
                FolderParent::Collection(id) => return Some(id),
                FolderParent::Folder(id) => current = id,
                FolderParent::Detached => return None,
            }
        }
        None
    }

    /// Folder ids from `folder_id` up to its top-level folder, inclusive.
    /// Stops at the first missing folder or repeated id.
    pub fn folder_ancestry(&self, folder_id: &str) -> Vec<&str> {
        let mut chain: Vec<&str> = Vec::new();
        let mut next = self.folders.get_key_value(folder_id).map(|(k, _)| k.as_str());
        while let Some(id) = next {
            if chain.contains(&id) {
                break;
            }
            chain.push(id);
            next = match self.folders.get(id).map(FolderRecord::parent) {
                Some(FolderParent::Folder(parent)) => self
                    .folders
                    .get_key_value(parent)
                    .map(|(k, _)| k.as_str()),
                _ => None,
            };
        }
        chain
    }

    /// Collection id an item belongs to, via its folder chain
    pub fn item_collection(&self, item_id: &str) -> Option<&str> {
        let item = self.items.get(item_id)?;
        self.owning_collection(&item.folder_id)
    }

    /// Total number of hierarchy records
    pub fn entity_count(&self) -> usize {
        self.collections.len() + self.folders.len() + self.items.len() + self.annotations.len()
    }
}

/// Filters recorded on a manifest produced by subset extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetCriteria {
    pub collection_ids: Option<Vec<String>>,
    pub item_ids: Option<Vec<String>>,
    pub user_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Where a folder hangs in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderParent<'a> {
    Collection(&'a str),
    Folder(&'a str),
    /// No usable parent reference (absent, or owned by a user)
    Detached,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub name: String,
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Either Girder's parent-type tag (`collection`/`folder`/`user`) or,
    /// in legacy exports, the id of the parent collection.
    #[serde(
        rename = "parentCollection",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FolderRecord {
    /// Top-level folder of a collection
    pub fn in_collection(name: impl Into<String>, collection_id: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            export_path: Some(name.clone()),
            name,
            parent_id: Some(collection_id.into()),
            parent_collection: Some(PARENT_TYPE_COLLECTION.to_string()),
            ..Default::default()
        }
    }

    /// Folder nested in another folder
    pub fn in_folder(
        name: impl Into<String>,
        parent_folder_id: impl Into<String>,
        parent_path: &str,
    ) -> Self {
        let name = name.into();
        Self {
            export_path: Some(format!("{}/{}", parent_path, name)),
            name,
            parent_id: Some(parent_folder_id.into()),
            parent_collection: Some(PARENT_TYPE_FOLDER.to_string()),
            ..Default::default()
        }
    }

    /// Interpret the parent fields
    pub fn parent(&self) -> FolderParent<'_> {
        let parent_id = self.parent_id.as_deref().filter(|id| !id.is_empty());
        match self.parent_collection.as_deref().filter(|p| !p.is_empty()) {
            Some(PARENT_TYPE_COLLECTION) => {
                parent_id.map_or(FolderParent::Detached, FolderParent::Collection)
            }
            Some(PARENT_TYPE_FOLDER) => parent_id.map_or(FolderParent::Detached, FolderParent::Folder),
            Some(PARENT_TYPE_USER) => FolderParent::Detached,
            Some(collection_id) => FolderParent::Collection(collection_id),
            None => parent_id.map_or(FolderParent::Detached, FolderParent::Folder),
        }
    }

    /// Nesting depth derived from the export path (`a` = 0, `a/b` = 1)
    pub fn path_depth(&self) -> Option<usize> {
        self.export_path
            .as_deref()
            .map(|p| p.trim_matches('/').matches('/').count())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    #[serde(rename = "folderId")]
    pub folder_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    pub fn new(name: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder_id: folder_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(rename = "itemId")]
    pub item_id: String,
    #[serde(rename = "creatorId", default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub annotation: AnnotationDocument,
    #[serde(default)]
    pub access_control: AccessControl,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationRecord {
    pub fn new(item_id: impl Into<String>, annotation: AnnotationDocument) -> Self {
        Self {
            item_id: item_id.into(),
            annotation,
            ..Default::default()
        }
    }

    pub fn annotator(&self) -> &str {
        self.annotation.annotator_key()
    }
}

/// Access-control block of an annotation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<AccessEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<AccessEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessControl {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty() && self.extra.is_empty()
    }
}

/// A user or group grant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessEntry {
    pub fn new(id: impl Into<String>, level: i64) -> Self {
        Self {
            id: id.into(),
            level: Some(level),
            extra: Map::new(),
        }
    }

    /// The entry as a reference-table value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Current UTC time in the exporter's timestamp format
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_MANIFEST: &str = r#"{
        "export_date": "2024-03-01T10:00:00.000000",
        "girder_url": "https://girder.example.com/api/v1/",
        "collections": {"c1": {"name": "Skin", "description": "", "meta": {"site": "A"}}},
        "folders": {
            "f1": {"name": "Cases", "parentId": "c1", "parentCollection": "collection", "export_path": "Cases"},
            "f2": {"name": "2024", "parentId": "f1", "parentCollection": "folder", "export_path": "Cases/2024"}
        },
        "items": {"i1": {"name": "lesion.jpg", "folderId": "f2", "size": 1024}},
        "annotations": {"a1": {
            "itemId": "i1",
            "creatorId": "u1",
            "annotation": {"name": "alice", "elements": [], "attributes": {"x": 1}},
            "access_control": {"users": [{"id": "u1", "level": 2, "login": "alice"}], "groups": []}
        }},
        "users": {"u1": {"id": "u1", "level": 2}},
        "groups": {},
        "access_control": {}
    }"#;

    #[test]
    fn test_parse_legacy_manifest() {
        let manifest = Manifest::from_json(LEGACY_MANIFEST).unwrap();
        assert_eq!(
            manifest.source_url.as_deref(),
            Some("https://girder.example.com/api/v1/")
        );
        assert_eq!(manifest.entity_count(), 5);
        assert_eq!(manifest.annotations["a1"].annotator(), "alice");
        assert_eq!(manifest.annotations["a1"].access_control.users[0].id, "u1");
        assert!(
            manifest.annotations["a1"]
                .annotation
                .extra
                .contains_key("attributes")
        );
    }

    #[test]
    fn test_round_trip_preserves_unknown_fields() {
        let manifest = Manifest::from_json(LEGACY_MANIFEST).unwrap();
        let json = manifest.to_json().unwrap();
        let reparsed = Manifest::from_json(&json).unwrap();
        assert_eq!(manifest, reparsed);
        let login = &reparsed.annotations["a1"].access_control.users[0].extra["login"];
        assert_eq!(login, "alice");
    }

    #[test]
    fn test_malformed_manifest_fails() {
        assert!(matches!(
            Manifest::from_json("{\"collections\": ["),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn test_folder_parent_forms() {
        let girder = FolderRecord::in_collection("A", "c1");
        assert_eq!(girder.parent(), FolderParent::Collection("c1"));

        let nested = FolderRecord::in_folder("B", "f1", "A");
        assert_eq!(nested.parent(), FolderParent::Folder("f1"));
        assert_eq!(nested.export_path.as_deref(), Some("A/B"));
        assert_eq!(nested.path_depth(), Some(1));

        let legacy = FolderRecord {
            name: "C".into(),
            parent_collection: Some("c9".into()),
            ..Default::default()
        };
        assert_eq!(legacy.parent(), FolderParent::Collection("c9"));

        let user_owned = FolderRecord {
            name: "Private".into(),
            parent_id: Some("u1".into()),
            parent_collection: Some("user".into()),
            ..Default::default()
        };
        assert_eq!(user_owned.parent(), FolderParent::Detached);

        let bare = FolderRecord {
            name: "D".into(),
            parent_id: Some("f7".into()),
            ..Default::default()
        };
        assert_eq!(bare.parent(), FolderParent::Folder("f7"));
    }

    #[test]
    fn test_owning_collection_walks_chain() {
        let manifest = Manifest::from_json(LEGACY_MANIFEST).unwrap();
        assert_eq!(manifest.owning_collection("f2"), Some("c1"));
        assert_eq!(manifest.item_collection("i1"), Some("c1"));
        assert_eq!(manifest.folder_ancestry("f2"), vec!["f2", "f1"]);
        assert_eq!(manifest.owning_collection("missing"), None);
    }

    #[test]
    fn test_owning_collection_terminates_on_cycle() {
        let mut manifest = Manifest::default();
        manifest.folders.insert(
            "x".into(),
            FolderRecord {
                name: "x".into(),
                parent_id: Some("y".into()),
                ..Default::default()
            },
        );
        manifest.folders.insert(
            "y".into(),
            FolderRecord {
                name: "y".into(),
                parent_id: Some("x".into()),
                ..Default::default()
            },
        );
        assert_eq!(manifest.owning_collection("x"), None);
        assert_eq!(manifest.folder_ancestry("x"), vec!["x", "y"]);
    }
}
