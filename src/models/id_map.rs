//! Source-id → target-id mapping built during an import run

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Entity classes of the hierarchy, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Collection,
    Folder,
    Item,
    Annotation,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Collection,
        EntityKind::Folder,
        EntityKind::Item,
        EntityKind::Annotation,
    ];

    /// Plural label used in reports
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Collection => "collections",
            EntityKind::Folder => "folders",
            EntityKind::Item => "items",
            EntityKind::Annotation => "annotations",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Collection => "collection",
            EntityKind::Folder => "folder",
            EntityKind::Item => "item",
            EntityKind::Annotation => "annotation",
        };
        f.write_str(name)
    }
}

/// Audit record of old-id → new-id correspondences.
///
/// Entries are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMap {
    pub collections: BTreeMap<String, String>,
    pub folders: BTreeMap<String, String>,
    pub items: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: EntityKind) -> &BTreeMap<String, String> {
        match kind {
            EntityKind::Collection => &self.collections,
            EntityKind::Folder => &self.folders,
            EntityKind::Item => &self.items,
            EntityKind::Annotation => &self.annotations,
        }
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, String> {
        match kind {
            EntityKind::Collection => &mut self.collections,
            EntityKind::Folder => &mut self.folders,
            EntityKind::Item => &mut self.items,
            EntityKind::Annotation => &mut self.annotations,
        }
    }

    /// Record a mapping. An existing mapping for `old_id` is kept.
    ///
    /// Returns the target id now associated with `old_id`.
    pub fn record(
        &mut self,
        kind: EntityKind,
        old_id: impl Into<String>,
        new_id: impl Into<String>,
    ) -> String {
        let old_id = old_id.into();
        let new_id = new_id.into();
        let table = self.table_mut(kind);
        match table.get(&old_id) {
            Some(existing) => {
                if *existing != new_id {
                    warn!(
                        "Ignoring remap of {} {}: already mapped to {}, not {}",
                        kind, old_id, existing, new_id
                    );
                }
                existing.clone()
            }
            None => {
                table.insert(old_id, new_id.clone());
                new_id
            }
        }
    }

    pub fn get(&self, kind: EntityKind, old_id: &str) -> Option<&str> {
        self.table(kind).get(old_id).map(String::as_str)
    }

    pub fn contains(&self, kind: EntityKind, old_id: &str) -> bool {
        self.table(kind).contains_key(old_id)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.table(kind).len()
    }

    pub fn total(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.len(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Persist as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Conventional audit file name for a run finishing now
    pub fn default_file_name() -> String {
        format!(
            "import_mapping_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )
    }
}
