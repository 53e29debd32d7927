//! Post-import verification

use std::fmt;

use serde::Serialize;

use crate::models::{EntityKind, IdMap, Manifest};

/// Mapped vs. total count for one entity class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MappedCount {
    pub mapped: usize,
    pub total: usize,
}

impl MappedCount {
    pub fn is_complete(&self) -> bool {
        self.mapped >= self.total
    }
}

/// How much of a manifest an IdMap covers. Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportVerification {
    pub collections: MappedCount,
    pub folders: MappedCount,
    pub items: MappedCount,
    pub annotations: MappedCount,
}

impl ImportVerification {
    pub fn get(&self, kind: EntityKind) -> MappedCount {
        match kind {
            EntityKind::Collection => self.collections,
            EntityKind::Folder => self.folders,
            EntityKind::Item => self.items,
            EntityKind::Annotation => self.annotations,
        }
    }

    pub fn is_complete(&self) -> bool {
        EntityKind::ALL.iter().all(|k| self.get(*k).is_complete())
    }
}

impl fmt::Display for ImportVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in EntityKind::ALL {
            let count = self.get(kind);
            let mut label = kind.plural().to_string();
            label[..1].make_ascii_uppercase();
            writeln!(f, "{} mapped: {}/{}", label, count.mapped, count.total)?;
        }
        Ok(())
    }
}

/// Count how many manifest entities have a mapping in `id_map`
pub fn verify_import(manifest: &Manifest, id_map: &IdMap) -> ImportVerification {
    let count = |kind: EntityKind, ids: &mut dyn Iterator<Item = &String>| {
        let mut result = MappedCount::default();
        for id in ids {
            result.total += 1;
            if id_map.contains(kind, id) {
                result.mapped += 1;
            }
        }
        result
    };

    ImportVerification {
        collections: count(EntityKind::Collection, &mut manifest.collections.keys()),
        folders: count(EntityKind::Folder, &mut manifest.folders.keys()),
        items: count(EntityKind::Item, &mut manifest.items.keys()),
        annotations: count(EntityKind::Annotation, &mut manifest.annotations.keys()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionRecord, ItemRecord};

    #[test]
    fn test_verify_counts_only_manifest_ids() {
        let mut m = Manifest::default();
        m.collections.insert("c1".into(), CollectionRecord::new("A"));
        m.collections.insert("c2".into(), CollectionRecord::new("B"));
        m.items.insert("i1".into(), ItemRecord::new("x", "f"));

        let mut map = IdMap::new();
        map.record(EntityKind::Collection, "c1", "n1");
        map.record(EntityKind::Collection, "stale", "n9");

        let verification = verify_import(&m, &map);
        assert_eq!(verification.collections, MappedCount { mapped: 1, total: 2 });
        assert_eq!(verification.items, MappedCount { mapped: 0, total: 1 });
        assert!(!verification.is_complete());
        assert!(verification.to_string().contains("Collections mapped: 1/2"));

        map.record(EntityKind::Collection, "c2", "n2");
        map.record(EntityKind::Item, "i1", "n3");
        assert!(verify_import(&m, &map).is_complete());
    }
}
