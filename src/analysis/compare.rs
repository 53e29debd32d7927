//! Key-level comparison of two manifests

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::Manifest;

/// Set differences over one id space
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyDiff {
    pub only_in_a: BTreeSet<String>,
    pub only_in_b: BTreeSet<String>,
    pub in_both: BTreeSet<String>,
}

impl KeyDiff {
    fn from_keys<'a>(
        a: impl Iterator<Item = &'a String>,
        b: impl Iterator<Item = &'a String>,
    ) -> Self {
        let a: BTreeSet<String> = a.cloned().collect();
        let b: BTreeSet<String> = b.cloned().collect();
        Self {
            only_in_a: a.difference(&b).cloned().collect(),
            only_in_b: b.difference(&a).cloned().collect(),
            in_both: a.intersection(&b).cloned().collect(),
        }
    }

    /// The same diff seen from the other manifest's side
    pub fn swapped(&self) -> Self {
        Self {
            only_in_a: self.only_in_b.clone(),
            only_in_b: self.only_in_a.clone(),
            in_both: self.in_both.clone(),
        }
    }

    pub fn is_identical(&self) -> bool {
        self.only_in_a.is_empty() && self.only_in_b.is_empty()
    }
}

/// Result of comparing two manifests by id.
///
/// Matched entries are not compared field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    pub collections: KeyDiff,
    pub folders: KeyDiff,
    pub items: KeyDiff,
    pub annotations: KeyDiff,
}

impl ManifestDiff {
    pub fn is_identical(&self) -> bool {
        self.collections.is_identical()
            && self.folders.is_identical()
            && self.items.is_identical()
            && self.annotations.is_identical()
    }
}

/// Compare the id sets of two manifests
pub fn compare(a: &Manifest, b: &Manifest) -> ManifestDiff {
    ManifestDiff {
        collections: KeyDiff::from_keys(a.collections.keys(), b.collections.keys()),
        folders: KeyDiff::from_keys(a.folders.keys(), b.folders.keys()),
        items: KeyDiff::from_keys(a.items.keys(), b.items.keys()),
        annotations: KeyDiff::from_keys(a.annotations.keys(), b.annotations.keys()),
    }
}
