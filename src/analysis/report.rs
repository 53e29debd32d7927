//! Markdown report over a manifest

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::Manifest;

/// Aggregated statistics about a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestReport {
    pub export_date: Option<String>,
    pub source_url: Option<String>,
    pub collections: usize,
    pub folders: usize,
    pub items: usize,
    pub annotations: usize,
    pub users: usize,
    pub groups: usize,
    /// Annotator → annotation count
    pub by_annotator: BTreeMap<String, usize>,
    /// Collection name → annotation count
    pub by_collection: BTreeMap<String, usize>,
    /// Element type → element count
    pub element_types: BTreeMap<String, usize>,
}

impl ManifestReport {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut by_annotator: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_collection: BTreeMap<String, usize> = BTreeMap::new();
        let mut element_types: BTreeMap<String, usize> = BTreeMap::new();

        for annotation in manifest.annotations.values() {
            let annotator = match annotation.annotator() {
                "" => "Unknown",
                name => name,
            };
            *by_annotator.entry(annotator.to_string()).or_default() += 1;

            if let Some(collection) = manifest
                .item_collection(&annotation.item_id)
                .and_then(|id| manifest.collections.get(id))
            {
                *by_collection.entry(collection.name.clone()).or_default() += 1;
            }

            for element in &annotation.annotation.elements {
                let kind = match element.element_type.as_str() {
                    "" => "Unknown",
                    kind => kind,
                };
                *element_types.entry(kind.to_string()).or_default() += 1;
            }
        }

        Self {
            export_date: manifest.export_date.clone(),
            source_url: manifest.source_url.clone(),
            collections: manifest.collections.len(),
            folders: manifest.folders.len(),
            items: manifest.items.len(),
            annotations: manifest.annotations.len(),
            users: manifest.users.len(),
            groups: manifest.groups.len(),
            by_annotator,
            by_collection,
            element_types,
        }
    }

    /// Annotators ordered by descending count, then name
    pub fn annotators_by_count(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .by_annotator
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# Annotation Export Report".to_string(),
            String::new(),
            format!(
                "Export Date: {}",
                self.export_date.as_deref().unwrap_or("Unknown")
            ),
            format!(
                "Source: {}",
                self.source_url.as_deref().unwrap_or("Unknown")
            ),
            String::new(),
            "## Summary Statistics".to_string(),
            format!("- Collections: {}", self.collections),
            format!("- Folders: {}", self.folders),
            format!("- Items: {}", self.items),
            format!("- Annotations: {}", self.annotations),
            format!("- Users referenced: {}", self.users),
            format!("- Groups referenced: {}", self.groups),
            String::new(),
            "## Annotations by User".to_string(),
        ];

        for (name, count) in self.annotators_by_count() {
            lines.push(format!("- {}: {} annotations", name, count));
        }

        lines.push(String::new());
        lines.push("## Annotations by Collection".to_string());
        for (name, count) in &self.by_collection {
            lines.push(format!("- {}: {} annotations", name, count));
        }

        lines.push(String::new());
        lines.push("## Annotation Element Types".to_string());
        for (kind, count) in &self.element_types {
            lines.push(format!("- {}: {} elements", kind, count));
        }

        lines.join("\n")
    }
}
