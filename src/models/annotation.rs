//! Annotation document schema
//!
//! Mirrors the JSON produced by HistomicsTK's annotation plugin: a named
//! document holding an ordered list of shape elements. Only the fields the SDK
//! interprets are typed; everything else is preserved in `extra` so documents
//! survive a read/write cycle untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Element type tag for polylines/polygons
pub const POLYLINE: &str = "polyline";

/// An annotation document (one annotation layer on an item)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    /// Annotator key. Doubles as a free-text label in the source platform.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub elements: Vec<AnnotationElement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationDocument {
    /// Create an empty document for the given annotator
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an element
    pub fn with_element(mut self, element: AnnotationElement) -> Self {
        self.elements.push(element);
        self
    }

    /// The annotator this layer belongs to.
    ///
    /// This is asserted by whoever wrote the document and is never checked
    /// against the platform's user list.
    pub fn annotator_key(&self) -> &str {
        &self.name
    }

    /// Iterate over the closed polylines of the document
    pub fn closed_polylines(&self) -> impl Iterator<Item = &AnnotationElement> {
        self.elements.iter().filter(|e| e.is_closed_polyline())
    }
}

/// A single shape in an annotation document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationElement {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
    /// Vertices as `[x, y]` or `[x, y, z]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Vec<f64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationElement {
    /// Build a polyline element from `(x, y)` vertices
    pub fn polyline(points: &[(f64, f64)], closed: bool) -> Self {
        Self {
            element_type: POLYLINE.to_string(),
            closed: Some(closed),
            points: points.iter().map(|&(x, y)| vec![x, y, 0.0]).collect(),
            extra: Map::new(),
        }
    }

    pub fn is_closed_polyline(&self) -> bool {
        self.element_type == POLYLINE && self.closed.unwrap_or(false)
    }

    /// Vertices projected onto the image plane (z dropped).
    ///
    /// Points with fewer than two coordinates are ignored.
    pub fn planar_points(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter(|p| p.len() >= 2)
            .map(|p| (p[0], p[1]))
            .collect()
    }
}

/// One entry of an annotation file's `annotations` list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationLayer {
    #[serde(default)]
    pub annotation: AnnotationDocument,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input accepted by the renderer: either an annotation file with a list of
/// layers, or a bare annotation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationSource {
    Layers { annotations: Vec<AnnotationLayer> },
    Document(AnnotationDocument),
}

impl AnnotationSource {
    /// Number of layers available
    pub fn layer_count(&self) -> usize {
        match self {
            AnnotationSource::Layers { annotations } => annotations.len(),
            AnnotationSource::Document(_) => 1,
        }
    }

    /// Select the layer at `index`
    pub fn layer(&self, index: usize) -> Option<&AnnotationDocument> {
        match self {
            AnnotationSource::Layers { annotations } => {
                annotations.get(index).map(|layer| &layer.annotation)
            }
            AnnotationSource::Document(doc) => (index == 0).then_some(doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_polyline_detection() {
        let doc: AnnotationDocument = serde_json::from_str(
            r#"{"name": "alice", "elements": [
                {"type": "polyline", "closed": true, "points": [[0,0,0],[1,0,0],[1,1,0]]},
                {"type": "polyline", "closed": false, "points": [[0,0],[1,1]]},
                {"type": "point", "center": [4, 4, 0]},
                {"type": "rectangle", "center": [1, 1, 0], "width": 2, "height": 2}
            ]}"#,
        )
        .unwrap();

        assert_eq!(doc.annotator_key(), "alice");
        assert_eq!(doc.elements.len(), 4);
        assert_eq!(doc.closed_polylines().count(), 1);
        assert!(doc.elements[2].extra.contains_key("center"));
    }

    #[test]
    fn test_planar_points_drop_z() {
        let element = AnnotationElement {
            element_type: POLYLINE.to_string(),
            closed: Some(true),
            points: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0], vec![9.0]],
            extra: Map::new(),
        };
        assert_eq!(element.planar_points(), vec![(1.0, 2.0), (4.0, 5.0)]);
    }

    #[test]
    fn test_source_layers_and_bare_document() {
        let layered: AnnotationSource = serde_json::from_str(
            r#"{"annotations": [{"annotation": {"name": "a", "elements": []}},
                                {"annotation": {"name": "b", "elements": []}}]}"#,
        )
        .unwrap();
        assert_eq!(layered.layer_count(), 2);
        assert_eq!(layered.layer(1).map(|d| d.name.as_str()), Some("b"));
        assert!(layered.layer(2).is_none());

        let bare: AnnotationSource =
            serde_json::from_str(r#"{"elements": [{"type": "polyline", "closed": true}]}"#)
                .unwrap();
        assert!(matches!(bare, AnnotationSource::Document(_)));
        assert!(bare.layer(0).is_some());
        assert!(bare.layer(1).is_none());
    }
}
