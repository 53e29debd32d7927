//! Folder hierarchy checks
//!
//! Builds a directed graph of folder → parent-folder edges and looks for
//! cycles with Tarjan's strongly connected components. Also computes the
//! nesting depth used to order folder imports when no export path is known.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::{Directed, Graph};

use crate::models::{FolderParent, Manifest};

/// Folder-to-parent graph of a manifest
pub struct FolderGraph<'a> {
    graph: Graph<&'a str, (), Directed>,
    node_map: HashMap<&'a str, NodeIndex>,
}

impl<'a> FolderGraph<'a> {
    /// Build the graph. Edges to folders missing from the manifest are
    /// dropped; those are reported as broken hierarchy instead.
    pub fn build(manifest: &'a Manifest) -> Self {
        let mut graph = Graph::<&str, (), Directed>::new();
        let mut node_map = HashMap::new();

        for folder_id in manifest.folders.keys() {
            let node = graph.add_node(folder_id.as_str());
            node_map.insert(folder_id.as_str(), node);
        }

        for (folder_id, folder) in &manifest.folders {
            if let FolderParent::Folder(parent_id) = folder.parent()
                && let Some(&parent_node) = node_map.get(parent_id)
            {
                graph.add_edge(node_map[folder_id.as_str()], parent_node, ());
            }
        }

        Self { graph, node_map }
    }

    /// Every set of folders that reach themselves through parent links.
    ///
    /// Each cycle is sorted, and cycles are ordered by their first id.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self
                        .graph
                        .find_edge(component[0], component[0])
                        .is_some()
            })
            .map(|component| {
                let mut ids: Vec<String> =
                    component.iter().map(|n| self.graph[*n].to_string()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Number of folder ancestors above `folder_id`, or `None` if the folder
    /// is unknown or sits on a cycle.
    pub fn depth(&self, folder_id: &str) -> Option<usize> {
        let mut node = *self.node_map.get(folder_id)?;
        let mut depth = 0;
        while let Some(parent) = self.graph.neighbors(node).next() {
            depth += 1;
            if depth > self.node_map.len() {
                return None;
            }
            node = parent;
        }
        Some(depth)
    }
}
