//! Knowledge-graph export derived from the merged model.
//!
//! Nodes are manifests, artifacts, files and modules; edges are
//! `supersedes`, `defined_in`, `belongs_to`, `implements` and `depends_on`.
//! Three output forms: node-link JSON, DOT, and a flowchart (Mermaid) text.

use crate::adapters::SourceDescriptor;
use crate::core::behaviour::resolve_import_candidates;
use crate::core::merge::ExpectedSet;
use crate::core::store::ManifestStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Requested export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphFormat {
    NodeLink,
    Dot,
    Flowchart,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node-link" | "json" => Ok(GraphFormat::NodeLink),
            "dot" => Ok(GraphFormat::Dot),
            "flowchart" | "mermaid" => Ok(GraphFormat::Flowchart),
            other => Err(format!(
                "unknown graph format \"{}\" (expected node-link, dot or flowchart)",
                other
            )),
        }
    }
}

impl KnowledgeGraph {
    fn add_node(&mut self, id: &str, kind: &str, label: &str) {
        if !self.nodes.iter().any(|n| n.id == id) {
            self.nodes.push(GraphNode {
                id: id.to_string(),
                kind: kind.to_string(),
                label: label.to_string(),
            });
        }
    }

    fn add_edge(&mut self, from: &str, to: &str, kind: &str) {
        let edge = GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind: kind.to_string(),
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph maid {\n  rankdir=LR;\n");
        for node in &self.nodes {
            out.push_str(&format!(
                "  \"{}\" [label=\"{}\", group=\"{}\"];\n",
                node.id, node.label, node.kind
            ));
        }
        for edge in &self.edges {
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                edge.from, edge.to, edge.kind
            ));
        }
        out.push_str("}\n");
        out
    }

    pub fn to_flowchart(&self) -> String {
        let sanitize =
            |id: &str| id.replace(|c: char| !c.is_alphanumeric(), "_");
        let mut out = String::from("graph TD\n");
        for node in &self.nodes {
            out.push_str(&format!("  {}[\"{}\"]\n", sanitize(&node.id), node.label));
        }
        for edge in &self.edges {
            out.push_str(&format!(
                "  {} -->|{}| {}\n",
                sanitize(&edge.from),
                edge.kind,
                sanitize(&edge.to)
            ));
        }
        out
    }
}

/// Build the graph from the store, the merged expected sets, and parsed
/// implementation descriptors.
pub fn build_graph(
    store: &ManifestStore,
    expected_sets: &BTreeMap<String, ExpectedSet>,
    descriptors: &BTreeMap<String, SourceDescriptor>,
) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::default();

    for manifest in store.all() {
        let manifest_id = format!("manifest:{}", manifest.name);
        graph.add_node(&manifest_id, "manifest", &manifest.name);
        for target in &manifest.supersedes {
            if store.get(target).is_some() {
                let target_id = format!("manifest:{}", target);
                graph.add_node(&target_id, "manifest", target);
                graph.add_edge(&manifest_id, &target_id, "supersedes");
            }
        }
        if let Some(file) = manifest.expected_file() {
            let file_id = format!("file:{}", file);
            graph.add_node(&file_id, "file", &file);
            graph.add_edge(&file_id, &manifest_id, "implements");
        }
    }

    for (file, set) in expected_sets {
        let file_id = format!("file:{}", file);
        graph.add_node(&file_id, "file", file);
        for artifact in set.artifacts() {
            let artifact_id = format!("artifact:{}#{}", file, artifact.label());
            graph.add_node(&artifact_id, "artifact", &artifact.label());
            graph.add_edge(&artifact_id, &file_id, "defined_in");
            if let Some(class) = &artifact.class {
                let owner_id = format!("artifact:{}#class {}", file, class);
                graph.add_node(&owner_id, "artifact", &format!("class {}", class));
                graph.add_edge(&artifact_id, &owner_id, "belongs_to");
            }
        }
    }

    for (file, descriptor) in descriptors {
        let file_id = format!("file:{}", file);
        graph.add_node(&file_id, "file", file);
        for import in &descriptor.imports {
            let resolved = resolve_import_candidates(file, import)
                .into_iter()
                .find(|c| descriptors.contains_key(c));
            match resolved {
                Some(target) => {
                    let target_id = format!("file:{}", target);
                    graph.add_node(&target_id, "file", &target);
                    graph.add_edge(&file_id, &target_id, "depends_on");
                }
                None => {
                    let module_id = format!("module:{}", import.module);
                    graph.add_node(&module_id, "module", &import.module);
                    graph.add_edge(&file_id, &module_id, "depends_on");
                }
            }
        }
    }

    graph
}
