//! Build edge graph
//!
//! Collects the build edges produced during configuration and validates them
//! before anything is emitted. Uses petgraph for cycle detection.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::descriptor::DependencyInfo;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Output {output} is produced by both {first} and {second}")]
    DuplicateOutput {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Build edge for {0} depends on its own outputs")]
    CycleDetected(PathBuf),
}

/// One build statement: a source file, its exporter and declared dependencies
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEdge {
    /// Name of the exporter, which is also the rule name
    pub exporter: String,

    /// Absolute path of the source file
    pub source: PathBuf,

    /// Declared inputs, outputs and extra dependencies
    pub deps: DependencyInfo,
}

/// The set of build edges for one configuration run
#[derive(Debug)]
pub struct EdgeGraph {
    /// Directory that relative outputs are resolved against
    out_dir: PathBuf,

    /// Edges in insertion order
    edges: Vec<BuildEdge>,

    /// Producer -> consumer relation between edges
    graph: DiGraph<usize, ()>,

    /// Map from resolved output path to the node producing it
    producers: HashMap<PathBuf, NodeIndex>,
}

impl EdgeGraph {
    /// Creates an empty graph for the given output directory
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            edges: Vec::new(),
            graph: DiGraph::new(),
            producers: HashMap::new(),
        }
    }

    /// Adds an edge, rejecting outputs that another edge already produces
    pub fn add_edge(&mut self, edge: BuildEdge) -> Result<(), GraphError> {
        for output in &edge.deps.outputs {
            let resolved = self.resolve(output);
            if let Some(&other) = self.producers.get(&resolved) {
                let first = self.edges[self.graph[other]].source.clone();
                return Err(GraphError::DuplicateOutput {
                    output: output.clone(),
                    first,
                    second: edge.source.clone(),
                });
            }
        }

        let idx = self.graph.add_node(self.edges.len());
        for output in &edge.deps.outputs {
            let resolved = self.resolve(output);
            self.producers.insert(resolved, idx);
        }

        self.edges.push(edge);
        Ok(())
    }

    /// Connects producers to consumers and checks that the result is acyclic
    pub fn validate(&mut self) -> Result<(), GraphError> {
        self.graph.clear_edges();

        for consumer in self.graph.node_indices().collect::<Vec<_>>() {
            let edge = &self.edges[self.graph[consumer]];
            let consumed: Vec<PathBuf> = edge
                .deps
                .inputs
                .iter()
                .chain(&edge.deps.extra_dependencies)
                .map(|path| self.resolve(path))
                .collect();

            for path in consumed {
                if let Some(&producer) = self.producers.get(&path) {
                    self.graph.update_edge(producer, consumer, ());
                }
            }
        }

        toposort(&self.graph, None).map(|_| ()).map_err(|cycle| {
            let source = self.edges[self.graph[cycle.node_id()]].source.clone();
            GraphError::CycleDetected(source)
        })
    }

    /// Returns the edges in insertion order
    pub fn edges(&self) -> &[BuildEdge] {
        &self.edges
    }

    /// Returns the number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if no edge was added
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns the distinct exporter names in first-use order
    pub fn exporters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for edge in &self.edges {
            if !names.contains(&edge.exporter.as_str()) {
                names.push(&edge.exporter);
            }
        }
        names
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.out_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(exporter: &str, source: &str, outputs: &[&str]) -> BuildEdge {
        let mut deps = DependencyInfo::for_source(source);
        deps.outputs = outputs.iter().map(PathBuf::from).collect();
        BuildEdge {
            exporter: exporter.to_string(),
            source: PathBuf::from(source),
            deps,
        }
    }

    #[test]
    fn empty_graph() {
        let mut graph = EdgeGraph::new("/out");
        assert!(graph.is_empty());
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn independent_edges() {
        let mut graph = EdgeGraph::new("/out");
        graph.add_edge(edge("Image", "/data/a.png", &["a.png"])).unwrap();
        graph.add_edge(edge("Shader", "/data/b.hlsl", &["b.tsh"])).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.validate().is_ok());
        assert_eq!(graph.exporters(), vec!["Image", "Shader"]);
    }

    #[test]
    fn exporters_are_distinct() {
        let mut graph = EdgeGraph::new("/out");
        graph.add_edge(edge("Image", "/data/a.png", &["a.png"])).unwrap();
        graph.add_edge(edge("Image", "/data/c.png", &["c.png"])).unwrap();
        assert_eq!(graph.exporters(), vec!["Image"]);
    }

    #[test]
    fn duplicate_output_rejected() {
        let mut graph = EdgeGraph::new("/out");
        graph.add_edge(edge("Image", "/data/a.png", &["a.png"])).unwrap();

        let err = graph
            .add_edge(edge("Texture", "/data/other/a.png", &["a.png"]))
            .unwrap_err();

        assert_eq!(
            err,
            GraphError::DuplicateOutput {
                output: PathBuf::from("a.png"),
                first: PathBuf::from("/data/a.png"),
                second: PathBuf::from("/data/other/a.png"),
            }
        );
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn chained_edges_are_valid() {
        let mut graph = EdgeGraph::new("/out");
        graph.add_edge(edge("Model", "/data/m.fbx", &["m.tsm"])).unwrap();

        let mut consumer = edge("Pack", "/data/pack.list", &["pack.bin"]);
        consumer.deps.extra_dependencies.push(PathBuf::from("m.tsm"));
        graph.add_edge(consumer).unwrap();

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn cycle_detection() {
        let mut graph = EdgeGraph::new("/out");

        let mut first = edge("A", "/data/a.src", &["a.out"]);
        first.deps.extra_dependencies.push(PathBuf::from("b.out"));
        let mut second = edge("B", "/data/b.src", &["b.out"]);
        second.deps.extra_dependencies.push(PathBuf::from("a.out"));

        graph.add_edge(first).unwrap();
        graph.add_edge(second).unwrap();

        assert!(matches!(graph.validate(), Err(GraphError::CycleDetected(_))));
    }
}
