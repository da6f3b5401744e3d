use argus_core::{Edge, FilePath};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Directed dependency graph over symbols and files.
///
/// Persistent representation is a sorted edge set keyed by
/// `(source, kind, target)` — cheap to diff and hash, and it serializes
/// deterministically. Constant-time neighbor queries go through the
/// transient [`AdjacencyIndex`] built at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    edges: BTreeSet<Edge>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.insert(edge);
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Drop every edge originating in the given file.
    pub fn remove_edges_from(&mut self, path: &FilePath) {
        self.edges.retain(|e| &e.source_file() != path);
    }

    /// Drop every edge whose source or resolved target lies in the file.
    pub fn remove_edges_touching(&mut self, path: &FilePath) {
        self.edges
            .retain(|e| &e.source_file() != path && e.target_file().as_ref() != Some(path));
    }

    /// Node keys with an edge pointing at `node` (incoming).
    pub fn dependents(&self, node: &str) -> BTreeSet<&str> {
        self.edges
            .iter()
            .filter(|e| e.target == node)
            .map(|e| e.source.as_str())
            .collect()
    }

    /// Node keys that `node` points at (outgoing).
    pub fn dependencies(&self, node: &str) -> BTreeSet<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == node)
            .map(|e| e.target.as_str())
            .collect()
    }

    /// Replace the full edge set; used by the linker after resolution.
    pub fn replace_edges(&mut self, edges: BTreeSet<Edge>) {
        self.edges = edges;
    }

    pub fn take_edges(&mut self) -> BTreeSet<Edge> {
        std::mem::take(&mut self.edges)
    }

    /// Build the transient adjacency index for neighbor walks.
    pub fn adjacency(&self) -> AdjacencyIndex {
        AdjacencyIndex::build(self)
    }
}

/// Transient adjacency over the edge set, rebuilt per run and never stored.
pub struct AdjacencyIndex {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl AdjacencyIndex {
    fn build(edges: &DependencyGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        fn intern(
            graph: &mut DiGraph<String, ()>,
            nodes: &mut HashMap<String, NodeIndex>,
            key: &str,
        ) -> NodeIndex {
            if let Some(idx) = nodes.get(key) {
                return *idx;
            }
            let idx = graph.add_node(key.to_string());
            nodes.insert(key.to_string(), idx);
            idx
        }

        for edge in edges.edges() {
            let s = intern(&mut graph, &mut nodes, &edge.source);
            let t = intern(&mut graph, &mut nodes, &edge.target);
            graph.update_edge(s, t, ());
        }

        AdjacencyIndex { graph, nodes }
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    /// Direct dependents (incoming neighbors), sorted.
    pub fn dependents(&self, node: &str) -> Vec<&str> {
        self.neighbors_directed(node, Direction::Incoming)
    }

    /// Direct dependencies (outgoing neighbors), sorted.
    pub fn dependencies(&self, node: &str) -> Vec<&str> {
        self.neighbors_directed(node, Direction::Outgoing)
    }

    fn neighbors_directed(&self, node: &str, dir: Direction) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(node) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// All nodes reachable within `depth` hops, following edges in both
    /// directions. Excludes the start node. Sorted for determinism.
    pub fn neighbors(&self, node: &str, depth: usize) -> Vec<&str> {
        let Some(&start) = self.nodes.get(node) else {
            return Vec::new();
        };

        let mut seen: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        seen.insert(start);
        queue.push_back((start, 0));

        while let Some((current, dist)) = queue.pop_front() {
            if dist == depth {
                continue;
            }
            for dir in [Direction::Outgoing, Direction::Incoming] {
                for next in self.graph.neighbors_directed(current, dir) {
                    if seen.insert(next) {
                        queue.push_back((next, dist + 1));
                    }
                }
            }
        }

        seen.remove(&start);
        let mut out: Vec<&str> = seen.into_iter().map(|n| self.graph[n].as_str()).collect();
        out.sort_unstable();
        out
    }
}
