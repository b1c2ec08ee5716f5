//! Directed "depends-on" graph over package names.
//!
//! Vertices are unique per name; an edge `a -> b` means `a` declares `b`.
//! The graph refuses any edge that would close a cycle, so it stays acyclic
//! no matter in which order concurrent installers report relationships.

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Edge {from} -> {to} would create a dependency cycle")]
    Cycle { from: String, to: String },

    #[error("Edge {from} -> {to} already exists")]
    DuplicateEdge { from: String, to: String },
}

#[derive(Default)]
struct Inner {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl Inner {
    fn vertex(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.indices.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), index);
        index
    }
}

/// Thread-safe dependency graph shared by all tasks of one install run
#[derive(Default)]
pub struct DependencyGraph {
    inner: Mutex<Inner>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a vertex; adding an existing one is a no-op.
    pub fn add_vertex(&self, name: &str) {
        self.lock().vertex(name);
    }

    /// Record `from -> to`, creating missing vertices.
    pub fn add_edge(&self, from: &str, to: &str) -> Result<(), GraphError> {
        let mut inner = self.lock();
        let from_index = inner.vertex(from);
        let to_index = inner.vertex(to);

        if inner.graph.contains_edge(from_index, to_index) {
            return Err(GraphError::DuplicateEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if from_index == to_index || has_path_connecting(&inner.graph, to_index, from_index, None) {
            return Err(GraphError::Cycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        inner.graph.add_edge(from_index, to_index, ());
        Ok(())
    }

    pub fn contains_vertex(&self, name: &str) -> bool {
        self.lock().indices.contains_key(name)
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        let inner = self.lock();
        match (inner.indices.get(from), inner.indices.get(to)) {
            (Some(&a), Some(&b)) => inner.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.lock().graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.lock().graph.edge_count()
    }

    /// Direct dependencies of `name`, sorted
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let inner = self.lock();
        let Some(&index) = inner.indices.get(name) else {
            return Vec::new();
        };

        let mut names: Vec<String> = inner
            .graph
            .neighbors(index)
            .map(|n| inner.graph[n].clone())
            .collect();
        names.sort();
        names
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.lock().graph)
    }
}
