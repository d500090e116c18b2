//! Class Graph - superclass relationships between classes.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: class ids
//! - Edges: superclass -> subclass
//!
//! The graph mixes classes compiled in this session with classes known only
//! from the kodbase, so it can answer both "in what order can these classes
//! be laid out" and "which classes inherit from this one".

use blakod_core::limits::NO_SUPERCLASS;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};

/// Superclass graph keyed by class id.
#[derive(Debug, Clone, Default)]
pub struct ClassGraph {
    graph: DiGraph<u32, ()>,
    nodes: FxHashMap<u32, NodeIndex>,
}

impl ClassGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class node, returning the existing node if already present.
    pub fn add_class(&mut self, class: u32) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&class) {
            return node;
        }
        let node = self.graph.add_node(class);
        self.nodes.insert(class, node);
        node
    }

    /// Record `superclass` as the parent of `class`, replacing any previous
    /// parent. [`NO_SUPERCLASS`] makes `class` a root.
    pub fn set_superclass(&mut self, class: u32, superclass: u32) {
        let node = self.add_class(class);
        let incoming: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();
        for edge in incoming {
            self.graph.remove_edge(edge);
        }
        if superclass != NO_SUPERCLASS {
            let parent = self.add_class(superclass);
            self.graph.add_edge(parent, node, ());
        }
    }

    pub fn contains(&self, class: u32) -> bool {
        self.nodes.contains_key(&class)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parent of a class, if it has one in the graph.
    pub fn superclass(&self, class: u32) -> Option<u32> {
        let node = *self.nodes.get(&class)?;
        self.graph
            .neighbors_directed(node, Direction::Incoming)
            .next()
            .map(|parent| self.graph[parent])
    }

    /// Direct subclasses, sorted by id.
    pub fn subclasses(&self, class: u32) -> Vec<u32> {
        let Some(&node) = self.nodes.get(&class) else {
            return Vec::new();
        };
        let mut children: Vec<u32> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|child| self.graph[child])
            .collect();
        children.sort_unstable();
        children
    }

    /// Every class that inherits from `class`, directly or not, sorted by id.
    pub fn descendants(&self, class: u32) -> Vec<u32> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![class];
        while let Some(current) = stack.pop() {
            for child in self.subclasses(current) {
                if seen.insert(child) {
                    stack.push(child);
                }
            }
        }
        seen.remove(&class);
        let mut out: Vec<u32> = seen.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Ancestors of `class`, nearest first. Stops if a cycle is reached.
    pub fn ancestors(&self, class: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut current = class;
        while let Some(parent) = self.superclass(current) {
            if parent == class || out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Classes ordered so that every superclass precedes its subclasses.
    ///
    /// On a cycle, returns the id of a class that is part of it.
    pub fn topological_order(&self) -> Result<Vec<u32>, u32> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|node| self.graph[node]).collect())
            .map_err(|cycle| self.graph[cycle.node_id()])
    }
}
