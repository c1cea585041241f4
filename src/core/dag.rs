//! Dependency graph and topological ordering for a batch of subtasks.
//!
//! Edges point from a dependency to its dependent, so walking outgoing
//! edges from a node reaches everything that must wait for it. Ordering is a
//! depth-first traversal that appends nodes in finish order and reverses the
//! result; a back edge found during traversal is a cycle, which is reported
//! and skipped rather than treated as fatal.

use crate::core::subtask::{BatchId, Subtask};
use crate::error::{Error, Result};
use crate::{tlog_debug, tlog_warn};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dependency edge the ordering could not honor because it closes a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleEdge {
    /// The subtask whose dependency was treated as already satisfied.
    pub dependent: String,
    /// The dependency that ends up after its dependent.
    pub dependency: String,
}

impl std::fmt::Display for CycleEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} depends on {}", self.dependent, self.dependency)
    }
}

/// Graph of one batch's subtasks.
pub struct DependencyGraph {
    graph: DiGraph<Subtask, ()>,
    index: HashMap<String, NodeIndex>,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build a graph from each subtask's dependency list.
    ///
    /// References to ids outside the batch and self-references are skipped
    /// with a warning; the subtask itself is kept.
    pub fn from_subtasks(subtasks: Vec<Subtask>) -> Self {
        let mut dag = Self::new();
        let edges: Vec<(String, String)> = subtasks
            .iter()
            .flat_map(|s| s.dependencies.iter().map(|d| (d.clone(), s.id.clone())))
            .collect();

        for subtask in subtasks {
            dag.add_subtask(subtask);
        }
        for (dependency, dependent) in edges {
            if let Err(e) = dag.add_dependency(&dependency, &dependent) {
                tlog_warn!("Skipping edge {} -> {}: {}", dependency, dependent, e);
            }
        }
        tlog_debug!(
            "DependencyGraph built: {} subtasks, {} edges",
            dag.len(),
            dag.edge_count()
        );
        dag
    }

    /// Add a subtask. A second subtask with an existing id is ignored.
    pub fn add_subtask(&mut self, subtask: Subtask) -> NodeIndex {
        if let Some(&index) = self.index.get(&subtask.id) {
            tlog_warn!("Duplicate subtask id {} ignored", subtask.id);
            return index;
        }
        let id = subtask.id.clone();
        let index = self.graph.add_node(subtask);
        self.index.insert(id, index);
        index
    }

    /// Record that `dependent` must wait for `dependency`.
    ///
    /// Cycles are allowed here; [`DependencyGraph::sort`] tolerates them.
    pub fn add_dependency(&mut self, dependency: &str, dependent: &str) -> Result<()> {
        if dependency == dependent {
            return Err(Error::Validation(format!(
                "Subtask {} cannot depend on itself",
                dependent
            )));
        }
        let from = *self.index.get(dependency).ok_or_else(|| {
            Error::Validation(format!("Subtask {} not found in batch", dependency))
        })?;
        let to = *self.index.get(dependent).ok_or_else(|| {
            Error::Validation(format!("Subtask {} not found in batch", dependent))
        })?;
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Subtask> {
        self.index.get(id).and_then(|&i| self.graph.node_weight(i))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Subtasks that `id` waits for.
    pub fn dependencies_of(&self, id: &str) -> Vec<&Subtask> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Subtasks that wait for `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<&Subtask> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&Subtask> {
        match self.index.get(id) {
            Some(&index) => self
                .graph
                .neighbors_directed(index, direction)
                .filter_map(|n| self.graph.node_weight(n))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Linearize the graph so every dependency precedes its dependents.
    ///
    /// Subtasks with no ordering constraint between them keep their insertion
    /// order. Back edges are recorded in [`OrderedBatch::tolerated_cycles`].
    pub fn sort(self, batch_id: BatchId) -> OrderedBatch {
        let count = self.graph.node_count();
        let mut marks = vec![Mark::Unvisited; count];
        let mut finished = Vec::with_capacity(count);
        let mut cycles = Vec::new();

        // Roots and neighbors are walked highest index first so that the
        // reversal restores insertion order among independent subtasks.
        for root in (0..count).rev().map(NodeIndex::new) {
            if marks[root.index()] == Mark::Unvisited {
                self.visit(root, &mut marks, &mut finished, &mut cycles);
            }
        }
        finished.reverse();

        let (nodes, _) = self.graph.into_nodes_edges();
        let mut slots: Vec<Option<Subtask>> = nodes.into_iter().map(|n| Some(n.weight)).collect();
        let subtasks = finished
            .into_iter()
            .filter_map(|i: NodeIndex| slots[i.index()].take())
            .collect();

        OrderedBatch {
            batch_id,
            subtasks,
            tolerated_cycles: cycles,
        }
    }

    fn visit(
        &self,
        node: NodeIndex,
        marks: &mut [Mark],
        finished: &mut Vec<NodeIndex>,
        cycles: &mut Vec<CycleEdge>,
    ) {
        marks[node.index()] = Mark::Visiting;

        let mut dependents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        dependents.sort_by(|a, b| b.cmp(a));

        for next in dependents {
            match marks[next.index()] {
                Mark::Visited => {}
                Mark::Visiting => {
                    let edge = CycleEdge {
                        dependent: self.graph[next].id.clone(),
                        dependency: self.graph[node].id.clone(),
                    };
                    tlog_warn!("Circular dependency detected: {}", edge);
                    cycles.push(edge);
                }
                Mark::Unvisited => self.visit(next, marks, finished, cycles),
            }
        }

        finished.push(node);
        marks[node.index()] = Mark::Visited;
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("subtasks", &self.len())
            .field("dependencies", &self.edge_count())
            .finish()
    }
}

/// Sort a fresh batch of subtasks into dependency-safe order.
pub fn sort(subtasks: Vec<Subtask>) -> OrderedBatch {
    DependencyGraph::from_subtasks(subtasks).sort(BatchId::new())
}

/// The topologically sorted subtasks of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedBatch {
    pub batch_id: BatchId,
    pub subtasks: Vec<Subtask>,
    /// Dependency edges that were treated as satisfied to break a cycle.
    #[serde(default)]
    pub tolerated_cycles: Vec<CycleEdge>,
}

impl OrderedBatch {
    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subtask> {
        self.subtasks.iter()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.subtasks.iter().position(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    pub fn has_cycles(&self) -> bool {
        !self.tolerated_cycles.is_empty()
    }

    /// Dependency edges whose dependency does not come strictly before the dependent.
    pub fn out_of_order_edges(&self) -> Vec<CycleEdge> {
        let mut edges = Vec::new();
        for (i, subtask) in self.subtasks.iter().enumerate() {
            for dep in &subtask.dependencies {
                if let Some(j) = self.position(dep) {
                    if j >= i {
                        edges.push(CycleEdge {
                            dependent: subtask.id.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }
        edges
    }
}

impl<'a> IntoIterator for &'a OrderedBatch {
    type Item = &'a Subtask;
    type IntoIter = std::slice::Iter<'a, Subtask>;

    fn into_iter(self) -> Self::IntoIter {
        self.subtasks.iter()
    }
}
