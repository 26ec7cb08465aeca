//! Interprocedural control-flow graph.
//!
//! A directed multigraph whose vertices are the UUIDs of code and proxy
//! blocks and whose edges carry a `(type, conditional, direct)` label. Edge
//! identity is the whole `(source, target, label)` triple with set
//! semantics: re-adding an existing triple is a no-op.
//!
//! Detaching a block from its byte interval does not remove incident edges;
//! rewriting tools detach and reattach blocks transiently and reconcile the
//! graph themselves.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use uuid::Uuid;

use crate::node::ChangeStatus;

/// Control-flow edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeType {
    Branch,
    Call,
    Fallthrough,
    Return,
    Syscall,
    Sysret,
}

impl EdgeType {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            EdgeType::Branch => 0,
            EdgeType::Call => 1,
            EdgeType::Fallthrough => 2,
            EdgeType::Return => 3,
            EdgeType::Syscall => 4,
            EdgeType::Sysret => 5,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<EdgeType> {
        match tag {
            0 => Some(EdgeType::Branch),
            1 => Some(EdgeType::Call),
            2 => Some(EdgeType::Fallthrough),
            3 => Some(EdgeType::Return),
            4 => Some(EdgeType::Syscall),
            5 => Some(EdgeType::Sysret),
            _ => None,
        }
    }
}

/// Label carried on every CFG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeLabel {
    pub kind: EdgeType,
    pub conditional: bool,
    pub direct: bool,
}

impl EdgeLabel {
    pub fn new(kind: EdgeType, conditional: bool, direct: bool) -> Self {
        Self { kind, conditional, direct }
    }
}

/// The graph itself: petgraph storage plus a UUID side index.
#[derive(Debug, Default)]
pub struct Cfg {
    graph: DiGraph<Uuid, EdgeLabel>,
    index: HashMap<Uuid, NodeIndex>,
}

impl Cfg {
    pub fn new() -> Self {
        Self::default()
    }

    fn vertex(&mut self, uuid: Uuid) -> NodeIndex {
        match self.index.get(&uuid) {
            Some(&ix) => ix,
            None => {
                let ix = self.graph.add_node(uuid);
                self.index.insert(uuid, ix);
                ix
            }
        }
    }

    pub fn contains_vertex(&self, uuid: &Uuid) -> bool {
        self.index.contains_key(uuid)
    }

    /// Vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.graph.node_indices().map(move |ix| self.graph[ix])
    }

    /// Ensures a vertex exists for `uuid` without touching any edge.
    pub fn add_vertex(&mut self, uuid: Uuid) -> ChangeStatus {
        if self.contains_vertex(&uuid) {
            ChangeStatus::NoChange
        } else {
            self.vertex(uuid);
            ChangeStatus::Accepted
        }
    }

    fn find_edge(&self, source: &Uuid, target: &Uuid, label: &EdgeLabel) -> Option<petgraph::graph::EdgeIndex> {
        let (s, t) = match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) => (s, t),
            _ => return None,
        };
        self.graph
            .edges_connecting(s, t)
            .find(|e| e.weight() == label)
            .map(|e| e.id())
    }

    /// Inserts an edge, creating endpoint vertices as needed.
    pub fn add_edge(&mut self, source: Uuid, target: Uuid, label: EdgeLabel) -> ChangeStatus {
        if self.find_edge(&source, &target, &label).is_some() {
            return ChangeStatus::NoChange;
        }
        let s = self.vertex(source);
        let t = self.vertex(target);
        self.graph.add_edge(s, t, label);
        ChangeStatus::Accepted
    }

    pub fn remove_edge(&mut self, source: Uuid, target: Uuid, label: EdgeLabel) -> ChangeStatus {
        match self.find_edge(&source, &target, &label) {
            Some(e) => {
                self.graph.remove_edge(e);
                ChangeStatus::Accepted
            }
            None => ChangeStatus::NoChange,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges as `(source, target, label)` triples, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (Uuid, Uuid, EdgeLabel)> + '_ {
        self.graph.edge_references().map(move |e| {
            (self.graph[e.source()], self.graph[e.target()], *e.weight())
        })
    }

    /// Outgoing edges of `source` as `(target, label)` pairs.
    pub fn out_edges(&self, source: &Uuid) -> Vec<(Uuid, EdgeLabel)> {
        match self.index.get(source) {
            Some(&ix) => self
                .graph
                .edges_directed(ix, Direction::Outgoing)
                .map(|e| (self.graph[e.target()], *e.weight()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Incoming edges of `target` as `(source, label)` pairs.
    pub fn in_edges(&self, target: &Uuid) -> Vec<(Uuid, EdgeLabel)> {
        match self.index.get(target) {
            Some(&ix) => self
                .graph
                .edges_directed(ix, Direction::Incoming)
                .map(|e| (self.graph[e.source()], *e.weight()))
                .collect(),
            None => Vec::new(),
        }
    }

    fn sorted_edges(&self) -> Vec<(Uuid, Uuid, EdgeLabel)> {
        let mut edges: Vec<_> = self.edges().collect();
        edges.sort();
        edges
    }
}

/// Set equality over labeled edges; vertex bookkeeping does not participate.
impl PartialEq for Cfg {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_edges() == other.sorted_edges()
    }
}

impl Eq for Cfg {}
