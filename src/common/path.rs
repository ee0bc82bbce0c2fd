use super::{Edge, Node, Time};

pub type VarId = usize;

/// Sequence of traversals. Entry `t` is the step taken from `t` to `t + 1`;
/// the last entry is the agent parked at its final node, which it keeps
/// doing for every later time step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    edges: Vec<Edge>,
}

impl Path {
    /// Build a path from its traversals. Returns `None` for an empty sequence,
    /// since every path at least occupies its start node.
    pub fn new(edges: Vec<Edge>) -> Option<Self> {
        if edges.is_empty() {
            return None;
        }
        Some(Path { edges })
    }

    pub fn len(&self) -> Time {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn get(&self, t: Time) -> Option<Edge> {
        self.edges.get(t).copied()
    }

    pub fn final_node(&self) -> Node {
        self.edges[self.edges.len() - 1].n
    }

    /// Traversals that actually leave `t` towards `t + 1`, i.e. all entries
    /// before the terminal one.
    pub fn steps(&self) -> impl Iterator<Item = (Time, Edge)> + '_ {
        self.edges[..self.edges.len() - 1]
            .iter()
            .copied()
            .enumerate()
    }
}

/// A column of the master problem: one candidate path for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct PathVariable {
    pub id: VarId,
    pub agent: usize,
    pub path: Path,
}
