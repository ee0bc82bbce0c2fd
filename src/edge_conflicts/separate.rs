use tracing::debug;

use super::usage::EdgeUsage;
use crate::common::{Edge, Path, Time};
use crate::config::ConflictSettings;
use crate::map::EdgeGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConflictEdges {
    pub moves: [Edge; 2], // moves[0] is the canonical orientation
    pub wait: Option<Edge>,
}

impl ConflictEdges {
    /// Whether a column following `path` has coefficient one in the cut at
    /// time `t`. Past the end of its path an agent keeps waiting at its final
    /// node, which only matters for the wait member.
    pub fn covers(&self, t: Time, path: &Path) -> bool {
        if t + 1 < path.len() {
            let step = path.edges()[t];
            step == self.moves[0] || step == self.moves[1] || self.wait == Some(step)
        } else {
            matches!(self.wait, Some(wait) if wait.n == path.final_node())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolatedConflict {
    pub t: Time,
    pub edges: ConflictEdges,
    pub move_value: f64,
    pub wait_value: f64,
}

impl ViolatedConflict {
    pub fn lhs(&self) -> f64 {
        self.move_value + self.wait_value
    }
}

/// Scan the move usage once per undirected edge and time, attach the heavier
/// endpoint wait when `settings.wait_edges_enabled`, and keep the entries
/// whose total exceeds one.
pub fn find_violated_conflicts<G: EdgeGraph + ?Sized>(
    usage: &EdgeUsage,
    graph: &G,
    settings: &ConflictSettings,
) -> Vec<ViolatedConflict> {
    let mut violated = Vec::new();

    for (et, move_value) in usage.sorted_moves() {
        let t = et.t;
        debug_assert!(!et.edge.is_wait());
        let moves = [et.edge, graph.opposite_edge(et.edge)];

        // Ties go to the canonical edge's tail.
        let (wait, wait_value) = if settings.wait_edges_enabled {
            let wait0_value = usage.wait_value(moves[0].n, t);
            let wait1_value = usage.wait_value(moves[1].n, t);
            if wait0_value >= wait1_value {
                (Some(Edge::wait(moves[0].n)), wait0_value)
            } else {
                (Some(Edge::wait(moves[1].n)), wait1_value)
            }
        } else {
            (None, 0.0)
        };

        let conflict = ViolatedConflict {
            t,
            edges: ConflictEdges { moves, wait },
            move_value,
            wait_value,
        };
        if settings.is_greater(conflict.lhs(), 1.0) {
            debug!(
                "violated edge {} / {} at time {t} with value {}",
                moves[0],
                moves[1],
                conflict.lhs()
            );
            violated.push(conflict);
        }
    }

    violated
}
