use std::collections::HashMap;
use tracing::trace;

use crate::common::{Edge, EdgeTime, Node, PathVariable, Time, VarId};
use crate::config::ConflictSettings;
use crate::map::EdgeGraph;

/// Fractional edge usage summed over all columns with positive value.
#[derive(Debug, Clone, Default)]
pub struct EdgeUsage {
    /// Keyed by canonical undirected edge and time.
    pub(crate) moves: HashMap<EdgeTime, f64>,
    /// Keyed by `(node, WAIT)` and time. Empty unless waits were aggregated.
    pub(crate) waits: HashMap<EdgeTime, f64>,
    pub(crate) makespan: Time,
}

impl EdgeUsage {
    /// Sum `value(var)` over every traversal of every positive column. With
    /// `include_waits`, paths are padded with waits up to the makespan.
    pub fn aggregate<G, F>(
        graph: &G,
        variables: &[PathVariable],
        value: F,
        settings: &ConflictSettings,
        include_waits: bool,
    ) -> Self
    where
        G: EdgeGraph + ?Sized,
        F: Fn(VarId) -> f64,
    {
        let positive: Vec<(&PathVariable, f64)> = variables
            .iter()
            .map(|var| (var, value(var.id)))
            .filter(|&(_, val)| settings.is_positive(val))
            .collect();

        let makespan = positive
            .iter()
            .map(|(var, _)| var.path.len())
            .max()
            .unwrap_or(0);

        let mut usage = EdgeUsage {
            makespan,
            ..Default::default()
        };
        for (var, val) in positive {
            for (t, e) in var.path.steps() {
                if !e.is_wait() {
                    let et = EdgeTime::new(graph.undirected_edge(e), t);
                    *usage.moves.entry(et).or_insert(0.0) += val;
                } else if include_waits {
                    *usage.waits.entry(EdgeTime::new(e, t)).or_insert(0.0) += val;
                }
            }

            if include_waits {
                let n = var.path.final_node();
                for t in var.path.len() - 1..makespan.saturating_sub(1) {
                    *usage.waits.entry(EdgeTime::wait(n, t)).or_insert(0.0) += val;
                }
            }
        }

        trace!(
            "aggregated {} move entries, {} wait entries, makespan {makespan}",
            usage.moves.len(),
            usage.waits.len()
        );
        usage
    }

    pub fn move_value<G: EdgeGraph + ?Sized>(&self, graph: &G, e: Edge, t: Time) -> f64 {
        self.moves
            .get(&EdgeTime::new(graph.undirected_edge(e), t))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn wait_value(&self, n: Node, t: Time) -> f64 {
        self.waits
            .get(&EdgeTime::wait(n, t))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn makespan(&self) -> Time {
        self.makespan
    }

    /// Move entries in ascending `(time, edge)` order.
    pub fn sorted_moves(&self) -> Vec<(EdgeTime, f64)> {
        let mut entries: Vec<_> = self.moves.iter().map(|(&et, &val)| (et, val)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
