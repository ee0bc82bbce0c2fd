use super::usage::EdgeUsage;
use crate::common::EdgeTime;
use crate::config::ConflictSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    Feasible,
    Infeasible,
}

/// First (in `(time, edge)` order) undirected edge used more than once, if
/// any. Wait usage never makes a solution infeasible on its own.
pub fn find_overused_edge(usage: &EdgeUsage, settings: &ConflictSettings) -> Option<(EdgeTime, f64)> {
    usage
        .sorted_moves()
        .into_iter()
        .find(|&(_, val)| settings.is_greater(val, 1.0))
}

pub fn check_edge_usage(usage: &EdgeUsage, settings: &ConflictSettings) -> Feasibility {
    match find_overused_edge(usage, settings) {
        Some(_) => Feasibility::Infeasible,
        None => Feasibility::Feasible,
    }
}
