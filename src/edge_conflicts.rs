mod check;
mod separate;
mod store;
mod usage;

pub use check::{check_edge_usage, find_overused_edge, Feasibility};
pub use separate::{find_violated_conflicts, ConflictEdges, ViolatedConflict};
pub use store::{EdgeConflict, EdgeConflictStore, StoreState};
pub use usage::EdgeUsage;

use anyhow::{anyhow, Result};
use tracing::{debug, instrument};

use crate::common::{EdgeTime, Time, VarId};
use crate::config::ConflictSettings;
use crate::lp::{LpHost, Solution};
use crate::map::EdgeGraph;
use crate::stat::Stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationResult {
    DidNotFind,
    Separated,
    Cutoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementResult {
    Feasible,
    Separated,
    Cutoff,
}

/// Edge-conflict constraint of one search-tree node lineage.
///
/// Checks integral solutions for edge swaps, separates violated swap cuts from
/// fractional ones, and keeps every cut it created up to date as pricing adds
/// new columns.
pub struct EdgeConflictsHandler<'m, G: ?Sized, R> {
    graph: &'m G,
    settings: ConflictSettings,
    store: EdgeConflictStore<R>,
    stats: Stats,
}

impl<'m, G, R> EdgeConflictsHandler<'m, G, R>
where
    G: EdgeGraph + ?Sized,
{
    pub fn new(graph: &'m G, settings: ConflictSettings) -> Self {
        EdgeConflictsHandler {
            graph,
            settings,
            store: EdgeConflictStore::new(),
            stats: Stats::default(),
        }
    }

    pub fn settings(&self) -> &ConflictSettings {
        &self.settings
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn state(&self) -> StoreState {
        self.store.state()
    }

    pub fn conflicts(&self) -> &[EdgeConflict<R>] {
        self.store.conflicts()
    }

    fn aggregate<H>(&self, host: &H, sol: Option<&Solution>, include_waits: bool) -> EdgeUsage
    where
        H: LpHost<Row = R>,
    {
        EdgeUsage::aggregate(
            self.graph,
            host.variables(),
            |var| host.solution_value(sol, var),
            &self.settings,
            include_waits,
        )
    }

    /// Feasibility of an integral solution: no undirected edge may be
    /// traversed more than once per time step.
    #[instrument(skip_all, name = "edge_conflicts_check", level = "debug")]
    pub fn check<H>(&mut self, host: &H, sol: Option<&Solution>) -> Feasibility
    where
        H: LpHost<Row = R>,
    {
        self.stats.check_calls += 1;

        let usage = self.aggregate(host, sol, false);
        match find_overused_edge(&usage, &self.settings) {
            Some((et, val)) => {
                let (x1, y1) = self.graph.position(et.edge.n);
                let (x2, y2) = self.graph.destination_position(et.edge);
                debug!(
                    "Infeasible solution has edge (({x1},{y1}),({x2},{y2})) at time {} with value {val}",
                    et.t
                );
                Feasibility::Infeasible
            }
            None => Feasibility::Feasible,
        }
    }

    /// Add a cut for every violated edge-time that has none yet.
    #[instrument(skip_all, name = "edge_conflicts_separate", level = "debug")]
    pub fn separate<H>(&mut self, host: &mut H, sol: Option<&Solution>) -> Result<SeparationResult>
    where
        H: LpHost<Row = R>,
    {
        self.store.ensure_active()?;
        self.stats.separation_rounds += 1;

        let usage = self.aggregate(&*host, sol, self.settings.wait_edges_enabled);
        let violated = find_violated_conflicts(&usage, self.graph, &self.settings);

        let mut result = SeparationResult::DidNotFind;
        for conflict in violated {
            let key = EdgeTime::new(conflict.edges.moves[0], conflict.t);
            if self.store.contains(&key) {
                debug!(
                    "edge conflict on {} at time {} already has a cut",
                    key.edge, key.t
                );
                continue;
            }

            let feasible = self.create_cut(host, sol, conflict)?;
            result = match (result, feasible) {
                (SeparationResult::Cutoff, _) | (_, false) => SeparationResult::Cutoff,
                _ => SeparationResult::Separated,
            };
        }

        Ok(result)
    }

    fn create_cut<H>(
        &mut self,
        host: &mut H,
        sol: Option<&Solution>,
        conflict: ViolatedConflict,
    ) -> Result<bool>
    where
        H: LpHost<Row = R>,
    {
        let t = conflict.t;
        let name = self.cut_name(&conflict.edges, t);

        let mut columns = Vec::new();
        let mut lhs = 0.0;
        for var in host.variables() {
            if conflict.edges.covers(t, &var.path) {
                columns.push(var.id);
                lhs += host.solution_value(sol, var.id);
            }
        }
        debug_assert!(
            self.settings.is_greater(lhs, 1.0),
            "cut {name} is not violated: lhs {lhs}"
        );

        debug!(
            "Creating edge conflict cut {name} with value {} over {} columns",
            conflict.lhs(),
            columns.len()
        );
        let (row, feasible) = host.install_row(&name, &columns, 1.0)?;

        self.stats.cuts_created += 1;
        if !feasible {
            self.stats.cutoffs += 1;
        }
        self.store.push(EdgeConflict {
            row,
            edges: conflict.edges,
            t,
            lhs: conflict.lhs(),
        })?;
        Ok(feasible)
    }

    fn cut_name(&self, edges: &ConflictEdges, t: Time) -> String {
        let (x1, y1) = self.graph.position(edges.moves[0].n);
        let (x2, y2) = self.graph.destination_position(edges.moves[0]);
        format!("edge_conflict(({x1},{y1}),({x2},{y2}),{t})")
    }

    pub fn enforce_lp<H>(&mut self, host: &mut H) -> Result<EnforcementResult>
    where
        H: LpHost<Row = R>,
    {
        Ok(match self.separate(host, None)? {
            SeparationResult::DidNotFind => EnforcementResult::Feasible,
            SeparationResult::Separated => EnforcementResult::Separated,
            SeparationResult::Cutoff => EnforcementResult::Cutoff,
        })
    }

    // No cut can be added to a pseudo solution.
    pub fn enforce_pseudo<H>(&mut self, host: &H) -> Feasibility
    where
        H: LpHost<Row = R>,
    {
        self.check(host, None)
    }

    // Rounding any column up may create an edge swap.
    pub fn lock_variables<H>(&mut self, host: &mut H) -> Result<()>
    where
        H: LpHost<Row = R>,
    {
        let ids: Vec<VarId> = host.variables().iter().map(|var| var.id).collect();
        for id in ids {
            host.lock_variable(id)?;
        }
        Ok(())
    }

    /// Retrofit a freshly priced column into every existing cut it belongs
    /// to. Must run before the column takes part in another resolve. Returns
    /// the number of cuts the column was added to.
    pub fn add_variable<H>(&mut self, host: &mut H, var: VarId) -> Result<usize>
    where
        H: LpHost<Row = R>,
    {
        self.store.ensure_active()?;

        let matching: Vec<usize> = {
            let variable = host
                .variable(var)
                .ok_or_else(|| anyhow!("unknown variable {var}"))?;
            self.store
                .conflicts()
                .iter()
                .enumerate()
                .filter(|(_, conflict)| conflict.covers(&variable.path))
                .map(|(index, _)| index)
                .collect()
        };

        host.lock_variable(var)?;
        for &index in &matching {
            host.add_coefficient(&self.store.conflicts()[index].row, var, 1.0)?;
        }

        self.stats.variables_added += 1;
        self.stats.coefficients_added += matching.len();
        debug!("variable {var} joins {} edge conflict cuts", matching.len());
        Ok(matching.len())
    }

    /// Handler for a copied or transformed node. Fails unless no cut has
    /// been created yet.
    pub fn clone_for_subtree(&self) -> Result<Self> {
        Ok(EdgeConflictsHandler {
            graph: self.graph,
            settings: self.settings,
            store: self.store.clone_for_subtree()?,
            stats: Stats::default(),
        })
    }

    pub fn release<H>(&mut self, host: &mut H) -> Result<usize>
    where
        H: LpHost<Row = R>,
    {
        self.store.release(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Direction, Edge};
    use crate::lp::{MemoryLp, RowId};
    use crate::map::Map;

    const OPEN_MAP: &str = "type octile\nheight 2\nwidth 3\nmap\n...\n...\n";

    // Helper function to setup tracing
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    fn add(lp: &mut MemoryLp, map: &Map, agent: usize, positions: &[(usize, usize)], value: f64) -> VarId {
        lp.add_column(agent, map.path_from_positions(positions).unwrap(), value)
    }

    fn swap_instance(map: &Map, value: f64) -> MemoryLp {
        let mut lp = MemoryLp::default();
        add(&mut lp, map, 0, &[(0, 0), (0, 1), (0, 2)], value);
        add(&mut lp, map, 1, &[(0, 1), (0, 0), (1, 0)], value);
        add(&mut lp, map, 0, &[(0, 0), (1, 0), (1, 1)], 1.0 - value);
        add(&mut lp, map, 1, &[(0, 1), (1, 1), (1, 2)], 1.0 - value);
        lp
    }

    #[test]
    fn test_swap_is_detected_and_cut_once() {
        init_tracing();
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = swap_instance(&map, 0.6);
        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(false));

        let integral: Solution = [(0, 1.0), (1, 1.0)].into_iter().collect();
        assert_eq!(handler.check(&lp, Some(&integral)), Feasibility::Infeasible);

        let result = handler.separate(&mut lp, None).unwrap();
        assert_eq!(result, SeparationResult::Separated);
        assert_eq!(handler.conflicts().len(), 1);
        assert_eq!(handler.state(), StoreState::Populated);

        let conflict = &handler.conflicts()[0];
        assert_eq!(conflict.t, 0);
        assert_eq!(conflict.edges.moves[0], Edge::new(map.get_id(0, 0), Direction::East));
        assert_eq!(conflict.edges.wait, None);
        assert!((conflict.lhs - 1.2).abs() < 1e-9);

        let row = lp.row(conflict.row);
        assert_eq!(row.name, "edge_conflict((0,0),(0,1),0)");
        assert_eq!(row.coefficients.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(row.rhs, 1.0);
        assert_eq!(handler.stats().cuts_created, 1);
    }

    #[test]
    fn test_no_false_positives() {
        let map = Map::parse(OPEN_MAP).unwrap();
        for wait_edges in [false, true] {
            let mut lp = swap_instance(&map, 0.5);
            let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(wait_edges));

            assert_eq!(handler.check(&lp, None), Feasibility::Feasible);
            assert_eq!(
                handler.separate(&mut lp, None).unwrap(),
                SeparationResult::DidNotFind
            );
            assert_eq!(handler.state(), StoreState::Empty);
            assert!(lp.rows().is_empty());
        }
    }

    #[test]
    fn test_wait_edge_joins_cut() {
        init_tracing();
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = MemoryLp::default();
        add(&mut lp, &map, 0, &[(0, 0), (0, 1)], 0.5);
        add(&mut lp, &map, 1, &[(0, 0), (0, 0)], 0.3);
        add(&mut lp, &map, 2, &[(0, 1), (0, 1)], 0.7);

        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(true));
        assert_eq!(handler.check(&lp, None), Feasibility::Feasible);
        assert_eq!(
            handler.separate(&mut lp, None).unwrap(),
            SeparationResult::Separated
        );

        let conflict = &handler.conflicts()[0];
        assert_eq!(conflict.edges.wait, Some(Edge::wait(map.get_id(0, 1))));
        assert!((conflict.lhs - 1.2).abs() < 1e-9);
        assert_eq!(
            lp.row(conflict.row).coefficients.keys().copied().collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert!((lp.row_activity(conflict.row) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_length_one_path_waits_through_padding() {
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = MemoryLp::default();
        add(&mut lp, &map, 0, &[(0, 0), (0, 1)], 0.5);
        add(&mut lp, &map, 1, &[(0, 0)], 0.6);

        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(false));
        assert_eq!(
            handler.separate(&mut lp, None).unwrap(),
            SeparationResult::DidNotFind
        );

        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(true));
        assert_eq!(
            handler.separate(&mut lp, None).unwrap(),
            SeparationResult::Separated
        );
        let conflict = &handler.conflicts()[0];
        assert_eq!(conflict.edges.wait, Some(Edge::wait(map.get_id(0, 0))));
        assert_eq!(lp.row(conflict.row).coefficients.len(), 2);
    }

    #[test]
    fn test_new_column_is_retrofitted() {
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = swap_instance(&map, 0.6);
        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(false));
        handler.lock_variables(&mut lp).unwrap();
        handler.separate(&mut lp, None).unwrap();
        let row: RowId = handler.conflicts()[0].row;
        let before = lp.row_activity(row);

        let crossing = add(&mut lp, &map, 2, &[(0, 1), (0, 0)], 0.25);
        assert_eq!(handler.add_variable(&mut lp, crossing).unwrap(), 1);
        assert!((lp.row_activity(row) - before - 0.25).abs() < 1e-9);
        assert_eq!(lp.row(row).coefficients[&crossing], 1.0);

        let unrelated = add(&mut lp, &map, 3, &[(1, 1), (1, 2)], 0.4);
        assert_eq!(handler.add_variable(&mut lp, unrelated).unwrap(), 0);
        assert!(!lp.row(row).coefficients.contains_key(&unrelated));
        assert!((lp.row_activity(row) - before - 0.25).abs() < 1e-9);

        // Same edge at another time is not part of the cut.
        let late = add(&mut lp, &map, 4, &[(0, 0), (0, 0), (0, 1)], 0.1);
        assert_eq!(handler.add_variable(&mut lp, late).unwrap(), 0);

        for var in 0..lp.variables().len() {
            assert_eq!(lp.up_locks(var), 1);
        }
        assert_eq!(handler.stats().variables_added, 3);
        assert_eq!(handler.stats().coefficients_added, 1);
        assert!(handler.add_variable(&mut lp, 99).is_err());
    }

    #[test]
    fn test_parked_column_is_retrofitted_into_wait_cut() {
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = MemoryLp::default();
        add(&mut lp, &map, 0, &[(0, 0), (0, 1)], 0.5);
        add(&mut lp, &map, 1, &[(0, 1), (0, 1)], 0.7);

        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(true));
        handler.separate(&mut lp, None).unwrap();
        assert_eq!(handler.conflicts().len(), 1);
        let row = handler.conflicts()[0].row;

        let parked = add(&mut lp, &map, 2, &[(0, 1)], 0.2);
        assert_eq!(handler.add_variable(&mut lp, parked).unwrap(), 1);
        assert_eq!(lp.row(row).coefficients.len(), 3);
    }

    #[test]
    fn test_repeated_separation_keeps_one_cut_per_edge_time() {
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = swap_instance(&map, 0.6);
        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(false));

        assert_eq!(
            handler.enforce_lp(&mut lp).unwrap(),
            EnforcementResult::Separated
        );
        assert_eq!(
            handler.separate(&mut lp, None).unwrap(),
            SeparationResult::DidNotFind
        );
        assert_eq!(handler.conflicts().len(), 1);
        assert_eq!(lp.rows().len(), 1);

        // After a resolve that respects the cut nothing is violated.
        for var in 0..4 {
            lp.set_value(var, 0.5);
        }
        assert_eq!(lp.row_activity(handler.conflicts()[0].row), 1.0);
        assert_eq!(
            handler.separate(&mut lp, None).unwrap(),
            SeparationResult::DidNotFind
        );
        assert_eq!(lp.rows().len(), 1);
        assert_eq!(handler.stats().separation_rounds, 3);
    }

    #[test]
    fn test_fixed_swap_is_cut_off() {
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = swap_instance(&map, 1.0);
        lp.set_lower_bound(0, 1.0);
        lp.set_lower_bound(1, 1.0);
        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(false));

        assert_eq!(handler.enforce_pseudo(&lp), Feasibility::Infeasible);
        assert_eq!(
            handler.separate(&mut lp, None).unwrap(),
            SeparationResult::Cutoff
        );
        assert_eq!(handler.stats().cutoffs, 1);
    }

    #[test]
    fn test_cutoff_sticks_across_later_cuts() {
        init_tracing();
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = MemoryLp::default();
        // Fixed swap on (0,0)-(0,1) at time 0.
        let a = add(&mut lp, &map, 0, &[(0, 0), (0, 1)], 1.0);
        let b = add(&mut lp, &map, 1, &[(0, 1), (0, 0)], 1.0);
        lp.set_lower_bound(a, 1.0);
        lp.set_lower_bound(b, 1.0);
        // Fractional swap on (1,1)-(1,2) at time 0.
        add(&mut lp, &map, 2, &[(1, 1), (1, 2)], 0.6);
        add(&mut lp, &map, 3, &[(1, 2), (1, 1)], 0.6);
        // Fractional swap on (0,0)-(0,1) at time 1.
        add(&mut lp, &map, 4, &[(1, 0), (0, 0), (0, 1)], 0.6);
        add(&mut lp, &map, 5, &[(0, 2), (0, 1), (0, 0)], 0.6);

        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(false));
        assert_eq!(
            handler.separate(&mut lp, None).unwrap(),
            SeparationResult::Cutoff
        );
        assert_eq!(handler.stats().cuts_created, 3);
        assert_eq!(handler.stats().cutoffs, 1);

        // Cuts are created in ascending (time, edge) order.
        let keys: Vec<(Time, Edge)> = handler
            .conflicts()
            .iter()
            .map(|conflict| (conflict.t, conflict.edges.moves[0]))
            .collect();
        assert_eq!(
            keys,
            vec![
                (0, Edge::new(map.get_id(0, 0), Direction::East)),
                (0, Edge::new(map.get_id(1, 1), Direction::East)),
                (1, Edge::new(map.get_id(0, 0), Direction::East)),
            ]
        );
        let names: Vec<&str> = handler
            .conflicts()
            .iter()
            .map(|conflict| lp.row(conflict.row).name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "edge_conflict((0,0),(0,1),0)",
                "edge_conflict((1,1),(1,2),0)",
                "edge_conflict((0,0),(0,1),1)",
            ]
        );
    }

    #[test]
    fn test_lifecycle() {
        let map = Map::parse(OPEN_MAP).unwrap();
        let mut lp = swap_instance(&map, 0.6);
        let mut handler = EdgeConflictsHandler::new(&map, ConflictSettings::with_wait_edges(false));

        let child = handler.clone_for_subtree().unwrap();
        assert_eq!(child.state(), StoreState::Empty);

        handler.separate(&mut lp, None).unwrap();
        assert!(handler.clone_for_subtree().is_err());

        assert_eq!(handler.release(&mut lp).unwrap(), 1);
        assert_eq!(handler.state(), StoreState::Released);
        assert!(lp.rows().iter().all(|row| row.released));

        assert!(handler.separate(&mut lp, None).is_err());
        assert!(handler.add_variable(&mut lp, 0).is_err());
        assert!(handler.release(&mut lp).is_err());
    }
}
