use anyhow::{bail, Result};
use std::collections::HashSet;
use tracing::debug;

use super::separate::ConflictEdges;
use crate::common::{EdgeTime, Path, Time};
use crate::lp::LpHost;

/// A cut installed in the relaxation: at time `t`, at most one unit of flow
/// over the edges in `edges`.
#[derive(Debug, Clone)]
pub struct EdgeConflict<R> {
    pub row: R,
    pub edges: ConflictEdges,
    pub t: Time,
    pub lhs: f64,
}

impl<R> EdgeConflict<R> {
    pub fn key(&self) -> EdgeTime {
        EdgeTime::new(self.edges.moves[0], self.t)
    }

    pub fn covers(&self, path: &Path) -> bool {
        self.edges.covers(self.t, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Populated,
    Released,
}

/// Cuts generated for one search-tree node lineage, in creation order.
#[derive(Debug)]
pub struct EdgeConflictStore<R> {
    conflicts: Vec<EdgeConflict<R>>,
    keys: HashSet<EdgeTime>,
    released: bool,
}

impl<R> Default for EdgeConflictStore<R> {
    fn default() -> Self {
        EdgeConflictStore {
            conflicts: Vec::new(),
            keys: HashSet::new(),
            released: false,
        }
    }
}

impl<R> EdgeConflictStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StoreState {
        if self.released {
            StoreState::Released
        } else if self.conflicts.is_empty() {
            StoreState::Empty
        } else {
            StoreState::Populated
        }
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.released {
            bail!("edge conflict store used after release");
        }
        Ok(())
    }

    pub fn contains(&self, key: &EdgeTime) -> bool {
        self.keys.contains(key)
    }

    pub fn push(&mut self, conflict: EdgeConflict<R>) -> Result<()> {
        self.ensure_active()?;
        let key = conflict.key();
        if !self.keys.insert(key) {
            bail!(
                "edge conflict on {} at time {} already exists",
                key.edge,
                key.t
            );
        }
        self.conflicts.push(conflict);
        Ok(())
    }

    pub fn conflicts(&self) -> &[EdgeConflict<R>] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Fresh store for a copied or transformed node. Only an empty store may
    /// be copied; anything else means the host ran transformation out of
    /// order.
    pub fn clone_for_subtree(&self) -> Result<Self> {
        match self.state() {
            StoreState::Empty => Ok(Self::new()),
            StoreState::Populated => {
                bail!("edge conflicts exist in original problem before transformation")
            }
            StoreState::Released => bail!("cannot copy a released edge conflict store"),
        }
    }

    /// Hand every row back to the host and close the store. Returns the
    /// number of rows released.
    pub fn release<H>(&mut self, host: &mut H) -> Result<usize>
    where
        H: LpHost<Row = R>,
    {
        self.ensure_active()?;
        self.released = true;
        self.keys.clear();

        let count = self.conflicts.len();
        for conflict in self.conflicts.drain(..) {
            host.release_row(conflict.row)?;
        }
        debug!("released {count} edge conflict rows");
        Ok(count)
    }
}
