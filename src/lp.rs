use anyhow::{anyhow, bail, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::common::{Path, PathVariable, VarId};

/// Explicit primal solution. Variables without an entry are zero.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    values: HashMap<VarId, f64>,
}

impl Solution {
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(&var).copied().unwrap_or(0.0)
    }
}

impl FromIterator<(VarId, f64)> for Solution {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Solution {
            values: iter.into_iter().collect(),
        }
    }
}

/// Services the relaxation host offers to the conflict handler.
///
/// Rows are opaque handles: the handler only ever installs them, appends unit
/// coefficients for new columns, and hands each one back exactly once.
pub trait LpHost {
    type Row;

    fn variables(&self) -> &[PathVariable];

    fn variable(&self, id: VarId) -> Option<&PathVariable>;

    /// Value of `var` in `sol`, or in the current relaxation when `sol` is
    /// `None`.
    fn solution_value(&self, sol: Option<&Solution>, var: VarId) -> f64;

    /// Add `sum(columns) <= rhs` to the relaxation. The flag is `false` when
    /// the row proves the current node infeasible.
    fn install_row(&mut self, name: &str, columns: &[VarId], rhs: f64) -> Result<(Self::Row, bool)>;

    fn add_coefficient(&mut self, row: &Self::Row, var: VarId, coefficient: f64) -> Result<()>;

    fn release_row(&mut self, row: Self::Row) -> Result<()>;

    /// Forbid rounding `var` up without consulting the handler.
    fn lock_variable(&mut self, var: VarId) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub usize);

#[derive(Debug, Clone)]
pub struct LpRow {
    pub name: String,
    pub coefficients: BTreeMap<VarId, f64>,
    pub rhs: f64,
    pub released: bool,
}

impl LpRow {
    pub fn activity(&self, value: impl Fn(VarId) -> f64) -> f64 {
        self.coefficients
            .iter()
            .map(|(&var, &coefficient)| coefficient * value(var))
            .sum()
    }
}

/// In-memory relaxation with local lower bounds.
#[derive(Debug, Clone)]
pub struct MemoryLp {
    variables: Vec<PathVariable>,
    lp_values: Vec<f64>,
    lower_bounds: Vec<f64>,
    up_locks: Vec<usize>,
    rows: Vec<LpRow>,
    feastol: f64,
}

impl Default for MemoryLp {
    fn default() -> Self {
        MemoryLp::new(1e-6)
    }
}

impl MemoryLp {
    pub fn new(feastol: f64) -> Self {
        MemoryLp {
            variables: Vec::new(),
            lp_values: Vec::new(),
            lower_bounds: Vec::new(),
            up_locks: Vec::new(),
            rows: Vec::new(),
            feastol,
        }
    }

    // Ids are dense and never reused.
    pub fn add_column(&mut self, agent: usize, path: Path, value: f64) -> VarId {
        let id = self.variables.len();
        self.variables.push(PathVariable { id, agent, path });
        self.lp_values.push(value);
        self.lower_bounds.push(0.0);
        self.up_locks.push(0);
        id
    }

    pub fn set_value(&mut self, var: VarId, value: f64) {
        self.lp_values[var] = value;
    }

    // e.g. after branching a column to one
    pub fn set_lower_bound(&mut self, var: VarId, lower_bound: f64) {
        self.lower_bounds[var] = lower_bound;
    }

    pub fn up_locks(&self, var: VarId) -> usize {
        self.up_locks[var]
    }

    pub fn rows(&self) -> &[LpRow] {
        &self.rows
    }

    pub fn row(&self, row: RowId) -> &LpRow {
        &self.rows[row.0]
    }

    pub fn row_activity(&self, row: RowId) -> f64 {
        self.rows[row.0].activity(|var| self.lp_values[var])
    }

    fn check_var(&self, var: VarId) -> Result<()> {
        if var >= self.variables.len() {
            bail!("unknown variable {var}");
        }
        Ok(())
    }
}

impl LpHost for MemoryLp {
    type Row = RowId;

    fn variables(&self) -> &[PathVariable] {
        &self.variables
    }

    fn variable(&self, id: VarId) -> Option<&PathVariable> {
        self.variables.get(id)
    }

    fn solution_value(&self, sol: Option<&Solution>, var: VarId) -> f64 {
        match sol {
            Some(sol) => sol.value(var),
            None => self.lp_values.get(var).copied().unwrap_or(0.0),
        }
    }

    fn install_row(&mut self, name: &str, columns: &[VarId], rhs: f64) -> Result<(RowId, bool)> {
        let mut coefficients = BTreeMap::new();
        for &var in columns {
            self.check_var(var)?;
            *coefficients.entry(var).or_insert(0.0) += 1.0;
        }
        let row = LpRow {
            name: name.to_string(),
            coefficients,
            rhs,
            released: false,
        };

        // Nonnegative columns: the row is infeasible iff its minimum activity
        // already exceeds the right-hand side.
        let min_activity = row.activity(|var| self.lower_bounds[var]);
        let feasible = min_activity <= rhs + self.feastol;
        debug!("install row {name} with {} columns, feasible {feasible}", columns.len());

        self.rows.push(row);
        Ok((RowId(self.rows.len() - 1), feasible))
    }

    fn add_coefficient(&mut self, row: &RowId, var: VarId, coefficient: f64) -> Result<()> {
        self.check_var(var)?;
        let lp_row = self
            .rows
            .get_mut(row.0)
            .ok_or_else(|| anyhow!("unknown row {}", row.0))?;
        if lp_row.released {
            bail!("row {} was already released", lp_row.name);
        }
        *lp_row.coefficients.entry(var).or_insert(0.0) += coefficient;
        Ok(())
    }

    fn release_row(&mut self, row: RowId) -> Result<()> {
        let lp_row = self
            .rows
            .get_mut(row.0)
            .ok_or_else(|| anyhow!("unknown row {}", row.0))?;
        if lp_row.released {
            bail!("row {} released twice", lp_row.name);
        }
        lp_row.released = true;
        Ok(())
    }

    fn lock_variable(&mut self, var: VarId) -> Result<()> {
        self.check_var(var)?;
        self.up_locks[var] += 1;
        Ok(())
    }
}
