use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};

use crate::edge_conflicts::EdgeConflict;
use crate::lp::{MemoryLp, RowId};
use crate::map::{EdgeGraph, Map};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutReport {
    pub name: String,
    pub time: usize,
    pub from: (usize, usize),
    pub to: (usize, usize),
    pub wait: Option<(usize, usize)>,
    pub lhs_at_creation: f64,
    pub activity: f64,
    pub columns: Vec<usize>,
}

impl CutReport {
    pub fn new(conflict: &EdgeConflict<RowId>, map: &Map, lp: &MemoryLp) -> Self {
        let edge = conflict.edges.moves[0];
        let row = lp.row(conflict.row);
        CutReport {
            name: row.name.clone(),
            time: conflict.t,
            from: map.position(edge.n),
            to: map.destination_position(edge),
            wait: conflict.edges.wait.map(|wait| map.position(wait.n)),
            lhs_at_creation: conflict.lhs,
            activity: lp.row_activity(conflict.row),
            columns: row.coefficients.keys().copied().collect(),
        }
    }
}

pub fn collect(conflicts: &[EdgeConflict<RowId>], map: &Map, lp: &MemoryLp) -> Vec<CutReport> {
    conflicts
        .iter()
        .map(|conflict| CutReport::new(conflict, map, lp))
        .collect()
}

pub fn write_json(path: &str, reports: &[CutReport]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("error creating report: {path}"))?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, reports)?;
    writer.write_all(b"\n")?;
    Ok(())
}
