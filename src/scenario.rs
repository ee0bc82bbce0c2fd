use anyhow::{bail, Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use tracing::info;

use crate::common::VarId;
use crate::lp::MemoryLp;
use crate::map::Map;

/// One path column as written in an instance file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub agent: usize,
    pub value: f64,
    #[serde(default)]
    pub lower_bound: f64,
    pub path: Vec<[usize; 2]>,
}

impl Column {
    pub fn positions(&self) -> Vec<(usize, usize)> {
        self.path.iter().map(|&[x, y]| (x, y)).collect()
    }
}

/// Columns of a master problem at one resolve, plus the columns a later
/// pricing round produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub map: Option<String>,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub priced_columns: Vec<Column>,
}

impl Instance {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("error opening instance: {path}"))?;
        let reader = BufReader::new(file);
        let instance = serde_yaml::from_reader(reader)
            .with_context(|| format!("error parsing instance: {path}"))?;
        Ok(instance)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Random walks on `map`: `columns_per_agent` columns for each agent, all
    /// starting from the agent's start cell, with values forming a convex
    /// combination per agent. One extra walk per agent goes to
    /// `priced_columns`.
    pub fn generate_randomly<R: Rng + ?Sized>(
        map: &Map,
        num_agents: usize,
        columns_per_agent: usize,
        max_path_length: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if max_path_length == 0 {
            bail!("Maximum path length must be positive");
        }
        let mut cells = map.passable_cells();
        if cells.len() < num_agents {
            bail!(
                "Not enough passable cells ({}) for {num_agents} agents",
                cells.len()
            );
        }
        cells.shuffle(rng);

        let mut instance = Instance::default();
        for (agent, &start) in cells.iter().take(num_agents).enumerate() {
            let weights: Vec<f64> = (0..columns_per_agent).map(|_| rng.gen_range(0.1..1.0)).collect();
            let total: f64 = weights.iter().sum();

            for weight in weights {
                instance.columns.push(Column {
                    agent,
                    value: weight / total,
                    lower_bound: 0.0,
                    path: random_walk(map, start, max_path_length, rng),
                });
            }
            instance.priced_columns.push(Column {
                agent,
                value: 0.0,
                lower_bound: 0.0,
                path: random_walk(map, start, max_path_length, rng),
            });
        }

        info!(
            "Generate instance: {} columns, {} priced columns",
            instance.columns.len(),
            instance.priced_columns.len()
        );
        Ok(instance)
    }

    /// Register `columns` in `lp`, returning their ids in order.
    pub fn add_columns(map: &Map, columns: &[Column], lp: &mut MemoryLp) -> Result<Vec<VarId>> {
        columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let path = map
                    .path_from_positions(&column.positions())
                    .with_context(|| format!("invalid path of column {index}"))?;
                let id = lp.add_column(column.agent, path, column.value);
                lp.set_lower_bound(id, column.lower_bound);
                Ok(id)
            })
            .collect()
    }
}

fn random_walk<R: Rng + ?Sized>(
    map: &Map,
    start: (usize, usize),
    max_path_length: usize,
    rng: &mut R,
) -> Vec<[usize; 2]> {
    let length = rng.gen_range(1..=max_path_length);
    let mut current = start;
    let mut path = vec![[current.0, current.1]];
    for _ in 1..length {
        let neighbors = &map.grid[current.0][current.1].neighbors;
        // Stay put with some probability, otherwise take a random move.
        if rng.gen_bool(0.8) {
            if let Some(&d) = neighbors.choose(rng) {
                current = map.step(current.0, current.1, d).unwrap_or(current);
            }
        }
        path.push([current.0, current.1]);
    }
    path
}
