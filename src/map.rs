use anyhow::{anyhow, bail, Context, Result};
use std::fs;

use crate::common::{Direction, Edge, Node, Path};

/// Graph queries the conflict handler needs from the map.
pub trait EdgeGraph {
    /// Node reached by traversing `e`. A wait edge stays on its node.
    fn destination(&self, e: Edge) -> Node;

    /// Grid coordinates of `n`, used for naming and reporting only.
    fn position(&self, n: Node) -> (usize, usize);

    fn destination_position(&self, e: Edge) -> (usize, usize) {
        self.position(self.destination(e))
    }

    fn opposite_edge(&self, e: Edge) -> Edge {
        Edge::new(self.destination(e), e.d.reverse())
    }

    /// Canonical orientation of the undirected edge underlying `e`: the one
    /// leaving the lower node id. `e` and its opposite map to the same edge.
    fn undirected_edge(&self, e: Edge) -> Edge {
        let opposite = self.opposite_edge(e);
        if e.n <= opposite.n {
            e
        } else {
            opposite
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    pub neighbors: Vec<Direction>, // Moves leading to passable tiles
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
}

impl Map {
    pub fn from_file(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("error reading map file: {path}"))?;
        Self::parse(&content).with_context(|| format!("error parsing map file: {path}"))
    }

    /// Parse the MovingAI grid format: `type`, `height`, `width` and `map`
    /// header lines followed by `height` rows where `.` is passable.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines();

        let _type = lines.next().ok_or_else(|| anyhow!("missing type line"))?;
        let height = parse_header(lines.next(), "height")?;
        let width = parse_header(lines.next(), "width")?;
        let _map = lines.next().ok_or_else(|| anyhow!("missing map line"))?;

        let mut grid = Vec::with_capacity(height);
        for line in lines.take(height) {
            let tiles_row: Vec<Tile> = line
                .chars()
                .take(width)
                .map(|ch| Tile {
                    passable: ch == '.',
                    neighbors: Vec::new(),
                })
                .collect();
            if tiles_row.len() != width {
                bail!("map row {} has {} tiles, expected {width}", grid.len(), tiles_row.len());
            }
            grid.push(tiles_row);
        }
        if grid.len() != height {
            bail!("map has {} rows, expected {height}", grid.len());
        }

        let mut map = Map {
            height,
            width,
            grid,
        };
        map.initialize_neighbors();
        Ok(map)
    }

    fn initialize_neighbors(&mut self) {
        for x in 0..self.height {
            for y in 0..self.width {
                if self.grid[x][y].passable {
                    self.grid[x][y].neighbors = self.get_neighbors(x, y);
                }
            }
        }
    }

    pub fn get_neighbors(&self, x: usize, y: usize) -> Vec<Direction> {
        Direction::MOVES
            .into_iter()
            .filter(|&d| self.step(x, y, d).is_some())
            .collect()
    }

    /// Cell reached from `(x, y)` by one move in direction `d`, if passable.
    pub fn step(&self, x: usize, y: usize, d: Direction) -> Option<(usize, usize)> {
        let (dx, dy) = d.offset();
        let new_x = x as isize + dx;
        let new_y = y as isize + dy;
        if new_x >= 0
            && new_y >= 0
            && new_x < self.height as isize
            && new_y < self.width as isize
            && self.grid[new_x as usize][new_y as usize].passable
        {
            Some((new_x as usize, new_y as usize))
        } else {
            None
        }
    }

    pub fn is_passable(&self, x: usize, y: usize) -> bool {
        x < self.height && y < self.width && self.grid[x][y].is_passable()
    }

    pub fn get_id(&self, x: usize, y: usize) -> Node {
        x * self.width + y
    }

    pub fn get_xy(&self, n: Node) -> (usize, usize) {
        (n / self.width, n % self.width)
    }

    pub fn passable_cells(&self) -> Vec<(usize, usize)> {
        (0..self.height)
            .flat_map(|x| (0..self.width).map(move |y| (x, y)))
            .filter(|&(x, y)| self.grid[x][y].passable)
            .collect()
    }

    /// Convert a sequence of visited cells into a path. Consecutive cells
    /// must be equal (wait) or grid neighbours.
    pub fn path_from_positions(&self, positions: &[(usize, usize)]) -> Result<Path> {
        let mut edges = Vec::with_capacity(positions.len());
        for (step, window) in positions.windows(2).enumerate() {
            let (from, to) = (window[0], window[1]);
            if !self.is_passable(from.0, from.1) {
                bail!("position {from:?} at step {step} is blocked");
            }
            let direction = if from == to {
                Direction::Wait
            } else {
                Direction::MOVES
                    .into_iter()
                    .find(|&d| self.step(from.0, from.1, d) == Some(to))
                    .ok_or_else(|| anyhow!("no move from {from:?} to {to:?} at step {step}"))?
            };
            edges.push(Edge::new(self.get_id(from.0, from.1), direction));
        }

        let &last = positions
            .last()
            .ok_or_else(|| anyhow!("path has no positions"))?;
        if !self.is_passable(last.0, last.1) {
            bail!("final position {last:?} is blocked");
        }
        edges.push(Edge::wait(self.get_id(last.0, last.1)));

        Path::new(edges).ok_or_else(|| anyhow!("path has no positions"))
    }
}

impl EdgeGraph for Map {
    fn destination(&self, e: Edge) -> Node {
        let (dx, dy) = e.d.offset();
        let (x, y) = self.get_xy(e.n);
        self.get_id(
            (x as isize + dx) as usize,
            (y as isize + dy) as usize,
        )
    }

    fn position(&self, n: Node) -> (usize, usize) {
        self.get_xy(n)
    }
}

fn parse_header(line: Option<&str>, key: &str) -> Result<usize> {
    let line = line.ok_or_else(|| anyhow!("missing {key} line"))?;
    let mut parts = line.split_whitespace();
    if parts.next() != Some(key) {
        bail!("expected {key} line, got {line:?}");
    }
    parts
        .next()
        .ok_or_else(|| anyhow!("missing {key} value"))?
        .parse::<usize>()
        .with_context(|| format!("invalid {key} value in {line:?}"))
}
