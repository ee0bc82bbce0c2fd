use std::fmt;

/// Location id in the underlying graph.
pub type Node = usize;

/// Time step index.
pub type Time = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    West,
    East,
    Wait,
}

impl Direction {
    pub const MOVES: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    pub fn reverse(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
            Direction::Wait => Direction::Wait,
        }
    }

    /// Row/column offset of one step in this direction.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
            Direction::East => (0, 1),
            Direction::Wait => (0, 0),
        }
    }

    pub fn is_wait(self) -> bool {
        self == Direction::Wait
    }
}

/// A directed traversal out of `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub n: Node,
    pub d: Direction,
}

impl Edge {
    pub fn new(n: Node, d: Direction) -> Self {
        Edge { n, d }
    }

    pub fn wait(n: Node) -> Self {
        Edge {
            n,
            d: Direction::Wait,
        }
    }

    pub fn is_wait(&self) -> bool {
        self.d.is_wait()
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.n, self.d)
    }
}

/// Aggregation key. For move usage `edge` must already be the canonical
/// undirected orientation (see `EdgeGraph::undirected_edge`), so an edge and
/// its opposite land on the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeTime {
    pub t: Time,
    pub edge: Edge,
}

impl EdgeTime {
    pub fn new(edge: Edge, t: Time) -> Self {
        EdgeTime { t, edge }
    }

    pub fn wait(n: Node, t: Time) -> Self {
        EdgeTime {
            t,
            edge: Edge::wait(n),
        }
    }
}
