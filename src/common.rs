mod edge;
mod path;

pub use edge::{Direction, Edge, EdgeTime, Node, Time};
pub use path::{Path, PathVariable, VarId};
