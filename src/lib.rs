pub mod common;
pub mod config;
pub mod edge_conflicts;
pub mod lp;
pub mod map;
pub mod report;
pub mod scenario;
pub mod stat;
