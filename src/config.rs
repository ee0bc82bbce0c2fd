use anyhow::anyhow;
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug, Default)]
#[command(
    name = "MAPF edge conflicts",
    about = "Edge-conflict checking and cut separation for branch-and-cut-and-price MAPF.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the map file")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to the YAML instance of path columns")]
    pub instance_path: Option<String>,

    #[arg(long, help = "Path to the JSON cut report")]
    pub output_path: Option<String>,

    #[arg(long, help = "Number of agents for random instances")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Columns generated per agent for random instances")]
    pub columns_per_agent: Option<usize>,

    #[arg(long, help = "Maximum path length for random instances")]
    pub max_path_length: Option<usize>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<usize>,

    #[arg(long, help = "Let waiting agents take part in edge conflicts")]
    pub wait_edges: Option<bool>,

    #[arg(long, help = "Tolerance for a column value to count as positive")]
    pub positive_tolerance: Option<f64>,

    #[arg(long, help = "Tolerance for an edge usage to count as exceeding one")]
    pub violation_tolerance: Option<f64>,
}

/// Settings read by the edge-conflict handler itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictSettings {
    pub wait_edges_enabled: bool,
    pub positive_tolerance: f64,
    pub violation_tolerance: f64,
}

impl Default for ConflictSettings {
    fn default() -> Self {
        ConflictSettings {
            wait_edges_enabled: cfg!(feature = "waitedge-conflicts"),
            positive_tolerance: 1e-9,
            violation_tolerance: 1e-9,
        }
    }
}

impl ConflictSettings {
    pub fn with_wait_edges(wait_edges_enabled: bool) -> Self {
        ConflictSettings {
            wait_edges_enabled,
            ..Default::default()
        }
    }

    pub fn is_positive(&self, value: f64) -> bool {
        value > self.positive_tolerance
    }

    /// `lhs > rhs` beyond the violation tolerance.
    pub fn is_greater(&self, lhs: f64, rhs: f64) -> bool {
        lhs - rhs > self.violation_tolerance
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map_path: String,
    pub instance_path: Option<String>,
    pub output_path: Option<String>,
    pub num_agents: usize,
    pub columns_per_agent: usize,
    pub max_path_length: usize,
    pub seed: usize,
    pub wait_edges_enabled: bool,
    pub positive_tolerance: f64,
    pub violation_tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        let settings = ConflictSettings::default();
        Config {
            map_path: "map_file/test/test.map".to_string(),
            instance_path: None,
            output_path: None,
            num_agents: 4,
            columns_per_agent: 3,
            max_path_length: 8,
            seed: 0,
            wait_edges_enabled: settings.wait_edges_enabled,
            positive_tolerance: settings.positive_tolerance,
            violation_tolerance: settings.violation_tolerance,
        }
    }
}

impl Config {
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = map_path.clone();
        }
        if cli.instance_path.is_some() {
            self.instance_path = cli.instance_path.clone();
        }
        if cli.output_path.is_some() {
            self.output_path = cli.output_path.clone();
        }
        if let Some(num_agents) = cli.num_agents {
            self.num_agents = num_agents;
        }
        if let Some(columns_per_agent) = cli.columns_per_agent {
            self.columns_per_agent = columns_per_agent;
        }
        if let Some(max_path_length) = cli.max_path_length {
            self.max_path_length = max_path_length;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(wait_edges) = cli.wait_edges {
            self.wait_edges_enabled = wait_edges;
        }
        if let Some(tolerance) = cli.positive_tolerance {
            self.positive_tolerance = tolerance;
        }
        if let Some(tolerance) = cli.violation_tolerance {
            self.violation_tolerance = tolerance;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.map_path.is_empty() {
            return Err(anyhow!("Map path must not be empty"));
        }

        for (name, tolerance) in [
            ("Positive", self.positive_tolerance),
            ("Violation", self.violation_tolerance),
        ] {
            if !tolerance.is_finite() || !(0.0..1.0).contains(&tolerance) {
                return Err(anyhow!(
                    "{name} tolerance must be in [0, 1), got {}",
                    tolerance
                ));
            }
        }

        if self.instance_path.is_none() {
            if self.columns_per_agent == 0 {
                return Err(anyhow!("Random instances need at least one column per agent"));
            }
            if self.max_path_length == 0 {
                return Err(anyhow!("Random instances need a positive maximum path length"));
            }
        }
        Ok(())
    }

    pub fn conflict_settings(&self) -> ConflictSettings {
        ConflictSettings {
            wait_edges_enabled: self.wait_edges_enabled,
            positive_tolerance: self.positive_tolerance,
            violation_tolerance: self.violation_tolerance,
        }
    }
}
