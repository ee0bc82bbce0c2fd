use mapf_edge_conflicts::config::{Cli, Config};
use mapf_edge_conflicts::edge_conflicts::EdgeConflictsHandler;
use mapf_edge_conflicts::lp::MemoryLp;
use mapf_edge_conflicts::map::Map;
use mapf_edge_conflicts::report;
use mapf_edge_conflicts::scenario::Instance;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    };
    let config = config.override_from_command_line(&cli)?;

    let (map, instance) = match config.instance_path.as_deref() {
        Some(instance_path) => {
            let instance = Instance::load_from_file(instance_path)?;
            let map_path = instance.map.as_deref().unwrap_or(&config.map_path);
            (Map::from_file(map_path)?, instance)
        }
        None => {
            let map = Map::from_file(&config.map_path)?;
            let mut rng = StdRng::seed_from_u64(config.seed as u64);
            let instance = Instance::generate_randomly(
                &map,
                config.num_agents,
                config.columns_per_agent,
                config.max_path_length,
                &mut rng,
            )?;
            (map, instance)
        }
    };

    let mut lp = MemoryLp::default();
    Instance::add_columns(&map, &instance.columns, &mut lp)?;

    let mut handler = EdgeConflictsHandler::new(&map, config.conflict_settings());
    handler.lock_variables(&mut lp)?;

    let feasibility = handler.check(&lp, None);
    info!("Current solution is {feasibility:?}");

    let result = handler.separate(&mut lp, None)?;
    info!(
        "Separation {result:?}, {} edge conflict cuts",
        handler.conflicts().len()
    );

    let priced = Instance::add_columns(&map, &instance.priced_columns, &mut lp)?;
    for var in priced {
        handler.add_variable(&mut lp, var)?;
    }

    let reports = report::collect(handler.conflicts(), &map, &lp);
    for cut in &reports {
        info!(
            "{} lhs {:.4} activity {:.4} columns {:?}",
            cut.name, cut.lhs_at_creation, cut.activity, cut.columns
        );
    }
    if let Some(output_path) = config.output_path.as_ref() {
        report::write_json(output_path, &reports)?;
        info!("Wrote {} cuts to {output_path}", reports.len());
    }

    handler.stats().print();
    handler.release(&mut lp)?;

    Ok(())
}
