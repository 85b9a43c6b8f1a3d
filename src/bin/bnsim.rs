//! Headless simulator: load a net, inject tokens, run, print the log
//! and the final distribution.

use anyhow::{Context, Result, anyhow};

use bnet_sim::net::ids::PlaceRef;
use bnet_sim::net::io::{self, NetConfig, PlaceSchema};
use bnet_sim::options::Options;
use bnet_sim::sim::{StepController, describe_distribution};

/// Default firing bound when `--steps` is omitted; a cyclic net never
/// quiesces on its own.
const MAX_RUN_STEPS: u64 = 1_000_000;

fn main() -> Result<()> {
    env_logger::init();

    let options = Options::parse_from_args(std::env::args()).map_err(|err| anyhow!("{err}"))?;

    let config: NetConfig = io::read_json(&options.config)
        .with_context(|| format!("Failed to load net configuration: {}", options.config))?;
    let schema = match &options.schema {
        Some(path) => io::read_json(path)
            .with_context(|| format!("Failed to load place schema: {path}"))?,
        None => PlaceSchema::default(),
    };

    let mut controller = StepController::from_config_with_seed(&config, &schema, options.seed)?;
    controller.net().log_diagnostics();

    for place in &options.inject {
        controller.inject_token(PlaceRef::parse(place), Vec::new());
    }

    let limit = options.steps.unwrap_or(MAX_RUN_STEPS);
    let fired = controller.run_to_quiescence(limit);
    if options.steps.is_none() && fired == limit {
        log::warn!("stopped after {limit} steps without reaching quiescence");
    }
    log::info!("fired {fired} transitions");

    for entry in controller.store().log() {
        println!("[{}] {}", entry.kind, entry.message);
    }
    println!("{}", describe_distribution(controller.store()));

    if let Some(path) = &options.output {
        let report = serde_json::json!({
            "transitionsFired": fired,
            "distribution": controller.distribution(),
            "log": controller.store().log(),
        });
        io::write_json(path, &report)
            .with_context(|| format!("Failed to write report: {path}"))?;
    }

    Ok(())
}
