//! WebSocket execution server binary.

use anyhow::{Context, Result, anyhow};

use bnet_sim::config::SimSettings;
use bnet_sim::net::io::{self, NetConfig, PlaceSchema};
use bnet_sim::options::WebOptions;
use bnet_sim::runtime::server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let options = WebOptions::parse_from_args(std::env::args()).map_err(|err| anyhow!("{err}"))?;

    let settings = SimSettings::load_from_file(&options.settings)?;
    let config: NetConfig = io::read_json(&options.config)
        .with_context(|| format!("Failed to load net configuration: {}", options.config))?;
    let schema = match &options.schema {
        Some(path) => io::read_json(path)
            .with_context(|| format!("Failed to load place schema: {path}"))?,
        None => PlaceSchema::default(),
    };

    server::serve(config, &schema, &settings).await
}
