use std::path::PathBuf;

use anyhow::Context as _;
use btleplug::api::Manager as _;
use btleplug::platform::Manager as BtManager;
use clap::Parser;
use log::{debug, info};

mod client;
mod config;
mod error;
mod form;
mod ibeacon;
mod listener;
mod manager;
mod messages;
mod permission;
mod prompt;
mod scanner;
mod selector;

use manager::{Manager, Outcome};

/// Register a nearby iBeacon with the beacon devices API
#[derive(Parser, Debug)]
#[command(name = "beacon-enroll", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Beacon alias; prompts interactively when omitted
    #[arg(long, requires = "distance")]
    alias: Option<String>,

    /// Alert distance in meters
    #[arg(long, requires = "alias")]
    distance: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let config_contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let config: config::AppConfig = toml::de::from_str(&config_contents)
        .with_context(|| format!("parsing {}", args.config.display()))?;
    let scan = config.scan();

    info!(
        "API {} region {} acceptance distance {}m",
        config.api.base_url,
        scan.region().id,
        scan.acceptance_distance()
    );

    let api = client::HttpRegistrationClient::new(&config.api)?;

    let bt_manager = BtManager::new().await?;

    // get the first bluetooth adapter
    let adapters = bt_manager.adapters().await?;
    let central = adapters
        .into_iter()
        .next()
        .context("no Bluetooth adapter found")?;

    let ranger = scanner::BleRanger::new(central, scan.batch_interval());
    let mut core = Manager::new(ranger, api, &scan);

    let outcome = match (args.alias, args.distance) {
        (Some(alias), Some(distance)) => {
            let mut form = prompt::ArgsForm::new(alias, distance);
            tokio::select! {
                outcome = core.run(&mut form) => outcome,
                _ = tokio::signal::ctrl_c() => Outcome::WentBack,
            }
        }
        _ => {
            let mut form = prompt::PromptForm::new();
            tokio::select! {
                outcome = core.run(&mut form) => outcome,
                _ = tokio::signal::ctrl_c() => Outcome::WentBack,
            }
        }
    };

    debug!(
        "Final state {:?}, listener active: {}",
        core.state(),
        core.listener_active()
    );

    match outcome {
        Outcome::Registered(_) => {
            println!("Beacon registered");
            Ok(())
        }
        Outcome::WentBack => {
            core.go_back();
            anyhow::bail!("registration cancelled")
        }
        Outcome::Failed(err) => {
            core.go_back();
            Err(anyhow::Error::new(err).context("registration failed"))
        }
    }
}
