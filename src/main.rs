mod cli;
mod config;
mod console;
mod imaging;
mod pending;
mod rpc;
mod scenario;
mod session;
mod settings;
mod transport;
mod vehicle;

use clap::Parser;
use cli::Cli;
use config::DemoConfig;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    if cli.print_settings {
        let settings = settings::recommended(&cli.drone, &cli.car);
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let config = DemoConfig::from(&cli);
    info!(
        "Starting multi-agent demo: {} at {}, {} at {}",
        config.drone,
        config.drone_address(),
        config.car,
        config.car_address()
    );

    match scenario::run(&config).await {
        Ok(saved) => {
            info!("Demo complete, {} images written", saved.len());
            Ok(())
        }
        Err(e) => {
            error!("Demo failed: {:#}", e);
            Err(e)
        }
    }
}
