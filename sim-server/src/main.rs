use airsim_shared::ports;
use clap::Parser;
use sim_server::{ServerConfig, Simulator, World};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Scripted multirotor + car simulator endpoints
#[derive(Debug, Parser)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = ports::MULTIROTOR)]
    drone_port: u16,
    #[arg(long, default_value_t = ports::CAR)]
    car_port: u16,
    #[arg(long, default_value = "Drone1")]
    drone: String,
    #[arg(long, default_value = "Car1")]
    car: String,
    /// Simulated take-off duration in milliseconds
    #[arg(long, default_value_t = 2000)]
    takeoff_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig {
        takeoff_delay: Duration::from_millis(cli.takeoff_ms),
        ..Default::default()
    };

    let sim = Simulator::start(
        &cli.host,
        cli.drone_port,
        cli.car_port,
        World::both(&cli.drone, &cli.car),
        config,
    )
    .await?;

    info!(
        "Simulating {} on {} and {} on {}",
        cli.drone,
        sim.multirotor.local_addr(),
        cli.car,
        sim.car.local_addr()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
