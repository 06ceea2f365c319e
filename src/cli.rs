use airsim_shared::ports;
use clap::Parser;
use std::path::PathBuf;

/// Fly a drone and drive a car in one simulator, then save their camera images
#[derive(Debug, Parser, Clone)]
#[command(version)]
pub struct Cli {
    /// Simulator API server address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Multirotor API server port
    #[arg(long, default_value_t = ports::MULTIROTOR)]
    pub drone_port: u16,

    /// Car API server port
    #[arg(long, default_value_t = ports::CAR)]
    pub car_port: u16,

    /// Multirotor vehicle name from settings.json
    #[arg(long, default_value = "Drone1")]
    pub drone: String,

    /// Car vehicle name from settings.json
    #[arg(long, default_value = "Car1")]
    pub car: String,

    /// Where captures are written [default: <tmp>/airsim_drone]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not wait for a key press before capturing and resetting
    #[arg(long)]
    pub no_prompt: bool,

    /// Move the drone and drive the car forward before capturing
    #[arg(long)]
    pub maneuver: bool,

    /// Land the drone before disarming
    #[arg(long)]
    pub land: bool,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub connect_timeout: u64,

    /// Print the simulator settings.json this demo expects and exit
    #[arg(long)]
    pub print_settings: bool,
}
