use std::path::PathBuf;
use std::time::Duration;

use airsim_shared::ports;

use crate::cli::Cli;
use crate::rpc::RpcConfig;
use crate::vehicle::DEFAULT_TAKEOFF_TIMEOUT_SEC;

/// Name of the capture directory under the system temp dir
pub const OUTPUT_DIR_NAME: &str = "airsim_drone";

/// Configuration for one demo run
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Simulator host
    pub host: String,
    /// Multirotor API server port
    pub drone_port: u16,
    /// Car API server port
    pub car_port: u16,
    /// Multirotor vehicle name
    pub drone: String,
    /// Car vehicle name
    pub car: String,
    /// Capture directory
    pub output_dir: PathBuf,
    /// Gate capture and reset on a key press
    pub interactive: bool,
    /// Run the move/drive step before capturing
    pub maneuver: bool,
    /// Land the drone before disarming
    pub land: bool,
    /// Server-side take-off timeout in seconds
    pub takeoff_timeout_sec: f32,
    /// Pause after the maneuver
    pub maneuver_settle: Duration,
    /// RPC session settings
    pub rpc: RpcConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            drone_port: ports::MULTIROTOR,
            car_port: ports::CAR,
            drone: "Drone1".into(),
            car: "Car1".into(),
            output_dir: std::env::temp_dir().join(OUTPUT_DIR_NAME),
            interactive: true,
            maneuver: false,
            land: false,
            takeoff_timeout_sec: DEFAULT_TAKEOFF_TIMEOUT_SEC,
            maneuver_settle: Duration::from_secs(2),
            rpc: RpcConfig::default(),
        }
    }
}

impl DemoConfig {
    pub fn drone_address(&self) -> String {
        format!("{}:{}", self.host, self.drone_port)
    }

    pub fn car_address(&self) -> String {
        format!("{}:{}", self.host, self.car_port)
    }
}

impl From<&Cli> for DemoConfig {
    fn from(cli: &Cli) -> Self {
        let defaults = DemoConfig::default();
        Self {
            host: cli.host.clone(),
            drone_port: cli.drone_port,
            car_port: cli.car_port,
            drone: cli.drone.clone(),
            car: cli.car.clone(),
            output_dir: cli.output_dir.clone().unwrap_or(defaults.output_dir),
            interactive: !cli.no_prompt,
            maneuver: cli.maneuver,
            land: cli.land,
            rpc: RpcConfig {
                connect_timeout: Duration::from_secs(cli.connect_timeout),
                ..defaults.rpc
            },
            ..defaults
        }
    }
}
