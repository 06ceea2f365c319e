//! Typed API clients for the simulator's vehicle servers
//!
//! One client per API server. Calls common to every vehicle live on
//! [`VehicleClient`]; the multirotor and car clients add their own commands
//! and deref to it.

mod car;
mod client;
mod multirotor;

pub use car::CarClient;
pub use client::VehicleClient;
pub use multirotor::{MoveOptions, MultirotorClient, DEFAULT_LAND_TIMEOUT_SEC, DEFAULT_TAKEOFF_TIMEOUT_SEC};
