//! AirSim Shared Protocol Types
//!
//! This crate provides the wire types and msgpack-rpc codec shared by the
//! multi-agent client and the scripted simulator endpoint.

pub mod codec;
pub mod types;

// Re-export commonly used types at crate root
pub use types::*;
pub use serde_bytes::ByteBuf;

/// Default simulator endpoints for `"SimMode": "Both"`
pub mod ports {
    /// Multirotor RPC server port
    pub const MULTIROTOR: u16 = 41451;

    /// Car RPC server port
    pub const CAR: u16 = 41452;
}

/// API version negotiation constants
pub mod version {
    /// Version of the client API implemented by this crate
    pub const CLIENT_VERSION: i32 = 1;

    /// Oldest server version this client can talk to
    pub const MIN_REQUIRED_SERVER_VERSION: i32 = 1;
}

/// RPC method names understood by the simulator
pub mod method {
    pub const PING: &str = "ping";
    pub const GET_SERVER_VERSION: &str = "getServerVersion";
    pub const GET_MIN_REQUIRED_CLIENT_VERSION: &str = "getMinRequiredClientVersion";
    pub const ENABLE_API_CONTROL: &str = "enableApiControl";
    pub const IS_API_CONTROL_ENABLED: &str = "isApiControlEnabled";
    pub const ARM_DISARM: &str = "armDisarm";
    pub const RESET: &str = "reset";
    pub const SIM_GET_IMAGES: &str = "simGetImages";
    pub const TAKEOFF: &str = "takeoff";
    pub const LAND: &str = "land";
    pub const HOVER: &str = "hover";
    pub const MOVE_TO_POSITION: &str = "moveToPosition";
    pub const GET_MULTIROTOR_STATE: &str = "getMultirotorState";
    pub const GET_CAR_STATE: &str = "getCarState";
    pub const SET_CAR_CONTROLS: &str = "setCarControls";
}
