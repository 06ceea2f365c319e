//! Multirotor API client

use airsim_shared::{method, DrivetrainType, MultirotorState, YawMode};
use anyhow::Result;
use std::ops::Deref;

use super::client::VehicleClient;
use crate::pending::PendingCall;
use crate::rpc::{RpcConfig, RpcError};
use crate::transport::TransportConnector;

/// Server-side timeout for take-off, in seconds
pub const DEFAULT_TAKEOFF_TIMEOUT_SEC: f32 = 20.0;

/// Server-side timeout for landing, in seconds
pub const DEFAULT_LAND_TIMEOUT_SEC: f32 = 60.0;

/// Optional parameters of a position move
#[derive(Debug, Clone, Copy)]
pub struct MoveOptions {
    pub timeout_sec: f32,
    pub drivetrain: DrivetrainType,
    pub yaw_mode: YawMode,
    /// Negative lets the server pick
    pub lookahead: f32,
    pub adaptive_lookahead: f32,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            // Effectively no timeout
            timeout_sec: 3e38,
            drivetrain: DrivetrainType::MaxDegreeOfFreedom,
            yaw_mode: YawMode::default(),
            lookahead: -1.0,
            adaptive_lookahead: 1.0,
        }
    }
}

/// Client for the multirotor API server
pub struct MultirotorClient {
    inner: VehicleClient,
}

impl MultirotorClient {
    pub async fn connect<C: TransportConnector>(connector: &C, config: &RpcConfig) -> Result<Self> {
        Ok(Self {
            inner: VehicleClient::connect(connector, config).await?,
        })
    }

    /// Start a take-off; the returned handle must be joined before relying on altitude
    pub fn takeoff_async(&self, timeout_sec: f32, vehicle: &str) -> PendingCall<bool> {
        let rpc = self.inner.rpc().clone();
        let vehicle = vehicle.to_string();
        PendingCall::spawn(method::TAKEOFF, async move {
            rpc.call(method::TAKEOFF, (timeout_sec, vehicle)).await
        })
    }

    pub fn land_async(&self, timeout_sec: f32, vehicle: &str) -> PendingCall<bool> {
        let rpc = self.inner.rpc().clone();
        let vehicle = vehicle.to_string();
        PendingCall::spawn(method::LAND, async move {
            rpc.call(method::LAND, (timeout_sec, vehicle)).await
        })
    }

    pub fn hover_async(&self, vehicle: &str) -> PendingCall<bool> {
        let rpc = self.inner.rpc().clone();
        let vehicle = vehicle.to_string();
        PendingCall::spawn(method::HOVER, async move {
            rpc.call(method::HOVER, (vehicle,)).await
        })
    }

    /// Fly to a NED position at `velocity` m/s
    pub fn move_to_position_async(
        &self,
        x: f32,
        y: f32,
        z: f32,
        velocity: f32,
        options: MoveOptions,
        vehicle: &str,
    ) -> PendingCall<bool> {
        let rpc = self.inner.rpc().clone();
        let vehicle = vehicle.to_string();
        PendingCall::spawn(method::MOVE_TO_POSITION, async move {
            let params = (
                x,
                y,
                z,
                velocity,
                options.timeout_sec,
                options.drivetrain,
                options.yaw_mode,
                options.lookahead,
                options.adaptive_lookahead,
                vehicle,
            );
            rpc.call(method::MOVE_TO_POSITION, params).await
        })
    }

    pub async fn get_multirotor_state(&self, vehicle: &str) -> Result<MultirotorState, RpcError> {
        self.inner.rpc().call(method::GET_MULTIROTOR_STATE, (vehicle,)).await
    }
}

impl Deref for MultirotorClient {
    type Target = VehicleClient;

    fn deref(&self) -> &VehicleClient {
        &self.inner
    }
}

impl AsRef<VehicleClient> for MultirotorClient {
    fn as_ref(&self) -> &VehicleClient {
        &self.inner
    }
}
