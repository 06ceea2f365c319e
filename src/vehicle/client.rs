//! Calls shared by every vehicle API server

use airsim_shared::codec::NO_PARAMS;
use airsim_shared::{method, version, ImageRequest, ImageResponse};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::rpc::{RpcClient, RpcConfig, RpcError};
use crate::transport::TransportConnector;

/// Client/server API versions exchanged on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub client: i32,
    pub client_min: i32,
    pub server: i32,
    pub server_min: i32,
}

/// Outcome of comparing API versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    /// The server predates what this client needs
    ServerTooOld,
    /// This client predates what the server needs
    ClientTooOld,
}

impl VersionInfo {
    pub fn compatibility(&self) -> Compatibility {
        if self.server < self.server_min {
            Compatibility::ServerTooOld
        } else if self.client < self.client_min {
            Compatibility::ClientTooOld
        } else {
            Compatibility::Compatible
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Client Ver:{} (Min Req: {}), Server Ver:{} (Min Req: {})",
            self.client, self.client_min, self.server, self.server_min
        )
    }
}

/// Session to one vehicle API server
pub struct VehicleClient {
    rpc: Arc<RpcClient>,
}

impl VehicleClient {
    /// Connect to the server behind `connector`
    pub async fn connect<C: TransportConnector>(connector: &C, config: &RpcConfig) -> Result<Self> {
        let rpc = RpcClient::connect(connector, config).await?;
        Ok(Self::new(rpc))
    }

    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc: Arc::new(rpc) }
    }

    /// Shared handle for calls that outlive a borrow (async commands)
    pub(crate) fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    pub fn endpoint(&self) -> &str {
        self.rpc.name()
    }

    pub async fn ping(&self) -> Result<bool, RpcError> {
        self.rpc.call(method::PING, NO_PARAMS).await
    }

    pub async fn get_server_version(&self) -> Result<i32, RpcError> {
        self.rpc.call(method::GET_SERVER_VERSION, NO_PARAMS).await
    }

    pub async fn get_min_required_client_version(&self) -> Result<i32, RpcError> {
        self.rpc.call(method::GET_MIN_REQUIRED_CLIENT_VERSION, NO_PARAMS).await
    }

    /// Ping the server and check API versions
    ///
    /// A failed ping or a version mismatch is reported but not fatal; only
    /// transport or protocol failures return an error.
    pub async fn confirm_connection(&self) -> Result<VersionInfo, RpcError> {
        if self.ping().await? {
            info!("Connected to {} endpoint", self.endpoint());
        } else {
            warn!("Ping to {} endpoint returned false", self.endpoint());
        }

        let versions = VersionInfo {
            client: version::CLIENT_VERSION,
            client_min: self.get_min_required_client_version().await?,
            server: self.get_server_version().await?,
            server_min: version::MIN_REQUIRED_SERVER_VERSION,
        };

        match versions.compatibility() {
            Compatibility::Compatible => info!("{}", versions),
            Compatibility::ServerTooOld => warn!(
                "{} Simulator server is older than this client supports, please upgrade",
                versions
            ),
            Compatibility::ClientTooOld => warn!(
                "{} This client is older than the simulator server supports, please upgrade",
                versions
            ),
        }

        Ok(versions)
    }

    pub async fn enable_api_control(&self, enabled: bool, vehicle: &str) -> Result<(), RpcError> {
        self.rpc.call(method::ENABLE_API_CONTROL, (enabled, vehicle)).await
    }

    pub async fn is_api_control_enabled(&self, vehicle: &str) -> Result<bool, RpcError> {
        self.rpc.call(method::IS_API_CONTROL_ENABLED, (vehicle,)).await
    }

    /// Arm or disarm; returns whether the vehicle accepted the change
    pub async fn arm_disarm(&self, arm: bool, vehicle: &str) -> Result<bool, RpcError> {
        self.rpc.call(method::ARM_DISARM, (arm, vehicle)).await
    }

    /// Reset the simulation to its initial state
    pub async fn reset(&self) -> Result<(), RpcError> {
        self.rpc.call(method::RESET, NO_PARAMS).await
    }

    pub async fn sim_get_images(
        &self,
        requests: &[ImageRequest],
        vehicle: &str,
    ) -> Result<Vec<ImageResponse>, RpcError> {
        self.rpc.call(method::SIM_GET_IMAGES, (requests, vehicle)).await
    }
}

impl AsRef<VehicleClient> for VehicleClient {
    fn as_ref(&self) -> &VehicleClient {
        self
    }
}
