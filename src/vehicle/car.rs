//! Car API client

use airsim_shared::{method, CarControls, CarState};
use anyhow::Result;
use std::ops::Deref;

use super::client::VehicleClient;
use crate::rpc::{RpcConfig, RpcError};
use crate::transport::TransportConnector;

/// Client for the car API server
pub struct CarClient {
    inner: VehicleClient,
}

impl CarClient {
    pub async fn connect<C: TransportConnector>(connector: &C, config: &RpcConfig) -> Result<Self> {
        Ok(Self {
            inner: VehicleClient::connect(connector, config).await?,
        })
    }

    pub async fn get_car_state(&self, vehicle: &str) -> Result<CarState, RpcError> {
        self.inner.rpc().call(method::GET_CAR_STATE, (vehicle,)).await
    }

    pub async fn set_car_controls(&self, controls: &CarControls, vehicle: &str) -> Result<(), RpcError> {
        self.inner.rpc().call(method::SET_CAR_CONTROLS, (controls, vehicle)).await
    }
}

impl Deref for CarClient {
    type Target = VehicleClient;

    fn deref(&self) -> &VehicleClient {
        &self.inner
    }
}

impl AsRef<VehicleClient> for CarClient {
    fn as_ref(&self) -> &VehicleClient {
        &self.inner
    }
}
