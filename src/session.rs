//! API-control session over one named vehicle

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::vehicle::VehicleClient;

/// Programmatic control of one vehicle, held until [`release`](Self::release)
pub struct ApiSession<C: AsRef<VehicleClient>> {
    client: C,
    vehicle: String,
    released: bool,
}

impl<C: AsRef<VehicleClient>> ApiSession<C> {
    /// Confirm the connection and take API control of `vehicle`
    pub async fn acquire(client: C, vehicle: impl Into<String>) -> Result<Self> {
        let vehicle = vehicle.into();
        let api = client.as_ref();

        api.confirm_connection()
            .await
            .with_context(|| format!("confirming {} endpoint", api.endpoint()))?;
        api.enable_api_control(true, &vehicle)
            .await
            .with_context(|| format!("enabling API control of {}", vehicle))?;
        if api.is_api_control_enabled(&vehicle).await? {
            info!("{}: API control enabled", vehicle);
        } else {
            warn!("{}: server still reports API control disabled", vehicle);
        }

        Ok(Self {
            client,
            vehicle,
            released: false,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn vehicle(&self) -> &str {
        &self.vehicle
    }

    /// Hand control back to the simulator
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.client
            .as_ref()
            .enable_api_control(false, &self.vehicle)
            .await
            .with_context(|| format!("disabling API control of {}", self.vehicle))?;
        info!("{}: API control disabled", self.vehicle);
        Ok(())
    }
}

impl<C: AsRef<VehicleClient>> Drop for ApiSession<C> {
    fn drop(&mut self) {
        if !self.released {
            warn!("{}: session dropped while still holding API control", self.vehicle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcConfig;
    use crate::transport::TcpConnector;
    use crate::vehicle::{MultirotorClient, DEFAULT_LAND_TIMEOUT_SEC};
    use sim_server::{ServerConfig, Simulator, World};
    use std::time::Duration;

    async fn drone_session() -> (Simulator, ApiSession<MultirotorClient>) {
        let config = ServerConfig {
            takeoff_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let sim = Simulator::start("127.0.0.1", 0, 0, World::both("Drone1", "Car1"), config)
            .await
            .unwrap();
        let connector = TcpConnector::multirotor(sim.multirotor.local_addr().to_string());
        let client = MultirotorClient::connect(&connector, &RpcConfig::default()).await.unwrap();
        let session = ApiSession::acquire(client, "Drone1").await.unwrap();
        (sim, session)
    }

    #[tokio::test]
    async fn test_acquire_and_release_toggle_control() {
        let (sim, session) = drone_session().await;
        assert_eq!(session.vehicle(), "Drone1");
        assert!(session.client().is_api_control_enabled("Drone1").await.unwrap());

        session.release().await.unwrap();
        assert!(!sim.world().lock().await.vehicle("Drone1").unwrap().api_control);
    }

    #[tokio::test]
    async fn test_controlled_flight_commands() {
        let (sim, session) = drone_session().await;
        let drone = session.client();

        assert!(drone.arm_disarm(true, "Drone1").await.unwrap());
        assert!(drone.takeoff_async(5.0, "Drone1").join().await.unwrap());
        assert!(drone.hover_async("Drone1").join().await.unwrap());
        assert!(drone.land_async(DEFAULT_LAND_TIMEOUT_SEC, "Drone1").join().await.unwrap());

        let state = drone.get_multirotor_state("Drone1").await.unwrap();
        assert_eq!(state.landed_state, airsim_shared::LandedState::Landed);

        session.release().await.unwrap();
        assert!(sim.world().lock().await.vehicle("Drone1").unwrap().armed);
    }
}
