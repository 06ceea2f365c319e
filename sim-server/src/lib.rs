//! Scripted simulator endpoint
//!
//! Serves the multirotor and car msgpack-rpc APIs over TCP against a shared
//! in-memory [`World`], enough to drive the multi-agent client without a
//! running simulator.

pub mod images;
pub mod world;

pub use world::{SimVehicle, VehicleKind, World};

use airsim_shared::codec::{self, CodecError, FrameDecoder, Message};
use airsim_shared::{method, CarControls, ImageRequest, Vector3r};
use anyhow::Result;
use bytes::Bytes;
use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// World state shared by both API servers
pub type SharedWorld = Arc<Mutex<World>>;

/// Tunables for the scripted endpoints
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_version: i32,
    pub min_client_version: i32,
    /// Time a take-off takes before its response is sent
    pub takeoff_delay: Duration,
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_version: 1,
            min_client_version: 1,
            takeoff_delay: Duration::from_millis(200),
            image_width: 8,
            image_height: 6,
        }
    }
}

/// One listening API server
pub struct SimServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SimServer {
    /// Bind `addr` and serve the API for `kind` vehicles
    pub async fn bind(
        addr: &str,
        kind: VehicleKind,
        world: SharedWorld,
        config: Arc<ServerConfig>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("{:?} API listening on {}", kind, local_addr);

        let handle = tokio::spawn(accept_loop(listener, kind, world, config));
        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for SimServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Both API servers over one world, as `"SimMode": "Both"` runs them
pub struct Simulator {
    pub multirotor: SimServer,
    pub car: SimServer,
    world: SharedWorld,
}

impl Simulator {
    pub async fn start(
        host: &str,
        multirotor_port: u16,
        car_port: u16,
        world: World,
        config: ServerConfig,
    ) -> Result<Self> {
        let world = Arc::new(Mutex::new(world));
        let config = Arc::new(config);

        let multirotor = SimServer::bind(
            &format!("{}:{}", host, multirotor_port),
            VehicleKind::Multirotor,
            world.clone(),
            config.clone(),
        )
        .await?;
        let car = SimServer::bind(
            &format!("{}:{}", host, car_port),
            VehicleKind::Car,
            world.clone(),
            config,
        )
        .await?;

        Ok(Self { multirotor, car, world })
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }
}

async fn accept_loop(listener: TcpListener, kind: VehicleKind, world: SharedWorld, config: Arc<ServerConfig>) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                debug!("{:?} API: connection from {}", kind, addr);
                let world = world.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(socket, kind, world, config).await {
                        warn!("{:?} API: session with {} ended: {}", kind, addr, e);
                    }
                });
            }
            Err(e) => {
                warn!("{:?} API: accept failed: {}", kind, e);
            }
        }
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    kind: VehicleKind,
    world: SharedWorld,
    config: Arc<ServerConfig>,
) -> Result<()> {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            debug!("{:?} API: client disconnected", kind);
            return Ok(());
        }
        decoder.extend(&buf[..n]);

        // Process all complete frames
        while let Some(message) = decoder.decode_next()? {
            match message {
                Message::Request { msgid, method, params } => {
                    let reply = handle_request(msgid, &method, &params, kind, &world, &config).await?;
                    socket.write_all(&reply).await?;
                }
                other => debug!("{:?} API: ignoring {:?}", kind, other),
            }
        }
    }
}

async fn handle_request(
    msgid: u32,
    name: &str,
    params: &[Value],
    kind: VehicleKind,
    world: &SharedWorld,
    config: &ServerConfig,
) -> Result<Bytes, CodecError> {
    debug!("{:?} API: {} {:?}", kind, name, params);

    match name {
        method::PING => respond(msgid, Ok(true)),
        method::GET_SERVER_VERSION => respond(msgid, Ok(config.server_version)),
        method::GET_MIN_REQUIRED_CLIENT_VERSION => respond(msgid, Ok(config.min_client_version)),
        method::RESET => {
            world.lock().await.reset();
            respond(msgid, Ok(()))
        }
        method::ENABLE_API_CONTROL => {
            let outcome = match (arg::<bool>(params, 0), vehicle_arg(params, 1)) {
                (Ok(enabled), Ok(vehicle)) => world.lock().await.enable_api_control(&vehicle, kind, enabled),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::IS_API_CONTROL_ENABLED => {
            let outcome = match vehicle_arg(params, 0) {
                Ok(vehicle) => world.lock().await.is_api_control_enabled(&vehicle, kind),
                Err(e) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::ARM_DISARM => {
            let outcome = match (arg::<bool>(params, 0), vehicle_arg(params, 1)) {
                (Ok(arm), Ok(vehicle)) => world.lock().await.arm_disarm(&vehicle, kind, arm),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::SIM_GET_IMAGES => {
            let outcome = match (arg::<Vec<ImageRequest>>(params, 0), vehicle_arg(params, 1)) {
                (Ok(requests), Ok(vehicle)) => capture(&requests, &vehicle, kind, world, config).await,
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::TAKEOFF if kind == VehicleKind::Multirotor => {
            let outcome = match vehicle_arg(params, 1) {
                Ok(vehicle) => {
                    // Climb time; the lock is not held so other calls proceed
                    tokio::time::sleep(config.takeoff_delay).await;
                    world.lock().await.takeoff(&vehicle)
                }
                Err(e) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::LAND if kind == VehicleKind::Multirotor => {
            let outcome = match vehicle_arg(params, 1) {
                Ok(vehicle) => world.lock().await.land(&vehicle),
                Err(e) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::HOVER if kind == VehicleKind::Multirotor => {
            let outcome = match vehicle_arg(params, 0) {
                Ok(vehicle) => world.lock().await.hover(&vehicle),
                Err(e) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::MOVE_TO_POSITION if kind == VehicleKind::Multirotor => {
            let target = (arg::<f32>(params, 0), arg::<f32>(params, 1), arg::<f32>(params, 2));
            let outcome = match (target, vehicle_arg(params, 9)) {
                ((Ok(x), Ok(y), Ok(z)), Ok(vehicle)) => {
                    world.lock().await.move_to_position(&vehicle, Vector3r::new(x, y, z))
                }
                ((Err(e), _, _), _) | ((_, Err(e), _), _) | ((_, _, Err(e)), _) | (_, Err(e)) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::GET_MULTIROTOR_STATE if kind == VehicleKind::Multirotor => {
            let outcome = match vehicle_arg(params, 0) {
                Ok(vehicle) => world.lock().await.multirotor_state(&vehicle),
                Err(e) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::GET_CAR_STATE if kind == VehicleKind::Car => {
            let outcome = match vehicle_arg(params, 0) {
                Ok(vehicle) => world.lock().await.car_state(&vehicle),
                Err(e) => Err(e),
            };
            respond(msgid, outcome)
        }
        method::SET_CAR_CONTROLS if kind == VehicleKind::Car => {
            let outcome = match (arg::<CarControls>(params, 0), vehicle_arg(params, 1)) {
                (Ok(controls), Ok(vehicle)) => world.lock().await.set_car_controls(&vehicle, controls),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            respond(msgid, outcome)
        }
        unknown => {
            let outcome: Result<(), String> = Err(format!("rpc method not found: {}", unknown));
            respond(msgid, outcome)
        }
    }
}

async fn capture(
    requests: &[ImageRequest],
    vehicle: &str,
    kind: VehicleKind,
    world: &SharedWorld,
    config: &ServerConfig,
) -> Result<Vec<airsim_shared::ImageResponse>, String> {
    let position = {
        let mut world = world.lock().await;
        match kind {
            VehicleKind::Multirotor => world.multirotor_state(vehicle)?.kinematics_estimated.position,
            VehicleKind::Car => world.car_state(vehicle)?.kinematics_estimated.position,
        }
    };
    let time_stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    images::render(requests, config.image_width, config.image_height, position, time_stamp)
        .map_err(|e| e.to_string())
}

fn respond<R: Serialize>(msgid: u32, outcome: Result<R, String>) -> Result<Bytes, CodecError> {
    match outcome {
        Ok(result) => codec::encode_response(msgid, None, &result),
        Err(message) => {
            debug!("rejecting msgid {}: {}", msgid, message);
            codec::encode_response(msgid, Some(&message), &())
        }
    }
}

fn arg<T: DeserializeOwned>(params: &[Value], index: usize) -> Result<T, String> {
    let value = params
        .get(index)
        .cloned()
        .ok_or_else(|| format!("missing argument {}", index))?;
    rmpv::ext::from_value(value).map_err(|e| format!("argument {}: {}", index, e))
}

/// Vehicle names are trailing and optional; absent means the default vehicle
fn vehicle_arg(params: &[Value], index: usize) -> Result<String, String> {
    if index >= params.len() {
        return Ok(String::new());
    }
    arg(params, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_reply(bytes: &Bytes) -> (Option<Value>, Value) {
        let mut buf = bytes::BytesMut::from(&bytes[..]);
        match codec::decode(&mut buf).expect("decode failed") {
            Some(Message::Response { error, result, .. }) => (error, result),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    fn shared_world() -> SharedWorld {
        Arc::new(Mutex::new(World::both("Drone1", "Car1")))
    }

    #[tokio::test]
    async fn test_unknown_method_is_remote_error() {
        let world = shared_world();
        let reply = handle_request(1, "fly", &[], VehicleKind::Car, &world, &ServerConfig::default())
            .await
            .unwrap();
        let (error, _) = decode_reply(&reply);
        assert_eq!(error.as_ref().and_then(|e| e.as_str()), Some("rpc method not found: fly"));
    }

    #[tokio::test]
    async fn test_car_endpoint_has_no_takeoff() {
        let world = shared_world();
        let params = [Value::F32(20.0), Value::from("Drone1")];
        let reply = handle_request(2, method::TAKEOFF, &params, VehicleKind::Car, &world, &ServerConfig::default())
            .await
            .unwrap();
        let (error, _) = decode_reply(&reply);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn test_enable_api_control_updates_world() {
        let world = shared_world();
        let params = [Value::Boolean(true), Value::from("Car1")];
        let reply = handle_request(
            3,
            method::ENABLE_API_CONTROL,
            &params,
            VehicleKind::Car,
            &world,
            &ServerConfig::default(),
        )
        .await
        .unwrap();

        let (error, result) = decode_reply(&reply);
        assert!(error.is_none());
        assert_eq!(result, Value::Nil);
        assert!(world.lock().await.vehicle("Car1").unwrap().api_control);
    }
}
