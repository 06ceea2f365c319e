//! The demo: take off, query, capture, save, reset

use airsim_shared::{CarControls, ImageRequest, ImageResponse, ImageType};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::DemoConfig;
use crate::console::Console;
use crate::imaging;
use crate::session::ApiSession;
use crate::transport::TcpConnector;
use crate::vehicle::{CarClient, MoveOptions, MultirotorClient, DEFAULT_LAND_TIMEOUT_SEC};

/// Camera captures requested from the drone
pub fn drone_image_requests() -> Vec<ImageRequest> {
    vec![
        // depth visualization
        ImageRequest::new("0", ImageType::DepthVis),
        // scene as an uncompressed pixel array
        ImageRequest::with_flags("1", ImageType::Scene, false, false),
    ]
}

/// Camera captures requested from the car
pub fn car_image_requests() -> Vec<ImageRequest> {
    vec![
        ImageRequest::new("0", ImageType::Segmentation),
        ImageRequest::with_flags("1", ImageType::Scene, false, false),
    ]
}

/// Run the whole demo and return the files written
///
/// API control is handed back on both vehicles whether or not the run
/// succeeds.
pub async fn run(config: &DemoConfig) -> Result<Vec<PathBuf>> {
    let console = Console::new(config.interactive);

    let connector = TcpConnector::multirotor(config.drone_address());
    let drone_client = MultirotorClient::connect(&connector, &config.rpc)
        .await
        .with_context(|| format!("connecting to multirotor API at {}", connector.address()))?;
    let drone = ApiSession::acquire(drone_client, config.drone.as_str()).await?;

    let car = match connect_car(config).await {
        Ok(car) => car,
        Err(e) => {
            release_logged(drone).await;
            return Err(e);
        }
    };

    let outcome = fly_and_capture(&drone, &car, config, &console).await;

    let (drone_released, car_released) = futures::future::join(drone.release(), car.release()).await;
    let saved = outcome?;
    drone_released?;
    car_released?;

    info!("Saved {} images to {}", saved.len(), config.output_dir.display());
    Ok(saved)
}

async fn connect_car(config: &DemoConfig) -> Result<ApiSession<CarClient>> {
    let connector = TcpConnector::car(config.car_address());
    let car_client = CarClient::connect(&connector, &config.rpc)
        .await
        .with_context(|| format!("connecting to car API at {}", connector.address()))?;
    ApiSession::acquire(car_client, config.car.as_str()).await
}

async fn release_logged<C: AsRef<crate::vehicle::VehicleClient>>(session: ApiSession<C>) {
    if let Err(e) = session.release().await {
        error!("{:#}", e);
    }
}

async fn fly_and_capture(
    drone: &ApiSession<MultirotorClient>,
    car: &ApiSession<CarClient>,
    config: &DemoConfig,
    console: &Console,
) -> Result<Vec<PathBuf>> {
    let drone_api = drone.client();
    let car_api = car.client();

    drone_api
        .arm_disarm(true, drone.vehicle())
        .await
        .with_context(|| format!("arming {}", drone.vehicle()))?;

    // Car query runs while the drone climbs
    let mut takeoff = drone_api.takeoff_async(config.takeoff_timeout_sec, drone.vehicle());
    let car_state = car_api.get_car_state(car.vehicle()).await?;
    info!("{}: Speed {}, Gear {}", car.vehicle(), car_state.speed as i32, car_state.gear);
    if !takeoff.is_complete() {
        info!("{}: waiting for take-off", drone.vehicle());
    }
    takeoff.join().await?;

    let drone_state = drone_api.get_multirotor_state(drone.vehicle()).await?;
    info!("{}: State: {:#?}", drone.vehicle(), drone_state);

    if config.maneuver {
        let mut moving =
            drone_api.move_to_position_async(-5.0, 5.0, -10.0, 5.0, MoveOptions::default(), drone.vehicle());
        let controls = CarControls {
            throttle: 0.5,
            steering: 0.5,
            ..Default::default()
        };
        car_api.set_car_controls(&controls, car.vehicle()).await?;
        info!("{}: Go Forward", car.vehicle());
        moving.join().await?;
        drone_api.hover_async(drone.vehicle()).join().await?;

        tokio::time::sleep(config.maneuver_settle).await;
    }

    console.wait_key("Press any key to take images").await?;

    let drone_images = drone_api
        .sim_get_images(&drone_image_requests(), drone.vehicle())
        .await
        .with_context(|| format!("capturing images from {}", drone.vehicle()))?;
    info!("{}: Retrieved images: {}", drone.vehicle(), drone_images.len());

    let car_images = car_api
        .sim_get_images(&car_image_requests(), car.vehicle())
        .await
        .with_context(|| format!("capturing images from {}", car.vehicle()))?;
    info!("{}: Retrieved images: {}", car.vehicle(), car_images.len());

    let saved = save_all(config, drone_images, car_images)?;

    console.wait_key("Press any key to reset to original state").await?;

    if config.land {
        drone_api.land_async(DEFAULT_LAND_TIMEOUT_SEC, drone.vehicle()).join().await?;
        info!("{}: Landed", drone.vehicle());
    }
    drone_api.arm_disarm(false, drone.vehicle()).await?;
    drone_api.reset().await?;
    car_api.reset().await?;

    Ok(saved)
}

fn save_all(
    config: &DemoConfig,
    drone_images: Vec<ImageResponse>,
    car_images: Vec<ImageResponse>,
) -> Result<Vec<PathBuf>> {
    info!("Saving images to {}", config.output_dir.display());
    imaging::ensure_dir(&config.output_dir)?;

    let responses: Vec<ImageResponse> = drone_images.into_iter().chain(car_images).collect();
    Ok(imaging::save_responses(&config.output_dir, &responses)?)
}
