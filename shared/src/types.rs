//! Simulator wire types
//!
//! Structs travel as msgpack maps keyed by field name. Fields missing from a
//! payload fall back to their defaults and unknown fields are ignored, so the
//! client tolerates servers that add members over time.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// 3-component vector in NED coordinates (metres)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vector3r {
    pub x_val: f32,
    pub y_val: f32,
    pub z_val: f32,
}

impl Vector3r {
    pub fn new(x_val: f32, y_val: f32, z_val: f32) -> Self {
        Self { x_val, y_val, z_val }
    }
}

/// Orientation quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quaternionr {
    pub w_val: f32,
    pub x_val: f32,
    pub y_val: f32,
    pub z_val: f32,
}

impl Default for Quaternionr {
    fn default() -> Self {
        // Identity rotation
        Self {
            w_val: 1.0,
            x_val: 0.0,
            y_val: 0.0,
            z_val: 0.0,
        }
    }
}

/// Geodetic position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f32,
}

/// Position, orientation and their derivatives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsState {
    pub position: Vector3r,
    pub orientation: Quaternionr,
    pub linear_velocity: Vector3r,
    pub angular_velocity: Vector3r,
    pub linear_acceleration: Vector3r,
    pub angular_acceleration: Vector3r,
}

/// Most recent collision reported for a vehicle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionInfo {
    pub has_collided: bool,
    pub normal: Vector3r,
    pub impact_point: Vector3r,
    pub position: Vector3r,
    pub penetration_depth: f32,
    pub time_stamp: u64,
    pub object_name: String,
    pub object_id: i32,
}

/// Whether a multirotor is on the ground
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum LandedState {
    #[default]
    Landed,
    Flying,
}

impl From<LandedState> for i32 {
    fn from(state: LandedState) -> i32 {
        match state {
            LandedState::Landed => 0,
            LandedState::Flying => 1,
        }
    }
}

impl TryFrom<i32> for LandedState {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LandedState::Landed),
            1 => Ok(LandedState::Flying),
            other => Err(format!("invalid landed state: {}", other)),
        }
    }
}

/// State snapshot of a multirotor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultirotorState {
    pub collision: CollisionInfo,
    pub kinematics_estimated: KinematicsState,
    pub gps_location: GeoPoint,
    pub timestamp: u64,
    pub landed_state: LandedState,
    pub ready: bool,
    pub ready_message: String,
    pub can_arm: bool,
}

/// State snapshot of a ground vehicle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarState {
    pub speed: f32,
    pub gear: i32,
    pub rpm: f32,
    pub maxrpm: f32,
    pub handbrake: bool,
    pub collision: CollisionInfo,
    pub kinematics_estimated: KinematicsState,
    pub timestamp: u64,
}

/// Throttle/steering input for a ground vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarControls {
    pub throttle: f32,
    pub steering: f32,
    pub brake: f32,
    pub handbrake: bool,
    pub is_manual_gear: bool,
    pub manual_gear: i32,
    pub gear_immediate: bool,
}

impl Default for CarControls {
    fn default() -> Self {
        Self {
            throttle: 0.0,
            steering: 0.0,
            brake: 0.0,
            handbrake: false,
            is_manual_gear: false,
            manual_gear: 0,
            gear_immediate: true,
        }
    }
}

/// How a multirotor may orient itself while moving
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum DrivetrainType {
    ForwardOnly,
    #[default]
    MaxDegreeOfFreedom,
}

impl From<DrivetrainType> for i32 {
    fn from(drivetrain: DrivetrainType) -> i32 {
        match drivetrain {
            DrivetrainType::ForwardOnly => 0,
            DrivetrainType::MaxDegreeOfFreedom => 1,
        }
    }
}

impl TryFrom<i32> for DrivetrainType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DrivetrainType::ForwardOnly),
            1 => Ok(DrivetrainType::MaxDegreeOfFreedom),
            other => Err(format!("invalid drivetrain type: {}", other)),
        }
    }
}

/// Yaw behaviour during a move
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YawMode {
    pub is_rate: bool,
    pub yaw_or_rate: f32,
}

impl Default for YawMode {
    fn default() -> Self {
        Self {
            is_rate: true,
            yaw_or_rate: 0.0,
        }
    }
}

/// Camera image kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum ImageType {
    Scene = 0,
    DepthPlanar = 1,
    DepthPerspective = 2,
    DepthVis = 3,
    DisparityNormalized = 4,
    Segmentation = 5,
    SurfaceNormals = 6,
    Infrared = 7,
    OpticalFlow = 8,
    OpticalFlowVis = 9,
}

impl From<ImageType> for i32 {
    fn from(image_type: ImageType) -> i32 {
        image_type as i32
    }
}

impl TryFrom<i32> for ImageType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ImageType::Scene,
            1 => ImageType::DepthPlanar,
            2 => ImageType::DepthPerspective,
            3 => ImageType::DepthVis,
            4 => ImageType::DisparityNormalized,
            5 => ImageType::Segmentation,
            6 => ImageType::SurfaceNormals,
            7 => ImageType::Infrared,
            8 => ImageType::OpticalFlow,
            9 => ImageType::OpticalFlowVis,
            other => return Err(format!("invalid image type: {}", other)),
        })
    }
}

/// A single camera capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub camera_name: String,
    pub image_type: ImageType,
    #[serde(default)]
    pub pixels_as_float: bool,
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_compress() -> bool {
    true
}

impl ImageRequest {
    /// Request a compressed, 8-bit image
    pub fn new(camera_name: impl Into<String>, image_type: ImageType) -> Self {
        Self {
            camera_name: camera_name.into(),
            image_type,
            pixels_as_float: false,
            compress: true,
        }
    }

    /// Request with explicit payload flags
    pub fn with_flags(
        camera_name: impl Into<String>,
        image_type: ImageType,
        pixels_as_float: bool,
        compress: bool,
    ) -> Self {
        Self {
            camera_name: camera_name.into(),
            image_type,
            pixels_as_float,
            compress,
        }
    }
}

/// Camera capture result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageResponse {
    pub image_data_uint8: ByteBuf,
    pub image_data_float: Vec<f32>,
    pub camera_name: String,
    pub camera_position: Vector3r,
    pub camera_orientation: Quaternionr,
    pub time_stamp: u64,
    pub message: String,
    pub pixels_as_float: bool,
    pub compress: bool,
    pub width: i32,
    pub height: i32,
    pub image_type: ImageType,
}

impl Default for ImageResponse {
    fn default() -> Self {
        Self {
            image_data_uint8: ByteBuf::new(),
            image_data_float: Vec::new(),
            camera_name: String::new(),
            camera_position: Vector3r::default(),
            camera_orientation: Quaternionr::default(),
            time_stamp: 0,
            message: String::new(),
            pixels_as_float: false,
            compress: true,
            width: 0,
            height: 0,
            image_type: ImageType::Scene,
        }
    }
}

impl ImageResponse {
    /// Number of elements in whichever buffer carries the payload
    pub fn payload_len(&self) -> usize {
        if self.pixels_as_float {
            self.image_data_float.len()
        } else {
            self.image_data_uint8.len()
        }
    }
}
