//! Simulator settings matching this demo's vehicles

use serde_json::{json, Value};

/// `settings.json` for `"SimMode": "Both"` with one car and one drone
pub fn recommended(drone: &str, car: &str) -> Value {
    let mut vehicles = serde_json::Map::new();
    vehicles.insert(
        car.to_string(),
        json!({ "VehicleType": "PhysXCar", "X": 0, "Y": 0, "Z": -2 }),
    );
    vehicles.insert(
        drone.to_string(),
        json!({ "VehicleType": "SimpleFlight", "X": 0, "Y": 0, "Z": -5, "Yaw": 90 }),
    );

    json!({
        "SettingsVersion": 1.2,
        "SimMode": "Both",
        "Vehicles": vehicles,
    })
}
