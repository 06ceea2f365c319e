//! Simulated vehicle state shared by both API servers

use airsim_shared::{
    CarControls, CarState, KinematicsState, LandedState, MultirotorState, Vector3r,
};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Height gained by a take-off, in metres (NED, so negative is up)
const TAKEOFF_CLIMB_M: f32 = -3.0;

/// Speed reached at full throttle, in m/s
const CAR_TOP_SPEED_MPS: f32 = 10.0;

/// Vehicle classes, one per API server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleKind {
    Multirotor,
    Car,
}

/// One simulated vehicle
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub kind: VehicleKind,
    pub api_control: bool,
    pub armed: bool,
    pub landed_state: LandedState,
    pub position: Vector3r,
    pub initial_position: Vector3r,
    pub controls: CarControls,
}

impl SimVehicle {
    fn new(kind: VehicleKind, initial_position: Vector3r) -> Self {
        Self {
            kind,
            api_control: false,
            armed: false,
            landed_state: LandedState::Landed,
            position: initial_position,
            initial_position,
            controls: CarControls::default(),
        }
    }

    fn reset(&mut self) {
        self.armed = false;
        self.landed_state = LandedState::Landed;
        self.position = self.initial_position;
        self.controls = CarControls::default();
    }

    fn kinematics(&self) -> KinematicsState {
        KinematicsState {
            position: self.position,
            ..Default::default()
        }
    }
}

/// All vehicles declared for the simulation, keyed by name
#[derive(Debug, Clone, Default)]
pub struct World {
    vehicles: BTreeMap<String, SimVehicle>,
    resets: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a vehicle at its initial pose
    pub fn with_vehicle(mut self, name: impl Into<String>, kind: VehicleKind, initial: Vector3r) -> Self {
        self.vehicles.insert(name.into(), SimVehicle::new(kind, initial));
        self
    }

    /// One drone and one car, posed as the demo's settings.json declares them
    pub fn both(drone: &str, car: &str) -> Self {
        Self::new()
            .with_vehicle(car, VehicleKind::Car, Vector3r::new(0.0, 0.0, -2.0))
            .with_vehicle(drone, VehicleKind::Multirotor, Vector3r::new(0.0, 0.0, -5.0))
    }

    pub fn vehicle(&self, name: &str) -> Option<&SimVehicle> {
        self.vehicles.get(name)
    }

    /// Number of `reset` calls served so far
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Look up a vehicle of `kind`; an empty name selects the first one
    fn resolve(&mut self, name: &str, kind: VehicleKind) -> Result<&mut SimVehicle, String> {
        let found = if name.is_empty() {
            self.vehicles.values_mut().find(|v| v.kind == kind)
        } else {
            self.vehicles.get_mut(name).filter(|v| v.kind == kind)
        };
        found.ok_or_else(|| format!("No {:?} vehicle named '{}'", kind, name))
    }

    /// Look up a vehicle that must be under API control
    fn controlled(&mut self, name: &str, kind: VehicleKind) -> Result<&mut SimVehicle, String> {
        let vehicle = self.resolve(name, kind)?;
        if !vehicle.api_control {
            return Err(format!(
                "Vehicle '{}' cannot be controlled because EnableApiControl(true) was not called",
                name
            ));
        }
        Ok(vehicle)
    }

    pub fn enable_api_control(&mut self, name: &str, kind: VehicleKind, enabled: bool) -> Result<(), String> {
        self.resolve(name, kind)?.api_control = enabled;
        Ok(())
    }

    pub fn is_api_control_enabled(&mut self, name: &str, kind: VehicleKind) -> Result<bool, String> {
        Ok(self.resolve(name, kind)?.api_control)
    }

    pub fn arm_disarm(&mut self, name: &str, kind: VehicleKind, arm: bool) -> Result<bool, String> {
        let vehicle = self.controlled(name, kind)?;
        vehicle.armed = arm;
        Ok(true)
    }

    pub fn takeoff(&mut self, name: &str) -> Result<bool, String> {
        let vehicle = self.controlled(name, VehicleKind::Multirotor)?;
        if !vehicle.armed {
            return Err(format!("Vehicle '{}' is not armed", name));
        }
        if vehicle.landed_state == LandedState::Landed {
            vehicle.position.z_val = vehicle.initial_position.z_val + TAKEOFF_CLIMB_M;
            vehicle.landed_state = LandedState::Flying;
        }
        Ok(true)
    }

    pub fn land(&mut self, name: &str) -> Result<bool, String> {
        let vehicle = self.controlled(name, VehicleKind::Multirotor)?;
        vehicle.position.z_val = vehicle.initial_position.z_val;
        vehicle.landed_state = LandedState::Landed;
        Ok(true)
    }

    pub fn hover(&mut self, name: &str) -> Result<bool, String> {
        self.controlled(name, VehicleKind::Multirotor)?;
        Ok(true)
    }

    pub fn move_to_position(&mut self, name: &str, target: Vector3r) -> Result<bool, String> {
        let vehicle = self.controlled(name, VehicleKind::Multirotor)?;
        if vehicle.landed_state == LandedState::Landed {
            return Err(format!("Vehicle '{}' must take off before moving", name));
        }
        vehicle.position = target;
        Ok(true)
    }

    pub fn multirotor_state(&mut self, name: &str) -> Result<MultirotorState, String> {
        let vehicle = self.resolve(name, VehicleKind::Multirotor)?;
        Ok(MultirotorState {
            kinematics_estimated: vehicle.kinematics(),
            timestamp: now_ns(),
            landed_state: vehicle.landed_state,
            ready: true,
            can_arm: true,
            ..Default::default()
        })
    }

    pub fn car_state(&mut self, name: &str) -> Result<CarState, String> {
        let vehicle = self.resolve(name, VehicleKind::Car)?;
        let throttle = vehicle.controls.throttle.clamp(0.0, 1.0);
        Ok(CarState {
            speed: throttle * CAR_TOP_SPEED_MPS,
            gear: if throttle > 0.0 { 1 } else { 0 },
            handbrake: vehicle.controls.handbrake,
            kinematics_estimated: vehicle.kinematics(),
            timestamp: now_ns(),
            ..Default::default()
        })
    }

    pub fn set_car_controls(&mut self, name: &str, controls: CarControls) -> Result<(), String> {
        self.controlled(name, VehicleKind::Car)?.controls = controls;
        Ok(())
    }

    /// Return every vehicle to its initial pose; API control is kept
    pub fn reset(&mut self) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.reset();
        }
        self.resets += 1;
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::both("Drone1", "Car1")
    }

    #[test]
    fn test_commands_require_api_control() {
        let mut world = world();
        assert!(world.arm_disarm("Drone1", VehicleKind::Multirotor, true).is_err());

        world.enable_api_control("Drone1", VehicleKind::Multirotor, true).unwrap();
        assert!(world.arm_disarm("Drone1", VehicleKind::Multirotor, true).unwrap());
    }

    #[test]
    fn test_takeoff_requires_arming() {
        let mut world = world();
        world.enable_api_control("Drone1", VehicleKind::Multirotor, true).unwrap();
        assert!(world.takeoff("Drone1").is_err());

        world.arm_disarm("Drone1", VehicleKind::Multirotor, true).unwrap();
        assert!(world.takeoff("Drone1").unwrap());

        let state = world.multirotor_state("Drone1").unwrap();
        assert_eq!(state.landed_state, LandedState::Flying);
        assert_eq!(state.kinematics_estimated.position.z_val, -8.0);
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let mut world = world();
        assert!(world.car_state("Drone1").is_err());
        assert!(world.multirotor_state("Car1").is_err());
    }

    #[test]
    fn test_empty_name_selects_first_of_kind() {
        let mut world = world();
        world.enable_api_control("", VehicleKind::Car, true).unwrap();
        assert!(world.vehicle("Car1").unwrap().api_control);
    }

    #[test]
    fn test_car_controls_drive_speed() {
        let mut world = world();
        world.enable_api_control("Car1", VehicleKind::Car, true).unwrap();
        let controls = CarControls {
            throttle: 0.5,
            steering: 0.5,
            ..Default::default()
        };
        world.set_car_controls("Car1", controls).unwrap();

        let state = world.car_state("Car1").unwrap();
        assert_eq!(state.speed, 5.0);
        assert_eq!(state.gear, 1);
    }

    #[test]
    fn test_reset_restores_initial_pose() {
        let mut world = world();
        world.enable_api_control("Drone1", VehicleKind::Multirotor, true).unwrap();
        world.arm_disarm("Drone1", VehicleKind::Multirotor, true).unwrap();
        world.takeoff("Drone1").unwrap();
        world.move_to_position("Drone1", Vector3r::new(-5.0, 5.0, -10.0)).unwrap();

        world.reset();

        let drone = world.vehicle("Drone1").unwrap();
        assert_eq!(drone.position, Vector3r::new(0.0, 0.0, -5.0));
        assert!(!drone.armed);
        assert!(drone.api_control);
        assert_eq!(world.resets(), 1);
    }
}
