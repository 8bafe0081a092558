//! Wire schema for the TCP telemetry stream.
//!
//! [`WireFrame`] is the typed form of one JSON line as the bridge writes it. Field
//! names match the stream exactly. Every field is optional on the wire; missing fields
//! take the defaults documented on [`FlightSnapshot`], unknown fields are ignored and
//! a known field with the wrong JSON type fails the whole frame.
//!
//! Flags (`on_ground`, `parking_brake`, `engine_running_N`, `autopilot_master`) are
//! doubles on the wire and count as set above `0.5`. `data_valid` counts as set above
//! `0`. JSON booleans are accepted for all of them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::decoder::Frame;
use crate::types::{
    AircraftInfo, Autopilot, Controls, EngineState, FlightSnapshot, Navigation, Orientation,
    Position, SnapshotSource, Speeds, UNKNOWN_AIRCRAFT, UNKNOWN_AIRPORT_ID, UNKNOWN_AIRPORT_NAME,
    VSpeeds, Vector3D,
};
use crate::{Result, TelemetryError};

/// Schema name the bridge stamps on every frame.
pub const SCHEMA_NAME: &str = "aerofly-reader-telemetry";

const FLAG_THRESHOLD: f64 = 0.5;

/// One telemetry frame exactly as it travels over TCP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_hz: Option<f64>,
    pub timestamp: u64,
    #[serde(deserialize_with = "number_or_bool")]
    pub data_valid: f64,
    pub update_counter: u32,

    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub height: f64,
    pub pitch: f64,
    pub bank: f64,
    pub true_heading: f64,
    pub magnetic_heading: f64,

    pub indicated_airspeed: f64,
    pub ground_speed: f64,
    pub vertical_speed: f64,
    pub mach_number: f64,
    pub angle_of_attack: f64,

    #[serde(deserialize_with = "number_or_bool")]
    pub on_ground: f64,
    pub gear: f64,
    pub flaps: f64,
    pub throttle: f64,
    #[serde(deserialize_with = "number_or_bool")]
    pub parking_brake: f64,

    #[serde(deserialize_with = "number_or_bool")]
    pub engine_running_1: f64,
    #[serde(deserialize_with = "number_or_bool")]
    pub engine_running_2: f64,
    pub engine_throttle_1: f64,
    pub engine_throttle_2: f64,

    pub nav1_frequency: f64,
    pub nav2_frequency: f64,
    pub com1_frequency: f64,
    pub com2_frequency: f64,
    pub selected_course_1: f64,
    pub selected_course_2: f64,

    #[serde(deserialize_with = "number_or_bool")]
    pub autopilot_master: f64,
    pub autopilot_heading: f64,
    pub autopilot_altitude: f64,
    pub autopilot_vertical_speed: f64,

    pub vs0: f64,
    pub vs1: f64,
    pub vfe: f64,
    pub vno: f64,
    pub vne: f64,

    pub position: Vector3D,
    pub velocity: Vector3D,
    pub acceleration: Vector3D,
    pub wind: Vector3D,

    pub aircraft_name: String,
    pub nearest_airport_id: String,
    pub nearest_airport_name: String,
    pub nearest_airport_elevation: f64,
    pub nearest_airport_latitude: f64,
    pub nearest_airport_longitude: f64,
}

impl Default for WireFrame {
    fn default() -> Self {
        Self {
            schema: None,
            version: None,
            update_hz: None,
            timestamp: 0,
            data_valid: 0.0,
            update_counter: 0,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            height: 0.0,
            pitch: 0.0,
            bank: 0.0,
            true_heading: 0.0,
            magnetic_heading: 0.0,
            indicated_airspeed: 0.0,
            ground_speed: 0.0,
            vertical_speed: 0.0,
            mach_number: 0.0,
            angle_of_attack: 0.0,
            on_ground: 0.0,
            gear: 0.0,
            flaps: 0.0,
            throttle: 0.0,
            parking_brake: 0.0,
            engine_running_1: 0.0,
            engine_running_2: 0.0,
            engine_throttle_1: 0.0,
            engine_throttle_2: 0.0,
            nav1_frequency: 0.0,
            nav2_frequency: 0.0,
            com1_frequency: 0.0,
            com2_frequency: 0.0,
            selected_course_1: 0.0,
            selected_course_2: 0.0,
            autopilot_master: 0.0,
            autopilot_heading: 0.0,
            autopilot_altitude: 0.0,
            autopilot_vertical_speed: 0.0,
            vs0: 0.0,
            vs1: 0.0,
            vfe: 0.0,
            vno: 0.0,
            vne: 0.0,
            position: Vector3D::ZERO,
            velocity: Vector3D::ZERO,
            acceleration: Vector3D::ZERO,
            wind: Vector3D::ZERO,
            aircraft_name: UNKNOWN_AIRCRAFT.to_string(),
            nearest_airport_id: UNKNOWN_AIRPORT_ID.to_string(),
            nearest_airport_name: UNKNOWN_AIRPORT_NAME.to_string(),
            nearest_airport_elevation: 0.0,
            nearest_airport_latitude: 0.0,
            nearest_airport_longitude: 0.0,
        }
    }
}

impl WireFrame {
    /// Decode a frame that the decoder already validated as a JSON object.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        WireFrame::deserialize(frame.as_value())
            .map_err(|e| TelemetryError::data_error("telemetry frame", e.to_string()))
    }

    /// Decode one complete line without going through the decoder.
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Encode as one newline-terminated line, the way the bridge writes it.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Build the snapshot for this frame.
    pub fn into_snapshot(self) -> FlightSnapshot {
        FlightSnapshot {
            timestamp: self.timestamp,
            update_counter: self.update_counter,
            data_valid: self.data_valid > 0.0,
            update_hz: self.update_hz,
            schema: self.schema,
            version: self.version,
            source: SnapshotSource::Tcp,
            position: Position {
                latitude: self.latitude,
                longitude: self.longitude,
                altitude: self.altitude,
                height: self.height,
            },
            speeds: Speeds {
                indicated_airspeed: self.indicated_airspeed,
                ground_speed: self.ground_speed,
                vertical_speed: self.vertical_speed,
                mach_number: self.mach_number,
                angle_of_attack: self.angle_of_attack,
            },
            orientation: Orientation {
                pitch: self.pitch,
                bank: self.bank,
                true_heading: self.true_heading,
                magnetic_heading: self.magnetic_heading,
            },
            controls: Controls {
                on_ground: is_set(self.on_ground),
                gear: self.gear,
                flaps: self.flaps,
                throttle: self.throttle,
                parking_brake: is_set(self.parking_brake),
            },
            engines: [
                EngineState { running: is_set(self.engine_running_1), throttle: self.engine_throttle_1 },
                EngineState { running: is_set(self.engine_running_2), throttle: self.engine_throttle_2 },
            ],
            autopilot: Autopilot {
                master: is_set(self.autopilot_master),
                heading: self.autopilot_heading,
                altitude: self.autopilot_altitude,
                vertical_speed: self.autopilot_vertical_speed,
            },
            navigation: Navigation {
                nav1_frequency: self.nav1_frequency,
                nav2_frequency: self.nav2_frequency,
                com1_frequency: self.com1_frequency,
                com2_frequency: self.com2_frequency,
                selected_course_1: self.selected_course_1,
                selected_course_2: self.selected_course_2,
            },
            vspeeds: VSpeeds {
                vs0: self.vs0,
                vs1: self.vs1,
                vfe: self.vfe,
                vno: self.vno,
                vne: self.vne,
            },
            world_position: self.position,
            velocity: self.velocity,
            acceleration: self.acceleration,
            wind: self.wind,
            aircraft: AircraftInfo {
                name: self.aircraft_name,
                nearest_airport_id: self.nearest_airport_id,
                nearest_airport_name: self.nearest_airport_name,
                nearest_airport_elevation: self.nearest_airport_elevation,
                nearest_airport_latitude: self.nearest_airport_latitude,
                nearest_airport_longitude: self.nearest_airport_longitude,
            },
        }
    }
}

impl From<&FlightSnapshot> for WireFrame {
    fn from(s: &FlightSnapshot) -> Self {
        Self {
            schema: s.schema.clone(),
            version: s.version.clone(),
            update_hz: s.update_hz,
            timestamp: s.timestamp,
            data_valid: flag(s.data_valid),
            update_counter: s.update_counter,
            latitude: s.position.latitude,
            longitude: s.position.longitude,
            altitude: s.position.altitude,
            height: s.position.height,
            pitch: s.orientation.pitch,
            bank: s.orientation.bank,
            true_heading: s.orientation.true_heading,
            magnetic_heading: s.orientation.magnetic_heading,
            indicated_airspeed: s.speeds.indicated_airspeed,
            ground_speed: s.speeds.ground_speed,
            vertical_speed: s.speeds.vertical_speed,
            mach_number: s.speeds.mach_number,
            angle_of_attack: s.speeds.angle_of_attack,
            on_ground: flag(s.controls.on_ground),
            gear: s.controls.gear,
            flaps: s.controls.flaps,
            throttle: s.controls.throttle,
            parking_brake: flag(s.controls.parking_brake),
            engine_running_1: flag(s.engines[0].running),
            engine_running_2: flag(s.engines[1].running),
            engine_throttle_1: s.engines[0].throttle,
            engine_throttle_2: s.engines[1].throttle,
            nav1_frequency: s.navigation.nav1_frequency,
            nav2_frequency: s.navigation.nav2_frequency,
            com1_frequency: s.navigation.com1_frequency,
            com2_frequency: s.navigation.com2_frequency,
            selected_course_1: s.navigation.selected_course_1,
            selected_course_2: s.navigation.selected_course_2,
            autopilot_master: flag(s.autopilot.master),
            autopilot_heading: s.autopilot.heading,
            autopilot_altitude: s.autopilot.altitude,
            autopilot_vertical_speed: s.autopilot.vertical_speed,
            vs0: s.vspeeds.vs0,
            vs1: s.vspeeds.vs1,
            vfe: s.vspeeds.vfe,
            vno: s.vspeeds.vno,
            vne: s.vspeeds.vne,
            position: s.world_position,
            velocity: s.velocity,
            acceleration: s.acceleration,
            wind: s.wind,
            aircraft_name: s.aircraft.name.clone(),
            nearest_airport_id: s.aircraft.nearest_airport_id.clone(),
            nearest_airport_name: s.aircraft.nearest_airport_name.clone(),
            nearest_airport_elevation: s.aircraft.nearest_airport_elevation,
            nearest_airport_latitude: s.aircraft.nearest_airport_latitude,
            nearest_airport_longitude: s.aircraft.nearest_airport_longitude,
        }
    }
}

impl Frame {
    /// Decode this frame into a snapshot.
    pub fn to_snapshot(&self) -> Result<FlightSnapshot> {
        WireFrame::from_frame(self).map(WireFrame::into_snapshot)
    }
}

fn is_set(value: f64) -> bool {
    value > FLAG_THRESHOLD
}

fn flag(set: bool) -> f64 {
    if set { 1.0 } else { 0.0 }
}

fn number_or_bool<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrBool {
        Number(f64),
        Bool(bool),
    }

    match NumberOrBool::deserialize(deserializer)? {
        NumberOrBool::Number(n) => Ok(n),
        NumberOrBool::Bool(b) => Ok(flag(b)),
    }
}
