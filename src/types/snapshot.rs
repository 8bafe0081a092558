//! The flight snapshot data model.
//!
//! A [`FlightSnapshot`] holds every raw field from one TCP frame or one shared memory
//! read, grouped into sub-records. Raw values keep the units the bridge reports
//! (radians, feet, meters per second). The `*_deg`, `*_kts`, `*_fpm` accessors convert
//! on every call through [`crate::units`]; no converted copy is stored.

use serde::{Deserialize, Serialize};

use super::{SnapshotSource, Vector3D};
use crate::units::{
    feet_to_meters, ms_to_fpm, ms_to_kmh, ms_to_knots, normalize_heading, normalize_longitude,
    radians_to_degrees,
};

/// Aircraft name used when the frame carries none.
pub const UNKNOWN_AIRCRAFT: &str = "Unknown";
/// Airport identifier used when no airport is nearby.
pub const UNKNOWN_AIRPORT_ID: &str = "----";
/// Airport name used when no airport is nearby.
pub const UNKNOWN_AIRPORT_NAME: &str = "Unknown";

/// Geographic position. Latitude and longitude in radians, altitudes in feet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Position {
    pub latitude: f64,
    /// Reported in the 0..2pi range.
    pub longitude: f64,
    /// Above mean sea level.
    pub altitude: f64,
    /// Above ground level.
    pub height: f64,
}

impl Position {
    pub fn latitude_deg(&self) -> f64 {
        radians_to_degrees(self.latitude)
    }

    /// Longitude in the -180..+180 range.
    pub fn longitude_deg(&self) -> f64 {
        normalize_longitude(radians_to_degrees(self.longitude))
    }

    pub fn altitude_ft(&self) -> f64 {
        self.altitude
    }

    pub fn altitude_m(&self) -> f64 {
        feet_to_meters(self.altitude)
    }

    pub fn height_ft(&self) -> f64 {
        self.height
    }

    pub fn height_m(&self) -> f64 {
        feet_to_meters(self.height)
    }
}

/// Air data. Speeds in meters per second, angle of attack in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Speeds {
    pub indicated_airspeed: f64,
    pub ground_speed: f64,
    pub vertical_speed: f64,
    pub mach_number: f64,
    pub angle_of_attack: f64,
}

impl Speeds {
    pub fn indicated_airspeed_kts(&self) -> f64 {
        ms_to_knots(self.indicated_airspeed)
    }

    pub fn ground_speed_kts(&self) -> f64 {
        ms_to_knots(self.ground_speed)
    }

    pub fn ground_speed_kmh(&self) -> f64 {
        ms_to_kmh(self.ground_speed)
    }

    pub fn vertical_speed_fpm(&self) -> f64 {
        ms_to_fpm(self.vertical_speed)
    }

    pub fn angle_of_attack_deg(&self) -> f64 {
        radians_to_degrees(self.angle_of_attack)
    }
}

/// Attitude and heading, all in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Orientation {
    /// Positive is nose up.
    pub pitch: f64,
    /// Positive is right wing down.
    pub bank: f64,
    pub true_heading: f64,
    pub magnetic_heading: f64,
}

impl Orientation {
    pub fn pitch_deg(&self) -> f64 {
        radians_to_degrees(self.pitch)
    }

    pub fn bank_deg(&self) -> f64 {
        radians_to_degrees(self.bank)
    }

    /// True heading in `[0, 360)`.
    pub fn true_heading_deg(&self) -> f64 {
        normalize_heading(radians_to_degrees(self.true_heading))
    }

    /// Magnetic heading in `[0, 360)`.
    pub fn magnetic_heading_deg(&self) -> f64 {
        normalize_heading(radians_to_degrees(self.magnetic_heading))
    }
}

/// Primary flight controls and ground state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Controls {
    pub on_ground: bool,
    /// 0 = up, 1 = down.
    pub gear: f64,
    pub flaps: f64,
    pub throttle: f64,
    pub parking_brake: bool,
}

impl Controls {
    pub fn gear_percent(&self) -> f64 {
        self.gear * 100.0
    }

    pub fn flaps_percent(&self) -> f64 {
        self.flaps * 100.0
    }

    pub fn throttle_percent(&self) -> f64 {
        self.throttle * 100.0
    }
}

/// State of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct EngineState {
    pub running: bool,
    /// 0..1
    pub throttle: f64,
}

impl EngineState {
    pub fn throttle_percent(&self) -> f64 {
        self.throttle * 100.0
    }
}

/// Autopilot selections as reported by the bridge (read-only).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Autopilot {
    pub master: bool,
    /// Radians.
    pub heading: f64,
    /// Feet.
    pub altitude: f64,
    /// Feet per minute, unlike the measured vertical speed.
    pub vertical_speed: f64,
}

impl Autopilot {
    pub fn heading_deg(&self) -> f64 {
        normalize_heading(radians_to_degrees(self.heading))
    }
}

/// Radio frequencies (MHz) and selected courses (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Navigation {
    pub nav1_frequency: f64,
    pub nav2_frequency: f64,
    pub com1_frequency: f64,
    pub com2_frequency: f64,
    pub selected_course_1: f64,
    pub selected_course_2: f64,
}

impl Navigation {
    pub fn selected_course_1_deg(&self) -> f64 {
        normalize_heading(radians_to_degrees(self.selected_course_1))
    }

    pub fn selected_course_2_deg(&self) -> f64 {
        normalize_heading(radians_to_degrees(self.selected_course_2))
    }
}

/// Reference speeds for the loaded aircraft, meters per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct VSpeeds {
    /// Stall speed, landing configuration.
    pub vs0: f64,
    /// Stall speed, clean.
    pub vs1: f64,
    /// Maximum flaps extended.
    pub vfe: f64,
    /// Maximum structural cruising.
    pub vno: f64,
    /// Never exceed.
    pub vne: f64,
}

impl VSpeeds {
    pub fn vs0_kts(&self) -> f64 {
        ms_to_knots(self.vs0)
    }

    pub fn vs1_kts(&self) -> f64 {
        ms_to_knots(self.vs1)
    }

    pub fn vfe_kts(&self) -> f64 {
        ms_to_knots(self.vfe)
    }

    pub fn vno_kts(&self) -> f64 {
        ms_to_knots(self.vno)
    }

    pub fn vne_kts(&self) -> f64 {
        ms_to_knots(self.vne)
    }
}

/// Loaded aircraft and the nearest airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct AircraftInfo {
    pub name: String,
    pub nearest_airport_id: String,
    pub nearest_airport_name: String,
    /// Feet.
    pub nearest_airport_elevation: f64,
    /// Radians.
    pub nearest_airport_latitude: f64,
    /// Radians, 0..2pi.
    pub nearest_airport_longitude: f64,
}

impl AircraftInfo {
    pub fn nearest_airport_latitude_deg(&self) -> f64 {
        radians_to_degrees(self.nearest_airport_latitude)
    }

    pub fn nearest_airport_longitude_deg(&self) -> f64 {
        normalize_longitude(radians_to_degrees(self.nearest_airport_longitude))
    }
}

impl Default for AircraftInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN_AIRCRAFT.to_string(),
            nearest_airport_id: UNKNOWN_AIRPORT_ID.to_string(),
            nearest_airport_name: UNKNOWN_AIRPORT_NAME.to_string(),
            nearest_airport_elevation: 0.0,
            nearest_airport_latitude: 0.0,
            nearest_airport_longitude: 0.0,
        }
    }
}

/// One complete telemetry record.
///
/// Built once per received frame or memory read and never mutated afterwards.
/// Fields are public for pattern matching and struct update syntax in fixtures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FlightSnapshot {
    /// Microseconds, monotonic on the simulator side.
    pub timestamp: u64,
    pub update_counter: u32,
    pub data_valid: bool,
    /// Send rate hint from the TCP stream.
    pub update_hz: Option<f64>,
    pub schema: Option<String>,
    pub version: Option<String>,
    pub source: SnapshotSource,

    pub position: Position,
    pub speeds: Speeds,
    pub orientation: Orientation,
    pub controls: Controls,
    pub engines: [EngineState; 2],
    pub autopilot: Autopilot,
    pub navigation: Navigation,
    pub vspeeds: VSpeeds,

    pub world_position: Vector3D,
    pub velocity: Vector3D,
    pub acceleration: Vector3D,
    pub wind: Vector3D,

    pub aircraft: AircraftInfo,
}

impl FlightSnapshot {
    pub fn latitude_deg(&self) -> f64 {
        self.position.latitude_deg()
    }

    pub fn longitude_deg(&self) -> f64 {
        self.position.longitude_deg()
    }

    pub fn altitude_ft(&self) -> f64 {
        self.position.altitude_ft()
    }

    pub fn indicated_airspeed_kts(&self) -> f64 {
        self.speeds.indicated_airspeed_kts()
    }

    pub fn ground_speed_kts(&self) -> f64 {
        self.speeds.ground_speed_kts()
    }

    pub fn vertical_speed_fpm(&self) -> f64 {
        self.speeds.vertical_speed_fpm()
    }

    /// Magnetic heading in degrees, the heading pilots fly.
    pub fn heading_deg(&self) -> f64 {
        self.orientation.magnetic_heading_deg()
    }

    pub fn is_flying(&self) -> bool {
        !self.controls.on_ground
    }

    pub fn any_engine_running(&self) -> bool {
        self.engines.iter().any(|e| e.running)
    }

    pub fn all_engines_running(&self) -> bool {
        self.engines.iter().all(|e| e.running)
    }

    pub fn aircraft_name(&self) -> &str {
        &self.aircraft.name
    }

    /// Flattened view in display units, for loggers and dashboards.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            timestamp: self.timestamp,
            update_counter: self.update_counter,
            data_valid: self.data_valid,
            latitude_deg: self.latitude_deg(),
            longitude_deg: self.longitude_deg(),
            altitude_ft: self.position.altitude_ft(),
            height_ft: self.position.height_ft(),
            indicated_airspeed_kts: self.indicated_airspeed_kts(),
            ground_speed_kts: self.ground_speed_kts(),
            vertical_speed_fpm: self.vertical_speed_fpm(),
            mach: self.speeds.mach_number,
            pitch_deg: self.orientation.pitch_deg(),
            bank_deg: self.orientation.bank_deg(),
            heading_deg: self.heading_deg(),
            on_ground: self.controls.on_ground,
            gear: self.controls.gear,
            flaps: self.controls.flaps,
            throttle: self.controls.throttle,
            aircraft_name: self.aircraft.name.clone(),
            nearest_airport: self.aircraft.nearest_airport_id.clone(),
        }
    }
}

/// Display-unit projection of a [`FlightSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SnapshotSummary {
    pub timestamp: u64,
    pub update_counter: u32,
    pub data_valid: bool,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_ft: f64,
    pub height_ft: f64,
    pub indicated_airspeed_kts: f64,
    pub ground_speed_kts: f64,
    pub vertical_speed_fpm: f64,
    pub mach: f64,
    pub pitch_deg: f64,
    pub bank_deg: f64,
    pub heading_deg: f64,
    pub on_ground: bool,
    pub gear: f64,
    pub flaps: f64,
    pub throttle: f64,
    pub aircraft_name: String,
    pub nearest_airport: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn default_snapshot_uses_placeholder_strings() {
        let snapshot = FlightSnapshot::default();
        assert_eq!(snapshot.aircraft_name(), "Unknown");
        assert_eq!(snapshot.aircraft.nearest_airport_id, "----");
        assert_eq!(snapshot.aircraft.nearest_airport_name, "Unknown");
        assert_eq!(snapshot.update_hz, None);
        assert_eq!(snapshot.world_position, Vector3D::ZERO);
    }

    #[test]
    fn accessors_convert_on_demand() {
        let snapshot = FlightSnapshot {
            position: Position {
                latitude: 0.8527,
                longitude: 2.0 * PI - 0.0212,
                altitude: 5000.0,
                height: 1000.0,
            },
            speeds: Speeds { indicated_airspeed: 100.0, vertical_speed: 2.54, ..Speeds::default() },
            orientation: Orientation { magnetic_heading: -PI / 2.0, ..Orientation::default() },
            ..FlightSnapshot::default()
        };

        assert!((snapshot.latitude_deg() - 48.857).abs() < 1e-3);
        assert!((snapshot.longitude_deg() - (-1.2147)).abs() < 1e-3);
        assert!((snapshot.indicated_airspeed_kts() - 194.384).abs() < 1e-9);
        assert!((snapshot.vertical_speed_fpm() - 500.0).abs() < 1e-3);
        assert!((snapshot.heading_deg() - 270.0).abs() < 1e-9);
        assert!((snapshot.position.altitude_m() - 1524.0).abs() < 1e-9);

        // raw values are untouched
        assert_eq!(snapshot.position.altitude, 5000.0);
        assert_eq!(snapshot.speeds.indicated_airspeed, 100.0);
    }

    #[test]
    fn engine_helpers() {
        let mut snapshot = FlightSnapshot::default();
        assert!(!snapshot.any_engine_running());

        snapshot.engines[0] = EngineState { running: true, throttle: 0.75 };
        assert!(snapshot.any_engine_running());
        assert!(!snapshot.all_engines_running());
        assert_eq!(snapshot.engines[0].throttle_percent(), 75.0);
    }

    #[test]
    fn summary_is_in_display_units() {
        let snapshot = FlightSnapshot {
            speeds: Speeds { ground_speed: 50.0, ..Speeds::default() },
            controls: Controls { on_ground: true, ..Controls::default() },
            ..FlightSnapshot::default()
        };
        let summary = snapshot.summary();
        assert!((summary.ground_speed_kts - 97.192).abs() < 1e-9);
        assert!(summary.on_ground);
        assert_eq!(summary.nearest_airport, "----");
    }
}
