//! Core types for flight telemetry.
//!
//! Both transports produce the same [`FlightSnapshot`]; only
//! [`FlightSnapshot::source`] tells them apart.
//!
//! ## Usage Example
//!
//! ```rust
//! use aerofly_reader::types::{FlightSnapshot, Speeds};
//!
//! let snapshot = FlightSnapshot {
//!     speeds: Speeds { indicated_airspeed: 61.7, ..Speeds::default() },
//!     ..FlightSnapshot::default()
//! };
//!
//! assert_eq!(snapshot.indicated_airspeed_kts().round(), 120.0);
//! assert_eq!(snapshot.aircraft_name(), "Unknown");
//! ```

mod snapshot;
mod state;
mod update_rate;
mod vector;

pub use snapshot::{
    AircraftInfo, Autopilot, Controls, EngineState, FlightSnapshot, Navigation, Orientation,
    Position, SnapshotSummary, Speeds, UNKNOWN_AIRCRAFT, UNKNOWN_AIRPORT_ID, UNKNOWN_AIRPORT_NAME,
    VSpeeds,
};
pub use state::{ConnectionState, SnapshotSource};
pub use update_rate::UpdateRate;
pub use vector::Vector3D;
