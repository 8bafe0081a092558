//! Byte layout of the `AeroflyReaderData` region.
//!
//! Little-endian, 1024 bytes. The writer fills the header last: `data_valid` and
//! `update_counter` change on every publish, which is what torn-read detection keys on.

use crate::types::{
    AircraftInfo, Autopilot, Controls, EngineState, FlightSnapshot, Navigation, Orientation,
    Position, SnapshotSource, Speeds, VSpeeds, Vector3D,
};
use crate::{Result, TelemetryError};

/// Total size of the mapping in bytes.
pub const LAYOUT_SIZE: usize = 1024;

/// Field offsets in bytes from the start of the region.
pub mod offsets {
    pub const TIMESTAMP: usize = 0;
    pub const DATA_VALID: usize = 8;
    pub const UPDATE_COUNTER: usize = 12;

    pub const LATITUDE: usize = 16;
    pub const LONGITUDE: usize = 24;
    pub const ALTITUDE: usize = 32;
    pub const HEIGHT: usize = 40;
    pub const PITCH: usize = 48;
    pub const BANK: usize = 56;
    pub const TRUE_HEADING: usize = 64;
    pub const MAGNETIC_HEADING: usize = 72;

    pub const INDICATED_AIRSPEED: usize = 80;
    pub const GROUND_SPEED: usize = 88;
    pub const VERTICAL_SPEED: usize = 96;
    pub const MACH_NUMBER: usize = 104;
    pub const ANGLE_OF_ATTACK: usize = 112;

    pub const ON_GROUND: usize = 120;
    pub const GEAR: usize = 128;
    pub const FLAPS: usize = 136;
    pub const THROTTLE: usize = 144;
    pub const PARKING_BRAKE: usize = 152;

    pub const ENGINE_RUNNING_1: usize = 160;
    pub const ENGINE_RUNNING_2: usize = 168;
    pub const ENGINE_THROTTLE_1: usize = 176;
    pub const ENGINE_THROTTLE_2: usize = 184;

    pub const NAV1_FREQUENCY: usize = 192;
    pub const NAV2_FREQUENCY: usize = 200;
    pub const COM1_FREQUENCY: usize = 208;
    pub const COM2_FREQUENCY: usize = 216;
    pub const SELECTED_COURSE_1: usize = 224;
    pub const SELECTED_COURSE_2: usize = 232;

    pub const AUTOPILOT_MASTER: usize = 240;
    pub const AUTOPILOT_HEADING: usize = 248;
    pub const AUTOPILOT_ALTITUDE: usize = 256;
    pub const AUTOPILOT_VERTICAL_SPEED: usize = 264;

    pub const VS0: usize = 272;
    pub const VS1: usize = 280;
    pub const VFE: usize = 288;
    pub const VNO: usize = 296;
    pub const VNE: usize = 304;

    // three f64 each
    pub const POSITION: usize = 312;
    pub const VELOCITY: usize = 336;
    pub const ACCELERATION: usize = 360;
    pub const WIND: usize = 384;

    pub const NEAREST_AIRPORT_ELEVATION: usize = 408;
    pub const NEAREST_AIRPORT_LATITUDE: usize = 416;
    pub const NEAREST_AIRPORT_LONGITUDE: usize = 424;

    pub const AIRCRAFT_NAME: usize = 432;
    pub const AIRCRAFT_NAME_LEN: usize = 64;
    pub const NEAREST_AIRPORT_ID: usize = 496;
    pub const NEAREST_AIRPORT_ID_LEN: usize = 8;
    pub const NEAREST_AIRPORT_NAME: usize = 504;
    pub const NEAREST_AIRPORT_NAME_LEN: usize = 64;
}

const FLAG_THRESHOLD: f64 = 0.5;

/// Decoder and encoder for the shared memory image.
pub struct MemoryLayout;

impl MemoryLayout {
    /// Decode a full region image.
    pub fn decode(bytes: &[u8]) -> Result<FlightSnapshot> {
        use offsets::*;

        let image = Image::new(bytes)?;

        Ok(FlightSnapshot {
            timestamp: image.u64_at(TIMESTAMP),
            update_counter: image.u32_at(UPDATE_COUNTER),
            data_valid: image.u32_at(DATA_VALID) > 0,
            update_hz: None,
            schema: None,
            version: None,
            source: SnapshotSource::SharedMemory,
            position: Position {
                latitude: image.f64_at(LATITUDE),
                longitude: image.f64_at(LONGITUDE),
                altitude: image.f64_at(ALTITUDE),
                height: image.f64_at(HEIGHT),
            },
            speeds: Speeds {
                indicated_airspeed: image.f64_at(INDICATED_AIRSPEED),
                ground_speed: image.f64_at(GROUND_SPEED),
                vertical_speed: image.f64_at(VERTICAL_SPEED),
                mach_number: image.f64_at(MACH_NUMBER),
                angle_of_attack: image.f64_at(ANGLE_OF_ATTACK),
            },
            orientation: Orientation {
                pitch: image.f64_at(PITCH),
                bank: image.f64_at(BANK),
                true_heading: image.f64_at(TRUE_HEADING),
                magnetic_heading: image.f64_at(MAGNETIC_HEADING),
            },
            controls: Controls {
                on_ground: image.flag_at(ON_GROUND),
                gear: image.f64_at(GEAR),
                flaps: image.f64_at(FLAPS),
                throttle: image.f64_at(THROTTLE),
                parking_brake: image.flag_at(PARKING_BRAKE),
            },
            engines: [
                EngineState { running: image.flag_at(ENGINE_RUNNING_1), throttle: image.f64_at(ENGINE_THROTTLE_1) },
                EngineState { running: image.flag_at(ENGINE_RUNNING_2), throttle: image.f64_at(ENGINE_THROTTLE_2) },
            ],
            autopilot: Autopilot {
                master: image.flag_at(AUTOPILOT_MASTER),
                heading: image.f64_at(AUTOPILOT_HEADING),
                altitude: image.f64_at(AUTOPILOT_ALTITUDE),
                vertical_speed: image.f64_at(AUTOPILOT_VERTICAL_SPEED),
            },
            navigation: Navigation {
                nav1_frequency: image.f64_at(NAV1_FREQUENCY),
                nav2_frequency: image.f64_at(NAV2_FREQUENCY),
                com1_frequency: image.f64_at(COM1_FREQUENCY),
                com2_frequency: image.f64_at(COM2_FREQUENCY),
                selected_course_1: image.f64_at(SELECTED_COURSE_1),
                selected_course_2: image.f64_at(SELECTED_COURSE_2),
            },
            vspeeds: VSpeeds {
                vs0: image.f64_at(VS0),
                vs1: image.f64_at(VS1),
                vfe: image.f64_at(VFE),
                vno: image.f64_at(VNO),
                vne: image.f64_at(VNE),
            },
            world_position: image.vector_at(POSITION),
            velocity: image.vector_at(VELOCITY),
            acceleration: image.vector_at(ACCELERATION),
            wind: image.vector_at(WIND),
            aircraft: AircraftInfo {
                name: image.string_at(AIRCRAFT_NAME, AIRCRAFT_NAME_LEN),
                nearest_airport_id: image.string_at(NEAREST_AIRPORT_ID, NEAREST_AIRPORT_ID_LEN),
                nearest_airport_name: image.string_at(NEAREST_AIRPORT_NAME, NEAREST_AIRPORT_NAME_LEN),
                nearest_airport_elevation: image.f64_at(NEAREST_AIRPORT_ELEVATION),
                nearest_airport_latitude: image.f64_at(NEAREST_AIRPORT_LATITUDE),
                nearest_airport_longitude: image.f64_at(NEAREST_AIRPORT_LONGITUDE),
            },
        })
    }

    /// Write a snapshot the way the bridge lays it out.
    ///
    /// Strings longer than their slot are cut at a character boundary so the slot
    /// always keeps its terminating NUL.
    pub fn encode(snapshot: &FlightSnapshot) -> Box<[u8; LAYOUT_SIZE]> {
        use offsets::*;

        let mut image = Box::new([0u8; LAYOUT_SIZE]);
        let mut w = Writer(&mut image[..]);

        w.u64_at(TIMESTAMP, snapshot.timestamp);
        w.u32_at(DATA_VALID, u32::from(snapshot.data_valid));
        w.u32_at(UPDATE_COUNTER, snapshot.update_counter);

        let p = &snapshot.position;
        w.f64_at(LATITUDE, p.latitude);
        w.f64_at(LONGITUDE, p.longitude);
        w.f64_at(ALTITUDE, p.altitude);
        w.f64_at(HEIGHT, p.height);

        let o = &snapshot.orientation;
        w.f64_at(PITCH, o.pitch);
        w.f64_at(BANK, o.bank);
        w.f64_at(TRUE_HEADING, o.true_heading);
        w.f64_at(MAGNETIC_HEADING, o.magnetic_heading);

        let s = &snapshot.speeds;
        w.f64_at(INDICATED_AIRSPEED, s.indicated_airspeed);
        w.f64_at(GROUND_SPEED, s.ground_speed);
        w.f64_at(VERTICAL_SPEED, s.vertical_speed);
        w.f64_at(MACH_NUMBER, s.mach_number);
        w.f64_at(ANGLE_OF_ATTACK, s.angle_of_attack);

        let c = &snapshot.controls;
        w.flag_at(ON_GROUND, c.on_ground);
        w.f64_at(GEAR, c.gear);
        w.f64_at(FLAPS, c.flaps);
        w.f64_at(THROTTLE, c.throttle);
        w.flag_at(PARKING_BRAKE, c.parking_brake);

        w.flag_at(ENGINE_RUNNING_1, snapshot.engines[0].running);
        w.flag_at(ENGINE_RUNNING_2, snapshot.engines[1].running);
        w.f64_at(ENGINE_THROTTLE_1, snapshot.engines[0].throttle);
        w.f64_at(ENGINE_THROTTLE_2, snapshot.engines[1].throttle);

        let n = &snapshot.navigation;
        w.f64_at(NAV1_FREQUENCY, n.nav1_frequency);
        w.f64_at(NAV2_FREQUENCY, n.nav2_frequency);
        w.f64_at(COM1_FREQUENCY, n.com1_frequency);
        w.f64_at(COM2_FREQUENCY, n.com2_frequency);
        w.f64_at(SELECTED_COURSE_1, n.selected_course_1);
        w.f64_at(SELECTED_COURSE_2, n.selected_course_2);

        let a = &snapshot.autopilot;
        w.flag_at(AUTOPILOT_MASTER, a.master);
        w.f64_at(AUTOPILOT_HEADING, a.heading);
        w.f64_at(AUTOPILOT_ALTITUDE, a.altitude);
        w.f64_at(AUTOPILOT_VERTICAL_SPEED, a.vertical_speed);

        let v = &snapshot.vspeeds;
        w.f64_at(VS0, v.vs0);
        w.f64_at(VS1, v.vs1);
        w.f64_at(VFE, v.vfe);
        w.f64_at(VNO, v.vno);
        w.f64_at(VNE, v.vne);

        w.vector_at(POSITION, snapshot.world_position);
        w.vector_at(VELOCITY, snapshot.velocity);
        w.vector_at(ACCELERATION, snapshot.acceleration);
        w.vector_at(WIND, snapshot.wind);

        let info = &snapshot.aircraft;
        w.f64_at(NEAREST_AIRPORT_ELEVATION, info.nearest_airport_elevation);
        w.f64_at(NEAREST_AIRPORT_LATITUDE, info.nearest_airport_latitude);
        w.f64_at(NEAREST_AIRPORT_LONGITUDE, info.nearest_airport_longitude);
        w.string_at(AIRCRAFT_NAME, AIRCRAFT_NAME_LEN, &info.name);
        w.string_at(NEAREST_AIRPORT_ID, NEAREST_AIRPORT_ID_LEN, &info.nearest_airport_id);
        w.string_at(NEAREST_AIRPORT_NAME, NEAREST_AIRPORT_NAME_LEN, &info.nearest_airport_name);

        image
    }

    /// `(data_valid, update_counter)` from the 8 header bytes at offset 8.
    pub(crate) fn header(bytes: &[u8; 8]) -> (u32, u32) {
        let [v0, v1, v2, v3, c0, c1, c2, c3] = *bytes;
        (u32::from_le_bytes([v0, v1, v2, v3]), u32::from_le_bytes([c0, c1, c2, c3]))
    }
}

struct Image<'a>(&'a [u8]);

impl<'a> Image<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < LAYOUT_SIZE {
            return Err(TelemetryError::data_error(
                "shared memory image",
                format!("expected {} bytes, got {}", LAYOUT_SIZE, bytes.len()),
            ));
        }
        Ok(Self(bytes))
    }

    fn array_at<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.0[offset..offset + N]);
        out
    }

    fn u64_at(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.array_at(offset))
    }

    fn u32_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.array_at(offset))
    }

    fn f64_at(&self, offset: usize) -> f64 {
        f64::from_le_bytes(self.array_at(offset))
    }

    fn flag_at(&self, offset: usize) -> bool {
        self.f64_at(offset) > FLAG_THRESHOLD
    }

    fn vector_at(&self, offset: usize) -> Vector3D {
        Vector3D::new(self.f64_at(offset), self.f64_at(offset + 8), self.f64_at(offset + 16))
    }

    fn string_at(&self, offset: usize, len: usize) -> String {
        let slot = &self.0[offset..offset + len];
        let end = slot.iter().position(|&b| b == 0).unwrap_or(len);
        String::from_utf8_lossy(&slot[..end]).into_owned()
    }
}

struct Writer<'a>(&'a mut [u8]);

impl Writer<'_> {
    fn bytes_at(&mut self, offset: usize, bytes: &[u8]) {
        self.0[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn u64_at(&mut self, offset: usize, value: u64) {
        self.bytes_at(offset, &value.to_le_bytes());
    }

    fn u32_at(&mut self, offset: usize, value: u32) {
        self.bytes_at(offset, &value.to_le_bytes());
    }

    fn f64_at(&mut self, offset: usize, value: f64) {
        self.bytes_at(offset, &value.to_le_bytes());
    }

    fn flag_at(&mut self, offset: usize, set: bool) {
        self.f64_at(offset, if set { 1.0 } else { 0.0 });
    }

    fn vector_at(&mut self, offset: usize, v: Vector3D) {
        self.f64_at(offset, v.x);
        self.f64_at(offset + 8, v.y);
        self.f64_at(offset + 16, v.z);
    }

    fn string_at(&mut self, offset: usize, len: usize, value: &str) {
        let mut end = value.len().min(len - 1);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.bytes_at(offset, &value.as_bytes()[..end]);
    }
}
