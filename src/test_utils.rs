//! Fixtures and loopback servers shared by unit tests and benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::shared_memory::{LAYOUT_SIZE, MemoryLayout};
use crate::types::{FlightSnapshot, Vector3D};
use crate::wire::{SCHEMA_NAME, WireFrame};

/// A fully populated frame. Values are short decimals so JSON keeps them exact.
pub fn sample_wire_frame(update_counter: u32) -> WireFrame {
    WireFrame {
        schema: Some(SCHEMA_NAME.to_string()),
        version: Some("1.0".to_string()),
        update_hz: Some(50.0),
        timestamp: 1_700_000_000 + u64::from(update_counter) * 20_000,
        data_valid: 1.0,
        update_counter,
        latitude: 0.65,
        longitude: -2.125,
        altitude: 3500.0,
        height: 3480.5,
        pitch: 0.05,
        bank: -0.1,
        true_heading: 1.5,
        magnetic_heading: 1.25,
        indicated_airspeed: 51.5,
        ground_speed: 55.25,
        vertical_speed: 2.5,
        mach_number: 0.16,
        angle_of_attack: 0.04,
        on_ground: 1.0,
        gear: 1.0,
        flaps: 0.25,
        throttle: 0.75,
        parking_brake: 0.0,
        engine_running_1: 1.0,
        engine_running_2: 0.0,
        engine_throttle_1: 0.75,
        engine_throttle_2: 0.0,
        nav1_frequency: 110.5,
        nav2_frequency: 113.9,
        com1_frequency: 118.3,
        com2_frequency: 121.5,
        selected_course_1: 0.5,
        selected_course_2: 1.0,
        autopilot_master: 0.0,
        autopilot_heading: 1.5,
        autopilot_altitude: 5000.0,
        autopilot_vertical_speed: 500.0,
        vs0: 20.5,
        vs1: 24.5,
        vfe: 43.5,
        vno: 66.0,
        vne: 83.5,
        position: Vector3D::new(1.0, 2.0, 3.0),
        velocity: Vector3D::new(50.0, 0.5, -1.5),
        acceleration: Vector3D::new(0.25, 0.0, -9.75),
        wind: Vector3D::new(-3.5, 1.25, 0.0),
        aircraft_name: "Cessna 172".to_string(),
        nearest_airport_id: "KSFO".to_string(),
        nearest_airport_name: "San Francisco International".to_string(),
        nearest_airport_elevation: 13.0,
        nearest_airport_latitude: 0.6525,
        nearest_airport_longitude: -2.1375,
    }
}

/// [`sample_wire_frame`] as one newline-terminated line.
pub fn sample_wire_line(update_counter: u32) -> String {
    sample_wire_frame(update_counter).to_line().expect("sample frame serializes")
}

pub fn sample_snapshot(update_counter: u32) -> FlightSnapshot {
    sample_wire_frame(update_counter).into_snapshot()
}

/// Shared memory image holding [`sample_snapshot`].
pub fn sample_memory_image(update_counter: u32) -> Box<[u8; LAYOUT_SIZE]> {
    MemoryLayout::encode(&sample_snapshot(update_counter))
}

/// What the server does with one accepted connection.
#[derive(Debug, Clone)]
pub struct Session {
    lines: Vec<String>,
    hold: bool,
    delay: Duration,
}

impl Session {
    /// Write `lines` and close.
    pub fn close(lines: Vec<String>) -> Self {
        Self { lines, hold: false, delay: Duration::ZERO }
    }

    /// Write `lines`, then keep the socket open until the client goes away.
    pub fn hold(lines: Vec<String>) -> Self {
        Self { lines, hold: true, delay: Duration::ZERO }
    }

    /// Wait `delay` after accepting before writing anything.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Loopback server playing one [`Session`] per accepted connection.
///
/// Connections beyond the script are accepted and closed immediately.
pub struct ScriptedServer {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
}

impl ScriptedServer {
    pub fn spawn(sessions: Vec<Session>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepts);

        thread::spawn(move || {
            let mut script = sessions.into_iter();
            for socket in listener.incoming() {
                let Ok(socket) = socket else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                match script.next() {
                    Some(session) => {
                        thread::spawn(move || play(socket, session));
                    }
                    None => drop(socket),
                }
            }
        });

        Self { addr, accepts }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections accepted so far.
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }
}

fn play(mut socket: TcpStream, session: Session) {
    if !session.delay.is_zero() {
        thread::sleep(session.delay);
    }
    for line in &session.lines {
        if socket.write_all(line.as_bytes()).is_err() {
            return;
        }
    }
    let _ = socket.flush();

    if session.hold {
        let mut sink = [0u8; 256];
        while matches!(socket.read(&mut sink), Ok(n) if n > 0) {}
    }
}

/// Route `tracing` output through the test harness. Safe to call from every test.
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
