//! Typed client for the AeroflyReader telemetry bridge.
//!
//! The bridge DLL inside Aerofly FS publishes the same flight state three ways. This
//! crate reads all of them into one [`FlightSnapshot`]:
//!
//! - **TCP stream**: one JSON object per line on port 12345, read with the blocking
//!   [`TelemetryClient`] or the tokio [`AsyncTelemetryClient`]
//! - **Shared memory**: the 1024-byte `AeroflyReaderData` mapping, read with
//!   [`SharedMemoryReader`] (Windows, or any [`MemoryRegion`])
//! - **Background feed**: either source behind a task, fanned out to subscribers by
//!   [`TelemetryFeed`]
//!
//! Commands go the other way through [`CommandSender`] on port 12346.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use aerofly_reader::{Aerofly, ClientConfig};
//!
//! # fn main() -> aerofly_reader::Result<()> {
//! let snapshot = Aerofly::read_once(ClientConfig::default())?;
//! println!(
//!     "{} at {:.0} ft, {:.0} kts",
//!     snapshot.aircraft_name(),
//!     snapshot.altitude_ft(),
//!     snapshot.indicated_airspeed_kts()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming with tokio
//!
//! ```rust,no_run
//! use aerofly_reader::{Aerofly, ClientConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> aerofly_reader::Result<()> {
//!     let feed = Aerofly::feed(ClientConfig::from_env()?).await?;
//!     let mut snapshots = feed.subscribe(UpdateRate::Max(10));
//!
//!     while let Some(snapshot) = snapshots.next().await {
//!         println!("{:.0} fpm", snapshot.vertical_speed_fpm());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod units;

// Wire formats
pub mod decoder;
pub mod shared_memory;
pub mod wire;

// Transports and the background feed
pub mod command;
pub mod config;
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod reconnect;
pub mod stream;

pub use error::*;
pub use types::*;

pub use command::CommandSender;
pub use config::{ClientConfig, CommandConfig, SharedMemoryConfig};
pub use connection::StreamControl;
pub use connection::async_client::{AsyncSnapshots, AsyncTelemetryClient};
pub use connection::client::{Snapshots, TelemetryClient};
pub use connection::feed::TelemetryFeed;
pub use decoder::{Frame, FrameDecoder};
pub use provider::Provider;
pub use providers::{SharedMemoryProvider, TcpProvider};
pub use reconnect::{ReconnectConfig, ReconnectDecision, ReconnectPolicy};
pub use shared_memory::{InMemoryRegion, MemoryLayout, MemoryRegion, SharedMemoryReader};
pub use wire::WireFrame;

/// One-call entry points for the common cases.
///
/// Everything here is a thin wrapper; reach for the client types directly when you
/// need to hold a connection or tune the stream.
pub struct Aerofly;

impl Aerofly {
    /// Open a blocking TCP client.
    ///
    /// # Errors
    ///
    /// [`TelemetryError::Connection`] when the bridge is not listening.
    pub fn connect(config: ClientConfig) -> Result<TelemetryClient> {
        let mut client = TelemetryClient::new(config);
        client.connect()?;
        Ok(client)
    }

    /// Open a tokio TCP client.
    pub async fn connect_async(config: ClientConfig) -> Result<AsyncTelemetryClient> {
        let mut client = AsyncTelemetryClient::new(config);
        client.connect().await?;
        Ok(client)
    }

    /// Connect, read one snapshot, disconnect.
    pub fn read_once(config: ClientConfig) -> Result<FlightSnapshot> {
        TelemetryClient::new(config).read_one()
    }

    /// Tokio version of [`read_once`](Self::read_once).
    pub async fn read_once_async(config: ClientConfig) -> Result<FlightSnapshot> {
        AsyncTelemetryClient::new(config).read_one().await
    }

    /// Open the default shared memory mapping.
    ///
    /// # Platform
    ///
    /// The named mapping only exists on Windows. Elsewhere this returns
    /// [`TelemetryError::SharedMemory`]; use the TCP client instead.
    pub fn shared_memory() -> Result<SharedMemoryReader> {
        let mut reader = SharedMemoryReader::new();
        reader.connect()?;
        Ok(reader)
    }

    /// Start a background feed over TCP. Must be called inside a tokio runtime.
    pub async fn feed(config: ClientConfig) -> Result<TelemetryFeed> {
        TelemetryFeed::tcp(config).await
    }

    /// Send one command to the default command port.
    pub fn send_command(variable: &str, value: f64) -> Result<()> {
        CommandSender::default().send(variable, value)
    }
}
