//! Shared memory access to the `AeroflyReaderData` mapping.
//!
//! The bridge DLL publishes a fixed 1024-byte image (see [`layout::offsets`]) that a
//! reader can sample without any handshake. There is no lock between writer and
//! reader, so [`SharedMemoryReader::read`] brackets each copy with two reads of the
//! header and retries when `update_counter` or `data_valid` moved in between.
//!
//! ```rust,no_run
//! use aerofly_reader::SharedMemoryReader;
//!
//! # fn main() -> aerofly_reader::Result<()> {
//! let mut reader = SharedMemoryReader::new();
//! reader.connect()?;
//! if reader.is_valid() {
//!     let snapshot = reader.read()?;
//!     println!("{} at {:.0} ft", snapshot.aircraft_name(), snapshot.altitude_ft());
//! }
//! # Ok(())
//! # }
//! ```

pub mod layout;
mod region;
#[cfg(windows)]
mod windows;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

pub use layout::{LAYOUT_SIZE, MemoryLayout};
pub use region::{InMemoryRegion, MemoryRegion};

use crate::config::SharedMemoryConfig;
use crate::types::FlightSnapshot;
use crate::{Result, TelemetryError};

/// Copies attempted before a read is reported as torn.
pub const MAX_READ_ATTEMPTS: u32 = 4;

const HEADER_OFFSET: usize = layout::offsets::DATA_VALID;

enum Backing {
    Named,
    Region(Arc<dyn MemoryRegion>),
}

/// Reader for the bridge's shared memory image.
///
/// Holds the open mapping between `connect()` and `disconnect()`. Reads take `&self`,
/// so one connected reader can be shared behind an `Arc`.
pub struct SharedMemoryReader {
    config: SharedMemoryConfig,
    backing: Backing,
    region: Option<Arc<dyn MemoryRegion>>,
}

impl fmt::Debug for SharedMemoryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match self.backing {
            Backing::Named => "named",
            Backing::Region(_) => "region",
        };
        f.debug_struct("SharedMemoryReader")
            .field("mapping_name", &self.config.mapping_name)
            .field("backing", &backing)
            .field("connected", &self.region.is_some())
            .finish()
    }
}

impl Default for SharedMemoryReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryReader {
    /// Reader for the default `AeroflyReaderData` mapping.
    pub fn new() -> Self {
        Self::with_config(SharedMemoryConfig::default())
    }

    /// Reader for a differently named mapping.
    pub fn named(mapping_name: impl Into<String>) -> Self {
        Self::with_config(SharedMemoryConfig {
            mapping_name: mapping_name.into(),
            ..SharedMemoryConfig::default()
        })
    }

    pub fn with_config(config: SharedMemoryConfig) -> Self {
        Self { config, backing: Backing::Named, region: None }
    }

    /// Reader over an arbitrary region instead of the named mapping.
    ///
    /// Works on every platform; `connect()` still has to be called first.
    pub fn from_region(region: Arc<dyn MemoryRegion>) -> Self {
        Self { config: SharedMemoryConfig::default(), backing: Backing::Region(region), region: None }
    }

    /// Open the mapping. A no-op when already connected.
    pub fn connect(&mut self) -> Result<()> {
        if self.region.is_some() {
            return Ok(());
        }

        let region = match &self.backing {
            Backing::Named => open_named(&self.config.mapping_name)?,
            Backing::Region(region) => Arc::clone(region),
        };

        if region.len() < LAYOUT_SIZE {
            return Err(TelemetryError::shared_memory(format!(
                "region is {} bytes, expected at least {}",
                region.len(),
                LAYOUT_SIZE
            )));
        }

        info!(mapping = %self.config.mapping_name, "Connected to shared memory");
        self.region = Some(region);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.region.is_some()
    }

    /// Release the mapping. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.region.take().is_some() {
            info!(mapping = %self.config.mapping_name, "Disconnected from shared memory");
        }
    }

    /// Copy the image and decode it.
    ///
    /// Retries up to [`MAX_READ_ATTEMPTS`] times while the header keeps changing under
    /// the copy. A read that never settles returns a retryable
    /// [`TelemetryError::SharedMemory`].
    pub fn read(&self) -> Result<FlightSnapshot> {
        let region = self.region("read")?;
        let mut image = vec![0u8; LAYOUT_SIZE];

        for attempt in 1..=MAX_READ_ATTEMPTS {
            let before = read_header(region)?;
            region.read_into(0, &mut image)?;
            let after = read_header(region)?;

            if before == after {
                let snapshot = MemoryLayout::decode(&image)?;
                trace!(update_counter = snapshot.update_counter, attempt, "Shared memory read");
                return Ok(snapshot);
            }

            debug!(attempt, ?before, ?after, "Header changed during copy, retrying");
            std::hint::spin_loop();
        }

        warn!(attempts = MAX_READ_ATTEMPTS, "Shared memory kept changing during reads");
        Err(TelemetryError::shared_memory(format!(
            "torn read: header changed on each of {MAX_READ_ATTEMPTS} attempts"
        )))
    }

    /// Cheap staleness check on `data_valid` alone. `false` when not connected.
    pub fn is_valid(&self) -> bool {
        match self.region("is_valid").and_then(read_header) {
            Ok((valid, _)) => valid > 0,
            Err(_) => false,
        }
    }

    /// Current `update_counter` without copying the rest of the image.
    pub fn update_counter(&self) -> Result<u32> {
        let region = self.region("update_counter")?;
        read_header(region).map(|(_, counter)| counter)
    }

    pub fn config(&self) -> &SharedMemoryConfig {
        &self.config
    }

    fn region(&self, operation: &'static str) -> Result<&dyn MemoryRegion> {
        self.region.as_deref().ok_or(TelemetryError::NotConnected { operation })
    }
}

fn read_header(region: &dyn MemoryRegion) -> Result<(u32, u32)> {
    let mut header = [0u8; 8];
    region.read_into(HEADER_OFFSET, &mut header)?;
    Ok(MemoryLayout::header(&header))
}

#[cfg(windows)]
fn open_named(name: &str) -> Result<Arc<dyn MemoryRegion>> {
    Ok(Arc::new(windows::MappedRegion::open(name)?))
}

#[cfg(not(windows))]
fn open_named(name: &str) -> Result<Arc<dyn MemoryRegion>> {
    Err(TelemetryError::shared_memory(format!(
        "named mapping {name:?} is only available on Windows; use the TCP client instead"
    )))
}
