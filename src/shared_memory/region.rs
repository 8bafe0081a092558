//! Byte sources the reader can sit on.

use std::sync::{PoisonError, RwLock};

use super::layout::{LAYOUT_SIZE, MemoryLayout};
use crate::types::FlightSnapshot;
use crate::{Result, TelemetryError};

/// A readable block of memory laid out like `AeroflyReaderData`.
///
/// The named Windows mapping is one implementation; [`InMemoryRegion`] is another,
/// used to replay captured images or drive the reader without a simulator.
pub trait MemoryRegion: Send + Sync {
    /// Size of the region in bytes.
    fn len(&self) -> usize;

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    fn read_into(&self, offset: usize, dst: &mut [u8]) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Heap-backed region that can be written while readers hold it.
#[derive(Debug)]
pub struct InMemoryRegion {
    bytes: RwLock<Vec<u8>>,
}

impl Default for InMemoryRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegion {
    /// A zeroed region of [`LAYOUT_SIZE`] bytes.
    pub fn new() -> Self {
        Self::from_bytes(vec![0; LAYOUT_SIZE])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: RwLock::new(bytes) }
    }

    /// Overwrite bytes at `offset`. Fails if the write runs past the end.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.write().unwrap_or_else(PoisonError::into_inner);
        let end = checked_end(offset, data.len(), bytes.len())?;
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Replace the whole image with `snapshot` in the bridge's layout.
    pub fn write_snapshot(&self, snapshot: &FlightSnapshot) -> Result<()> {
        self.write(0, &MemoryLayout::encode(snapshot)[..])
    }
}

impl MemoryRegion for InMemoryRegion {
    fn len(&self) -> usize {
        self.bytes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn read_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.read().unwrap_or_else(PoisonError::into_inner);
        let end = checked_end(offset, dst.len(), bytes.len())?;
        dst.copy_from_slice(&bytes[offset..end]);
        Ok(())
    }
}

pub(crate) fn checked_end(offset: usize, len: usize, region_len: usize) -> Result<usize> {
    offset.checked_add(len).filter(|end| *end <= region_len).ok_or_else(|| {
        TelemetryError::shared_memory(format!(
            "access of {len} bytes at offset {offset} is outside the {region_len} byte region"
        ))
    })
}
