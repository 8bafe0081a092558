//! Named file mapping opened through the Win32 API.

use std::ptr::NonNull;
use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use windows::core::PCWSTR;

use super::layout::LAYOUT_SIZE;
use super::region::{MemoryRegion, checked_end};
use crate::{Result, TelemetryError};

/// Read-only view of the bridge's mapping.
pub(crate) struct MappedRegion {
    mapping: HANDLE,
    base: NonNull<u8>,
}

impl MappedRegion {
    /// Open `name` and map the first [`LAYOUT_SIZE`] bytes.
    pub(crate) fn open(name: &str) -> Result<Self> {
        let mapping = unsafe {
            let wide_name = wide_string(name);
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| TelemetryError::shared_memory_api_error("OpenFileMappingW", e))?
        };

        let view = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, LAYOUT_SIZE) };
        let Some(base) = NonNull::new(view.Value as *mut u8) else {
            let err = windows::core::Error::from_thread();
            unsafe {
                let _ = CloseHandle(mapping);
            }
            return Err(TelemetryError::shared_memory_api_error("MapViewOfFile", err));
        };

        debug!(name, len = LAYOUT_SIZE, "Mapped shared memory view");
        Ok(Self { mapping, base })
    }
}

impl MemoryRegion for MappedRegion {
    fn len(&self) -> usize {
        LAYOUT_SIZE
    }

    fn read_into(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        checked_end(offset, dst.len(), LAYOUT_SIZE)?;
        // SAFETY: the view is LAYOUT_SIZE bytes and stays mapped until drop; the range
        // was bounds checked above
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
    }
}

// SAFETY: the view is only ever read, and the handle is a kernel object usable from
// any thread
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

/// Null-terminated UTF-16 for Win32 string parameters.
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
