//! Provider trait for snapshot sources

use crate::Result;
use crate::types::{FlightSnapshot, SnapshotSource};

/// A source of snapshots that a [`Driver`](crate::driver::Driver) can run in the background.
///
/// Providers pace themselves: the TCP provider waits on the socket, the shared memory
/// provider on its poll interval. `next_snapshot` must be cancel-safe because the
/// driver races it against shutdown.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Wait for the next snapshot
    ///
    /// Returns:
    /// - `Ok(Some(snapshot))` - New snapshot available
    /// - `Ok(None)` - Source ended for good
    /// - `Err(e)` - Transient failure, the driver backs off and calls again
    async fn next_snapshot(&mut self) -> Result<Option<FlightSnapshot>>;

    /// Which transport this provider reads
    fn source(&self) -> SnapshotSource;

    /// Expected snapshots per second, used to resolve subscriber rates
    fn tick_rate(&self) -> f64;
}
