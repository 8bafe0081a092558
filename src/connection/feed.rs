//! Background snapshot feed

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;
use crate::config::ClientConfig;
use crate::driver::Driver;
use crate::provider::Provider;
use crate::providers::{SharedMemoryProvider, TcpProvider};
use crate::shared_memory::SharedMemoryReader;
use crate::stream::ThrottleExt;
use crate::types::{FlightSnapshot, SnapshotSource, UpdateRate};

/// A snapshot source running in a background task.
///
/// Any number of subscribers can read from one feed; each gets the newest snapshot at
/// its own rate. Dropping the feed cancels the task.
///
/// ```rust,no_run
/// use aerofly_reader::{ClientConfig, TelemetryFeed, UpdateRate};
/// use futures::StreamExt;
///
/// # async fn run() -> aerofly_reader::Result<()> {
/// let feed = TelemetryFeed::tcp(ClientConfig::default()).await?;
/// let mut snapshots = feed.subscribe(UpdateRate::Max(5));
/// while let Some(snapshot) = snapshots.next().await {
///     println!("{:.0} ft", snapshot.altitude_ft());
/// }
/// # Ok(())
/// # }
/// ```
pub struct TelemetryFeed {
    snapshots: watch::Receiver<Option<Arc<FlightSnapshot>>>,
    source: SnapshotSource,
    source_hz: f64,
    cancel: CancellationToken,
}

impl TelemetryFeed {
    /// Connect to the TCP stream and start feeding.
    ///
    /// The first connect happens here so a missing simulator is reported immediately.
    pub async fn tcp(config: ClientConfig) -> Result<Self> {
        let provider = TcpProvider::connect(config).await?;
        Ok(Self::from_provider(provider))
    }

    /// Poll a shared memory reader every `interval`, connecting it first if needed.
    pub fn shared_memory(mut reader: SharedMemoryReader, interval: Duration) -> Result<Self> {
        if !reader.is_connected() {
            reader.connect()?;
        }
        Ok(Self::from_provider(SharedMemoryProvider::new(reader, interval)))
    }

    /// Run any provider. Must be called inside a tokio runtime.
    pub fn from_provider<P: Provider>(provider: P) -> Self {
        let source = provider.source();
        let source_hz = provider.tick_rate();
        let channels = Driver::spawn(provider);

        info!(?source, source_hz, "Telemetry feed started");

        Self { snapshots: channels.snapshots, source, source_hz, cancel: channels.cancel }
    }

    /// Subscribe to snapshots.
    ///
    /// Waits for the first snapshot, ends when the source ends, and throttles with
    /// latest-wins semantics when `rate` is below the source rate.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<FlightSnapshot>> + 'static {
        // WatchStream yields the current value first, which is None until the source
        // produces something. Leading Nones mean "waiting"; a later None means "ended".
        let snapshots = WatchStream::new(self.snapshots.clone())
            .skip_while(|opt| {
                let is_none = opt.is_none();
                async move { is_none }
            })
            .take_while(|opt| {
                let is_some = opt.is_some();
                async move { is_some }
            })
            .filter_map(|opt| async move { opt });

        match rate.throttle_interval(self.source_hz) {
            None => snapshots.boxed(),
            Some(period) => snapshots.throttle(period).boxed(),
        }
    }

    /// Most recent snapshot, if any has arrived.
    pub fn latest(&self) -> Option<Arc<FlightSnapshot>> {
        self.snapshots.borrow().clone()
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Stop the background task. Subscribers end once it exits.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TelemetryFeed {
    fn drop(&mut self) {
        debug!(source = ?self.source, "Dropping telemetry feed");
        self.cancel.cancel();
    }
}
