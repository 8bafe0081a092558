//! Shared memory polling provider

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::trace;

use crate::Result;
use crate::provider::Provider;
use crate::shared_memory::SharedMemoryReader;
use crate::types::{FlightSnapshot, SnapshotSource};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Polls a connected [`SharedMemoryReader`] on a fixed interval.
///
/// Only snapshots that are `data_valid` and carry a new `update_counter` are yielded,
/// so a paused simulator produces nothing instead of repeats.
#[derive(Debug)]
pub struct SharedMemoryProvider {
    reader: SharedMemoryReader,
    period: Duration,
    // created on first poll, Interval needs a running timer
    ticker: Option<Interval>,
    last_counter: Option<u32>,
}

impl SharedMemoryProvider {
    pub fn new(reader: SharedMemoryReader, interval: Duration) -> Self {
        Self { reader, period: interval.max(MIN_INTERVAL), ticker: None, last_counter: None }
    }

    pub fn reader(&self) -> &SharedMemoryReader {
        &self.reader
    }
}

#[async_trait]
impl Provider for SharedMemoryProvider {
    async fn next_snapshot(&mut self) -> Result<Option<FlightSnapshot>> {
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            ticker.tick().await;

            let counter = self.reader.update_counter()?;
            if self.last_counter == Some(counter) {
                continue;
            }

            let snapshot = self.reader.read()?;
            if !snapshot.data_valid {
                trace!(update_counter = snapshot.update_counter, "Shared memory not valid yet");
                continue;
            }

            self.last_counter = Some(snapshot.update_counter);
            return Ok(Some(snapshot));
        }
    }

    fn source(&self) -> SnapshotSource {
        SnapshotSource::SharedMemory
    }

    fn tick_rate(&self) -> f64 {
        1.0 / self.period.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_memory::{InMemoryRegion, layout::offsets};
    use crate::test_utils::sample_snapshot;
    use std::sync::Arc;

    fn provider(region: Arc<InMemoryRegion>) -> SharedMemoryProvider {
        let mut reader = SharedMemoryReader::from_region(region);
        reader.connect().unwrap();
        SharedMemoryProvider::new(reader, Duration::from_millis(20))
    }

    #[tokio::test(start_paused = true)]
    async fn yields_each_counter_once() {
        let region = Arc::new(InMemoryRegion::new());
        region.write_snapshot(&sample_snapshot(1)).unwrap();
        let mut provider = provider(region.clone());

        assert_eq!(provider.next_snapshot().await.unwrap().unwrap().update_counter, 1);

        // unchanged counter: nothing new within several polls
        let waited = tokio::time::timeout(Duration::from_millis(100), provider.next_snapshot()).await;
        assert!(waited.is_err());

        region.write_snapshot(&sample_snapshot(2)).unwrap();
        let snapshot = provider.next_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.update_counter, 2);
        assert_eq!(snapshot.source, SnapshotSource::SharedMemory);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_data_is_not_published() {
        let region = Arc::new(InMemoryRegion::new());
        region.write_snapshot(&sample_snapshot(5)).unwrap();
        region.write(offsets::DATA_VALID, &0u32.to_le_bytes()).unwrap();
        let mut provider = provider(region.clone());

        let waited = tokio::time::timeout(Duration::from_millis(100), provider.next_snapshot()).await;
        assert!(waited.is_err());

        region.write(offsets::DATA_VALID, &1u32.to_le_bytes()).unwrap();
        assert_eq!(provider.next_snapshot().await.unwrap().unwrap().update_counter, 5);
    }

    #[test]
    fn tick_rate_follows_the_interval() {
        let reader = SharedMemoryReader::from_region(Arc::new(InMemoryRegion::new()));
        let provider = SharedMemoryProvider::new(reader, Duration::from_millis(20));
        assert!((provider.tick_rate() - 50.0).abs() < 1e-9);
        assert_eq!(provider.source(), SnapshotSource::SharedMemory);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_reader_is_an_error() {
        let reader = SharedMemoryReader::from_region(Arc::new(InMemoryRegion::new()));
        let mut provider = SharedMemoryProvider::new(reader, Duration::from_millis(20));
        assert!(provider.next_snapshot().await.is_err());
    }
}
