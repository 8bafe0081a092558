//! Driver runs a provider inside its own tokio task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::provider::Provider;
use super::types::FlightSnapshot;

/// Consecutive provider errors tolerated before the driver stops.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Handles returned by [`Driver::spawn`]
pub struct DriverChannels {
    /// Latest snapshot. `None` before the first one and again once the source ended.
    pub snapshots: watch::Receiver<Option<Arc<FlightSnapshot>>>,
    /// Cancels the task
    pub cancel: CancellationToken,
}

/// Owns a [`Provider`] and publishes its snapshots
///
/// The provider lives inside a single spawned task. Subscribers only ever see the
/// newest snapshot, so a slow subscriber never holds the provider back.
pub struct Driver;

impl Driver {
    /// Spawn the reader task for `provider`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P>(provider: P) -> DriverChannels
    where
        P: Provider,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::reader_task(provider, snapshot_tx, cancel_task).await;
        });

        DriverChannels { snapshots: snapshot_rx, cancel }
    }

    async fn reader_task<P>(
        mut provider: P,
        snapshot_tx: watch::Sender<Option<Arc<FlightSnapshot>>>,
        cancel: CancellationToken,
    ) where
        P: Provider,
    {
        let source = provider.source();
        info!(?source, "Snapshot reader task started");
        let mut snapshot_count = 0u64;
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(?source, "Snapshot reader cancelled");
                    break;
                }
                result = provider.next_snapshot() => result,
            };

            match result {
                Ok(Some(snapshot)) => {
                    snapshot_count += 1;
                    error_count = 0;
                    trace!(update_counter = snapshot.update_counter, snapshot_count, "Publishing snapshot");

                    if snapshot_tx.send(Some(Arc::new(snapshot))).is_err() {
                        debug!("All subscribers dropped, shutting down");
                        break;
                    }
                }
                Ok(None) => {
                    info!(?source, snapshot_count, "Source ended");
                    let _ = snapshot_tx.send(None);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!(error = %e, "Provider error ({}/{})", error_count, MAX_CONSECUTIVE_ERRORS);

                    if error_count >= MAX_CONSECUTIVE_ERRORS {
                        error!(?source, "Too many provider errors, stopping feed");
                        let _ = snapshot_tx.send(None);
                        break;
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff(error_count)) => {}
                    }
                }
            }
        }

        info!(?source, snapshot_count, "Snapshot reader task ended");
    }
}

/// 100 ms after the first error, doubling up to 3.2 s.
fn backoff(error_count: u32) -> Duration {
    BASE_BACKOFF * (1 << error_count.saturating_sub(1).min(5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::types::SnapshotSource;
    use crate::{Result, TelemetryError};
    use std::collections::VecDeque;

    struct ScriptedProvider {
        script: VecDeque<Result<Option<FlightSnapshot>>>,
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        async fn next_snapshot(&mut self) -> Result<Option<FlightSnapshot>> {
            match self.script.pop_front() {
                Some(step) => step,
                None => std::future::pending().await,
            }
        }

        fn source(&self) -> SnapshotSource {
            SnapshotSource::Tcp
        }

        fn tick_rate(&self) -> f64 {
            50.0
        }
    }

    fn snapshot(counter: u32) -> FlightSnapshot {
        FlightSnapshot { update_counter: counter, ..FlightSnapshot::default() }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(100));
        assert_eq!(backoff(2), Duration::from_millis(200));
        assert_eq!(backoff(6), Duration::from_millis(3200));
        assert_eq!(backoff(10), Duration::from_millis(3200));
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_snapshots_then_end_of_source() {
        let provider = ScriptedProvider {
            script: VecDeque::from(vec![Ok(Some(snapshot(1))), Ok(Some(snapshot(2))), Ok(None)]),
        };
        let mut channels = Driver::spawn(provider);

        let mut seen = Vec::new();
        while channels.snapshots.changed().await.is_ok() {
            match channels.snapshots.borrow_and_update().clone() {
                Some(s) => seen.push(s.update_counter),
                None => break,
            }
        }

        // watch keeps only the latest value, so intermediate snapshots may be skipped
        assert!(seen.iter().all(|counter| *counter == 1 || *counter == 2));
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(channels.snapshots.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_too_many_errors() {
        let script = (0..MAX_CONSECUTIVE_ERRORS)
            .map(|_| Err(TelemetryError::shared_memory("torn read")))
            .collect();
        let mut channels = Driver::spawn(ScriptedProvider { script });

        // sender is dropped once the task gives up
        while channels.snapshots.changed().await.is_ok() {}
        assert!(channels.snapshots.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_a_waiting_provider() {
        let mut channels = Driver::spawn(ScriptedProvider { script: VecDeque::new() });
        channels.cancel.cancel();

        assert!(channels.snapshots.changed().await.is_err());
    }
}
