//! TCP stream provider

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::async_client::AsyncTelemetryClient;
use crate::provider::Provider;
use crate::types::{ConnectionState, FlightSnapshot, SnapshotSource};
use crate::{Result, TelemetryError};

/// The bridge broadcasts every 20 ms.
pub const DEFAULT_TICK_RATE: f64 = 50.0;

/// Feeds snapshots from an [`AsyncTelemetryClient`].
///
/// Bad frames are skipped and read timeouts just mean "keep waiting". The source ends
/// when the client's reconnect policy gives up.
#[derive(Debug)]
pub struct TcpProvider {
    client: AsyncTelemetryClient,
    tick_rate: f64,
}

impl TcpProvider {
    /// Connect first so a missing bridge is reported to the caller, not the feed.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let mut client = AsyncTelemetryClient::new(config);
        client.connect().await?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: AsyncTelemetryClient) -> Self {
        Self { client, tick_rate: DEFAULT_TICK_RATE }
    }

    /// Override the assumed source rate used to resolve subscriber rates.
    pub fn with_tick_rate(mut self, hz: f64) -> Self {
        self.tick_rate = hz;
        self
    }

    pub fn client(&self) -> &AsyncTelemetryClient {
        &self.client
    }
}

#[async_trait]
impl Provider for TcpProvider {
    async fn next_snapshot(&mut self) -> Result<Option<FlightSnapshot>> {
        loop {
            match self.client.state() {
                ConnectionState::Failed => return Ok(None),
                state if !state.is_active() => {
                    // a cancelled read leaves the client disconnected
                    debug!(%state, "Provider reconnecting");
                    self.client.connect().await?;
                }
                _ => {}
            }

            match self.client.read().await {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) if e.is_data() => warn!(error = %e, "Skipping undecodable frame"),
                Err(e) if e.is_timeout() => debug!("No data yet, still waiting"),
                Err(TelemetryError::Disconnected { attempts, .. }) => {
                    info!(attempts, "Bridge connection gone, ending TCP source");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn source(&self) -> SnapshotSource {
        SnapshotSource::Tcp
    }

    fn tick_rate(&self) -> f64 {
        self.tick_rate
    }
}
