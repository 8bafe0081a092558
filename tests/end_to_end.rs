//! End-to-end tests through the public API
//!
//! A tokio listener stands in for the bridge: it writes newline-delimited JSON the way
//! the DLL does, in deliberately awkward chunks.

use aerofly_reader::{
    Aerofly, AsyncTelemetryClient, ClientConfig, CommandConfig, CommandSender, FlightSnapshot,
    InMemoryRegion, MemoryLayout, SharedMemoryReader, SnapshotSource, StreamControl,
    TelemetryClient, TelemetryFeed, UpdateRate, WireFrame, units,
};
use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn frame(update_counter: u32, altitude: f64, indicated_airspeed: f64) -> WireFrame {
    WireFrame {
        schema: Some("aerofly-reader-telemetry".to_string()),
        update_counter,
        data_valid: 1.0,
        altitude,
        indicated_airspeed,
        aircraft_name: "Extra 330".to_string(),
        ..WireFrame::default()
    }
}

/// Serve `frames` to the first client, split into `chunk`-byte writes, then close.
async fn bridge(frames: Vec<WireFrame>, chunk: usize) -> Result<(u16, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let handle = tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else { return };
        let mut bytes = Vec::new();
        for frame in &frames {
            bytes.extend_from_slice(frame.to_line().unwrap_or_default().as_bytes());
            bytes.extend_from_slice(b"\r\n");
        }
        for piece in bytes.chunks(chunk) {
            if socket.write_all(piece).await.is_err() {
                return;
            }
            socket.flush().await.ok();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    Ok((port, handle))
}

fn config(port: u16) -> ClientConfig {
    ClientConfig::new("127.0.0.1", port)
        .with_timeout(Duration::from_secs(1))
        .with_read_timeout(Duration::from_secs(2))
        .without_reconnect()
}

#[tokio::test]
async fn async_stream_reassembles_chunked_frames() -> Result<()> {
    let frames = (1..=5).map(|n| frame(n, 1000.0 * f64::from(n), 50.0)).collect();
    let (port, server) = bridge(frames, 7).await?;

    let mut client = AsyncTelemetryClient::new(config(port));
    let snapshots: Vec<FlightSnapshot> = client
        .stream()
        .max_frames(5)
        .map(|item| item.expect("snapshot"))
        .collect()
        .await;

    let altitudes: Vec<f64> = snapshots.iter().map(FlightSnapshot::altitude_ft).collect();
    assert_eq!(altitudes, vec![1000.0, 2000.0, 3000.0, 4000.0, 5000.0]);
    assert!(snapshots.iter().all(|s| s.source == SnapshotSource::Tcp));
    assert_eq!(snapshots[0].aircraft_name(), "Extra 330");

    client.disconnect().await;
    server.await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_client_stream_ends_with_the_bridge() -> Result<()> {
    let frames = vec![frame(1, 500.0, 40.0), frame(2, 600.0, 41.0)];
    let (port, server) = bridge(frames, 64).await?;

    let results = tokio::task::spawn_blocking(move || {
        let mut client = TelemetryClient::new(config(port));
        let mut disconnects = 0;
        let counters: Vec<u32> = client
            .stream()
            .on_error(|e| {
                if e.is_disconnected() {
                    disconnects += 1;
                }
                StreamControl::Stop
            })
            .filter_map(|item| item.ok())
            .map(|snapshot| snapshot.update_counter)
            .collect();
        (counters, disconnects)
    })
    .await?;

    assert_eq!(results, (vec![1, 2], 1));
    server.await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn read_once_converts_units() -> Result<()> {
    let (port, server) = bridge(vec![frame(3, 10_500.0, 128.6)], 1024).await?;

    let snapshot = tokio::task::spawn_blocking(move || Aerofly::read_once(config(port))).await??;
    assert_eq!(units::format_altitude(snapshot.altitude_ft()), "10,500 ft");
    assert_eq!(snapshot.indicated_airspeed_kts().round(), 250.0);

    server.await?;
    Ok(())
}

#[tokio::test]
async fn read_once_async_returns_the_first_frame() -> Result<()> {
    let (port, server) = bridge(vec![frame(7, 3_000.0, 60.0), frame(8, 3_100.0, 61.0)], 16).await?;

    let snapshot = Aerofly::read_once_async(config(port)).await?;
    assert_eq!(snapshot.update_counter, 7);
    assert_eq!(snapshot.altitude_ft(), 3_000.0);

    server.await?;
    Ok(())
}

#[tokio::test]
async fn shared_memory_feed_follows_the_region() -> Result<()> {
    let region = Arc::new(InMemoryRegion::new());
    let mut snapshot = frame(1, 2500.0, 60.0).into_snapshot();
    region.write_snapshot(&snapshot)?;

    let reader = SharedMemoryReader::from_region(region.clone());
    let feed = TelemetryFeed::shared_memory(reader, Duration::from_millis(5))?;
    let mut subscription = feed.subscribe(UpdateRate::Native);

    let first = subscription.next().await.expect("first snapshot");
    assert_eq!(first.update_counter, 1);
    assert_eq!(first.source, SnapshotSource::SharedMemory);
    assert_eq!(first.altitude_ft(), 2500.0);

    snapshot.update_counter = 2;
    snapshot.position.altitude = 2600.0;
    region.write_snapshot(&snapshot)?;

    let second = subscription.next().await.expect("second snapshot");
    assert_eq!(second.update_counter, 2);
    assert_eq!(second.altitude_ft(), 2600.0);

    feed.shutdown();
    assert!(subscription.next().await.is_none());
    Ok(())
}

#[test]
fn memory_image_decodes_like_the_wire_frame() -> Result<()> {
    let wire = frame(42, 1234.5, 33.0);
    let from_wire = wire.clone().into_snapshot();

    let image = MemoryLayout::encode(&from_wire);
    let from_memory = MemoryLayout::decode(&image[..])?;

    assert_eq!(from_memory.update_counter, 42);
    assert_eq!(from_memory.altitude_ft(), from_wire.altitude_ft());
    assert_eq!(from_memory.aircraft, from_wire.aircraft);
    assert_eq!(from_memory.source, SnapshotSource::SharedMemory);
    Ok(())
}

#[tokio::test]
async fn command_reaches_the_command_port() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let mut received = String::new();
        socket.read_to_string(&mut received).await?;
        anyhow::Ok(received)
    });

    CommandSender::new(CommandConfig::new("127.0.0.1", port)).send_async("Controls.Flaps", 0.5).await?;

    let received: serde_json::Value = serde_json::from_str(server.await??.trim_end())?;
    assert_eq!(received["variable"], "Controls.Flaps");
    assert_eq!(received["value"], 0.5);
    Ok(())
}
