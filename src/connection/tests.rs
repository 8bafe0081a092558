//! Transport tests against loopback servers
//!
//! Every test talks to a real socket served by [`ScriptedServer`], so connect, EOF and
//! timeout behavior come from the OS rather than a mock.

use futures::StreamExt;
use std::time::Duration;

use super::{StreamControl, read_timeout};
use super::async_client::AsyncTelemetryClient;
use super::client::TelemetryClient;
use super::feed::TelemetryFeed;
use crate::config::ClientConfig;
use crate::reconnect::ReconnectConfig;
use crate::test_utils::{ScriptedServer, Session, init_tracing, sample_wire_line};
use crate::types::{ConnectionState, UpdateRate};
use crate::{Result, TelemetryError};

fn config(port: u16) -> ClientConfig {
    ClientConfig::new("127.0.0.1", port)
        .with_timeout(Duration::from_secs(1))
        .with_read_timeout(Duration::from_secs(2))
        .without_reconnect()
}

fn quick_retries(port: u16, max_attempts: u32) -> ClientConfig {
    config(port).with_reconnect(ReconnectConfig {
        enabled: true,
        delay: Duration::from_millis(10),
        max_attempts,
    })
}

fn lines(counters: &[u32]) -> Vec<String> {
    counters.iter().map(|c| sample_wire_line(*c)).collect()
}

fn counters<I>(items: I) -> Vec<u32>
where
    I: IntoIterator<Item = Result<crate::FlightSnapshot>>,
{
    items.into_iter().map(|item| item.unwrap().update_counter).collect()
}

fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

// ----- blocking client -----

#[test]
fn reads_snapshots_in_order() {
    init_tracing();
    let server = ScriptedServer::spawn(vec![Session::hold(lines(&[1, 2]))]);
    let mut client = TelemetryClient::new(config(server.port()));

    client.connect().unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.read().unwrap().update_counter, 1);
    assert_eq!(client.read().unwrap().update_counter, 2);
    assert!(client.is_connected());
}

#[test]
fn read_before_connect_is_rejected() {
    let mut client = TelemetryClient::new(config(unused_port()));
    assert!(matches!(client.read(), Err(TelemetryError::NotConnected { operation: "read" })));
}

#[test]
fn refused_connect_is_not_retried() {
    let mut client = TelemetryClient::new(quick_retries(unused_port(), 3));

    let err = client.connect().unwrap_err();
    assert!(matches!(err, TelemetryError::Connection { .. }));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.reconnect_attempts(), 0);
}

#[test]
fn timeout_leaves_the_connection_open() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![])]);
    let mut client =
        TelemetryClient::new(config(server.port()).with_read_timeout(Duration::from_millis(100)));
    client.connect().unwrap();

    let err = client.read().unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(client.read().unwrap_err().is_timeout());
}

#[test]
fn bad_frame_fails_one_read_only() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![
        "{\"altitude\":\"high\"}\n".to_string(),
        sample_wire_line(4),
    ])]);
    let mut client = TelemetryClient::new(config(server.port()));
    client.connect().unwrap();

    assert!(client.read().unwrap_err().is_data());
    assert_eq!(client.read().unwrap().update_counter, 4);
}

#[test]
fn reconnect_exhaustion_ends_in_failed() {
    init_tracing();
    // every connection is closed right after accept
    let server = ScriptedServer::spawn(vec![]);
    let mut client = TelemetryClient::new(quick_retries(server.port(), 3));
    client.connect().unwrap();

    let err = client.read().unwrap_err();
    assert!(matches!(err, TelemetryError::Disconnected { attempts: 3, .. }));
    assert_eq!(client.state(), ConnectionState::Failed);

    std::thread::sleep(Duration::from_millis(100));
    // initial connect plus three reconnects
    assert_eq!(server.accepts(), 4);

    let err = client.read().unwrap_err();
    assert!(err.is_disconnected());
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(server.accepts(), 4);
}

#[test]
fn successful_read_resets_reconnect_attempts() {
    let server = ScriptedServer::spawn(vec![
        Session::close(vec![]),
        Session::close(vec![]),
        Session::hold(lines(&[9])),
    ]);
    let mut client = TelemetryClient::new(quick_retries(server.port(), 3));
    client.connect().unwrap();

    // two reconnects happen inside this read
    assert_eq!(client.read().unwrap().update_counter, 9);
    assert_eq!(client.reconnect_attempts(), 0);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(server.accepts(), 3);
}

#[test]
fn explicit_connect_recovers_from_failed() {
    let server = ScriptedServer::spawn(vec![Session::close(vec![]), Session::hold(lines(&[3]))]);
    let mut client = TelemetryClient::new(config(server.port()));
    client.connect().unwrap();

    assert!(client.read().unwrap_err().is_disconnected());
    assert_eq!(client.state(), ConnectionState::Failed);

    client.connect().unwrap();
    assert_eq!(client.read().unwrap().update_counter, 3);
}

#[test]
fn read_one_restores_the_previous_state() {
    let server = ScriptedServer::spawn(vec![Session::hold(lines(&[5]))]);
    let mut client = TelemetryClient::new(config(server.port()));

    assert_eq!(client.read_one().unwrap().update_counter, 5);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn disconnect_is_idempotent() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![])]);
    let mut client = TelemetryClient::new(config(server.port()));
    client.connect().unwrap();

    client.disconnect();
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(client.read(), Err(TelemetryError::NotConnected { .. })));
}

#[test]
fn stream_connects_lazily_and_honors_max_frames() {
    let server = ScriptedServer::spawn(vec![Session::hold(lines(&[1, 2, 3, 4]))]);
    let mut client = TelemetryClient::new(config(server.port()));

    let snapshots = client.stream().max_frames(3);
    assert_eq!(server.accepts(), 0);
    assert_eq!(counters(snapshots), vec![1, 2, 3]);
    assert!(client.is_connected());
}

#[test]
fn stream_skips_bad_frames_by_default() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![
        "garbage\n".to_string(),
        sample_wire_line(1),
        "[1,2,3]\n".to_string(),
        sample_wire_line(2),
    ])]);
    let mut client = TelemetryClient::new(config(server.port()));

    assert_eq!(counters(client.stream().max_frames(2)), vec![1, 2]);
}

#[test]
fn stream_stop_handler_ends_on_first_error() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![
        "garbage\n".to_string(),
        sample_wire_line(1),
    ])]);
    let mut client = TelemetryClient::new(config(server.port()));

    let mut snapshots = client.stream().on_error(|_| StreamControl::Stop);
    assert!(snapshots.next().unwrap().unwrap_err().is_data());
    assert!(snapshots.next().is_none());
}

#[test]
fn stream_yields_disconnect_once_then_ends() {
    let server = ScriptedServer::spawn(vec![Session::close(lines(&[1]))]);
    let mut client = TelemetryClient::new(config(server.port()));

    let items: Vec<_> = client.stream().collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().update_counter, 1);
    assert!(items[1].as_ref().unwrap_err().is_disconnected());
}

#[test]
fn stream_continue_handler_reconnects() {
    let server =
        ScriptedServer::spawn(vec![Session::close(lines(&[1])), Session::hold(lines(&[2]))]);
    let mut client = TelemetryClient::new(config(server.port()));

    let mut errors = Vec::new();
    let seen = counters(
        client
            .stream()
            .max_frames(2)
            .on_error(|e| {
                errors.push(e.is_disconnected());
                StreamControl::Continue
            })
            .collect::<Vec<_>>(),
    );

    assert_eq!(seen, vec![1, 2]);
    assert_eq!(errors, vec![true]);
}

#[test]
fn stream_timeout_yields_once_then_ends() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![])]);
    let mut client =
        TelemetryClient::new(config(server.port()).with_read_timeout(Duration::from_millis(50)));

    let items: Vec<_> = client.stream().collect();
    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_timeout());
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[test]
fn stream_timeout_continue_keeps_reading() {
    let server =
        ScriptedServer::spawn(vec![Session::hold(lines(&[1])).after(Duration::from_millis(300))]);
    let mut client =
        TelemetryClient::new(config(server.port()).with_read_timeout(Duration::from_millis(50)));

    let mut timeouts = Vec::new();
    let seen = counters(
        client
            .stream()
            .max_frames(1)
            .on_error(|e| {
                timeouts.push(e.is_timeout());
                StreamControl::Continue
            })
            .collect::<Vec<_>>(),
    );

    assert_eq!(seen, vec![1]);
    assert!(!timeouts.is_empty());
    assert!(timeouts.iter().all(|t| *t));
    // the handler's connect() kept the original socket
    assert_eq!(server.accepts(), 1);
}

#[test]
fn stream_connect_failure_ends_the_stream() {
    let mut client = TelemetryClient::new(config(unused_port()));
    let mut snapshots = client.stream();

    assert!(matches!(snapshots.next(), Some(Err(TelemetryError::Connection { .. }))));
    assert!(snapshots.next().is_none());
}

// ----- async client -----

#[tokio::test]
async fn async_reads_snapshots_in_order() {
    let server = ScriptedServer::spawn(vec![Session::hold(lines(&[1, 2]))]);
    let mut client = AsyncTelemetryClient::new(config(server.port()));

    client.connect().await.unwrap();
    assert_eq!(client.read().await.unwrap().update_counter, 1);
    assert_eq!(client.read().await.unwrap().update_counter, 2);
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn async_timeout_keeps_the_connection() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![])]);
    let mut client =
        AsyncTelemetryClient::new(config(server.port()).with_read_timeout(Duration::from_millis(50)));
    client.connect().await.unwrap();

    assert!(client.read().await.unwrap_err().is_timeout());
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn cancelled_read_leaves_the_client_disconnected() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![])]);
    let mut client = AsyncTelemetryClient::new(config(server.port()));
    client.connect().await.unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(50), client.read()).await;
    assert!(cancelled.is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(client.read().await, Err(TelemetryError::NotConnected { .. })));
}

#[tokio::test]
async fn cancelled_reconnect_stops_retrying() {
    let server = ScriptedServer::spawn(vec![]);
    let mut client = AsyncTelemetryClient::new(config(server.port()).with_reconnect(ReconnectConfig {
        enabled: true,
        delay: Duration::from_secs(60),
        max_attempts: 0,
    }));
    client.connect().await.unwrap();

    // the read is parked in the reconnect delay when it is dropped
    let cancelled = tokio::time::timeout(Duration::from_millis(200), client.read()).await;
    assert!(cancelled.is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.accepts(), 1);
}

#[tokio::test]
async fn async_reconnect_exhaustion_ends_in_failed() {
    let server = ScriptedServer::spawn(vec![]);
    let mut client = AsyncTelemetryClient::new(quick_retries(server.port(), 3));
    client.connect().await.unwrap();

    let err = client.read().await.unwrap_err();
    assert!(matches!(err, TelemetryError::Disconnected { attempts: 3, .. }));
    assert_eq!(client.state(), ConnectionState::Failed);
    assert!(client.read().await.unwrap_err().is_disconnected());
}

#[tokio::test]
async fn async_read_one_restores_the_previous_state() {
    let server = ScriptedServer::spawn(vec![Session::hold(lines(&[8]))]);
    let mut client = AsyncTelemetryClient::new(config(server.port()));

    assert_eq!(client.read_one().await.unwrap().update_counter, 8);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn async_stream_skips_bad_frames_and_stops_at_max() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![
        sample_wire_line(1),
        "{\"truncated\":\n".to_string(),
        sample_wire_line(2),
        sample_wire_line(3),
    ])]);
    let mut client = AsyncTelemetryClient::new(config(server.port()));

    let items: Vec<_> = client.stream().max_frames(2).collect().await;
    assert_eq!(counters(items), vec![1, 2]);
}

#[tokio::test]
async fn async_stream_continue_handler_reconnects() {
    let server =
        ScriptedServer::spawn(vec![Session::close(lines(&[1])), Session::hold(lines(&[2]))]);
    let mut client = AsyncTelemetryClient::new(config(server.port()));

    let items: Vec<_> = client
        .stream()
        .max_frames(2)
        .on_error(|_| StreamControl::Continue)
        .collect()
        .await;
    assert_eq!(counters(items), vec![1, 2]);
}

#[tokio::test]
async fn async_stream_yields_disconnect_then_ends() {
    let server = ScriptedServer::spawn(vec![Session::close(lines(&[1]))]);
    let mut client = AsyncTelemetryClient::new(config(server.port()));

    let items: Vec<_> = client.stream().collect().await;
    assert_eq!(items.len(), 2);
    assert!(items[1].as_ref().unwrap_err().is_disconnected());
}

#[tokio::test]
async fn async_stream_timeout_yields_once_then_ends() {
    let server = ScriptedServer::spawn(vec![Session::hold(vec![])]);
    let mut client =
        AsyncTelemetryClient::new(config(server.port()).with_read_timeout(Duration::from_millis(50)));

    let items: Vec<_> = client.stream().collect().await;
    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_timeout());
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn async_stream_timeout_continue_keeps_reading() {
    let server =
        ScriptedServer::spawn(vec![Session::hold(lines(&[1])).after(Duration::from_millis(300))]);
    let mut client =
        AsyncTelemetryClient::new(config(server.port()).with_read_timeout(Duration::from_millis(50)));

    let mut timeouts = Vec::new();
    let items: Vec<_> = client
        .stream()
        .max_frames(1)
        .on_error(|e| {
            timeouts.push(e.is_timeout());
            StreamControl::Continue
        })
        .collect()
        .await;

    assert_eq!(counters(items), vec![1]);
    assert!(!timeouts.is_empty());
    assert!(timeouts.iter().all(|t| *t));
    assert_eq!(server.accepts(), 1);
}

#[test]
fn zero_read_timeout_is_raised_to_one_millisecond() {
    let zero = config(unused_port()).with_read_timeout(Duration::ZERO);
    assert_eq!(read_timeout(&zero), Duration::from_millis(1));

    let two_seconds = config(unused_port());
    assert_eq!(read_timeout(&two_seconds), Duration::from_secs(2));
}

#[tokio::test]
async fn async_zero_read_timeout_still_reads_queued_lines() {
    let server = ScriptedServer::spawn(vec![Session::hold(lines(&[6]))]);
    let mut client = AsyncTelemetryClient::new(config(server.port()).with_read_timeout(Duration::ZERO));
    client.connect().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.read().await.unwrap().update_counter, 6);
}

// ----- feed -----

#[tokio::test]
async fn feed_publishes_until_the_source_ends() {
    let server = ScriptedServer::spawn(vec![Session::close(lines(&[1, 2, 3]))]);
    let feed = TelemetryFeed::tcp(config(server.port())).await.unwrap();
    let subscription = feed.subscribe(UpdateRate::Native);

    let seen: Vec<u32> = subscription.map(|snapshot| snapshot.update_counter).collect().await;
    assert!(seen.iter().all(|c| (1..=3).contains(c)));
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(feed.latest().is_none());
}

#[tokio::test]
async fn feed_shutdown_ends_subscribers() {
    let server = ScriptedServer::spawn(vec![Session::hold(lines(&[1]))]);
    let feed = TelemetryFeed::tcp(config(server.port())).await.unwrap();
    let mut subscription = feed.subscribe(UpdateRate::Max(5));

    assert_eq!(subscription.next().await.unwrap().update_counter, 1);
    feed.shutdown();
    assert!(feed.is_shutdown());
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn feed_reports_a_missing_bridge_up_front() {
    let result = TelemetryFeed::tcp(config(unused_port())).await;
    assert!(matches!(result, Err(TelemetryError::Connection { .. })));
}
