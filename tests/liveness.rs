// tests/liveness.rs

use std::time::Duration;

use tokio::net::TcpListener;

use hms_command_server::config::{LivenessConfig, ServerConfig};
use hms_command_server::endpoint::{RegistryServer, bootstrap};
use hms_command_server::liveness::{EXIT_CLIENT_GONE, LivenessMonitor};
use hms_test_utils::fake_authority::{FakeCheckInAuthority, RecordingTerminator};
use hms_test_utils::fake_backend::ScriptedBackend;
use hms_test_utils::{init_tracing, session_with, with_timeout};

fn liveness(url: Option<String>, max_missed: u32) -> LivenessConfig {
    LivenessConfig {
        checkin_url: url,
        checkin_interval: Duration::from_millis(30),
        max_missed_checkins: max_missed,
    }
}

#[tokio::test]
async fn registers_and_terminates_when_client_is_gone() {
    init_tracing();
    let authority = FakeCheckInAuthority::start().await;
    let terminator = RecordingTerminator::new();

    let monitor = LivenessMonitor::start(
        &liveness(Some(authority.url()), 3),
        "hms://127.0.0.1:1099/HmsCommandServer",
        terminator.clone(),
    )
    .await
    .expect("monitor starts");
    assert!(monitor.is_running());

    let registrations = authority.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].0, std::process::id());
    assert_eq!(registrations[0].1, "hms://127.0.0.1:1099/HmsCommandServer");

    // Healthy heartbeats do not terminate.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(authority.heartbeats() >= 1);
    assert!(terminator.codes().is_empty());

    authority.set_client_alive(false);
    let code = terminator
        .wait_for_termination(Duration::from_secs(2))
        .await;
    assert_eq!(code, Some(EXIT_CLIENT_GONE));
}

#[tokio::test]
async fn consecutive_missed_checkins_terminate() {
    let authority = FakeCheckInAuthority::start().await;
    let terminator = RecordingTerminator::new();

    let _monitor = LivenessMonitor::start(
        &liveness(Some(authority.url()), 2),
        "srv",
        terminator.clone(),
    )
    .await
    .expect("monitor starts");

    authority.shutdown();
    let code = terminator
        .wait_for_termination(Duration::from_secs(2))
        .await;
    assert_eq!(code, Some(EXIT_CLIENT_GONE));
}

#[tokio::test]
async fn unconfigured_authority_disables_monitoring() {
    let monitor =
        LivenessMonitor::start(&liveness(None, 3), "srv", RecordingTerminator::new()).await;
    assert!(monitor.is_none());
}

#[tokio::test]
async fn unbound_authority_is_not_fatal() {
    let registry = RegistryServer::create("127.0.0.1", 0)
        .await
        .expect("registry");
    let url = format!("hms://127.0.0.1:{}/ClientCheckIn", registry.port());
    let terminator = RecordingTerminator::new();

    let monitor = LivenessMonitor::start(&liveness(Some(url), 3), "srv", terminator.clone()).await;

    assert!(monitor.is_none());
    assert!(terminator.codes().is_empty());
}

#[tokio::test]
async fn unreachable_registry_is_not_fatal() {
    // Grab a free port and release it so nothing is listening there.
    let port = {
        let free = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        free.local_addr().expect("addr").port()
    };
    let url = format!("hms://127.0.0.1:{port}/ClientCheckIn");

    let monitor =
        LivenessMonitor::start(&liveness(Some(url), 3), "srv", RecordingTerminator::new()).await;
    assert!(monitor.is_none());
}

#[tokio::test]
async fn bootstrap_attaches_the_monitor_to_the_session() {
    let authority = FakeCheckInAuthority::start().await;
    let config = ServerConfig {
        port: 0,
        hostname: Some("127.0.0.1".to_string()),
        bind_address: "127.0.0.1".to_string(),
        log_file: None,
        liveness: liveness(Some(authority.url()), 3),
    };

    let handle = bootstrap(
        &config,
        session_with(ScriptedBackend::new()),
        RecordingTerminator::new(),
    )
    .await
    .expect("bootstrap");

    assert!(handle.session().has_liveness_monitor());
    let registrations = authority.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].1, handle.address().to_string());
}

#[tokio::test]
async fn unanswered_heartbeats_count_as_missed() {
    let authority = FakeCheckInAuthority::start().await;
    let terminator = RecordingTerminator::new();

    let _monitor = LivenessMonitor::start(
        &liveness(Some(authority.url()), 2),
        "srv",
        terminator.clone(),
    )
    .await
    .expect("monitor starts");

    authority.set_silent(true);
    let code = terminator
        .wait_for_termination(Duration::from_secs(2))
        .await;

    assert_eq!(code, Some(EXIT_CLIENT_GONE));
    assert!(authority.heartbeats() >= 1);
}

#[tokio::test]
async fn silent_checkin_registry_does_not_block_startup() {
    // Accepts connections and holds them open without ever replying.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let holder = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    let url = format!("hms://127.0.0.1:{port}/ClientCheckIn");

    let monitor = with_timeout(LivenessMonitor::start(
        &liveness(Some(url), 3),
        "srv",
        RecordingTerminator::new(),
    ))
    .await;

    assert!(monitor.is_none());
    holder.abort();
}
