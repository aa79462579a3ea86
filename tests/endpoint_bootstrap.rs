// tests/endpoint_bootstrap.rs

use std::sync::Arc;

use tokio::net::TcpListener;

use hms_command_server::client::CommandClient;
use hms_command_server::config::ServerConfig;
use hms_command_server::endpoint::{SERVER_NAME, bootstrap};
use hms_command_server::protocol::CommandStatus;
use hms_test_utils::builders::rts;
use hms_test_utils::fake_authority::RecordingTerminator;
use hms_test_utils::fake_backend::ScriptedBackend;
use hms_test_utils::{init_tracing, session_with, with_timeout};

fn local_config(port: i64) -> ServerConfig {
    ServerConfig {
        port,
        hostname: Some("127.0.0.1".to_string()),
        bind_address: "127.0.0.1".to_string(),
        ..ServerConfig::default()
    }
}

#[tokio::test]
async fn out_of_range_ports_exit_with_code_2() {
    for port in [-1, 65536, 100_000] {
        let err = bootstrap(
            &local_config(port),
            session_with(ScriptedBackend::new()),
            RecordingTerminator::new(),
        )
        .await
        .expect_err("invalid port");
        assert_eq!(err.exit_code(), 2, "port {port}");
    }
}

#[tokio::test]
async fn occupied_port_without_registry_exits_with_code_3() {
    init_tracing();
    // Something that accepts connections but does not speak the registry
    // protocol.
    let squatter = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = squatter.local_addr().expect("addr").port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = squatter.accept().await {
            drop(stream);
        }
    });

    let err = with_timeout(bootstrap(
        &local_config(i64::from(port)),
        session_with(ScriptedBackend::new()),
        RecordingTerminator::new(),
    ))
    .await
    .expect_err("registry cannot be created");

    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn unusable_hostname_exits_with_code_6() {
    let mut config = local_config(0);
    config.hostname = Some("bad host/name".to_string());

    let err = bootstrap(
        &config,
        session_with(ScriptedBackend::new()),
        RecordingTerminator::new(),
    )
    .await
    .expect_err("malformed address");

    assert_eq!(err.exit_code(), 6);
}

#[tokio::test]
async fn published_server_answers_clients() {
    init_tracing();
    let handle = bootstrap(
        &local_config(0),
        session_with(ScriptedBackend::new()),
        RecordingTerminator::new(),
    )
    .await
    .expect("bootstrap");

    assert!(handle.owns_registry());
    assert_eq!(handle.address().name, SERVER_NAME);
    assert_eq!(handle.address().host, "127.0.0.1");
    assert_ne!(handle.registry_port(), 0);

    let url = handle.address().to_string();
    let mut client = with_timeout(CommandClient::connect(&url))
        .await
        .expect("connect");
    client.ping().await.expect("ping");

    let response = client
        .request(&rts("Ping").id("77").build())
        .await
        .expect("execute");
    assert_eq!(response.status, CommandStatus::Ok);
    assert_eq!(response.id, "77");

    let garbage = client.request("<Request/>").await.expect("execute");
    assert_eq!(garbage.status, CommandStatus::UnableToProcessDocument);
}

#[tokio::test]
async fn second_server_reuses_the_existing_registry() {
    let first = bootstrap(
        &local_config(0),
        session_with(ScriptedBackend::new()),
        RecordingTerminator::new(),
    )
    .await
    .expect("first bootstrap");
    let port = first.registry_port();

    let second_session = session_with(ScriptedBackend::new());
    let second = bootstrap(
        &local_config(i64::from(port)),
        Arc::clone(&second_session),
        RecordingTerminator::new(),
    )
    .await
    .expect("second bootstrap");

    assert!(!second.owns_registry());
    assert_eq!(second.registry_port(), port);

    // The name now resolves to the second server's listener.
    let mut client = CommandClient::connect(&second.address().to_string())
        .await
        .expect("connect");
    client
        .request(&rts("Exit").build())
        .await
        .expect("execute");
    assert!(second_session.close_requested());
    assert!(!first.session().close_requested());
}
