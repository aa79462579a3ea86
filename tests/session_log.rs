// tests/session_log.rs

use std::fs;

use hms_command_server::engine::JobKind;
use hms_command_server::router::CommandRouter;
use hms_command_server::session_log::SessionLog;
use hms_test_utils::builders::rts;
use hms_test_utils::fake_backend::ScriptedBackend;
use hms_test_utils::session_with_log;

fn contents(log: &SessionLog) -> String {
    fs::read_to_string(log.path()).expect("read log")
}

#[test]
fn opening_creates_parent_directories_and_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs").join("nested").join("server.log");

    let log = SessionLog::open(&path).expect("open");

    assert!(path.is_file());
    assert!(log.is_active());
    assert!(contents(&log).starts_with("Created server log"));
}

#[test]
fn missing_configuration_means_no_log() {
    assert!(SessionLog::from_config(None).is_none());
}

#[test]
fn close_is_idempotent_and_stops_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = SessionLog::open(dir.path().join("server.log")).expect("open");

    log.note("before");
    log.close().expect("close");
    log.close().expect("second close");
    log.note("after");

    assert!(!log.is_active());
    let text = contents(&log);
    assert!(text.contains("before"));
    assert!(!text.contains("after"));
}

#[tokio::test]
async fn transcripts_are_written_until_exit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = SessionLog::open(dir.path().join("server.log")).expect("open");
    let router = CommandRouter::new(session_with_log(ScriptedBackend::new(), log.clone()));

    router.execute(&rts("Ping").id("1").build()).await;
    let text = contents(&log);
    assert!(text.contains("Request: "), "{text}");
    assert!(text.contains("Response: "), "{text}");
    assert!(text.contains("\"Ping\""), "{text}");

    router.execute(&rts("Exit").id("2").build()).await;
    assert!(!log.is_active());
    assert!(router.session().session_log().is_none());
    let at_exit = contents(&log);
    // The exit response itself is still recorded.
    assert!(at_exit.contains("\"Exit\""), "{at_exit}");

    router.execute(&rts("Ping").id("3").build()).await;
    assert_eq!(contents(&log), at_exit);
}

#[tokio::test]
async fn faults_are_written_with_their_cause() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = SessionLog::open(dir.path().join("server.log")).expect("open");
    let backend = ScriptedBackend::new().with_fault(JobKind::Run, "Run 1", "matrix is singular");
    let router = CommandRouter::new(session_with_log(backend, log.clone()));

    router
        .execute(&rts("OpenProject").param("project", "P").build())
        .await;
    router
        .execute(&rts("CreateRun").param("run", "Run 1").build())
        .await;
    router
        .execute(&rts("Compute").param("run", "Run 1").build())
        .await;

    let text = contents(&log);
    let (_, fault) = text
        .split_once("Fault executing")
        .unwrap_or_else(|| panic!("no fault entry in:\n{text}"));
    let (fault, _) = fault.split_once("Response: ").unwrap_or((fault, ""));
    assert!(fault.contains("matrix is singular"), "{fault}");
}

#[tokio::test]
async fn exit_releases_the_log_before_the_response_is_returned() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = SessionLog::open(dir.path().join("server.log")).expect("open");
    let router = CommandRouter::new(session_with_log(ScriptedBackend::new(), log.clone()));

    let response = router.respond(&rts("Exit").id("9").build()).await;

    assert!(response.status.is_ok());
    assert!(!log.is_active());
    let text = contents(&log);
    let request_at = text.find("Request: ").expect("request transcript");
    let response_at = text.find("Response: ").expect("response transcript");
    assert!(request_at < response_at, "{text}");
}
