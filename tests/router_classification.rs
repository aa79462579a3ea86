// tests/router_classification.rs

use hms_command_server::engine::JobKind;
use hms_command_server::protocol::{CommandResponse, CommandStatus};
use hms_command_server::router::CommandRouter;
use hms_test_utils::builders::{RequestBuilder, mfp, rts, wat};
use hms_test_utils::fake_backend::ScriptedBackend;
use hms_test_utils::{init_tracing, router_with};

async fn send(router: &CommandRouter, document: &str) -> CommandResponse {
    let raw = router.execute(document).await;
    CommandResponse::from_document_str(&raw).expect("router must emit a response document")
}

#[tokio::test]
async fn empty_command_is_undefined_command() {
    init_tracing();
    let router = router_with(ScriptedBackend::new());

    let response = send(&router, &rts("").build()).await;

    assert_eq!(response.command, "UndefinedCommand");
    assert_eq!(response.status, CommandStatus::UndefinedCommand);
    assert_eq!(response.id, "-1");
}

#[tokio::test]
async fn missing_command_is_undefined_command() {
    let router = router_with(ScriptedBackend::new());

    let doc = RequestBuilder::bare().program("RTS").id("3").build();
    let response = send(&router, &doc).await;

    assert_eq!(response.command, "UndefinedCommand");
    assert_eq!(response.status, CommandStatus::UndefinedCommand);
    assert_eq!(response.id, "3");
}

#[tokio::test]
async fn unknown_program_echoes_command() {
    let router = router_with(ScriptedBackend::new());

    let doc = RequestBuilder::new("Foo").program("QUX").build();
    let response = send(&router, &doc).await;

    assert_eq!(response.command, "Foo");
    assert_eq!(response.status, CommandStatus::UndefinedProgram);
    assert!(response.message.contains("QUX"), "{}", response.message);
}

#[tokio::test]
async fn program_names_are_case_sensitive() {
    let router = router_with(ScriptedBackend::new());

    let doc = RequestBuilder::new("Ping").program("rts").build();
    let response = send(&router, &doc).await;

    assert_eq!(response.status, CommandStatus::UndefinedProgram);
}

#[tokio::test]
async fn missing_program_is_undefined_program() {
    let router = router_with(ScriptedBackend::new());

    let doc = RequestBuilder::new("Ping").id("9").build();
    let response = send(&router, &doc).await;

    assert_eq!(response.command, "UndefinedProgram");
    assert_eq!(response.status, CommandStatus::UndefinedProgram);
    assert_eq!(response.id, "9");
}

#[tokio::test]
async fn handler_fault_is_uncaught_exception() {
    init_tracing();
    let backend = ScriptedBackend::new().with_fault(JobKind::Run, "Run 1", "solver diverged");
    let router = router_with(backend);

    for doc in [
        rts("OpenProject").param("project", "Castro").build(),
        rts("CreateRun").param("run", "Run 1").build(),
    ] {
        assert!(send(&router, &doc).await.status.is_ok());
    }

    let response = send(&router, &rts("Compute").id("42").param("run", "Run 1").build()).await;

    assert_eq!(response.command, "UncaughtException");
    assert_eq!(response.id, "42");
    assert_eq!(response.status, CommandStatus::CommandFailed);
    assert!(response.message.contains("\"Compute\""), "{}", response.message);
    let details = response.details.expect("fault details");
    assert!(details.contains("solver diverged"), "{details}");
}

#[tokio::test]
async fn handler_panic_is_uncaught_exception_and_session_survives() {
    let backend = ScriptedBackend::new().with_panic(JobKind::Trial, "T1");
    let router = router_with(backend);

    send(&router, &rts("OpenProject").param("project", "P").build()).await;
    send(&router, &mfp("CreateTrial").param("trial", "T1").build()).await;

    let response = send(&router, &mfp("ComputeTrial").id("5").param("trial", "T1").build()).await;
    assert_eq!(response.command, "UncaughtException");
    assert_eq!(response.status, CommandStatus::CommandFailed);
    assert!(response.details.unwrap_or_default().contains("panicked"));

    let ping = send(&router, &rts("Ping").build()).await;
    assert_eq!(ping.status, CommandStatus::Ok);
}

#[tokio::test]
async fn foreign_root_is_unrecognized() {
    let router = router_with(ScriptedBackend::new());

    let doc = rts("Ping").root("Query").id("8").build();
    let response = send(&router, &doc).await;

    assert_eq!(response.command, "UnrecognizedDocument");
    assert_eq!(response.status, CommandStatus::UnableToProcessDocument);
    assert_eq!(response.id, "8");
}

#[tokio::test]
async fn root_marker_is_case_insensitive() {
    let router = router_with(ScriptedBackend::new());

    let doc = rts("Ping").root("REQUEST").build();
    let response = send(&router, &doc).await;

    assert_eq!(response.status, CommandStatus::Ok);
}

#[tokio::test]
async fn unparseable_text_is_unrecognized_with_default_id() {
    let router = router_with(ScriptedBackend::new());

    for raw in ["", "not json", "{\"Request\": ", "[1,2,3]", "{\"a\":{}, \"b\":{}}"] {
        let response = send(&router, raw).await;
        assert_eq!(response.command, "UnrecognizedDocument", "input {raw:?}");
        assert_eq!(response.status, CommandStatus::UnableToProcessDocument);
        assert_eq!(response.id, "-1");
    }
}

#[tokio::test]
async fn unknown_command_within_program_matches_router_shape() {
    let router = router_with(ScriptedBackend::new());

    let handler_level = send(&router, &wat("Explode").id("11").build()).await;
    let router_level = send(&router, &RequestBuilder::bare().program("WAT").id("11").build()).await;

    assert_eq!(handler_level.command, router_level.command);
    assert_eq!(handler_level.status, router_level.status);
    assert_eq!(handler_level.id, router_level.id);
    for response in [&handler_level, &router_level] {
        assert!(
            response.message.starts_with("Command is not defined: "),
            "{}",
            response.message
        );
    }
}

#[tokio::test]
async fn command_names_resolve_case_insensitively() {
    let router = router_with(ScriptedBackend::new());

    let response = send(&router, &rts("pInG").build()).await;

    assert_eq!(response.status, CommandStatus::Ok);
    assert_eq!(response.command, "pInG");
}

#[tokio::test]
async fn identical_requests_classify_identically() {
    let router = router_with(ScriptedBackend::new());

    let docs = [
        rts("ListRuns").build(),
        RequestBuilder::new("Foo").program("QUX").build(),
        "garbage".to_string(),
        rts("").build(),
    ];
    for doc in docs {
        let first = send(&router, &doc).await;
        let second = send(&router, &doc).await;
        assert_eq!(first.status, second.status, "{doc}");
        assert_eq!(first.command, second.command, "{doc}");
    }
}
