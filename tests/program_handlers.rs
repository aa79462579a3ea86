// tests/program_handlers.rs

use hms_command_server::engine::JobKind;
use hms_command_server::protocol::{CommandResponse, CommandStatus};
use hms_command_server::router::CommandRouter;
use hms_test_utils::builders::{mfp, rts, wat};
use hms_test_utils::fake_backend::ScriptedBackend;
use hms_test_utils::{init_tracing, router_with};

async fn send(router: &CommandRouter, document: String) -> CommandResponse {
    let raw = router.execute(&document).await;
    CommandResponse::from_document_str(&raw).expect("response document")
}

async fn open(router: &CommandRouter, project: &str) {
    let response = send(router, rts("OpenProject").param("project", project).build()).await;
    assert_eq!(response.status, CommandStatus::Ok, "{}", response.message);
}

#[tokio::test]
async fn rts_run_lifecycle() {
    init_tracing();
    let backend = ScriptedBackend::new();
    let router = router_with(backend.clone());
    open(&router, "Castro").await;

    let window = send(
        &router,
        rts("SetTimeWindow")
            .param("start", "2024-01-01T00:00")
            .param("end", "2024-01-03T00:00")
            .build(),
    )
    .await;
    assert_eq!(window.status, CommandStatus::Ok);

    let created = send(&router, rts("CreateRun").param("run", "Run 1").build()).await;
    assert_eq!(created.status, CommandStatus::Ok);

    let computed = send(&router, rts("Compute").id("1").param("run", "Run 1").build()).await;
    assert_eq!(computed.status, CommandStatus::Ok);
    assert_eq!(computed.command, "Compute");
    assert_eq!(computed.id, "1");
    let result = computed.result.expect("compute result");
    assert_eq!(result["status"], 0);

    let status = send(&router, rts("GetRunStatus").param("run", "Run 1").build()).await;
    let record = status.result.expect("status result");
    assert_eq!(record["computeCount"], 1);
    assert_eq!(record["lastStatus"], 0);

    let runs = send(&router, rts("ListRuns").build()).await;
    assert_eq!(runs.result.expect("runs"), serde_json::json!(["Run 1"]));

    assert_eq!(backend.calls(), vec![(JobKind::Run, "Run 1".to_string())]);
}

#[tokio::test]
async fn nonzero_compute_status_is_compute_failed() {
    let router = router_with(ScriptedBackend::new().with_status(JobKind::Run, "Run 1", 1));
    open(&router, "P").await;
    send(&router, rts("CreateRun").param("run", "Run 1").build()).await;

    let response = send(&router, rts("Compute").param("run", "Run 1").build()).await;

    assert_eq!(response.status, CommandStatus::ComputeFailed);
    assert!(response.message.contains("returned status 1"), "{}", response.message);
}

#[tokio::test]
async fn missing_parameter_is_invalid_parameter() {
    let router = router_with(ScriptedBackend::new());
    open(&router, "P").await;

    let response = send(&router, rts("CreateRun").id("4").build()).await;

    assert_eq!(response.status, CommandStatus::InvalidParameter);
    assert_eq!(response.command, "CreateRun");
    assert_eq!(response.id, "4");
    assert!(response.message.contains("\"run\""), "{}", response.message);
}

#[tokio::test]
async fn commands_needing_a_project_fail_without_one() {
    let router = router_with(ScriptedBackend::new());

    let response = send(&router, rts("CreateRun").param("run", "Run 1").build()).await;

    assert_eq!(response.status, CommandStatus::InvalidParameter);
    assert!(response.message.contains("open project"), "{}", response.message);
}

#[tokio::test]
async fn unknown_project_is_invalid_parameter() {
    let router = router_with(ScriptedBackend::new().with_missing_project("Ghost"));

    let response = send(&router, rts("OpenProject").param("project", "Ghost").build()).await;

    assert_eq!(response.status, CommandStatus::InvalidParameter);
    assert!(response.message.contains("Ghost"));
}

#[tokio::test]
async fn invalid_time_window_is_rejected() {
    let router = router_with(ScriptedBackend::new());
    open(&router, "P").await;

    let response = send(
        &router,
        rts("SetTimeWindow")
            .param("start", "2024-02-01")
            .param("end", "2024-01-01")
            .build(),
    )
    .await;

    assert_eq!(response.status, CommandStatus::InvalidParameter);
}

#[tokio::test]
async fn duplicate_targets_are_rejected() {
    let router = router_with(ScriptedBackend::new());
    open(&router, "P").await;

    send(&router, mfp("CreateForecast").param("forecast", "F1").build()).await;
    let again = send(&router, mfp("CreateForecast").param("forecast", "F1").build()).await;

    assert_eq!(again.status, CommandStatus::InvalidParameter);
    assert!(again.message.contains("already exists"));
}

#[tokio::test]
async fn mfp_computes_are_visible_through_rts() {
    let router = router_with(ScriptedBackend::new());
    open(&router, "P").await;

    send(&router, mfp("CreateTrial").param("trial", "T1").build()).await;
    let computed = send(&router, mfp("ComputeTrial").param("trial", "T1").build()).await;
    assert_eq!(computed.status, CommandStatus::Ok);

    let selected = send(&router, mfp("SelectTrial").param("trial", "T1").build()).await;
    assert_eq!(selected.status, CommandStatus::Ok);

    let ping = send(&router, rts("Ping").build()).await;
    let last = &ping.result.expect("ping result")["lastCompute"];
    assert_eq!(last["kind"], "Trial");
    assert_eq!(last["name"], "T1");

    let trials = send(&router, mfp("ListTrials").build()).await;
    assert_eq!(trials.result.expect("trials"), serde_json::json!(["T1"]));
}

#[tokio::test]
async fn mfp_exit_closes_the_shared_session() {
    let router = router_with(ScriptedBackend::new());

    let response = send(&router, mfp("Exit").build()).await;

    assert_eq!(response.status, CommandStatus::Ok);
    assert!(router.session().close_requested());

    let state = router.session().lock().await;
    assert_eq!(
        state.active_programs().len(),
        2,
        "MFP construction must also construct RTS"
    );
}

#[tokio::test]
async fn wat_alternatives_compute_their_run() {
    let backend = ScriptedBackend::new().with_status(JobKind::Run, "Run 2", 3);
    let router = router_with(backend.clone());

    let opened = send(&router, wat("OpenProject").param("project", "Basin").build()).await;
    assert_eq!(opened.status, CommandStatus::Ok);
    send(&router, rts("CreateRun").param("run", "Run 2").build()).await;

    let mapped = send(
        &router,
        wat("CreateAlternative")
            .param("alternative", "Alt A")
            .param("run", "Run 2")
            .build(),
    )
    .await;
    assert_eq!(mapped.status, CommandStatus::Ok);

    let computed = send(&router, wat("ComputeAlternative").param("alternative", "Alt A").build()).await;
    assert_eq!(computed.status, CommandStatus::ComputeFailed);

    let unknown = send(&router, wat("ComputeAlternative").param("alternative", "Alt Z").build()).await;
    assert_eq!(unknown.status, CommandStatus::InvalidParameter);

    let listing = send(&router, wat("ListAlternatives").build()).await;
    assert_eq!(
        listing.result.expect("listing"),
        serde_json::json!([{ "alternative": "Alt A", "run": "Run 2" }])
    );
    assert_eq!(backend.calls(), vec![(JobKind::Run, "Run 2".to_string())]);
}

#[tokio::test]
async fn wat_alternative_needs_an_existing_run() {
    let router = router_with(ScriptedBackend::new());
    open(&router, "P").await;

    let response = send(
        &router,
        wat("CreateAlternative")
            .param("alternative", "Alt A")
            .param("run", "Nope")
            .build(),
    )
    .await;

    assert_eq!(response.status, CommandStatus::InvalidParameter);
}
