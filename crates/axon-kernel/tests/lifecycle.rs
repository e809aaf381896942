//! End-to-end session lifecycle tests: mount-plan walking, turn execution,
//! hook verdict reconciliation, injection budgets, approvals, cancellation,
//! and fork lineage.

use std::sync::Arc;

use serde_json::{json, Value};

use axon_core::config::MountPlan;
use axon_core::hooks::{ApprovalDefault, HookResult, InjectionRole, NoticeLevel};
use axon_core::messages::ChatRole;
use axon_kernel::testing::{
    EchoTool, FakeOrchestrator, FakeProvider, FnOrchestrator, MemoryContext, RecorderHookModule,
    RecordingDisplay, RecordingHandler, ScriptedApproval, StaticModule, TableLoader,
};
use axon_kernel::{
    EventVerdict, ModuleInstance, MountPoint, Session, SessionState, INJECTION_HARD_LIMIT,
};

const OBSERVED_EVENTS: &[&str] = &[
    "session:start",
    "session:end",
    "session:fork",
    "turn:start",
    "turn:end",
    "turn:error",
    "hook:context_injection",
    "approval:requested",
    "approval:decision",
    "approval:timeout",
    "cancel:requested",
    "cancel:completed",
];

struct Harness {
    loader: Arc<TableLoader>,
    context: Arc<MemoryContext>,
    recorder: Arc<RecordingHandler>,
}

impl Harness {
    fn new() -> Self {
        let loader = TableLoader::new();
        let context = MemoryContext::new();
        let recorder = RecordingHandler::continuing();

        let ctx = context.clone();
        loader.insert(
            "ctx-mem",
            StaticModule::new(move || ModuleInstance::Context(ctx.clone())),
        );
        loader.insert(
            "loop-basic",
            StaticModule::new(|| {
                ModuleInstance::Orchestrator(FakeOrchestrator::new("orchestrated"))
            }),
        );
        loader.insert(
            "prov-echo",
            StaticModule::new(|| ModuleInstance::Provider(FakeProvider::new("echo", "hi"))),
        );
        loader.insert(
            "tool-echo",
            StaticModule::new(|| ModuleInstance::Tool(EchoTool::new("echo"))),
        );
        loader.insert(
            "recorder",
            RecorderHookModule::new("recorder", OBSERVED_EVENTS.iter().copied(), recorder.clone()),
        );

        Self {
            loader,
            context,
            recorder,
        }
    }

    fn plan(&self) -> MountPlan {
        MountPlan::parse(json!({
            "session": {"orchestrator": "loop-basic", "context": "ctx-mem"},
            "providers": [{"module": "prov-echo"}],
            "tools": [{"module": "tool-echo"}],
            "hooks": [{"module": "recorder"}]
        }))
        .unwrap()
    }

    fn session(&self) -> Session {
        Session::builder(self.plan(), self.loader.clone()).build()
    }
}

// --- Lifecycle basics ---

#[tokio::test]
async fn execute_before_initialize_is_rejected() {
    let harness = Harness::new();
    let session = harness.session();
    let err = session.execute("hello").await.unwrap_err();
    assert!(err.to_string().contains("not initialized"));
}

#[tokio::test]
async fn initialize_mounts_the_whole_plan() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    assert_eq!(session.state(), SessionState::Initialized);
    let coordinator = session.coordinator();
    assert!(coordinator.orchestrator().is_some());
    assert!(coordinator.context().is_some());
    assert_eq!(coordinator.mounted_names(MountPoint::Providers), ["echo"]);
    assert_eq!(coordinator.mounted_names(MountPoint::Tools), ["echo"]);
    assert_eq!(coordinator.mounted_names(MountPoint::Hooks), ["recorder"]);
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    session.initialize().await.unwrap();

    assert_eq!(harness.recorder.payloads_for("session:start").len(), 1);
}

#[tokio::test]
async fn session_start_carries_startup_source_and_lineage_defaults() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    let starts = harness.recorder.payloads_for("session:start");
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0]["source"], "startup");
    assert_eq!(starts[0]["session_id"], session.session_id().as_str());
    assert_eq!(starts[0]["parent_id"], Value::Null);
    assert!(starts[0]["ts"].is_string());
    assert!(starts[0]["seq"].is_u64());
    // No turn open yet.
    assert!(starts[0].get("turn_id").is_none());
}

#[tokio::test]
async fn missing_context_module_is_fatal() {
    let harness = Harness::new();
    let plan = MountPlan::parse(json!({
        "session": {"orchestrator": "loop-basic", "context": "no-such-context"},
        "providers": [{"module": "prov-echo"}]
    }))
    .unwrap();
    let session = Session::builder(plan, harness.loader.clone()).build();

    let err = session.initialize().await.unwrap_err();
    assert!(err.to_string().contains("no-such-context"));
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn failed_optional_modules_are_skipped() {
    let harness = Harness::new();
    harness
        .loader
        .insert("tool-broken", StaticModule::failing("config rejected"));
    let plan = MountPlan::parse(json!({
        "session": {"orchestrator": "loop-basic", "context": "ctx-mem"},
        "providers": [{"module": "prov-echo"}],
        "tools": [{"module": "tool-broken"}, {"module": "tool-echo"}]
    }))
    .unwrap();
    let session = Session::builder(plan, harness.loader.clone()).build();

    session.initialize().await.unwrap();
    assert_eq!(
        session.coordinator().mounted_names(MountPoint::Tools),
        ["echo"]
    );
}

#[tokio::test]
async fn zero_mounted_providers_fails_initialization() {
    let harness = Harness::new();
    let plan = MountPlan::parse(json!({
        "session": {"orchestrator": "loop-basic", "context": "ctx-mem"},
        "providers": [{"module": "no-such-provider"}]
    }))
    .unwrap();
    let session = Session::builder(plan, harness.loader.clone()).build();

    let err = session.initialize().await.unwrap_err();
    assert!(err.to_string().contains("at least one provider"));
}

// --- Turns ---

#[tokio::test]
async fn execute_brackets_the_turn_with_events() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    let result = session.execute("do things").await.unwrap();
    assert_eq!(result, "orchestrated");

    let starts = harness.recorder.payloads_for("turn:start");
    let ends = harness.recorder.payloads_for("turn:end");
    assert_eq!(starts.len(), 1);
    assert_eq!(ends.len(), 1);
    assert_eq!(starts[0]["prompt"], "do things");
    assert_eq!(ends[0]["ok"], true);

    // Same non-null turn id on both ends of the bracket.
    let turn_id = starts[0]["turn_id"].as_str().unwrap();
    assert!(turn_id.starts_with("turn_"));
    assert_eq!(ends[0]["turn_id"], turn_id);

    // The turn is closed afterwards.
    assert!(session.coordinator().current_turn().is_none());
}

#[tokio::test]
async fn each_turn_gets_a_fresh_id_and_budget() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    session.execute("one").await.unwrap();
    session.execute("two").await.unwrap();

    let starts = harness.recorder.payloads_for("turn:start");
    assert_eq!(starts.len(), 2);
    assert_ne!(starts[0]["turn_id"], starts[1]["turn_id"]);
}

#[tokio::test]
async fn seq_is_strictly_increasing_across_all_events() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    session.execute("one").await.unwrap();
    session.cleanup().await;

    let seqs: Vec<u64> = harness
        .recorder
        .seen()
        .iter()
        .map(|(_, payload)| payload["seq"].as_u64().unwrap())
        .collect();
    assert!(!seqs.is_empty());
    for pair in seqs.windows(2) {
        assert!(pair[0] < pair[1], "seq not strictly increasing: {seqs:?}");
    }
}

#[tokio::test]
async fn orchestrator_error_emits_turn_error_then_turn_end() {
    let harness = Harness::new();
    harness.loader.insert(
        "loop-broken",
        StaticModule::new(|| {
            ModuleInstance::Orchestrator(Arc::new(FnOrchestrator(
                |_prompt, _coordinator, _cancel| async {
                    Err::<String, _>(axon_core::errors::KernelError::Orchestration(
                        "provider exploded".into(),
                    ))
                },
            )))
        }),
    );
    let plan = MountPlan::parse(json!({
        "session": {"orchestrator": "loop-broken", "context": "ctx-mem"},
        "providers": [{"module": "prov-echo"}],
        "hooks": [{"module": "recorder"}]
    }))
    .unwrap();
    let session = Session::builder(plan, harness.loader.clone()).build();
    session.initialize().await.unwrap();

    let err = session.execute("boom").await.unwrap_err();
    assert!(err.to_string().contains("provider exploded"));

    let errors = harness.recorder.payloads_for("turn:error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "orchestration");
    assert_eq!(harness.recorder.payloads_for("turn:end").len(), 1);

    // Non-fatal: the session survives and can run again.
    assert_eq!(session.state(), SessionState::Initialized);
}

#[tokio::test]
async fn immediate_cancellation_surfaces_as_cancelled_error() {
    let harness = Harness::new();
    harness.loader.insert(
        "loop-cancelling",
        StaticModule::new(|| {
            ModuleInstance::Orchestrator(Arc::new(FnOrchestrator(
                |_prompt, _coordinator, cancel: axon_kernel::CancellationToken| async move {
                    cancel.request_immediate().await;
                    Ok::<_, axon_core::errors::KernelError>("ignored".to_owned())
                },
            )))
        }),
    );
    let plan = MountPlan::parse(json!({
        "session": {"orchestrator": "loop-cancelling", "context": "ctx-mem"},
        "providers": [{"module": "prov-echo"}],
        "hooks": [{"module": "recorder"}]
    }))
    .unwrap();
    let session = Session::builder(plan, harness.loader.clone()).build();
    session.initialize().await.unwrap();

    let err = session.execute("stop me").await.unwrap_err();
    assert!(matches!(err, axon_core::errors::KernelError::Cancelled));
    // turn:end still emitted.
    assert_eq!(harness.recorder.payloads_for("turn:end").len(), 1);
}

// --- Hook verdicts through a full session ---

#[tokio::test]
async fn deny_short_circuits_and_later_handlers_never_run() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    let hooks = session.coordinator().hooks();
    let first = RecordingHandler::continuing();
    let blocker = RecordingHandler::new(HookResult::deny("blocked"));
    let after = RecordingHandler::continuing();
    hooks.register("tool:pre", "first", first.clone(), 0);
    hooks.register("tool:pre", "blocker", blocker.clone(), 10);
    hooks.register("tool:pre", "after", after.clone(), 20);

    let verdict = session
        .coordinator()
        .dispatch("tool:pre", json!({"tool_name": "bash"}))
        .await;

    assert_eq!(
        verdict,
        EventVerdict::Deny {
            reason: "blocked".into()
        }
    );
    assert_eq!(first.seen().len(), 1);
    assert_eq!(blocker.seen().len(), 1);
    assert_eq!(after.seen().len(), 0);
}

// --- Injection budgets (3000 / 2000 / 12000 walk) ---

#[tokio::test]
async fn injection_budget_walk() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();
    let hooks = coordinator.hooks();

    hooks.register(
        "step:one",
        "inject-3000",
        RecordingHandler::new(HookResult::inject("a".repeat(3000), InjectionRole::System)),
        0,
    );
    hooks.register(
        "step:two",
        "inject-2000",
        RecordingHandler::new(HookResult::inject("b".repeat(2000), InjectionRole::System)),
        0,
    );
    hooks.register(
        "step:three",
        "inject-12000",
        RecordingHandler::new(HookResult::inject("c".repeat(12_000), InjectionRole::System)),
        0,
    );

    coordinator.dispatch("step:one", json!({})).await;
    assert_eq!(coordinator.turn_injected_bytes(), 3000);

    // Over the soft budget: accepted with a warning.
    coordinator.dispatch("step:two", json!({})).await;
    assert_eq!(coordinator.turn_injected_bytes(), 5000);

    // Over the hard limit: dropped, counter unchanged.
    coordinator.dispatch("step:three", json!({})).await;
    assert_eq!(coordinator.turn_injected_bytes(), 5000);

    // Only the two accepted injections reached the context.
    let messages = harness.context.snapshot();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content.len(), 3000);
    assert_eq!(messages[0].role, ChatRole::System);
    assert_eq!(messages[0].metadata["source"], json!("hook"));
    assert_eq!(messages[0].metadata["hook_name"], json!("inject-3000"));
    assert_eq!(messages[0].metadata["event"], json!("step:one"));

    // Audit trail: two accepted, one rejected.
    let audits = harness.recorder.payloads_for("hook:context_injection");
    let accepted = audits.iter().filter(|p| p["accepted"] == true).count();
    let rejected = audits.iter().filter(|p| p["accepted"] == false).count();
    assert_eq!((accepted, rejected), (2, 1));
}

#[tokio::test]
async fn injection_hard_limit_boundary() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();
    let hooks = coordinator.hooks();

    hooks.register(
        "exact:limit",
        "at-limit",
        RecordingHandler::new(HookResult::inject(
            "x".repeat(INJECTION_HARD_LIMIT),
            InjectionRole::System,
        )),
        0,
    );
    hooks.register(
        "over:limit",
        "over-limit",
        RecordingHandler::new(HookResult::inject(
            "x".repeat(INJECTION_HARD_LIMIT + 1),
            InjectionRole::System,
        )),
        0,
    );

    coordinator.dispatch("exact:limit", json!({})).await;
    assert_eq!(coordinator.turn_injected_bytes(), INJECTION_HARD_LIMIT);
    assert_eq!(harness.context.snapshot().len(), 1);

    coordinator.dispatch("over:limit", json!({})).await;
    assert_eq!(coordinator.turn_injected_bytes(), INJECTION_HARD_LIMIT);
    assert_eq!(harness.context.snapshot().len(), 1);
}

#[tokio::test]
async fn ephemeral_injection_counts_but_is_not_persisted() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();

    let mut result = HookResult::inject("transient note", InjectionRole::System);
    result.ephemeral = true;
    coordinator
        .hooks()
        .register("step:eph", "ephemeral", RecordingHandler::new(result), 0);

    coordinator.dispatch("step:eph", json!({})).await;
    assert_eq!(coordinator.turn_injected_bytes(), "transient note".len());
    assert!(harness.context.snapshot().is_empty());
}

#[tokio::test]
async fn budget_resets_between_turns() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();

    coordinator.hooks().register(
        "turn:start",
        "turn-injector",
        RecordingHandler::new(HookResult::inject("y".repeat(100), InjectionRole::System)),
        0,
    );

    session.execute("one").await.unwrap();
    session.execute("two").await.unwrap();

    // Each turn counted its own injection, not an accumulation.
    assert_eq!(coordinator.turn_injected_bytes(), 100);
    assert_eq!(harness.context.snapshot().len(), 2);
}

// --- User notices ---

#[tokio::test]
async fn user_messages_reach_the_display_system() {
    let harness = Harness::new();
    let display = RecordingDisplay::new();
    let session = Session::builder(harness.plan(), harness.loader.clone())
        .display_system(display.clone())
        .build();
    session.initialize().await.unwrap();

    session.coordinator().hooks().register(
        "tool:post",
        "warner",
        RecordingHandler::new(
            HookResult::proceed().with_user_message("3 lint errors", NoticeLevel::Warning),
        ),
        0,
    );
    session.coordinator().dispatch("tool:post", json!({})).await;

    let messages = display.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "3 lint errors");
    assert_eq!(messages[0].1, NoticeLevel::Warning);
    assert_eq!(messages[0].2, "hook:warner");
}

// --- Approvals ---

fn gate_result(timeout_secs: f64, options: Option<Vec<String>>) -> HookResult {
    let mut result = HookResult::ask_user("Run the migration?");
    result.approval_timeout = timeout_secs;
    result.approval_options = options;
    result.approval_default = ApprovalDefault::Deny;
    result
}

#[tokio::test]
async fn approval_allow_continues() {
    let harness = Harness::new();
    let approval = ScriptedApproval::responding("Allow");
    let session = Session::builder(harness.plan(), harness.loader.clone())
        .approval_system(approval.clone())
        .build();
    session.initialize().await.unwrap();

    session
        .coordinator()
        .hooks()
        .register("tool:pre", "gate", RecordingHandler::new(gate_result(5.0, None)), 0);

    let verdict = session.coordinator().dispatch("tool:pre", json!({})).await;
    assert!(matches!(verdict, EventVerdict::Continue { .. }));
    assert_eq!(approval.requests(), ["Run the migration?"]);
}

#[tokio::test]
async fn approval_deny_option_denies() {
    let harness = Harness::new();
    let approval = ScriptedApproval::responding("Deny");
    let session = Session::builder(harness.plan(), harness.loader.clone())
        .approval_system(approval)
        .build();
    session.initialize().await.unwrap();

    session
        .coordinator()
        .hooks()
        .register("tool:pre", "gate", RecordingHandler::new(gate_result(5.0, None)), 0);

    let verdict = session.coordinator().dispatch("tool:pre", json!({})).await;
    match verdict {
        EventVerdict::Deny { reason } => assert!(reason.contains("user denied")),
        other => panic!("expected deny, got {other:?}"),
    }
}

#[tokio::test]
async fn approval_response_outside_options_is_deny() {
    let harness = Harness::new();
    let approval = ScriptedApproval::responding("Maybe");
    let session = Session::builder(harness.plan(), harness.loader.clone())
        .approval_system(approval)
        .build();
    session.initialize().await.unwrap();

    session
        .coordinator()
        .hooks()
        .register("tool:pre", "gate", RecordingHandler::new(gate_result(5.0, None)), 0);

    let verdict = session.coordinator().dispatch("tool:pre", json!({})).await;
    match verdict {
        EventVerdict::Deny { reason } => assert!(reason.contains("invalid approval response")),
        other => panic!("expected deny, got {other:?}"),
    }
}

#[tokio::test]
async fn approval_timeout_maps_to_default_deny() {
    let harness = Harness::new();
    let approval = ScriptedApproval::blocking();
    let session = Session::builder(harness.plan(), harness.loader.clone())
        .approval_system(approval)
        .build();
    session.initialize().await.unwrap();

    session
        .coordinator()
        .hooks()
        .register("tool:pre", "gate", RecordingHandler::new(gate_result(0.01, None)), 0);

    let verdict = session.coordinator().dispatch("tool:pre", json!({})).await;
    match verdict {
        EventVerdict::Deny { reason } => assert!(reason.contains("timeout")),
        other => panic!("expected deny, got {other:?}"),
    }
    assert_eq!(harness.recorder.payloads_for("approval:timeout").len(), 1);
}

#[tokio::test]
async fn allow_always_is_cached_for_the_session() {
    let harness = Harness::new();
    let approval = ScriptedApproval::responding("Allow always");
    let session = Session::builder(harness.plan(), harness.loader.clone())
        .approval_system(approval.clone())
        .build();
    session.initialize().await.unwrap();

    let options = Some(vec![
        "Allow".to_owned(),
        "Allow always".to_owned(),
        "Deny".to_owned(),
    ]);
    session.coordinator().hooks().register(
        "tool:pre",
        "gate",
        RecordingHandler::new(gate_result(5.0, options)),
        0,
    );

    let first = session.coordinator().dispatch("tool:pre", json!({})).await;
    let second = session.coordinator().dispatch("tool:pre", json!({})).await;

    assert!(matches!(first, EventVerdict::Continue { .. }));
    assert!(matches!(second, EventVerdict::Continue { .. }));
    // The external system was only consulted once; the second decision came
    // from the session cache.
    assert_eq!(approval.requests().len(), 1);

    let decisions = harness.recorder.payloads_for("approval:decision");
    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0]["cached"], false);
    assert_eq!(decisions[1]["cached"], true);
}

#[tokio::test]
async fn approval_without_system_is_deny() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    session
        .coordinator()
        .hooks()
        .register("tool:pre", "gate", RecordingHandler::new(gate_result(5.0, None)), 0);

    let verdict = session.coordinator().dispatch("tool:pre", json!({})).await;
    match verdict {
        EventVerdict::Deny { reason } => assert!(reason.contains("no approval system")),
        other => panic!("expected deny, got {other:?}"),
    }
}

// --- Fork lineage ---

#[tokio::test]
async fn fork_records_lineage_and_emits_session_fork() {
    let harness = Harness::new();
    let parent = harness.session();
    parent.initialize().await.unwrap();

    let child = parent.fork(None).await.unwrap();
    assert_eq!(child.parent_id(), Some(parent.session_id()));

    child.initialize().await.unwrap();

    // The shared recorder observed the child's events too (same module).
    let forks: Vec<Value> = harness
        .recorder
        .payloads_for("session:fork")
        .into_iter()
        .filter(|p| p["session_id"] == child.session_id().as_str())
        .collect();
    assert_eq!(forks.len(), 1);
    assert_eq!(forks[0]["parent_id"], parent.session_id().as_str());

    let child_starts: Vec<Value> = harness
        .recorder
        .payloads_for("session:start")
        .into_iter()
        .filter(|p| p["session_id"] == child.session_id().as_str())
        .collect();
    assert_eq!(child_starts[0]["source"], "fork");
}

#[tokio::test]
async fn fork_overlay_shallow_merges_the_plan() {
    let harness = Harness::new();
    let parent = harness.session();
    parent.initialize().await.unwrap();

    let child = parent
        .fork(Some(&json!({"tools": []})))
        .await
        .unwrap();
    child.initialize().await.unwrap();

    assert!(child
        .coordinator()
        .mounted_names(MountPoint::Tools)
        .is_empty());
    // Providers untouched by the overlay.
    assert_eq!(
        child.coordinator().mounted_names(MountPoint::Providers),
        ["echo"]
    );
}

#[tokio::test]
async fn parent_cancellation_propagates_to_children() {
    let harness = Harness::new();
    let parent = harness.session();
    parent.initialize().await.unwrap();
    let child = parent.fork(None).await.unwrap();

    parent.request_graceful().await;
    assert!(child.coordinator().cancellation().is_graceful());
}

#[tokio::test]
async fn parent_cleanup_leaves_children_alive() {
    let harness = Harness::new();
    let parent = harness.session();
    parent.initialize().await.unwrap();
    let child = parent.fork(None).await.unwrap();
    child.initialize().await.unwrap();

    parent.cleanup().await;
    assert_eq!(parent.state(), SessionState::CleanedUp);
    assert_eq!(child.state(), SessionState::Initialized);
}

// --- Cancellation events ---

#[tokio::test]
async fn cancel_requests_emit_events_once() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    assert!(session.request_graceful().await);
    assert!(!session.request_graceful().await);
    assert!(session.request_immediate().await);

    let requested = harness.recorder.payloads_for("cancel:requested");
    assert_eq!(requested.len(), 2);
    assert_eq!(requested[0]["mode"], "graceful");
    assert_eq!(requested[1]["mode"], "immediate");
    assert_eq!(harness.recorder.payloads_for("cancel:completed").len(), 2);
}

// --- Cleanup ---

#[tokio::test]
async fn cleanup_is_idempotent_and_emits_session_end() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    session.cleanup().await;
    session.cleanup().await;

    assert_eq!(session.state(), SessionState::CleanedUp);
    assert_eq!(harness.recorder.payloads_for("session:end").len(), 1);
    assert!(session.coordinator().cancellation().is_cancelled());

    // A cleaned-up session refuses new turns.
    assert!(session.execute("again").await.is_err());
}

#[tokio::test]
async fn scoped_initializes_and_always_cleans_up() {
    let harness = Harness::new();
    let session = harness.session();

    let result = session
        .scoped(|session| async move { session.execute("scoped work").await })
        .await
        .unwrap();

    assert_eq!(result, "orchestrated");
    assert_eq!(harness.recorder.payloads_for("session:start").len(), 1);
    assert_eq!(harness.recorder.payloads_for("session:end").len(), 1);
}

// --- Mount table round-trips ---

#[tokio::test]
async fn mount_unmount_roundtrip() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();

    assert!(coordinator.tool("echo").is_some());
    assert!(coordinator.unmount(MountPoint::Tools, Some("echo")).await);
    assert!(coordinator.tool("echo").is_none());
    assert!(!coordinator.unmount(MountPoint::Tools, Some("echo")).await);
}

#[tokio::test]
async fn duplicate_tool_name_replaces_first() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();

    let original = coordinator.tool("echo").unwrap();
    let replacement = EchoTool::new("echo");
    coordinator
        .mount(ModuleInstance::Tool(replacement.clone()), None, None)
        .unwrap();

    let tools = coordinator.tools();
    assert_eq!(tools.len(), 1);
    let stored = Arc::as_ptr(&tools[0].1) as *const ();
    assert_eq!(stored, Arc::as_ptr(&replacement) as *const ());
    assert_ne!(stored, Arc::as_ptr(&original) as *const ());
}

#[tokio::test]
async fn second_orchestrator_mount_conflicts() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    let err = session
        .coordinator()
        .mount(
            ModuleInstance::Orchestrator(FakeOrchestrator::new("other")),
            None,
            None,
        )
        .unwrap_err();
    assert!(err.to_string().contains("already occupied"));
}

#[tokio::test]
async fn capability_is_last_writer_wins() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();

    assert!(coordinator.get_capability("bus").is_none());
    coordinator.register_capability("bus", json!("v1"));
    coordinator.register_capability("bus", json!("v2"));
    assert_eq!(coordinator.get_capability("bus"), Some(json!("v2")));
}

#[tokio::test]
async fn contributions_concatenate_in_registration_order() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();

    coordinator.register_contributor(
        "system-prompt",
        "a",
        Box::new(|| Box::pin(async { Ok(json!("alpha")) })),
    );
    coordinator.register_contributor(
        "system-prompt",
        "broken",
        Box::new(|| Box::pin(async { Err("unavailable".into()) })),
    );
    coordinator.register_contributor(
        "system-prompt",
        "b",
        Box::new(|| Box::pin(async { Ok(json!("beta")) })),
    );

    let collected = coordinator.collect_contributions("system-prompt").await;
    assert_eq!(collected, vec![json!("alpha"), json!("beta")]);
    assert!(coordinator.collect_contributions("empty").await.is_empty());
}

#[tokio::test]
async fn cleanup_callbacks_run_in_reverse_order() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();
    let coordinator = session.coordinator();

    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for label in ["first", "second"] {
        let order = order.clone();
        coordinator.register_cleanup(Box::new(move || {
            let order = order.clone();
            Box::pin(async move {
                order.lock().push(label);
                Ok(())
            })
        }));
    }

    session.cleanup().await;
    assert_eq!(*order.lock(), vec!["second", "first"]);
}

// --- Observer bookkeeping ---

#[tokio::test]
async fn observers_stay_enumerable() {
    let harness = Harness::new();
    let session = harness.session();
    session.initialize().await.unwrap();

    let observers = session.coordinator().observers();
    assert_eq!(observers.len(), 1);
    assert_eq!(observers[0].0, "recorder");
    assert_eq!(observers[0].1.name(), "recorder");
}
