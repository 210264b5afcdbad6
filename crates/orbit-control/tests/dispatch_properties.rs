//! End-to-end dispatch behaviour against the mock platform and the file store.

use orbit_control::{
    descriptor_for, CommandDispatcher, CommandOptions, DispatchError, HandlerRegistry,
};
use orbit_platform::{
    CloudPlatform, MockBehavior, MockPlatform, PlatformError, PlatformRegistry, ProcessPlatform,
    ScriptedRunner, TokioCommandRunner,
};
use orbit_state::{FileStateStore, ResourceStateStore};
use orbit_types::{
    CommandKind, ErrorKind, InvocationConfig, PlatformKind, PlatformResources, ResourceState,
    ServiceTarget,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: Arc<FileStateStore>,
    invocation: InvocationConfig,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let invocation = InvocationConfig::new(dir.path(), "local").with_user("ops");
        let store = Arc::new(FileStateStore::new(invocation.state_dir()));
        Self {
            _dir: dir,
            store,
            invocation,
        }
    }

    fn dispatcher(&self, platforms: PlatformRegistry) -> CommandDispatcher {
        CommandDispatcher::builder()
            .with_platforms(platforms)
            .with_store(self.store.clone())
            .build()
            .unwrap()
    }
}

fn mock(name: &str) -> ServiceTarget {
    ServiceTarget::new(name, PlatformKind::Mock)
}

#[tokio::test]
async fn stop_on_process_platform_clears_state() {
    let harness = Harness::new();
    let platforms = PlatformRegistry::new().with(Arc::new(ProcessPlatform::new(Arc::new(
        TokioCommandRunner::new(),
    ))));
    let dispatcher = harness.dispatcher(platforms);

    let mut reapers = Vec::new();
    for name in ["backend", "database"] {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        reapers.push(tokio::spawn(async move { child.wait().await }));
        harness
            .store
            .save(
                &ResourceState::new(name, PlatformKind::Process, "local")
                    .with_resources(PlatformResources::Posix { pid, port: None }),
            )
            .await
            .unwrap();
    }

    let results = dispatcher
        .run(
            CommandKind::Stop,
            vec![
                ServiceTarget::new("backend", PlatformKind::Process),
                ServiceTarget::new("database", PlatformKind::Process),
            ],
            &CommandOptions::new(),
            &harness.invocation,
        )
        .await
        .unwrap();

    assert_eq!(results.summary.total, 2);
    assert_eq!(results.summary.succeeded, 2);
    assert_eq!(results.summary.failed, 0);
    assert!(harness.store.list("local").await.unwrap().is_empty());
    for reaper in reapers {
        reaper.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn backup_fault_on_cloud_is_reported_not_raised() {
    let harness = Harness::new();
    let runner = Arc::new(ScriptedRunner::new());
    runner.push_error(PlatformError::Spawn {
        program: "aws".into(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "aws: command not found"),
    });
    let dispatcher = harness.dispatcher(
        PlatformRegistry::new().with(Arc::new(CloudPlatform::new(runner.clone()))),
    );

    let results = dispatcher
        .run(
            CommandKind::Backup,
            vec![ServiceTarget::new("database", PlatformKind::Cloud)],
            &CommandOptions::new(),
            &harness.invocation,
        )
        .await
        .unwrap();

    assert_eq!(results.summary.total, 1);
    assert_eq!(results.summary.failed, 1);
    let result = &results.results[0];
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("aws: command not found"));
    assert_eq!(result.error_kind, Some(ErrorKind::ExecutionFailure));
    assert_eq!(result.metadata["error_chain"], "aws: command not found");
    assert_eq!(results.aggregate, Some(json!({"backups": []})));
}

#[tokio::test]
async fn missing_handler_names_the_triple() {
    let harness = Harness::new();
    let dispatcher = CommandDispatcher::builder()
        .with_platforms(PlatformRegistry::new().with(Arc::new(MockPlatform::new())))
        .with_handlers(HandlerRegistry::new())
        .with_store(harness.store.clone())
        .build()
        .unwrap();

    let results = dispatcher
        .run(
            CommandKind::Publish,
            vec![mock("frontend")],
            &CommandOptions::new(),
            &harness.invocation,
        )
        .await
        .unwrap();

    let result = &results.results[0];
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::HandlerNotFound));
    assert_eq!(
        result.error.as_deref(),
        Some("No publish handler for generic on mock")
    );
}

#[tokio::test]
async fn continue_on_error_controls_early_exit() {
    let harness = Harness::new();
    let platform = Arc::new(MockPlatform::new());
    platform.script(CommandKind::Start, "b", MockBehavior::Fail("port in use".into()));
    let dispatcher = harness.dispatcher(PlatformRegistry::new().with(platform.clone()));
    let targets = || vec![mock("a"), mock("b"), mock("c"), mock("d")];

    let stopping = descriptor_for(CommandKind::Start).continue_on_error(false);
    let results = dispatcher
        .execute(&stopping, targets(), &CommandOptions::new(), &harness.invocation)
        .await
        .unwrap();
    let names: Vec<_> = results.results.iter().map(|r| r.entity.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(platform.calls_for(CommandKind::Start), vec!["a", "b"]);

    let results = dispatcher
        .run(CommandKind::Start, targets(), &CommandOptions::new(), &harness.invocation)
        .await
        .unwrap();
    assert_eq!(results.summary.total, 4);
    assert_eq!(results.summary.failed, 1);
}

#[tokio::test]
async fn caller_can_override_continue_on_error() {
    let harness = Harness::new();
    let platform = Arc::new(MockPlatform::new());
    platform.script(CommandKind::Restore, "database", MockBehavior::Fail("checksum mismatch".into()));
    let dispatcher = harness.dispatcher(PlatformRegistry::new().with(platform));
    let targets = vec![mock("database"), mock("graph"), mock("filesystem")];

    let options = CommandOptions::new().with("backup", "latest");
    let results = dispatcher
        .run(CommandKind::Restore, targets.clone(), &options, &harness.invocation)
        .await
        .unwrap();
    assert_eq!(results.summary.total, 1);
    assert_eq!(
        results.aggregate,
        Some(json!({"restored": [], "failed": ["database"]}))
    );

    let options = options.with("continue_on_error", true);
    let results = dispatcher
        .run(CommandKind::Restore, targets, &options, &harness.invocation)
        .await
        .unwrap();
    assert_eq!(results.summary.total, 3);
    assert_eq!(
        results.aggregate,
        Some(json!({"restored": ["graph", "filesystem"], "failed": ["database"]}))
    );
}

#[tokio::test]
async fn restore_without_backup_is_rejected() {
    let harness = Harness::new();
    let platform = Arc::new(MockPlatform::new());
    let dispatcher = harness.dispatcher(PlatformRegistry::new().with(platform.clone()));

    let err = dispatcher
        .run(
            CommandKind::Restore,
            vec![mock("database")],
            &CommandOptions::new(),
            &harness.invocation,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation { .. }));
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn panicking_platform_is_contained() {
    let harness = Harness::new();
    let platform = Arc::new(MockPlatform::new());
    platform.script(CommandKind::Test, "worker", MockBehavior::Panic("index out of bounds".into()));
    let dispatcher = harness.dispatcher(PlatformRegistry::new().with(platform));

    let results = dispatcher
        .run(
            CommandKind::Test,
            vec![mock("worker"), mock("backend")],
            &CommandOptions::new(),
            &harness.invocation,
        )
        .await
        .unwrap();

    let worker = results.result_for("worker").unwrap();
    assert!(!worker.success);
    assert_eq!(worker.error.as_deref(), Some("handler panicked: index out of bounds"));
    assert_eq!(worker.metadata["panic"], "true");
    assert!(results.result_for("backend").unwrap().success);
}

#[tokio::test]
async fn start_then_stop_round_trips_state_files() {
    let harness = Harness::new();
    let dispatcher =
        harness.dispatcher(PlatformRegistry::new().with(Arc::new(MockPlatform::new())));
    let targets = vec![mock("backend"), mock("frontend")];

    let started = dispatcher
        .run(CommandKind::Start, targets.clone(), &CommandOptions::new(), &harness.invocation)
        .await
        .unwrap();
    assert_eq!(started.summary.succeeded, 2);
    assert!(harness.store.state_path("local", "backend").exists());
    let saved = harness.store.load("local", "frontend").await.unwrap();
    assert_eq!(saved.endpoint.as_deref(), Some("mock://frontend"));

    let stopped = dispatcher
        .run(CommandKind::Stop, targets, &CommandOptions::new(), &harness.invocation)
        .await
        .unwrap();
    assert_eq!(stopped.summary.succeeded, 2);
    assert!(harness.store.list("local").await.unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_leaves_platform_and_state_alone() {
    let harness = Harness::new();
    let platform = Arc::new(MockPlatform::new());
    let dispatcher = harness.dispatcher(PlatformRegistry::new().with(platform.clone()));
    let invocation = harness.invocation.clone().with_dry_run(true);

    let results = dispatcher
        .run(CommandKind::Start, vec![mock("backend")], &CommandOptions::new(), &invocation)
        .await
        .unwrap();

    assert!(results.execution_context.dry_run);
    assert!(results.results[0].success);
    assert!(platform.calls().is_empty());
    assert!(harness.store.list("local").await.unwrap().is_empty());
}

#[tokio::test]
async fn virtual_targets_fan_out_in_order() {
    let harness = Harness::new();
    let platform = Arc::new(MockPlatform::new());
    let dispatcher = harness.dispatcher(PlatformRegistry::new().with(platform.clone()));

    let results = dispatcher
        .run(
            CommandKind::Check,
            vec![mock("stack").with_config("members", json!(["database", "backend"]))],
            &CommandOptions::new(),
            &harness.invocation,
        )
        .await
        .unwrap();

    assert_eq!(results.summary.total, 2);
    assert_eq!(platform.calls_for(CommandKind::Check), vec!["database", "backend"]);
}

#[derive(Debug, Clone)]
enum Scripted {
    Succeed,
    Fail,
    Fault,
    Unsupported,
}

fn scripted() -> impl Strategy<Value = Scripted> {
    prop_oneof![
        Just(Scripted::Succeed),
        Just(Scripted::Fail),
        Just(Scripted::Fault),
        Just(Scripted::Unsupported),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn envelope_invariants_hold(
        behaviors in prop::collection::vec(scripted(), 0..8),
        continue_on_error in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let harness = Harness::new();
        let platform = Arc::new(MockPlatform::new());
        let mut targets = Vec::new();
        for (i, behavior) in behaviors.iter().enumerate() {
            let name = format!("svc{}", i);
            let scripted = match behavior {
                Scripted::Succeed => MockBehavior::Succeed(json!({})),
                Scripted::Fail => MockBehavior::Fail(String::new()),
                Scripted::Fault => MockBehavior::Fault("fault".into()),
                Scripted::Unsupported => MockBehavior::Unsupported,
            };
            platform.script(CommandKind::Update, &name, scripted);
            targets.push(mock(&name));
        }
        let dispatcher = harness.dispatcher(PlatformRegistry::new().with(platform));
        let options = CommandOptions::new().with("continue_on_error", continue_on_error);

        let results = runtime
            .block_on(dispatcher.run(CommandKind::Update, targets, &options, &harness.invocation))
            .unwrap();

        let summary = results.summary;
        prop_assert_eq!(summary.total, results.results.len());
        prop_assert_eq!(summary.total, summary.succeeded + summary.failed);
        for result in &results.results {
            if !result.success {
                prop_assert!(result.error.as_deref().is_some_and(|e| !e.is_empty()));
            }
        }

        let first_failure = behaviors.iter().position(|b| !matches!(b, Scripted::Succeed));
        let expected = match (continue_on_error, first_failure) {
            (false, Some(index)) => index + 1,
            _ => behaviors.len(),
        };
        prop_assert_eq!(results.results.len(), expected);
    }
}
