//! Command handlers driven directly against a scripted service.

use emulator_client::cli::args::{
    CreditsArgs, DepsArgs, HistoryArgs, RerunArgs, RunArgs, ShowArgs, UploadArgs, VarArg,
    WatchArgs,
};
use emulator_client::cli::commands::{self, Context};
use emulator_client::cli::Verbosity;
use emulator_client::config::ClientConfig;
use emulator_client::protocol::{ExecutionOutcome, HistoricalRun, ProgramInfo, UserInfo};
use emulator_client::runtime::{Advisory, Architecture};
use emulator_client::service::scripted::Op;
use emulator_client::service::{ScriptedService, ServiceCall};
use emulator_client::ClientError;
use std::io::Write;
use std::sync::Arc;

fn context(svc: Arc<ScriptedService>, user: Option<&str>) -> Context {
    let mut config = ClientConfig::default();
    config.user = user.map(str::to_string);
    config.refresh.interval_ms = 10;
    Context::with_service(config, svc, Verbosity::Quiet, true)
}

#[tokio::test]
async fn run_applies_variables_and_refreshes_balance() {
    let svc = Arc::new(
        ScriptedService::new()
            .with_program("loop")
            .with_credits(100)
            .with_max_level(2)
            .with_inputs(["x1"]),
    );
    svc.push_execution(ExecutionOutcome {
        cycles: 4,
        ..Default::default()
    });
    let ctx = context(svc.clone(), Some("alice"));

    commands::run(
        &ctx,
        RunArgs {
            name: "loop".into(),
            function: false,
            level: 1,
            arch: "2".into(),
            vars: vec![
                VarArg {
                    name: Some("x1".into()),
                    value: 3,
                },
                VarArg {
                    name: None,
                    value: 8,
                },
            ],
        },
    )
    .await
    .unwrap();

    assert!(svc.calls().contains(&ServiceCall::Execute {
        expansion_level: 1,
        architecture: Architecture::II,
        input: vec![3, 8],
    }));
    // Initial load and post-run reconciliation.
    assert_eq!(svc.count(Op::UserCredits), 2);
}

#[tokio::test]
async fn unknown_architecture_selector_falls_back_to_first_tier() {
    let svc = Arc::new(ScriptedService::new().with_program("loop").with_max_level(0));
    let ctx = context(svc.clone(), None);

    commands::run(
        &ctx,
        RunArgs {
            name: "loop".into(),
            function: false,
            level: 0,
            arch: "warp".into(),
            vars: vec![],
        },
    )
    .await
    .unwrap();

    assert!(svc.calls().contains(&ServiceCall::CheckRunnable {
        expansion_level: 0,
        architecture: Architecture::I,
    }));
}

#[tokio::test]
async fn history_uses_configured_user() {
    let svc = Arc::new(ScriptedService::new());
    let ctx = context(svc.clone(), Some("alice"));
    commands::history(&ctx, HistoryArgs { of: None }).await.unwrap();
    commands::history(
        &ctx,
        HistoryArgs {
            of: Some("bob".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(
        svc.calls(),
        vec![
            ServiceCall::UserStatistics("alice".into()),
            ServiceCall::UserStatistics("bob".into()),
        ]
    );
}

#[tokio::test]
async fn rerun_of_missing_index_is_an_error() {
    let svc = Arc::new(ScriptedService::new());
    let ctx = context(svc.clone(), Some("alice"));
    let err = commands::rerun(
        &ctx,
        RerunArgs {
            index: 7,
            of: None,
            program: None,
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("no run with index 7"));
    assert_eq!(svc.count(Op::Execute), 0);
}

#[tokio::test]
async fn credits_add_then_confirm() {
    let svc = Arc::new(ScriptedService::new().with_credits(10));
    let ctx = context(svc.clone(), Some("alice"));
    commands::credits(&ctx, CreditsArgs { add: Some(50) })
        .await
        .unwrap();
    assert_eq!(
        svc.calls(),
        vec![ServiceCall::AddCredits(50), ServiceCall::UserCredits]
    );
}

#[tokio::test]
async fn deps_for_function_also_loads_callers() {
    let svc = Arc::new(
        ScriptedService::new()
            .with_dependencies("fib", ["add"])
            .with_used_by("fib", ["main"]),
    );
    let ctx = context(svc.clone(), None);
    commands::deps(
        &ctx,
        DepsArgs {
            name: "fib".into(),
            function: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(svc.count(Op::DependencyChain), 1);
    assert_eq!(svc.count(Op::ProgramsUsing), 1);
}

#[tokio::test]
async fn watch_stops_after_requested_ticks() {
    let svc = Arc::new(ScriptedService::new().with_users(vec![UserInfo {
        name: "alice".into(),
        program_uploaded_count: 1,
        function_uploaded_count: 0,
        credits: 5,
        credits_used: 0,
        run_count: 0,
    }]));
    let ctx = context(svc.clone(), None);
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        commands::watch(&ctx, WatchArgs { ticks: Some(2) }),
    )
    .await
    .expect("watch finished in time")
    .unwrap();
    assert!(svc.count(Op::ListUsers) >= 2);
}

fn run_args(name: &str) -> RunArgs {
    RunArgs {
        name: name.into(),
        function: false,
        level: 0,
        arch: "I".into(),
        vars: vec![],
    }
}

#[tokio::test]
async fn out_of_credit_refusal_keeps_status_and_advisory() {
    let svc = Arc::new(ScriptedService::new().with_program("loop").with_credits(3));
    svc.fail_next(Op::Execute, "Error 402 Insufficient credits to execute program", 402);
    let ctx = context(svc.clone(), Some("alice"));

    let err = commands::run(&ctx, run_args("loop")).await.unwrap_err();
    let cause = err
        .downcast_ref::<ClientError>()
        .expect("client error at the root");
    assert_eq!(cause.remote_details().map(|(_, code)| code), Some(402));
    assert_eq!(
        Advisory::from_rejection(cause),
        Some(Advisory::InsufficientCredits)
    );
    // Only the pre-run balance read; a refused run is not reconciled.
    assert_eq!(svc.count(Op::UserCredits), 1);
}

#[tokio::test]
async fn rerun_of_unnamed_record_needs_program_flag() {
    let record: HistoricalRun = serde_json::from_str(
        r#"{"index": 2, "expansionLevel": 0, "architecture": "II", "input": [6]}"#,
    )
    .unwrap();
    let svc = Arc::new(
        ScriptedService::new()
            .with_program("loop")
            .with_statistics("alice", vec![record]),
    );
    let ctx = context(svc.clone(), Some("alice"));

    let err = commands::rerun(
        &ctx,
        RerunArgs {
            index: 2,
            of: None,
            program: None,
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("does not record which program"));
    assert_eq!(svc.count(Op::Execute), 0);

    commands::rerun(
        &ctx,
        RerunArgs {
            index: 2,
            of: None,
            program: Some("loop".into()),
        },
    )
    .await
    .unwrap();
    assert!(svc.calls().contains(&ServiceCall::Execute {
        expansion_level: 0,
        architecture: Architecture::II,
        input: vec![6],
    }));
}

#[tokio::test]
async fn upload_sends_file_name_and_contents() {
    let svc = Arc::new(ScriptedService::new());
    let ctx = context(svc.clone(), Some("alice"));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.xml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(br#"<S-Program name="loop"/>"#).unwrap();

    commands::upload(&ctx, UploadArgs { file: path })
        .await
        .unwrap();
    assert_eq!(svc.calls(), vec![ServiceCall::Upload("loop.xml".into())]);

    // The uploaded program can now be selected.
    commands::run(&ctx, run_args("loop")).await.unwrap();
    assert_eq!(svc.count(Op::Execute), 1);
}

#[tokio::test]
async fn upload_of_missing_file_makes_no_request() {
    let svc = Arc::new(ScriptedService::new());
    let ctx = context(svc.clone(), None);
    let err = commands::upload(
        &ctx,
        UploadArgs {
            file: "/nonexistent/loop.xml".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
    assert!(svc.calls().is_empty());
}

#[tokio::test]
async fn show_loads_listing_and_summary_at_level() {
    let svc = Arc::new(
        ScriptedService::new()
            .with_program("loop")
            .with_max_level(2)
            .with_commands(1, ["x1 <- x1 - 1", "IF x1 != 0 GOTO L1"])
            .with_summary(1, [1, 1, 0, 0])
            .with_lineage(1, ["JUMP_ZERO x1 EXIT (2)"]),
    );
    let ctx = context(svc.clone(), None);
    let show = |lineage| ShowArgs {
        name: "loop".into(),
        function: false,
        level: 1,
        lineage,
    };

    commands::show(&ctx, show(None)).await.unwrap();
    assert_eq!(
        svc.calls(),
        vec![
            ServiceCall::Bind("loop".into()),
            ServiceCall::MaxLevel,
            ServiceCall::ProgramCommands(1),
            ServiceCall::ProgramSummary(1),
        ]
    );

    svc.clear_calls();
    commands::show(&ctx, show(Some(1))).await.unwrap();
    assert_eq!(
        svc.calls().last(),
        Some(&ServiceCall::CommandHistory {
            expansion_level: 1,
            index: 1,
        })
    );
    assert_eq!(svc.count(Op::ProgramCommands), 0);
}

#[tokio::test]
async fn show_rejects_level_above_maximum() {
    let svc = Arc::new(ScriptedService::new().with_program("loop").with_max_level(1));
    let ctx = context(svc.clone(), None);
    let err = commands::show(
        &ctx,
        ShowArgs {
            name: "loop".into(),
            function: false,
            level: 3,
            lineage: None,
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("out of range"));
    assert_eq!(svc.count(Op::ProgramCommands), 0);
}

#[tokio::test]
async fn catalogue_listings_read_each_collection() {
    let entry = |name: &str, function: bool| ProgramInfo {
        name: name.into(),
        owner: "alice".into(),
        commands_count: 3,
        max_level: 1,
        ran_count: 0,
        average_cost: 0.0,
        source_program: None,
        function,
    };
    let svc = Arc::new(
        ScriptedService::new().with_catalogue(vec![entry("loop", false)], vec![entry("add", true)]),
    );
    let ctx = context(svc.clone(), None);
    commands::programs(&ctx).await.unwrap();
    commands::functions(&ctx).await.unwrap();
    assert_eq!(
        svc.calls(),
        vec![ServiceCall::ListPrograms, ServiceCall::ListFunctions]
    );
    // Catalogue entries are bindable.
    commands::run(&ctx, run_args("loop")).await.unwrap();
    assert_eq!(svc.active_program().as_deref(), Some("loop"));
}
