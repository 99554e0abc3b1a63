mod common;

use std::time::Duration;

use common::{config, harness, spawn_starter, Behaviour};
use wirecheck::telemetry::{HarnessEvent, MemorySink, StreamEvent};
use wirecheck::{FailureDiagnostic, Harness, Outcome, SuiteReport};
use wirecheck_scenarios::{catalog, select, voice_agent};

fn describe(report: &SuiteReport) -> String {
    report
        .failures()
        .map(|s| format!("{}/{}: {:?}", s.interface, s.name, s.failure))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn run(h: &Harness<MemorySink>, interfaces: &[&str]) -> SuiteReport {
    let scenarios = select(catalog::<MemorySink>(), interfaces).unwrap();
    h.run_suite(&scenarios).await
}

#[tokio::test]
async fn voice_agent_conversation_conforms() {
    let addr = spawn_starter(Behaviour::default()).await;
    let h = harness(addr);

    let report = run(&h, &[voice_agent::INTERFACE]).await;

    assert_eq!(report.failed, 0, "{}", describe(&report));
    assert_eq!(report.passed, 9);
    let opened = h
        .sink()
        .events()
        .iter()
        .filter(|e| matches!(e, HarnessEvent::Stream(StreamEvent::Opened { .. })))
        .count();
    assert_eq!(opened, 9);
}

#[tokio::test]
async fn flux_turns_conform() {
    let addr = spawn_starter(Behaviour::default()).await;
    let report = run(&harness(addr), &["flux"]).await;
    assert_eq!(report.failed, 0, "{}", describe(&report));
    assert_eq!(report.passed, 3);
}

#[tokio::test]
async fn live_interfaces_conform() {
    let addr = spawn_starter(Behaviour::default()).await;
    let report = run(&harness(addr), &["live-transcription", "live-text-to-speech"]).await;
    assert_eq!(report.failed, 0, "{}", describe(&report));
    assert_eq!(report.passed, 6);
}

#[tokio::test]
async fn unacknowledged_settings_time_out_with_observed_frames() {
    let behaviour = Behaviour { agent_ignores_settings: true, ..Behaviour::default() };
    let addr = spawn_starter(behaviour).await;
    let cfg = config(addr).wait_timeout(Duration::from_millis(300)).build().unwrap();
    let h = Harness::new(cfg).unwrap().with_sink(MemorySink::new());
    let scenarios: Vec<_> = select(catalog::<MemorySink>(), &[voice_agent::INTERFACE])
        .unwrap()
        .into_iter()
        .filter(|s| s.name == "applies minimal Settings")
        .collect();
    assert_eq!(scenarios.len(), 1);

    let report = h.run_suite(&scenarios).await;

    assert_eq!(report.failed, 1);
    let failed = &report.scenarios[0];
    assert_eq!(failed.outcome, Outcome::Failed);
    match &failed.failure {
        Some(FailureDiagnostic::WaitTimeout {
            predicate, timeout_ms, observed_types, matched, ..
        }) => {
            assert!(predicate.contains("SettingsApplied"), "{predicate}");
            assert_eq!(*timeout_ms, 300);
            assert_eq!(observed_types, &vec!["Welcome".to_string()]);
            assert_eq!(*matched, 0);
        }
        other => panic!("unexpected diagnostic: {other:?}"),
    }
    assert_eq!(report.to_json()["scenarios"][0]["failure"]["kind"], "wait_timeout");
}
