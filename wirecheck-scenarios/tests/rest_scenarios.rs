mod common;

use common::{harness, spawn_starter, Behaviour};
use wirecheck::telemetry::{HarnessEvent, MemorySink, RestEvent};
use wirecheck::{FailureDiagnostic, Outcome, SuiteReport};
use wirecheck_scenarios::{catalog, select};

const REST_INTERFACES: [&str; 5] =
    ["stt", "transcription", "text-to-speech", "text-intelligence", "metadata"];

const MEDIA_AND_HEADER_CHECKS: [&str; 5] = [
    "rejects text/plain with 415",
    "rejects overlong text",
    "echoes X-Request-Id",
    "accepts audio/mpeg",
    "accepts audio/webm",
];

fn describe(report: &SuiteReport) -> String {
    report
        .failures()
        .map(|s| format!("{}/{}: {:?}", s.interface, s.name, s.failure))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn conforming_starter_passes_every_rest_interface() {
    let addr = spawn_starter(Behaviour::default()).await;
    let h = harness(addr);
    let scenarios = select(catalog::<MemorySink>(), &REST_INTERFACES).unwrap();

    let report = h.run_suite(&scenarios).await;

    assert_eq!(report.failed, 0, "{}", describe(&report));
    assert_eq!(report.passed, scenarios.len());
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn requests_are_recorded_by_the_sink() {
    let addr = spawn_starter(Behaviour::default()).await;
    let h = harness(addr);
    let scenarios = select(catalog::<MemorySink>(), &["metadata"]).unwrap();

    h.run_suite(&scenarios).await;

    let completed: Vec<_> = h
        .sink()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            HarnessEvent::Rest(RestEvent::Completed { path, status, .. }) => Some((path, status)),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![("/api/metadata".to_string(), 200); 2]);
}

#[tokio::test]
async fn accepting_json_on_stt_is_a_status_failure() {
    let addr = spawn_starter(Behaviour { stt_accepts_json: true, ..Behaviour::default() }).await;
    let h = harness(addr);
    let scenarios = select(catalog::<MemorySink>(), &["stt"]).unwrap();

    let report = h.run_suite(&scenarios).await;

    assert_eq!(report.failed, 1, "{}", describe(&report));
    assert_eq!(report.exit_code(), 1);
    let failed = report.failures().next().unwrap();
    assert_eq!(failed.name, "rejects application/json with 415");
    match &failed.failure {
        Some(FailureDiagnostic::Assertion { context, expected, actual }) => {
            assert_eq!(context, "status");
            assert_eq!(expected, "415");
            assert!(actual.contains("200"), "{actual}");
        }
        other => panic!("unexpected diagnostic: {other:?}"),
    }
    let json = report.to_json();
    let entry = json["scenarios"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["outcome"] == "failed")
        .unwrap();
    assert_eq!(entry["failure"]["kind"], "assertion");
}

#[tokio::test]
async fn unauthenticated_calls_fail_when_the_starter_demands_a_token() {
    let addr = spawn_starter(Behaviour { require_auth: true, ..Behaviour::default() }).await;
    let h = harness(addr);
    let scenarios = select(catalog::<MemorySink>(), &["text-to-speech"]).unwrap();

    let report = h.run_suite(&scenarios).await;

    let synthesizes = report.scenarios.iter().find(|s| s.name == "synthesizes audio").unwrap();
    assert_eq!(synthesizes.outcome, Outcome::Failed);
}

#[tokio::test]
async fn media_type_and_header_checks_pass() {
    let addr = spawn_starter(Behaviour::default()).await;
    let h = harness(addr);
    let scenarios: Vec<_> = select(catalog::<MemorySink>(), &["text-to-speech", "stt"])
        .unwrap()
        .into_iter()
        .filter(|s| MEDIA_AND_HEADER_CHECKS.contains(&s.name))
        .collect();
    assert_eq!(scenarios.len(), 6);

    let report = h.run_suite(&scenarios).await;

    assert_eq!(report.failed, 0, "{}", describe(&report));
    assert_eq!(report.passed, 6);
}

#[tokio::test]
async fn unknown_use_case_fails_both_metadata_checks() {
    let addr = spawn_starter(Behaviour { unknown_use_case: true, ..Behaviour::default() }).await;
    let h = harness(addr);
    let scenarios = select(catalog::<MemorySink>(), &["metadata"]).unwrap();

    let report = h.run_suite(&scenarios).await;

    assert_eq!(report.failed, 2, "{}", describe(&report));
    assert!(matches!(
        &report.scenarios[0].failure,
        Some(FailureDiagnostic::SchemaViolations { schema, .. }) if schema == "metadata"
    ));
    match &report.scenarios[1].failure {
        Some(FailureDiagnostic::Assertion { context, actual, .. }) => {
            assert_eq!(context, "useCase");
            assert_eq!(actual, "Karaoke");
        }
        other => panic!("unexpected diagnostic: {other:?}"),
    }
}
