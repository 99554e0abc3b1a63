use std::time::Duration;

use serde_json::{json, Value};
use tower_service::Service;
use wirecheck::telemetry::{HarnessEvent, RestEvent, ScenarioEvent, WaitEvent};
use wirecheck::Outcome;
use wirecheck_jsonl::JsonlSink;

fn lines(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("file")
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect()
}

#[tokio::test]
async fn writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut sink = JsonlSink::new(&path);

    sink.call(HarnessEvent::Rest(RestEvent::Completed {
        method: "POST".into(),
        path: "/stt/transcribe".into(),
        status: 415,
        elapsed: Duration::from_millis(12),
    }))
    .await
    .unwrap();
    sink.call(HarnessEvent::Scenario(ScenarioEvent::Finished {
        interface: "stt".into(),
        name: "rejects json".into(),
        outcome: Outcome::Passed,
        duration: Duration::from_millis(30),
    }))
    .await
    .unwrap();

    let written = lines(&path);
    assert_eq!(written.len(), 2);
    assert_eq!(written[0]["kind"], "rest_completed");
    assert_eq!(written[0]["status"], 415);
    assert_eq!(written[1]["outcome"], "passed");
}

#[tokio::test]
async fn concurrent_writes_stay_line_delimited() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let sink = JsonlSink::new(&path);

    let mut tasks = Vec::new();
    for i in 0..20 {
        let mut sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            sink.call(HarnessEvent::Wait(WaitEvent::TimedOut {
                predicate: format!("type == \"Turn{i}\""),
                elapsed: Duration::from_millis(100),
                matched: 0,
                observed: vec!["binary".into(); 50],
            }))
            .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    sink.append(&json!({"kind": "suite", "failed": 0})).await.unwrap();

    let written = lines(&path);
    assert_eq!(written.len(), 21);
    assert!(written[..20].iter().all(|v| v["kind"] == "wait_timed_out"));
    assert_eq!(written[20]["kind"], "suite");
}

#[tokio::test]
async fn unwritable_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = JsonlSink::new(dir.path().join("missing").join("events.jsonl"));
    let event = HarnessEvent::Rest(RestEvent::Failed {
        method: "GET".into(),
        path: "/api/metadata".into(),
        error: "refused".into(),
    });
    assert!(sink.call(event).await.is_err());
}
