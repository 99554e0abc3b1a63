//! Runs the conformance catalog against the starter named by the environment.
//!
//! Prints the JSON suite report on stdout and logs to stderr (`RUST_LOG` filters).
//! `WIRECHECK_INTERFACES=stt,metadata` narrows the run; `WIRECHECK_REPORT_JSONL`
//! additionally appends every harness event to a JSONL file.
//!
//! Exit status: 0 when nothing failed, 1 on scenario failures, 2 on bad configuration.

use std::io;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use wirecheck::telemetry::{LogSink, MulticastSink, TelemetrySink};
use wirecheck::{Harness, HarnessConfig, SuiteReport};
use wirecheck_jsonl::JsonlSink;
use wirecheck_scenarios::{catalog, parse_interfaces, select};

const USAGE_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let configured = HarnessConfig::from_env().map_err(wirecheck::HarnessError::from);
    let harness = match configured.and_then(Harness::new) {
        Ok(harness) => harness,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::from(USAGE_ERROR);
        }
    };
    let interfaces = std::env::var("WIRECHECK_INTERFACES")
        .map(|raw| parse_interfaces(&raw))
        .unwrap_or_default();

    let report = match std::env::var_os("WIRECHECK_REPORT_JSONL") {
        Some(path) => {
            let jsonl = JsonlSink::new(path);
            tracing::info!(path = %jsonl.path().display(), "writing harness events");
            run(harness.with_sink(MulticastSink::new(LogSink, jsonl)), &interfaces).await
        }
        None => run(harness, &interfaces).await,
    };

    match report {
        Some(report) => {
            println!("{:#}", report.to_json());
            tracing::info!("{report}");
            ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1))
        }
        None => ExitCode::from(USAGE_ERROR),
    }
}

async fn run<S: TelemetrySink>(harness: Harness<S>, interfaces: &[String]) -> Option<SuiteReport> {
    match select(catalog(), interfaces) {
        Ok(scenarios) => {
            tracing::info!(
                base_url = %harness.config().base_url(),
                scenarios = scenarios.len(),
                "starting conformance run"
            );
            Some(harness.run_suite(&scenarios).await)
        }
        Err(e) => {
            tracing::error!(error = %e, "invalid WIRECHECK_INTERFACES");
            None
        }
    }
}
