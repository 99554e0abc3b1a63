//! Production deployment directives injected into the starter's HTML shell.

use futures::future::FutureExt;
use wirecheck::telemetry::TelemetrySink;
use wirecheck::{expect, Harness, HarnessError, RequestSpec, Scenario, ScenarioFuture};

pub const INTERFACE: &str = "deploy";

const NONCE_META: &str = r#"<meta\s+name="session-nonce"\s+content="([^"]+)""#;
const BASE_HREF: &str = r#"<base\s+href="([^"]+)""#;
const UUID: &str = "(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";
const SUBPATH: &str = "^/[a-z0-9-]+/$";

pub fn scenarios<S: TelemetrySink>() -> Vec<Scenario<S>> {
    vec![
        Scenario::new(
            INTERFACE,
            "injects a session nonce",
            injects_session_nonce::<S>,
        )
        .requires_session_auth(),
        Scenario::new(
            INTERFACE,
            "sets the subpath base href",
            sets_base_href::<S>,
        )
        .requires_session_auth(),
    ]
}

async fn fetch_html<S: TelemetrySink>(h: &Harness<S>) -> Result<String, HarnessError> {
    let response = h.send(&RequestSpec::get("").header("Accept", "text/html")).await?;
    if !response.is_success() {
        return Err(HarnessError::assertion("GET / status", "2xx", response.status));
    }
    Ok(response.text())
}

fn matches(context: &str, value: &str, pattern: &str) -> Result<(), HarnessError> {
    let re =
        regex::Regex::new(pattern).map_err(|e| HarnessError::assertion("pattern", pattern, e))?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(HarnessError::assertion(context, format!("/{pattern}/"), value))
    }
}

pub fn injects_session_nonce<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let html = fetch_html(h).await?;
        let nonce = expect::capture(&html, NONCE_META)?;
        matches("session-nonce", nonce, UUID)
    }
    .boxed_local()
}

pub fn sets_base_href<S: TelemetrySink>(h: &Harness<S>) -> ScenarioFuture<'_> {
    async move {
        let html = fetch_html(h).await?;
        let base = expect::capture(&html, BASE_HREF)?;
        matches("base href", base, SUBPATH)?;

        // when the starter is addressed through its subpath, the two must agree
        let subpath = h.config().base_url().path().trim_end_matches('/');
        if !subpath.is_empty() {
            let expected = format!("{subpath}/");
            if base != expected {
                return Err(HarnessError::assertion("base href", expected, base));
            }
        }
        Ok(())
    }
    .boxed_local()
}
