//! Environment-driven harness configuration.
//!
//! Configuration only selects *which* deployment is exercised (base URLs, endpoint
//! paths, credentials, deadlines); it never changes the protocol being verified.
//!
//! ```rust
//! use wirecheck::HarnessConfig;
//!
//! let cfg = HarnessConfig::builder()
//!     .base_url("http://localhost:3000")
//!     .build()
//!     .unwrap();
//! assert_eq!(cfg.ws_base_url().as_str(), "ws://localhost:3000/");
//! assert_eq!(cfg.http_url("/api/session"), "http://localhost:3000/api/session");
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

/// Default base URL shared by every starter contract.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Errors produced while building a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A URL variable could not be parsed.
    #[error("{var}: invalid url `{value}`: {reason}")]
    InvalidUrl { var: &'static str, value: String, reason: String },
    /// A numeric variable could not be parsed.
    #[error("{var}: expected milliseconds, got `{value}`")]
    InvalidNumber { var: &'static str, value: String },
    /// Durations must be > 0.
    #[error("{0} must be > 0")]
    ZeroDuration(&'static str),
    /// The base URL scheme cannot be mapped to a WebSocket scheme.
    #[error("cannot derive websocket url from scheme `{0}`")]
    UnsupportedScheme(String),
}

/// Path of each starter endpoint, overridable per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub stt: String,
    pub transcription: String,
    pub text_to_speech: String,
    pub text_intelligence: String,
    pub voice_agent: String,
    pub flux: String,
    pub live_transcription: String,
    pub live_text_to_speech: String,
    pub session: String,
    pub metadata: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            stt: "/stt/transcribe".into(),
            transcription: "/api/transcription".into(),
            text_to_speech: "/api/text-to-speech".into(),
            text_intelligence: "/api/text-intelligence".into(),
            voice_agent: "/api/voice-agent".into(),
            flux: "/api/flux".into(),
            live_transcription: "/api/live-transcription".into(),
            live_text_to_speech: "/api/live-text-to-speech".into(),
            session: "/api/session".into(),
            metadata: "/api/metadata".into(),
        }
    }
}

/// Validated harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    base_url: Url,
    ws_base_url: Url,
    auth_token: Option<String>,
    session_auth: bool,
    fixtures_dir: PathBuf,
    endpoints: Endpoints,
    request_timeout: Duration,
    connect_timeout: Duration,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl HarnessConfig {
    /// Construct a builder with defaults.
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::new()
    }

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from an arbitrary key lookup (environment, map, file).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = HarnessConfigBuilder::new();

        if let Some(v) = get("BASE_URL") {
            builder = builder.base_url(v);
        }
        if let Some(v) = get("WS_BASE_URL").or_else(|| get("WS_URL")) {
            builder = builder.ws_base_url(v);
        }
        if let Some(v) = get("AUTH_TOKEN") {
            builder = builder.auth_token(v);
        }
        builder = builder.session_auth(get("SESSION_AUTH").as_deref() == Some("true"));
        if let Some(v) = get("FIXTURES_DIR") {
            builder = builder.fixtures_dir(v);
        }

        let mut endpoints = Endpoints::default();
        let overrides: [(&str, &mut String); 10] = [
            ("STT_ENDPOINT", &mut endpoints.stt),
            ("TRANSCRIPTION_ENDPOINT", &mut endpoints.transcription),
            ("TEXT_TO_SPEECH_ENDPOINT", &mut endpoints.text_to_speech),
            ("TEXT_INTEL_ENDPOINT", &mut endpoints.text_intelligence),
            ("AGENT_ENDPOINT", &mut endpoints.voice_agent),
            ("FLUX_ENDPOINT", &mut endpoints.flux),
            ("LIVE_TRANSCRIPTION_ENDPOINT", &mut endpoints.live_transcription),
            ("LIVE_TEXT_TO_SPEECH_ENDPOINT", &mut endpoints.live_text_to_speech),
            ("SESSION_ENDPOINT", &mut endpoints.session),
            ("METADATA_ENDPOINT", &mut endpoints.metadata),
        ];
        for (key, slot) in overrides {
            if let Some(v) = get(key) {
                *slot = v;
            }
        }
        builder = builder.endpoints(endpoints);

        if let Some(ms) = millis(&get, "WIRECHECK_REQUEST_TIMEOUT_MS")? {
            builder = builder.request_timeout(ms);
        }
        if let Some(ms) = millis(&get, "WIRECHECK_CONNECT_TIMEOUT_MS")? {
            builder = builder.connect_timeout(ms);
        }
        if let Some(ms) = millis(&get, "WIRECHECK_WAIT_TIMEOUT_MS")? {
            builder = builder.wait_timeout(ms);
        }
        if let Some(ms) = millis(&get, "WIRECHECK_POLL_INTERVAL_MS")? {
            builder = builder.poll_interval(ms);
        }

        builder.build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn ws_base_url(&self) -> &Url {
        &self.ws_base_url
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Whether production-only session/deploy checks should run.
    pub fn session_auth(&self) -> bool {
        self.session_auth
    }

    pub fn fixtures_dir(&self) -> &Path {
        &self.fixtures_dir
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Absolute HTTP URL for a base-relative path.
    pub fn http_url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Absolute WebSocket URL for a base-relative path.
    pub fn ws_url(&self, path: &str) -> String {
        join_url(&self.ws_base_url, path)
    }
}

pub(crate) fn join_url(base: &Url, path: &str) -> String {
    if path.starts_with("http://")
        || path.starts_with("https://")
        || path.starts_with("ws://")
        || path.starts_with("wss://")
    {
        return path.to_string();
    }
    let base = base.as_str().trim_end_matches('/');
    if path.is_empty() {
        format!("{}/", base)
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

fn millis<G>(get: &G, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
    }
}

/// Map `http(s)` to `ws(s)`; WebSocket URLs pass through.
fn derive_ws(base: &Url) -> Result<Url, ConfigError> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(base.clone()),
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };
    let rest = &base.as_str()[base.scheme().len()..];
    Url::parse(&format!("{}{}", scheme, rest)).map_err(|e| ConfigError::InvalidUrl {
        var: "WS_BASE_URL",
        value: base.to_string(),
        reason: e.to_string(),
    })
}

/// Builder for [`HarnessConfig`].
#[derive(Debug, Clone)]
pub struct HarnessConfigBuilder {
    base_url: String,
    ws_base_url: Option<String>,
    auth_token: Option<String>,
    session_auth: bool,
    fixtures_dir: PathBuf,
    endpoints: Endpoints,
    request_timeout: Duration,
    connect_timeout: Duration,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl HarnessConfigBuilder {
    /// Create a builder with the contract defaults.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_base_url: None,
            auth_token: None,
            session_auth: false,
            fixtures_dir: PathBuf::from("fixtures"),
            endpoints: Endpoints::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the WebSocket base; derived from the base URL when unset.
    pub fn ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = Some(url.into());
        self
    }

    /// Static bearer token used instead of fetching a session token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn session_auth(mut self, enabled: bool) -> Self {
        self.session_auth = enabled;
        self
    }

    pub fn fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<HarnessConfig, ConfigError> {
        let base_url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            var: "BASE_URL",
            value: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        let ws_base_url = match self.ws_base_url {
            Some(raw) => {
                let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
                    var: "WS_BASE_URL",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                derive_ws(&url)?
            }
            None => derive_ws(&base_url)?,
        };
        for (name, d) in [
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
            ("wait_timeout", self.wait_timeout),
            ("poll_interval", self.poll_interval),
        ] {
            if d.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        Ok(HarnessConfig {
            base_url,
            ws_base_url,
            auth_token: self.auth_token,
            session_auth: self.session_auth,
            fixtures_dir: self.fixtures_dir,
            endpoints: self.endpoints,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            wait_timeout: self.wait_timeout,
            poll_interval: self.poll_interval,
        })
    }
}

impl Default for HarnessConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
