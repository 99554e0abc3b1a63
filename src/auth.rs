//! Credentials for protected starter endpoints.
//!
//! An [`AuthContext`] is built once per run and shared by every scenario. In session
//! mode the token is fetched from the session endpoint on first use and reused after.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::rest::{RequestSpec, RestDriver};
use crate::schema::SchemaRegistry;

/// Subprotocol name that precedes the token in streaming handshakes.
pub const TOKEN_SUBPROTOCOL: &str = "access_token";

/// Decode the header segment of a compact JWT.
///
/// Only the shape is checked: three dot-separated segments with a base64url JSON
/// object header. Signatures are not verified.
pub fn decode_jwt_header(token: &str) -> Result<Value, HarnessError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(HarnessError::assertion("jwt segments", 3, parts.len()));
    }
    let raw = URL_SAFE_NO_PAD
        .decode(parts[0].trim_end_matches('='))
        .map_err(|e| HarnessError::assertion("jwt header encoding", "base64url", e))?;
    let header: Value = serde_json::from_slice(&raw)
        .map_err(|e| HarnessError::assertion("jwt header", "JSON object", e))?;
    if !header.is_object() {
        return Err(HarnessError::assertion("jwt header", "JSON object", header));
    }
    Ok(header)
}

/// How the harness authenticates.
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// No credentials are sent.
    None,
    /// A fixed bearer token.
    Static(String),
    /// A token fetched once from the session endpoint.
    Session { endpoint: String, token: Arc<OnceCell<String>> },
}

impl AuthContext {
    /// Static token when configured, session mode when enabled, otherwise none.
    pub fn from_config(config: &HarnessConfig) -> Self {
        match config.auth_token() {
            Some(token) => Self::Static(token.to_string()),
            None if config.session_auth() => Self::session(config.endpoints().session.clone()),
            None => Self::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn session(endpoint: impl Into<String>) -> Self {
        Self::Session { endpoint: endpoint.into(), token: Arc::new(OnceCell::new()) }
    }

    /// Current token, fetching it on first use in session mode.
    pub async fn token(
        &self,
        rest: &RestDriver,
        schemas: &SchemaRegistry,
    ) -> Result<Option<String>, HarnessError> {
        match self {
            Self::None => Ok(None),
            Self::Static(token) => Ok(Some(token.clone())),
            Self::Session { endpoint, token } => {
                let token =
                    token.get_or_try_init(|| fetch_session_token(rest, schemas, endpoint)).await?;
                Ok(Some(token.clone()))
            }
        }
    }

    /// `Authorization` header value, if any.
    pub async fn bearer_header(
        &self,
        rest: &RestDriver,
        schemas: &SchemaRegistry,
    ) -> Result<Option<String>, HarnessError> {
        Ok(self.token(rest, schemas).await?.map(|t| format!("Bearer {t}")))
    }

    /// Subprotocols offered during a streaming handshake.
    pub async fn ws_protocols(
        &self,
        rest: &RestDriver,
        schemas: &SchemaRegistry,
    ) -> Result<Vec<String>, HarnessError> {
        Ok(match self.token(rest, schemas).await? {
            Some(token) => vec![TOKEN_SUBPROTOCOL.to_string(), token],
            None => Vec::new(),
        })
    }
}

async fn fetch_session_token(
    rest: &RestDriver,
    schemas: &SchemaRegistry,
    endpoint: &str,
) -> Result<String, HarnessError> {
    let response = rest.send(&RequestSpec::get(endpoint)).await?;
    if response.status != 200 {
        return Err(HarnessError::assertion(format!("GET {endpoint} status"), 200, response.status));
    }
    let body = response
        .json()
        .ok_or_else(|| {
            HarnessError::assertion(format!("GET {endpoint} body"), "JSON", "non-JSON body")
        })?;
    schemas.validate("session-token", body)?.into_result()?;
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| HarnessError::assertion("session token", "string", &body["token"]))?;
    decode_jwt_header(token)?;
    tracing::debug!(endpoint, "session token acquired");
    Ok(token.to_string())
}
