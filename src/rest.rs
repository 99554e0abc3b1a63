//! Single-shot HTTP driver.
//!
//! Each [`RestDriver::send`] performs exactly one network call: redirects are not
//! followed and nothing is retried. HTTP error statuses are ordinary
//! [`ResponseRecord`]s; only network-level failures become [`TransportError`]s.
//!
//! The driver is also a `tower::Service<RequestSpec>` so it can sit under any
//! tower layer a caller wants to add.

use std::fmt;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tower::Service;

use crate::config::{join_url, HarnessConfig};
use crate::error::TransportError;

/// Request body variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Raw bytes, optionally with a declared content type.
    Bytes { data: Bytes, content_type: Option<String> },
    Json(Value),
    Multipart(Vec<FormField>),
}

/// One multipart form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text { name: String, value: String },
    File { name: String, filename: String, content_type: String, data: Bytes },
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text { name: name.into(), value: value.into() }
    }

    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Immutable description of one HTTP request.
///
/// Header names are case-insensitive; setting a header twice keeps the last value.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: RequestBody,
    timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Raw body with a content type.
    pub fn bytes(self, data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body(RequestBody::Bytes { data: data.into(), content_type: Some(content_type.into()) })
    }

    pub fn json(self, value: Value) -> Self {
        self.body(RequestBody::Json(value))
    }

    pub fn multipart(self, fields: Vec<FormField>) -> Self {
        self.body(RequestBody::Multipart(fields))
    }

    /// Per-request deadline overriding the driver default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn request_body(&self) -> &RequestBody {
        &self.body
    }
}

/// Response body, JSON when it parses, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(Bytes),
}

impl ResponseBody {
    fn decode(raw: Bytes) -> Self {
        if raw.is_empty() {
            return Self::Raw(raw);
        }
        match serde_json::from_slice(&raw) {
            Ok(v) => Self::Json(v),
            Err(_) => Self::Raw(raw),
        }
    }
}

/// Captured response.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
    pub elapsed: Duration,
}

impl ResponseRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Raw(_) => None,
        }
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        match &self.body {
            ResponseBody::Json(v) => v.to_string(),
            ResponseBody::Raw(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Body length in bytes (re-serialized for JSON bodies).
    pub fn body_len(&self) -> usize {
        match &self.body {
            ResponseBody::Json(v) => v.to_string().len(),
            ResponseBody::Raw(b) => b.len(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Display for ResponseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} ({} bytes in {:?})", self.status, self.body_len(), self.elapsed)
    }
}

/// Build a header map, rejecting invalid names or values.
pub fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    for (key, value) in input {
        if key.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| TransportError::InvalidRequest(format!("header name `{key}`: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| {
                TransportError::InvalidRequest(format!("header value for `{key}`: {err}"))
            })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Flatten an error and its sources into one line.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn classify(err: reqwest::Error, target: &str, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { operation: format!("request to {target}"), after: timeout }
    } else if err.is_connect() {
        TransportError::Connect { target: target.to_string(), reason: describe(&err) }
    } else if err.is_builder() {
        TransportError::InvalidRequest(describe(&err))
    } else {
        TransportError::Io(describe(&err))
    }
}

/// HTTP driver bound to a base URL.
#[derive(Debug, Clone)]
pub struct RestDriver {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl RestDriver {
    pub fn new(
        base_url: Url,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| {
                TransportError::InvalidRequest(format!("http client: {}", describe(&err)))
            })?;
        Ok(Self { client, base_url, timeout })
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self, TransportError> {
        Self::new(config.base_url().clone(), config.request_timeout(), config.connect_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for a spec's path.
    pub fn url_for(&self, spec: &RequestSpec) -> String {
        join_url(&self.base_url, spec.path())
    }

    /// Perform one request.
    pub async fn send(&self, spec: &RequestSpec) -> Result<ResponseRecord, TransportError> {
        let target = self.url_for(spec);
        let timeout = spec.timeout.unwrap_or(self.timeout);
        let mut headers = build_headers(&spec.headers)?;

        let mut request = self.client.request(spec.method.clone(), &target);
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        match &spec.body {
            RequestBody::Empty => {}
            RequestBody::Bytes { data, content_type } => {
                if let Some(ct) = content_type {
                    if !headers.contains_key(CONTENT_TYPE) {
                        let value = HeaderValue::from_str(ct).map_err(|err| {
                            TransportError::InvalidRequest(format!("content type `{ct}`: {err}"))
                        })?;
                        headers.insert(CONTENT_TYPE, value);
                    }
                }
                request = request.body(data.clone());
            }
            RequestBody::Json(value) => {
                request = request.json(value);
            }
            RequestBody::Multipart(fields) => {
                request = request.multipart(multipart_form(fields)?);
            }
        }
        request = request.headers(headers);

        let start = Instant::now();
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let raw = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, raw))
        };

        let (status, headers, raw) = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(err)) => return Err(classify(err, &target, timeout)),
            Err(_) => {
                return Err(TransportError::Timeout {
                    operation: format!("{} {}", spec.method, target),
                    after: timeout,
                })
            }
        };

        let record = ResponseRecord {
            status,
            headers,
            body: ResponseBody::decode(raw),
            elapsed: start.elapsed(),
        };
        tracing::debug!(
            method = %spec.method,
            url = %target,
            status,
            elapsed_ms = record.elapsed.as_millis() as u64,
            "request complete"
        );
        Ok(record)
    }
}

fn multipart_form(fields: &[FormField]) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name.clone(), value.clone()),
            FormField::File { name, filename, content_type, data } => {
                let part = reqwest::multipart::Part::bytes(data.to_vec())
                    .file_name(filename.clone())
                    .mime_str(content_type)
                    .map_err(|err| {
                        let reason = format!("content type `{content_type}`: {err}");
                        TransportError::InvalidRequest(reason)
                    })?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

impl Service<RequestSpec> for RestDriver {
    type Response = ResponseRecord;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<ResponseRecord, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, spec: RequestSpec) -> Self::Future {
        let driver = self.clone();
        Box::pin(async move { driver.send(&spec).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_header_replaces_earlier_case_insensitively() {
        let spec = RequestSpec::post("/stt/transcribe")
            .header("Content-Type", "application/json")
            .header("content-type", "audio/wav");
        assert_eq!(spec.headers().len(), 1);
        assert_eq!(spec.header_value("CONTENT-TYPE"), Some("audio/wav"));
    }

    #[test]
    fn body_decoding_prefers_json() {
        let decoded = ResponseBody::decode(Bytes::from_static(b"{\"a\":1}"));
        assert_eq!(decoded, ResponseBody::Json(json!({"a": 1})));
        assert_eq!(
            ResponseBody::decode(Bytes::from_static(b"RIFF....")),
            ResponseBody::Raw(Bytes::from_static(b"RIFF...."))
        );
        assert_eq!(ResponseBody::decode(Bytes::new()), ResponseBody::Raw(Bytes::new()));
    }

    #[test]
    fn invalid_header_is_rejected() {
        let err = build_headers(&[("bad header".into(), "x".into())]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[test]
    fn url_for_joins_base() {
        let driver = RestDriver::new(
            Url::parse("http://localhost:9000/app/").unwrap(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = driver.url_for(&RequestSpec::get("/api/metadata"));
        assert_eq!(url, "http://localhost:9000/app/api/metadata");
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let driver = RestDriver::new(
            Url::parse(&format!("http://{addr}")).unwrap(),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = driver.send(&RequestSpec::get("/")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. } | TransportError::Io(_)), "{err:?}");
    }
}
