use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use tracing::debug;

use crate::error::{TransportError, TransportErrorKind};

use super::request::ApiRequest;
use super::response::ApiResponse;

/// Issues a single request. Test cases only reach the system under test
/// through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport with a default per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .build()
            .map_err(|err| {
                TransportError::invalid_request(format!("Failed to build HTTP client: {err}"))
            })?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let method: Method = request.method.into();
        let url = reqwest::Url::parse(&request.url).map_err(|err| {
            TransportError::invalid_request(format!("Invalid URL `{}`: {err}", request.url))
        })?;
        let headers = build_headers(&request.headers)?;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.json {
            if request.method.allows_body() {
                builder = builder.json(body);
            }
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let started = Instant::now();
        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();
        let response_headers = collect_headers(response.headers());
        let bytes = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                classify_reqwest_error(err)
            } else {
                TransportError::new(
                    TransportErrorKind::Read,
                    format!("Failed to read response: {err}"),
                )
            }
        })?;
        let elapsed = started.elapsed().as_millis() as u64;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        debug!(status = status.as_u16(), elapsed_ms = elapsed, "received response");
        Ok(ApiResponse::from_parts(
            status.as_u16(),
            status_text,
            response_headers,
            text,
            elapsed,
        ))
    }
}

/// Join a case path onto the base URL. Absolute URLs pass through untouched.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

pub fn build_headers(input: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            TransportError::invalid_request(format!("Invalid header name `{key}`: {err}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            TransportError::invalid_request(format!("Invalid header value for `{key}`: {err}"))
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else {
        let message = error_chain(&err).to_ascii_lowercase();
        if message.contains("dns") || message.contains("failed to lookup address") {
            TransportErrorKind::Dns
        } else if message.contains("tls")
            || message.contains("ssl")
            || message.contains("certificate")
        {
            TransportErrorKind::Tls
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_builder() {
            TransportErrorKind::InvalidRequest
        } else {
            TransportErrorKind::Read
        }
    };

    TransportError::new(kind, format!("Request failed: {}", error_chain(&err)))
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
