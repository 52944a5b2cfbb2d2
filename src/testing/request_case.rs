use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::environment::{interpolate, interpolate_json, placeholders};
use crate::error::CaseError;
use crate::http::client::{Transport, resolve_url};
use crate::http::method::HttpMethod;
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;

use super::assertion::Assertion;
use super::case::TestCase;
use super::context::{BASE_URL_KEY, SharedContext};
use super::outcome::Checked;

/// Declarative case: one request, a list of assertions, and captures that
/// copy values from the JSON response into the shared context.
///
/// Path, header values and body strings may reference context values as
/// `{{key}}`. Without assertions the case expects a 2xx status.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestCase {
    name: String,
    method: HttpMethod,
    path: String,
    headers: BTreeMap<String, String>,
    body: Option<Value>,
    auth: Option<String>,
    requires: Vec<String>,
    expect: Vec<Assertion>,
    capture: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl RequestCase {
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
            auth: None,
            requires: Vec::new(),
            expect: Vec::new(),
            capture: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Get, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>, body: Value) -> Self {
        Self::new(name, HttpMethod::Post, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Send the context value under `key` as a bearer token. The key becomes
    /// a prerequisite of the case.
    pub fn with_auth(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self = self.requiring(key.clone());
        self.auth = Some(key);
        self
    }

    pub fn requiring(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.requires.contains(&key) {
            self.requires.push(key);
        }
        self
    }

    pub fn expect(mut self, assertion: Assertion) -> Self {
        self.expect.push(assertion);
        self
    }

    /// Store the JSON value at `pointer` under `key` once assertions pass.
    pub fn capture(mut self, key: impl Into<String>, pointer: impl Into<String>) -> Self {
        self.capture.insert(key.into(), pointer.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn captures(&self) -> &BTreeMap<String, String> {
        &self.capture
    }

    /// Resolve placeholders and the base URL into a concrete request.
    pub fn build_request(&self, ctx: &SharedContext) -> Result<ApiRequest, CaseError> {
        let mut missing = Vec::new();
        let mut resolve = |text: &str| match interpolate(text, ctx) {
            Ok(resolved) => resolved,
            Err(keys) => {
                merge_missing(&mut missing, keys);
                text.to_string()
            }
        };

        let path = resolve(&self.path);
        let headers: BTreeMap<String, String> = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), resolve(value)))
            .collect();

        let body = match &self.body {
            Some(body) => match interpolate_json(body, ctx) {
                Ok(resolved) => Some(resolved),
                Err(keys) => {
                    merge_missing(&mut missing, keys);
                    None
                }
            },
            None => None,
        };

        let is_absolute = path.starts_with("http://") || path.starts_with("https://");
        let base_url = ctx.get(BASE_URL_KEY);
        if !is_absolute && base_url.is_none() {
            merge_missing(&mut missing, vec![BASE_URL_KEY.to_string()]);
        }

        let bearer = match &self.auth {
            Some(key) => match ctx.get(key) {
                Some(token) if placeholders(token).is_empty() => Some(token.to_string()),
                Some(token) => {
                    merge_missing(&mut missing, placeholders(token));
                    None
                }
                None => {
                    merge_missing(&mut missing, vec![key.clone()]);
                    None
                }
            },
            None => None,
        };

        if !missing.is_empty() {
            return Err(CaseError::prerequisite_missing(missing));
        }

        let url = resolve_url(base_url.unwrap_or_default(), &path);
        let mut request = ApiRequest::new(self.method, url);
        request.headers = headers;
        request.json = body;
        request.bearer = bearer;
        request.timeout = self.timeout;
        Ok(request)
    }

    fn check(&self, response: &ApiResponse) -> Result<(), CaseError> {
        if self.expect.is_empty() && !response.is_success() {
            return Err(CaseError::assertion(
                format!("expected a 2xx status, got {}", response.status),
                response,
            ));
        }

        for assertion in &self.expect {
            let result = assertion.evaluate(response)?;
            if !result.passed {
                return Err(CaseError::assertion(result.message, response));
            }
        }
        Ok(())
    }

    fn apply_captures(
        &self,
        ctx: &mut SharedContext,
        response: &ApiResponse,
    ) -> Result<(), CaseError> {
        if self.capture.is_empty() {
            return Ok(());
        }

        // Nothing is written unless every capture resolves.
        let json = response.require_json()?;
        let mut captured = Vec::with_capacity(self.capture.len());
        for (key, pointer) in &self.capture {
            let value = match json.pointer(pointer) {
                Some(Value::Null) | None => {
                    return Err(CaseError::assertion(
                        format!("capture `{key}` not found at `{pointer}`"),
                        response,
                    ));
                }
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
            };
            captured.push((key.clone(), value));
        }
        for (key, value) in captured {
            ctx.set(key, value);
        }
        Ok(())
    }
}

fn merge_missing(missing: &mut Vec<String>, keys: Vec<String>) {
    for key in keys {
        if !missing.contains(&key) {
            missing.push(key);
        }
    }
}

#[async_trait]
impl TestCase for RequestCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[String] {
        &self.requires
    }

    async fn execute(
        &self,
        ctx: &mut SharedContext,
        transport: &dyn Transport,
    ) -> Result<Checked, CaseError> {
        let request = self.build_request(ctx)?;
        let summary = format!("{} {}", request.method, request.url);

        let response = transport.send(request).await?;
        self.check(&response)?;
        self.apply_captures(ctx, &response)?;

        let mut message = format!("{summary} -> {}", response.status);
        if !self.capture.is_empty() {
            let keys: Vec<&str> = self.capture.keys().map(String::as_str).collect();
            message.push_str(&format!(" (captured {})", keys.join(", ")));
        }
        Ok(Checked::new(message).with_status(response.status))
    }
}
