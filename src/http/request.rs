use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use super::method::HttpMethod;

/// One outgoing request, fully resolved against the run's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub json: Option<Value>,
    pub bearer: Option<String>,
    /// Overrides the client's default timeout for this request only.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            json: None,
            bearer: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }
}
