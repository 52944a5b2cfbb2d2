//! Scripted transport for unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::http::client::Transport;
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;

/// Replays queued replies in order and records every request it sees.
/// Once the queue is empty it answers `200 {}`.
#[derive(Default)]
pub struct StubTransport {
    replies: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: Value) -> Self {
        let response = ApiResponse::from_parts(status, "", BTreeMap::new(), body.to_string(), 1);
        self.replies.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn respond_text(self, status: u16, text: &str) -> Self {
        let response = ApiResponse::from_parts(status, "", BTreeMap::new(), text.to_string(), 1);
        self.replies.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(self, err: TransportError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(ApiResponse::from_parts(200, "OK", BTreeMap::new(), "{}".to_string(), 1))
        })
    }
}
