use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::CaseError;

/// Characters of the body kept in outcome details and failure messages.
pub const BODY_EXCERPT_CHARS: usize = 200;

/// A completed HTTP exchange. Error statuses are still responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    /// Parsed body, present when the body is valid JSON.
    pub json: Option<Value>,
    pub text: String,
    pub duration_ms: u64,
}

impl ApiResponse {
    pub fn from_parts(
        status: u16,
        status_text: impl Into<String>,
        headers: BTreeMap<String, String>,
        text: String,
        duration_ms: u64,
    ) -> Self {
        let json = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        Self {
            status,
            status_text: status_text.into(),
            headers,
            json,
            text,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parsed JSON body, or a malformed-response error when the body is not JSON.
    pub fn require_json(&self) -> Result<&Value, CaseError> {
        self.json.as_ref().ok_or_else(|| CaseError::malformed(self))
    }

    pub fn excerpt(&self) -> String {
        truncate_chars(&self.text, BODY_EXCERPT_CHARS)
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
