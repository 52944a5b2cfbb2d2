use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, TransportErrorKind};

/// Message of every outcome short-circuited for a missing context value.
pub const PREREQUISITE_MISSING: &str = "prerequisite missing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Passed,
    AssertionFailure,
    TransportError,
    PrerequisiteMissing,
    MalformedResponse,
    /// The case panicked.
    Fault,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Passed => "passed",
            OutcomeKind::AssertionFailure => "assertion_failure",
            OutcomeKind::TransportError => "transport_error",
            OutcomeKind::PrerequisiteMissing => "prerequisite_missing",
            OutcomeKind::MalformedResponse => "malformed_response",
            OutcomeKind::Fault => "fault",
        }
    }
}

impl Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured evidence attached to an outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_error: Option<TransportErrorKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_keys: Vec<String>,
}

impl OutcomeDetail {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// What a case hands back when its checks hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Checked {
    pub message: String,
    pub detail: Option<OutcomeDetail>,
}

impl Checked {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.detail.get_or_insert_with(OutcomeDetail::default).status = Some(status);
        self
    }
}

/// The single recorded result of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub success: bool,
    pub kind: OutcomeKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<OutcomeDetail>,
    pub duration_ms: u64,
}

impl TestOutcome {
    pub fn passed(name: impl Into<String>, checked: Checked, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            success: true,
            kind: OutcomeKind::Passed,
            message: checked.message,
            detail: checked.detail,
            duration_ms,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        kind: OutcomeKind,
        message: impl Into<String>,
        detail: Option<OutcomeDetail>,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            success: false,
            kind,
            message: message.into(),
            detail,
            duration_ms,
        }
    }

    pub fn prerequisite_missing(name: impl Into<String>, keys: Vec<String>) -> Self {
        Self::failed(
            name,
            OutcomeKind::PrerequisiteMissing,
            PREREQUISITE_MISSING,
            Some(OutcomeDetail {
                missing_keys: keys,
                ..OutcomeDetail::default()
            }),
            0,
        )
    }

    pub fn fault(name: impl Into<String>, panic_message: &str, duration_ms: u64) -> Self {
        Self::failed(
            name,
            OutcomeKind::Fault,
            format!("test case panicked: {panic_message}"),
            None,
            duration_ms,
        )
    }

    pub fn from_error(name: impl Into<String>, err: CaseError, duration_ms: u64) -> Self {
        let message = err.to_string();
        match err {
            CaseError::Transport(transport) => Self::failed(
                name,
                OutcomeKind::TransportError,
                message,
                Some(OutcomeDetail {
                    transport_error: Some(transport.kind),
                    ..OutcomeDetail::default()
                }),
                duration_ms,
            ),
            CaseError::Assertion {
                status,
                body_excerpt,
                ..
            } => {
                let detail = OutcomeDetail {
                    status,
                    body_excerpt,
                    ..OutcomeDetail::default()
                };
                Self::failed(
                    name,
                    OutcomeKind::AssertionFailure,
                    message,
                    (!detail.is_empty()).then_some(detail),
                    duration_ms,
                )
            }
            CaseError::PrerequisiteMissing { keys } => {
                let mut outcome = Self::prerequisite_missing(name, keys);
                outcome.duration_ms = duration_ms;
                outcome
            }
            CaseError::MalformedResponse {
                status,
                body_excerpt,
                ..
            } => Self::failed(
                name,
                OutcomeKind::MalformedResponse,
                message,
                Some(OutcomeDetail {
                    status: Some(status),
                    body_excerpt: Some(body_excerpt),
                    ..OutcomeDetail::default()
                }),
                duration_ms,
            ),
        }
    }

    /// Whether the case reached the network. Short-circuited cases did not.
    pub fn issued_request(&self) -> bool {
        self.kind != OutcomeKind::PrerequisiteMissing
    }
}
