use std::fmt::{self, Display};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::response::ApiResponse;

/// Class of a failed HTTP exchange, as opposed to an HTTP error status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    Read,
    InvalidRequest,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "TIMEOUT",
            TransportErrorKind::Dns => "DNS_ERROR",
            TransportErrorKind::Connect => "CONNECT_ERROR",
            TransportErrorKind::Tls => "TLS_ERROR",
            TransportErrorKind::Read => "READ_ERROR",
            TransportErrorKind::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }
}

/// Everything a single test case can fail with. The orchestrator turns each
/// variant into a failing outcome; none of them escape a run.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{message}")]
    Assertion {
        message: String,
        status: Option<u16>,
        body_excerpt: Option<String>,
    },

    #[error("prerequisite missing")]
    PrerequisiteMissing { keys: Vec<String> },

    #[error("{message}")]
    MalformedResponse {
        message: String,
        status: u16,
        body_excerpt: String,
    },
}

impl CaseError {
    /// Assertion failure carrying the status and a body excerpt of `response`.
    pub fn assertion(message: impl Into<String>, response: &ApiResponse) -> Self {
        CaseError::Assertion {
            message: message.into(),
            status: Some(response.status),
            body_excerpt: Some(response.excerpt()),
        }
    }

    pub fn malformed(response: &ApiResponse) -> Self {
        CaseError::MalformedResponse {
            message: format!("HTTP {} response body is not valid JSON", response.status),
            status: response.status,
            body_excerpt: response.excerpt(),
        }
    }

    pub fn prerequisite_missing(keys: Vec<String>) -> Self {
        CaseError::PrerequisiteMissing { keys }
    }
}

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("failed to read suite file `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse suite file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("suite `{0}` has no cases")]
    Empty(String),

    #[error("duplicate test case name `{0}`")]
    DuplicateCase(String),

    #[error("invalid case `{name}`: {reason}")]
    InvalidCase { name: String, reason: String },

    #[error("invalid variable `{name}`: {reason}")]
    InvalidVariable { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("pass-rate threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(f64),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("verdict bands must satisfy 100 >= excellent >= good >= warning >= 0")]
    InvalidBands,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create history directory `{path}`: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to {action}: {source}")]
    Sqlite {
        action: &'static str,
        source: rusqlite::Error,
    },

    #[error("failed to serialize run report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn sqlite(action: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StoreError::Sqlite { action, source }
    }
}
