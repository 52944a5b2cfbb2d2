use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CaseError;
use crate::http::response::{ApiResponse, truncate_chars};

const ACTUAL_PREVIEW_CHARS: usize = 120;

/// Part of the response an assertion inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionTarget {
    Status,
    Header(String),
    /// RFC 6901 pointer into the JSON body; `""` is the whole document.
    Json(String),
    Body,
}

impl Display for AssertionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionTarget::Status => write!(f, "status"),
            AssertionTarget::Header(name) => write!(f, "header {name}"),
            AssertionTarget::Json(pointer) if pointer.is_empty() => write!(f, "json body"),
            AssertionTarget::Json(pointer) => write!(f, "json {pointer}"),
            AssertionTarget::Body => write!(f, "body"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    OneOf,
    GreaterThan,
    LessThan,
    Exists,
    Missing,
    TypeIs,
}

impl AssertionOperator {
    fn label(self) -> &'static str {
        match self {
            AssertionOperator::Equals => "equals",
            AssertionOperator::NotEquals => "not equals",
            AssertionOperator::Contains => "contains",
            AssertionOperator::NotContains => "does not contain",
            AssertionOperator::OneOf => "is one of",
            AssertionOperator::GreaterThan => "greater than",
            AssertionOperator::LessThan => "less than",
            AssertionOperator::Exists => "exists",
            AssertionOperator::Missing => "is missing",
            AssertionOperator::TypeIs => "is of type",
        }
    }

    fn takes_operand(self) -> bool {
        !matches!(self, AssertionOperator::Exists | AssertionOperator::Missing)
    }
}

/// A single check evaluated against a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub target: AssertionTarget,
    #[serde(rename = "op")]
    pub operator: AssertionOperator,
    #[serde(default)]
    pub expected: Value,
    /// Case-insensitive string comparison for equals/contains.
    #[serde(default)]
    pub ignore_case: bool,
}

/// Result of evaluating an assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionResult {
    pub assertion: Assertion,
    pub passed: bool,
    pub actual: String,
    pub message: String,
}

impl Assertion {
    pub fn new(target: AssertionTarget, operator: AssertionOperator, expected: Value) -> Self {
        Self {
            target,
            operator,
            expected,
            ignore_case: false,
        }
    }

    pub fn status_is(status: u16) -> Self {
        Self::new(AssertionTarget::Status, AssertionOperator::Equals, Value::from(status))
    }

    pub fn json_exists(pointer: impl Into<String>) -> Self {
        Self::new(
            AssertionTarget::Json(pointer.into()),
            AssertionOperator::Exists,
            Value::Null,
        )
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Structural problems that make the assertion meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if let AssertionTarget::Json(pointer) = &self.target {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(format!("json pointer `{pointer}` must start with `/`"));
            }
        }
        if let AssertionTarget::Header(name) = &self.target {
            if name.trim().is_empty() {
                return Err("header name cannot be empty".to_string());
            }
        }
        match self.operator {
            AssertionOperator::OneOf if !self.expected.is_array() => {
                Err("`one_of` expects an array of values".to_string())
            }
            AssertionOperator::GreaterThan | AssertionOperator::LessThan
                if self.expected.as_f64().is_none() =>
            {
                Err(format!("`{}` expects a number", self.operator.label()))
            }
            AssertionOperator::TypeIs
                if !matches!(
                    self.expected.as_str(),
                    Some("array" | "object" | "string" | "number" | "boolean" | "null")
                ) =>
            {
                Err(
                    "`type_is` expects one of array, object, string, number, boolean, null"
                        .to_string(),
                )
            }
            _ => Ok(()),
        }
    }

    /// Human-readable form, e.g. `status equals 200`.
    pub fn describe(&self) -> String {
        if self.operator.takes_operand() {
            format!("{} {} {}", self.target, self.operator.label(), render(&self.expected))
        } else {
            format!("{} {}", self.target, self.operator.label())
        }
    }

    /// Evaluate against `response`. Only a JSON target on a non-JSON body errors.
    pub fn evaluate(&self, response: &ApiResponse) -> Result<AssertionResult, CaseError> {
        let actual = self.extract(response)?;
        let passed = self.holds(actual.as_ref());
        let actual_text = actual
            .as_ref()
            .map(|value| truncate_chars(&render(value), ACTUAL_PREVIEW_CHARS))
            .unwrap_or_else(|| "<absent>".to_string());

        let message = if passed {
            self.describe()
        } else {
            format!("expected {}, got {}", self.describe(), actual_text)
        };

        Ok(AssertionResult {
            assertion: self.clone(),
            passed,
            actual: actual_text,
            message,
        })
    }

    fn extract(&self, response: &ApiResponse) -> Result<Option<Value>, CaseError> {
        Ok(match &self.target {
            AssertionTarget::Status => Some(Value::from(response.status)),
            AssertionTarget::Header(name) => {
                response.header(name).map(|value| Value::String(value.to_string()))
            }
            AssertionTarget::Json(pointer) => response.require_json()?.pointer(pointer).cloned(),
            AssertionTarget::Body => Some(Value::String(response.text.clone())),
        })
    }

    fn holds(&self, actual: Option<&Value>) -> bool {
        let expected = &self.expected;
        let ignore_case = self.ignore_case;
        match (self.operator, actual) {
            (AssertionOperator::Exists, found) => found.is_some(),
            (AssertionOperator::Missing, found) => found.is_none(),
            (AssertionOperator::NotEquals, found) => {
                found.is_none_or(|value| !loosely_equal(value, expected, ignore_case))
            }
            (AssertionOperator::NotContains, found) => {
                found.is_none_or(|value| !contains(value, expected, ignore_case))
            }
            (_, None) => false,
            (AssertionOperator::Equals, Some(value)) => loosely_equal(value, expected, ignore_case),
            (AssertionOperator::Contains, Some(value)) => contains(value, expected, ignore_case),
            (AssertionOperator::OneOf, Some(value)) => expected.as_array().is_some_and(|options| {
                options
                    .iter()
                    .any(|option| loosely_equal(value, option, ignore_case))
            }),
            (AssertionOperator::GreaterThan, Some(value)) => {
                compare(value, expected).is_some_and(|(left, right)| left > right)
            }
            (AssertionOperator::LessThan, Some(value)) => {
                compare(value, expected).is_some_and(|(left, right)| left < right)
            }
            (AssertionOperator::TypeIs, Some(value)) => expected.as_str() == Some(type_name(value)),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Equality that tolerates a string on one side, so `"200"` equals `200`.
fn loosely_equal(actual: &Value, expected: &Value, ignore_case: bool) -> bool {
    match (actual, expected) {
        (Value::String(left), Value::String(right)) if ignore_case => {
            left.to_lowercase() == right.to_lowercase()
        }
        (Value::String(_), Value::String(_)) => actual == expected,
        (Value::String(_), _) | (_, Value::String(_)) => {
            let (left, right) = (render(actual), render(expected));
            if ignore_case {
                left.to_lowercase() == right.to_lowercase()
            } else {
                left == right
            }
        }
        _ => actual == expected,
    }
}

fn contains(actual: &Value, expected: &Value, ignore_case: bool) -> bool {
    match actual {
        Value::String(text) => {
            let needle = render(expected);
            if ignore_case {
                text.to_lowercase().contains(&needle.to_lowercase())
            } else {
                text.contains(&needle)
            }
        }
        Value::Array(items) => items
            .iter()
            .any(|item| loosely_equal(item, expected, ignore_case)),
        Value::Object(map) => expected.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

/// Numbers compare by value; strings, arrays and objects by length.
fn compare(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    let right = expected.as_f64()?;
    let left = match actual {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .unwrap_or(text.chars().count() as f64),
        Value::Array(items) => items.len() as f64,
        Value::Object(map) => map.len() as f64,
        _ => return None,
    };
    Some((left, right))
}
