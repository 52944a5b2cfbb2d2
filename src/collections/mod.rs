//! # Suite Files
//!
//! Declarative JSON suites: an ordered list of request cases, optional run
//! settings, and variables seeded into each run's context.
//!
//! ```json
//! {
//!   "name": "core backend",
//!   "base_url": "http://localhost:3000/api",
//!   "variables": { "email": "user{{$short_id}}@example.edu" },
//!   "cases": [
//!     { "name": "register", "method": "POST", "path": "/auth/register",
//!       "body": { "email": "{{email}}" },
//!       "expect": [ { "target": "status", "op": "equals", "expected": 200 } ],
//!       "capture": { "token": "/token" } }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::environment::{expand_variables, is_generator, placeholders};
use crate::error::SuiteError;
use crate::http::method::HttpMethod;
use crate::testing::assertion::Assertion;
use crate::testing::context::{BASE_URL_KEY, SharedContext};
use crate::testing::report::VerdictBands;
use crate::testing::request_case::RequestCase;
use crate::testing::suite::Suite;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict_bands: Option<VerdictBands>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub cases: Vec<CaseSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseSpec {
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Context key whose value is sent as a bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub expect: Vec<Assertion>,
    /// Context key -> JSON pointer into the response body.
    #[serde(default)]
    pub capture: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

pub fn load_suite_file(path: &Path) -> Result<SuiteFile, SuiteError> {
    let raw = fs::read_to_string(path).map_err(|source| SuiteError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SuiteError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl SuiteFile {
    pub fn validate(&self) -> Result<(), SuiteError> {
        if self.cases.is_empty() {
            return Err(SuiteError::Empty(self.name.clone()));
        }

        for name in self.variables.keys() {
            if name.trim().is_empty() || name.starts_with('$') {
                return Err(SuiteError::InvalidVariable {
                    name: name.clone(),
                    reason: "names must be non-empty and must not start with `$`".into(),
                });
            }
            if name == BASE_URL_KEY {
                return Err(SuiteError::InvalidVariable {
                    name: name.clone(),
                    reason: "set the base URL with the `base_url` field instead".into(),
                });
            }
        }
        self.check_variable_references()?;

        let mut seen = HashSet::new();
        for case in &self.cases {
            if !seen.insert(case.name.as_str()) {
                return Err(SuiteError::DuplicateCase(case.name.clone()));
            }
            case.validate()?;
        }
        Ok(())
    }

    /// Variables may reference generators, `base_url` and each other, as long
    /// as every reference eventually resolves.
    fn check_variable_references(&self) -> Result<(), SuiteError> {
        for (name, template) in &self.variables {
            let unknown = placeholders(template).into_iter().find(|key| {
                !is_generator(key) && key != BASE_URL_KEY && !self.variables.contains_key(key)
            });
            if let Some(key) = unknown {
                return Err(SuiteError::InvalidVariable {
                    name: name.clone(),
                    reason: format!("references `{key}`, which is not a suite variable"),
                });
            }
        }

        let seed: SharedContext = [(BASE_URL_KEY, "http://localhost")].into_iter().collect();
        let expanded = expand_variables(&self.variables, &seed);
        let unresolved = expanded
            .iter()
            .find(|(_, value)| !placeholders(value).is_empty());
        if let Some((name, _)) = unresolved {
            return Err(SuiteError::InvalidVariable {
                name: name.clone(),
                reason: "references form a cycle".into(),
            });
        }
        Ok(())
    }

    /// Context keys a case reads that neither the suite nor any earlier case
    /// provides. Such cases can only ever end as prerequisite failures.
    pub fn lint(&self) -> Vec<String> {
        let mut available: BTreeSet<String> = self.variables.keys().cloned().collect();
        available.insert(BASE_URL_KEY.to_string());

        let mut warnings = Vec::new();
        for case in &self.cases {
            for key in case.context_keys() {
                if !available.contains(&key) {
                    warnings.push(format!(
                        "case `{}` reads `{key}`, which no variable or earlier case provides",
                        case.name
                    ));
                }
            }
            available.extend(case.capture.keys().cloned());
        }
        warnings
    }

    pub fn into_suite(self) -> Result<Suite, SuiteError> {
        self.validate()?;

        let mut suite = Suite::new(self.name);
        for (key, template) in self.variables {
            suite.set_variable(key, template);
        }
        for spec in &self.cases {
            suite.push(spec.to_case())?;
        }
        Ok(suite)
    }
}

impl CaseSpec {
    fn invalid(&self, reason: impl Into<String>) -> SuiteError {
        SuiteError::InvalidCase {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<(), SuiteError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name cannot be empty"));
        }
        if self.path.trim().is_empty() {
            return Err(self.invalid("path cannot be empty"));
        }
        if self.timeout_secs == Some(0) {
            return Err(self.invalid("timeout_secs must be greater than zero"));
        }
        if self.body.is_some() && !self.method.allows_body() {
            return Err(self.invalid(format!("{} requests cannot carry a body", self.method)));
        }
        for (key, pointer) in &self.capture {
            if key.trim().is_empty() {
                return Err(self.invalid("capture keys cannot be empty"));
            }
            if !pointer.starts_with('/') {
                return Err(self.invalid(format!(
                    "capture `{key}` pointer `{pointer}` must start with `/`"
                )));
            }
        }
        for assertion in &self.expect {
            assertion
                .validate()
                .map_err(|reason| self.invalid(format!("{}: {reason}", assertion.describe())))?;
        }
        Ok(())
    }

    /// Every context key this case reads, in first-use order.
    fn context_keys(&self) -> Vec<String> {
        let mut texts = vec![self.path.clone()];
        texts.extend(self.headers.values().cloned());
        if let Some(body) = &self.body {
            collect_strings(body, &mut texts);
        }

        let mut keys: Vec<String> = Vec::new();
        let mut push = |key: String| {
            if !is_generator(&key) && !keys.contains(&key) {
                keys.push(key);
            }
        };
        for text in &texts {
            for key in placeholders(text) {
                push(key);
            }
        }
        for key in self.requires.iter().chain(self.auth.iter()) {
            push(key.clone());
        }
        keys
    }

    fn to_case(&self) -> RequestCase {
        let mut case = RequestCase::new(self.name.clone(), self.method, self.path.clone());
        for (name, value) in &self.headers {
            case = case.with_header(name.clone(), value.clone());
        }
        if let Some(body) = &self.body {
            case = case.with_body(body.clone());
        }
        for key in &self.requires {
            case = case.requiring(key.clone());
        }
        if let Some(key) = &self.auth {
            case = case.with_auth(key.clone());
        }
        for assertion in &self.expect {
            case = case.expect(assertion.clone());
        }
        for (key, pointer) in &self.capture {
            case = case.capture(key.clone(), pointer.clone());
        }
        if let Some(secs) = self.timeout_secs {
            case = case.with_timeout(Duration::from_secs(secs));
        }
        case
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => out.push(text.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => {
            for (key, item) in map {
                out.push(key.clone());
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}
