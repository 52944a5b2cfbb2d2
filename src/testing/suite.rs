use std::collections::BTreeMap;

use crate::error::SuiteError;

use super::case::TestCase;

/// Ordered test cases plus the variables seeded into each run's context.
pub struct Suite {
    name: String,
    cases: Vec<Box<dyn TestCase>>,
    variables: BTreeMap<String, String>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Append a case. Names must be unique within the suite.
    pub fn push(&mut self, case: impl TestCase + 'static) -> Result<(), SuiteError> {
        self.push_boxed(Box::new(case))
    }

    pub fn push_boxed(&mut self, case: Box<dyn TestCase>) -> Result<(), SuiteError> {
        if self.cases.iter().any(|existing| existing.name() == case.name()) {
            return Err(SuiteError::DuplicateCase(case.name().to_string()));
        }
        self.cases.push(case);
        Ok(())
    }

    pub fn with_case(mut self, case: impl TestCase + 'static) -> Result<Self, SuiteError> {
        self.push(case)?;
        Ok(self)
    }

    /// Seed value for the context. `{{$uuid}}`-style generators are expanded
    /// at the start of every run.
    pub fn set_variable(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.variables.insert(key.into(), template.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cases(&self) -> &[Box<dyn TestCase>] {
        &self.cases
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field(
                "cases",
                &self.cases.iter().map(|case| case.name()).collect::<Vec<_>>(),
            )
            .field("variables", &self.variables)
            .finish()
    }
}
