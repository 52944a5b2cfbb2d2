use tracing::{info, warn};

use super::outcome::{Checked, OutcomeDetail, OutcomeKind, TestOutcome};

/// Collects outcomes in execution order and logs each one as it lands, so
/// progress is visible while a long suite is still running.
#[derive(Debug, Default)]
pub struct Recorder {
    outcomes: Vec<TestOutcome>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: TestOutcome) {
        if outcome.success {
            info!(
                test = %outcome.name,
                duration_ms = outcome.duration_ms,
                "PASS {}: {}",
                outcome.name,
                outcome.message
            );
        } else {
            warn!(
                test = %outcome.name,
                kind = %outcome.kind,
                duration_ms = outcome.duration_ms,
                "FAIL {}: {}",
                outcome.name,
                outcome.message
            );
        }
        self.outcomes.push(outcome);
    }

    /// Record a plain predicate result for callers that check things by hand.
    pub fn check(
        &mut self,
        name: impl Into<String>,
        success: bool,
        message: impl Into<String>,
        detail: Option<OutcomeDetail>,
    ) {
        let name = name.into();
        let outcome = if success {
            let mut outcome = TestOutcome::passed(name, Checked::new(message), 0);
            outcome.detail = detail;
            outcome
        } else {
            TestOutcome::failed(name, OutcomeKind::AssertionFailure, message, detail, 0)
        };
        self.record(outcome);
    }

    pub fn outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.success).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn into_outcomes(self) -> Vec<TestOutcome> {
        self.outcomes
    }
}
