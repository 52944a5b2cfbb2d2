//! # Testing & Assertions
//!
//! Test cases, the assertions they evaluate against responses, and the
//! orchestrator that runs a suite and aggregates a report.
//!
//! - Cases run strictly in declared order; a failure never stops the run
//! - Each case yields exactly one outcome, panics included
//! - Values flow between cases through a per-run shared context
//! - Reports carry totals, pass rate, failures, latency and a verdict band

pub mod assertion;
pub mod case;
pub mod context;
pub mod orchestrator;
pub mod outcome;
pub mod recorder;
pub mod report;
pub mod request_case;
pub mod suite;

#[cfg(test)]
pub(crate) mod stub;

pub use assertion::{Assertion, AssertionOperator, AssertionResult, AssertionTarget};
pub use case::TestCase;
pub use context::{BASE_URL_KEY, SharedContext};
pub use orchestrator::{Orchestrator, RunSettings, run_case};
pub use outcome::{Checked, OutcomeDetail, OutcomeKind, PREREQUISITE_MISSING, TestOutcome};
pub use recorder::Recorder;
pub use report::{LatencySummary, ReportGenerator, RunReport, Verdict, VerdictBands};
pub use request_case::RequestCase;
pub use suite::Suite;
