use std::fmt::{self, Display, Write as _};

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::outcome::TestOutcome;

const RULE_WIDTH: usize = 60;

/// Aggregate of one suite run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub suite: String,
    pub started_at_ms: u64,
    pub duration_ms: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage of passing outcomes, 0 for an empty run.
    pub success_rate: f64,
    pub latency: LatencySummary,
    pub outcomes: Vec<TestOutcome>,
}

impl RunReport {
    pub fn new(
        suite: impl Into<String>,
        run_id: impl Into<String>,
        started_at_ms: u64,
        duration_ms: u64,
        outcomes: Vec<TestOutcome>,
    ) -> Self {
        let total = outcomes.len();
        let passed = outcomes.iter().filter(|outcome| outcome.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            passed as f64 * 100.0 / total as f64
        };
        let latency = LatencySummary::from_durations(
            outcomes
                .iter()
                .filter(|outcome| outcome.issued_request())
                .map(|outcome| outcome.duration_ms),
        );

        Self {
            run_id: run_id.into(),
            suite: suite.into(),
            started_at_ms,
            duration_ms,
            total,
            passed,
            failed: total - passed,
            success_rate,
            latency,
            outcomes,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.success)
    }

    /// Whether the pass rate reaches `threshold` percent. An empty run never does.
    pub fn meets(&self, threshold: f64) -> bool {
        self.total > 0 && self.success_rate >= threshold
    }
}

/// Case durations of the cases that reached the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub min_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

impl LatencySummary {
    pub fn from_durations(durations: impl IntoIterator<Item = u64>) -> Self {
        let Ok(mut histogram) = Histogram::<u64>::new(3) else {
            return Self::default();
        };
        for duration in durations {
            histogram.saturating_record(duration);
        }
        if histogram.is_empty() {
            return Self::default();
        }

        Self {
            samples: histogram.len(),
            min_ms: histogram.min(),
            p50_ms: histogram.value_at_quantile(0.50),
            p95_ms: histogram.value_at_quantile(0.95),
            max_ms: histogram.max(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl Verdict {
    pub fn headline(self) -> &'static str {
        match self {
            Verdict::Excellent => "system under test is behaving as expected",
            Verdict::Good => "most checks passed, minor issues detected",
            Verdict::Warning => "some critical checks failed",
            Verdict::Critical => "major issues detected, the system needs attention",
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Excellent => "EXCELLENT",
            Verdict::Good => "GOOD",
            Verdict::Warning => "WARNING",
            Verdict::Critical => "CRITICAL",
        };
        write!(f, "{label}")
    }
}

/// Lower bounds (percent) of each verdict band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerdictBands {
    pub excellent: f64,
    pub good: f64,
    pub warning: f64,
}

impl Default for VerdictBands {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            good: 80.0,
            warning: 60.0,
        }
    }
}

impl VerdictBands {
    pub fn classify(&self, success_rate: f64) -> Verdict {
        if success_rate >= self.excellent {
            Verdict::Excellent
        } else if success_rate >= self.good {
            Verdict::Good
        } else if success_rate >= self.warning {
            Verdict::Warning
        } else {
            Verdict::Critical
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = 100.0 >= self.excellent
            && self.excellent >= self.good
            && self.good >= self.warning
            && self.warning >= 0.0;
        if ordered {
            Ok(())
        } else {
            Err(ConfigError::InvalidBands)
        }
    }
}

/// Report plus its evaluation, as written in JSON output.
#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    threshold: f64,
    threshold_met: bool,
    verdict: Verdict,
}

/// Renders a [`RunReport`] and decides pass/fail against a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportGenerator {
    threshold: f64,
    bands: VerdictBands,
}

impl ReportGenerator {
    pub fn new(threshold: f64, bands: VerdictBands) -> Self {
        Self { threshold, bands }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn passes(&self, report: &RunReport) -> bool {
        report.meets(self.threshold)
    }

    pub fn verdict(&self, report: &RunReport) -> Verdict {
        if report.total == 0 {
            return Verdict::Critical;
        }
        self.bands.classify(report.success_rate)
    }

    pub fn render_json(&self, report: &RunReport) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&ReportDocument {
            report,
            threshold: self.threshold,
            threshold_met: self.passes(report),
            verdict: self.verdict(report),
        })
    }

    pub fn render_text(&self, report: &RunReport) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let thin_rule = "-".repeat(RULE_WIDTH);
        let mut out = String::new();

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Suite: {} (run {})", report.suite, report.run_id);
        let _ = writeln!(out, "{rule}");

        for outcome in &report.outcomes {
            let status = if outcome.success { "PASS" } else { "FAIL" };
            let _ = writeln!(out, "{status}  {}: {}", outcome.name, outcome.message);
        }

        let _ = writeln!(out, "{thin_rule}");
        let _ = writeln!(out, "Total:        {}", report.total);
        let _ = writeln!(out, "Passed:       {}", report.passed);
        let _ = writeln!(out, "Failed:       {}", report.failed);
        let _ = writeln!(out, "Success rate: {:.1}%", report.success_rate);
        if report.latency.samples > 0 {
            let latency = &report.latency;
            let _ = writeln!(
                out,
                "Latency:      min {} ms, p50 {} ms, p95 {} ms, max {} ms",
                latency.min_ms, latency.p50_ms, latency.p95_ms, latency.max_ms
            );
        }
        let _ = writeln!(out, "Duration:     {} ms", report.duration_ms);
        let _ = writeln!(
            out,
            "Threshold:    {:.1}% ({})",
            self.threshold,
            if self.passes(report) { "met" } else { "not met" }
        );

        let failures: Vec<&TestOutcome> = report.failures().collect();
        if !failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failures:");
            for (index, outcome) in failures.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {} [{}]: {}",
                    index + 1,
                    outcome.name,
                    outcome.kind,
                    outcome.message
                );
                if let Some(excerpt) = outcome
                    .detail
                    .as_ref()
                    .and_then(|detail| detail.body_excerpt.as_deref())
                {
                    let _ = writeln!(out, "     body: {excerpt}");
                }
            }
        }

        let verdict = self.verdict(report);
        let _ = writeln!(out);
        let _ = writeln!(out, "Verdict: {verdict} - {}", verdict.headline());
        let _ = writeln!(out, "{rule}");
        out
    }
}
