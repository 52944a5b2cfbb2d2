use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::environment::expand_variables;
use crate::http::client::Transport;

use super::case::TestCase;
use super::context::{BASE_URL_KEY, SharedContext};
use super::outcome::TestOutcome;
use super::recorder::Recorder;
use super::report::RunReport;
use super::suite::Suite;

/// Per-run knobs the orchestrator needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    /// Seeded into the context as `base_url`.
    pub base_url: Option<String>,
    /// Pause between consecutive cases.
    pub delay: Duration,
}

/// Runs a suite's cases one after another against a transport.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Execute every case in declared order. Failures never stop the run;
    /// each case contributes exactly one outcome.
    pub async fn run(&self, suite: &Suite, transport: &dyn Transport) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at_ms = now_ms();
        let started = Instant::now();
        let mut ctx = self.seed_context(suite);
        let mut recorder = Recorder::new();

        info!(suite = %suite.name(), run_id = %run_id, cases = suite.len(), "starting run");

        for (index, case) in suite.cases().iter().enumerate() {
            if index > 0 && !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
            }
            let outcome = run_case(case.as_ref(), &mut ctx, transport).await;
            recorder.record(outcome);
        }

        let report = RunReport::new(
            suite.name(),
            run_id,
            started_at_ms,
            started.elapsed().as_millis() as u64,
            recorder.into_outcomes(),
        );
        info!(
            suite = %report.suite,
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            "run finished"
        );
        report
    }

    fn seed_context(&self, suite: &Suite) -> SharedContext {
        let mut ctx = SharedContext::new();
        if let Some(base_url) = &self.settings.base_url {
            ctx.set(BASE_URL_KEY, base_url.clone());
        }
        for (key, value) in expand_variables(suite.variables(), &ctx) {
            debug!(key = %key, value = %value, "seeding variable");
            ctx.set(key, value);
        }
        ctx
    }
}

/// Run a single case, turning every error or panic into a failing outcome.
pub async fn run_case(
    case: &dyn TestCase,
    ctx: &mut SharedContext,
    transport: &dyn Transport,
) -> TestOutcome {
    let missing = ctx.missing(case.requires());
    if !missing.is_empty() {
        debug!(test = %case.name(), missing = ?missing, "skipping case");
        return TestOutcome::prerequisite_missing(case.name(), missing);
    }

    let started = Instant::now();
    let result = AssertUnwindSafe(case.execute(ctx, transport))
        .catch_unwind()
        .await;
    let elapsed = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(checked)) => TestOutcome::passed(case.name(), checked, elapsed),
        Ok(Err(err)) => TestOutcome::from_error(case.name(), err, elapsed),
        Err(payload) => TestOutcome::fault(case.name(), &panic_message(payload.as_ref()), elapsed),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CaseError, TransportError, TransportErrorKind};
    use crate::testing::assertion::Assertion;
    use crate::testing::outcome::{Checked, OutcomeKind, PREREQUISITE_MISSING};
    use crate::testing::request_case::RequestCase;
    use crate::testing::stub::StubTransport;
    use async_trait::async_trait;
    use serde_json::json;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(RunSettings {
            base_url: Some("http://sut.local/api".into()),
            delay: Duration::ZERO,
        })
    }

    struct Panicking;

    #[async_trait]
    impl TestCase for Panicking {
        fn name(&self) -> &str {
            "panics"
        }

        async fn execute(
            &self,
            _ctx: &mut SharedContext,
            _transport: &dyn Transport,
        ) -> Result<Checked, CaseError> {
            panic!("index out of range");
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_run() {
        let transport = StubTransport::new()
            .respond(500, json!({"error": "boom"}))
            .fail(TransportError::new(TransportErrorKind::Timeout, "timed out"))
            .respond(200, json!({"ok": true}));

        let suite = Suite::new("mixed")
            .with_case(RequestCase::get("first", "/a").expect(Assertion::status_is(200)))
            .and_then(|s| s.with_case(RequestCase::get("second", "/b")))
            .and_then(|s| s.with_case(RequestCase::get("third", "/c")))
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.outcomes[0].kind, OutcomeKind::AssertionFailure);
        assert_eq!(report.outcomes[1].kind, OutcomeKind::TransportError);
        assert!(report.outcomes[2].success);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn missing_token_short_circuits_without_a_call() {
        let transport = StubTransport::new().respond(401, json!({"error": "Invalid credentials"}));

        let suite = Suite::new("auth")
            .with_case(
                RequestCase::post("login", "/auth/login", json!({}))
                    .expect(Assertion::status_is(200))
                    .capture("token", "/token"),
            )
            .and_then(|s| {
                s.with_case(RequestCase::get("verify", "/auth/verify").with_auth("token"))
            })
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.outcomes[1].message, PREREQUISITE_MISSING);
        assert_eq!(report.outcomes[1].kind, OutcomeKind::PrerequisiteMissing);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn captured_values_flow_to_later_cases() {
        let transport = StubTransport::new()
            .respond(200, json!({"token": "jwt-1"}))
            .respond(200, json!({"user": {"role": "student"}}));

        let suite = Suite::new("flow")
            .with_case(
                RequestCase::post("login", "/auth/login", json!({})).capture("token", "/token"),
            )
            .and_then(|s| {
                s.with_case(RequestCase::get("verify", "/auth/verify").with_auth("token"))
            })
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        assert_eq!(report.passed, 2);
        let requests = transport.requests();
        assert_eq!(requests[1].bearer.as_deref(), Some("jwt-1"));
        assert_eq!(requests[1].url, "http://sut.local/api/auth/verify");
    }

    #[tokio::test]
    async fn panic_becomes_a_single_fault_outcome() {
        let transport = StubTransport::new();
        let suite = Suite::new("panic")
            .with_case(Panicking)
            .and_then(|s| s.with_case(RequestCase::get("after", "/health")))
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        assert_eq!(report.total, 2);
        assert_eq!(report.outcomes[0].kind, OutcomeKind::Fault);
        assert_eq!(report.outcomes[0].message, "test case panicked: index out of range");
        assert!(report.outcomes[1].success);
    }

    #[tokio::test]
    async fn context_is_fresh_for_every_run() {
        let transport = StubTransport::new()
            .respond(200, json!({"token": "first"}))
            .respond(200, json!({"user": {}}))
            .respond(401, json!({}));

        let mut suite = Suite::new("rerun");
        suite.set_variable("email", "user{{$short_id}}@example.edu");
        suite
            .push(RequestCase::post("login", "/auth/login", json!({"email": "{{email}}"}))
                .expect(Assertion::status_is(200))
                .capture("token", "/token"))
            .unwrap();
        suite
            .push(RequestCase::get("verify", "/auth/verify").with_auth("token"))
            .unwrap();

        let orchestrator = orchestrator();
        let first = orchestrator.run(&suite, &transport).await;
        assert_eq!(first.passed, 2);

        // The second run's login fails, so the first run's token must not leak in.
        let second = orchestrator.run(&suite, &transport).await;
        assert_eq!(second.outcomes[1].message, PREREQUISITE_MISSING);

        let emails: Vec<_> = transport
            .requests()
            .iter()
            .filter(|request| request.url.ends_with("/auth/login"))
            .map(|request| request.json.clone().unwrap()["email"].clone())
            .collect();
        assert_eq!(emails.len(), 2);
        assert_ne!(emails[0], emails[1]);
    }

    #[tokio::test]
    async fn variable_with_unknown_reference_short_circuits() {
        let transport = StubTransport::new();
        let mut suite = Suite::new("vars");
        suite.set_variable("email", "{{prefix}}@example.edu");
        suite
            .push(RequestCase::post(
                "register",
                "/auth/register",
                json!({"email": "{{email}}"}),
            ))
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.kind, OutcomeKind::PrerequisiteMissing);
        assert_eq!(outcome.message, PREREQUISITE_MISSING);
        assert_eq!(outcome.detail.as_ref().unwrap().missing_keys, vec!["prefix"]);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn variables_may_reference_each_other() {
        let transport = StubTransport::new();
        let mut suite = Suite::new("vars");
        suite.set_variable("domain", "example.edu");
        suite.set_variable("email", "user{{$short_id}}@{{domain}}");
        suite
            .push(RequestCase::post(
                "register",
                "/auth/register",
                json!({"email": "{{email}}"}),
            ))
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        assert_eq!(report.passed, 1);
        let sent = transport.requests()[0].json.clone().unwrap();
        let email = sent["email"].as_str().unwrap();
        assert!(email.starts_with("user") && email.ends_with("@example.edu"));
    }

    #[tokio::test]
    async fn failed_capture_leaves_later_cases_short_circuited() {
        let transport = StubTransport::new().respond(200, json!({"a": "token-a"}));
        let suite = Suite::new("captures")
            .with_case(
                RequestCase::get("login", "/auth/login")
                    .capture("a", "/a")
                    .capture("b", "/b"),
            )
            .and_then(|s| s.with_case(RequestCase::get("verify", "/auth/verify").with_auth("a")))
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        assert_eq!(report.outcomes[0].kind, OutcomeKind::AssertionFailure);
        assert_eq!(report.outcomes[1].message, PREREQUISITE_MISSING);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn non_json_body_is_a_malformed_outcome() {
        let transport = StubTransport::new().respond_text(200, "<html>maintenance</html>");
        let suite = Suite::new("malformed")
            .with_case(RequestCase::get("login", "/auth/login").capture("token", "/token"))
            .unwrap();

        let report = orchestrator().run(&suite, &transport).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.kind, OutcomeKind::MalformedResponse);
        let detail = outcome.detail.as_ref().unwrap();
        assert_eq!(detail.status, Some(200));
        assert!(detail.body_excerpt.as_deref().unwrap().contains("maintenance"));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_applies_between_cases_only() {
        let transport = StubTransport::new();
        let suite = Suite::new("delay")
            .with_case(RequestCase::get("a", "/a"))
            .and_then(|s| s.with_case(RequestCase::get("b", "/b")))
            .and_then(|s| s.with_case(RequestCase::get("c", "/c")))
            .unwrap();
        let orchestrator = Orchestrator::new(RunSettings {
            base_url: Some("http://sut.local".into()),
            delay: Duration::from_millis(500),
        });

        let started = tokio::time::Instant::now();
        let report = orchestrator.run(&suite, &transport).await;

        assert_eq!(report.passed, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500));
    }
}
