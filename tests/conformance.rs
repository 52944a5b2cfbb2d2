mod common;

use std::time::Duration;

use apicheck::error::TransportErrorKind;
use apicheck::http::{HttpClient, HttpMethod};
use apicheck::testing::{
    Assertion, AssertionOperator, AssertionTarget, Orchestrator, OutcomeKind, PREREQUISITE_MISSING,
    ReportGenerator, RequestCase, RunSettings, Suite, VerdictBands, Verdict,
};
use serde_json::json;

use common::{ADMIN_EMAIL, SpyTransport, StubServer};

fn orchestrator(base_url: &str) -> Orchestrator {
    Orchestrator::new(RunSettings {
        base_url: Some(base_url.to_string()),
        delay: Duration::ZERO,
    })
}

fn client() -> HttpClient {
    HttpClient::new(Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn healthy_endpoint_passes() {
    let server = StubServer::spawn().await;
    let suite = Suite::new("health")
        .with_case(RequestCase::get("health", "/health").expect(Assertion::status_is(200)))
        .unwrap();

    let report = orchestrator(server.base_url()).run(&suite, &client()).await;

    assert_eq!((report.total, report.passed, report.failed), (1, 1, 0));
    assert_eq!(report.success_rate, 100.0);
    let generator = ReportGenerator::new(80.0, VerdictBands::default());
    assert!(generator.passes(&report));
    assert_eq!(generator.verdict(&report), Verdict::Excellent);
}

#[tokio::test]
async fn server_error_is_a_failure_naming_the_status() {
    let server = StubServer::spawn().await;
    let suite = Suite::new("boom")
        .with_case(RequestCase::get("boom", "/boom").expect(Assertion::status_is(200)))
        .unwrap();

    let report = orchestrator(server.base_url()).run(&suite, &client()).await;

    assert_eq!(report.failed, 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.kind, OutcomeKind::AssertionFailure);
    assert!(outcome.message.contains("500"), "{}", outcome.message);
    let detail = outcome.detail.as_ref().unwrap();
    assert_eq!(detail.status, Some(500));
    assert!(detail.body_excerpt.as_deref().unwrap().contains("database unavailable"));
}

#[tokio::test]
async fn unresponsive_endpoint_times_out() {
    let server = StubServer::spawn().await;
    let suite = Suite::new("slow")
        .with_case(RequestCase::get("slow", "/slow").expect(Assertion::status_is(200)))
        .unwrap();
    let client = HttpClient::new(Duration::from_secs(2)).unwrap();

    let report = orchestrator(server.base_url()).run(&suite, &client).await;

    assert_eq!((report.total, report.failed), (1, 1));
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.kind, OutcomeKind::TransportError);
    assert_eq!(
        outcome.detail.as_ref().unwrap().transport_error,
        Some(TransportErrorKind::Timeout)
    );
}

#[tokio::test]
async fn missing_token_never_reaches_the_wire() {
    let server = StubServer::spawn().await;
    let suite = Suite::new("auth")
        .with_case(RequestCase::get("verify", "/api/auth/verify").with_auth("token"))
        .unwrap();
    let spy = SpyTransport::new(client());

    let report = orchestrator(server.base_url()).run(&suite, &spy).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.outcomes[0].message, PREREQUISITE_MISSING);
    assert_eq!(report.outcomes[0].kind, OutcomeKind::PrerequisiteMissing);
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn non_json_body_is_malformed_when_captured() {
    let server = StubServer::spawn().await;
    let suite = Suite::new("text")
        .with_case(RequestCase::get("text", "/text").capture("token", "/token"))
        .unwrap();

    let report = orchestrator(server.base_url()).run(&suite, &client()).await;

    assert_eq!(report.outcomes[0].kind, OutcomeKind::MalformedResponse);
}

fn auth_flow(email: &str) -> Suite {
    let mut suite = Suite::new("auth flow");
    suite.set_variable("email", email);
    suite
        .push(
            RequestCase::post(
                "register",
                "/auth/register",
                json!({"email": "{{email}}", "password": "TestPass123", "name": "Test User"}),
            )
            .expect(Assertion::status_is(200))
            .expect(Assertion::new(
                AssertionTarget::Json("/user/role".into()),
                AssertionOperator::Equals,
                json!("student"),
            ))
            .capture("token", "/token"),
        )
        .unwrap();
    suite
        .push(
            RequestCase::get("verify", "/auth/verify")
                .with_auth("token")
                .expect(Assertion::status_is(200))
                .expect(Assertion::json_exists("/user/email")),
        )
        .unwrap();
    suite
        .push(
            RequestCase::new("student cannot create resources", HttpMethod::Post, "/resources")
                .with_auth("token")
                .with_body(json!({"title": "Notes"}))
                .expect(Assertion::status_is(403)),
        )
        .unwrap();
    suite
        .push(
            RequestCase::get("anonymous verify", "/auth/verify").expect(Assertion::status_is(401)),
        )
        .unwrap();
    suite
}

#[tokio::test]
async fn generated_emails_make_reruns_independent() {
    let server = StubServer::spawn().await;
    let suite = auth_flow("user{{$short_id}}@sxc.edu.in");
    let orchestrator = orchestrator(&server.api_url());

    for _ in 0..2 {
        let report = orchestrator.run(&suite, &client()).await;
        assert_eq!(report.passed, 4, "{:#?}", report.outcomes);
    }
}

#[tokio::test]
async fn duplicate_registration_fails_deterministically_on_rerun() {
    let server = StubServer::spawn().await;
    let suite = auth_flow("fixed@sxc.edu.in");
    let orchestrator = orchestrator(&server.api_url());

    let first = orchestrator.run(&suite, &client()).await;
    assert_eq!(first.passed, 4);

    for _ in 0..2 {
        let rerun = orchestrator.run(&suite, &client()).await;
        let register = &rerun.outcomes[0];
        assert_eq!(register.kind, OutcomeKind::AssertionFailure);
        assert_eq!(register.message, "expected status equals 200, got 400");
        assert_eq!(rerun.outcomes[1].message, PREREQUISITE_MISSING);
        assert_eq!(rerun.outcomes[2].message, PREREQUISITE_MISSING);
        assert!(rerun.outcomes[3].success);
    }
}

#[tokio::test]
async fn admin_role_comes_from_the_service() {
    let server = StubServer::spawn().await;
    let mut suite = Suite::new("admin");
    suite.set_variable("admin_email", ADMIN_EMAIL);
    suite
        .push(
            RequestCase::post(
                "register admin",
                "/auth/register",
                json!({"email": "{{admin_email}}", "password": "AdminPass123"}),
            )
            .expect(Assertion::new(
                AssertionTarget::Json("/user/role".into()),
                AssertionOperator::Equals,
                json!("admin"),
            ))
            .capture("admin_token", "/token"),
        )
        .unwrap();
    suite
        .push(
            RequestCase::post("create resource", "/resources", json!({"title": "Syllabus"}))
                .with_auth("admin_token")
                .expect(Assertion::status_is(201))
                .capture("resource_id", "/resource/id"),
        )
        .unwrap();
    suite
        .push(
            RequestCase::new("delete resource", HttpMethod::Delete, "/resources/{{resource_id}}")
                .with_auth("admin_token")
                .expect(Assertion::status_is(200)),
        )
        .unwrap();

    let report = orchestrator(&server.api_url()).run(&suite, &client()).await;

    assert_eq!(report.passed, 3, "{:#?}", report.outcomes);
}
