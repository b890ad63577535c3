mod common;

use std::time::Duration;

use common::{json_response, response, BASE_URL};
use webhook_fanout::{classify, SendOutcome, DEFAULT_RETRY_AFTER, GLOBAL_COOLDOWN};

fn endpoint(suffix: &str) -> String {
    format!("{BASE_URL}{suffix}")
}

#[test]
fn status_204_is_delivered() {
    let outcome = classify(&response(204, &endpoint("12345/abcdef")), BASE_URL);
    assert_eq!(outcome, SendOutcome::Delivered);
}

#[test]
fn unsubscribe_statuses_extract_the_url_suffix() {
    for status in [401, 403, 404] {
        let outcome = classify(&response(status, &endpoint("12345/abcdef")), BASE_URL);
        assert_eq!(
            outcome,
            SendOutcome::Unsubscribed(Some("12345/abcdef".to_string())),
            "status {status}"
        );
    }
}

#[test]
fn rewritten_url_yields_no_unsubscribe_identifier() {
    // A redirect landed somewhere that no longer matches the endpoint
    // pattern; extracting an identifier from it would be wrong.
    let outcome = classify(
        &response(404, "https://cdn.other.example/error-page"),
        BASE_URL,
    );
    assert_eq!(outcome, SendOutcome::Unsubscribed(None));
}

#[test]
fn other_statuses_are_permanent_failures() {
    for status in [400, 405, 500] {
        match classify(&response(status, &endpoint("x")), BASE_URL) {
            SendOutcome::PermanentFailure { status: got, .. } => assert_eq!(got, status),
            other => panic!("status {status} classified as {other:?}"),
        }
    }
}

#[test]
fn permanent_failure_carries_response_body() {
    let mut resp = response(500, &endpoint("x"));
    resp.body = b"internal error".to_vec();
    match classify(&resp, BASE_URL) {
        SendOutcome::PermanentFailure { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn global_rate_limit_forces_fixed_cooldown() {
    let resp = json_response(429, &endpoint("x"), r#"{"global": true, "retry_after": 5}"#);
    assert_eq!(
        classify(&resp, BASE_URL),
        SendOutcome::RateLimited { retry_after: GLOBAL_COOLDOWN }
    );
}

#[test]
fn rate_limit_reads_retry_after_from_body() {
    let resp = json_response(429, &endpoint("x"), r#"{"retry_after": 2}"#);
    assert_eq!(
        classify(&resp, BASE_URL),
        SendOutcome::RateLimited { retry_after: Duration::from_secs(2) }
    );
}

#[test]
fn fractional_retry_after_rounds_up() {
    let resp = json_response(429, &endpoint("x"), r#"{"retry_after": 2.3}"#);
    assert_eq!(
        classify(&resp, BASE_URL),
        SendOutcome::RateLimited { retry_after: Duration::from_secs(3) }
    );
}

#[test]
fn non_json_rate_limit_uses_default_cooldown() {
    let resp = response(429, &endpoint("x"));
    assert_eq!(
        classify(&resp, BASE_URL),
        SendOutcome::RateLimited { retry_after: DEFAULT_RETRY_AFTER }
    );
}

#[test]
fn malformed_json_rate_limit_uses_default_cooldown() {
    let resp = json_response(429, &endpoint("x"), "{not json");
    assert_eq!(
        classify(&resp, BASE_URL),
        SendOutcome::RateLimited { retry_after: DEFAULT_RETRY_AFTER }
    );
}
