use crate::common::{test_client, SLACK_SIGNING_SECRET};
use hmac::{Hmac, Mac};
use rocket::http::{ContentType, Header, Status};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const COMMAND_BODY: &str =
    "token=xyz&team_id=T1&command=%2Fvanish&text=&trigger_id=123.456.abc&user_id=U123";

fn sign(timestamp: i64, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(SLACK_SIGNING_SECRET.as_bytes()).unwrap();
    mac.update(format!("v0:{timestamp}:{body}").as_bytes());
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

fn slack_headers(timestamp: i64, signature: &str) -> (Header<'static>, Header<'static>) {
    (
        Header::new("X-Slack-Request-Timestamp", timestamp.to_string()),
        Header::new("X-Slack-Signature", signature.to_string()),
    )
}

#[test]
fn test_valid_signature_accepted() {
    let client = test_client();
    let now = chrono::Utc::now().timestamp();
    let (ts, sig) = slack_headers(now, &sign(now, COMMAND_BODY));
    let res = client
        .post("/api/slack/command")
        .header(ContentType::Form)
        .header(ts)
        .header(sig)
        .body(COMMAND_BODY)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_tampered_body_rejected() {
    let client = test_client();
    let now = chrono::Utc::now().timestamp();
    let (ts, sig) = slack_headers(now, &sign(now, COMMAND_BODY));
    let tampered = COMMAND_BODY.replace("U123", "U666");
    let res = client
        .post("/api/slack/command")
        .header(ContentType::Form)
        .header(ts)
        .header(sig)
        .body(tampered)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_stale_timestamp_rejected() {
    let client = test_client();
    let then = chrono::Utc::now().timestamp() - 400;
    let (ts, sig) = slack_headers(then, &sign(then, COMMAND_BODY));
    let res = client
        .post("/api/slack/command")
        .header(ContentType::Form)
        .header(ts)
        .header(sig)
        .body(COMMAND_BODY)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_missing_signature_headers_rejected() {
    let client = test_client();
    let res = client
        .post("/api/slack/command")
        .header(ContentType::Form)
        .body(COMMAND_BODY)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_interaction_requires_signature_before_parsing() {
    let client = test_client();
    // A body that would even fail to parse — but the signature check comes
    // first and rejects it unread.
    let res = client
        .post("/api/slack/interaction")
        .header(ContentType::Form)
        .body("payload=%7Bgarbage")
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_interaction_missing_payload() {
    let client = test_client();
    let body = "not_payload=1";
    let now = chrono::Utc::now().timestamp();
    let (ts, sig) = slack_headers(now, &sign(now, body));
    let res = client
        .post("/api/slack/interaction")
        .header(ContentType::Form)
        .header(ts)
        .header(sig)
        .body(body)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_interaction_malformed_payload_json() {
    let client = test_client();
    let body = "payload=%7Bgarbage";
    let now = chrono::Utc::now().timestamp();
    let (ts, sig) = slack_headers(now, &sign(now, body));
    let res = client
        .post("/api/slack/interaction")
        .header(ContentType::Form)
        .header(ts)
        .header(sig)
        .body(body)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_interaction_ignores_other_types() {
    let client = test_client();
    let payload = serde_json::json!({"type": "block_actions", "user": {"id": "U1"}});
    let body = format!(
        "payload={}",
        urlencoding::encode(&payload.to_string())
    );
    let now = chrono::Utc::now().timestamp();
    let (ts, sig) = slack_headers(now, &sign(now, &body));
    let res = client
        .post("/api/slack/interaction")
        .header(ContentType::Form)
        .header(ts)
        .header(sig)
        .body(body)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_submission_without_client_reports_modal_error() {
    let client = test_client();
    // A well-formed submission; the test server has no Slack client, so the
    // user gets an in-modal error rather than a dropped request.
    let payload = serde_json::json!({
        "type": "view_submission",
        "user": {"id": "U123"},
        "view": {
            "callback_id": "vanish_share_secret",
            "state": {"values": {
                "recipient": {"email": {"value": "bob@example.com"}},
                "secret": {"text": {"value": "hunter2"}},
                "ttl": {"choice": {"selected_option": {"value": "3600"}}}
            }}
        }
    });
    let body = format!(
        "payload={}",
        urlencoding::encode(&payload.to_string())
    );
    let now = chrono::Utc::now().timestamp();
    let (ts, sig) = slack_headers(now, &sign(now, &body));
    let res = client
        .post("/api/slack/interaction")
        .header(ContentType::Form)
        .header(ts)
        .header(sig)
        .body(body)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let response: serde_json::Value = res.into_json().unwrap();
    assert_eq!(response["response_action"], "errors");
}
