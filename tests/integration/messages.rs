use crate::common::{bearer, create_message, register, test_client};
use rocket::http::{ContentType, Status};
use std::sync::Arc;
use vanish::vault::Vault;

#[test]
fn test_happy_burn() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (bob, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");

    let (id, _expires) = create_message(&client, &alice, &bob_id, Some(3600));
    assert!(id.starts_with("msg_"));

    // Bob reads once.
    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["ciphertext"], "Q0lQSA==");
    assert_eq!(body["iv"], "SVYxMjM0NTY3ODkw");

    // Second read: burned.
    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Gone);

    // Alice's probe now reports it gone.
    let res = client
        .head(format!("/api/messages/{id}"))
        .header(bearer(&alice))
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_wrong_recipient_cannot_read_and_cannot_burn() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (bob, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");
    let (carol, _) = register(&client, "carol@example.com", "Carol", "password-3");

    let (id, _) = create_message(&client, &alice, &bob_id, Some(3600));

    // Carol is denied; so is the sender.
    for token in [&carol, &alice] {
        let res = client
            .get(format!("/api/messages/{id}"))
            .header(bearer(token))
            .dispatch();
        assert_eq!(res.status(), Status::Forbidden);
    }

    // The denials burned nothing: Bob still reads it.
    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Gone);
}

#[test]
fn test_ttl_bounds() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (_, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");

    for bad_ttl in [100, 999_999_999] {
        let res = client
            .post("/api/messages")
            .header(ContentType::JSON)
            .header(bearer(&alice))
            .body(format!(
                r#"{{"ciphertext": "Yw==", "iv": "aXY=", "recipient_id": "{bob_id}", "ttl": {bad_ttl}}}"#
            ))
            .dispatch();
        assert_eq!(res.status(), Status::BadRequest, "ttl {bad_ttl}");
    }

    // No ttl → the default window, exactly.
    let res = client
        .post("/api/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(format!(
            r#"{{"ciphertext": "Yw==", "iv": "aXY=", "recipient_id": "{bob_id}"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Created);
    let body: serde_json::Value = res.into_json().unwrap();
    let created: serde_json::Value = {
        // expires_at − created_at must equal the default TTL; created_at is
        // not in the response, so recompute from the metadata row.
        let db = client.db();
        let row = db
            .find_metadata(body["id"].as_str().unwrap())
            .expect("metadata row");
        serde_json::json!({"created_at": row.created_at, "expires_at": row.expires_at})
    };
    let created_at =
        chrono::DateTime::parse_from_rfc3339(created["created_at"].as_str().unwrap()).unwrap();
    let expires_at =
        chrono::DateTime::parse_from_rfc3339(created["expires_at"].as_str().unwrap()).unwrap();
    assert_eq!((expires_at - created_at).num_seconds(), 86_400);
}

#[test]
fn test_create_requires_auth() {
    let client = test_client();
    let res = client
        .post("/api/messages")
        .header(ContentType::JSON)
        .body(r#"{"ciphertext": "Yw==", "iv": "aXY=", "recipient_id": "someone"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_create_unknown_recipient() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let res = client
        .post("/api/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"ciphertext": "Yw==", "iv": "aXY=", "recipient_id": "no-such-user"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_create_empty_payload_rejected() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (_, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");
    for body in [
        format!(r#"{{"ciphertext": "", "iv": "aXY=", "recipient_id": "{bob_id}"}}"#),
        format!(r#"{{"ciphertext": "Yw==", "iv": "", "recipient_id": "{bob_id}"}}"#),
    ] {
        let res = client
            .post("/api/messages")
            .header(ContentType::JSON)
            .header(bearer(&alice))
            .body(body)
            .dispatch();
        assert_eq!(res.status(), Status::BadRequest);
    }
}

#[test]
fn test_bad_notify_channel_rejected() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (_, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");
    let res = client
        .post("/api/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(format!(
            r#"{{"ciphertext": "Yw==", "iv": "aXY=", "recipient_id": "{bob_id}", "notify": "pigeon"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_notify_failures_do_not_undo_create() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (bob, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");

    // Neither Slack nor email is configured in tests, so fan-out reports
    // warnings — but the message must exist regardless.
    let res = client
        .post("/api/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(format!(
            r#"{{"ciphertext": "Yw==", "iv": "aXY=", "recipient_id": "{bob_id}", "notify": "both"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Created);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["notify_errors"].as_array().unwrap().len(), 2);

    let id = body["id"].as_str().unwrap();
    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_probe_is_nondestructive() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (bob, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");
    let (id, _) = create_message(&client, &alice, &bob_id, Some(3600));

    // Any authenticated user may probe, repeatedly, without burning.
    for _ in 0..3 {
        let res = client
            .head(format!("/api/messages/{id}"))
            .header(bearer(&alice))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
    }

    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_probe_requires_session() {
    let client = test_client();
    let res = client.head("/api/messages/msg_whatever").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_unknown_message_is_not_found() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let res = client
        .get("/api/messages/msg_00000000000000000000000000000000")
        .header(bearer(&alice))
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_expired_blob_then_sweep() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (bob, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");
    let (id, _) = create_message(&client, &alice, &bob_id, Some(3600));

    // Simulate the vault TTL firing: the blob disappears, the metadata row
    // is still PENDING.
    let vault = client
        .rocket()
        .state::<Arc<Vault>>()
        .expect("vault state");
    vault.get_and_delete(&id).expect("blob present before expiry");

    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);

    // The admin sweep reconciles the orphaned row...
    crate::common::register(&client, "root@example.com", "Root", "password-9");
    client.promote_to_admin("root@example.com");
    let admin = crate::common::login(&client, "root@example.com", "password-9");
    let res = client
        .post("/api/admin/cleanup")
        .header(bearer(&admin))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["expired_count"].as_i64().unwrap() >= 1);

    // ...after which the row answers Gone.
    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Gone);
}

#[test]
fn test_overdue_metadata_expires_on_sweep() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    let (bob, bob_id) = register(&client, "bob@example.com", "Bob", "password-2");
    let (id, _) = create_message(&client, &alice, &bob_id, Some(3600));

    // Backdate the deadline, as if the hour had elapsed.
    {
        let db = client.db();
        let past = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        db.conn()
            .execute(
                &format!("UPDATE message_metadata SET expires_at = '{past}' WHERE message_id = '{id}'"),
                [],
            )
            .unwrap();
    }

    register(&client, "root@example.com", "Root", "password-9");
    client.promote_to_admin("root@example.com");
    let admin = crate::common::login(&client, "root@example.com", "password-9");
    let res = client
        .post("/api/admin/cleanup")
        .header(bearer(&admin))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["expired_count"].as_i64().unwrap() >= 1);

    let res = client
        .get(format!("/api/messages/{id}"))
        .header(bearer(&bob))
        .dispatch();
    assert_eq!(res.status(), Status::Gone);
}
