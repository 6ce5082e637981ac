use crate::common::{bearer, login, register, test_client};
use rocket::http::{ContentType, Status};

#[test]
fn test_list_users_directory() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    register(&client, "bob@example.com", "Bob", "password-2");

    let res = client.get("/api/users").header(bearer(&alice)).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let users: Vec<serde_json::Value> = res.into_json().unwrap();
    // Alice, Bob, and the bootstrap admin.
    assert_eq!(users.len(), 3);
    assert!(users.iter().any(|u| u["email"] == "bob@example.com"));
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[test]
fn test_list_users_requires_auth() {
    let client = test_client();
    let res = client.get("/api/users").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_update_profile() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");

    let res = client
        .put("/api/profile")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"name": "Alice Cooper", "email": "acooper@example.com"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["display_name"], "Alice Cooper");
    assert_eq!(body["email"], "acooper@example.com");

    // The session token still names the same user id.
    let res = client.get("/api/auth/me").header(bearer(&alice)).dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["email"], "acooper@example.com");
}

#[test]
fn test_update_profile_email_conflict() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    register(&client, "bob@example.com", "Bob", "password-2");

    let res = client
        .put("/api/profile")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"email": "Bob@Example.com"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
}

#[test]
fn test_update_profile_validation() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");
    for body in [
        r#"{"email": "not-an-email"}"#,
        r#"{"name": ""}"#,
        r#"{}"#,
    ] {
        let res = client
            .put("/api/profile")
            .header(ContentType::JSON)
            .header(bearer(&alice))
            .body(body)
            .dispatch();
        assert_eq!(res.status(), Status::BadRequest, "{body}");
    }
}

#[test]
fn test_change_password() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "old-password");

    // Wrong current password.
    let res = client
        .post("/api/profile/password")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"current_password": "guessing", "new_password": "new-password"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);

    // New password too short.
    let res = client
        .post("/api/profile/password")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"current_password": "old-password", "new_password": "tiny"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);

    // Success; old credential stops working, new one works.
    let res = client
        .post("/api/profile/password")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"current_password": "old-password", "new_password": "new-password"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "alice@example.com", "password": "old-password"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
    login(&client, "alice@example.com", "new-password");
}

#[test]
fn test_delete_account_requires_password() {
    let client = test_client();
    let (alice, _) = register(&client, "alice@example.com", "Alice", "password-1");

    let res = client
        .delete("/api/profile")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"password": "not-it"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);

    let res = client
        .delete("/api/profile")
        .header(ContentType::JSON)
        .header(bearer(&alice))
        .body(r#"{"password": "password-1"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "alice@example.com", "password": "password-1"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}
