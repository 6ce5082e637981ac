use crate::common::test_client;
use rocket::http::Status;

#[test]
fn test_health() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "healthy");
}

#[test]
fn test_security_headers_on_every_response() {
    let client = test_client();
    for path in ["/health", "/no/such/route", "/api/auth/me"] {
        let res = client.get(path).dispatch();
        let headers = res.headers();
        assert_eq!(headers.get_one("X-Content-Type-Options"), Some("nosniff"), "{path}");
        assert_eq!(headers.get_one("X-Frame-Options"), Some("DENY"), "{path}");
        assert_eq!(headers.get_one("X-XSS-Protection"), Some("1; mode=block"), "{path}");
        assert_eq!(
            headers.get_one("Strict-Transport-Security"),
            Some("max-age=31536000; includeSubDomains"),
            "{path}"
        );
        assert_eq!(
            headers.get_one("Content-Security-Policy"),
            Some("default-src 'self'"),
            "{path}"
        );
        assert_eq!(headers.get_one("Referrer-Policy"), Some("no-referrer"), "{path}");
    }
}

#[test]
fn test_not_found_error_shape() {
    let client = test_client();
    let res = client.get("/no/such/route").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["error"].is_string());
}

#[test]
fn test_malformed_json_body_is_bad_request() {
    let client = test_client();
    let res = client
        .post("/api/auth/register")
        .header(rocket::http::ContentType::JSON)
        .body("{not json")
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
