// Route module decomposition — each surface in its own file.
// Shared request guards and the error-body helper live here.

mod admin;
mod auth_routes;
mod messages;
mod profile;
mod slack_routes;
mod system;

// --- Re-exports (all route functions used by lib.rs mount) ---

pub use admin::{
    admin_cleanup, admin_create_user, admin_delete_user, admin_statistics, admin_update_user,
    import_users,
};
pub use auth_routes::{login, me, okta_callback, okta_login, register};
pub use messages::{consume_message, create_message, get_history, probe_message};
pub use profile::{change_password, delete_account, list_users, update_profile};
pub use slack_routes::{slack_command, slack_interaction};
pub use system::{
    bad_request, forbidden, health, internal_error, not_found, too_many_requests, unauthorized,
    unprocessable,
};

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;

/// Error responses are a status plus a uniform `{"error": "..."}` body.
pub type ApiError = (Status, Json<serde_json::Value>);

pub fn api_error(status: Status, message: &str) -> ApiError {
    (status, Json(serde_json::json!({"error": message})))
}

// --- Client IP extraction ---

pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| req.remote().map(|r| r.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

/// Light email shape check; real validation is the delivery attempt.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() >= 3
        && email.len() <= 254
        && email.contains('@')
        && !email.starts_with('@')
        && !email.ends_with('@')
        && !email.contains(char::is_whitespace)
}
