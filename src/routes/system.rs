use crate::vault::Vault;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

use super::{api_error, ApiError};

#[get("/health")]
pub fn health(vault: &State<Arc<Vault>>) -> Result<Json<serde_json::Value>, ApiError> {
    vault
        .ping()
        .map_err(|_| api_error(Status::ServiceUnavailable, "Message store unavailable"))?;
    Ok(Json(serde_json::json!({"status": "healthy"})))
}

// --- Catchers ---
// Every error path answers with the same `{"error": ...}` shape and no
// detail beyond the status itself. Panics land in the 500 catcher.

#[rocket::catch(400)]
pub fn bad_request() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Invalid request"}))
}

#[rocket::catch(401)]
pub fn unauthorized() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Authentication required"}))
}

#[rocket::catch(403)]
pub fn forbidden() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Access denied"}))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found"}))
}

/// Rocket answers 422 for JSON bodies that fail to deserialize; the API
/// contract calls that a 400.
#[rocket::catch(422)]
pub fn unprocessable() -> Custom<Json<serde_json::Value>> {
    Custom(
        Status::BadRequest,
        Json(serde_json::json!({"error": "Invalid request body"})),
    )
}

#[rocket::catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Too many requests"}))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Internal server error"}))
}
