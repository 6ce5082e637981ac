use crate::auth::{self, AuthUser, MIN_PASSWORD_LEN};
use crate::db::{Db, DbError};
use crate::models::*;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};

use super::{api_error, is_valid_email, ApiError};

/// Directory of recipients. Public profiles only.
#[get("/api/users")]
pub fn list_users(db: &State<Db>, _caller: AuthUser) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = db
        .list_users()
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

#[put("/api/profile", format = "json", data = "<body>")]
pub fn update_profile(
    db: &State<Db>,
    caller: AuthUser,
    body: Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    if let Some(email) = &body.email
        && !is_valid_email(email)
    {
        return Err(api_error(Status::BadRequest, "Invalid email address"));
    }
    if let Some(name) = &body.name
        && (name.trim().is_empty() || name.len() > 100)
    {
        return Err(api_error(Status::BadRequest, "Name must be 1-100 characters"));
    }
    if body.email.is_none() && body.name.is_none() {
        return Err(api_error(Status::BadRequest, "No fields to update"));
    }

    let updated = match db.update_user(
        &caller.0.id,
        body.email.as_deref(),
        body.name.as_deref().map(str::trim),
        None,
        None,
    ) {
        Ok(u) => u,
        Err(DbError::DuplicateEmail) => {
            return Err(api_error(Status::Conflict, "Email already registered"))
        }
        Err(_) => return Err(api_error(Status::InternalServerError, "Internal server error")),
    };
    Ok(Json(PublicUser::from(&updated)))
}

#[post("/api/profile/password", format = "json", data = "<body>")]
pub fn change_password(
    db: &State<Db>,
    caller: AuthUser,
    body: Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // SSO-only accounts have an empty hash and fail here by construction.
    if !auth::verify_password(&caller.0.password_hash, &body.current_password) {
        return Err(api_error(Status::Unauthorized, "Current password is incorrect"));
    }
    if body.new_password.len() < MIN_PASSWORD_LEN {
        return Err(api_error(
            Status::BadRequest,
            "Password must be at least 8 characters",
        ));
    }

    let hash = auth::hash_password(&body.new_password)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;
    db.update_user(&caller.0.id, None, None, Some(&hash), None)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;

    Ok(Json(serde_json::json!({"updated": true})))
}

#[delete("/api/profile", format = "json", data = "<body>")]
pub fn delete_account(
    db: &State<Db>,
    caller: AuthUser,
    body: Json<DeleteAccountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !auth::verify_password(&caller.0.password_hash, &body.password) {
        return Err(api_error(Status::Unauthorized, "Password is incorrect"));
    }
    db.delete_user(&caller.0.id)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
