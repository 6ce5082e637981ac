use crate::auth::{self, AdminUser, MIN_PASSWORD_LEN};
use crate::db::{Db, DbError};
use crate::models::*;
use crate::okta::CsrfStateStore;
use crate::sweeper;
use crate::vault::Vault;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use std::sync::Arc;

use super::{api_error, is_valid_email, ApiError};

#[post("/api/admin/users", format = "json", data = "<body>")]
pub fn admin_create_user(
    db: &State<Db>,
    _admin: AdminUser,
    body: Json<AdminCreateUserRequest>,
) -> Result<Custom<Json<PublicUser>>, ApiError> {
    let name = body.name.trim().to_string();
    if !is_valid_email(&body.email) {
        return Err(api_error(Status::BadRequest, "Invalid email address"));
    }
    if name.is_empty() || name.len() > 100 {
        return Err(api_error(Status::BadRequest, "Name must be 1-100 characters"));
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(api_error(
            Status::BadRequest,
            "Password must be at least 8 characters",
        ));
    }

    let hash = auth::hash_password(&body.password)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;
    let user = match db.create_user(&body.email, &name, &hash, body.is_admin) {
        Ok(u) => u,
        Err(DbError::DuplicateEmail) => {
            return Err(api_error(Status::Conflict, "Email already registered"))
        }
        Err(_) => return Err(api_error(Status::InternalServerError, "Internal server error")),
    };
    Ok(Custom(Status::Created, Json(PublicUser::from(&user))))
}

#[put("/api/admin/users/<user_id>", format = "json", data = "<body>")]
pub fn admin_update_user(
    db: &State<Db>,
    _admin: AdminUser,
    user_id: &str,
    body: Json<AdminUpdateUserRequest>,
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
    if let Some(password) = &body.password
        && password.len() < MIN_PASSWORD_LEN
    {
        return Err(api_error(
            Status::BadRequest,
            "Password must be at least 8 characters",
        ));
    }

    let hash = match &body.password {
        Some(password) => Some(
            auth::hash_password(password)
                .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?,
        ),
        None => None,
    };

    let updated = match db.update_user(
        user_id,
        body.email.as_deref(),
        body.name.as_deref().map(str::trim),
        hash.as_deref(),
        body.is_admin,
    ) {
        Ok(u) => u,
        Err(DbError::NotFound) => return Err(api_error(Status::NotFound, "User not found")),
        Err(DbError::DuplicateEmail) => {
            return Err(api_error(Status::Conflict, "Email already registered"))
        }
        Err(_) => return Err(api_error(Status::InternalServerError, "Internal server error")),
    };
    Ok(Json(PublicUser::from(&updated)))
}

#[delete("/api/admin/users/<user_id>")]
pub fn admin_delete_user(
    db: &State<Db>,
    admin: AdminUser,
    user_id: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    if admin.0.id == user_id {
        return Err(api_error(Status::BadRequest, "Admins cannot delete themselves"));
    }
    match db.delete_user(user_id) {
        Ok(()) => Ok(Json(serde_json::json!({"deleted": true}))),
        Err(DbError::NotFound) => Err(api_error(Status::NotFound, "User not found")),
        Err(_) => Err(api_error(Status::InternalServerError, "Internal server error")),
    }
}

/// Bulk import. Header `email,name,password[,is_admin]`; every row is
/// attempted independently and reported individually.
#[post("/api/admin/users/import", format = "json", data = "<body>")]
pub fn import_users(
    db: &State<Db>,
    _admin: AdminUser,
    body: Json<ImportUsersRequest>,
) -> Result<Json<ImportUsersResponse>, ApiError> {
    let mut lines = body.csv.lines().enumerate();

    let header = lines
        .next()
        .map(|(_, l)| l.trim().to_lowercase())
        .unwrap_or_default();
    let with_admin = match header.as_str() {
        "email,name,password" => false,
        "email,name,password,is_admin" => true,
        _ => {
            return Err(api_error(
                Status::BadRequest,
                "CSV header must be email,name,password[,is_admin]",
            ))
        }
    };

    let mut response = ImportUsersResponse {
        created: 0,
        failed: 0,
        errors: Vec::new(),
    };

    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        match import_row(db, line, with_admin) {
            Ok(()) => response.created += 1,
            Err(error) => {
                response.failed += 1;
                response.errors.push(ImportRowError {
                    line: line_no,
                    error,
                });
            }
        }
    }

    Ok(Json(response))
}

fn import_row(db: &Db, line: &str, with_admin: bool) -> Result<(), String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let expected = if with_admin { 4 } else { 3 };
    if fields.len() != expected {
        return Err(format!("expected {expected} fields, got {}", fields.len()));
    }

    let (email, name, password) = (fields[0], fields[1], fields[2]);
    let is_admin = with_admin && matches!(fields[3].to_lowercase().as_str(), "true" | "1" | "yes");

    if !is_valid_email(email) {
        return Err("invalid email".to_string());
    }
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err("password must be at least 8 characters".to_string());
    }

    let hash = auth::hash_password(password).map_err(|e| e.to_string())?;
    match db.create_user(email, name, &hash, is_admin) {
        Ok(_) => Ok(()),
        Err(DbError::DuplicateEmail) => Err("email already registered".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[get("/api/admin/statistics")]
pub fn admin_statistics(db: &State<Db>, _admin: AdminUser) -> Result<Json<Statistics>, ApiError> {
    let (total_users, admin_users) = db
        .user_counts()
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;
    let (pending, read, expired) = db
        .message_status_counts()
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;
    Ok(Json(Statistics {
        total_users,
        admin_users,
        regular_users: total_users - admin_users,
        pending_messages: pending,
        read_messages: read,
        expired_messages: expired,
    }))
}

#[post("/api/admin/cleanup")]
pub fn admin_cleanup(
    db: &State<Db>,
    vault: &State<Arc<Vault>>,
    states: &State<Arc<CsrfStateStore>>,
    _admin: AdminUser,
) -> Json<CleanupResponse> {
    let result = sweeper::run_sweep(db, vault, states);
    Json(CleanupResponse {
        expired_count: result.expired_count(),
    })
}
