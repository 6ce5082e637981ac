use crate::auth::{self, AuthUser, MIN_PASSWORD_LEN};
use crate::config::AppConfig;
use crate::db::{Db, DbError};
use crate::models::*;
use crate::okta::{self, CsrfStateStore, OktaClient};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use std::sync::Arc;

use super::{api_error, is_valid_email, ApiError, ClientIp};

#[post("/api/auth/register", format = "json", data = "<body>")]
pub fn register(
    db: &State<Db>,
    config: &State<AppConfig>,
    rate_config: &State<RateLimitConfig>,
    rate_limiter: &State<RateLimiter>,
    ip: ClientIp,
    body: Json<RegisterRequest>,
) -> Result<Custom<Json<AuthResponse>>, ApiError> {
    if !rate_limiter.check(
        &format!("register:{}", ip.0),
        rate_config.register_max,
        rate_config.register_window_secs,
    ) {
        return Err(api_error(
            Status::TooManyRequests,
            "Rate limited: too many registrations",
        ));
    }

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

    let user = match db.create_user(&body.email, &name, &hash, false) {
        Ok(u) => u,
        Err(DbError::DuplicateEmail) => {
            return Err(api_error(Status::Conflict, "Email already registered"))
        }
        Err(_) => return Err(api_error(Status::InternalServerError, "Internal server error")),
    };

    let token = auth::issue_token(config, &user)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;

    Ok(Custom(
        Status::Created,
        Json(AuthResponse {
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

#[post("/api/auth/login", format = "json", data = "<body>")]
pub fn login(
    db: &State<Db>,
    config: &State<AppConfig>,
    rate_config: &State<RateLimitConfig>,
    rate_limiter: &State<RateLimiter>,
    ip: ClientIp,
    body: Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if !rate_limiter.check(
        &format!("login:{}", ip.0),
        rate_config.login_max,
        rate_config.login_window_secs,
    ) {
        return Err(api_error(
            Status::TooManyRequests,
            "Rate limited: too many login attempts",
        ));
    }

    if !is_valid_email(&body.email) || body.password.is_empty() {
        return Err(api_error(Status::BadRequest, "Email and password required"));
    }

    // One uniform rejection for unknown email, SSO-only account and wrong
    // password alike.
    let denied = || api_error(Status::Unauthorized, "Invalid email or password");
    let user = db.find_user_by_email(&body.email).map_err(|_| denied())?;
    if !auth::verify_password(&user.password_hash, &body.password) {
        return Err(denied());
    }

    let token = auth::issue_token(config, &user)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;

    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[get("/api/auth/me")]
pub fn me(user: AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user.0))
}

// --- OIDC bridge ---

#[get("/api/auth/okta/login")]
pub fn okta_login(
    okta_client: &State<Option<OktaClient>>,
    states: &State<Arc<CsrfStateStore>>,
) -> Result<Redirect, ApiError> {
    let Some(client) = okta_client.as_ref() else {
        return Err(api_error(Status::InternalServerError, "SSO is not configured"));
    };
    let state = states.mint();
    Ok(Redirect::to(client.authorize_url(&state)))
}

#[get("/api/auth/okta/callback?<code>&<state>&<error>")]
pub async fn okta_callback(
    db: &State<Db>,
    config: &State<AppConfig>,
    okta_client: &State<Option<OktaClient>>,
    states: &State<Arc<CsrfStateStore>>,
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Some(client) = okta_client.as_ref() else {
        return Err(api_error(Status::InternalServerError, "SSO is not configured"));
    };

    if let Some(err) = error {
        // Provider-side denial; no state to keep around.
        if let Some(s) = &state {
            states.consume(s);
        }
        return Err(api_error(
            Status::BadRequest,
            &format!("SSO login failed: {err}"),
        ));
    }

    let (Some(code), Some(state)) = (code, state) else {
        return Err(api_error(Status::BadRequest, "Missing code or state"));
    };
    if !states.consume(&state) {
        return Err(api_error(Status::BadRequest, "Invalid or expired login state"));
    }

    let claims = client.exchange_and_verify(&code).await.map_err(|e| {
        eprintln!("⚠️  OIDC callback rejected: {e}");
        api_error(Status::BadRequest, "SSO login failed")
    })?;

    let user = okta::login_or_create(db, &claims.email, claims.name.as_deref())
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;

    let token = auth::issue_token(config, &user)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;

    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}
