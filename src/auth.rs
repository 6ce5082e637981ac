use crate::config::AppConfig;
use crate::db::Db;
use crate::models::User;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("malformed or unsigned token")]
    MalformedToken,
    #[error("token expired")]
    Expired,
    #[error("hashing failed: {0}")]
    Hash(String),
}

// --- Password hashing ---

/// Salted adaptive hash. Two calls with the same password produce different
/// encodings because the salt is drawn fresh from the OS RNG.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Constant-time verify. An empty stored hash (SSO-only account) never
/// matches any presented password.
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Random password for the bootstrap admin account.
pub fn generate_random_password(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// --- Session tokens ---

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, AuthError> {
    let now = chrono::Utc::now();
    let claims = SessionClaims {
        sub: user.id.clone(),
        email: user.email.clone(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(config.session_lifetime_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.session_secret.as_bytes()),
    )
    .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_token(secret: &str, token: &str) -> Result<SessionClaims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::MalformedToken,
    })
}

// --- Request guards ---

/// Authenticated caller. The session token names the user; the record is
/// re-read from the database so deletions and admin-flag changes take effect
/// without waiting for the token to expire.
pub struct AuthUser(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<AppConfig>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        let Some(db) = req.rocket().state::<Db>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };

        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "));
        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let Ok(claims) = verify_token(&config.session_secret, token) else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        match db.find_user_by_id(&claims.sub) {
            Ok(user) => Outcome::Success(AuthUser(user)),
            Err(_) => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Authenticated caller with the admin flag set.
pub struct AdminUser(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthUser::from_request(req).await {
            Outcome::Success(AuthUser(user)) if user.is_admin => {
                Outcome::Success(AdminUser(user))
            }
            Outcome::Success(_) => Outcome::Error((Status::Forbidden, ())),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}
