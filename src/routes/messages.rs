use crate::auth::AuthUser;
use crate::burn::{self, BurnError};
use crate::config::AppConfig;
use crate::db::Db;
use crate::models::*;
use crate::notify::{Notifier, NotifyChannels};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::vault::Vault;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, head, post, State};
use std::sync::Arc;

use super::{api_error, ApiError};

fn burn_error(e: BurnError) -> ApiError {
    match e {
        BurnError::InvalidTtl { .. }
        | BurnError::InvalidInput(_)
        | BurnError::RecipientNotFound
        | BurnError::KeyCopyDisabled => api_error(Status::BadRequest, &e.to_string()),
        BurnError::NotFound => api_error(Status::NotFound, "Message not found"),
        BurnError::Forbidden => api_error(Status::Forbidden, "Access denied"),
        BurnError::Gone => api_error(Status::Gone, "Message already read or expired"),
        BurnError::Storage(detail) => {
            eprintln!("⚠️  Burn protocol storage error: {detail}");
            api_error(Status::InternalServerError, "Internal server error")
        }
    }
}

#[post("/api/messages", format = "json", data = "<body>")]
pub async fn create_message(
    db: &State<Db>,
    vault: &State<Arc<Vault>>,
    config: &State<AppConfig>,
    notifier: &State<Notifier>,
    rate_config: &State<RateLimitConfig>,
    rate_limiter: &State<RateLimiter>,
    sender: AuthUser,
    body: Json<CreateMessageRequest>,
) -> Result<Custom<Json<CreateMessageResponse>>, ApiError> {
    if !rate_limiter.check(
        &format!("messages:{}", sender.0.id),
        rate_config.messages_max,
        rate_config.messages_window_secs,
    ) {
        return Err(api_error(
            Status::TooManyRequests,
            "Rate limited: too many messages",
        ));
    }

    let channels = NotifyChannels::parse(body.notify.as_deref())
        .map_err(|e| api_error(Status::BadRequest, &e.to_string()))?;

    let request = body.into_inner();
    let metadata = burn::create_message(
        db,
        vault,
        config,
        &sender.0.id,
        &request.recipient_id,
        request.ciphertext,
        request.iv,
        request.encryption_key,
        request.ttl,
    )
    .map_err(burn_error)?;

    // Side-effect fan-out. Failures come back as warnings; the message is
    // already live and stays live.
    let notify_errors = if channels != NotifyChannels::NONE {
        match db.find_user_by_id(&metadata.recipient_id) {
            Ok(recipient) => {
                let url = config.share_url(&metadata.message_id, metadata.encryption_key.as_deref());
                let warnings = notifier
                    .notify(channels, &recipient, &sender.0.display_name, &url)
                    .await;
                for w in &warnings {
                    eprintln!("⚠️  Notify {}: {w}", metadata.message_id);
                }
                (!warnings.is_empty()).then_some(warnings)
            }
            Err(_) => Some(vec!["recipient vanished before notification".to_string()]),
        }
    } else {
        None
    };

    Ok(Custom(
        Status::Created,
        Json(CreateMessageResponse {
            id: metadata.message_id,
            expires_at: metadata.expires_at,
            notify_errors,
        }),
    ))
}

#[get("/api/messages/<id>")]
pub fn consume_message(
    db: &State<Db>,
    vault: &State<Arc<Vault>>,
    caller: AuthUser,
    id: &str,
) -> Result<Json<ConsumeMessageResponse>, ApiError> {
    let message = burn::consume_message(db, vault, &caller.0.id, id).map_err(burn_error)?;
    Ok(Json(ConsumeMessageResponse {
        ciphertext: message.ciphertext,
        iv: message.iv,
    }))
}

/// Sender-side polling probe. Requires a session but not recipient identity,
/// and never consumes the blob. Rocket would otherwise satisfy HEAD by
/// running the GET route, which burns the message, so this must stay an
/// explicit HEAD handler.
#[head("/api/messages/<id>")]
pub fn probe_message(vault: &State<Arc<Vault>>, _caller: AuthUser, id: &str) -> Status {
    if burn::probe_message(vault, id) {
        Status::Ok
    } else {
        Status::NotFound
    }
}

#[get("/api/history?<limit>")]
pub fn get_history(
    db: &State<Db>,
    caller: AuthUser,
    limit: Option<i64>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let limit = limit.unwrap_or(50).clamp(1, 500);
    db.get_user_history(&caller.0.id, limit)
        .map(Json)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))
}
