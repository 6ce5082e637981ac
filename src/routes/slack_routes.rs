use crate::burn::{self, BurnError};
use crate::config::AppConfig;
use crate::crypto;
use crate::db::Db;
use crate::notify::Notifier;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::slack::{self, SlackClient};
use crate::vault::Vault;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{post, State};
use std::sync::Arc;

use super::{api_error, ApiError};

/// The two Slack signing headers, raw. Verification happens in the handler
/// because it needs the raw body; a request without the headers fails there.
pub struct SlackHeaders {
    pub timestamp: String,
    pub signature: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SlackHeaders {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(SlackHeaders {
            timestamp: req
                .headers()
                .get_one("X-Slack-Request-Timestamp")
                .unwrap_or("")
                .to_string(),
            signature: req
                .headers()
                .get_one("X-Slack-Signature")
                .unwrap_or("")
                .to_string(),
        })
    }
}

/// Signature gate shared by both webhook endpoints. Nothing reads the body
/// before this passes.
fn verify(config: &AppConfig, headers: &SlackHeaders, raw_body: &str) -> Result<(), ApiError> {
    let denied = || api_error(Status::Unauthorized, "Invalid request signature");
    if config.slack.signing_secret.is_empty() {
        return Err(denied());
    }
    slack::verify_signature(
        &config.slack.signing_secret,
        &headers.timestamp,
        &headers.signature,
        raw_body,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|_| denied())
}

/// `/vanish` slash command: opens the share-a-secret modal. Plain-text
/// responses surface to the invoking user as ephemeral messages.
#[post("/api/slack/command", data = "<body>")]
pub async fn slack_command(
    config: &State<AppConfig>,
    notifier: &State<Notifier>,
    rate_config: &State<RateLimitConfig>,
    rate_limiter: &State<RateLimiter>,
    headers: SlackHeaders,
    body: String,
) -> Result<String, ApiError> {
    verify(config, &headers, &body)?;

    let command = slack::parse_slash_command(&body);
    if !rate_limiter.check(
        &format!("slack:{}", command.user_id),
        rate_config.slack_max,
        rate_config.slack_window_secs,
    ) {
        return Err(api_error(Status::TooManyRequests, "Too many requests"));
    }
    if command.trigger_id.is_empty() {
        return Err(api_error(Status::BadRequest, "Missing trigger_id"));
    }

    let Some(client) = notifier.slack() else {
        return Ok("Slack integration is not configured on this server.".to_string());
    };
    match client
        .open_modal(&command.trigger_id, slack::share_secret_modal())
        .await
    {
        Ok(()) => Ok(String::new()),
        Err(e) => {
            eprintln!("⚠️  Slack modal open failed: {e}");
            Ok("Could not open the share dialog. Try again in a moment.".to_string())
        }
    }
}

/// Modal submissions land here. On submit the server performs the assisted
/// encryption and runs the standard create protocol; the plaintext exists
/// only inside this request and is never logged.
#[post("/api/slack/interaction", data = "<body>")]
pub async fn slack_interaction(
    db: &State<Db>,
    vault: &State<Arc<Vault>>,
    config: &State<AppConfig>,
    notifier: &State<Notifier>,
    headers: SlackHeaders,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    verify(config, &headers, &body)?;

    let form = slack::parse_form(&body);
    let payload = form
        .get("payload")
        .ok_or_else(|| api_error(Status::BadRequest, "Missing payload"))?;
    let payload: serde_json::Value = serde_json::from_str(payload)
        .map_err(|_| api_error(Status::BadRequest, "Malformed payload"))?;

    // Only the share modal's submission does work; other interaction types
    // are acknowledged and dropped.
    if payload["type"].as_str() != Some("view_submission")
        || payload["view"]["callback_id"].as_str() != Some(slack::MODAL_CALLBACK_ID)
    {
        return Ok(Json(serde_json::json!({})));
    }

    let submission = slack::parse_modal_submission(&payload)
        .map_err(|_| api_error(Status::BadRequest, "Malformed payload"))?;

    let Some(client) = notifier.slack() else {
        return Ok(modal_error(
            "recipient",
            "Slack integration is not configured on this server.",
        ));
    };

    handle_submission(db, vault, config, client, submission).await
}

async fn handle_submission(
    db: &Db,
    vault: &Vault,
    config: &AppConfig,
    client: &SlackClient,
    submission: crate::models::ModalSubmission,
) -> Result<Json<serde_json::Value>, ApiError> {
    // The submitting Slack account must map onto a local user by email.
    let sender_email = match client.user_email(&submission.slack_user_id).await {
        Ok(email) => email,
        Err(e) => {
            eprintln!("⚠️  Slack profile lookup failed: {e}");
            return Ok(modal_error(
                "recipient",
                "Could not read your Slack profile email.",
            ));
        }
    };
    let Ok(sender) = db.find_user_by_email(&sender_email) else {
        return Ok(modal_error(
            "recipient",
            "Your Slack email has no Vanish account.",
        ));
    };

    let Ok(recipient) = db.find_user_by_email(&submission.recipient_email) else {
        return Ok(modal_error(
            "recipient",
            "No Vanish account for that email.",
        ));
    };

    if submission.secret_text.is_empty() || submission.secret_text.len() > 10_000 {
        return Ok(modal_error("secret", "Secret must be 1-10000 characters."));
    }

    // Assisted encryption: fresh key and IV, AES-256-GCM, key persisted with
    // the metadata so the recipient's history link can carry it.
    let sealed = crypto::seal(&submission.secret_text)
        .map_err(|_| api_error(Status::InternalServerError, "Internal server error"))?;

    let metadata = match burn::create_message(
        db,
        vault,
        config,
        &sender.id,
        &recipient.id,
        sealed.ciphertext,
        sealed.iv,
        Some(sealed.key.clone()),
        Some(submission.ttl_secs),
    ) {
        Ok(m) => m,
        Err(BurnError::KeyCopyDisabled) => {
            return Ok(modal_error(
                "secret",
                "Assisted sharing is disabled on this server.",
            ));
        }
        Err(BurnError::InvalidTtl { .. }) => {
            return Ok(modal_error("ttl", "Pick one of the offered expiries."));
        }
        Err(e) => {
            eprintln!("⚠️  Assisted create failed: {e}");
            return Err(api_error(Status::InternalServerError, "Internal server error"));
        }
    };

    let url = config.share_url(&metadata.message_id, Some(&sealed.key));
    if let Err(e) = client
        .notify_recipient(&recipient.email, &sender.display_name, &url)
        .await
    {
        // The message is already live; the DM is best-effort. Closing the
        // modal with an error here would invite a duplicate send.
        eprintln!("⚠️  Slack DM for {} failed: {e}", metadata.message_id);
    }

    Ok(Json(serde_json::json!({"response_action": "clear"})))
}

fn modal_error(block: &str, message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "response_action": "errors",
        "errors": {block: message}
    }))
}
