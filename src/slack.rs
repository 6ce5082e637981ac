use crate::models::{ModalSubmission, SlashCommand};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew for webhook timestamps (replay window).
pub const REPLAY_WINDOW_SECS: i64 = 300;

const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("missing signature headers")]
    MissingHeaders,
    #[error("stale webhook timestamp")]
    StaleTimestamp,
    #[error("bad webhook signature")]
    BadSignature,
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("slack api error: {0}")]
    Api(String),
    #[error("slack request failed: {0}")]
    Http(#[from] reqwest::Error),
}

// --- Inbound: request signing ---

/// Verify a Slack webhook signature: HMAC-SHA256 over `v0:{ts}:{raw_body}`
/// under the shared signing secret, compared in constant time. The timestamp
/// must be within the replay window. Callers must not parse the body until
/// this has passed.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    raw_body: &str,
    now: i64,
) -> Result<(), SlackError> {
    if timestamp.is_empty() || signature.is_empty() {
        return Err(SlackError::MissingHeaders);
    }
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SlackError::StaleTimestamp)?;
    if (now - ts).abs() > REPLAY_WINDOW_SECS {
        return Err(SlackError::StaleTimestamp);
    }

    let presented = signature
        .strip_prefix("v0=")
        .ok_or(SlackError::BadSignature)?;
    let presented = hex::decode(presented).map_err(|_| SlackError::BadSignature)?;

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SlackError::BadSignature)?;
    mac.update(format!("v0:{}:{}", ts, raw_body).as_bytes());
    mac.verify_slice(&presented)
        .map_err(|_| SlackError::BadSignature)
}

/// Compute the `v0=` signature for a body. Test helper and documentation of
/// the exact signing base string.
pub fn sign_body(signing_secret: &str, timestamp: i64, raw_body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(format!("v0:{}:{}", timestamp, raw_body).as_bytes());
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

// --- Inbound: body parsing (post-verification) ---

/// Decode an `application/x-www-form-urlencoded` body.
pub fn parse_form(raw_body: &str) -> HashMap<String, String> {
    raw_body
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|c| c.into_owned())
                    .ok()
            };
            Some((decode(k)?, decode(v)?))
        })
        .collect()
}

pub fn parse_slash_command(raw_body: &str) -> SlashCommand {
    let mut form = parse_form(raw_body);
    let mut take = |key: &str| form.remove(key).unwrap_or_default();
    SlashCommand {
        trigger_id: take("trigger_id"),
        user_id: take("user_id"),
        command: take("command"),
        text: take("text"),
    }
}

// --- Modal ---

pub const MODAL_CALLBACK_ID: &str = "vanish_share_secret";

/// The share-a-secret dialog: recipient email, secret text, TTL choice.
pub fn share_secret_modal() -> serde_json::Value {
    serde_json::json!({
        "type": "modal",
        "callback_id": MODAL_CALLBACK_ID,
        "title": {"type": "plain_text", "text": "Share a secret"},
        "submit": {"type": "plain_text", "text": "Send"},
        "close": {"type": "plain_text", "text": "Cancel"},
        "blocks": [
            {
                "type": "input",
                "block_id": "recipient",
                "label": {"type": "plain_text", "text": "Recipient email"},
                "element": {"type": "plain_text_input", "action_id": "email"}
            },
            {
                "type": "input",
                "block_id": "secret",
                "label": {"type": "plain_text", "text": "Secret"},
                "element": {"type": "plain_text_input", "action_id": "text", "multiline": true}
            },
            {
                "type": "input",
                "block_id": "ttl",
                "label": {"type": "plain_text", "text": "Expires after"},
                "element": {
                    "type": "static_select",
                    "action_id": "choice",
                    "initial_option": {
                        "text": {"type": "plain_text", "text": "1 day"},
                        "value": "86400"
                    },
                    "options": [
                        {"text": {"type": "plain_text", "text": "1 hour"}, "value": "3600"},
                        {"text": {"type": "plain_text", "text": "1 day"}, "value": "86400"},
                        {"text": {"type": "plain_text", "text": "1 week"}, "value": "604800"}
                    ]
                }
            }
        ]
    })
}

/// Pull the submitted fields out of a `view_submission` interaction payload.
pub fn parse_modal_submission(payload: &serde_json::Value) -> Result<ModalSubmission, SlackError> {
    let slack_user_id = payload["user"]["id"]
        .as_str()
        .ok_or_else(|| SlackError::Malformed("missing user.id".to_string()))?;
    let values = &payload["view"]["state"]["values"];

    let recipient_email = values["recipient"]["email"]["value"]
        .as_str()
        .ok_or_else(|| SlackError::Malformed("missing recipient email".to_string()))?;
    let secret_text = values["secret"]["text"]["value"]
        .as_str()
        .ok_or_else(|| SlackError::Malformed("missing secret text".to_string()))?;
    let ttl_secs: i64 = values["ttl"]["choice"]["selected_option"]["value"]
        .as_str()
        .unwrap_or("86400")
        .parse()
        .map_err(|_| SlackError::Malformed("bad ttl option".to_string()))?;

    Ok(ModalSubmission {
        slack_user_id: slack_user_id.to_string(),
        recipient_email: recipient_email.to_string(),
        secret_text: secret_text.to_string(),
        ttl_secs,
    })
}

// --- Outbound: Web API client ---

pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(bot_token: &str) -> Self {
        SlackClient {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: SLACK_API_BASE.to_string(),
            bot_token: bot_token.to_string(),
        }
    }

    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, SlackError> {
        let resp: serde_json::Value = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if resp["ok"].as_bool() != Some(true) {
            let err = resp["error"].as_str().unwrap_or("unknown").to_string();
            return Err(SlackError::Api(format!("{method}: {err}")));
        }
        Ok(resp)
    }

    /// Email of the Slack account behind a user id (`users.info`).
    pub async fn user_email(&self, slack_user_id: &str) -> Result<String, SlackError> {
        let resp = self
            .call("users.info", serde_json::json!({"user": slack_user_id}))
            .await?;
        resp["user"]["profile"]["email"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Api("users.info: no email on profile".to_string()))
    }

    /// Slack user id for an email (`users.lookupByEmail`).
    pub async fn user_id_by_email(&self, email: &str) -> Result<String, SlackError> {
        let resp = self
            .call("users.lookupByEmail", serde_json::json!({"email": email}))
            .await?;
        resp["user"]["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Api("users.lookupByEmail: no user id".to_string()))
    }

    /// Open (or fetch) the direct-message channel with a user.
    pub async fn open_dm(&self, slack_user_id: &str) -> Result<String, SlackError> {
        let resp = self
            .call(
                "conversations.open",
                serde_json::json!({"users": slack_user_id}),
            )
            .await?;
        resp["channel"]["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| SlackError::Api("conversations.open: no channel id".to_string()))
    }

    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        self.call(
            "chat.postMessage",
            serde_json::json!({"channel": channel, "text": text}),
        )
        .await
        .map(|_| ())
    }

    pub async fn open_modal(
        &self,
        trigger_id: &str,
        view: serde_json::Value,
    ) -> Result<(), SlackError> {
        self.call(
            "views.open",
            serde_json::json!({"trigger_id": trigger_id, "view": view}),
        )
        .await
        .map(|_| ())
    }

    /// DM the shareable link to a recipient, looked up by email. The text
    /// carries only the URL the caller built, never ciphertext or keys.
    pub async fn notify_recipient(
        &self,
        recipient_email: &str,
        sender_name: &str,
        share_url: &str,
    ) -> Result<(), SlackError> {
        let slack_user = self.user_id_by_email(recipient_email).await?;
        let channel = self.open_dm(&slack_user).await?;
        let text = format!(
            "🔥 {sender_name} sent you a secret. It burns after one read: {share_url}"
        );
        self.post_message(&channel, &text).await
    }
}
