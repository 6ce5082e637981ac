use crate::config::AppConfig;
use crate::db::{Db, DbError};
use crate::models::{MessageMetadata, VaultMessage, STATUS_PENDING};
use crate::vault::{Vault, VaultError};
use thiserror::Error;

/// Sane upper bounds on the opaque payload fields. The server never decodes
/// or inspects the bytes beyond this.
pub const MAX_CIPHERTEXT_LEN: usize = 1_400_000; // ~1 MiB after base64
pub const MAX_IV_LEN: usize = 1_024;

#[derive(Debug, Error)]
pub enum BurnError {
    #[error("ttl must be between {min} and {max} seconds")]
    InvalidTtl { min: i64, max: i64 },
    #[error("{0}")]
    InvalidInput(String),
    #[error("recipient not found")]
    RecipientNotFound,
    #[error("server-side key copies are disabled")]
    KeyCopyDisabled,
    #[error("message not found")]
    NotFound,
    #[error("access denied")]
    Forbidden,
    #[error("message already read or expired")]
    Gone,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DbError> for BurnError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound => BurnError::NotFound,
            other => BurnError::Storage(other.to_string()),
        }
    }
}

/// Write the blob to the vault, then record the metadata row. The row is the
/// authoritative presence indicator: if the metadata insert fails the blob is
/// unreferenceable and simply ages out of the vault.
pub fn create_message(
    db: &Db,
    vault: &Vault,
    config: &AppConfig,
    sender_id: &str,
    recipient_id: &str,
    ciphertext: String,
    iv: String,
    encryption_key: Option<String>,
    ttl: Option<i64>,
) -> Result<MessageMetadata, BurnError> {
    if ciphertext.is_empty() || ciphertext.len() > MAX_CIPHERTEXT_LEN {
        return Err(BurnError::InvalidInput(format!(
            "ciphertext must be 1-{} bytes",
            MAX_CIPHERTEXT_LEN
        )));
    }
    if iv.is_empty() || iv.len() > MAX_IV_LEN {
        return Err(BurnError::InvalidInput(format!(
            "iv must be 1-{} bytes",
            MAX_IV_LEN
        )));
    }
    if encryption_key.is_some() && !config.allow_server_key_copy {
        return Err(BurnError::KeyCopyDisabled);
    }

    let ttl = ttl.unwrap_or(config.default_ttl_secs);
    if ttl < config.min_ttl_secs || ttl > config.max_ttl_secs {
        return Err(BurnError::InvalidTtl {
            min: config.min_ttl_secs,
            max: config.max_ttl_secs,
        });
    }

    db.find_user_by_id(recipient_id)
        .map_err(|_| BurnError::RecipientNotFound)?;

    let message = vault
        .store(ciphertext, iv, ttl)
        .map_err(|e| BurnError::Storage(e.to_string()))?;

    let created = chrono::DateTime::parse_from_rfc3339(&message.created_at)
        .map_err(|e| BurnError::Storage(e.to_string()))?;
    let expires_at = (created + chrono::Duration::seconds(ttl)).to_rfc3339();

    let metadata = MessageMetadata {
        message_id: message.id.clone(),
        sender_id: sender_id.to_string(),
        recipient_id: recipient_id.to_string(),
        encryption_key,
        status: STATUS_PENDING.to_string(),
        created_at: message.created_at.clone(),
        read_at: None,
        expires_at,
    };
    db.create_metadata(&metadata)
        .map_err(|e| BurnError::Storage(e.to_string()))?;

    Ok(metadata)
}

/// Authorization and status are checked before the destructive vault read, so
/// a denied caller cannot burn the blob out from under the real recipient.
/// The vault's atomic get-and-delete serializes honest-recipient races:
/// exactly one caller gets the bytes.
pub fn consume_message(
    db: &Db,
    vault: &Vault,
    caller_id: &str,
    message_id: &str,
) -> Result<VaultMessage, BurnError> {
    let metadata = db.find_metadata(message_id)?;

    // Uniform denial: reveal nothing about the message beyond the status code.
    if metadata.recipient_id != caller_id {
        return Err(BurnError::Forbidden);
    }
    if metadata.status != STATUS_PENDING {
        return Err(BurnError::Gone);
    }

    let message = match vault.get_and_delete(message_id) {
        Ok(m) => m,
        // Blob expired between the metadata check and the read. The row is
        // stale now; the sweeper will flip it to EXPIRED.
        Err(VaultError::NotFound) => return Err(BurnError::NotFound),
        Err(e) => return Err(BurnError::Storage(e.to_string())),
    };

    // The burn already happened; metadata drift must not take the blob down
    // with it. Log the id only, never the payload.
    if let Err(e) = db.mark_as_read(message_id) {
        eprintln!("WARN: mark_as_read failed for {message_id} after burn: {e}");
    }

    Ok(message)
}

/// Advisory existence probe for sender-side polling. Requires no recipient
/// identity and destroys nothing.
pub fn probe_message(vault: &Vault, message_id: &str) -> bool {
    vault.exists(message_id)
}
