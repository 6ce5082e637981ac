use serde::{Deserialize, Serialize};

// --- Users ---

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    /// Empty for SSO-only accounts. Never serialized.
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// The user shape every API response uses. No hash, no internals.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: String,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        PublicUser {
            id: u.id.clone(),
            email: u.email.clone(),
            display_name: u.display_name.clone(),
            is_admin: u.is_admin,
            created_at: u.created_at.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

// --- Admin ---

#[derive(Debug, Deserialize)]
pub struct AdminCreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// CSV import payload. Rows use the header `email,name,password[,is_admin]`.
#[derive(Debug, Deserialize)]
pub struct ImportUsersRequest {
    pub csv: String,
}

#[derive(Debug, Serialize)]
pub struct ImportUsersResponse {
    pub created: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
}

#[derive(Debug, Serialize)]
pub struct ImportRowError {
    pub line: usize,
    pub error: String,
}

// --- Messages ---

/// The volatile payload. Lives only in the vault, under a TTL, never mutated.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VaultMessage {
    pub id: String,
    pub ciphertext: String,
    pub iv: String,
    pub created_at: String,
}

/// Metadata status lifecycle: PENDING → READ | EXPIRED. Terminal states stay.
pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_READ: &str = "READ";
pub const STATUS_EXPIRED: &str = "EXPIRED";

#[derive(Debug, Clone)]
pub struct MessageMetadata {
    pub message_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    /// Server-side key copy; present only for assisted or opt-in creates.
    pub encryption_key: Option<String>,
    pub status: String,
    pub created_at: String,
    pub read_at: Option<String>,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub ciphertext: String,
    pub iv: String,
    pub recipient_id: String,
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub ttl: Option<i64>,
    /// Side-effect fan-out after a successful create: "slack", "email", "both".
    #[serde(default)]
    pub notify: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateMessageResponse {
    pub id: String,
    pub expires_at: String,
    /// Per-channel notification failures. The create itself stands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_errors: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ConsumeMessageResponse {
    pub ciphertext: String,
    pub iv: String,
}

/// One row of `/api/history`. `encryption_key` is populated only when the
/// caller is the recipient and the message is still PENDING; every other
/// combination serializes without the field.
#[derive(Debug, Serialize, Clone)]
pub struct HistoryEntry {
    pub message_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub recipient_id: String,
    pub recipient_name: String,
    pub status: String,
    pub is_sender: bool,
    pub is_recipient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
    pub expires_at: String,
}

// --- Statistics ---

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_users: i64,
    pub admin_users: i64,
    pub regular_users: i64,
    pub pending_messages: i64,
    pub read_messages: i64,
    pub expired_messages: i64,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub expired_count: i64,
}

// --- Slack ---

/// Parsed slash-command form body (after signature verification).
#[derive(Debug, Default, Clone)]
pub struct SlashCommand {
    pub trigger_id: String,
    pub user_id: String,
    pub command: String,
    pub text: String,
}

/// The fields a modal submission carries back.
#[derive(Debug, Clone)]
pub struct ModalSubmission {
    pub slack_user_id: String,
    pub recipient_email: String,
    pub secret_text: String,
    pub ttl_secs: i64,
}
