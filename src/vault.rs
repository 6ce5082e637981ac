use crate::models::VaultMessage;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("message not found")]
    NotFound,
    #[error("vault id collision: {0}")]
    KeyCollision(String),
    #[error("vault unavailable: {0}")]
    Unavailable(String),
    #[error("payload exceeds vault capacity")]
    CapacityExceeded,
}

/// Mint an opaque message id: `msg_<32 hex chars>` (128 bits from the OS RNG).
pub fn generate_message_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("msg_{}", hex::encode(bytes))
}

struct VaultEntry {
    message: VaultMessage,
    expires_at: i64,
    size: usize,
}

struct VaultInner {
    entries: HashMap<String, VaultEntry>,
    total_bytes: usize,
}

/// Volatile ciphertext store. Everything lives in process memory under a TTL;
/// nothing survives a restart. `get_and_delete` removes the entry under the
/// same lock that reads it, so concurrent consumers of one id see exactly one
/// winner and the rest see `NotFound`.
pub struct Vault {
    inner: Mutex<VaultInner>,
    max_bytes: usize,
}

impl Vault {
    pub fn new(max_bytes: usize) -> Self {
        Vault {
            inner: Mutex::new(VaultInner {
                entries: HashMap::new(),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a ciphertext blob under a fresh id. Returns the stored message.
    pub fn store(
        &self,
        ciphertext: String,
        iv: String,
        ttl_secs: i64,
    ) -> Result<VaultMessage, VaultError> {
        let message = VaultMessage {
            id: generate_message_id(),
            ciphertext,
            iv,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.insert(message.clone(), ttl_secs)?;
        Ok(message)
    }

    fn insert(&self, message: VaultMessage, ttl_secs: i64) -> Result<(), VaultError> {
        let size = message.ciphertext.len() + message.iv.len();
        if size > self.max_bytes {
            return Err(VaultError::CapacityExceeded);
        }

        let now = chrono::Utc::now().timestamp();
        let expires_at = now + ttl_secs;
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        // An occupied slot under a 128-bit random id means the RNG or the
        // caller is broken. Fail closed; never overwrite.
        if inner.entries.contains_key(&message.id) {
            return Err(VaultError::KeyCollision(message.id));
        }

        // Reclaim expired entries first, then evict live entries nearest to
        // expiry until the new blob fits.
        if inner.total_bytes + size > self.max_bytes {
            purge_expired_locked(&mut inner, now);
        }
        while inner.total_bytes + size > self.max_bytes {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(id, _)| id.clone());
            match victim {
                Some(id) => {
                    if let Some(evicted) = inner.entries.remove(&id) {
                        inner.total_bytes -= evicted.size;
                    }
                }
                None => return Err(VaultError::CapacityExceeded),
            }
        }

        inner.total_bytes += size;
        inner.entries.insert(
            message.id.clone(),
            VaultEntry {
                message,
                expires_at,
                size,
            },
        );
        Ok(())
    }

    /// Atomically read and remove. Under N concurrent callers racing on the
    /// same id exactly one receives the blob; the rest get `NotFound`.
    pub fn get_and_delete(&self, id: &str) -> Result<VaultMessage, VaultError> {
        let now = chrono::Utc::now().timestamp();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.entries.remove(id) {
            Some(entry) => {
                inner.total_bytes -= entry.size;
                if entry.expires_at <= now {
                    // Expired but not yet swept: gone either way.
                    return Err(VaultError::NotFound);
                }
                Ok(entry.message)
            }
            None => Err(VaultError::NotFound),
        }
    }

    /// Non-destructive probe. Advisory only; the answer can go stale the
    /// moment the lock is released.
    pub fn exists(&self, id: &str) -> bool {
        let now = chrono::Utc::now().timestamp();
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .get(id)
            .map(|e| e.expires_at > now)
            .unwrap_or(false)
    }

    /// Liveness check for `/health`. A poisoned lock means a handler panicked
    /// mid-mutation; report the store as down rather than recovering silently.
    pub fn ping(&self) -> Result<(), VaultError> {
        self.inner
            .lock()
            .map(|_| ())
            .map_err(|e| VaultError::Unavailable(e.to_string()))
    }

    /// Drop entries past their TTL. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        purge_expired_locked(&mut inner, now)
    }

    /// Discard every blob. Called on shutdown.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.clear();
        inner.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn purge_expired_locked(inner: &mut VaultInner, now: i64) -> usize {
    let dead: Vec<String> = inner
        .entries
        .iter()
        .filter(|(_, e)| e.expires_at <= now)
        .map(|(id, _)| id.clone())
        .collect();
    for id in &dead {
        if let Some(entry) = inner.entries.remove(id) {
            inner.total_bytes -= entry.size;
        }
    }
    dead.len()
}
