use crate::models::{
    HistoryEntry, MessageMetadata, User, STATUS_EXPIRED, STATUS_PENDING, STATUS_READ,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("duplicate message id")]
    DuplicateMessageId,
    #[error("not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                password_hash TEXT NOT NULL DEFAULT '',
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS message_metadata (
                message_id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                encryption_key TEXT,
                status TEXT NOT NULL DEFAULT 'PENDING',
                created_at TEXT NOT NULL,
                read_at TEXT,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_metadata_sender ON message_metadata(sender_id);
            CREATE INDEX IF NOT EXISTS idx_metadata_recipient ON message_metadata(recipient_id);
            CREATE INDEX IF NOT EXISTS idx_metadata_status_expires ON message_metadata(status, expires_at);",
        )
        .expect("Failed to run migrations");
    }

    // --- Users ---

    /// Insert a user. Email is lower-cased at this boundary so the UNIQUE
    /// constraint also enforces case-insensitive uniqueness.
    pub fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let email = email.trim().to_lowercase();
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn();
        match conn.execute(
            "INSERT INTO users (id, email, display_name, password_hash, is_admin, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![&id, &email, display_name, password_hash, is_admin as i32, &now, &now],
        ) {
            Ok(_) => Ok(User {
                id,
                email,
                display_name: display_name.to_string(),
                password_hash: password_hash.to_string(),
                is_admin,
                created_at: now.clone(),
                updated_at: now,
            }),
            Err(e) if e.to_string().contains("UNIQUE") => Err(DbError::DuplicateEmail),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<User, DbError> {
        let email = email.trim().to_lowercase();
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, display_name, password_hash, is_admin, created_at, updated_at
             FROM users WHERE email = ?1",
            params![&email],
            row_to_user,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<User, DbError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, display_name, password_hash, is_admin, created_at, updated_at
             FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, email, display_name, password_hash, is_admin, created_at, updated_at
             FROM users ORDER BY email",
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(users)
    }

    /// Partial update. Fields left `None` are untouched. Email is lower-cased.
    pub fn update_user(
        &self,
        id: &str,
        email: Option<&str>,
        display_name: Option<&str>,
        password_hash: Option<&str>,
        is_admin: Option<bool>,
    ) -> Result<User, DbError> {
        let mut updates: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let mut idx = 1;

        if let Some(email) = email {
            updates.push(format!("email = ?{idx}"));
            values.push(Box::new(email.trim().to_lowercase()));
            idx += 1;
        }
        if let Some(name) = display_name {
            updates.push(format!("display_name = ?{idx}"));
            values.push(Box::new(name.to_string()));
            idx += 1;
        }
        if let Some(hash) = password_hash {
            updates.push(format!("password_hash = ?{idx}"));
            values.push(Box::new(hash.to_string()));
            idx += 1;
        }
        if let Some(admin) = is_admin {
            updates.push(format!("is_admin = ?{idx}"));
            values.push(Box::new(admin as i32));
            idx += 1;
        }

        if !updates.is_empty() {
            updates.push(format!("updated_at = ?{idx}"));
            values.push(Box::new(chrono::Utc::now().to_rfc3339()));
            idx += 1;

            let sql = format!("UPDATE users SET {} WHERE id = ?{idx}", updates.join(", "));
            values.push(Box::new(id.to_string()));

            let conn = self.conn();
            let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let affected = match conn.execute(&sql, param_refs.as_slice()) {
                Ok(n) => n,
                Err(e) if e.to_string().contains("UNIQUE") => {
                    return Err(DbError::DuplicateEmail)
                }
                Err(e) => return Err(e.into()),
            };
            if affected == 0 {
                return Err(DbError::NotFound);
            }
        }

        self.find_user_by_id(id)
    }

    pub fn delete_user(&self, id: &str) -> Result<(), DbError> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    // --- Message metadata ---

    pub fn create_metadata(&self, metadata: &MessageMetadata) -> Result<(), DbError> {
        let conn = self.conn();
        match conn.execute(
            "INSERT INTO message_metadata
             (message_id, sender_id, recipient_id, encryption_key, status, created_at, read_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &metadata.message_id,
                &metadata.sender_id,
                &metadata.recipient_id,
                &metadata.encryption_key,
                &metadata.status,
                &metadata.created_at,
                &metadata.read_at,
                &metadata.expires_at,
            ],
        ) {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE") => Err(DbError::DuplicateMessageId),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_metadata(&self, message_id: &str) -> Result<MessageMetadata, DbError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT message_id, sender_id, recipient_id, encryption_key, status, created_at, read_at, expires_at
             FROM message_metadata WHERE message_id = ?1",
            params![message_id],
            row_to_metadata,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// PENDING → READ. A second call against a READ row changes nothing;
    /// an absent row is `NotFound`. READ and EXPIRED never go back.
    pub fn mark_as_read(&self, message_id: &str) -> Result<(), DbError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE message_metadata SET status = ?1, read_at = ?2
             WHERE message_id = ?3 AND status = ?4",
            params![STATUS_READ, &now, message_id, STATUS_PENDING],
        )?;
        if affected == 0 {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM message_metadata WHERE message_id = ?1",
                    params![message_id],
                    |r| r.get::<_, i64>(0),
                )
                .map(|c| c > 0)
                .unwrap_or(false);
            if !exists {
                return Err(DbError::NotFound);
            }
        }
        Ok(())
    }

    /// PENDING → EXPIRED for a single row (orphan reconciliation).
    pub fn mark_expired_if_pending(&self, message_id: &str) -> Result<bool, DbError> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE message_metadata SET status = ?1
             WHERE message_id = ?2 AND status = ?3",
            params![STATUS_EXPIRED, message_id, STATUS_PENDING],
        )?;
        Ok(affected > 0)
    }

    /// PENDING rows past their deadline become EXPIRED. Returns the count.
    pub fn cleanup_expired(&self) -> Result<i64, DbError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE message_metadata SET status = ?1
             WHERE status = ?2 AND expires_at < ?3",
            params![STATUS_EXPIRED, STATUS_PENDING, &now],
        )?;
        Ok(affected as i64)
    }

    /// Ids of all PENDING rows, for the orphan scan.
    pub fn pending_message_ids(&self) -> Result<Vec<String>, DbError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT message_id FROM message_metadata WHERE status = ?1")?;
        let ids = stmt
            .query_map(params![STATUS_PENDING], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    /// History rows for one user, newest first, sender and recipient names
    /// joined in. The key copy is surfaced only to the recipient of a row
    /// that is still PENDING; it is stripped here, not in the handler.
    pub fn get_user_history(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryEntry>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT m.message_id, m.sender_id, s.display_name, m.recipient_id, r.display_name,
                    m.encryption_key, m.status, m.created_at, m.read_at, m.expires_at
             FROM message_metadata m
             JOIN users s ON s.id = m.sender_id
             JOIN users r ON r.id = m.recipient_id
             WHERE m.sender_id = ?1 OR m.recipient_id = ?1
             ORDER BY m.created_at DESC
             LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![user_id, limit], |row| {
                let sender_id: String = row.get(1)?;
                let recipient_id: String = row.get(3)?;
                let encryption_key: Option<String> = row.get(5)?;
                let status: String = row.get(6)?;
                let is_sender = sender_id == user_id;
                let is_recipient = recipient_id == user_id;
                let key_visible = is_recipient && status == STATUS_PENDING;
                Ok(HistoryEntry {
                    message_id: row.get(0)?,
                    sender_id,
                    sender_name: row.get(2)?,
                    recipient_id,
                    recipient_name: row.get(4)?,
                    status,
                    is_sender,
                    is_recipient,
                    encryption_key: if key_visible { encryption_key } else { None },
                    created_at: row.get(7)?,
                    read_at: row.get(8)?,
                    expires_at: row.get(9)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    // --- Counters ---

    pub fn user_counts(&self) -> Result<(i64, i64), DbError> {
        let conn = self.conn();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        let admins: i64 =
            conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |r| {
                r.get(0)
            })?;
        Ok((total, admins))
    }

    /// (pending, read, expired) via one aggregate pass; never materializes rows.
    pub fn message_status_counts(&self) -> Result<(i64, i64, i64), DbError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM message_metadata GROUP BY status")?;
        let mut pending = 0i64;
        let mut read = 0i64;
        let mut expired = 0i64;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows.filter_map(|r| r.ok()) {
            match row.0.as_str() {
                STATUS_PENDING => pending = row.1,
                STATUS_READ => read = row.1,
                STATUS_EXPIRED => expired = row.1,
                _ => {}
            }
        }
        Ok((pending, read, expired))
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get::<_, i32>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageMetadata> {
    Ok(MessageMetadata {
        message_id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        encryption_key: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        read_at: row.get(6)?,
        expires_at: row.get(7)?,
    })
}
