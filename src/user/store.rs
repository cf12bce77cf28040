//! SQLite store for users and their session tokens.

use super::auth::{AuthToken, AuthTokenValue};
use super::schema::USERS_SCHEMA_SQL;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Trait for user and session token storage operations.
pub trait UserStore: Send + Sync {
    /// Creates a new user and returns the user id. Errors when the handle
    /// is already taken.
    fn create_user(&self, handle: &str) -> Result<usize>;

    /// Returns the handle for a user id, or None for an unknown user.
    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>>;

    /// Returns the user id for a handle, or None for an unknown handle.
    fn get_user_id(&self, handle: &str) -> Result<Option<usize>>;

    /// Adds a session token. Errors when the token value already exists.
    fn add_auth_token(&self, token: &AuthToken) -> Result<()>;

    /// Looks up a session token by value.
    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes a session token. Returns false when there was none.
    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool>;

    /// Stamps a token's last-used time with the current time.
    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()>;

    /// Deletes tokens not used (or, never used, not created) within the
    /// given number of days. Returns how many were deleted.
    fn prune_auth_tokens(&self, unused_for_days: u64) -> Result<usize>;
}

/// SQLite implementation of UserStore.
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Open or create a user database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open user database: {:?}", path))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(USERS_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(USERS_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<AuthToken> {
        Ok(AuthToken {
            value: AuthTokenValue(row.get("value")?),
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
            last_used_at: row.get("last_used_at")?,
        })
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, handle: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (handle, created_at) VALUES (?1, ?2)",
            params![handle, chrono::Utc::now().timestamp()],
        )?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let handle = conn
            .query_row(
                "SELECT handle FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(handle)
    }

    fn get_user_id(&self, handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM users WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn add_auth_token(&self, token: &AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_tokens (value, user_id, created_at, last_used_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                token.value.0,
                token.user_id,
                token.created_at,
                token.last_used_at,
            ],
        )?;
        Ok(())
    }

    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let token = conn
            .query_row(
                "SELECT * FROM auth_tokens WHERE value = ?1",
                params![value.0],
                Self::row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM auth_tokens WHERE value = ?1", params![value.0])?;
        Ok(deleted > 0)
    }

    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_tokens SET last_used_at = ?1 WHERE value = ?2",
            params![chrono::Utc::now().timestamp(), value.0],
        )?;
        Ok(())
    }

    fn prune_auth_tokens(&self, unused_for_days: u64) -> Result<usize> {
        let cutoff = chrono::Utc::now().timestamp() - (unused_for_days as i64) * 24 * 60 * 60;
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM auth_tokens WHERE COALESCE(last_used_at, created_at) < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}
