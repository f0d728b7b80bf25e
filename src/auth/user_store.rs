//! User Storage
//! Mission: Look up and persist user accounts with SQLite

use crate::auth::models::{Role, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

/// The persistence collaborator the authenticator depends on
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn create(&self, email: &str, password_hash: &str, role: Role) -> Result<User>;
    async fn list(&self) -> Result<Vec<User>>;
    /// Returns false when no such user existed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// User storage with SQLite backend
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open (or create) the database at `db_path`. `:memory:` is accepted.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user database at {db_path}"))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                [],
            )
            .context("Failed to create users table")?;
        Ok(())
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        let role_str: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            role: Role::from_str(&role_str).unwrap_or(Role::User),
            created_at: row.get(4)?,
        })
    }

    fn find_one(&self, sql: &str, param: &dyn rusqlite::ToSql) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let user = stmt
            .query_row(params![param], Self::user_from_row)
            .optional()?;
        Ok(user)
    }
}

#[async_trait]
impl UserDirectory for UserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE email = ?1",
            &email,
        )
        .context("Failed to look up user by email")
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.find_one(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE id = ?1",
            &id,
        )
        .context("Failed to look up user by id")
    }

    async fn create(&self, email: &str, password_hash: &str, role: Role) -> Result<User> {
        let created_at = Utc::now().to_rfc3339();
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO users (email, password_hash, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, password_hash, role.as_str(), created_at],
            )
            .context("Failed to insert user")?;
            conn.last_insert_rowid()
        };

        info!(user_id = id, role = role.as_str(), "Created user: {}", email);

        Ok(User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at,
        })
    }

    async fn list(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, role, created_at FROM users ORDER BY id",
        )?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let rows_affected = self
            .conn
            .lock()
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .context("Failed to delete user")?;

        if rows_affected == 0 {
            warn!(user_id = id, "Delete requested for unknown user");
            return Ok(false);
        }

        info!(user_id = id, "Deleted user");
        Ok(true)
    }
}
