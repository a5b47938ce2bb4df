//! Account storage backed by SQLite and bcrypt.
//!
//! Passwords are hashed with a per-password random salt at bcrypt's default
//! adaptive cost. Hashing and verification run on the blocking pool so a
//! slow hash never stalls the async runtime.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::Config;
use crate::traits::CredentialStore;
use crate::{db, migrate};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username already exists. Please choose another.")]
    DuplicateUsername,
    #[error("{0}")]
    Invalid(String),
    #[error("credential store error: {0}")]
    Other(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Other(e.to_string())
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AuthError::Other(e.to_string())
    }
}

pub struct SqliteCredentialStore {
    pool: SqlitePool,
    cost: u32,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Opens the configured database and ensures the `users` table exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Overrides the bcrypt work factor (4–31).
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn stored_hash(&self, username: &str) -> Result<Option<String>, AuthError> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn verify(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let Some(hash) = self.stored_hash(username).await? else {
            debug!(username, "login for unknown user");
            return Ok(false);
        };

        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Other(e.to_string()))??;
        Ok(matches)
    }

    async fn create(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::Invalid("username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Invalid("password must not be empty".to_string()));
        }

        let cost = self.cost;
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Other(e.to_string()))??;

        let result =
            sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
                .bind(username)
                .bind(&hash)
                .bind(chrono::Utc::now().timestamp())
                .execute(&self.pool)
                .await;

        match result {
            Ok(_) => {
                info!(username, "account created");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AuthError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }
}
