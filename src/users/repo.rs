use std::fmt;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User row. Never serialized directly; see `dto::PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile_image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile_image: Option<String>,
}

/// Column carrying a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Username => f.write_str("Username"),
            UniqueField::Email => f.write_str("Email"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Duplicate(UniqueField),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                match db.constraint() {
                    Some("users_username_key") => {
                        return StoreError::Duplicate(UniqueField::Username)
                    }
                    Some("users_email_key") => {
                        return StoreError::Duplicate(UniqueField::Email)
                    }
                    _ => {}
                }
            }
        }
        StoreError::Other(anyhow::Error::new(e).context("write user"))
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn insert(&self, new: NewUser) -> Result<User, StoreError>;
    /// Persists email, password hash and profile image of `user`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
    /// Returns the removed row, `None` if there was nothing to delete.
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<User>>;
}

const COLUMNS: &str = "id, username, email, password_hash, profile_image, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, filter: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE {filter} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {filter}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list users")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, profile_image)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(new.username)
            .bind(new.email)
            .bind(new.password_hash)
            .bind(new.profile_image)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3, profile_image = $4, updated_at = now()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(user.email.as_str())
            .bind(user.password_hash.as_str())
            .bind(user.profile_image.as_deref())
            .fetch_one(&self.db)
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("DELETE FROM users WHERE id = $1 RETURNING {COLUMNS}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("delete user")?;
        Ok(user)
    }
}
