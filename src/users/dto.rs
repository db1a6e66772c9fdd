use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use super::repo::User;
use super::validation::{email_address, not_blank};

/// User as exposed over HTTP. Carries no password material.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            profile_image: u.profile_image,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UsersEnvelope {
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct TokenEnvelope {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub const MAX_LIMIT: i64 = 100;

    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}

/// Raw registration input, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

// Messages are prefixed with the field name when flattened.

/// Validated registration.
#[derive(Debug, Clone, Validate)]
pub struct NewAccount {
    #[validate(custom(function = "not_blank", message = "should not be empty"))]
    #[validate(length(max = 64, message = "must be shorter than or equal to 64 characters"))]
    pub username: String,
    #[validate(length(min = 1, message = "should not be empty"))]
    #[validate(custom(function = "email_address", message = "must be an email"))]
    pub email: String,
    #[validate(custom(function = "not_blank", message = "should not be empty"))]
    #[validate(length(min = 8, message = "must be longer than or equal to 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, message = "should not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "should not be empty"))]
    pub password: String,
}

/// Validated partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Validate)]
pub struct UserChanges {
    #[validate(custom(function = "email_address", message = "must be an email"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "must be longer than or equal to 8 characters"))]
    pub password: Option<String>,
}

/// Uploaded `profileImage` file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_hides_password_and_uses_camel_case() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            profile_image: Some("https://cdn.test/a.png".into()),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert_eq!(json["profileImage"], "https://cdn.test/a.png");
        assert!(json.get("createdAt").is_some());
        let raw = json.to_string();
        assert!(!raw.contains("argon2"));
        assert!(!raw.contains("password"));
    }

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination { limit: 1_000, offset: -5 };
        assert_eq!(p.clamped(), (100, 0));
        let p = Pagination { limit: 0, offset: 40 };
        assert_eq!(p.clamped(), (1, 40));
    }
}
