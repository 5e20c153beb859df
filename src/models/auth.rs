//! Authentication-related models

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// 刷新令牌的持久化记录，id 即令牌中的 jti
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(
        length(min = 1, message = "Email is required!"),
        email(message = "Email should be a valid email")
    )]
    pub email: String,
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, message = "Password is required!"))]
    pub password: String,
}

/// Self-registration request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, message = "First name is required!"))]
    pub first_name: String,
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, message = "Last name is required!"))]
    pub last_name: String,
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(
        length(min = 1, message = "Email is required!"),
        email(message = "Email should be a valid email")
    )]
    pub email: String,
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, message = "Password is required!"))]
    pub password: String,
}
