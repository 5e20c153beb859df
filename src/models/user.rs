//! User domain models

use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// User account
///
/// Deliberately not `Serialize`: the only wire representation is
/// [`UserProfile`], which lists the exposed fields explicitly.
#[derive(Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("role", &self.role)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// 新用户（密码已哈希）
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

/// Sanitized user profile (without sensitive data)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            tenant_id: user.tenant_id,
            created_at: user.created_at,
        }
    }
}

/// Create user request (admin)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
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
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required!"))]
    pub password: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

/// Update user request (admin)
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "First name can not be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name can not be empty"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Email should be a valid email"))]
    pub email: Option<String>,
    pub role: Option<Role>,
    pub tenant_id: Option<Uuid>,
}

/// 用户列表查询参数
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default = "super::default_page")]
    pub current_page: u32,
    #[serde(default = "super::default_per_page")]
    pub per_page: u32,
    /// 按名字或邮箱模糊搜索
    pub q: Option<String>,
    pub role: Option<Role>,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            current_page: super::default_page(),
            per_page: super::default_per_page(),
            q: None,
            role: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "tanjim@mern.space".to_string(),
            password_hash: "$argon2id$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA".to_string(),
            first_name: "Tanjim".to_string(),
            last_name: "Jimmiy".to_string(),
            role: Role::Customer,
            tenant_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_never_contains_password() {
        let user = sample_user();
        let json = serde_json::to_value(UserProfile::from(user.clone())).unwrap();

        let object = json.as_object().unwrap();
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("passwordHash"));
        assert!(!json.to_string().contains(&user.password_hash));
        assert_eq!(json["firstName"], "Tanjim");
        assert_eq!(json["role"], "customer");
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let user = sample_user();
        let debug = format!("{:?}", user);
        assert!(!debug.contains("argon2id"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_create_user_request_validation() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Tanjim",
            "lastName": "Jimmiy",
            "email": "not-an-email",
            "password": "password",
            "role": "manager"
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "firstName": " Tanjim ",
            "lastName": "Jimmiy",
            "email": " tanjim@mern.space ",
            "password": "password",
            "role": "manager"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.email, "tanjim@mern.space");
        assert_eq!(req.first_name, "Tanjim");
    }

    #[test]
    fn test_user_query_defaults() {
        let query: UserQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.current_page, 1);
        assert_eq!(query.per_page, 10);
        assert!(query.q.is_none());
    }
}
