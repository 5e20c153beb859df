//! Tenant domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Tenant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create tenant request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, max = 100, message = "Tenant name is required!"))]
    pub name: String,
    #[serde(default, deserialize_with = "super::trimmed")]
    #[validate(length(min = 1, max = 255, message = "Tenant address is required!"))]
    pub address: String,
}

/// Update tenant request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 100, message = "Tenant name can not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Tenant address can not be empty"))]
    pub address: Option<String>,
}

/// 租户列表查询参数
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantQuery {
    #[serde(default = "super::default_page")]
    pub current_page: u32,
    #[serde(default = "super::default_per_page")]
    pub per_page: u32,
    pub q: Option<String>,
}

impl Default for TenantQuery {
    fn default() -> Self {
        Self {
            current_page: super::default_page(),
            per_page: super::default_per_page(),
            q: None,
        }
    }
}
