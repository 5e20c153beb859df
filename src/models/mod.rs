//! 数据模型模块
//! 用户、租户、角色及认证请求模型

pub mod auth;
pub mod role;
pub mod tenant;
pub mod user;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub use role::Role;

/// 分页响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub data: Vec<T>,
}

/// 仅返回资源 ID 的响应
#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: Uuid,
}

/// 分页参数换算为 (limit, offset)
pub fn page_window(current_page: u32, per_page: u32) -> (i64, i64) {
    let per_page = per_page.clamp(1, 100) as i64;
    let page = current_page.max(1) as i64;
    (per_page, (page - 1) * per_page)
}

/// 反序列化时去除首尾空白
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(s.trim().to_string())
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_per_page() -> u32 {
    10
}
