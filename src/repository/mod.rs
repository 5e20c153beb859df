//! Database repository layer
//!
//! 每类持久化数据对应一个存储 trait，服务层只依赖 trait，
//! PostgreSQL 实现用于生产，内存实现用于测试与本地调试。

pub mod memory;
pub mod refresh_token_repo;
pub mod tenant_repo;
pub mod user_repo;

use crate::{
    db::{self, HealthStatus},
    error::AppError,
    models::{
        auth::RefreshTokenRecord,
        tenant::{Tenant, TenantQuery, UpdateTenantRequest},
        user::{NewUser, UpdateUserRequest, User, UserQuery},
    },
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

pub use memory::{InMemoryRefreshTokenStore, InMemoryTenantStore, InMemoryUserStore};
pub use refresh_token_repo::PgRefreshTokenRepository;
pub use tenant_repo::PgTenantRepository;
pub use user_repo::PgUserRepository;

/// 用户凭据存储
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// 邮箱重复时返回 `AppError::BadRequest`
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    async fn update(&self, id: Uuid, req: &UpdateUserRequest) -> Result<Option<User>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// 返回当前页数据与总数
    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, i64), AppError>;

    async fn health_check(&self) -> HealthStatus;
}

/// 刷新令牌记录存储
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;

    async fn find(&self, id: Uuid) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// 已撤销或不存在时返回 false
    async fn revoke(&self, id: Uuid) -> Result<bool, AppError>;

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;

    async fn delete_expired(&self) -> Result<u64, AppError>;
}

/// 租户存储
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn create(&self, name: &str, address: &str) -> Result<Tenant, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError>;

    async fn update(&self, id: Uuid, req: &UpdateTenantRequest) -> Result<Option<Tenant>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn list(&self, query: &TenantQuery) -> Result<(Vec<Tenant>, i64), AppError>;
}

/// 为存储调用加上截止时间，超时按内部错误处理
pub(crate) async fn with_deadline<T, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Err(e)) if db::is_statement_timeout(&e) => {
            tracing::error!(operation, "Store call cancelled by statement_timeout");
            metrics::counter!("store_timeouts_total", "operation" => operation).increment(1);
            Err(AppError::Timeout(operation.to_string()))
        }
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::error!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Store call exceeded deadline"
            );
            metrics::counter!("store_timeouts_total", "operation" => operation).increment(1);
            Err(AppError::Timeout(operation.to_string()))
        }
    }
}

/// 唯一约束冲突映射为 400，其余保留为数据库错误
pub(crate) fn map_unique_violation(e: AppError, message: &str) -> AppError {
    match e {
        AppError::Database(sqlx::Error::Database(ref db)) if db.is_unique_violation() => {
            AppError::BadRequest(message.to_string())
        }
        other => other,
    }
}

/// `q` 参数为空白时视为未提供
pub(crate) fn search_term(q: &Option<String>) -> Option<String> {
    q.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

/// `q` 转为 ILIKE 子串模式，转义通配符；SQL 侧需配合 `ESCAPE '\'`
pub(crate) fn like_pattern(q: &Option<String>) -> Option<String> {
    search_term(q).map(|term| {
        let mut pattern = String::with_capacity(term.len() + 2);
        pattern.push('%');
        for c in term.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result: Result<(), AppError> = with_deadline(
            Duration::from_millis(10),
            "test.slow",
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Timeout(op)) if op == "test.slow"));
    }

    #[tokio::test]
    async fn test_with_deadline_passes_through_errors() {
        let result: Result<(), AppError> = with_deadline(
            Duration::from_secs(1),
            "test.fail",
            async { Err(sqlx::Error::RowNotFound) },
        )
        .await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[test]
    fn test_search_term() {
        assert_eq!(search_term(&None), None);
        assert_eq!(search_term(&Some("   ".to_string())), None);
        assert_eq!(search_term(&Some(" Tan ".to_string())), Some("tan".to_string()));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(&None), None);
        assert_eq!(like_pattern(&Some("Tan".to_string())), Some("%tan%".to_string()));
        assert_eq!(like_pattern(&Some("_".to_string())), Some(r"%\_%".to_string()));
        assert_eq!(
            like_pattern(&Some(r"50%\a".to_string())),
            Some(r"%50\%\\a%".to_string())
        );
    }
}
