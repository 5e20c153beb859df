//! PostgreSQL 凭据库
//!
//! 每个连接建立后设置服务端 `statement_timeout`，与存储层的客户端截止时间一致，
//! 这样即使客户端已放弃等待，数据库也不会继续执行过期的查询。

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Executor, PgPool,
};
use std::{str::FromStr, time::Duration};

const APPLICATION_NAME: &str = "auth-service";

/// Postgres `query_canceled`，服务端语句超时返回此错误码
const QUERY_CANCELED: &str = "57014";

fn statement_timeout_sql(timeout_secs: u64) -> String {
    format!("SET statement_timeout = '{}s'", timeout_secs)
}

/// Connect the credential store pool
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(config.url.expose_secret())?
        .application_name(APPLICATION_NAME);
    let set_timeout = statement_timeout_sql(config.statement_timeout_secs);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .after_connect(move |conn, _meta| {
            let sql = set_timeout.clone();
            Box::pin(async move {
                conn.execute(sql.as_str()).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        statement_timeout_secs = config.statement_timeout_secs,
        "Credential store connected"
    );

    Ok(pool)
}

/// Apply pending migrations (`tenants`, `users`, `refresh_tokens`)
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Credential store schema up to date");
    Ok(())
}

/// 服务端因 `statement_timeout` 取消了语句
pub(crate) fn is_statement_timeout(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED))
}

/// Ping the store within `timeout`; used by readiness
pub async fn health_check(pool: &PgPool, timeout: Duration) -> HealthStatus {
    match tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => HealthStatus::Healthy,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Credential store ping failed");
            HealthStatus::Unhealthy(e.to_string())
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Credential store ping timed out");
            HealthStatus::Unhealthy("ping timed out".to_string())
        }
    }
}

pub fn record_pool_metrics(pool: &PgPool) {
    metrics::gauge!("db_pool_connections").set(pool.size() as f64);
    metrics::gauge!("db_pool_idle_connections").set(pool.num_idle() as f64);
}

/// 存储健康状态
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            HealthStatus::Healthy => None,
            HealthStatus::Unhealthy(msg) => Some(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_timeout_sql() {
        assert_eq!(statement_timeout_sql(10), "SET statement_timeout = '10s'");
    }

    #[test]
    fn test_non_database_errors_are_not_statement_timeouts() {
        assert!(!is_statement_timeout(&sqlx::Error::RowNotFound));
        assert!(!is_statement_timeout(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_only_healthy_is_healthy() {
        assert!(HealthStatus::Healthy.is_healthy());
        let down = HealthStatus::Unhealthy("ping timed out".into());
        assert!(!down.is_healthy());
        assert_eq!(down.message(), Some("ping timed out"));
    }
}
