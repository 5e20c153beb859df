//! Refresh token repository (刷新令牌撤销记录)

use super::{with_deadline, RefreshTokenStore};
use crate::{error::AppError, models::auth::RefreshTokenRecord};
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

pub struct PgRefreshTokenRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgRefreshTokenRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenRepository {
    /// 存储刷新令牌记录
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        with_deadline(
            self.timeout,
            "refresh_tokens.create",
            sqlx::query(
                r#"
                INSERT INTO refresh_tokens (id, user_id, expires_at, revoked_at, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(record.id)
            .bind(record.user_id)
            .bind(record.expires_at)
            .bind(record.revoked_at)
            .bind(record.created_at)
            .execute(&self.db),
        )
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<RefreshTokenRecord>, AppError> {
        with_deadline(
            self.timeout,
            "refresh_tokens.find",
            sqlx::query_as::<_, RefreshTokenRecord>("SELECT * FROM refresh_tokens WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db),
        )
        .await
    }

    /// 撤销刷新令牌
    async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        let result = with_deadline(
            self.timeout,
            "refresh_tokens.revoke",
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
            )
            .bind(id)
            .execute(&self.db),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 撤销用户的所有刷新令牌
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = with_deadline(
            self.timeout,
            "refresh_tokens.revoke_all_for_user",
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(user_id)
            .execute(&self.db),
        )
        .await?;

        Ok(result.rows_affected())
    }

    /// 清理过期的刷新令牌
    async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = with_deadline(
            self.timeout,
            "refresh_tokens.delete_expired",
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()").execute(&self.db),
        )
        .await?;

        Ok(result.rows_affected())
    }
}
