//! Tenant repository (数据库访问层)

use super::{like_pattern, with_deadline, TenantStore};
use crate::{
    error::AppError,
    models::{
        page_window,
        tenant::{Tenant, TenantQuery, UpdateTenantRequest},
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

pub struct PgTenantRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgTenantRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl TenantStore for PgTenantRepository {
    async fn create(&self, name: &str, address: &str) -> Result<Tenant, AppError> {
        with_deadline(
            self.timeout,
            "tenants.create",
            sqlx::query_as::<_, Tenant>(
                "INSERT INTO tenants (id, name, address) VALUES ($1, $2, $3) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(address)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        with_deadline(
            self.timeout,
            "tenants.find_by_id",
            sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db),
        )
        .await
    }

    async fn update(&self, id: Uuid, req: &UpdateTenantRequest) -> Result<Option<Tenant>, AppError> {
        with_deadline(
            self.timeout,
            "tenants.update",
            sqlx::query_as::<_, Tenant>(
                r#"
                UPDATE tenants
                SET
                    name = COALESCE($2, name),
                    address = COALESCE($3, address),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(&req.name)
            .bind(&req.address)
            .fetch_optional(&self.db),
        )
        .await
    }

    /// 删除租户，关联用户的 tenant_id 置空
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = with_deadline(
            self.timeout,
            "tenants.delete",
            sqlx::query("DELETE FROM tenants WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: &TenantQuery) -> Result<(Vec<Tenant>, i64), AppError> {
        let (limit, offset) = page_window(query.current_page, query.per_page);
        let pattern = like_pattern(&query.q);

        let tenants = with_deadline(
            self.timeout,
            "tenants.list",
            sqlx::query_as::<_, Tenant>(
                r#"
                SELECT * FROM tenants
                WHERE ($1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\' OR address ILIKE $1 ESCAPE '\')
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db),
        )
        .await?;

        let total: i64 = with_deadline(
            self.timeout,
            "tenants.count",
            sqlx::query(
                r#"
                SELECT COUNT(*) FROM tenants
                WHERE ($1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\' OR address ILIKE $1 ESCAPE '\')
                "#,
            )
            .bind(&pattern)
            .fetch_one(&self.db),
        )
        .await?
        .get(0);

        Ok((tenants, total))
    }
}
