//! User repository (数据库访问层)

use super::{like_pattern, map_unique_violation, with_deadline, UserStore};
use crate::{
    db::{self, HealthStatus},
    error::AppError,
    models::{
        page_window,
        user::{NewUser, UpdateUserRequest, User, UserQuery},
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

const EMAIL_TAKEN: &str = "Email is already exists!";

pub struct PgUserRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    /// 根据邮箱查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        with_deadline(
            self.timeout,
            "users.find_by_email",
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.db),
        )
        .await
    }

    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        with_deadline(
            self.timeout,
            "users.find_by_id",
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db),
        )
        .await
    }

    /// 创建用户
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        with_deadline(
            self.timeout,
            "users.create",
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (id, email, password_hash, first_name, last_name, role, tenant_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role.as_str())
            .bind(user.tenant_id)
            .fetch_one(&self.db),
        )
        .await
        .map_err(|e| map_unique_violation(e, EMAIL_TAKEN))
    }

    /// 更新用户
    async fn update(&self, id: Uuid, req: &UpdateUserRequest) -> Result<Option<User>, AppError> {
        with_deadline(
            self.timeout,
            "users.update",
            sqlx::query_as::<_, User>(
                r#"
                UPDATE users
                SET
                    first_name = COALESCE($2, first_name),
                    last_name = COALESCE($3, last_name),
                    email = COALESCE($4, email),
                    role = COALESCE($5, role),
                    tenant_id = COALESCE($6, tenant_id),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(&req.first_name)
            .bind(&req.last_name)
            .bind(&req.email)
            .bind(req.role.map(|r| r.as_str()))
            .bind(req.tenant_id)
            .fetch_optional(&self.db),
        )
        .await
        .map_err(|e| map_unique_violation(e, EMAIL_TAKEN))
    }

    /// 删除用户（刷新令牌记录随外键级联删除）
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = with_deadline(
            self.timeout,
            "users.delete",
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 分页列出用户
    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, i64), AppError> {
        let (limit, offset) = page_window(query.current_page, query.per_page);
        let pattern = like_pattern(&query.q);
        let role = query.role.map(|r| r.as_str());

        let users = with_deadline(
            self.timeout,
            "users.list",
            sqlx::query_as::<_, User>(
                r#"
                SELECT * FROM users
                WHERE ($1::TEXT IS NULL
                        OR first_name ILIKE $1 ESCAPE '\'
                        OR last_name ILIKE $1 ESCAPE '\'
                        OR email ILIKE $1 ESCAPE '\')
                    AND ($2::TEXT IS NULL OR role = $2)
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(&pattern)
            .bind(role)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db),
        )
        .await?;

        let total: i64 = with_deadline(
            self.timeout,
            "users.count",
            sqlx::query(
                r#"
                SELECT COUNT(*) FROM users
                WHERE ($1::TEXT IS NULL
                        OR first_name ILIKE $1 ESCAPE '\'
                        OR last_name ILIKE $1 ESCAPE '\'
                        OR email ILIKE $1 ESCAPE '\')
                    AND ($2::TEXT IS NULL OR role = $2)
                "#,
            )
            .bind(&pattern)
            .bind(role)
            .fetch_one(&self.db),
        )
        .await?
        .get(0);

        Ok((users, total))
    }

    async fn health_check(&self) -> HealthStatus {
        db::health_check(&self.db, self.timeout).await
    }
}
