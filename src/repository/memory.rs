//! 内存存储实现
//! 供测试与本地调试使用，语义与 PostgreSQL 实现保持一致

use super::{search_term, RefreshTokenStore, TenantStore, UserStore};
use crate::{
    db::HealthStatus,
    error::AppError,
    models::{
        auth::RefreshTokenRecord,
        page_window,
        tenant::{Tenant, TenantQuery, UpdateTenantRequest},
        user::{NewUser, UpdateUserRequest, User, UserQuery},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

fn paginate<T>(items: Vec<T>, current_page: u32, per_page: u32) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let (limit, offset) = page_window(current_page, per_page);
    let page = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (page, total)
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
    /// 删除用户时同步清理其刷新令牌，对应数据库的级联删除
    refresh_tokens: Option<Arc<InMemoryRefreshTokenStore>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_tokens(refresh_tokens: Arc<InMemoryRefreshTokenStore>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            refresh_tokens: Some(refresh_tokens),
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::BadRequest("Email is already exists!".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            tenant_id: user.tenant_id,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, req: &UpdateUserRequest) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;

        if let Some(email) = &req.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::BadRequest("Email is already exists!".to_string()));
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(first_name) = &req.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &req.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(email) = &req.email {
            user.email = email.clone();
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(tenant_id) = req.tenant_id {
            user.tenant_id = Some(tenant_id);
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            if let Some(tokens) = &self.refresh_tokens {
                tokens.records.write().await.retain(|_, r| r.user_id != id);
            }
        }
        Ok(removed)
    }

    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, i64), AppError> {
        let term = search_term(&query.q);
        let users = self.users.read().await;

        let mut matched: Vec<User> = users
            .values()
            .filter(|u| query.role.map_or(true, |role| u.role == role))
            .filter(|u| {
                term.as_deref().map_or(true, |t| {
                    u.first_name.to_lowercase().contains(t)
                        || u.last_name.to_lowercase().contains(t)
                        || u.email.to_lowercase().contains(t)
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(paginate(matched, query.current_page, query.per_page))
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    records: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut revoked = 0;
        for record in self.records.write().await.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.expires_at >= now);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<Uuid, Tenant>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn create(&self, name: &str, address: &str) -> Result<Tenant, AppError> {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address: address.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tenants.write().await.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        Ok(self.tenants.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, req: &UpdateTenantRequest) -> Result<Option<Tenant>, AppError> {
        let mut tenants = self.tenants.write().await;
        let Some(tenant) = tenants.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            tenant.name = name.clone();
        }
        if let Some(address) = &req.address {
            tenant.address = address.clone();
        }
        tenant.updated_at = Utc::now();
        Ok(Some(tenant.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.tenants.write().await.remove(&id).is_some())
    }

    async fn list(&self, query: &TenantQuery) -> Result<(Vec<Tenant>, i64), AppError> {
        let term = search_term(&query.q);
        let tenants = self.tenants.read().await;

        let mut matched: Vec<Tenant> = tenants
            .values()
            .filter(|t| {
                term.as_deref().map_or(true, |q| {
                    t.name.to_lowercase().contains(q) || t.address.to_lowercase().contains(q)
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(paginate(matched, query.current_page, query.per_page))
    }
}
