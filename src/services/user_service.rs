//! 用户管理服务（管理员）

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    models::{
        page_window,
        user::{CreateUserRequest, NewUser, UpdateUserRequest, UserProfile, UserQuery},
        Page,
    },
    repository::{TenantStore, UserStore},
    services::AuthService,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct UserService {
    users: Arc<dyn UserStore>,
    tenants: Arc<dyn TenantStore>,
    auth_service: Arc<AuthService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tenants: Arc<dyn TenantStore>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self {
            users,
            tenants,
            auth_service,
        }
    }

    async fn ensure_tenant_exists(&self, tenant_id: Option<Uuid>) -> Result<(), AppError> {
        if let Some(id) = tenant_id {
            if self.tenants.find_by_id(id).await?.is_none() {
                return Err(AppError::BadRequest(format!("Tenant {} does not exist", id)));
            }
        }
        Ok(())
    }

    pub async fn create(
        &self,
        actor: &AuthContext,
        req: CreateUserRequest,
    ) -> Result<Uuid, AppError> {
        self.ensure_tenant_exists(req.tenant_id).await?;
        let password_hash = self.auth_service.hash_new_password(&req.password)?;

        let user = self
            .users
            .create(NewUser {
                email: req.email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                role: req.role,
                tenant_id: req.tenant_id,
            })
            .await?;

        tracing::info!(actor = %actor.user_id, user_id = %user.id, role = %user.role, "User created");
        Ok(user.id)
    }

    pub async fn get(&self, id: Uuid) -> Result<UserProfile, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AppError::not_found("user"))
    }

    pub async fn update(
        &self,
        actor: &AuthContext,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<UserProfile, AppError> {
        self.ensure_tenant_exists(req.tenant_id).await?;

        let user = self
            .users
            .update(id, &req)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        tracing::info!(actor = %actor.user_id, user_id = %id, "User updated");
        Ok(UserProfile::from(user))
    }

    pub async fn delete(&self, actor: &AuthContext, id: Uuid) -> Result<Uuid, AppError> {
        if actor.user_id == id {
            return Err(AppError::BadRequest("You can not delete yourself".to_string()));
        }

        if !self.users.delete(id).await? {
            return Err(AppError::not_found("user"));
        }

        tracing::info!(actor = %actor.user_id, user_id = %id, "User deleted");
        Ok(id)
    }

    pub async fn list(&self, query: UserQuery) -> Result<Page<UserProfile>, AppError> {
        let (per_page, _) = page_window(query.current_page, query.per_page);
        let (users, total) = self.users.list(&query).await?;

        Ok(Page {
            current_page: query.current_page.max(1),
            per_page: per_page as u32,
            total,
            data: users.into_iter().map(UserProfile::from).collect(),
        })
    }
}
