//! 认证服务：注册、登录、自查、令牌刷新、登出

use crate::{
    auth::{
        jwt::{JwtService, TokenError, TokenPair, TokenSubject, TokenType},
        middleware::AuthContext,
        password::PasswordHasher,
    },
    config::SecurityConfig,
    error::AppError,
    models::{
        auth::{LoginRequest, RegisterRequest},
        user::{NewUser, User, UserProfile},
        Role,
    },
    repository::UserStore,
};
use std::sync::Arc;
use uuid::Uuid;

/// 登录结果：脱敏资料 + 令牌对
#[derive(Debug)]
pub struct LoginOutcome {
    pub profile: UserProfile,
    pub tokens: TokenPair,
}

/// 注册或刷新的结果
#[derive(Debug)]
pub struct SessionOutcome {
    pub user_id: Uuid,
    pub tokens: TokenPair,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_service: Arc<JwtService>,
    hasher: Arc<PasswordHasher>,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt_service: Arc<JwtService>,
        hasher: Arc<PasswordHasher>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            users,
            jwt_service,
            hasher,
            security,
        }
    }

    fn subject(user: &User) -> TokenSubject {
        TokenSubject {
            user_id: user.id,
            role: user.role,
            tenant_id: user.tenant_id,
        }
    }

    /// 校验密码策略并哈希
    pub fn hash_new_password(&self, password: &str) -> Result<String, AppError> {
        PasswordHasher::validate_password_policy(password, &self.security)?;
        self.hasher.hash(password)
    }

    /// 注册新顾客账号并直接签发会话
    pub async fn register(&self, req: RegisterRequest) -> Result<SessionOutcome, AppError> {
        let password_hash = self.hash_new_password(&req.password)?;

        let user = self
            .users
            .create(NewUser {
                email: req.email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                role: Role::Customer,
                tenant_id: None,
            })
            .await?;

        let tokens = self.jwt_service.issue_token_pair(&Self::subject(&user)).await?;

        tracing::info!(user_id = %user.id, "User registered");
        metrics::counter!("auth_registrations_total").increment(1);

        Ok(SessionOutcome {
            user_id: user.id,
            tokens,
        })
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, AppError> {
        let Some(user) = self.users.find_by_email(&req.email).await? else {
            // 用户不存在时同样执行一次哈希校验
            self.hasher.verify_dummy(&req.password);
            tracing::info!("Login failed: unknown email");
            metrics::counter!("auth_logins_total", "outcome" => "failure").increment(1);
            return Err(AppError::InvalidCredentials);
        };

        if let Err(e) = self.hasher.verify(&req.password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "Login failed: password mismatch");
            metrics::counter!("auth_logins_total", "outcome" => "failure").increment(1);
            return Err(e);
        }

        let tokens = self.jwt_service.issue_token_pair(&Self::subject(&user)).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        metrics::counter!("auth_logins_total", "outcome" => "success").increment(1);

        Ok(LoginOutcome {
            profile: UserProfile::from(user),
            tokens,
        })
    }

    /// 当前用户资料
    pub async fn self_profile(&self, context: &AuthContext) -> Result<UserProfile, AppError> {
        match self.users.find_by_id(context.user_id).await? {
            Some(user) => Ok(UserProfile::from(user)),
            None => {
                // 有效令牌对应的用户不存在，属于数据一致性问题
                tracing::error!(
                    user_id = %context.user_id,
                    "Authenticated user missing from credential store"
                );
                Err(AppError::not_found("user"))
            }
        }
    }

    /// 刷新令牌（轮换：旧记录撤销，签发新令牌对）
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionOutcome, AppError> {
        let claims = self.jwt_service.verify(refresh_token, TokenType::Refresh).await?;
        let user_id = claims.user_id()?;
        let record_id = claims
            .jti
            .as_deref()
            .and_then(|jti| Uuid::parse_str(jti).ok())
            .ok_or(AppError::Unauthorized)?;

        let Some(user) = self.users.find_by_id(user_id).await? else {
            tracing::warn!(%user_id, "Refresh token for deleted user");
            return Err(AppError::Unauthorized);
        };

        // 撤销与校验合为一步：记录已被其他请求撤销时拒绝
        if !self.jwt_service.revoke(record_id).await? {
            tracing::warn!(%user_id, %record_id, "Refresh token already rotated");
            metrics::counter!("auth_token_rejections_total", "kind" => "replayed").increment(1);
            return Err(AppError::Unauthorized);
        }

        // 角色、租户以存储中的最新数据为准
        let tokens = self.jwt_service.issue_token_pair(&Self::subject(&user)).await?;

        tracing::debug!(%user_id, old = %record_id, new = %tokens.refresh_token_id, "Refresh token rotated");

        Ok(SessionOutcome {
            user_id: user.id,
            tokens,
        })
    }

    /// 登出：撤销当前刷新令牌
    ///
    /// 已失效的刷新令牌不阻止登出，只有属于其他用户的有效令牌会被拒绝。
    pub async fn logout(
        &self,
        context: &AuthContext,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        let Some(refresh_token) = refresh_token else {
            tracing::debug!(user_id = %context.user_id, "Logout without refresh token");
            return Ok(());
        };

        let claims = match self.jwt_service.verify(refresh_token, TokenType::Refresh).await {
            Ok(claims) => claims,
            Err(TokenError::Internal(e)) => return Err(e),
            Err(e) => {
                tracing::info!(
                    user_id = %context.user_id,
                    reason = e.kind(),
                    "Logout with stale refresh token, nothing to revoke"
                );
                return Ok(());
            }
        };

        if claims.user_id()? != context.user_id {
            tracing::warn!(
                user_id = %context.user_id,
                token_subject = %claims.sub,
                "Refresh token presented by a different user"
            );
            return Err(AppError::Unauthorized);
        }

        if let Some(id) = claims.jti.as_deref().and_then(|jti| Uuid::parse_str(jti).ok()) {
            self.jwt_service.revoke(id).await?;
        }

        tracing::info!(user_id = %context.user_id, "User logged out");
        Ok(())
    }

    /// 从所有设备登出
    pub async fn logout_all(&self, context: &AuthContext) -> Result<u64, AppError> {
        let revoked = self.jwt_service.revoke_all(context.user_id).await?;
        tracing::info!(user_id = %context.user_id, revoked, "User logged out everywhere");
        Ok(revoked)
    }
}
