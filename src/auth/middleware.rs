//! JWT 认证中间件与角色校验
//!
//! 令牌来源策略：优先读取 `accessToken` Cookie；没有 Cookie 时才接受
//! `Authorization: Bearer <token>` 头。

use crate::{
    auth::{cookie::ACCESS_COOKIE, jwt::JwtService},
    error::AppError,
    models::Role,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 提取访问令牌：Cookie 优先，其次 Bearer 头
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = extract_token(req.headers()) else {
        tracing::debug!("Request without access token");
        metrics::counter!("auth_token_rejections_total", "kind" => "missing").increment(1);
        return Err(AppError::Unauthorized);
    };

    // 验证令牌，失败原因只记录日志
    let claims = jwt_service.verify_access_token(&token)?;
    let user_id = claims.user_id()?;

    let auth_context = AuthContext {
        user_id,
        role: claims.role,
        tenant_id: claims.tenant,
    };

    tracing::Span::current().record("user_id", tracing::field::display(user_id));

    // 附加到请求扩展
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// 角色校验：允许集合为空时放行所有已认证角色
pub fn authorize(role: Role, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.is_empty() || allowed.contains(&role) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// 角色门禁中间件，需在 `jwt_auth_middleware` 之后运行
///
/// ```ignore
/// const ADMIN_ONLY: &[Role] = &[Role::Admin];
/// router.route_layer(middleware::from_fn_with_state(ADMIN_ONLY, require_roles))
/// ```
pub async fn require_roles(
    State(allowed): State<&'static [Role]>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = req
        .extensions()
        .get::<AuthContext>()
        .ok_or(AppError::Unauthorized)?;

    if let Err(e) = authorize(context.role, allowed) {
        tracing::warn!(
            user_id = %context.user_id,
            role = %context.role,
            "Role not permitted for this route"
        );
        return Err(e);
    }

    Ok(next.run(req).await)
}
