//! 认证相关的 HTTP 处理器

use super::ValidatedJson;
use crate::{
    auth::{cookie::REFRESH_COOKIE, middleware::AuthContext},
    error::AppError,
    middleware::AppState,
    models::{
        auth::{LoginRequest, RegisterRequest},
        IdResponse,
    },
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.auth_service.register(req).await?;
    let jar = state.set_token_cookies(jar, outcome.tokens);

    Ok((
        StatusCode::CREATED,
        jar,
        Json(IdResponse {
            id: outcome.user_id,
        }),
    ))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.auth_service.login(req).await?;
    let jar = state.set_token_cookies(jar, outcome.tokens);

    Ok((jar, Json(outcome.profile)))
}

/// 当前用户
pub async fn self_profile(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth_service.self_profile(&auth_context).await?;
    Ok(Json(profile))
}

/// 刷新令牌
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let outcome = state.auth_service.refresh(&refresh_token).await?;
    let jar = state.set_token_cookies(jar, outcome.tokens);

    Ok((
        jar,
        Json(IdResponse {
            id: outcome.user_id,
        }),
    ))
}

/// 登出
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    state
        .auth_service
        .logout(&auth_context, refresh_token.as_deref())
        .await?;

    Ok((state.cookie_policy.clear_tokens(jar), Json(json!({}))))
}

/// 从所有设备登出
pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state.auth_service.logout_all(&auth_context).await?;

    Ok((
        state.cookie_policy.clear_tokens(jar),
        Json(json!({ "revoked": revoked })),
    ))
}
