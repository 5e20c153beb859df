//! 租户管理的 HTTP 处理器

use super::ValidatedJson;
use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        page_window,
        tenant::{CreateTenantRequest, TenantQuery, UpdateTenantRequest},
        IdResponse, Page,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// 列出租户（公开）
pub async fn list_tenants(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenantQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (per_page, _) = page_window(query.current_page, query.per_page);
    let (tenants, total) = state.tenants.list(&query).await?;

    Ok(Json(Page {
        current_page: query.current_page.max(1),
        per_page: per_page as u32,
        total,
        data: tenants,
    }))
}

/// 创建租户
pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<CreateTenantRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state.tenants.create(&req.name, &req.address).await?;

    tracing::info!(actor = %auth_context.user_id, tenant_id = %tenant.id, "Tenant created");
    Ok((StatusCode::CREATED, Json(IdResponse { id: tenant.id })))
}

/// 获取租户详情
pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state
        .tenants
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("tenant"))?;

    Ok(Json(tenant))
}

/// 更新租户
pub async fn update_tenant(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTenantRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state
        .tenants
        .update(id, &req)
        .await?
        .ok_or_else(|| AppError::not_found("tenant"))?;

    tracing::info!(actor = %auth_context.user_id, tenant_id = %id, "Tenant updated");
    Ok(Json(tenant))
}

/// 删除租户，关联用户的 tenant_id 置空
pub async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.tenants.delete(id).await? {
        return Err(AppError::not_found("tenant"));
    }

    tracing::info!(actor = %auth_context.user_id, tenant_id = %id, "Tenant deleted");
    Ok(Json(IdResponse { id }))
}
