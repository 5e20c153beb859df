//! 认证服务层测试
//!
//! 直接驱动 AuthService，覆盖 HTTP 层不容易构造的并发场景

use async_trait::async_trait;
use auth_service::{
    auth::{JwtService, TokenSubject, TokenType},
    error::AppError,
    models::{
        auth::{RefreshTokenRecord, RegisterRequest},
        Role,
    },
    repository::{InMemoryRefreshTokenStore, InMemoryUserStore, RefreshTokenStore},
    services::AuthService,
};
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{create_test_config, fast_hasher, test_keys, ISSUER, PRIVATE_PEM, PUBLIC_PEM};

/// 读取记录后让出执行权，模拟数据库往返期间的并发
struct SlowReadStore {
    inner: Arc<InMemoryRefreshTokenStore>,
}

#[async_trait]
impl RefreshTokenStore for SlowReadStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        self.inner.create(record).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = self.inner.find(id).await;
        tokio::task::yield_now().await;
        record
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.revoke(id).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        self.inner.delete_expired().await
    }
}

struct Fixture {
    auth_service: AuthService,
    jwt_service: Arc<JwtService>,
    user_id: Uuid,
}

async fn fixture() -> Fixture {
    let config = create_test_config();
    let records = Arc::new(InMemoryRefreshTokenStore::new());
    let users = Arc::new(InMemoryUserStore::with_refresh_tokens(records.clone()));
    let jwt_service = Arc::new(
        JwtService::new(
            test_keys(PRIVATE_PEM, PUBLIC_PEM, &[]),
            ISSUER,
            config.security.access_token_exp_secs,
            config.security.refresh_token_exp_secs,
            Arc::new(SlowReadStore { inner: records }),
        )
        .unwrap(),
    );
    let hasher = Arc::new(fast_hasher());

    let auth_service = AuthService::new(
        users.clone(),
        jwt_service.clone(),
        hasher.clone(),
        config.security,
    );

    let user_id = auth_service
        .register(RegisterRequest {
            first_name: "Tanjim".to_string(),
            last_name: "Jimmiy".to_string(),
            email: "tanjim@mern.space".to_string(),
            password: "password".to_string(),
        })
        .await
        .unwrap()
        .user_id;

    Fixture {
        auth_service,
        jwt_service,
        user_id,
    }
}

#[tokio::test]
async fn test_concurrent_refresh_with_same_token_yields_one_session() {
    let f = fixture().await;
    let pair = f
        .jwt_service
        .issue_token_pair(&TokenSubject {
            user_id: f.user_id,
            role: Role::Customer,
            tenant_id: None,
        })
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        f.auth_service.refresh(&pair.refresh_token),
        f.auth_service.refresh(&pair.refresh_token),
    );

    let succeeded: Vec<_> = [first, second].into_iter().filter_map(Result::ok).collect();
    assert_eq!(succeeded.len(), 1);

    // 胜出的一方拿到的新刷新令牌仍然可用
    assert!(f
        .jwt_service
        .verify(&succeeded[0].tokens.refresh_token, TokenType::Refresh)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_losing_refresh_is_unauthorized() {
    let f = fixture().await;
    let pair = f
        .jwt_service
        .issue_token_pair(&TokenSubject {
            user_id: f.user_id,
            role: Role::Customer,
            tenant_id: None,
        })
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        f.auth_service.refresh(&pair.refresh_token),
        f.auth_service.refresh(&pair.refresh_token),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::Unauthorized)));
}
