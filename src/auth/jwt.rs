//! JWT token issuance and verification
//!
//! Access tokens are EdDSA (Ed25519) signed and verifiable by anyone holding
//! the published JWKS. Refresh tokens are HS256 signed with a separate secret
//! and are only honored while their persisted record exists and is not revoked.

use crate::{
    config::AppConfig,
    error::AppError,
    models::{auth::RefreshTokenRecord, Role},
    repository::RefreshTokenStore,
};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode,
    errors::ErrorKind,
    jwk::{
        AlgorithmParameters, CommonParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm,
        OctetKeyPairParameters, OctetKeyPairType, PublicKeyUse,
    },
    Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// DER prefix of an Ed25519 SubjectPublicKeyInfo; the raw key follows it.
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Token type carried in the claims
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims shared by access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// User role
    pub role: Role,

    /// Tenant the user belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Uuid>,

    /// Token type (access or refresh)
    pub token_type: TokenType,

    /// Issuer
    pub iss: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// Persisted refresh token record id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid("subject is not a UUID".into()))
    }
}

/// Identity a token is minted for
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

/// Freshly issued access + refresh tokens
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_id: Uuid,
}

/// Token verification failures
///
/// The kinds stay distinct for logging; at the HTTP boundary they all become
/// `AppError::Unauthorized`.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token expired")]
    Expired,

    #[error("refresh token revoked")]
    Revoked,

    #[error(transparent)]
    Internal(#[from] AppError),
}

impl TokenError {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Invalid(_) => "invalid",
            TokenError::Expired => "expired",
            TokenError::Revoked => "revoked",
            TokenError::Internal(_) => "internal",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Internal(inner) => inner,
            other => {
                tracing::warn!(kind = other.kind(), error = %other, "Token rejected");
                metrics::counter!("auth_token_rejections_total", "kind" => other.kind())
                    .increment(1);
                AppError::Unauthorized
            }
        }
    }
}

/// One Ed25519 verification key
struct VerificationKey {
    kid: String,
    x: String,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    fn from_public_pem(pem: &str) -> Result<Self, AppError> {
        let raw = ed25519_public_key_from_pem(pem)?;
        let x = URL_SAFE_NO_PAD.encode(raw);
        let decoding_key = DecodingKey::from_ed_components(&x)
            .map_err(|e| AppError::Config(format!("Invalid Ed25519 public key: {}", e)))?;

        Ok(Self {
            kid: key_id(&raw),
            x,
            decoding_key,
        })
    }

    fn to_jwk(&self) -> Jwk {
        Jwk {
            common: CommonParameters {
                public_key_use: Some(PublicKeyUse::Signature),
                key_algorithm: Some(KeyAlgorithm::EdDSA),
                key_id: Some(self.kid.clone()),
                ..Default::default()
            },
            algorithm: AlgorithmParameters::OctetKeyPair(OctetKeyPairParameters {
                key_type: OctetKeyPairType::OctetKeyPair,
                curve: EllipticCurve::Ed25519,
                x: self.x.clone(),
            }),
        }
    }
}

/// Extract the raw 32-byte key from an Ed25519 SPKI PEM
fn ed25519_public_key_from_pem(pem: &str) -> Result<[u8; 32], AppError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    let der = STANDARD
        .decode(body)
        .map_err(|e| AppError::Config(format!("Public key is not valid PEM: {}", e)))?;

    if der.len() != ED25519_SPKI_PREFIX.len() + 32 || !der.starts_with(&ED25519_SPKI_PREFIX) {
        return Err(AppError::Config("Public key is not an Ed25519 key".to_string()));
    }

    let mut raw = [0u8; 32];
    raw.copy_from_slice(&der[ED25519_SPKI_PREFIX.len()..]);
    Ok(raw)
}

/// Key id: first 8 bytes of SHA-256 over the raw public key, hex encoded
fn key_id(raw: &[u8]) -> String {
    let digest = Sha256::digest(raw);
    hex::encode(&digest[..8])
}

/// Key material for [`JwtService`]
pub struct JwtKeys {
    /// Ed25519 private key, PKCS#8 PEM
    pub private_pem: String,
    /// Matching public key, SPKI PEM
    pub public_pem: String,
    /// Public keys of rotated-out signing keys, still accepted for verification
    pub previous_public_pems: Vec<String>,
    /// HS256 secret for refresh tokens
    pub refresh_secret: String,
}

/// JWT service
pub struct JwtService {
    issuer: String,
    signing_key: EncodingKey,
    signing_kid: String,
    verification_keys: Vec<VerificationKey>,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_token_exp_secs: u64,
    refresh_token_exp_secs: u64,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl JwtService {
    pub fn new(
        keys: JwtKeys,
        issuer: &str,
        access_token_exp_secs: u64,
        refresh_token_exp_secs: u64,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self, AppError> {
        if keys.refresh_secret.len() < 32 {
            return Err(AppError::Config(
                "Refresh token secret too short (min 32 chars)".to_string(),
            ));
        }

        let signing_key = EncodingKey::from_ed_pem(keys.private_pem.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid Ed25519 private key: {}", e)))?;

        let current = VerificationKey::from_public_pem(&keys.public_pem)?;
        let signing_kid = current.kid.clone();

        let mut verification_keys = vec![current];
        for pem in &keys.previous_public_pems {
            let key = VerificationKey::from_public_pem(pem)?;
            if verification_keys.iter().all(|k| k.kid != key.kid) {
                verification_keys.push(key);
            }
        }

        let service = Self {
            issuer: issuer.to_string(),
            signing_key,
            signing_kid,
            verification_keys,
            refresh_encoding_key: EncodingKey::from_secret(keys.refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(keys.refresh_secret.as_bytes()),
            access_token_exp_secs,
            refresh_token_exp_secs,
            refresh_tokens,
        };

        // 私钥与公钥必须成对，否则签出的令牌无法验证
        service.check_key_pair()?;

        tracing::info!(
            kid = %service.signing_kid,
            verification_keys = service.verification_keys.len(),
            "JWT service initialized"
        );

        Ok(service)
    }

    /// Create JWT service from config, reading PEM files from disk
    pub fn from_config(
        config: &AppConfig,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self, AppError> {
        let security = &config.security;

        let read = |path: &str| {
            std::fs::read_to_string(path)
                .map_err(|e| AppError::Config(format!("Failed to read key file {}: {}", path, e)))
        };

        let keys = JwtKeys {
            private_pem: read(&security.private_key_path)?,
            public_pem: read(&security.public_key_path)?,
            previous_public_pems: security
                .previous_public_key_paths
                .iter()
                .map(|p| read(p))
                .collect::<Result<_, _>>()?,
            refresh_secret: security.refresh_token_secret.expose_secret().clone(),
        };

        Self::new(
            keys,
            &security.issuer,
            security.access_token_exp_secs,
            security.refresh_token_exp_secs,
            refresh_tokens,
        )
    }

    fn check_key_pair(&self) -> Result<(), AppError> {
        let self_check = self
            .issue_access_token(&TokenSubject {
                user_id: Uuid::nil(),
                role: Role::Customer,
                tenant_id: None,
            })
            .map_err(AppError::from)?;

        self.verify_access_token(&self_check).map_err(|_| {
            AppError::Config("Private key does not match the configured public key".to_string())
        })?;

        Ok(())
    }

    pub fn access_token_exp_secs(&self) -> u64 {
        self.access_token_exp_secs
    }

    pub fn refresh_token_exp_secs(&self) -> u64 {
        self.refresh_token_exp_secs
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Generate access token
    pub fn issue_access_token(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.access_token_exp_secs as i64);

        let claims = Claims {
            sub: subject.user_id.to_string(),
            role: subject.role,
            tenant: subject.tenant_id,
            token_type: TokenType::Access,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: None,
        };

        self.sign_access_token(&claims)
    }

    /// Sign caller-supplied access claims with the current key
    pub fn sign_access_token(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.signing_kid.clone());

        encode(&header, claims, &self.signing_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            TokenError::Internal(AppError::Internal(format!(
                "Failed to encode access token: {}",
                e
            )))
        })
    }

    /// Generate refresh token and persist its revocation record
    pub async fn issue_refresh_token(
        &self,
        subject: &TokenSubject,
    ) -> Result<(String, Uuid), TokenError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.refresh_token_exp_secs as i64);
        let id = Uuid::new_v4();

        self.refresh_tokens
            .create(&RefreshTokenRecord {
                id,
                user_id: subject.user_id,
                expires_at: expiration,
                revoked_at: None,
                created_at: now,
            })
            .await?;

        let claims = Claims {
            sub: subject.user_id.to_string(),
            role: subject.role,
            tenant: subject.tenant_id,
            token_type: TokenType::Refresh,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Some(id.to_string()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding_key)
            .map_err(|e| {
                tracing::error!("Failed to encode refresh token: {:?}", e);
                TokenError::Internal(AppError::Internal(format!(
                    "Failed to encode refresh token: {}",
                    e
                )))
            })?;

        Ok((token, id))
    }

    /// Generate token pair
    pub async fn issue_token_pair(&self, subject: &TokenSubject) -> Result<TokenPair, TokenError> {
        let access_token = self.issue_access_token(subject)?;
        let (refresh_token, refresh_token_id) = self.issue_refresh_token(subject).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_token_id,
        })
    }

    /// Validate token of the expected type
    pub async fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        match expected {
            TokenType::Access => self.verify_access_token(token),
            TokenType::Refresh => self.verify_refresh_token(token).await,
        }
    }

    /// Validate access token: signature by a known key, expiry, issuer, type
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let header = decode_header(token)?;
        if header.alg != Algorithm::EdDSA {
            return Err(TokenError::Invalid(format!("unexpected alg {:?}", header.alg)));
        }

        let key = match header.kid.as_deref() {
            Some(kid) => self
                .verification_keys
                .iter()
                .find(|k| k.kid == kid)
                .ok_or_else(|| TokenError::Invalid(format!("unknown kid {}", kid)))?,
            None => &self.verification_keys[0],
        };

        let claims = decode::<Claims>(token, &key.decoding_key, &self.validation(Algorithm::EdDSA))?
            .claims;

        if claims.token_type != TokenType::Access {
            tracing::debug!("Token type mismatch: expected access, got {:?}", claims.token_type);
            return Err(TokenError::Invalid("not an access token".into()));
        }

        Ok(claims)
    }

    /// Validate refresh token, then confirm its persisted record is live
    pub async fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(
            token,
            &self.refresh_decoding_key,
            &self.validation(Algorithm::HS256),
        )?
        .claims;

        if claims.token_type != TokenType::Refresh {
            tracing::debug!("Token type mismatch: expected refresh, got {:?}", claims.token_type);
            return Err(TokenError::Invalid("not a refresh token".into()));
        }

        let id = claims
            .jti
            .as_deref()
            .and_then(|jti| Uuid::parse_str(jti).ok())
            .ok_or_else(|| TokenError::Invalid("refresh token without record id".into()))?;

        // 每次都读取持久化记录，不做缓存
        let record = self.refresh_tokens.find(id).await?.ok_or(TokenError::Revoked)?;

        if record.is_revoked() || record.user_id.to_string() != claims.sub {
            return Err(TokenError::Revoked);
        }

        if record.expires_at < Utc::now() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Revoke a refresh token record
    ///
    /// Returns `false` when the record was already revoked or does not exist.
    /// 并发轮换时只有一个请求能拿到 `true`
    pub async fn revoke(&self, refresh_token_id: Uuid) -> Result<bool, AppError> {
        let revoked = self.refresh_tokens.revoke(refresh_token_id).await?;
        tracing::debug!(%refresh_token_id, newly_revoked = revoked, "Refresh token revoked");
        Ok(revoked)
    }

    /// Revoke every live refresh token of a user
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.refresh_tokens.revoke_all_for_user(user_id).await
    }

    /// Delete expired refresh token records
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        self.refresh_tokens.delete_expired().await
    }

    /// Public verification keys, current first
    pub fn jwks(&self) -> JwkSet {
        JwkSet {
            keys: self.verification_keys.iter().map(VerificationKey::to_jwk).collect(),
        }
    }

    /// Key id of the current signing key
    pub fn signing_kid(&self) -> &str {
        &self.signing_kid
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);
        validation.leeway = 5;
        validation
    }
}
