use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::types::ExternalAccountId;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub email: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(account_id: String, name: String, email: Option<String>) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: account_id,
            name,
            email,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(claims: Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, &claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Authenticated identity as resolved by the auth provider. Carries only the
/// external account identity; the internal profile id is resolved later by
/// the pipeline.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub account_id: ExternalAccountId,
    pub name: String,
    pub email: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            account_id: ExternalAccountId(claims.sub),
            name: claims.name,
            email: claims.email,
        }
    }
}

/// Outcome of authentication resolution.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub allowed: bool,
    pub user: Option<AuthUser>,
}

impl AuthState {
    pub fn denied() -> Self {
        Self {
            allowed: false,
            user: None,
        }
    }

    pub fn allowed(user: AuthUser) -> Self {
        Self {
            allowed: true,
            user: Some(user),
        }
    }
}

/// Opaque identity-resolution collaborator consumed by the request pipeline.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn is_authenticated(&self, headers: &HeaderMap) -> AuthState;
}

/// Bearer-token JWT provider used in production.
pub struct JwtAuthProvider;

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn is_authenticated(&self, headers: &HeaderMap) -> AuthState {
        let token = match extract_jwt_from_headers(headers) {
            Ok(token) => token,
            Err(msg) => {
                tracing::debug!("Authentication failed: {}", msg);
                return AuthState::denied();
            }
        };

        match validate_jwt(&token) {
            Ok(claims) => AuthState::allowed(AuthUser::from(claims)),
            Err(msg) => {
                tracing::debug!("Authentication failed: {}", msg);
                AuthState::denied()
            }
        }
    }
}

/// Fixed-identity provider for tests and local development.
#[derive(Clone, Default)]
pub struct StaticAuthProvider {
    pub user: Option<AuthUser>,
}

impl StaticAuthProvider {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn for_account(account_id: &str, name: &str) -> Self {
        Self {
            user: Some(AuthUser {
                account_id: ExternalAccountId(account_id.to_string()),
                name: name.to_string(),
                email: None,
            }),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn is_authenticated(&self, _headers: &HeaderMap) -> AuthState {
        match &self.user {
            Some(user) => AuthState::allowed(user.clone()),
            None => AuthState::denied(),
        }
    }
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// Validate JWT token and extract claims
fn validate_jwt(token: &str) -> Result<Claims, String> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("Invalid JWT token: {}", e))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_resolves_configured_identity() {
        let provider = StaticAuthProvider::for_account("acct-1", "Alice");
        let state = provider.is_authenticated(&HeaderMap::new()).await;
        assert!(state.allowed);
        assert_eq!(state.user.unwrap().account_id.as_str(), "acct-1");

        let state = StaticAuthProvider::anonymous()
            .is_authenticated(&HeaderMap::new())
            .await;
        assert!(!state.allowed);
        assert!(state.user.is_none());
    }

    #[tokio::test]
    async fn jwt_provider_round_trips_a_minted_token() {
        let claims = Claims::new(
            "acct-9".to_string(),
            "Nina".to_string(),
            Some("nina@example.com".to_string()),
        );
        let token = generate_jwt(claims).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );

        let state = JwtAuthProvider.is_authenticated(&headers).await;
        assert!(state.allowed);
        let user = state.user.unwrap();
        assert_eq!(user.account_id.as_str(), "acct-9");
        assert_eq!(user.name, "Nina");
        assert_eq!(user.email.as_deref(), Some("nina@example.com"));
    }

    #[tokio::test]
    async fn jwt_provider_denies_missing_or_malformed_headers() {
        let provider = JwtAuthProvider;

        let state = provider.is_authenticated(&HeaderMap::new()).await;
        assert!(!state.allowed);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Token abc".parse().unwrap());
        let state = provider.is_authenticated(&headers).await;
        assert!(!state.allowed);
    }
}
