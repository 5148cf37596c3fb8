//! Session/identity adapter.
//!
//! Resolves the caller of a request from a hosted-auth access token:
//! - token taken from `Authorization: Bearer` or the `sb-access-token` cookie
//! - verified locally (HS256, shared JWT secret) or, without a secret, by
//!   asking the hosted auth service who the token belongs to
//! - joined with the caller's profile row, created on first sign-in

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::roles::Role;
use crate::config::schema::SupabaseConfig;
use crate::db::{repo, DataStore, DbError};

/// Cookie carrying the access token set by the dashboard.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie carrying the refresh token set by the dashboard.
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
/// Audience claim of user tokens issued by the hosted auth service.
pub const TOKEN_AUDIENCE: &str = "authenticated";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session token")]
    MissingToken,

    #[error("session expired")]
    Expired,

    #[error("invalid session token: {0}")]
    InvalidToken(String),

    #[error("auth service error: {0}")]
    Upstream(String),

    #[error("session verification is not configured")]
    NotConfigured,

    #[error(transparent)]
    Database(#[from] DbError),
}

/// Claims read from a hosted-auth access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
    #[serde(default)]
    pub aud: Option<String>,
}

/// The resolved caller of a request.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    /// Role used for gating.
    pub role: Role,
    /// Role literal exactly as stored on the profile.
    pub raw_role: String,
    pub organization_id: Option<String>,
    #[serde(skip)]
    pub access_token: String,
}

/// Hosted auth REST API (`/auth/v1`).
#[derive(Clone)]
pub struct HostedAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct HostedUser {
    id: String,
    email: Option<String>,
}

impl HostedAuth {
    pub fn new(project_url: &str, anon_key: String, timeout: Duration) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Upstream(e.to_string()))?;
        Ok(Self {
            http,
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key,
        })
    }

    /// Look up the user owning `token`.
    async fn user(&self, token: &str) -> Result<(String, Option<String>), SessionError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionError::Upstream(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let user: HostedUser = response
                    .json()
                    .await
                    .map_err(|e| SessionError::Upstream(e.to_string()))?;
                Ok((user.id, user.email))
            }
            401 | 403 => Err(SessionError::InvalidToken("rejected by auth service".into())),
            status => Err(SessionError::Upstream(format!("auth service returned {}", status))),
        }
    }

    /// Revoke the session behind `token`.
    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionError::Upstream(e.to_string()))?;

        if response.status().is_success() || response.status().as_u16() == 401 {
            Ok(())
        } else {
            Err(SessionError::Upstream(format!("logout returned {}", response.status())))
        }
    }
}

/// How access tokens are verified.
pub enum TokenVerifier {
    /// Verify the signature locally with the shared JWT secret.
    Jwt { key: DecodingKey, validation: Validation },
    /// Ask the hosted auth service.
    Remote(HostedAuth),
    /// Nothing configured; every token is rejected.
    Unconfigured,
}

impl TokenVerifier {
    pub fn jwt(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        TokenVerifier::Jwt {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    async fn verify(&self, token: &str) -> Result<(String, Option<String>), SessionError> {
        match self {
            TokenVerifier::Jwt { key, validation } => {
                let data = decode::<Claims>(token, key, validation).map_err(|e| match e.kind() {
                    ErrorKind::ExpiredSignature => SessionError::Expired,
                    _ => SessionError::InvalidToken(e.to_string()),
                })?;
                Ok((data.claims.sub, data.claims.email))
            }
            TokenVerifier::Remote(auth) => auth.user(token).await,
            TokenVerifier::Unconfigured => Err(SessionError::NotConfigured),
        }
    }
}

/// Resolves identities for protected routes.
pub struct SessionAdapter {
    verifier: TokenVerifier,
    hosted: Option<HostedAuth>,
    store: Arc<dyn DataStore>,
}

impl SessionAdapter {
    pub fn new(verifier: TokenVerifier, hosted: Option<HostedAuth>, store: Arc<dyn DataStore>) -> Self {
        Self { verifier, hosted, store }
    }

    /// Build from configuration: local JWT verification when a secret is set,
    /// otherwise remote lookup when the hosted auth service is configured.
    pub fn from_config(config: &SupabaseConfig, store: Arc<dyn DataStore>, timeout: Duration) -> Result<Self, SessionError> {
        let hosted = match (&config.url, &config.anon_key) {
            (Some(url), Some(anon)) => Some(HostedAuth::new(url, anon.clone(), timeout)?),
            _ => None,
        };

        let verifier = match (&config.jwt_secret, &hosted) {
            (Some(secret), _) => TokenVerifier::jwt(secret),
            (None, Some(auth)) => TokenVerifier::Remote(auth.clone()),
            (None, None) => {
                tracing::warn!("No JWT secret or hosted auth configured; all sessions will be rejected");
                TokenVerifier::Unconfigured
            }
        };

        Ok(Self::new(verifier, hosted, store))
    }

    pub fn hosted(&self) -> Option<&HostedAuth> {
        self.hosted.as_ref()
    }

    /// Resolve a verified token into an identity.
    pub async fn resolve(&self, token: &str) -> Result<Identity, SessionError> {
        let (id, email) = self.verifier.verify(token).await?;
        let profile = repo::ensure_profile(self.store.as_ref(), &id, email.as_deref()).await?;

        let role = match profile.role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "Unrecognized stored role; treating as user");
                Role::User
            }
        };

        Ok(Identity {
            id,
            email: email.or(profile.email),
            role,
            raw_role: profile.role,
            organization_id: profile.organization_id,
            access_token: token.to_string(),
        })
    }
}

/// Extract the access token from the Authorization header or the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    cookie_value(headers, ACCESS_TOKEN_COOKIE)
}

/// Value of the named cookie, if present.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, exp_offset: i64) -> String {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        let claims = Claims {
            sub: sub.into(),
            email: Some(format!("{}@example.com", sub)),
            exp: (now + exp_offset) as u64,
            aud: Some(TOKEN_AUDIENCE.into()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn adapter(store: Arc<MemoryStore>) -> SessionAdapter {
        SessionAdapter::new(TokenVerifier::jwt(SECRET), None, store)
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(token_from_headers(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; sb-access-token=abc; other=1"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_resolve_creates_profile() {
        let store = Arc::new(MemoryStore::new());
        let identity = adapter(store.clone()).resolve(&token("u1", 3600)).await.unwrap();

        assert_eq!(identity.id, "u1");
        assert_eq!(identity.role, Role::User);
        assert_eq!(identity.email.as_deref(), Some("u1@example.com"));
        assert!(identity.organization_id.is_none());
        assert_eq!(store.count(crate::db::models::PROFILES), 1);
    }

    #[tokio::test]
    async fn test_resolve_reads_stored_role() {
        let store = Arc::new(MemoryStore::new());
        repo::ensure_profile(store.as_ref(), "u1", None).await.unwrap();
        repo::update_role(store.as_ref(), "u1", "global_admin").await.unwrap();

        let identity = adapter(store).resolve(&token("u1", 3600)).await.unwrap();
        assert_eq!(identity.role, Role::GlobalAdmin);
        assert_eq!(identity.raw_role, "global_admin");
    }

    #[tokio::test]
    async fn test_rejects_bad_tokens() {
        let store = Arc::new(MemoryStore::new());
        let adapter = adapter(store.clone());

        assert!(matches!(adapter.resolve(&token("u1", -3600)).await, Err(SessionError::Expired)));
        assert!(matches!(adapter.resolve("garbage").await, Err(SessionError::InvalidToken(_))));

        let other = SessionAdapter::new(TokenVerifier::jwt("different"), None, store.clone());
        assert!(matches!(other.resolve(&token("u1", 3600)).await, Err(SessionError::InvalidToken(_))));

        let none = SessionAdapter::new(TokenVerifier::Unconfigured, None, store.clone());
        assert!(matches!(none.resolve(&token("u1", 3600)).await, Err(SessionError::NotConfigured)));

        assert_eq!(store.count(crate::db::models::PROFILES), 0);
    }
}
