use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

/// Name of the cookie carrying the access token.
pub const SESSION_COOKIE: &str = "portal_session";
/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "portal_refresh";

/// Claims
///
/// The payload structure expected inside a session JWT issued by the hosted auth
/// service. These claims are signed by the service's secret and validated on every
/// request the gate resolves.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): The UUID of the user. Primary key into `public.users`.
    pub sub: Uuid,
    /// The email the account was registered with, if the provider includes it.
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration Time (exp): Timestamp after which the JWT must not be accepted.
    pub exp: usize,
    /// Issued At (iat): Timestamp when the JWT was issued.
    pub iat: usize,
}

/// SessionCredential
///
/// The opaque transport-level credential attached to a request: the access token,
/// plus the refresh token when the client presented one. The gate never inspects
/// these strings itself; it hands them to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl SessionCredential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            refresh_token: None,
        }
    }

    /// Extracts the credential from request headers. The session cookie wins over
    /// the Authorization header so that a browser session cannot be shadowed by a
    /// stale header; the Bearer form is kept for non-browser API clients.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            let mut access = None;
            let mut refresh = None;
            for cookie in cookie_header.split(';') {
                let mut parts = cookie.trim().splitn(2, '=');
                match (parts.next(), parts.next()) {
                    (Some(SESSION_COOKIE), Some(v)) => access = Some(v.to_string()),
                    (Some(REFRESH_COOKIE), Some(v)) => refresh = Some(v.to_string()),
                    _ => {}
                }
            }
            if let Some(access_token) = access {
                return Some(Self {
                    access_token,
                    refresh_token: refresh,
                });
            }
        }

        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(Self::bearer)
    }
}

/// Identity
///
/// The principal resolved from a valid session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// SessionError
///
/// Failure modes of the refresh path. The gate treats every variant identically
/// (as "no valid session"); the variants exist so the cause can be logged.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no refresh token present")]
    NoRefreshToken,
    #[error("auth service rejected the refresh: {0}")]
    Rejected(String),
    #[error("auth service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// SessionResolver
///
/// Contract for the external session service. `resolve` yields the caller identity
/// behind a credential, or None when the credential is absent, expired, or forged.
/// `refresh` exchanges the credential for a fresh one; a refresh failure is never
/// fatal to the resolver itself — callers decide what denial it maps to.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, credential: &SessionCredential) -> Option<Identity>;
    async fn refresh(
        &self,
        credential: &SessionCredential,
    ) -> Result<SessionCredential, SessionError>;
}

/// The concrete type used to share the session layer across the application state.
pub type SessionState = std::sync::Arc<dyn SessionResolver>;

/// Shape of the token payload returned by the hosted auth service's token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

/// JwtSessionResolver
///
/// Production resolver. Resolution is a local HS256 validation of the access token
/// (no network round-trip per request); refresh is an exchange against the hosted
/// auth service's token endpoint, attempted only when the access token is within
/// `refresh_window` of expiry.
pub struct JwtSessionResolver {
    jwt_secret: String,
    auth_url: String,
    auth_api_key: String,
    refresh_window: std::time::Duration,
    http: reqwest::Client,
}

impl JwtSessionResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            auth_url: config.auth_url.clone(),
            auth_api_key: config.auth_api_key.clone(),
            refresh_window: config.refresh_window,
            http: reqwest::Client::new(),
        }
    }

    fn decode_claims(&self, token: &str) -> Option<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        // Expiration validation is always active; an expired token is "no session".
        validation.validate_exp = true;

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                match e.kind() {
                    // Expired tokens are the common case for returning browsers; keep
                    // the log quiet for them.
                    ErrorKind::ExpiredSignature => {
                        tracing::debug!("session token expired");
                    }
                    other => {
                        tracing::warn!(error = ?other, "session token rejected");
                    }
                }
                None
            }
        }
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn resolve(&self, credential: &SessionCredential) -> Option<Identity> {
        let claims = self.decode_claims(&credential.access_token)?;
        Some(Identity {
            id: claims.sub,
            email: claims.email,
        })
    }

    async fn refresh(
        &self,
        credential: &SessionCredential,
    ) -> Result<SessionCredential, SessionError> {
        // Only exchange tokens when the access token is close to expiry. Outside the
        // window the credential is returned unchanged, keeping the common request
        // path free of network calls. A still-valid token without a refresh token
        // (Bearer API clients) is also returned unchanged.
        if let Some(claims) = self.decode_claims(&credential.access_token) {
            let remaining = claims.exp as i64 - Utc::now().timestamp();
            if remaining > self.refresh_window.as_secs() as i64
                || credential.refresh_token.is_none()
            {
                return Ok(credential.clone());
            }
        }

        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(SessionError::NoRefreshToken)?;

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.auth_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.auth_api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SessionError::Rejected(response.status().to_string()));
        }

        let tokens = response.json::<TokenResponse>().await?;
        Ok(SessionCredential {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}
