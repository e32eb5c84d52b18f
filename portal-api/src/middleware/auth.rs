//! JWT Session Middleware
//!
//! Stateless bearer-token sessions. Login issues a token carrying the
//! username and role; this middleware validates it and stores a [`Session`]
//! in request extensions for handlers.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use portal_core::Role;

use crate::error::ErrorResponse;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HS256
    pub secret: String,
    /// Token lifetime in hours
    pub ttl_hours: i64,
}

/// Error type for JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfigError {
    pub message: String,
}

impl std::fmt::Display for JwtConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JWT config error: {}", self.message)
    }
}

impl std::error::Error for JwtConfigError {}

impl JwtConfig {
    /// Minimum secret length for security
    const MIN_SECRET_LENGTH: usize = 32;

    /// Create a new JWT config. Fails if the secret is shorter than 32 bytes.
    pub fn try_new(secret: impl Into<String>, ttl_hours: i64) -> Result<Self, JwtConfigError> {
        let secret = secret.into();
        if secret.len() < Self::MIN_SECRET_LENGTH {
            return Err(JwtConfigError {
                message: format!(
                    "JWT secret must be at least {} bytes. Got {} bytes. \
                    Use a cryptographically secure random secret.",
                    Self::MIN_SECRET_LENGTH,
                    secret.len()
                ),
            });
        }
        Ok(Self { secret, ttl_hours })
    }

    /// Test config that skips the secret length check
    #[cfg(test)]
    pub fn for_testing(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl_hours: 1,
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (username)
    pub sub: String,
    /// Role string
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
}

/// Authenticated caller, extracted from validated claims
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub role: Role,
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header
    MissingToken,
    /// Invalid token format
    InvalidTokenFormat,
    /// Token validation failed
    ValidationFailed(String),
    /// Token expired
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            AuthError::MissingToken => (
                "MISSING_TOKEN",
                "Authorization header is required".to_string(),
            ),
            AuthError::InvalidTokenFormat => (
                "INVALID_TOKEN_FORMAT",
                "Invalid authorization header format. Expected: Bearer <token>".to_string(),
            ),
            AuthError::ValidationFailed(msg) => ("TOKEN_VALIDATION_FAILED", msg),
            AuthError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired".to_string()),
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message,
            request_id: None,
            details: None,
        };

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Issue a token for an authenticated account
pub fn issue_token(config: &JwtConfig, username: &str, role: Role) -> Result<String, String> {
    let now = chrono::Utc::now();
    let claims = SessionClaims {
        sub: username.to_string(),
        role: role.as_role_str(),
        exp: (now + chrono::Duration::hours(config.ttl_hours)).timestamp() as u64,
        iat: now.timestamp() as u64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

/// Extract the bearer token from an Authorization header value
pub fn extract_token(auth_header: &str) -> Result<&str, AuthError> {
    auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidTokenFormat)
}

/// Validate a token and build the session it carries
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Session, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let key = DecodingKey::from_secret(config.secret.as_bytes());

    let data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| {
        if e.kind() == &jsonwebtoken::errors::ErrorKind::ExpiredSignature {
            AuthError::TokenExpired
        } else {
            AuthError::ValidationFailed(e.to_string())
        }
    })?;

    let role = Role::parse(&data.claims.role)
        .ok_or_else(|| AuthError::ValidationFailed(format!("unknown role: {}", data.claims.role)))?;

    Ok(Session {
        username: data.claims.sub,
        role,
    })
}

/// Authentication state for sharing config
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<JwtConfig>,
}

impl AuthState {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Require authentication middleware
///
/// Validates the bearer token and stores the session in request extensions.
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = extract_token(auth_header)?;
    let session = validate_token(token, &auth_state.config)?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::Country;

    #[test]
    fn test_extract_token() {
        assert!(extract_token("Bearer abc123").is_ok());
        assert!(extract_token("Basic abc123").is_err());
        assert!(extract_token("abc123").is_err());
    }

    #[test]
    fn test_issue_and_validate() {
        let config = JwtConfig::for_testing("test-secret-for-unit-testing-only");
        let token = issue_token(&config, "hans", Role::CountryUser(Country::De)).unwrap();
        let session = validate_token(&token, &config).unwrap();
        assert_eq!(session.username, "hans");
        assert_eq!(session.role, Role::CountryUser(Country::De));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtConfig::try_new("short", 12).is_err());
        assert!(JwtConfig::try_new("x".repeat(32), 12).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = JwtConfig::for_testing("test-secret-for-unit-testing-only");
        let other = JwtConfig::for_testing("a-completely-different-secret-here");
        let token = issue_token(&config, "alice", Role::User).unwrap();
        assert!(matches!(
            validate_token(&token, &other),
            Err(AuthError::ValidationFailed(_))
        ));
    }
}
