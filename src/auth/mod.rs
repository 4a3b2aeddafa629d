/*!
 * # Authentication and Authorization Module
 *
 * Bearer JWT validation and role gating for the workshop API. Tokens are
 * issued by the external sign-in service with claims
 * `{userId, email, role, name, iat, exp}`; this module only validates them
 * and mints tokens for operator tooling.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::errors::ServiceError;
use crate::tracing::RequestId;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Administrator)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            token_expiration,
        }
    }
}

/// Validates bearer tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Mints a token for `user`. Used by operator tooling and tests; interactive
    /// sign-in lives in the external issuer.
    pub fn generate_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            name: user.name.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Role not permitted for this endpoint")]
    InsufficientRole,

    #[error("Authentication service not available")]
    ServiceMissing,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth | AuthError::InvalidToken | AuthError::TokenExpired => {
                ServiceError::Unauthorized(err.to_string())
            }
            AuthError::InsufficientRole => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(_) | AuthError::ServiceMissing => {
                ServiceError::InternalError(err.to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication middleware that validates the bearer token and stores the
/// caller as an `AuthUser` extension.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => return AuthError::ServiceMissing.into_response(),
    };

    let user = match bearer_token(request.headers()) {
        Some(token) => auth_service.validate_token(token).map(AuthUser::from),
        None => Err(AuthError::MissingAuth),
    };

    match user {
        Ok(user) => {
            debug!(user_id = %user.user_id, role = %user.role, "authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects callers whose role is not in the allow-list.
pub async fn roles_middleware(
    State(allowed): State<Arc<[UserRole]>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !allowed.contains(&user.role) {
        return Err(AuthError::InsufficientRole);
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Who did something and from where; attached to every audit entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorContext {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

impl ActorContext {
    /// Context for batch jobs and the operator CLI.
    pub fn system(label: &str) -> Self {
        Self {
            name: Some(label.to_string()),
            request_id: crate::tracing::current_request_id().map(|r| r.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(UserRole::Administrator)
    }

    pub fn from_parts(parts: &Parts) -> Self {
        let user = parts.extensions.get::<AuthUser>();
        let ip_address = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| {
                parts
                    .headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            });

        Self {
            user_id: user.map(|u| u.user_id),
            email: user.map(|u| u.email.clone()),
            name: user.map(|u| u.name.clone()),
            role: user.map(|u| u.role),
            ip_address,
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            request_id: parts
                .extensions
                .get::<RequestId>()
                .map(|r| r.as_str().to_string()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if parts.extensions.get::<AuthUser>().is_none() {
            return Err(AuthError::MissingAuth);
        }
        Ok(Self::from_parts(parts))
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[UserRole]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[UserRole]) -> Self {
        let allowed: Arc<[UserRole]> = roles.into();
        self.layer(axum::middleware::from_fn_with_state(
            allowed,
            roles_middleware,
        ))
        .with_auth()
    }
}
