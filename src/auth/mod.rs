/*!
 * # Authentication and Authorization Module
 *
 * Bearer JWT validation for the coffee commerce API. Tokens carry a coarse
 * `role` (`USER` or `ADMIN`) plus an optional staff `sub_role` that only
 * counts for admins. Every access decision goes through [`policy::authorize`].
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
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

use crate::{config::AppConfig, errors::ServiceError};

pub mod policy;

pub use policy::{authorize, Action, Resource};

/// Coarse account role
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

/// Staff function of an admin account
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SubRole {
    It,
    Manager,
    Director,
    Sales,
    Warehouse,
}

impl SubRole {
    /// Sub-roles allowed to act on any order or customer
    pub const ELEVATED: [SubRole; 3] = [SubRole::It, SubRole::Manager, SubRole::Director];

    pub fn is_elevated(self) -> bool {
        Self::ELEVATED.contains(&self)
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_role: Option<SubRole>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub sub_role: Option<SubRole>,
}

impl AuthUser {
    /// The staff function that actually applies; `None` for non-admin accounts
    /// even when the token carries a sub-role.
    pub fn staff_role(&self) -> Option<SubRole> {
        match self.role {
            Role::Admin => self.sub_role,
            Role::User => None,
        }
    }

    pub fn has_staff_role(&self, role: SubRole) -> bool {
        self.staff_role() == Some(role)
    }

    pub fn is_elevated(&self) -> bool {
        self.staff_role().map_or(false, SubRole::is_elevated)
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            sub_role: claims.sub_role,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.auth_audience.clone(),
            config.auth_issuer.clone(),
            Duration::from_secs(config.jwt_expiration as u64),
        )
    }
}

/// Issues and validates access tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Mint an access token; credentials are verified elsewhere
    pub fn issue_token(
        &self,
        user_id: Uuid,
        role: Role,
        sub_role: Option<SubRole>,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id,
            role,
            sub_role,
            name,
            email,
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
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
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
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
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
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

/// Authentication middleware that validates the bearer token and stores the
/// resulting [`AuthUser`] in request extensions.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return ServiceError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            debug!(user_id = %user.user_id, role = %user.role, "authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    auth_service.validate_token(token).map(AuthUser::from)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "k3y-F0r-Unit-T3sts_qwertyuiopASDFGHJKLzxcvbnm_0192837465_abcdefghij_XYZ".into(),
            "coffee-commerce-api".into(),
            "coffee-commerce-auth".into(),
            Duration::from_secs(600),
        ))
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc
            .issue_token(
                user_id,
                Role::Admin,
                Some(SubRole::Warehouse),
                Some("Ada".into()),
                None,
            )
            .unwrap();

        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.sub_role, Some(SubRole::Warehouse));
    }

    #[test]
    fn token_with_wrong_audience_is_rejected() {
        let svc = service();
        let token = svc
            .issue_token(Uuid::new_v4(), Role::User, None, None, None)
            .unwrap();

        let mut other = service();
        other.config.jwt_audience = "someone-else".into();
        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn sub_role_only_counts_for_admins() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            name: None,
            email: None,
            role: Role::User,
            sub_role: Some(SubRole::Director),
        };
        assert_eq!(user.staff_role(), None);
        assert!(!user.is_elevated());

        let admin = AuthUser {
            role: Role::Admin,
            ..user
        };
        assert!(admin.is_elevated());
    }

    #[test]
    fn role_names_use_wire_format() {
        assert_eq!(SubRole::It.to_string(), "IT");
        assert_eq!("WAREHOUSE".parse::<SubRole>().unwrap(), SubRole::Warehouse);
        assert_eq!(
            serde_json::to_value(SubRole::Director).unwrap(),
            serde_json::json!("DIRECTOR")
        );
    }
}
