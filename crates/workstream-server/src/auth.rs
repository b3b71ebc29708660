//! Bearer token resolution.
//!
//! Tokens are opaque strings mapped to a [`UserIdentity`] by a
//! [`TokenResolver`]. The HTTP layer reads them from the `Authorization`
//! header through [`AuthenticatedUser`], or from the path on the stream
//! connect route.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use workstream_api::ApiError;
use workstream_core::UserIdentity;

/// Maps a presented token to the identity it authenticates.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<UserIdentity>;
}

/// Fixed token table, loaded from `auth.tokens`.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, UserIdentity>,
}

impl StaticTokenResolver {
    pub fn new(tokens: &HashMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|(token, username)| (token.clone(), UserIdentity::from(username.as_str())))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Option<UserIdentity> {
        self.tokens.get(token).cloned()
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<dyn TokenResolver>,
}

impl AuthState {
    pub fn new(resolver: Arc<dyn TokenResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve `token`, rejecting unknown ones with 401.
    pub async fn authenticate(&self, token: &str) -> Result<UserIdentity, ApiError> {
        if token.is_empty() {
            return Err(ApiError::unauthorized("Empty token"));
        }
        self.resolver.resolve(token).await.ok_or_else(|| {
            tracing::debug!("Rejected unknown token");
            ApiError::unauthorized("Unknown token")
        })
    }
}

/// Axum extractor yielding the identity behind `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserIdentity);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        auth_state.authenticate(token).await.map(AuthenticatedUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn state() -> AuthState {
        let tokens = HashMap::from([("tok-alice".to_string(), "alice".to_string())]);
        AuthState::new(Arc::new(StaticTokenResolver::new(&tokens)))
    }

    async fn extract(header: Option<&str>) -> Result<AuthenticatedUser, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedUser::from_request_parts(&mut parts, &state()).await
    }

    #[tokio::test]
    async fn bearer_token_resolves_to_identity() {
        let AuthenticatedUser(identity) = extract(Some("Bearer tok-alice")).await.unwrap();
        assert_eq!(identity.as_str(), "alice");
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_unauthorized() {
        for header in [None, Some("Bearer nope"), Some("Basic tok-alice"), Some("Bearer ")] {
            let err = extract(header).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }
}
