use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ApiError, AppState};
use crate::entities::users;
use crate::gate::Role;

/// The authenticated caller, placed in request extensions by [`identify`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub users::Model);

impl CurrentUser {
    #[must_use]
    pub fn role(&self) -> Role {
        Role::from_stored(&self.0.role)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// Resolve the caller from its API key, if any.
///
/// Checks `X-Api-Key` first, then `Authorization: Bearer <api_key>`.
/// Unknown keys leave the request anonymous; rejection is left to
/// [`require_user`] and [`require_admin`].
pub async fn identify(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(key) = extract_api_key(request.headers()) {
        match state.store().verify_api_key(&key).await {
            Ok(Some(user)) => {
                tracing::Span::current().record("user_id", user.username.as_str());
                request.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => debug!("Request with unknown API key"),
            Err(e) => warn!(error = %e, "Failed to verify API key"),
        }
    }

    next.run(request).await
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

pub async fn require_user(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<CurrentUser>().is_none() {
        return Err(ApiError::Unauthorized(
            "Authentication required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let Some(user) = request.extensions().get::<CurrentUser>() else {
        return Err(ApiError::Unauthorized(
            "Authentication required".to_string(),
        ));
    };

    if !user.role().satisfies(Role::Admin) {
        return Err(ApiError::forbidden("Administrator role required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_api_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("abc123"));

        headers.insert("X-Api-Key", HeaderValue::from_static("xyz"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_api_key(&headers), None);
    }
}
