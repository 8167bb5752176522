//! Caller identity.
//!
//! Credentials are checked upstream (gateway or outer middleware), which
//! forwards the caller's user id in a configured header. `require_user`
//! trusts that header and exposes the id to handlers.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};

use super::response::ApiError;
use super::AppState;
use crate::models::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Reads a positive user id from `header`.
pub fn resolve_user(headers: &HeaderMap, header: &HeaderName) -> Option<UserId> {
    headers
        .get(header)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(UserId)
}

pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_user(request.headers(), &state.user_header).ok_or(ApiError::Unauthenticated)?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(ApiError::Unauthenticated)
    }
}
