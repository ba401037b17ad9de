use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::{dto::PublicUser, jwt::extract_token_from_header};
use crate::{error::ServiceError, state::AppState};

pub const TOKEN_REQUIRED: &str = "Access token is required";
pub const AUTH_REQUIRED: &str = "Authentication required";

/// The verified caller, placed in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

// Owned so no borrow of the request is held across an await.
fn bearer(req: &Request) -> Option<String> {
    extract_token_from_header(
        req.headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok()),
    )
    .map(str::to_owned)
}

/// Rejects the request with 401 unless it carries a valid bearer token.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer(&req) else {
        debug!(path = %req.uri().path(), "missing bearer token");
        return ServiceError::Authentication(TOKEN_REQUIRED.into()).into_response();
    };

    match state.auth.verify_token(&token).await {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        // A token for a deleted user is still an authentication failure here.
        Err(ServiceError::NotFound(message)) => {
            ServiceError::Authentication(message).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Attaches the caller when the token checks out; never rejects.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(token) = bearer(&req) {
        match state.auth.verify_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(CurrentUser(user));
            }
            Err(e) => debug!(error = %e, "optional auth ignored token"),
        }
    }
    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Authentication(AUTH_REQUIRED.into()))
    }
}
