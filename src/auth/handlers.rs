use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest, SessionResponse, VerifyRequest},
        middleware::CurrentUser,
    },
    error::{respond, ApiResponse, ServiceError},
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/auth/session", get(session))
}

/// Malformed or mistyped JSON bodies get the envelope with a 400.
pub fn bad_body(rejection: JsonRejection) -> ServiceError {
    debug!(error = %rejection.body_text(), "rejected request body");
    ServiceError::Validation("Invalid JSON body".into())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(e) => return bad_body(e).into_response(),
    };
    let result = state.auth.register(&payload.email, &payload.password).await;
    respond(StatusCode::CREATED, result)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(e) => return bad_body(e).into_response(),
    };
    let result = state.auth.login(&payload.email, &payload.password).await;
    respond(StatusCode::OK, result)
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(e) => return bad_body(e).into_response(),
    };
    respond(StatusCode::OK, state.auth.verify_token(&payload.token).await)
}

#[instrument(skip_all, fields(user_id = user.0.id))]
pub async fn me(user: CurrentUser) -> Json<ApiResponse<PublicUser>> {
    Json(ApiResponse::ok(user.0))
}

#[instrument(skip_all)]
pub async fn session(current: Option<CurrentUser>) -> Json<ApiResponse<SessionResponse>> {
    let user = current.map(|CurrentUser(user)| user);
    Json(ApiResponse::ok(SessionResponse {
        authenticated: user.is_some(),
        user,
    }))
}
