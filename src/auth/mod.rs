use axum::{middleware::from_fn_with_state, Router};

use crate::state::AppState;

mod claims;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use middleware::{optional_auth, require_auth, CurrentUser};

/// Auth routes; `/auth/me` requires a token, `/auth/session` merely looks for one.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(
            handlers::protected_routes()
                .route_layer(from_fn_with_state(state.clone(), require_auth)),
        )
        .merge(
            handlers::session_routes()
                .route_layer(from_fn_with_state(state, optional_auth)),
        )
}
