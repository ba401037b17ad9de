use axum::{middleware::from_fn_with_state, Router};

use crate::{auth::require_auth, state::AppState};

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Every transaction route requires a verified caller.
pub fn router(state: AppState) -> Router<AppState> {
    handlers::routes().route_layer(from_fn_with_state(state, require_auth))
}
