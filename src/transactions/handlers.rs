use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::instrument;

use super::dto::DeletedTransaction;
use crate::{
    auth::{handlers::bad_body, CurrentUser},
    error::{invalid, respond, ServiceError},
    state::AppState,
    validation::validate_transaction_id,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/summary", get(get_summary))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

fn path_id(raw: &str) -> Result<i64, ServiceError> {
    validate_transaction_id(&Value::String(raw.to_string())).map_err(invalid)
}

fn body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ServiceError> {
    payload.map(|Json(v)| v).map_err(bad_body)
}

#[instrument(skip(state, user, params), fields(user_id = user.0.id))]
pub async fn list_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    let result = state
        .transactions
        .get_transactions(user.0.id, &Value::Object(query))
        .await;
    respond(StatusCode::OK, result)
}

#[instrument(skip(state, user), fields(user_id = user.0.id))]
pub async fn get_transaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Response {
    let id = match path_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    respond(
        StatusCode::OK,
        state.transactions.get_transaction(id, user.0.id).await,
    )
}

#[instrument(skip(state, user, payload), fields(user_id = user.0.id))]
pub async fn create_transaction(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let input = match body(payload) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    let created = state.transactions.create_transaction(user.0.id, &input).await;
    let location = created
        .as_ref()
        .ok()
        .and_then(|tx| HeaderValue::from_str(&format!("/api/v1/transactions/{}", tx.id)).ok());

    let mut response = respond(StatusCode::CREATED, created);
    if let Some(location) = location {
        response.headers_mut().insert(LOCATION, location);
    }
    response
}

#[instrument(skip(state, user, payload), fields(user_id = user.0.id))]
pub async fn update_transaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (id, input) = match (path_id(&id), body(payload)) {
        (Ok(id), Ok(input)) => (id, input),
        (Err(e), _) | (_, Err(e)) => return e.into_response(),
    };
    respond(
        StatusCode::OK,
        state
            .transactions
            .update_transaction(id, user.0.id, &input)
            .await,
    )
}

#[instrument(skip(state, user), fields(user_id = user.0.id))]
pub async fn delete_transaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Response {
    let id = match path_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let result = state
        .transactions
        .delete_transaction(id, user.0.id)
        .await
        .map(|()| DeletedTransaction {
            id,
            message: "Transaction deleted successfully",
        });
    respond(StatusCode::OK, result)
}

#[instrument(skip(state, user), fields(user_id = user.0.id))]
pub async fn get_summary(State(state): State<AppState>, user: CurrentUser) -> Response {
    respond(StatusCode::OK, state.transactions.get_summary(user.0.id).await)
}
