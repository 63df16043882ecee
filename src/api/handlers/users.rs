//! Per-user endpoints. A user record is owned by the user itself.

use super::enforce;
use crate::{
    api::{AppState, error::ApiError, error::ErrorBody},
    auth::{Operation, Principal, decide},
    model::{Identity, Role},
};
use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<Identity> for UserResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            role: identity.role,
        }
    }
}

pub(crate) fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// Load a user record the principal may act on. Denials are reported as 404.
pub(crate) async fn load_user(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    operation: Operation,
) -> Result<Identity, ApiError> {
    enforce(decide(principal.user_id, principal.role, id, operation)).map_err(ApiError::conceal)?;
    state
        .stores
        .credentials
        .find_by_id(id)
        .await?
        .ok_or_else(user_not_found)
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses (
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[instrument(skip(state))]
pub async fn me(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserResponse>, ApiError> {
    let identity = load_user(&state, &principal, principal.user_id, Operation::Read).await?;
    Ok(Json(identity.into()))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses (
        (status = 200, description = "User record", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found or not accessible", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[instrument(skip(state))]
pub async fn get_user(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let identity = load_user(&state, &principal, id, Operation::Read).await?;
    Ok(Json(identity.into()))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses (
        (status = 204, description = "User and their tasks deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found or not accessible", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[instrument(skip(state))]
pub async fn delete_user(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    enforce(decide(principal.user_id, principal.role, id, Operation::Delete))
        .map_err(ApiError::conceal)?;

    if !state.stores.credentials.delete_by_id(id).await? {
        return Err(user_not_found());
    }
    info!(user_id = %id, deleted_by = %principal.user_id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}
