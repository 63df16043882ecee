//! Administrator endpoints. These reveal nothing about a particular resource,
//! so a non-admin caller gets 403.

use super::{
    enforce, require_admin,
    tasks::{TaskResponse, into_responses},
    users::{UserResponse, user_not_found},
};
use crate::{
    api::{AppState, error::ApiError, error::ErrorBody},
    auth::{Principal, can_assign_roles},
    model::Role,
};
use axum::{
    Json,
    extract::{Extension, Path},
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses (
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Administrator role required", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn list_users(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&principal)?;
    let users = state.stores.credentials.find_all().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/assign-role/{role}",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("role" = String, Path, description = "USER or ADMIN, case-insensitive"),
    ),
    responses (
        (status = 200, description = "User with the new role", body = UserResponse),
        (status = 400, description = "Unknown role", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Administrator role required", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn assign_role(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((id, role)): Path<(Uuid, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    enforce(can_assign_roles(&principal))?;
    let role: Role = role.parse()?;

    let mut identity = state
        .stores
        .credentials
        .find_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;

    if identity.role != role {
        identity.role = role;
        if !state.stores.credentials.save(&identity).await? {
            return Err(user_not_found());
        }
        info!(user_id = %id, %role, assigned_by = %principal.user_id, "role assigned");
    }

    Ok(Json(identity.into()))
}

#[utoipa::path(
    get,
    path = "/api/admin/tasks",
    responses (
        (status = 200, description = "All tasks", body = [TaskResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Administrator role required", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn list_tasks(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    require_admin(&principal)?;
    let tasks = state.stores.tasks.find_all().await?;
    Ok(Json(into_responses(tasks)))
}
