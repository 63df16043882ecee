//! Task endpoints. Every task route is owner-or-admin.

use super::{FieldErrors, enforce, missing_payload, users::user_not_found};
use crate::{
    api::{AppState, error::ApiError, error::ErrorBody},
    auth::{Operation, Principal, authorize, decide},
    model::{NewTask, Priority, Task, TaskChanges},
};
use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const TITLE_MIN_LEN: usize = 2;
const TITLE_MAX_LEN: usize = 100;
const DESCRIPTION_MAX_LEN: usize = 500;

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct TaskRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// RFC 3339; must not be in the past.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskRequest {
    fn validate(&self, now: DateTime<Utc>) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        errors.check(!title.is_empty(), "title", "Title is required");
        errors.check(
            (TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&title.chars().count()),
            "title",
            "Title must be between 2 and 100 characters",
        );
        if let Some(description) = &self.description {
            errors.check(
                description.chars().count() <= DESCRIPTION_MAX_LEN,
                "description",
                "Description cannot exceed 500 characters",
            );
        }
        if let Some(due_date) = self.due_date {
            errors.check(
                due_date >= now,
                "due_date",
                "Due date must be in the present or future",
            );
        }

        errors.into_result()
    }

    fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title.trim().to_string(),
            description: self.description,
            completed: self.completed,
            priority: self.priority,
            due_date: self.due_date,
        }
    }

    fn into_changes(self) -> TaskChanges {
        TaskChanges {
            title: self.title.trim().to_string(),
            description: self.description,
            completed: self.completed,
            priority: self.priority,
            due_date: self.due_date,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TaskResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            owner_id: task.owner_id,
            title: task.title,
            description: task.description,
            completed: task.completed,
            priority: task.priority,
            due_date: task.due_date,
            created_at: task.created_at,
        }
    }
}

pub(crate) fn into_responses(tasks: Vec<Task>) -> Vec<TaskResponse> {
    tasks.into_iter().map(TaskResponse::from).collect()
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

/// Load a task and check the policy. Callers conceal the denial.
async fn load_task(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    operation: Operation,
) -> Result<Task, ApiError> {
    let task = state
        .stores
        .tasks
        .find_by_id(id)
        .await?
        .ok_or_else(task_not_found)?;
    enforce(authorize(principal, &task, operation))?;
    Ok(task)
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = TaskRequest,
    responses (
        (status = 201, description = "Task created for the caller", body = TaskResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "tasks"
)]
#[instrument(skip(state))]
pub async fn create_task(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Option<Json<TaskRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };
    let now = Utc::now();
    request.validate(now)?;

    let task = Task::create(principal.user_id, request.into_new_task(), now);
    state.stores.tasks.insert(&task).await?;
    info!(task_id = %task.id, owner_id = %task.owner_id, "task created");

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses (
        (status = 200, description = "Task", body = TaskResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Task not found or not accessible", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "tasks"
)]
#[instrument(skip(state))]
pub async fn get_task(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = load_task(&state, &principal, id, Operation::Read)
        .await
        .map_err(ApiError::conceal)?;
    Ok(Json(task.into()))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskRequest,
    responses (
        (status = 200, description = "Updated task", body = TaskResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Task not found or not accessible", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "tasks"
)]
#[instrument(skip(state))]
pub async fn update_task(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TaskRequest>>,
) -> Result<Json<TaskResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };
    request.validate(Utc::now())?;

    let mut task = load_task(&state, &principal, id, Operation::Write)
        .await
        .map_err(ApiError::conceal)?;
    task.apply(request.into_changes());

    if !state.stores.tasks.save(&task).await? {
        return Err(task_not_found());
    }
    Ok(Json(task.into()))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses (
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Task not found or not accessible", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "tasks"
)]
#[instrument(skip(state))]
pub async fn delete_task(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state, &principal, id, Operation::Delete)
        .await
        .map_err(ApiError::conceal)?;

    if !state.stores.tasks.delete_by_id(task.id).await? {
        return Err(task_not_found());
    }
    info!(task_id = %task.id, deleted_by = %principal.user_id, "task deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/tasks/user/my-tasks",
    responses (
        (status = 200, description = "Tasks owned by the caller", body = [TaskResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "tasks"
)]
#[instrument(skip(state))]
pub async fn my_tasks(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state
        .stores
        .tasks
        .find_by_owner_id(principal.user_id)
        .await?;
    Ok(Json(into_responses(tasks)))
}

#[utoipa::path(
    get,
    path = "/api/tasks/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Owner id")),
    responses (
        (status = 200, description = "Tasks owned by the user", body = [TaskResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found or not accessible", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "tasks"
)]
#[instrument(skip(state))]
pub async fn user_tasks(
    state: Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    enforce(decide(principal.user_id, principal.role, user_id, Operation::Read))
        .map_err(ApiError::conceal)?;

    if state.stores.credentials.find_by_id(user_id).await?.is_none() {
        return Err(user_not_found());
    }
    let tasks = state.stores.tasks.find_by_owner_id(user_id).await?;
    Ok(Json(into_responses(tasks)))
}
