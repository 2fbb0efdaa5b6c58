//! Membership checks and error mapping shared by the board handlers.

use axum::http::StatusCode;
use uuid::Uuid;

use super::auth::AuthUser;
use super::routes::AppState;
use crate::board::{Member, MoveError, Project, Task, Workspace};
use crate::store::StoreError;

pub type ApiError = (StatusCode, String);

pub fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
        StoreError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        StoreError::Backend(msg) => {
            tracing::error!("Storage error: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

pub fn move_error(e: MoveError) -> ApiError {
    match e {
        MoveError::TaskNotFound(id) => (StatusCode::NOT_FOUND, format!("Task {} not found", id)),
        MoveError::Store(e) => store_error(e),
        MoveError::Rebalance { .. } => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn forbidden() -> ApiError {
    (StatusCode::FORBIDDEN, "Unauthorized".to_string())
}

pub async fn load_workspace(state: &AppState, id: Uuid) -> Result<Workspace, ApiError> {
    state
        .store
        .get_workspace(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Workspace {} not found", id)))
}

pub async fn load_project(state: &AppState, id: Uuid) -> Result<Project, ApiError> {
    state
        .store
        .get_project(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Project {} not found", id)))
}

pub async fn load_task(state: &AppState, id: Uuid) -> Result<Task, ApiError> {
    state
        .store
        .get_task(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Task {} not found", id)))
}

/// The caller's membership in `workspace_id`, or 403.
pub async fn require_member(
    state: &AppState,
    workspace_id: Uuid,
    user: &AuthUser,
) -> Result<Member, ApiError> {
    state
        .store
        .get_member(workspace_id, &user.id)
        .await
        .map_err(store_error)?
        .ok_or_else(forbidden)
}

pub async fn require_admin(
    state: &AppState,
    workspace_id: Uuid,
    user: &AuthUser,
) -> Result<Member, ApiError> {
    let member = require_member(state, workspace_id, user).await?;
    if member.is_admin() {
        Ok(member)
    } else {
        Err(forbidden())
    }
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} cannot be empty", field),
        ));
    }
    Ok(())
}
