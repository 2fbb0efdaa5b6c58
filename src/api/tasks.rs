//! Task API endpoints, including drag-and-drop moves.

use axum::{
    extract::{Extension, Path as AxumPath, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::access::{
    load_project, load_task, move_error, require_member, require_non_empty, store_error, ApiError,
};
use super::auth::AuthUser;
use super::routes::AppState;
use super::types::TaskListQuery;
use crate::board::{MoveRequest, NewTask, Task, TaskPatch};
use crate::store::TaskQuery;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).patch(update_task).delete(delete_task))
        .route("/:id/move", post(move_task))
}

/// GET /api/tasks?project_id=&status= - Tasks of a project in board order.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let project = load_project(&state, query.project_id).await?;
    require_member(&state, project.workspace_id, &user).await?;

    let filter = TaskQuery {
        status: query.status,
        ..TaskQuery::project(project.id)
    };
    let tasks = state.store.list_tasks(&filter).await.map_err(store_error)?;
    Ok(Json(tasks))
}

/// POST /api/tasks - Create a task at the end of its column.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(new): Json<NewTask>,
) -> Result<Json<Task>, ApiError> {
    require_non_empty("Content", &new.content)?;
    let project = load_project(&state, new.project_id).await?;
    require_member(&state, project.workspace_id, &user).await?;

    let task = state
        .mover
        .create_task(project.workspace_id, new)
        .await
        .map_err(move_error)?;
    Ok(Json(task))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let task = load_task(&state, id).await?;
    require_member(&state, task.workspace_id, &user).await?;
    Ok(Json(task))
}

/// PATCH /api/tasks/:id - Update fields. A new status without a position
/// appends the task to the new column.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let task = load_task(&state, id).await?;
    require_member(&state, task.workspace_id, &user).await?;
    if let Some(content) = &patch.content {
        require_non_empty("Content", content)?;
    }
    if let Some(position) = patch.position {
        if !position.is_finite() {
            return Err((
                StatusCode::BAD_REQUEST,
                "Position must be a finite number".to_string(),
            ));
        }
    }

    let task = state
        .mover
        .update_task(id, patch)
        .await
        .map_err(move_error)?;
    Ok(Json(task))
}

/// POST /api/tasks/:id/move - Drop a task into a column between two neighbours.
pub async fn move_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<Task>, ApiError> {
    let task = load_task(&state, id).await?;
    require_member(&state, task.workspace_id, &user).await?;

    let moved = state
        .mover
        .move_task(id, &request)
        .await
        .map_err(move_error)?;
    Ok(Json(moved))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<(StatusCode, String), ApiError> {
    let task = load_task(&state, id).await?;
    require_member(&state, task.workspace_id, &user).await?;

    if state.store.delete_task(id).await.map_err(store_error)? {
        tracing::info!("Deleted task {}", id);
        Ok((StatusCode::OK, format!("Task {} deleted successfully", id)))
    } else {
        Err((StatusCode::NOT_FOUND, format!("Task {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_state;
    use crate::board::{Member, MemberRole, Project, TaskPriority, TaskStatus, Workspace};

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            username: id.to_string(),
        }
    }

    async fn board(state: &Arc<AppState>) -> Project {
        let workspace = Workspace::new("Acme".to_string(), "alice".to_string(), None);
        let admin = Member::new(workspace.id, "alice".to_string(), MemberRole::Admin);
        state.store.insert_workspace(&workspace, &admin).await.unwrap();
        let project = Project::new(workspace.id, "Launch".to_string(), None);
        state.store.insert_project(&project).await.unwrap();
        project
    }

    async fn create(state: &Arc<AppState>, project: &Project, content: &str) -> Task {
        let Json(task) = create_task(
            State(state.clone()),
            Extension(user("alice")),
            Json(NewTask {
                project_id: project.id,
                content: content.to_string(),
                description: None,
                status: TaskStatus::Todo,
                priority: TaskPriority::Medium,
                assignee_id: None,
                due_date: None,
            }),
        )
        .await
        .unwrap();
        task
    }

    #[tokio::test]
    async fn test_create_list_and_move() {
        let state = test_state();
        let project = board(&state).await;
        let a = create(&state, &project, "A").await;
        let b = create(&state, &project, "B").await;
        let c = create(&state, &project, "C").await;
        assert_eq!(
            (a.position, b.position, c.position),
            (1000.0, 2000.0, 3000.0)
        );

        let Json(moved) = move_task(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(c.id),
            Json(MoveRequest {
                status: TaskStatus::Todo,
                prev_task_id: Some(a.id),
                next_task_id: Some(b.id),
            }),
        )
        .await
        .unwrap();
        assert_eq!(moved.position, 1500.0);

        let Json(listed) = list_tasks(
            State(state.clone()),
            Extension(user("alice")),
            Query(TaskListQuery {
                project_id: project.id,
                status: Some(TaskStatus::Todo),
            }),
        )
        .await
        .unwrap();
        let contents: Vec<&str> = listed.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn test_non_members_are_rejected() {
        let state = test_state();
        let project = board(&state).await;
        let a = create(&state, &project, "A").await;

        let denied = move_task(
            State(state.clone()),
            Extension(user("mallory")),
            AxumPath(a.id),
            Json(MoveRequest {
                status: TaskStatus::Done,
                prev_task_id: None,
                next_task_id: None,
            }),
        )
        .await;
        assert_eq!(denied.unwrap_err().0, StatusCode::FORBIDDEN);

        let stored = state.store.get_task(a.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let state = test_state();
        let result = move_task(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(Uuid::new_v4()),
            Json(MoveRequest {
                status: TaskStatus::Done,
                prev_task_id: None,
                next_task_id: None,
            }),
        )
        .await;
        assert_eq!(result.unwrap_err().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_status_appends_and_validates_content() {
        let state = test_state();
        let project = board(&state).await;
        let a = create(&state, &project, "A").await;

        let empty = update_task(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(a.id),
            Json(TaskPatch {
                content: Some(" ".to_string()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(empty.unwrap_err().0, StatusCode::BAD_REQUEST);

        let Json(done) = update_task(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(a.id),
            Json(TaskPatch {
                status: Some(TaskStatus::Done),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(done.position, 1000.0);

        let (status, _) = delete_task(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(a.id),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
    }
}
