//! Dashboard statistics for workspaces and projects.

use axum::{
    extract::{Extension, Path as AxumPath, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::access::{load_project, load_workspace, require_member, store_error, ApiError};
use super::auth::AuthUser;
use super::routes::AppState;
use crate::board::TaskAnalytics;
use crate::store::TaskQuery;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workspaces/:id", get(workspace_analytics))
        .route("/projects/:id", get(project_analytics))
}

pub async fn workspace_analytics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<TaskAnalytics>, ApiError> {
    load_workspace(&state, id).await?;
    require_member(&state, id, &user).await?;
    let tasks = state
        .store
        .list_tasks(&TaskQuery::workspace(id))
        .await
        .map_err(store_error)?;
    Ok(Json(TaskAnalytics::from_tasks(&tasks, chrono::Utc::now())))
}

pub async fn project_analytics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<TaskAnalytics>, ApiError> {
    let project = load_project(&state, id).await?;
    require_member(&state, project.workspace_id, &user).await?;
    let tasks = state
        .store
        .list_tasks(&TaskQuery::project(id))
        .await
        .map_err(store_error)?;
    Ok(Json(TaskAnalytics::from_tasks(&tasks, chrono::Utc::now())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_state;
    use crate::board::{Member, MemberRole, NewTask, Project, TaskPriority, TaskStatus, Workspace};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_project_and_workspace_counts() {
        let state = test_state();
        let workspace = Workspace::new("Acme".to_string(), "alice".to_string(), None);
        let admin = Member::new(workspace.id, "alice".to_string(), MemberRole::Admin);
        state.store.insert_workspace(&workspace, &admin).await.unwrap();
        let web = Project::new(workspace.id, "Web".to_string(), None);
        let app = Project::new(workspace.id, "App".to_string(), None);
        state.store.insert_project(&web).await.unwrap();
        state.store.insert_project(&app).await.unwrap();

        for (project, status, due) in [
            (&web, TaskStatus::Todo, Some("2000-01-01")),
            (&web, TaskStatus::Done, Some("2000-01-01")),
            (&app, TaskStatus::InProgress, None),
        ] {
            state
                .mover
                .create_task(
                    workspace.id,
                    NewTask {
                        project_id: project.id,
                        content: "t".to_string(),
                        description: None,
                        status,
                        priority: TaskPriority::High,
                        assignee_id: Some("alice".to_string()),
                        due_date: due.map(str::to_string),
                    },
                )
                .await
                .unwrap();
        }

        let alice = AuthUser {
            id: "alice".to_string(),
            username: "alice".to_string(),
        };
        let Json(project_stats) = project_analytics(
            State(state.clone()),
            Extension(alice.clone()),
            AxumPath(web.id),
        )
        .await
        .unwrap();
        assert_eq!(project_stats.total, 2);
        assert_eq!(project_stats.overdue, 1);

        let Json(workspace_stats) = workspace_analytics(
            State(state.clone()),
            Extension(alice),
            AxumPath(workspace.id),
        )
        .await
        .unwrap();
        assert_eq!(workspace_stats.total, 3);
        assert_eq!(workspace_stats.by_priority[&TaskPriority::High], 3);
        assert_eq!(workspace_stats.by_assignee["alice"], 3);

        let denied = workspace_analytics(
            State(state.clone()),
            Extension(AuthUser {
                id: "bob".to_string(),
                username: "bob".to_string(),
            }),
            AxumPath(workspace.id),
        )
        .await;
        assert_eq!(denied.unwrap_err().0, StatusCode::FORBIDDEN);
    }
}
