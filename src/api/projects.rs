//! Project API endpoints.

use axum::{
    extract::{Extension, Path as AxumPath, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::access::{
    load_project, load_workspace, require_admin, require_member, require_non_empty, store_error,
    ApiError,
};
use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{CreateProjectRequest, ProjectListQuery};
use crate::board::{Project, ProjectPatch};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
}

/// GET /api/projects?workspace_id= - Projects of a workspace.
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    require_member(&state, query.workspace_id, &user).await?;
    let projects = state
        .store
        .list_projects(query.workspace_id)
        .await
        .map_err(store_error)?;
    Ok(Json(projects))
}

/// POST /api/projects - Create a project in a workspace the caller belongs to.
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    require_non_empty("Name", &req.name)?;
    load_workspace(&state, req.workspace_id).await?;
    require_member(&state, req.workspace_id, &user).await?;

    let project = Project::new(req.workspace_id, req.name.trim().to_string(), req.image_url);
    state
        .store
        .insert_project(&project)
        .await
        .map_err(store_error)?;

    tracing::info!(
        "Created project: {} ({}) in workspace {}",
        project.name,
        project.id,
        project.workspace_id
    );
    Ok(Json(project))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Project>, ApiError> {
    let project = load_project(&state, id).await?;
    require_member(&state, project.workspace_id, &user).await?;
    Ok(Json(project))
}

/// PATCH /api/projects/:id - Admins only.
pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<Project>, ApiError> {
    let project = load_project(&state, id).await?;
    require_admin(&state, project.workspace_id, &user).await?;
    if let Some(name) = &patch.name {
        require_non_empty("Name", name)?;
    }

    let project = state
        .store
        .update_project(id, &patch)
        .await
        .map_err(store_error)?;
    tracing::info!("Updated project: {} ({})", project.name, id);
    Ok(Json(project))
}

/// DELETE /api/projects/:id - Admins only; removes the project's tasks too.
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<(StatusCode, String), ApiError> {
    let project = load_project(&state, id).await?;
    require_admin(&state, project.workspace_id, &user).await?;

    if state.store.delete_project(id).await.map_err(store_error)? {
        tracing::info!("Deleted project {}", id);
        Ok((StatusCode::OK, format!("Project {} deleted successfully", id)))
    } else {
        Err((StatusCode::NOT_FOUND, format!("Project {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_state;
    use crate::board::{Member, MemberRole, Workspace};

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            username: id.to_string(),
        }
    }

    async fn workspace_with(state: &Arc<AppState>, admin: &str, member: &str) -> Workspace {
        let workspace = Workspace::new("Acme".to_string(), admin.to_string(), None);
        let owner = Member::new(workspace.id, admin.to_string(), MemberRole::Admin);
        state.store.insert_workspace(&workspace, &owner).await.unwrap();
        state
            .store
            .insert_member(&Member::new(workspace.id, member.to_string(), MemberRole::Member))
            .await
            .unwrap();
        workspace
    }

    #[tokio::test]
    async fn test_project_lifecycle_and_permissions() {
        let state = test_state();
        let workspace = workspace_with(&state, "alice", "bob").await;

        let Json(project) = create_project(
            State(state.clone()),
            Extension(user("bob")),
            Json(CreateProjectRequest {
                workspace_id: workspace.id,
                name: "Website".to_string(),
                image_url: None,
            }),
        )
        .await
        .unwrap();

        let outsider = create_project(
            State(state.clone()),
            Extension(user("mallory")),
            Json(CreateProjectRequest {
                workspace_id: workspace.id,
                name: "Sneaky".to_string(),
                image_url: None,
            }),
        )
        .await;
        assert_eq!(outsider.unwrap_err().0, StatusCode::FORBIDDEN);

        let Json(listed) = list_projects(
            State(state.clone()),
            Extension(user("bob")),
            Query(ProjectListQuery {
                workspace_id: workspace.id,
            }),
        )
        .await
        .unwrap();
        assert_eq!(listed, vec![project.clone()]);

        // Members may read but not change projects.
        let patch = ProjectPatch {
            name: Some("Site".to_string()),
            image_url: None,
        };
        let denied = update_project(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath(project.id),
            Json(patch.clone()),
        )
        .await;
        assert_eq!(denied.unwrap_err().0, StatusCode::FORBIDDEN);

        let Json(renamed) = update_project(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(project.id),
            Json(patch),
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Site");

        let (status, _) = delete_project(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(project.id),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);

        let missing = get_project(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(project.id),
        )
        .await;
        assert_eq!(missing.unwrap_err().0, StatusCode::NOT_FOUND);
    }
}
