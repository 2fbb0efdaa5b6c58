//! Workspace management API endpoints.
//!
//! Provides endpoints for managing workspaces and their members:
//! - List the caller's workspaces
//! - Create workspace (the creator becomes its admin)
//! - Get, update and delete a workspace
//! - Regenerate the invite code and join with it
//! - List members

use axum::{
    extract::{Extension, Path as AxumPath, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::access::{
    load_workspace, require_admin, require_member, require_non_empty, store_error, ApiError,
};
use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{CreateWorkspaceRequest, WorkspaceResponse};
use crate::board::{generate_invite_code, Member, MemberRole, Workspace, WorkspacePatch};
use crate::store::StoreError;

/// Create workspace routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_workspaces).post(create_workspace))
        .route(
            "/:id",
            get(get_workspace)
                .patch(update_workspace)
                .delete(delete_workspace),
        )
        .route("/:id/regenerate-invite", post(regenerate_invite))
        .route("/:id/members", get(list_members))
        .route("/join/:id/:invite_code", post(join_workspace))
}

/// GET /api/workspaces - Workspaces the caller belongs to.
pub async fn list_workspaces(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<WorkspaceResponse>>, ApiError> {
    let memberships = state
        .store
        .list_memberships(&user.id)
        .await
        .map_err(store_error)?;

    let mut responses = Vec::with_capacity(memberships.len());
    for member in memberships {
        if let Some(workspace) = state
            .store
            .get_workspace(member.workspace_id)
            .await
            .map_err(store_error)?
        {
            responses.push(WorkspaceResponse {
                workspace,
                role: member.role,
            });
        }
    }
    Ok(Json(responses))
}

/// POST /api/workspaces - Create a new workspace.
pub async fn create_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    require_non_empty("Name", &req.name)?;

    let workspace = Workspace::new(req.name.trim().to_string(), user.id.clone(), req.image_url);
    let admin = Member::new(workspace.id, user.id.clone(), MemberRole::Admin);
    state
        .store
        .insert_workspace(&workspace, &admin)
        .await
        .map_err(store_error)?;

    tracing::info!("Created workspace: {} ({})", workspace.name, workspace.id);

    Ok(Json(WorkspaceResponse {
        workspace,
        role: MemberRole::Admin,
    }))
}

/// GET /api/workspaces/:id - Get workspace details.
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    let workspace = load_workspace(&state, id).await?;
    let member = require_member(&state, id, &user).await?;
    Ok(Json(WorkspaceResponse {
        workspace,
        role: member.role,
    }))
}

/// PATCH /api/workspaces/:id - Rename or change the image.
pub async fn update_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
    Json(patch): Json<WorkspacePatch>,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    load_workspace(&state, id).await?;
    let member = require_admin(&state, id, &user).await?;
    if let Some(name) = &patch.name {
        require_non_empty("Name", name)?;
    }

    let workspace = state
        .store
        .update_workspace(id, &patch)
        .await
        .map_err(store_error)?;

    tracing::info!("Updated workspace: {} ({})", workspace.name, id);

    Ok(Json(WorkspaceResponse {
        workspace,
        role: member.role,
    }))
}

/// DELETE /api/workspaces/:id - Delete a workspace with its projects and tasks.
pub async fn delete_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<(StatusCode, String), ApiError> {
    load_workspace(&state, id).await?;
    require_admin(&state, id, &user).await?;

    if state.store.delete_workspace(id).await.map_err(store_error)? {
        tracing::info!("Deleted workspace {}", id);
        Ok((
            StatusCode::OK,
            format!("Workspace {} deleted successfully", id),
        ))
    } else {
        Err((StatusCode::NOT_FOUND, format!("Workspace {} not found", id)))
    }
}

/// POST /api/workspaces/:id/regenerate-invite - Invalidate the old invite code.
pub async fn regenerate_invite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    load_workspace(&state, id).await?;
    let member = require_admin(&state, id, &user).await?;

    let workspace = state
        .store
        .set_invite_code(id, &generate_invite_code())
        .await
        .map_err(store_error)?;

    tracing::info!("Regenerated invite code for workspace {}", id);

    Ok(Json(WorkspaceResponse {
        workspace,
        role: member.role,
    }))
}

/// POST /api/workspaces/join/:id/:invite_code - Join as a regular member.
pub async fn join_workspace(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath((id, invite_code)): AxumPath<(Uuid, String)>,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    let workspace = load_workspace(&state, id).await?;
    if workspace.invite_code != invite_code {
        return Err((StatusCode::BAD_REQUEST, "Invalid invite link".to_string()));
    }

    let existing = state
        .store
        .get_member(id, &user.id)
        .await
        .map_err(store_error)?;
    if existing.is_some() {
        return Err((StatusCode::BAD_REQUEST, "Already a member".to_string()));
    }

    let member = Member::new(id, user.id.clone(), MemberRole::Member);
    match state.store.insert_member(&member).await {
        Ok(()) => {}
        // Lost a race with a concurrent join of the same user.
        Err(StoreError::Conflict(_)) => {
            return Err((StatusCode::BAD_REQUEST, "Already a member".to_string()));
        }
        Err(e) => return Err(store_error(e)),
    }

    tracing::info!("User {} joined workspace {}", user.id, id);

    Ok(Json(WorkspaceResponse {
        workspace,
        role: MemberRole::Member,
    }))
}

/// GET /api/workspaces/:id/members - Members of a workspace.
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Vec<Member>>, ApiError> {
    load_workspace(&state, id).await?;
    require_member(&state, id, &user).await?;
    let members = state.store.list_members(id).await.map_err(store_error)?;
    Ok(Json(members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_state;

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            username: id.to_string(),
        }
    }

    async fn create(state: &Arc<AppState>, owner: &str, name: &str) -> Workspace {
        let Json(created) = create_workspace(
            State(state.clone()),
            Extension(user(owner)),
            Json(CreateWorkspaceRequest {
                name: name.to_string(),
                image_url: None,
            }),
        )
        .await
        .unwrap();
        created.workspace
    }

    #[tokio::test]
    async fn test_creator_is_admin_and_lists_workspace() {
        let state = test_state();
        let workspace = create(&state, "alice", "Acme").await;
        assert_eq!(workspace.admin_id, "alice");

        let Json(list) = list_workspaces(State(state.clone()), Extension(user("alice")))
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].role, MemberRole::Admin);

        let Json(other) = list_workspaces(State(state.clone()), Extension(user("bob")))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_created_workspace_has_admin_member() {
        let state = test_state();
        let workspace = create(&state, "alice", "Acme").await;

        let Json(members) = list_members(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(workspace.id),
        )
        .await
        .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "alice");
        assert_eq!(members[0].role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let state = test_state();
        let result = create_workspace(
            State(state),
            Extension(user("alice")),
            Json(CreateWorkspaceRequest {
                name: "   ".to_string(),
                image_url: None,
            }),
        )
        .await;
        assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_join_with_invite_code() {
        let state = test_state();
        let workspace = create(&state, "alice", "Acme").await;

        let denied = get_workspace(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath(workspace.id),
        )
        .await;
        assert_eq!(denied.unwrap_err().0, StatusCode::FORBIDDEN);

        let bad_code = join_workspace(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath((workspace.id, "WRONG1".to_string())),
        )
        .await;
        assert_eq!(bad_code.unwrap_err().0, StatusCode::BAD_REQUEST);

        let Json(joined) = join_workspace(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath((workspace.id, workspace.invite_code.clone())),
        )
        .await
        .unwrap();
        assert_eq!(joined.role, MemberRole::Member);

        let again = join_workspace(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath((workspace.id, workspace.invite_code.clone())),
        )
        .await;
        assert_eq!(again.unwrap_err().0, StatusCode::BAD_REQUEST);

        let Json(members) = list_members(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath(workspace.id),
        )
        .await
        .unwrap();
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn test_only_admins_manage_workspace() {
        let state = test_state();
        let workspace = create(&state, "alice", "Acme").await;
        join_workspace(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath((workspace.id, workspace.invite_code.clone())),
        )
        .await
        .unwrap();

        let patch = WorkspacePatch {
            name: Some("Bob's".to_string()),
            image_url: None,
        };
        let denied = update_workspace(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath(workspace.id),
            Json(patch.clone()),
        )
        .await;
        assert_eq!(denied.unwrap_err().0, StatusCode::FORBIDDEN);

        let Json(renamed) = update_workspace(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(workspace.id),
            Json(patch),
        )
        .await
        .unwrap();
        assert_eq!(renamed.workspace.name, "Bob's");

        let Json(rotated) = regenerate_invite(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(workspace.id),
        )
        .await
        .unwrap();
        assert_eq!(rotated.workspace.invite_code.len(), 6);

        let denied = delete_workspace(
            State(state.clone()),
            Extension(user("bob")),
            AxumPath(workspace.id),
        )
        .await;
        assert_eq!(denied.unwrap_err().0, StatusCode::FORBIDDEN);

        let (status, _) = delete_workspace(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(workspace.id),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);

        let gone = get_workspace(
            State(state.clone()),
            Extension(user("alice")),
            AxumPath(workspace.id),
        )
        .await;
        assert_eq!(gone.unwrap_err().0, StatusCode::NOT_FOUND);
    }
}
