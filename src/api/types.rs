//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::{MemberRole, TaskStatus, Workspace};

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether the server is running in dev mode (auth disabled)
    pub dev_mode: bool,

    /// Whether auth is required for API requests (dev_mode=false)
    pub auth_required: bool,

    /// Authentication mode ("disabled", "single_tenant", "multi_user")
    pub auth_mode: String,

    /// Whether board data survives a restart
    pub persistent_store: bool,
}

/// Login request for dashboard auth.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

/// Login response containing a JWT for API authentication.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration as unix seconds.
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A workspace together with the caller's role in it.
#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub role: MemberRole,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub workspace_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub workspace_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub project_id: Uuid,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}
