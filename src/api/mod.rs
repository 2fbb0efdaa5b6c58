//! HTTP API for the task board.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/auth/login` - Exchange credentials for a JWT
//! - `GET|POST /api/workspaces` - List the caller's workspaces / create one
//! - `GET|PATCH|DELETE /api/workspaces/:id` - Manage a workspace
//! - `POST /api/workspaces/:id/regenerate-invite` - Rotate the invite code
//! - `POST /api/workspaces/join/:id/:invite_code` - Join a workspace
//! - `GET /api/workspaces/:id/members` - List members
//! - `GET|POST /api/projects` - List (`?workspace_id=`) / create projects
//! - `GET|PATCH|DELETE /api/projects/:id` - Manage a project
//! - `GET|POST /api/tasks` - List (`?project_id=&status=`) / create tasks
//! - `GET|PATCH|DELETE /api/tasks/:id` - Manage a task
//! - `POST /api/tasks/:id/move` - Move a task between two neighbours
//! - `GET /api/analytics/workspaces/:id` - Workspace task statistics
//! - `GET /api/analytics/projects/:id` - Project task statistics

mod access;
pub mod analytics;
pub mod auth;
pub mod projects;
mod routes;
pub mod tasks;
pub mod types;
pub mod workspaces;

pub use routes::{router, serve, AppState};
pub use types::*;
