//! Board storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database (default)
//!
//! The store is a plain document store: get by id, list by field filters sorted
//! by position, update, and batch writes used when a partition is renumbered. Ordering decisions live in [`crate::board::mover`].

mod memory;
mod sqlite;

pub use memory::InMemoryBoardStore;
pub use sqlite::SqliteBoardStore;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::board::{
    Member, Project, ProjectPatch, Task, TaskPatch, TaskStatus, Workspace, WorkspacePatch,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Backend(format!("Task join error: {}", e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Sort direction on the position field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Field filters for [`BoardStore::list_tasks`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl TaskQuery {
    /// Every task of one column, in board order.
    pub fn partition(project_id: Uuid, status: TaskStatus) -> Self {
        Self {
            project_id: Some(project_id),
            status: Some(status),
            ..Default::default()
        }
    }

    /// The last task of one column.
    pub fn partition_tail(project_id: Uuid, status: TaskStatus) -> Self {
        Self {
            order: SortOrder::Descending,
            limit: Some(1),
            ..Self::partition(project_id, status)
        }
    }

    pub fn project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    pub fn workspace(workspace_id: Uuid) -> Self {
        Self {
            workspace_id: Some(workspace_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.workspace_id.map_or(true, |id| task.workspace_id == id)
            && self.project_id.map_or(true, |id| task.project_id == id)
            && self.status.map_or(true, |s| task.status == s)
    }
}

/// One entry of an all-or-nothing position batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub position: f64,
}

/// Board store trait - implemented by all storage backends.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    // === Workspaces ===

    /// Insert a workspace together with its admin membership. Either both
    /// rows are written or neither is.
    async fn insert_workspace(&self, workspace: &Workspace, admin: &Member) -> StoreResult<()>;

    async fn get_workspace(&self, id: Uuid) -> StoreResult<Option<Workspace>>;

    async fn update_workspace(&self, id: Uuid, patch: &WorkspacePatch) -> StoreResult<Workspace>;

    async fn set_invite_code(&self, id: Uuid, invite_code: &str) -> StoreResult<Workspace>;

    /// Delete a workspace with its members, projects and tasks.
    async fn delete_workspace(&self, id: Uuid) -> StoreResult<bool>;

    // === Members ===

    /// Fails with [`StoreError::Conflict`] if the user already belongs to the
    /// workspace or the member id is taken.
    async fn insert_member(&self, member: &Member) -> StoreResult<()>;

    async fn get_member(&self, workspace_id: Uuid, user_id: &str) -> StoreResult<Option<Member>>;

    async fn list_members(&self, workspace_id: Uuid) -> StoreResult<Vec<Member>>;

    /// All memberships of one user.
    async fn list_memberships(&self, user_id: &str) -> StoreResult<Vec<Member>>;

    // === Projects ===

    async fn insert_project(&self, project: &Project) -> StoreResult<()>;

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>>;

    async fn list_projects(&self, workspace_id: Uuid) -> StoreResult<Vec<Project>>;

    async fn update_project(&self, id: Uuid, patch: &ProjectPatch) -> StoreResult<Project>;

    /// Delete a project with its tasks.
    async fn delete_project(&self, id: Uuid) -> StoreResult<bool>;

    // === Tasks ===

    async fn insert_task(&self, task: &Task) -> StoreResult<()>;

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// List tasks matching `query`, sorted by position (ties broken by
    /// creation time).
    async fn list_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<Task>>;

    /// Apply a partial update as a single write.
    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> StoreResult<Task>;

    /// Rewrite status and position of several tasks at once. Either every
    /// update is applied or none is.
    async fn update_positions(&self, updates: &[PositionUpdate]) -> StoreResult<()>;

    /// [`BoardStore::update_task`] and [`BoardStore::update_positions`] in one
    /// all-or-nothing write.
    async fn update_task_with_positions(
        &self,
        id: Uuid,
        patch: &TaskPatch,
        updates: &[PositionUpdate],
    ) -> StoreResult<Task>;

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;
}

pub type SharedBoardStore = Arc<dyn BoardStore>;

/// Board store type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreType {
    Memory,
    #[default]
    Sqlite,
}

impl StoreType {
    /// Parse from environment variable value.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a board store based on type and configuration.
pub async fn create_board_store(
    store_type: StoreType,
    base_dir: PathBuf,
) -> StoreResult<SharedBoardStore> {
    match store_type {
        StoreType::Memory => Ok(Arc::new(InMemoryBoardStore::new())),
        StoreType::Sqlite => {
            let store = SqliteBoardStore::new(base_dir).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Order used by every backend: position, then creation time, then id.
pub(crate) fn board_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    a.position
        .total_cmp(&b.position)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}
