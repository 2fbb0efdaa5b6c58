//! In-memory board store (non-persistent).

use super::{board_order, BoardStore, PositionUpdate, SortOrder, StoreError, StoreResult, TaskQuery};
use crate::board::{
    now_string, Member, Project, ProjectPatch, Task, TaskPatch, Workspace, WorkspacePatch,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// All collections sit behind one lock so cascades and position batches are
/// applied atomically.
#[derive(Default)]
struct Tables {
    workspaces: HashMap<Uuid, Workspace>,
    members: HashMap<Uuid, Member>,
    projects: HashMap<Uuid, Project>,
    tasks: HashMap<Uuid, Task>,
}

impl Tables {
    /// Uniqueness rules of the members table.
    fn check_member(&self, member: &Member) -> StoreResult<()> {
        if self.members.contains_key(&member.id) {
            return Err(StoreError::Conflict(format!("Member {} already exists", member.id)));
        }
        let exists = self
            .members
            .values()
            .any(|m| m.workspace_id == member.workspace_id && m.user_id == member.user_id);
        if exists {
            return Err(StoreError::Conflict(format!(
                "User {} is already a member of workspace {}",
                member.user_id, member.workspace_id
            )));
        }
        Ok(())
    }

    fn check_tasks_exist<'a>(&self, mut ids: impl Iterator<Item = &'a Uuid>) -> StoreResult<()> {
        match ids.find(|id| !self.tasks.contains_key(*id)) {
            Some(missing) => Err(StoreError::NotFound(format!("Task {}", missing))),
            None => Ok(()),
        }
    }

    fn apply_positions(&mut self, updates: &[PositionUpdate]) {
        let now = now_string();
        for update in updates {
            if let Some(task) = self.tasks.get_mut(&update.task_id) {
                task.status = update.status;
                task.position = update.position;
                task.updated_at = now.clone();
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBoardStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn insert_workspace(&self, workspace: &Workspace, admin: &Member) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.workspaces.contains_key(&workspace.id) {
            return Err(StoreError::Conflict(format!(
                "Workspace {} already exists",
                workspace.id
            )));
        }
        tables.check_member(admin)?;
        tables.workspaces.insert(workspace.id, workspace.clone());
        tables.members.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn get_workspace(&self, id: Uuid) -> StoreResult<Option<Workspace>> {
        Ok(self.tables.read().await.workspaces.get(&id).cloned())
    }

    async fn update_workspace(&self, id: Uuid, patch: &WorkspacePatch) -> StoreResult<Workspace> {
        let mut tables = self.tables.write().await;
        let workspace = tables
            .workspaces
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Workspace {}", id)))?;
        if let Some(name) = &patch.name {
            workspace.name = name.clone();
        }
        if let Some(image_url) = &patch.image_url {
            workspace.image_url = Some(image_url.clone()).filter(|u| !u.trim().is_empty());
        }
        workspace.updated_at = now_string();
        Ok(workspace.clone())
    }

    async fn set_invite_code(&self, id: Uuid, invite_code: &str) -> StoreResult<Workspace> {
        let mut tables = self.tables.write().await;
        let workspace = tables
            .workspaces
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Workspace {}", id)))?;
        workspace.invite_code = invite_code.to_string();
        workspace.updated_at = now_string();
        Ok(workspace.clone())
    }

    async fn delete_workspace(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let existed = tables.workspaces.remove(&id).is_some();
        tables.members.retain(|_, m| m.workspace_id != id);
        tables.projects.retain(|_, p| p.workspace_id != id);
        tables.tasks.retain(|_, t| t.workspace_id != id);
        Ok(existed)
    }

    async fn insert_member(&self, member: &Member) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_member(member)?;
        tables.members.insert(member.id, member.clone());
        Ok(())
    }

    async fn get_member(&self, workspace_id: Uuid, user_id: &str) -> StoreResult<Option<Member>> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .values()
            .find(|m| m.workspace_id == workspace_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_members(&self, workspace_id: Uuid) -> StoreResult<Vec<Member>> {
        let mut members: Vec<Member> = self
            .tables
            .read()
            .await
            .members
            .values()
            .filter(|m| m.workspace_id == workspace_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(members)
    }

    async fn list_memberships(&self, user_id: &str) -> StoreResult<Vec<Member>> {
        let mut members: Vec<Member> = self
            .tables
            .read()
            .await
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(members)
    }

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .projects
            .insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn list_projects(&self, workspace_id: Uuid) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .tables
            .read()
            .await
            .projects
            .values()
            .filter(|p| p.workspace_id == workspace_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    async fn update_project(&self, id: Uuid, patch: &ProjectPatch) -> StoreResult<Project> {
        let mut tables = self.tables.write().await;
        let project = tables
            .projects
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Project {}", id)))?;
        if let Some(name) = &patch.name {
            project.name = name.clone();
        }
        if let Some(image_url) = &patch.image_url {
            project.image_url = Some(image_url.clone()).filter(|u| !u.trim().is_empty());
        }
        project.updated_at = now_string();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let existed = tables.projects.remove(&id).is_some();
        tables.tasks.retain(|_, t| t.project_id != id);
        Ok(existed)
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .tasks
            .insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tables
            .read()
            .await
            .tasks
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(board_order);
        if query.order == SortOrder::Descending {
            tasks.reverse();
        }
        if let Some(limit) = query.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Task {}", id)))?;
        task.apply(patch);
        Ok(task.clone())
    }

    async fn update_positions(&self, updates: &[PositionUpdate]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_tasks_exist(updates.iter().map(|u| &u.task_id))?;
        tables.apply_positions(updates);
        Ok(())
    }

    async fn update_task_with_positions(
        &self,
        id: Uuid,
        patch: &TaskPatch,
        updates: &[PositionUpdate],
    ) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        tables.check_tasks_exist(std::iter::once(&id).chain(updates.iter().map(|u| &u.task_id)))?;
        tables.apply_positions(updates);
        let task = tables
            .tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Task {}", id)))?;
        task.apply(patch);
        Ok(task.clone())
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.tasks.remove(&id).is_some())
    }
}
