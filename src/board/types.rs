//! Workspaces, members, projects and tasks.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Workflow column of a task. Positions are only comparable between tasks that
/// share a project and a status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Todo,
    InProgress,
    Done,
    Canceled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        Self::Backlog,
        Self::Todo,
        Self::InProgress,
        Self::Done,
        Self::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BACKLOG" => Some(Self::Backlog),
            "TODO" => Some(Self::Todo),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Finished work never counts as overdue.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "URGENT" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Role of a user within a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Self::Admin),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }
}

const INVITE_CODE_LEN: usize = 6;
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Six upper-case alphanumerics.
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// Top-level organizational unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub invite_code: String,
    /// User who created the workspace
    pub admin_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Workspace {
    pub fn new(name: String, admin_id: String, image_url: Option<String>) -> Self {
        let now = now_string();
        Self {
            id: Uuid::new_v4(),
            name,
            image_url: image_url.filter(|u| !u.trim().is_empty()),
            invite_code: generate_invite_code(),
            admin_id,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspacePatch {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// Membership of a user in a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub user_id: String,
    pub workspace_id: Uuid,
    pub role: MemberRole,
    pub created_at: String,
    pub updated_at: String,
}

impl Member {
    pub fn new(workspace_id: Uuid, user_id: String, role: MemberRole) -> Self {
        let now = now_string();
        Self {
            id: Uuid::new_v4(),
            user_id,
            workspace_id,
            role,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

/// Container for tasks within a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Project {
    pub fn new(workspace_id: Uuid, name: String, image_url: Option<String>) -> Self {
        let now = now_string();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            name,
            image_url: image_url.filter(|u| !u.trim().is_empty()),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// Individual work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub project_id: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Order within the (project, status) partition
    pub position: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    /// ISO date or RFC3339 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields supplied when creating a task. The position is assigned on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub project_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl Task {
    pub fn new(workspace_id: Uuid, new: NewTask, position: f64) -> Self {
        let now = now_string();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            project_id: new.project_id,
            content: new.content,
            description: non_empty(new.description),
            status: new.status,
            priority: new.priority,
            position,
            assignee_id: non_empty(new.assignee_id),
            due_date: non_empty(new.due_date),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(description) = &patch.description {
            self.description = non_empty(Some(description.clone()));
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(assignee_id) = &patch.assignee_id {
            self.assignee_id = non_empty(Some(assignee_id.clone()));
        }
        if let Some(due_date) = &patch.due_date {
            self.due_date = non_empty(Some(due_date.clone()));
        }
        self.updated_at = now_string();
    }
}

/// Partial task update. Empty strings clear the optional text fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub position: Option<f64>,
    pub assignee_id: Option<String>,
    pub due_date: Option<String>,
}

impl TaskPatch {
    /// Update that only relocates a task.
    pub fn placement(status: TaskStatus, position: f64) -> Self {
        Self {
            status: Some(status),
            position: Some(position),
            ..Default::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        let parsed: TaskStatus = serde_json::from_str("\"CANCELED\"").unwrap();
        assert_eq!(parsed, TaskStatus::Canceled);
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("in_progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("archived"), None);
    }

    #[test]
    fn test_invite_code_shape() {
        for _ in 0..20 {
            let code = generate_invite_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_patch_clears_optional_fields() {
        let new = NewTask {
            project_id: Uuid::new_v4(),
            content: "Write docs".to_string(),
            description: Some("first draft".to_string()),
            status: TaskStatus::Todo,
            priority: TaskPriority::High,
            assignee_id: Some("u1".to_string()),
            due_date: None,
        };
        let mut task = Task::new(Uuid::new_v4(), new, 1000.0);
        assert_eq!(task.description.as_deref(), Some("first draft"));

        task.apply(&TaskPatch {
            description: Some(String::new()),
            assignee_id: Some("  ".to_string()),
            priority: Some(TaskPriority::Low),
            ..Default::default()
        });
        assert_eq!(task.description, None);
        assert_eq!(task.assignee_id, None);
        assert_eq!(task.priority, TaskPriority::Low);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.position, 1000.0);
    }

    #[test]
    fn test_new_task_defaults() {
        let new: NewTask = serde_json::from_value(serde_json::json!({
            "project_id": Uuid::nil(),
            "content": "Triage",
        }))
        .unwrap();
        assert_eq!(new.status, TaskStatus::Backlog);
        assert_eq!(new.priority, TaskPriority::Medium);
    }
}
