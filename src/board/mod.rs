//! Board domain: workspaces, members, projects and ordered tasks.

pub mod analytics;
pub mod mover;
mod types;

pub use analytics::TaskAnalytics;
pub use mover::{MoveError, MoveRequest, TaskMover};
pub use types::{
    generate_invite_code, now_string, Member, MemberRole, NewTask, Project, ProjectPatch, Task,
    TaskPatch, TaskPriority, TaskStatus, Workspace, WorkspacePatch,
};
