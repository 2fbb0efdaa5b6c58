//! SQLite-based board store.

use super::{BoardStore, PositionUpdate, SortOrder, StoreError, StoreResult, TaskQuery};
use crate::board::{
    now_string, Member, MemberRole, Project, ProjectPatch, Task, TaskPatch, TaskPriority,
    TaskStatus, Workspace, WorkspacePatch,
};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS workspaces (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    image_url TEXT,
    invite_code TEXT NOT NULL,
    admin_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'MEMBER',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (workspace_id, user_id),
    FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_members_user ON members(user_id);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    name TEXT NOT NULL,
    image_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_projects_workspace ON projects(workspace_id);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    content TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'BACKLOG',
    priority TEXT NOT NULL DEFAULT 'MEDIUM',
    position REAL NOT NULL,
    assignee_id TEXT,
    due_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (workspace_id) REFERENCES workspaces(id) ON DELETE CASCADE,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tasks_partition ON tasks(project_id, status, position);
CREATE INDEX IF NOT EXISTS idx_tasks_workspace ON tasks(workspace_id);
"#;

const WORKSPACE_COLUMNS: &str = "id, name, image_url, invite_code, admin_id, created_at, updated_at";
const MEMBER_COLUMNS: &str = "id, workspace_id, user_id, role, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, workspace_id, name, image_url, created_at, updated_at";
const TASK_COLUMNS: &str = "id, workspace_id, project_id, content, description, status, priority,
     position, assignee_id, due_date, created_at, updated_at";

pub struct SqliteBoardStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBoardStore {
    pub async fn new(base_dir: PathBuf) -> StoreResult<Self> {
        let db_path = base_dir.join("taskboard.db");

        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to create store dir: {}", e)))?;

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            tracing::debug!(path = %db_path.display(), "Opened board database");
            Ok::<_, StoreError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await?
    }
}

fn parse_id(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    let id: String = row.get(0)?;
    Ok(Workspace {
        id: parse_id(&id),
        name: row.get(1)?,
        image_url: row.get(2)?,
        invite_code: row.get(3)?,
        admin_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    let id: String = row.get(0)?;
    let workspace_id: String = row.get(1)?;
    let role: String = row.get(3)?;
    Ok(Member {
        id: parse_id(&id),
        workspace_id: parse_id(&workspace_id),
        user_id: row.get(2)?,
        role: MemberRole::parse(&role).unwrap_or(MemberRole::Member),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let id: String = row.get(0)?;
    let workspace_id: String = row.get(1)?;
    Ok(Project {
        id: parse_id(&id),
        workspace_id: parse_id(&workspace_id),
        name: row.get(2)?,
        image_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let workspace_id: String = row.get(1)?;
    let project_id: String = row.get(2)?;
    let status: String = row.get(5)?;
    let priority: String = row.get(6)?;
    Ok(Task {
        id: parse_id(&id),
        workspace_id: parse_id(&workspace_id),
        project_id: parse_id(&project_id),
        content: row.get(3)?,
        description: row.get(4)?,
        status: TaskStatus::parse(&status).unwrap_or_default(),
        priority: TaskPriority::parse(&priority).unwrap_or_default(),
        position: row.get(7)?,
        assignee_id: row.get(8)?,
        due_date: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn load_workspace(conn: &Connection, id: &str) -> StoreResult<Option<Workspace>> {
    let sql = format!("SELECT {} FROM workspaces WHERE id = ?1", WORKSPACE_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], workspace_from_row)
        .optional()?)
}

fn load_project(conn: &Connection, id: &str) -> StoreResult<Option<Project>> {
    let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], project_from_row)
        .optional()?)
}

fn load_task(conn: &Connection, id: &str) -> StoreResult<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    Ok(conn.query_row(&sql, params![id], task_from_row).optional()?)
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn write_member(conn: &Connection, m: &Member) -> StoreResult<()> {
    let result = conn.execute(
        "INSERT INTO members (id, workspace_id, user_id, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            m.id.to_string(),
            m.workspace_id.to_string(),
            m.user_id,
            m.role.as_str(),
            m.created_at,
            m.updated_at
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(StoreError::Conflict(format!(
            "User {} cannot join workspace {}: {}",
            m.user_id, m.workspace_id, e
        ))),
        Err(e) => Err(e.into()),
    }
}

fn write_task(conn: &Connection, id: Uuid, patch: &TaskPatch) -> StoreResult<Task> {
    let id_str = id.to_string();
    let mut task =
        load_task(conn, &id_str)?.ok_or_else(|| StoreError::NotFound(format!("Task {}", id)))?;
    task.apply(patch);
    conn.execute(
        "UPDATE tasks SET content = ?1, description = ?2, status = ?3, priority = ?4,
                          position = ?5, assignee_id = ?6, due_date = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            task.content,
            task.description,
            task.status.as_str(),
            task.priority.as_str(),
            task.position,
            task.assignee_id,
            task.due_date,
            task.updated_at,
            id_str
        ],
    )?;
    Ok(task)
}

/// Caller owns the transaction; an error here must abort it.
fn write_positions(conn: &Connection, updates: &[PositionUpdate]) -> StoreResult<()> {
    let now = now_string();
    for update in updates {
        let changed = conn.execute(
            "UPDATE tasks SET status = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                update.status.as_str(),
                update.position,
                now,
                update.task_id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("Task {}", update.task_id)));
        }
    }
    Ok(())
}

#[async_trait]
impl BoardStore for SqliteBoardStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn insert_workspace(&self, workspace: &Workspace, admin: &Member) -> StoreResult<()> {
        let w = workspace.clone();
        let admin = admin.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let result = tx.execute(
                "INSERT INTO workspaces (id, name, image_url, invite_code, admin_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    w.id.to_string(),
                    w.name,
                    w.image_url,
                    w.invite_code,
                    w.admin_id,
                    w.created_at,
                    w.updated_at
                ],
            );
            match result {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(StoreError::Conflict(format!(
                        "Workspace {} already exists",
                        w.id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
            write_member(&tx, &admin)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_workspace(&self, id: Uuid) -> StoreResult<Option<Workspace>> {
        self.with_conn(move |conn| load_workspace(conn, &id.to_string()))
            .await
    }

    async fn update_workspace(&self, id: Uuid, patch: &WorkspacePatch) -> StoreResult<Workspace> {
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let id_str = id.to_string();
            let mut workspace = load_workspace(conn, &id_str)?
                .ok_or_else(|| StoreError::NotFound(format!("Workspace {}", id)))?;
            if let Some(name) = patch.name {
                workspace.name = name;
            }
            if let Some(image_url) = patch.image_url {
                workspace.image_url = Some(image_url).filter(|u| !u.trim().is_empty());
            }
            workspace.updated_at = now_string();
            conn.execute(
                "UPDATE workspaces SET name = ?1, image_url = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    workspace.name,
                    workspace.image_url,
                    workspace.updated_at,
                    id_str
                ],
            )?;
            Ok(workspace)
        })
        .await
    }

    async fn set_invite_code(&self, id: Uuid, invite_code: &str) -> StoreResult<Workspace> {
        let invite_code = invite_code.to_string();
        self.with_conn(move |conn| {
            let id_str = id.to_string();
            let changed = conn.execute(
                "UPDATE workspaces SET invite_code = ?1, updated_at = ?2 WHERE id = ?3",
                params![invite_code, now_string(), id_str],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("Workspace {}", id)));
            }
            load_workspace(conn, &id_str)?
                .ok_or_else(|| StoreError::NotFound(format!("Workspace {}", id)))
        })
        .await
    }

    async fn delete_workspace(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let changed =
                conn.execute("DELETE FROM workspaces WHERE id = ?1", params![id.to_string()])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn insert_member(&self, member: &Member) -> StoreResult<()> {
        let m = member.clone();
        self.with_conn(move |conn| write_member(conn, &m)).await
    }

    async fn get_member(&self, workspace_id: Uuid, user_id: &str) -> StoreResult<Option<Member>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM members WHERE workspace_id = ?1 AND user_id = ?2",
                MEMBER_COLUMNS
            );
            Ok(conn
                .query_row(
                    &sql,
                    params![workspace_id.to_string(), user_id],
                    member_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn list_members(&self, workspace_id: Uuid) -> StoreResult<Vec<Member>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM members WHERE workspace_id = ?1 ORDER BY created_at ASC",
                MEMBER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let members = stmt
                .query_map(params![workspace_id.to_string()], member_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(members)
        })
        .await
    }

    async fn list_memberships(&self, user_id: &str) -> StoreResult<Vec<Member>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM members WHERE user_id = ?1 ORDER BY created_at ASC",
                MEMBER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let members = stmt
                .query_map(params![user_id], member_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(members)
        })
        .await
    }

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        let p = project.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO projects (id, workspace_id, name, image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    p.id.to_string(),
                    p.workspace_id.to_string(),
                    p.name,
                    p.image_url,
                    p.created_at,
                    p.updated_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        self.with_conn(move |conn| load_project(conn, &id.to_string()))
            .await
    }

    async fn list_projects(&self, workspace_id: Uuid) -> StoreResult<Vec<Project>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM projects WHERE workspace_id = ?1 ORDER BY created_at ASC",
                PROJECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let projects = stmt
                .query_map(params![workspace_id.to_string()], project_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(projects)
        })
        .await
    }

    async fn update_project(&self, id: Uuid, patch: &ProjectPatch) -> StoreResult<Project> {
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let id_str = id.to_string();
            let mut project = load_project(conn, &id_str)?
                .ok_or_else(|| StoreError::NotFound(format!("Project {}", id)))?;
            if let Some(name) = patch.name {
                project.name = name;
            }
            if let Some(image_url) = patch.image_url {
                project.image_url = Some(image_url).filter(|u| !u.trim().is_empty());
            }
            project.updated_at = now_string();
            conn.execute(
                "UPDATE projects SET name = ?1, image_url = ?2, updated_at = ?3 WHERE id = ?4",
                params![project.name, project.image_url, project.updated_at, id_str],
            )?;
            Ok(project)
        })
        .await
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let changed =
                conn.execute("DELETE FROM projects WHERE id = ?1", params![id.to_string()])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        let t = task.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, workspace_id, project_id, content, description, status,
                                    priority, position, assignee_id, due_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    t.id.to_string(),
                    t.workspace_id.to_string(),
                    t.project_id.to_string(),
                    t.content,
                    t.description,
                    t.status.as_str(),
                    t.priority.as_str(),
                    t.position,
                    t.assignee_id,
                    t.due_date,
                    t.created_at,
                    t.updated_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.with_conn(move |conn| load_task(conn, &id.to_string()))
            .await
    }

    async fn list_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut values: Vec<String> = Vec::new();
            if let Some(id) = query.workspace_id {
                clauses.push("workspace_id = ?");
                values.push(id.to_string());
            }
            if let Some(id) = query.project_id {
                clauses.push("project_id = ?");
                values.push(id.to_string());
            }
            if let Some(status) = query.status {
                clauses.push("status = ?");
                values.push(status.as_str().to_string());
            }

            let mut sql = format!("SELECT {} FROM tasks", TASK_COLUMNS);
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            let dir = match query.order {
                SortOrder::Ascending => "ASC",
                SortOrder::Descending => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY position {dir}, created_at {dir}, id {dir}",
                dir = dir
            ));
            if let Some(limit) = query.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_from_iter(values.iter()), task_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> StoreResult<Task> {
        let patch = patch.clone();
        self.with_conn(move |conn| write_task(conn, id, &patch)).await
    }

    async fn update_positions(&self, updates: &[PositionUpdate]) -> StoreResult<()> {
        let updates = updates.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            // Dropping the transaction on error rolls back the earlier updates.
            write_positions(&tx, &updates)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn update_task_with_positions(
        &self,
        id: Uuid,
        patch: &TaskPatch,
        updates: &[PositionUpdate],
    ) -> StoreResult<Task> {
        let patch = patch.clone();
        let updates = updates.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            write_positions(&tx, &updates)?;
            let task = write_task(&tx, id, &patch)?;
            tx.commit()?;
            Ok(task)
        })
        .await
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
            Ok(changed > 0)
        })
        .await
    }
}
