//! Placing and moving tasks inside status columns.
//!
//! The mover reads neighbour positions fresh from the store, asks the
//! [`PositionAllocator`] for a position and writes only the moved task. When the
//! allocator cannot produce a usable value (neighbours collided after two
//! concurrent moves, or bisection ran out of precision) the target column is
//! renumbered and written back together with the moved task as one batch.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use super::{NewTask, Task, TaskPatch, TaskStatus};
use crate::ordering::{InsertionPlan, OrderingError, PositionAllocator};
use crate::store::{PositionUpdate, SharedBoardStore, StoreError, TaskQuery};

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Renumbering the column still left no room for the task. Nothing was written.
    #[error("Failed to rebalance column {status} of project {project_id}: {source}")]
    Rebalance {
        project_id: Uuid,
        status: TaskStatus,
        source: OrderingError,
    },
}

/// Drop target of a drag: the column and the tasks directly above and below.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub prev_task_id: Option<Uuid>,
    #[serde(default)]
    pub next_task_id: Option<Uuid>,
}

impl MoveRequest {
    /// Append to the end of `status`.
    pub fn to_end(status: TaskStatus) -> Self {
        Self {
            status,
            prev_task_id: None,
            next_task_id: None,
        }
    }
}

/// Where a task lands, plus the renumbering of its column when the
/// position only fits after a rebalance.
struct Placement {
    position: f64,
    renumbered: Vec<PositionUpdate>,
}

#[derive(Clone, Copy)]
enum Side {
    Before,
    After,
}

#[derive(Clone)]
pub struct TaskMover {
    store: SharedBoardStore,
    allocator: PositionAllocator,
}

impl TaskMover {
    pub fn new(store: SharedBoardStore, allocator: PositionAllocator) -> Self {
        Self { store, allocator }
    }

    /// Insert a new task at the end of its initial column.
    pub async fn create_task(&self, workspace_id: Uuid, new: NewTask) -> Result<Task, MoveError> {
        let project_id = new.project_id;
        let status = new.status;
        let tail = self
            .store
            .list_tasks(&TaskQuery::partition_tail(project_id, status))
            .await?
            .into_iter()
            .next();

        let position = match self
            .allocator
            .compute_position(tail.map(|t| t.position), None)
        {
            Ok(position) => position,
            Err(cause) => {
                tracing::warn!(
                    "Cannot append to column {} of project {} ({}), rebalancing",
                    status,
                    project_id,
                    cause
                );
                let ordered = self.ordered_ids(project_id, status, None).await?;
                let slot = ordered.len();
                let plan = self.plan(project_id, status, ordered, slot)?;
                self.store
                    .update_positions(&renumbered_updates(&plan, status))
                    .await?;
                plan.position
            }
        };

        let task = Task::new(workspace_id, new, position);
        self.store.insert_task(&task).await?;
        tracing::info!(
            "Created task {} in {} at position {}",
            task.id,
            task.status,
            task.position
        );
        Ok(task)
    }

    /// Move a task to `request.status` between the given neighbours.
    ///
    /// Neighbours that no longer exist, sit in another column, or name the
    /// moved task itself are ignored. A single remaining neighbour is paired
    /// with the task actually next to it in the column. With no usable
    /// neighbour the task is appended to the end of the target column.
    pub async fn move_task(&self, task_id: Uuid, request: &MoveRequest) -> Result<Task, MoveError> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(MoveError::TaskNotFound(task_id))?;

        let placement = self.place(&task, request).await?;
        let patch = TaskPatch::placement(request.status, placement.position);
        let updated = self.write(&task, &patch, &placement.renumbered).await?;
        tracing::debug!(
            "Moved task {} to {} at position {}",
            updated.id,
            updated.status,
            updated.position
        );
        Ok(updated)
    }

    /// Apply a partial update as one write. A status change without an
    /// explicit position is placed at the end of the new column.
    pub async fn update_task(&self, task_id: Uuid, mut patch: TaskPatch) -> Result<Task, MoveError> {
        let current = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(MoveError::TaskNotFound(task_id))?;

        let mut renumbered = Vec::new();
        if let (Some(status), None) = (patch.status, patch.position) {
            if status != current.status {
                let placement = self.place(&current, &MoveRequest::to_end(status)).await?;
                patch.position = Some(placement.position);
                renumbered = placement.renumbered;
            }
        }

        self.write(&current, &patch, &renumbered).await
    }

    /// Work out where `task` lands for `request` without writing anything.
    async fn place(&self, task: &Task, request: &MoveRequest) -> Result<Placement, MoveError> {
        let target = request.status;
        let prev = self
            .resolve_neighbor(task, target, request.prev_task_id, "prev")
            .await?;
        let next = self
            .resolve_neighbor(task, target, request.next_task_id, "next")
            .await?;

        let (prev, next) = match (prev, next) {
            (None, None) => (self.tail_excluding(task, target).await?, None),
            (Some(prev), None) => {
                let next = self.adjacent(task, &prev, Side::After).await?;
                (Some(prev), next)
            }
            (None, Some(next)) => {
                let prev = self.adjacent(task, &next, Side::Before).await?;
                (prev, Some(next))
            }
            both => both,
        };

        let computed = self.allocator.compute_position(
            prev.as_ref().map(|t| t.position),
            next.as_ref().map(|t| t.position),
        );
        match computed {
            Ok(position) => Ok(Placement {
                position,
                renumbered: Vec::new(),
            }),
            Err(cause) => {
                tracing::warn!(
                    "Position for task {} unavailable ({}), rebalancing column {} of project {}",
                    task.id,
                    cause,
                    target,
                    task.project_id
                );
                self.rebalance(task, target, prev.as_ref(), next.as_ref())
                    .await
            }
        }
    }

    /// Persist `patch` on `task` together with any renumbering.
    async fn write(
        &self,
        task: &Task,
        patch: &TaskPatch,
        renumbered: &[PositionUpdate],
    ) -> Result<Task, MoveError> {
        if renumbered.is_empty() {
            return match self.store.update_task(task.id, patch).await {
                Ok(updated) => Ok(updated),
                Err(StoreError::NotFound(_)) => Err(MoveError::TaskNotFound(task.id)),
                Err(e) => Err(e.into()),
            };
        }

        let updated = self
            .store
            .update_task_with_positions(task.id, patch, renumbered)
            .await?;
        tracing::info!(
            "Rebalanced {} tasks in column {} of project {}; task {} placed at {}",
            renumbered.len(),
            updated.status,
            updated.project_id,
            updated.id,
            updated.position
        );
        Ok(updated)
    }

    async fn resolve_neighbor(
        &self,
        moved: &Task,
        target: TaskStatus,
        id: Option<Uuid>,
        side: &str,
    ) -> Result<Option<Task>, MoveError> {
        let Some(id) = id else {
            return Ok(None);
        };
        if id == moved.id {
            tracing::warn!("Ignoring {} neighbor of task {}: it is the task itself", side, id);
            return Ok(None);
        }
        match self.store.get_task(id).await? {
            Some(neighbor)
                if neighbor.project_id == moved.project_id && neighbor.status == target =>
            {
                Ok(Some(neighbor))
            }
            Some(neighbor) => {
                tracing::warn!(
                    "Ignoring {} neighbor {} of task {}: it is in {} of project {}",
                    side,
                    id,
                    moved.id,
                    neighbor.status,
                    neighbor.project_id
                );
                Ok(None)
            }
            None => {
                tracing::warn!(
                    "Ignoring {} neighbor {} of task {}: not found",
                    side,
                    id,
                    moved.id
                );
                Ok(None)
            }
        }
    }

    /// Last task of the target column other than `moved`.
    async fn tail_excluding(
        &self,
        moved: &Task,
        target: TaskStatus,
    ) -> Result<Option<Task>, MoveError> {
        let query = TaskQuery {
            limit: Some(2),
            ..TaskQuery::partition_tail(moved.project_id, target)
        };
        Ok(self
            .store
            .list_tasks(&query)
            .await?
            .into_iter()
            .find(|t| t.id != moved.id))
    }

    /// The task directly before or after `anchor` in its column, skipping `moved`.
    async fn adjacent(
        &self,
        moved: &Task,
        anchor: &Task,
        side: Side,
    ) -> Result<Option<Task>, MoveError> {
        let mut column: Vec<Task> = self
            .store
            .list_tasks(&TaskQuery::partition(anchor.project_id, anchor.status))
            .await?
            .into_iter()
            .filter(|t| t.id != moved.id)
            .collect();
        if let Side::Before = side {
            column.reverse();
        }
        Ok(column
            .into_iter()
            .skip_while(|t| t.id != anchor.id)
            .nth(1))
    }

    async fn ordered_ids(
        &self,
        project_id: Uuid,
        status: TaskStatus,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, MoveError> {
        Ok(self
            .store
            .list_tasks(&TaskQuery::partition(project_id, status))
            .await?
            .into_iter()
            .map(|t| t.id)
            .filter(|id| Some(*id) != exclude)
            .collect())
    }

    fn plan(
        &self,
        project_id: Uuid,
        status: TaskStatus,
        ordered: Vec<Uuid>,
        slot: usize,
    ) -> Result<InsertionPlan<Uuid>, MoveError> {
        self.allocator
            .plan_insertion(ordered, slot)
            .map_err(|source| {
                tracing::error!(
                    "Rebalance of column {} in project {} failed: {}",
                    status,
                    project_id,
                    source
                );
                MoveError::Rebalance {
                    project_id,
                    status,
                    source,
                }
            })
    }

    /// Renumber the target column and slot `task` in after `prev`, or before
    /// `next`, or at the end.
    async fn rebalance(
        &self,
        task: &Task,
        target: TaskStatus,
        prev: Option<&Task>,
        next: Option<&Task>,
    ) -> Result<Placement, MoveError> {
        let ordered = self
            .ordered_ids(task.project_id, target, Some(task.id))
            .await?;
        let index_of = |id: Uuid| ordered.iter().position(|other| *other == id);
        let slot = prev
            .and_then(|p| index_of(p.id))
            .map(|i| i + 1)
            .or_else(|| next.and_then(|n| index_of(n.id)))
            .unwrap_or(ordered.len());

        let plan = self.plan(task.project_id, target, ordered, slot)?;
        Ok(Placement {
            position: plan.position,
            renumbered: renumbered_updates(&plan, target),
        })
    }
}

fn renumbered_updates(plan: &InsertionPlan<Uuid>, status: TaskStatus) -> Vec<PositionUpdate> {
    plan.renumbered
        .iter()
        .map(|r| PositionUpdate {
            task_id: r.key,
            status,
            position: r.position,
        })
        .collect()
}
