//! Task counts for workspace and project dashboards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{Task, TaskPriority, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskAnalytics {
    pub total: usize,
    /// Every status is present, zero when empty.
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub by_priority: BTreeMap<TaskPriority, usize>,
    pub overdue: usize,
    pub by_assignee: BTreeMap<String, usize>,
    pub unassigned: usize,
}

impl TaskAnalytics {
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let mut by_status: BTreeMap<TaskStatus, usize> =
            TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_priority: BTreeMap<TaskPriority, usize> =
            TaskPriority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut by_assignee = BTreeMap::new();
        let mut overdue = 0;
        let mut unassigned = 0;

        for task in tasks {
            *by_status.entry(task.status).or_default() += 1;
            *by_priority.entry(task.priority).or_default() += 1;
            match &task.assignee_id {
                Some(assignee) => *by_assignee.entry(assignee.clone()).or_default() += 1,
                None => unassigned += 1,
            }
            if is_overdue(task, now) {
                overdue += 1;
            }
        }

        Self {
            total: tasks.len(),
            by_status,
            by_priority,
            overdue,
            by_assignee,
            unassigned,
        }
    }
}

/// Open task whose due date has passed.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    if task.status.is_closed() {
        return false;
    }
    task.due_date
        .as_deref()
        .and_then(parse_due_date)
        .map_or(false, |due| due < now)
}

/// Accepts RFC3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
