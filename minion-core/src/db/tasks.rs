use std::path::Path;

use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use super::{agents, flags, get_enum, get_json, get_ts, non_empty, now, plans, ts, Database};
use crate::error::{CommsError, Result};
use crate::models::*;

pub(crate) const TASK_COLUMNS: &str = "id, title, task_file, project, zone, status, blocked_by, \
     assigned_to, created_by, files, progress, activity_count, result_file, created_at, updated_at";

pub(crate) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        task_file: row.get("task_file")?,
        project: row.get("project")?,
        zone: row.get("zone")?,
        status: get_enum(row, "status", TaskStatus::from_str)?,
        blocked_by: get_json(row, "blocked_by")?,
        assigned_to: row.get("assigned_to")?,
        created_by: row.get("created_by")?,
        files: get_json(row, "files")?,
        progress: row.get("progress")?,
        activity_count: row.get("activity_count")?,
        result_file: row.get("result_file")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

pub(crate) fn find_task(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            params![id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

fn require_task(conn: &Connection, id: i64) -> Result<Task> {
    find_task(conn, id)?.ok_or_else(|| CommsError::task_not_found(id))
}

/// Tasks assigned to `agent` that are still in play (not closed).
pub(crate) fn open_tasks_for(conn: &Connection, agent: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tasks WHERE assigned_to = ?1 AND status != 'closed'
         ORDER BY created_at DESC, id DESC",
        TASK_COLUMNS
    ))?;
    let tasks = stmt
        .query_map(params![agent], task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn require_file(path: &str, what: &str) -> Result<()> {
    if !Path::new(path).exists() {
        return Err(CommsError::Blocked(format!("{} does not exist: {}", what, path)));
    }
    Ok(())
}

impl Database {
    /// Create a task. Lead only, needs an active battle plan and an existing spec file.
    pub fn create_task(&self, agent: &str, input: CreateTaskInput) -> Result<Task> {
        if input.title.trim().is_empty() {
            return Err(CommsError::Validation("Task title must not be empty.".into()));
        }
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "create tasks")?;

            if plans::active_plan(tx)?.is_none() {
                return Err(CommsError::Blocked(
                    "No active battle plan. Lead must call set_battle_plan before creating tasks."
                        .into(),
                ));
            }

            require_file(&input.task_file, "Task file")?;

            for blocker in &input.blocked_by {
                if find_task(tx, *blocker)?.is_none() {
                    return Err(CommsError::Blocked(format!(
                        "blocked_by task #{} does not exist.",
                        blocker
                    )));
                }
            }

            let at = ts(now());
            tx.execute(
                "INSERT INTO tasks (title, task_file, project, zone, status, blocked_by,
                                    created_by, files, activity_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'open', ?5, ?6, '[]', 0, ?7, ?7)",
                params![
                    input.title,
                    input.task_file,
                    non_empty(input.project.as_deref()),
                    non_empty(input.zone.as_deref()),
                    serde_json::to_string(&input.blocked_by)?,
                    agent,
                    at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tracing::info!(agent, task_id = id, "task created");
            require_task(tx, id)
        })
    }

    /// Hand a task to an agent. Lead only, refused while moon_crash is raised.
    pub fn assign_task(&self, agent: &str, task_id: i64, assignee: &str) -> Result<TaskAssignment> {
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "assign tasks")?;

            if flags::is_set(tx, MOON_CRASH)? {
                return Err(CommsError::Blocked(
                    "moon_crash is active. Task assignment is halted until a lead calls \
                     clear_moon_crash."
                        .into(),
                ));
            }

            agents::require_agent(tx, assignee)?;
            let task = require_task(tx, task_id)?;
            if task.status.is_terminal() {
                return Err(CommsError::Blocked(format!("Task #{} is closed.", task_id)));
            }

            tx.execute(
                "UPDATE tasks SET assigned_to = ?1, status = 'assigned', updated_at = ?2
                 WHERE id = ?3",
                params![assignee, ts(now()), task_id],
            )?;

            let mut unresolved_blockers = Vec::new();
            for blocker in &task.blocked_by {
                let resolved = find_task(tx, *blocker)?
                    .map(|b| b.status.is_terminal())
                    .unwrap_or(true);
                if !resolved {
                    unresolved_blockers.push(*blocker);
                }
            }

            tracing::info!(agent, task_id, assignee, "task assigned");
            Ok(TaskAssignment {
                task: require_task(tx, task_id)?,
                unresolved_blockers,
            })
        })
    }

    /// Record progress on a task. Any registered agent; never closes.
    pub fn update_task(&self, agent: &str, task_id: i64, input: UpdateTaskInput) -> Result<Task> {
        if input.status == Some(TaskStatus::Closed) {
            return Err(CommsError::Blocked(
                "Cannot set status to 'closed' via update_task. Use close_task instead.".into(),
            ));
        }
        self.transaction(|tx| {
            agents::require_agent(tx, agent)?;
            let task = require_task(tx, task_id)?;
            if task.status.is_terminal() {
                return Err(CommsError::Blocked(format!(
                    "Task #{} is closed. No further updates allowed.",
                    task_id
                )));
            }

            let at = now();
            let mut sql = String::from("UPDATE tasks SET activity_count = activity_count + 1, updated_at = ?");
            let mut values: Vec<Value> = vec![Value::Text(ts(at))];

            if let Some(status) = input.status {
                sql.push_str(", status = ?");
                values.push(Value::Text(status.as_str().to_string()));
            }
            if let Some(progress) = non_empty(input.progress.as_deref()) {
                sql.push_str(", progress = ?");
                values.push(Value::Text(progress.to_string()));
            }
            if let Some(files) = input.files.as_ref().filter(|f| !f.is_empty()) {
                sql.push_str(", files = ?");
                values.push(Value::Text(serde_json::to_string(files)?));
            }
            sql.push_str(" WHERE id = ?");
            values.push(Value::Integer(task_id));

            tx.execute(&sql, params_from_iter(values))?;
            agents::touch(tx, agent, at)?;

            let updated = require_task(tx, task_id)?;
            if updated.is_dragging() {
                tracing::warn!(task_id, activity = updated.activity_count, "task is dragging");
            }
            Ok(updated)
        })
    }

    pub fn get_task(&self, task_id: i64) -> Result<Task> {
        self.with_connection(|conn| require_task(conn, task_id))
    }

    /// List tasks newest first. Without a status filter only open, assigned
    /// and in-progress tasks are returned.
    pub fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_connection(|conn| {
            let mut sql = format!("SELECT {} FROM tasks WHERE 1=1", TASK_COLUMNS);
            let mut values: Vec<Value> = Vec::new();

            match filter.status {
                Some(status) => {
                    sql.push_str(" AND status = ?");
                    values.push(Value::Text(status.as_str().to_string()));
                }
                None => {
                    let active = TaskStatus::ACTIVE
                        .iter()
                        .map(|s| format!("'{}'", s.as_str()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    sql.push_str(&format!(" AND status IN ({})", active));
                }
            }

            for (column, value) in [
                ("project", filter.project.as_deref()),
                ("zone", filter.zone.as_deref()),
                ("assigned_to", filter.assigned_to.as_deref()),
            ] {
                if let Some(value) = non_empty(value) {
                    sql.push_str(&format!(" AND {} = ?", column));
                    values.push(Value::Text(value.to_string()));
                }
            }

            sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
            values.push(Value::Integer(i64::from(filter.count)));

            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_from_iter(values), task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Attach a result artifact. Does not change status.
    pub fn submit_result(&self, agent: &str, task_id: i64, result_file: &str) -> Result<Task> {
        self.transaction(|tx| {
            agents::require_agent(tx, agent)?;
            let task = require_task(tx, task_id)?;
            if task.status.is_terminal() {
                return Err(CommsError::Blocked(format!(
                    "Task #{} is closed. No further updates allowed.",
                    task_id
                )));
            }
            require_file(result_file, "Result file")?;

            let at = now();
            tx.execute(
                "UPDATE tasks SET result_file = ?1, updated_at = ?2 WHERE id = ?3",
                params![result_file, ts(at), task_id],
            )?;
            agents::touch(tx, agent, at)?;
            tracing::info!(agent, task_id, result_file, "result submitted");
            require_task(tx, task_id)
        })
    }

    /// Close a task for good. Lead only, needs a submitted result.
    pub fn close_task(&self, agent: &str, task_id: i64) -> Result<Task> {
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "close tasks")?;
            let task = require_task(tx, task_id)?;
            if task.status.is_terminal() {
                return Err(CommsError::Blocked(format!(
                    "Task #{} is already closed.",
                    task_id
                )));
            }
            if task.result_file.is_none() {
                return Err(CommsError::Blocked(format!(
                    "Task #{} has no result file. Agent must call submit_result before lead can close.",
                    task_id
                )));
            }

            tx.execute(
                "UPDATE tasks SET status = 'closed', updated_at = ?1 WHERE id = ?2",
                params![ts(now()), task_id],
            )?;
            tracing::info!(agent, task_id, "task closed");
            require_task(tx, task_id)
        })
    }
}
