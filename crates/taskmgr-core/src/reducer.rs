use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use super::actions::NewTask;
use super::actions::TaskAction;
use super::actions::TaskUpdate;
use super::error::TaskError;
use super::ids::IdGenerator;
use super::state::normalize_all;
use super::state::validate_color;
use super::state::SubTask;
use super::state::Task;
use super::state::TaskState;
use super::state::DEFAULT_BACKGROUND_COLOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEffect {
    /// The task list changed: record history and persist.
    TasksChanged,
    /// Only view state (filter, secret visibility, hide-completed) changed.
    ViewChanged,
}

/// Everything a reduction may read besides state and action. One `now`
/// is used for the whole step.
pub struct ReduceContext<'a> {
    pub now: DateTime<Utc>,
    pub ids: &'a mut dyn IdGenerator,
}

impl<'a> ReduceContext<'a> {
    pub fn new(now: DateTime<Utc>, ids: &'a mut dyn IdGenerator) -> Self {
        Self { now, ids }
    }
}

/// Applies `action` to `state`. On error the state is left exactly as it
/// was; `NotFound` and `InvalidArgument` are no-ops for the caller to
/// report.
pub fn reduce(
    state: &mut TaskState,
    action: TaskAction,
    ctx: &mut ReduceContext<'_>,
) -> Result<Vec<TaskEffect>, TaskError> {
    match action {
        TaskAction::AddTask(payload) => {
            let task = new_task(payload, state.show_secret, ctx.now)?;
            Arc::make_mut(&mut state.tasks).push(task);
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::DeleteTask(id) => {
            let idx = task_index(state, &id)?;
            Arc::make_mut(&mut state.tasks).remove(idx);
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::ToggleComplete(id) => {
            let task = task_mut(state, &id)?;
            task.completed = !task.completed;
            task.updated_at = ctx.now;
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::UpdateTask { id, updates } => {
            let idx = task_index(state, &id)?;
            let merged = merge_update(&state.tasks[idx], updates, ctx.now)?;
            Arc::make_mut(&mut state.tasks)[idx] = merged;
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::SetTaskColor { id, color } => {
            let color = validate_color(&color)?;
            let task = task_mut(state, &id)?;
            task.background_color = color;
            task.updated_at = ctx.now;
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::AddSubtask { task_id, title } => {
            let title = non_blank(title, "subtask title")?;
            let idx = task_index(state, &task_id)?;
            let subtask = SubTask {
                id: ctx.ids.next_id(),
                title,
                completed: false,
            };
            let task = &mut Arc::make_mut(&mut state.tasks)[idx];
            task.sub_tasks.push(subtask);
            task.updated_at = ctx.now;
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::ToggleSubtask {
            task_id,
            subtask_id,
        } => {
            let idx = task_index(state, &task_id)?;
            let sub_idx = state.tasks[idx]
                .sub_tasks
                .iter()
                .position(|subtask| subtask.id == subtask_id)
                .ok_or_else(|| TaskError::subtask_not_found(subtask_id))?;
            let task = &mut Arc::make_mut(&mut state.tasks)[idx];
            let subtask = &mut task.sub_tasks[sub_idx];
            subtask.completed = !subtask.completed;
            task.updated_at = ctx.now;
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::ToggleTaskExpand(id) => {
            let task = task_mut(state, &id)?;
            task.is_expanded = !task.is_expanded;
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::ToggleSecretTasks => {
            state.show_secret = !state.show_secret;
            Ok(vec![TaskEffect::ViewChanged])
        }
        TaskAction::RemoveSecret(id) => {
            let task = task_mut(state, &id)?;
            task.is_secret = false;
            task.updated_at = ctx.now;
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::SetFilter(filter) => {
            state.filter = filter;
            Ok(vec![TaskEffect::ViewChanged])
        }
        TaskAction::ToggleHideCompleted => {
            state.hide_completed = !state.hide_completed;
            Ok(vec![TaskEffect::ViewChanged])
        }
        TaskAction::LoadTasks(records) => {
            state.tasks = Arc::new(normalize_all(records, ctx.now, &mut *ctx.ids));
            Ok(vec![TaskEffect::TasksChanged])
        }
        TaskAction::Unknown => Ok(Vec::new()),
    }
}

fn new_task(payload: NewTask, show_secret: bool, now: DateTime<Utc>) -> Result<Task, TaskError> {
    if payload.id.trim().is_empty() {
        return Err(TaskError::InvalidArgument(
            "task id must not be empty".to_string(),
        ));
    }
    let heading = non_blank(payload.title, "task title")?;
    let title = match payload.description {
        Some(description) if !description.trim().is_empty() => {
            format!("{heading}\n{description}")
        }
        _ => heading,
    };
    let background_color = match payload.background_color {
        Some(color) => validate_color(&color)?,
        None => DEFAULT_BACKGROUND_COLOR.to_string(),
    };
    let created_at = payload.created_at.unwrap_or(now);

    Ok(Task {
        id: payload.id,
        title,
        completed: payload.completed,
        created_at,
        updated_at: now,
        background_color,
        // Tasks added while secrets are shown join the secret class.
        is_secret: payload.is_secret || show_secret,
        is_expanded: false,
        priority: payload.priority,
        sub_tasks: payload.sub_tasks,
    })
}

fn merge_update(task: &Task, updates: TaskUpdate, now: DateTime<Utc>) -> Result<Task, TaskError> {
    let mut next = task.clone();

    if let Some(title) = updates.title {
        next.title = non_blank(title, "task title")?;
    }
    if let Some(description) = updates.description {
        let heading = next.heading().to_string();
        next.title = if description.trim().is_empty() {
            heading
        } else {
            format!("{heading}\n{description}")
        };
    }
    if let Some(color) = updates.background_color {
        next.background_color = validate_color(&color)?;
    }
    if let Some(completed) = updates.completed {
        next.completed = completed;
    }
    if let Some(is_secret) = updates.is_secret {
        next.is_secret = is_secret;
    }
    if let Some(is_expanded) = updates.is_expanded {
        next.is_expanded = is_expanded;
    }
    if let Some(priority) = updates.priority {
        next.priority = Some(priority);
    }
    next.updated_at = now;
    Ok(next)
}

fn non_blank(value: String, what: &str) -> Result<String, TaskError> {
    if value.trim().is_empty() {
        Err(TaskError::InvalidArgument(format!("{what} must not be blank")))
    } else {
        Ok(value)
    }
}

fn task_index(state: &TaskState, id: &str) -> Result<usize, TaskError> {
    state
        .tasks
        .iter()
        .position(|task| task.id == id)
        .ok_or_else(|| TaskError::task_not_found(id))
}

fn task_mut<'a>(state: &'a mut TaskState, id: &str) -> Result<&'a mut Task, TaskError> {
    let idx = task_index(state, id)?;
    Ok(&mut Arc::make_mut(&mut state.tasks)[idx])
}

#[cfg(test)]
mod tests;
