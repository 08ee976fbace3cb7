use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::error::TaskError;
use super::state::lenient_id;
use super::state::Filter;
use super::state::Priority;
use super::state::RawTask;
use super::state::SubTask;

/// The closed set of task-state transitions. The serde form is the
/// `{ "type": "ADD_TASK", "payload": ... }` envelope front ends dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    AddTask(NewTask),
    DeleteTask(#[serde(deserialize_with = "lenient_id")] String),
    ToggleComplete(#[serde(deserialize_with = "lenient_id")] String),
    UpdateTask {
        #[serde(deserialize_with = "lenient_id")]
        id: String,
        updates: TaskUpdate,
    },
    SetTaskColor {
        #[serde(deserialize_with = "lenient_id")]
        id: String,
        color: String,
    },
    #[serde(rename_all = "camelCase")]
    AddSubtask {
        #[serde(deserialize_with = "lenient_id")]
        task_id: String,
        title: String,
    },
    #[serde(rename_all = "camelCase")]
    ToggleSubtask {
        #[serde(deserialize_with = "lenient_id")]
        task_id: String,
        #[serde(deserialize_with = "lenient_id")]
        subtask_id: String,
    },
    ToggleTaskExpand(#[serde(deserialize_with = "lenient_id")] String),
    ToggleSecretTasks,
    RemoveSecret(#[serde(deserialize_with = "lenient_id")] String),
    SetFilter(Filter),
    ToggleHideCompleted,
    LoadTasks(Vec<RawTask>),
    #[serde(other)]
    Unknown,
}

const KNOWN_KINDS: &[&str] = &[
    "ADD_TASK",
    "DELETE_TASK",
    "TOGGLE_COMPLETE",
    "UPDATE_TASK",
    "SET_TASK_COLOR",
    "ADD_SUBTASK",
    "TOGGLE_SUBTASK",
    "TOGGLE_TASK_EXPAND",
    "TOGGLE_SECRET_TASKS",
    "REMOVE_SECRET",
    "SET_FILTER",
    "TOGGLE_HIDE_COMPLETED",
    "LOAD_TASKS",
];

impl TaskAction {
    /// Parses a JSON action envelope. Unknown `type` values become
    /// [`TaskAction::Unknown`]; malformed payloads are `InvalidArgument`.
    pub fn from_json(input: &str) -> Result<Self, TaskError> {
        let value: serde_json::Value = serde_json::from_str(input)
            .map_err(|err| TaskError::InvalidArgument(format!("action is not JSON: {err}")))?;
        let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
            return Err(TaskError::InvalidArgument(
                "action is missing a string \"type\"".to_string(),
            ));
        };
        if !KNOWN_KINDS.contains(&kind) {
            return Ok(Self::Unknown);
        }
        let kind = kind.to_string();
        serde_json::from_value(value)
            .map_err(|err| TaskError::InvalidArgument(format!("malformed {kind} payload: {err}")))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddTask(_) => "ADD_TASK",
            Self::DeleteTask(_) => "DELETE_TASK",
            Self::ToggleComplete(_) => "TOGGLE_COMPLETE",
            Self::UpdateTask { .. } => "UPDATE_TASK",
            Self::SetTaskColor { .. } => "SET_TASK_COLOR",
            Self::AddSubtask { .. } => "ADD_SUBTASK",
            Self::ToggleSubtask { .. } => "TOGGLE_SUBTASK",
            Self::ToggleTaskExpand(_) => "TOGGLE_TASK_EXPAND",
            Self::ToggleSecretTasks => "TOGGLE_SECRET_TASKS",
            Self::RemoveSecret(_) => "REMOVE_SECRET",
            Self::SetFilter(_) => "SET_FILTER",
            Self::ToggleHideCompleted => "TOGGLE_HIDE_COMPLETED",
            Self::LoadTasks(_) => "LOAD_TASKS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
}

impl NewTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update: only `Some` fields are applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replaces the body lines of the title, keeping its heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl TaskUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
