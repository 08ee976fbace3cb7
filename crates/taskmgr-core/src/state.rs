use std::str::FromStr;
use std::sync::Arc;
use std::sync::OnceLock;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::TimeZone;
use chrono::Utc;
use regex::Regex;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use super::error::TaskError;
use super::ids::IdGenerator;

pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";

/// Shared, copy-on-write task list. History snapshots hold clones of this
/// `Arc`, so mutating the live state never disturbs a captured snapshot.
pub type Snapshot = Arc<Vec<Task>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Hidden,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Hidden => "hidden",
        }
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "hidden" => Ok(Self::Hidden),
            other => Err(TaskError::InvalidArgument(format!(
                "unknown priority {other:?} (expected low, medium, high or hidden)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    All,
    #[default]
    Active,
    Completed,
    Hidden,
}

impl Filter {
    pub const ALL: [Filter; 4] = [Self::All, Self::Active, Self::Completed, Self::Hidden];

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Hidden => "hidden",
        }
    }

    /// `hidden` selects only hidden-priority tasks; every other filter
    /// leaves them out.
    pub fn matches(self, task: &Task) -> bool {
        let hidden = task.priority == Some(Priority::Hidden);
        match self {
            Self::All => !hidden,
            Self::Active => !hidden && !task.completed,
            Self::Completed => !hidden && task.completed,
            Self::Hidden => hidden,
        }
    }
}

impl FromStr for Filter {
    type Err = TaskError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|filter| filter.label().eq_ignore_ascii_case(input.trim()))
            .ok_or_else(|| {
                TaskError::InvalidArgument(format!(
                    "unknown filter {input:?} (expected all, active, completed or hidden)"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub background_color: String,
    pub is_secret: bool,
    pub is_expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
}

impl Task {
    pub fn heading(&self) -> &str {
        self.title.lines().next().unwrap_or("")
    }

    pub fn body(&self) -> Option<&str> {
        self.title
            .split_once('\n')
            .map(|(_, body)| body.trim_end())
            .filter(|body| !body.trim().is_empty())
    }

    /// Subtasks in display order: insertion order, completed ones last.
    pub fn ordered_subtasks(&self) -> Vec<&SubTask> {
        let mut ordered: Vec<&SubTask> = self.sub_tasks.iter().collect();
        ordered.sort_by_key(|subtask| subtask.completed);
        ordered
    }

    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self
            .sub_tasks
            .iter()
            .filter(|subtask| subtask.completed)
            .count();
        (done, self.sub_tasks.len())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskState {
    pub tasks: Snapshot,
    pub filter: Filter,
    pub show_secret: bool,
    pub hide_completed: bool,
}

impl TaskState {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn is_visible(&self, task: &Task) -> bool {
        if task.is_secret && !self.show_secret {
            return false;
        }
        if self.hide_completed && task.completed {
            return false;
        }
        self.filter.matches(task)
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.is_visible(task))
            .collect()
    }
}

/// A persisted task record as found in storage, before normalization.
/// Every field is optional so older and hand-edited records still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTask {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_optional_text"
    )]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub completed: Option<bool>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub background_color: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_secret: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_expanded: Option<bool>,
    #[serde(deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,
    #[serde(deserialize_with = "lenient_subtasks")]
    pub sub_tasks: Option<Vec<RawSubTask>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSubTask {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub completed: Option<bool>,
}

impl RawTask {
    pub fn normalize(self, now: DateTime<Utc>, ids: &mut dyn IdGenerator) -> Task {
        let id = if self.id.trim().is_empty() {
            ids.next_id()
        } else {
            self.id
        };

        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| timestamp_from_id(&id))
            .unwrap_or(now);
        let updated_at = self
            .updated_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(created_at);

        let title = match self.description {
            Some(description) if !description.trim().is_empty() => {
                format!("{}\n{}", self.title, description)
            }
            _ => self.title,
        };

        let background_color = self
            .background_color
            .filter(|color| is_hex_color(color))
            .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string());

        let sub_tasks = self
            .sub_tasks
            .unwrap_or_default()
            .into_iter()
            .map(|subtask| SubTask {
                id: if subtask.id.trim().is_empty() {
                    ids.next_id()
                } else {
                    subtask.id
                },
                title: subtask.title,
                completed: subtask.completed.unwrap_or(false),
            })
            .collect();

        Task {
            id,
            title,
            completed: self.completed.unwrap_or(false),
            created_at,
            updated_at,
            background_color,
            is_secret: self.is_secret.unwrap_or(false),
            is_expanded: self.is_expanded.unwrap_or(false),
            priority: self.priority,
            sub_tasks,
        }
    }
}

impl From<&Task> for RawTask {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: None,
            completed: Some(task.completed),
            created_at: Some(format_timestamp(task.created_at)),
            updated_at: Some(format_timestamp(task.updated_at)),
            background_color: Some(task.background_color.clone()),
            is_secret: Some(task.is_secret),
            is_expanded: Some(task.is_expanded),
            priority: task.priority,
            sub_tasks: Some(
                task.sub_tasks
                    .iter()
                    .map(|subtask| RawSubTask {
                        id: subtask.id.clone(),
                        title: subtask.title.clone(),
                        completed: Some(subtask.completed),
                    })
                    .collect(),
            ),
        }
    }
}

pub fn normalize_all(
    raw: Vec<RawTask>,
    now: DateTime<Utc>,
    ids: &mut dyn IdGenerator,
) -> Vec<Task> {
    raw.into_iter().map(|task| task.normalize(now, ids)).collect()
}

pub fn is_hex_color(input: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}){1,2}$").expect("hex color pattern"))
        .is_match(input)
}

pub fn validate_color(input: &str) -> Result<String, TaskError> {
    let color = input.trim();
    if is_hex_color(color) {
        Ok(color.to_string())
    } else {
        Err(TaskError::InvalidArgument(format!(
            "invalid color {input:?} (expected #rgb or #rrggbb)"
        )))
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn timestamp_from_id(id: &str) -> Option<DateTime<Utc>> {
    timestamp_from_millis(id.trim().parse::<i64>().ok()?)
}

fn timestamp_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Any JSON value, sorted into the shapes a stored field may take.
/// Arrays, objects and null all land in `Other`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

/// Accepts ids stored as strings or as bare JSON numbers.
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer)
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Text(text) => text,
        Lenient::Int(value) => value.to_string(),
        Lenient::Float(value) => value.to_string(),
        Lenient::Bool(_) | Lenient::Other(_) => String::new(),
    })
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Text(text) => Some(text),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Bool(flag) => Some(flag),
        _ => None,
    })
}

/// RFC 3339 text is kept as is; numbers are read as epoch milliseconds.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Text(text) => Some(text),
        Lenient::Int(millis) => timestamp_from_millis(millis).map(format_timestamp),
        Lenient::Float(millis) if millis.is_finite() => {
            timestamp_from_millis(millis as i64).map(format_timestamp)
        }
        _ => None,
    })
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_text(deserializer)?.and_then(|raw| raw.parse().ok()))
}

/// Keeps the readable entries of a subtask list and drops the rest.
fn lenient_subtasks<'de, D>(deserializer: D) -> Result<Option<Vec<RawSubTask>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum List {
        Items(Vec<serde_json::Value>),
        Other(IgnoredAny),
    }

    Ok(match List::deserialize(deserializer)? {
        List::Items(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        List::Other(_) => None,
    })
}
