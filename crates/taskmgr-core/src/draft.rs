//! Editor state for the task text field, with its own undo history.
//!
//! The draft either composes a new task or edits an existing one; which
//! one is decided by `begin_edit`, a direct call made by whoever wants a
//! task edited.

use super::actions::NewTask;
use super::actions::TaskAction;
use super::actions::TaskUpdate;
use super::error::TaskError;
use super::history::History;
use super::ids::IdGenerator;
use super::state::Task;

pub const DEFAULT_DRAFT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    text: History<String>,
    editing: Option<String>,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self::new(DEFAULT_DRAFT_CAPACITY)
    }
}

impl TaskDraft {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: History::new(String::new(), capacity),
            editing: None,
        }
    }

    pub fn text(&self) -> &str {
        self.text.present()
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != *self.text.present() {
            self.text.record(text);
        }
    }

    pub fn undo(&mut self) -> Result<&str, TaskError> {
        self.text.undo().map(String::as_str)
    }

    pub fn redo(&mut self) -> Result<&str, TaskError> {
        self.text.redo().map(String::as_str)
    }

    pub fn begin_edit(&mut self, task: &Task) {
        self.text.reset(task.title.clone());
        self.editing = Some(task.id.clone());
    }

    pub fn cancel_edit(&mut self) {
        self.clear();
    }

    pub fn clear(&mut self) {
        self.text.reset(String::new());
        self.editing = None;
    }

    /// Builds the action this draft would submit. New tasks take a fresh id
    /// from `ids`; edits only touch the title.
    pub fn to_action(&self, ids: &mut dyn IdGenerator) -> Result<TaskAction, TaskError> {
        if self.is_empty() {
            return Err(TaskError::InvalidArgument(
                "task text must not be blank".to_string(),
            ));
        }
        let text = self.text().to_string();
        Ok(match &self.editing {
            Some(id) => TaskAction::UpdateTask {
                id: id.clone(),
                updates: TaskUpdate::title(text),
            },
            None => TaskAction::AddTask(NewTask::new(ids.next_id(), text)),
        })
    }
}
