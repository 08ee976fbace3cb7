//! The application shell: owns state, history, storage, theme and draft,
//! and turns each user step into a reduction plus its side effects.

use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use super::actions::TaskAction;
use super::config::Config;
use super::draft::TaskDraft;
use super::error::StorageError;
use super::error::TaskError;
use super::history::History;
use super::ids::Clock;
use super::ids::IdGenerator;
use super::persistence::KeyValueStore;
use super::persistence::TaskStorage;
use super::reducer::reduce;
use super::reducer::ReduceContext;
use super::reducer::TaskEffect;
use super::state::RawTask;
use super::state::Snapshot;
use super::state::Task;
use super::state::TaskState;
use super::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
}

/// A short message for the user. Notices never carry state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "{}", self.message),
            NoticeLevel::Success => write!(f, "ok: {}", self.message),
            NoticeLevel::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

pub struct Session<S> {
    state: TaskState,
    history: History<Snapshot>,
    storage: TaskStorage<S>,
    theme: Theme,
    draft: TaskDraft,
    config: Config,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    last_saved: Option<DateTime<Utc>>,
    unsaved: bool,
}

impl<S: KeyValueStore> Session<S> {
    /// Hydrates a session from storage. Load failures never abort: the
    /// session starts empty and the returned notices say why.
    pub fn open(
        mut storage: TaskStorage<S>,
        config: Config,
        mut ids: Box<dyn IdGenerator>,
        clock: Box<dyn Clock>,
    ) -> (Self, Vec<Notice>) {
        let mut notices = Vec::new();
        let theme = Theme::load(&mut storage);

        let records = match storage.load() {
            Ok(records) => records,
            Err(err @ StorageError::Corrupt { .. }) => {
                tracing::warn!(error = %err, "stored tasks are unreadable");
                match storage.quarantine_corrupt() {
                    Ok(Some(backup)) => notices.push(Notice::warning(format!(
                        "Stored tasks were unreadable and were moved to {backup}"
                    ))),
                    Ok(None) => {}
                    Err(err) => notices.push(Notice::warning(format!(
                        "Stored tasks were unreadable and could not be backed up: {err}"
                    ))),
                }
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not load tasks");
                notices.push(Notice::warning(format!(
                    "Could not load tasks: {err}. Changes may not be saved."
                )));
                Vec::new()
            }
        };

        let now = clock.now();
        let mut state = TaskState::new(config.view.default_filter);
        let count = records.len();
        let mut ctx = ReduceContext::new(now, ids.as_mut());
        if let Err(err) = reduce(&mut state, TaskAction::LoadTasks(records), &mut ctx) {
            tracing::warn!(error = %err, "hydration rejected");
        }
        if count > 0 {
            tracing::info!(count, "loaded tasks from storage");
            notices.push(Notice::success(format!("Loaded {count} tasks from storage")));
        }

        let history = History::new(state.tasks.clone(), config.history.capacity);
        let draft = TaskDraft::new(config.history.draft_capacity);
        let session = Self {
            state,
            history,
            storage,
            theme,
            draft,
            config,
            ids,
            clock,
            last_saved: Some(now),
            unsaved: false,
        };
        (session, notices)
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.state.visible_tasks()
    }

    pub fn history(&self) -> &History<Snapshot> {
        &self.history
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut TaskDraft {
        &mut self.draft
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &TaskStorage<S> {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut TaskStorage<S> {
        &mut self.storage
    }

    pub fn next_id(&mut self) -> String {
        self.ids.next_id()
    }

    /// True when the last write of the task list failed.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    /// Writes the task list now, returning the storage error instead of a
    /// notice.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        let now = self.clock.now();
        self.storage.save(&self.state.tasks)?;
        self.last_saved = Some(now);
        self.unsaved = false;
        Ok(())
    }

    /// Reduces one action. Task changes are recorded in history and written
    /// through; a failed write is reported as a warning and the in-memory
    /// state stands.
    pub fn dispatch(&mut self, action: TaskAction) -> Result<Vec<Notice>, TaskError> {
        let kind = action.kind();
        let now = self.clock.now();
        let mut ctx = ReduceContext::new(now, self.ids.as_mut());
        let effects = match reduce(&mut self.state, action, &mut ctx) {
            Ok(effects) => effects,
            Err(err) => {
                tracing::debug!(action = kind, error = %err, "action rejected");
                return Err(err);
            }
        };
        tracing::debug!(action = kind, ?effects, "action applied");

        let mut notices = Vec::new();
        if effects.contains(&TaskEffect::TasksChanged) {
            self.history.record(self.state.tasks.clone());
            notices.extend(self.persist(now));
        }
        Ok(notices)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Result<Vec<Notice>, TaskError> {
        let snapshot = self.history.undo()?.clone();
        self.replay(snapshot)
    }

    pub fn redo(&mut self) -> Result<Vec<Notice>, TaskError> {
        let snapshot = self.history.redo()?.clone();
        self.replay(snapshot)
    }

    /// Loads a history snapshot back into state without recording it again.
    fn replay(&mut self, snapshot: Snapshot) -> Result<Vec<Notice>, TaskError> {
        let records = snapshot.iter().map(RawTask::from).collect();
        let now = self.clock.now();
        let mut ctx = ReduceContext::new(now, self.ids.as_mut());
        reduce(&mut self.state, TaskAction::LoadTasks(records), &mut ctx)?;
        tracing::debug!(
            undo = self.history.undo_depth(),
            redo = self.history.redo_depth(),
            "replayed snapshot"
        );
        Ok(self.persist(now).into_iter().collect())
    }

    /// Showing secret tasks needs the shared password; hiding them does not.
    pub fn toggle_secret(&mut self, password: Option<&str>) -> Result<Vec<Notice>, TaskError> {
        if !self.state.show_secret && password != Some(self.config.secret.password.as_str()) {
            tracing::warn!("secret tasks requested with a wrong password");
            return Err(TaskError::AccessDenied);
        }
        self.dispatch(TaskAction::ToggleSecretTasks)
    }

    pub fn set_secret_visible(
        &mut self,
        visible: bool,
        password: Option<&str>,
    ) -> Result<Vec<Notice>, TaskError> {
        if self.state.show_secret == visible {
            return Ok(Vec::new());
        }
        self.toggle_secret(password)
    }

    /// Loads a task into the draft for editing.
    pub fn begin_edit(&mut self, id: &str) -> Result<(), TaskError> {
        let task = self
            .state
            .task(id)
            .ok_or_else(|| TaskError::task_not_found(id))?;
        self.draft.begin_edit(task);
        Ok(())
    }

    /// Dispatches the draft and clears it once the action is accepted.
    pub fn submit_draft(&mut self) -> Result<Vec<Notice>, TaskError> {
        let action = self.draft.to_action(self.ids.as_mut())?;
        let notices = self.dispatch(action)?;
        self.draft.clear();
        Ok(notices)
    }

    /// Autosave hook for the front end's loop. Writes when autosave is on
    /// and the interval has passed since the last successful save.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Notice> {
        let autosave = &self.config.autosave;
        if !autosave.enabled {
            return None;
        }
        // Intervals too large for a TimeDelta are never due.
        let Some(interval) = i64::try_from(autosave.interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
        else {
            return None;
        };
        let due = match self.last_saved {
            Some(at) => now.signed_duration_since(at) >= interval,
            None => true,
        };
        if !due {
            return None;
        }
        tracing::trace!("autosave");
        self.persist(now)
    }

    pub fn toggle_theme(&mut self) -> Vec<Notice> {
        match self.theme.toggle(&mut self.storage) {
            Ok(dark) => {
                tracing::debug!(dark, "theme toggled");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not save theme");
                vec![Notice::warning(format!("Could not save theme: {err}"))]
            }
        }
    }

    /// Empties the task list (undoable) and removes the stored copy.
    pub fn clear_all(&mut self) -> Result<Vec<Notice>, TaskError> {
        let mut notices = self.dispatch(TaskAction::LoadTasks(Vec::new()))?;
        match self.storage.clear() {
            Ok(()) => notices.push(Notice::info("Cleared stored tasks")),
            Err(err) => notices.push(Notice::warning(format!(
                "Could not clear stored tasks: {err}"
            ))),
        }
        Ok(notices)
    }

    fn persist(&mut self, now: DateTime<Utc>) -> Option<Notice> {
        match self.storage.save(&self.state.tasks) {
            Ok(()) => {
                self.last_saved = Some(now);
                self.unsaved = false;
                None
            }
            Err(err) => {
                self.unsaved = true;
                tracing::warn!(error = %err, "failed to save tasks");
                Some(Notice::warning(format!(
                    "Could not save tasks: {err}. Changes are kept in memory only."
                )))
            }
        }
    }
}
