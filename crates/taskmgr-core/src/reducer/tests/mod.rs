use chrono::DateTime;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;

pub(super) use super::reduce;
pub(super) use super::ReduceContext;
pub(super) use super::TaskEffect;
pub(super) use crate::actions::NewTask;
pub(super) use crate::actions::TaskAction;
pub(super) use crate::actions::TaskUpdate;
pub(super) use crate::error::TaskError;
pub(super) use crate::ids::SequentialIds;
pub(super) use crate::state::Filter;
pub(super) use crate::state::Priority;
pub(super) use crate::state::RawTask;
pub(super) use crate::state::TaskState;
pub(super) use crate::state::DEFAULT_BACKGROUND_COLOR;

mod filters;

/// Drives the reducer with a deterministic clock and id source.
struct Harness {
    state: TaskState,
    ids: SequentialIds,
    now: DateTime<Utc>,
}

impl Harness {
    fn new() -> Self {
        Self {
            state: TaskState::default(),
            ids: SequentialIds::new("sub-"),
            now: t0(),
        }
    }

    fn tick(&mut self) {
        self.now += Duration::seconds(1);
    }

    fn run(&mut self, action: TaskAction) -> Result<Vec<TaskEffect>, TaskError> {
        let mut ctx = ReduceContext::new(self.now, &mut self.ids);
        reduce(&mut self.state, action, &mut ctx)
    }

    fn ok(&mut self, action: TaskAction) -> Vec<TaskEffect> {
        self.run(action).expect("reduce")
    }

    fn add(&mut self, id: &str, title: &str) {
        let effects = self.ok(TaskAction::AddTask(NewTask::new(id, title)));
        assert!(matches!(effects.as_slice(), [TaskEffect::TasksChanged]));
    }

    fn visible_ids(&self) -> Vec<String> {
        self.state
            .visible_tasks()
            .iter()
            .map(|task| task.id.clone())
            .collect()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}
