use super::*;
use pretty_assertions::assert_eq;

fn seeded() -> Harness {
    let mut h = Harness::new();
    h.add("1", "open");
    h.add("2", "done");
    h.ok(TaskAction::ToggleComplete("2".to_string()));
    h.ok(TaskAction::AddTask(NewTask {
        is_secret: true,
        completed: true,
        ..NewTask::new("3", "secret done")
    }));
    h.ok(TaskAction::AddTask(NewTask {
        priority: Some(Priority::Hidden),
        ..NewTask::new("4", "parked")
    }));
    h
}

#[test]
fn default_filter_is_active() {
    let h = seeded();
    assert_eq!(h.state.filter, Filter::Active);
    assert_eq!(h.visible_ids(), vec!["1".to_string()]);
}

#[test]
fn completed_filter_shows_only_completed_non_secret() {
    let mut h = seeded();
    let effects = h.ok(TaskAction::SetFilter(Filter::Completed));
    assert!(matches!(effects.as_slice(), [TaskEffect::ViewChanged]));
    assert_eq!(h.visible_ids(), vec!["2".to_string()]);

    h.ok(TaskAction::ToggleSecretTasks);
    assert_eq!(h.visible_ids(), vec!["2".to_string(), "3".to_string()]);
}

#[test]
fn all_and_hidden_filters_partition_on_priority() {
    let mut h = seeded();
    h.ok(TaskAction::SetFilter(Filter::All));
    assert_eq!(h.visible_ids(), vec!["1".to_string(), "2".to_string()]);

    h.ok(TaskAction::SetFilter(Filter::Hidden));
    assert_eq!(h.visible_ids(), vec!["4".to_string()]);
}

#[test]
fn hide_completed_toggle_is_view_only() {
    let mut h = seeded();
    h.ok(TaskAction::SetFilter(Filter::All));
    let tasks_before = h.state.tasks.clone();

    let effects = h.ok(TaskAction::ToggleHideCompleted);
    assert!(matches!(effects.as_slice(), [TaskEffect::ViewChanged]));
    assert_eq!(h.visible_ids(), vec!["1".to_string()]);
    assert_eq!(h.state.tasks, tasks_before);
}

#[test]
fn filter_change_does_not_mutate_tasks() {
    let mut h = seeded();
    let before = h.state.tasks.clone();
    h.ok(TaskAction::SetFilter(Filter::Completed));
    assert!(std::sync::Arc::ptr_eq(&before, &h.state.tasks));
}
