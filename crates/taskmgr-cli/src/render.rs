//! Plain-text views of the task list.

use std::fmt::Write as _;

use taskmgr_core::Task;
use taskmgr_core::TaskState;
use taskmgr_core::Theme;
use taskmgr_core::DEFAULT_BACKGROUND_COLOR;

const INDENT: &str = "      ";

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

pub fn status_line(state: &TaskState, theme: Theme) -> String {
    format!(
        "filter: {} | secret: {} | hide completed: {} | theme: {} | {} of {} tasks",
        state.filter.label(),
        if state.show_secret { "shown" } else { "hidden" },
        on_off(state.hide_completed),
        theme.label(),
        state.visible_tasks().len(),
        state.tasks.len(),
    )
}

pub fn task_list(state: &TaskState) -> String {
    let visible = state.visible_tasks();
    if visible.is_empty() {
        return "No tasks\n".to_string();
    }
    let mut out = String::new();
    for task in visible {
        out.push_str(&task_block(task));
    }
    out
}

/// One line per task; expanded tasks add their body and subtasks below.
pub fn task_block(task: &Task) -> String {
    let mut out = String::new();
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let _ = write!(out, "{mark} {}  {}", task.id, task.heading());
    if let Some(priority) = task.priority {
        let _ = write!(out, "  !{}", priority.label());
    }
    if task.background_color != DEFAULT_BACKGROUND_COLOR {
        let _ = write!(out, "  {}", task.background_color);
    }
    if task.is_secret {
        out.push_str("  (secret)");
    }
    let (done, total) = task.subtask_progress();
    if total > 0 {
        let _ = write!(out, "  {done}/{total}");
    }
    let has_details = task.body().is_some() || total > 0;
    if has_details && !task.is_expanded {
        out.push_str("  ...");
    }
    out.push('\n');

    if task.is_expanded {
        if let Some(body) = task.body() {
            for line in body.lines() {
                let _ = writeln!(out, "{INDENT}{line}");
            }
        }
        for subtask in task.ordered_subtasks() {
            let mark = if subtask.completed { "[x]" } else { "[ ]" };
            let _ = writeln!(out, "{INDENT}{mark} {}  {}", subtask.id, subtask.title);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use taskmgr_core::Filter;
    use taskmgr_core::Priority;
    use taskmgr_core::SubTask;
    use taskmgr_core::Task;
    use taskmgr_core::TaskState;
    use taskmgr_core::Theme;
    use taskmgr_core::DEFAULT_BACKGROUND_COLOR;

    use super::status_line;
    use super::task_block;
    use super::task_list;

    fn task(id: &str, title: &str) -> Task {
        let at = Utc
            .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        Task {
            id: id.to_string(),
            title: title.to_string(),
            completed: false,
            created_at: at,
            updated_at: at,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            is_secret: false,
            is_expanded: false,
            priority: None,
            sub_tasks: Vec::new(),
        }
    }

    fn subtask(id: &str, title: &str, completed: bool) -> SubTask {
        SubTask {
            id: id.to_string(),
            title: title.to_string(),
            completed,
        }
    }

    #[test]
    fn collapsed_task_is_one_line() {
        let mut task = task("1", "Groceries\nmilk and eggs");
        task.priority = Some(Priority::High);
        task.background_color = "#ffd6d6".to_string();
        task.sub_tasks = vec![subtask("s1", "milk", true)];

        assert_eq!(
            task_block(&task),
            "[ ] 1  Groceries  !high  #ffd6d6  1/1  ...\n"
        );
    }

    #[test]
    fn expanded_task_lists_body_then_open_subtasks_first() {
        let mut task = task("1", "Groceries\nmilk and eggs");
        task.is_expanded = true;
        task.sub_tasks = vec![
            subtask("s1", "milk", true),
            subtask("s2", "eggs", false),
        ];

        assert_eq!(
            task_block(&task),
            "[ ] 1  Groceries  1/2\n      milk and eggs\n      [ ] s2  eggs\n      [x] s1  milk\n"
        );
    }

    #[test]
    fn list_respects_visibility() {
        let mut secret = task("2", "Surprise party");
        secret.is_secret = true;
        let state = TaskState {
            tasks: Arc::new(vec![task("1", "Buy milk"), secret]),
            filter: Filter::All,
            show_secret: false,
            hide_completed: false,
        };

        assert_eq!(task_list(&state), "[ ] 1  Buy milk\n");
        assert_eq!(
            status_line(&state, Theme::new(true)),
            "filter: all | secret: hidden | hide completed: off | theme: dark | 1 of 2 tasks"
        );
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(task_list(&TaskState::default()), "No tasks\n");
    }
}
