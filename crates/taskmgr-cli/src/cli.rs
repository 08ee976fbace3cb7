//! Command-line interface for taskmgr.
//!
//! Every command runs against a fresh session opened on the data
//! directory. Without a command an interactive shell keeps one session
//! alive, so view settings, undo history and the draft persist between
//! lines.

use std::io;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use taskmgr_core::FileStore;
use taskmgr_core::Filter;
use taskmgr_core::KeyValueStore;
use taskmgr_core::NewTask;
use taskmgr_core::Notice;
use taskmgr_core::NoticeLevel;
use taskmgr_core::Priority;
use taskmgr_core::Session;
use taskmgr_core::SystemClock;
use taskmgr_core::TaskAction;
use taskmgr_core::TaskDraft;
use taskmgr_core::TaskError;
use taskmgr_core::TaskStorage;
use taskmgr_core::TaskUpdate;
use taskmgr_core::TimestampIds;

use crate::render;
use crate::settings;

/// taskmgr - a small task manager with subtasks, secret tasks and undo
#[derive(Parser, Debug)]
#[command(name = "taskmgr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the stored tasks
    #[arg(long, global = true, env = "TASKMGR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Config file (defaults to <config dir>/taskmgr/config.toml)
    #[arg(long, global = true, env = "TASKMGR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Password for showing secret tasks; prompted for when absent
    #[arg(long, global = true, env = "TASKMGR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Command to run; starts the interactive shell when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task
    Add {
        /// Task title
        #[arg(required = true, trailing_var_arg = true)]
        title: Vec<String>,

        /// Extra lines shown when the task is expanded
        #[arg(long)]
        description: Option<String>,

        /// Background color as #rgb or #rrggbb
        #[arg(long)]
        color: Option<String>,

        /// Priority: low, medium, high or hidden
        #[arg(long)]
        priority: Option<Priority>,

        /// Mark the task secret
        #[arg(long)]
        secret: bool,
    },

    /// List visible tasks
    List {
        /// Switch filter first: all, active, completed or hidden
        #[arg(long)]
        filter: Option<Filter>,
    },

    /// Show filter, secret visibility, theme and counts
    Status,

    /// Toggle a task's completion
    Done {
        /// Task id
        id: String,
    },

    /// Delete a task
    Rm {
        /// Task id
        id: String,
    },

    /// Change a task's title or description
    Edit {
        /// Task id
        id: String,

        /// New title
        #[arg(trailing_var_arg = true)]
        title: Vec<String>,

        /// Replace the description lines
        #[arg(long)]
        description: Option<String>,
    },

    /// Set a task's background color
    Color {
        /// Task id
        id: String,

        /// Color as #rgb or #rrggbb
        color: String,
    },

    /// Expand or collapse a task's details
    Expand {
        /// Task id
        id: String,
    },

    /// Set a task's priority
    Priority {
        /// Task id
        id: String,

        /// low, medium, high or hidden
        priority: Priority,
    },

    /// Subtask commands
    #[command(subcommand)]
    Sub(SubCommand),

    /// Set the list filter
    Filter {
        /// all, active, completed or hidden
        filter: Filter,
    },

    /// Toggle hiding completed tasks
    HideCompleted,

    /// Secret task commands
    #[command(subcommand)]
    Secret(SecretCommand),

    /// Toggle dark mode
    Theme,

    /// Undo the last task change
    Undo,

    /// Redo the last undone task change
    Redo,

    /// Task text editor commands
    #[command(subcommand)]
    Draft(DraftCommand),

    /// Apply a raw action envelope, e.g. {"type":"TOGGLE_COMPLETE","payload":"1"}
    Apply {
        /// Action JSON
        #[arg(required = true, trailing_var_arg = true)]
        json: Vec<String>,
    },

    /// Print all tasks in their stored form
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },

    /// Remove every task and the stored copy
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// Add a subtask
    Add {
        /// Parent task id
        task_id: String,

        /// Subtask title
        #[arg(required = true, trailing_var_arg = true)]
        title: Vec<String>,
    },

    /// Toggle a subtask's completion
    Done {
        /// Parent task id
        task_id: String,

        /// Subtask id
        subtask_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
    /// Show secret tasks (asks for the password)
    Show,

    /// Hide secret tasks
    Hide,

    /// Clear a task's secret flag
    Unmark {
        /// Task id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DraftCommand {
    /// Replace the draft text
    Set {
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Undo the last draft change
    Undo,

    /// Redo the last undone draft change
    Redo,

    /// Load a task into the draft for editing
    Edit {
        /// Task id
        id: String,
    },

    /// Add the draft as a task, or save it over the task being edited
    Submit,

    /// Drop the draft and stop editing
    Cancel,

    /// Print the draft
    Show,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
}

/// One line typed into the interactive shell.
#[derive(Parser, Debug)]
#[command(name = "taskmgr", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    #[command(flatten)]
    Task(Command),

    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let config = settings::load(self.config.as_deref())?;
        let dir = settings::data_dir(self.data_dir.as_deref(), &config)?;
        let store = FileStore::open(&dir)
            .with_context(|| format!("opening data directory {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "opened store");

        let storage = TaskStorage::new(store, config.storage.keys());
        let (mut session, notices) = Session::open(
            storage,
            config,
            Box::new(TimestampIds::new()),
            Box::new(SystemClock),
        );
        let mut out = io::stdout();
        report(&notices, &mut out)?;
        let password = self.password.as_deref();
        match self.command {
            Some(command) => {
                execute(&mut session, command, password, &mut out)?;
                finish(&mut session)
            }
            None => shell(&mut session, password, &mut out),
        }
    }
}

fn shell<S: KeyValueStore>(
    session: &mut Session<S>,
    password: Option<&str>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    writeln!(
        out,
        "{}",
        render::status_line(session.state(), session.theme())
    )?;
    write!(out, "{}", render::task_list(session.state()))?;
    writeln!(out, "Type `help` for commands, `quit` to leave.")?;

    loop {
        if let Some(notice) = session.tick(Utc::now()) {
            report(&[notice], out)?;
        }
        write!(out, "taskmgr> ")?;
        out.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }
        let words = match shell_words::split(&line) {
            Ok(words) => words,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };
        if words.is_empty() {
            continue;
        }
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                let _ = err.print();
                continue;
            }
        };
        match parsed.command {
            ShellCommand::Quit => break,
            ShellCommand::Task(command) => {
                if let Err(err) = execute(session, command, password, out) {
                    eprintln!("error: {err:#}");
                }
            }
        }
    }
    finish(session)
}

/// Retries a failed write once more before exit so the caller sees the
/// storage error.
fn finish<S: KeyValueStore>(session: &mut Session<S>) -> anyhow::Result<()> {
    if session.has_unsaved_changes() {
        session
            .flush()
            .map_err(TaskError::from)
            .context("saving tasks")?;
    }
    Ok(())
}

fn execute<S: KeyValueStore>(
    session: &mut Session<S>,
    command: Command,
    password: Option<&str>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Command::Add {
            title,
            description,
            color,
            priority,
            secret,
        } => {
            let id = session.next_id();
            let task = NewTask {
                id: id.clone(),
                title: title.join(" "),
                description,
                background_color: color,
                is_secret: secret,
                priority,
                ..NewTask::default()
            };
            report(&session.dispatch(TaskAction::AddTask(task))?, out)?;
            writeln!(out, "Added task {id}")?;
        }
        Command::List { filter } => {
            if let Some(filter) = filter {
                session.dispatch(TaskAction::SetFilter(filter))?;
            }
            write!(out, "{}", render::task_list(session.state()))?;
        }
        Command::Status => {
            writeln!(
                out,
                "{}",
                render::status_line(session.state(), session.theme())
            )?;
        }
        Command::Done { id } => {
            report(&session.dispatch(TaskAction::ToggleComplete(id.clone()))?, out)?;
            print_task(session, &id, out)?;
        }
        Command::Rm { id } => {
            report(&session.dispatch(TaskAction::DeleteTask(id.clone()))?, out)?;
            writeln!(out, "Deleted task {id}")?;
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            let updates = TaskUpdate {
                title: (!title.is_empty()).then(|| title.join(" ")),
                description,
                ..TaskUpdate::default()
            };
            if updates.is_empty() {
                return Err(TaskError::InvalidArgument(
                    "nothing to change; give a new title or --description".to_string(),
                )
                .into());
            }
            let action = TaskAction::UpdateTask {
                id: id.clone(),
                updates,
            };
            report(&session.dispatch(action)?, out)?;
            print_task(session, &id, out)?;
        }
        Command::Color { id, color } => {
            report(
                &session.dispatch(TaskAction::SetTaskColor {
                    id: id.clone(),
                    color,
                })?,
                out,
            )?;
            print_task(session, &id, out)?;
        }
        Command::Expand { id } => {
            report(&session.dispatch(TaskAction::ToggleTaskExpand(id.clone()))?, out)?;
            print_task(session, &id, out)?;
        }
        Command::Priority { id, priority } => {
            let action = TaskAction::UpdateTask {
                id: id.clone(),
                updates: TaskUpdate::priority(priority),
            };
            report(&session.dispatch(action)?, out)?;
            print_task(session, &id, out)?;
        }
        Command::Sub(SubCommand::Add { task_id, title }) => {
            let action = TaskAction::AddSubtask {
                task_id: task_id.clone(),
                title: title.join(" "),
            };
            report(&session.dispatch(action)?, out)?;
            print_task(session, &task_id, out)?;
        }
        Command::Sub(SubCommand::Done {
            task_id,
            subtask_id,
        }) => {
            let action = TaskAction::ToggleSubtask {
                task_id: task_id.clone(),
                subtask_id,
            };
            report(&session.dispatch(action)?, out)?;
            print_task(session, &task_id, out)?;
        }
        Command::Filter { filter } => {
            session.dispatch(TaskAction::SetFilter(filter))?;
            write!(out, "{}", render::task_list(session.state()))?;
        }
        Command::HideCompleted => {
            session.dispatch(TaskAction::ToggleHideCompleted)?;
            write!(out, "{}", render::task_list(session.state()))?;
        }
        Command::Secret(SecretCommand::Show) => {
            if !session.state().show_secret {
                let entered = read_password(password)?;
                report(&session.set_secret_visible(true, Some(&entered))?, out)?;
            }
            write!(out, "{}", render::task_list(session.state()))?;
        }
        Command::Secret(SecretCommand::Hide) => {
            report(&session.set_secret_visible(false, None)?, out)?;
            write!(out, "{}", render::task_list(session.state()))?;
        }
        Command::Secret(SecretCommand::Unmark { id }) => {
            report(&session.dispatch(TaskAction::RemoveSecret(id.clone()))?, out)?;
            writeln!(out, "Task {id} is no longer secret")?;
        }
        Command::Theme => {
            report(&session.toggle_theme(), out)?;
            writeln!(out, "Theme: {}", session.theme().label())?;
        }
        Command::Undo => {
            report(&session.undo()?, out)?;
            write!(out, "{}", render::task_list(session.state()))?;
        }
        Command::Redo => {
            report(&session.redo()?, out)?;
            write!(out, "{}", render::task_list(session.state()))?;
        }
        Command::Draft(command) => execute_draft(session, command, out)?,
        Command::Apply { json } => {
            let action = TaskAction::from_json(&json.join(" "))?;
            match action {
                TaskAction::Unknown => writeln!(out, "Ignored action of unknown type")?,
                TaskAction::ToggleSecretTasks => {
                    let entered = if session.state().show_secret {
                        None
                    } else {
                        Some(read_password(password)?)
                    };
                    report(&session.toggle_secret(entered.as_deref())?, out)?;
                }
                action => report(&session.dispatch(action)?, out)?,
            }
        }
        Command::Export { format } => {
            let tasks = session.tasks();
            let text = match format {
                ExportFormat::Json => serde_json::to_string_pretty(tasks)?,
                ExportFormat::Yaml => serde_yaml::to_string(tasks)?,
            };
            writeln!(out, "{}", text.trim_end())?;
        }
        Command::Clear => {
            report(&session.clear_all()?, out)?;
        }
    }
    Ok(())
}

fn execute_draft<S: KeyValueStore>(
    session: &mut Session<S>,
    command: DraftCommand,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        DraftCommand::Set { text } => session.draft_mut().set_text(text.join(" ")),
        DraftCommand::Undo => {
            session.draft_mut().undo()?;
        }
        DraftCommand::Redo => {
            session.draft_mut().redo()?;
        }
        DraftCommand::Edit { id } => session.begin_edit(&id)?,
        DraftCommand::Submit => {
            report(&session.submit_draft()?, out)?;
            write!(out, "{}", render::task_list(session.state()))?;
            return Ok(());
        }
        DraftCommand::Cancel => session.draft_mut().cancel_edit(),
        DraftCommand::Show => {}
    }
    writeln!(out, "{}", draft_line(session.draft()))?;
    Ok(())
}

fn draft_line(draft: &TaskDraft) -> String {
    match draft.editing() {
        Some(id) => format!("Editing {id}: {}", draft.text()),
        None => format!("Draft: {}", draft.text()),
    }
}

fn print_task<S: KeyValueStore>(
    session: &Session<S>,
    id: &str,
    out: &mut dyn Write,
) -> io::Result<()> {
    match session.state().task(id) {
        Some(task) if session.state().is_visible(task) => {
            write!(out, "{}", render::task_block(task))
        }
        _ => Ok(()),
    }
}

fn report(notices: &[Notice], out: &mut dyn Write) -> io::Result<()> {
    for notice in notices {
        match notice.level {
            NoticeLevel::Warning => eprintln!("{notice}"),
            NoticeLevel::Info | NoticeLevel::Success => writeln!(out, "{notice}")?,
        }
    }
    Ok(())
}

fn read_password(preset: Option<&str>) -> io::Result<String> {
    if let Some(password) = preset {
        return Ok(password.to_string());
    }
    print!("password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use taskmgr_core::Config;
    use taskmgr_core::MemoryStore;
    use taskmgr_core::Priority;
    use taskmgr_core::Session;
    use taskmgr_core::SystemClock;
    use taskmgr_core::TaskError;
    use taskmgr_core::TaskStorage;

    use super::execute;
    use super::Cli;
    use super::Command;
    use super::ShellCommand;
    use super::ShellLine;

    fn session() -> Session<MemoryStore> {
        let storage = TaskStorage::new(MemoryStore::new(), Config::default().storage.keys());
        let (session, _) = Session::open(
            storage,
            Config::default(),
            Box::new(taskmgr_core::ids::SequentialIds::new("t")),
            Box::new(SystemClock),
        );
        session
    }

    fn run(session: &mut Session<MemoryStore>, line: &str) -> anyhow::Result<String> {
        let parsed = ShellLine::try_parse_from(shell_words::split(line)?)?;
        let ShellCommand::Task(command) = parsed.command else {
            anyhow::bail!("not a task command");
        };
        let mut out = Vec::new();
        execute(session, command, Some("1234"), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_joins_title_words() {
        let cli = Cli::try_parse_from(["taskmgr", "add", "--priority", "high", "Buy", "milk"])
            .expect("parse");
        match cli.command {
            Some(Command::Add {
                title, priority, ..
            }) => {
                assert_eq!(title.join(" "), "Buy milk");
                assert_eq!(priority, Some(Priority::High));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn shell_lines_drive_one_session() {
        let mut session = session();
        assert_eq!(run(&mut session, "add Buy milk").expect("add"), "Added task t1\n");
        run(&mut session, "sub add t1 whole milk").expect("sub");
        run(&mut session, "expand t1").expect("expand");
        run(&mut session, "done t1").expect("done");

        assert_eq!(
            run(&mut session, "list --filter completed").expect("list"),
            "[x] t1  Buy milk  0/1\n      [ ] t2  whole milk\n"
        );

        run(&mut session, "undo").expect("undo");
        assert!(!session.tasks()[0].completed);
    }

    #[test]
    fn draft_round_trip_through_shell() {
        let mut session = session();
        run(&mut session, "draft set Call").expect("set");
        assert_eq!(
            run(&mut session, "draft set Call mom").expect("set"),
            "Draft: Call mom\n"
        );
        assert_eq!(run(&mut session, "draft undo").expect("undo"), "Draft: Call\n");
        run(&mut session, "draft submit").expect("submit");
        assert_eq!(session.tasks()[0].title, "Call");

        assert_eq!(
            run(&mut session, "draft edit t1").expect("edit"),
            "Editing t1: Call\n"
        );
    }

    #[test]
    fn apply_accepts_envelopes() {
        let mut session = session();
        run(
            &mut session,
            r#"apply '{"type":"ADD_TASK","payload":{"id":"7","title":"From   json"}}'"#,
        )
        .expect("apply");
        assert_eq!(session.tasks()[0].id, "7");
        assert_eq!(session.tasks()[0].title, "From   json");

        assert_eq!(
            run(&mut session, r#"apply '{"type":"SOMETHING_ELSE"}'"#).expect("apply"),
            "Ignored action of unknown type\n"
        );
    }

    #[test]
    fn edit_without_changes_is_rejected() {
        let mut session = session();
        run(&mut session, "add Buy milk").expect("add");
        let err = run(&mut session, "edit t1").expect_err("nothing to change");
        assert!(matches!(
            err.downcast_ref::<TaskError>(),
            Some(TaskError::InvalidArgument(_))
        ));
    }

    #[test]
    fn secret_show_uses_password() {
        let mut session = session();
        run(&mut session, "add --secret Surprise").expect("add");
        assert_eq!(
            run(&mut session, "list --filter all").expect("list"),
            "No tasks\n"
        );
        let shown = run(&mut session, "secret show").expect("show");
        assert!(shown.contains("Surprise"));
    }

    #[test]
    fn quoted_words_stay_together() {
        let mut session = session();
        run(&mut session, r#"add "Buy milk""#).expect("add");
        assert_eq!(session.tasks()[0].title, "Buy milk");

        run(&mut session, r#"edit t1 --description "two words""#).expect("edit");
        assert_eq!(session.tasks()[0].title, "Buy milk\ntwo words");
        assert_eq!(session.tasks()[0].heading(), "Buy milk");
    }

    #[test]
    fn unbalanced_quote_is_rejected() {
        let mut session = session();
        assert!(run(&mut session, r#"add "Buy milk"#).is_err());
        assert!(session.tasks().is_empty());
    }

    #[test]
    fn quit_is_a_shell_command() {
        let parsed = ShellLine::try_parse_from(["exit"]).expect("parse");
        assert!(matches!(parsed.command, ShellCommand::Quit));
    }
}
