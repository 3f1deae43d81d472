// sticky: command-line access to the task board
//
// Commands:
//   sticky list
//   sticky add <text>
//   sticky done|start|pause|reset|remove <id>
//   sticky context <id> <text>
//   sticky focus-minutes <n>
//   sticky payload <json>

use anyhow::{anyhow, Context, Result};
use std::env;
use std::sync::Arc;
use sticky_core::board::{Engine, EngineParts, LoopTicker, SystemClock, Task, TaskStatus};
use sticky_core::config::Config;
use sticky_core::logging::init_logging;
use sticky_core::notify::{Notifier, NullNotifier, TerminalNotifier};
use sticky_core::store::{ImmediateSaver, JsonFileStore, SnapshotStore};
use sticky_core::windows::WindowPayload;

fn print_help() {
    println!(
        r#"sticky - sticky-notes task board with focus timers

USAGE:
    sticky <COMMAND> [ARGS] [OPTIONS]

COMMANDS:
    list                    Show the board
    add <text>              Add tasks, one per line
    done <id>               Toggle a task between done and open
    start <id>              Start or resume the focus timer
    pause <id>              Pause the focus timer
    reset <id>              Reset the focus timer
    remove <id>             Delete a task
    context <id> <text>     Replace a task's note
    focus-minutes <n>       Set the default focus length
    payload <json>          Decode a window launch payload
    help                    Show this help message

OPTIONS:
    --json             Output in JSON format
    --verbose, -v      Debug logging on stderr

Task ids may be abbreviated to any unique prefix.

ENVIRONMENT:
    STICKY_TASKS_DIR   Data directory (default: platform data dir)
    STICKY_LOG         Log filter (default: info)"#
    );
}

fn main() -> Result<()> {
    let mut json_output = false;
    let mut verbose = false;
    let mut positional: Vec<String> = Vec::new();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--json" => json_output = true,
            "--verbose" | "-v" => verbose = true,
            _ => positional.push(arg),
        }
    }
    init_logging(verbose);

    let Some(command) = positional.first().cloned() else {
        print_help();
        return Ok(());
    };
    let args = &positional[1..];

    match command.as_str() {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }

        "payload" => {
            let raw = args.join(" ");
            let payload = WindowPayload::decode(&raw);
            if json_output {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", payload.kind());
            }
            Ok(())
        }

        _ => run_board_command(&command, args, json_output),
    }
}

fn run_board_command(command: &str, args: &[String], json_output: bool) -> Result<()> {
    let config = Config::from_env();
    config
        .ensure_dirs()
        .with_context(|| format!("Failed to create {}", config.data_dir().display()))?;

    let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(&config));
    let notifier: Arc<dyn Notifier> = if json_output {
        Arc::new(NullNotifier)
    } else {
        Arc::new(TerminalNotifier)
    };
    let mut engine = Engine::new(EngineParts {
        store: store.clone(),
        saver: Box::new(ImmediateSaver::new(store)),
        clock: Arc::new(SystemClock),
        notifier,
        ticker: Box::new(LoopTicker::new()),
        timings: config.timings,
    });
    engine.load();

    match command {
        "list" => {}

        "add" => {
            let text = args.join(" ");
            let outcome = engine.add_tasks([text.replace("\\n", "\n")]);
            if outcome.added == 0 {
                return Err(anyhow!("Nothing to add: task text is empty"));
            }
            if outcome.suspended > 0 && !json_output {
                println!(
                    "{} task(s) suspended: the active list is full",
                    outcome.suspended
                );
            }
        }

        "done" | "start" | "pause" | "reset" | "remove" => {
            let id = resolve_id(&engine, args.first())?;
            match command {
                "done" => engine.toggle_done(&id),
                "start" => engine.start_task(&id),
                "pause" => engine.pause_task(&id),
                "reset" => engine.reset_task(&id),
                _ => {
                    engine.remove_task(&id);
                }
            }
        }

        "context" => {
            let id = resolve_id(&engine, args.first())?;
            let text = args[1..].join(" ");
            engine.update_task_context(&id, &text);
        }

        "focus-minutes" => {
            let minutes: u32 = args
                .first()
                .ok_or_else(|| anyhow!("focus-minutes requires a number"))?
                .parse()
                .context("Minutes must be a positive number")?;
            engine.update_default_focus_minutes(minutes);
        }

        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }

    engine.flush();
    print_board(&engine, json_output)
}

/// Full id from a unique prefix
fn resolve_id(engine: &Engine, prefix: Option<&String>) -> Result<String> {
    let prefix = prefix.ok_or_else(|| anyhow!("A task id is required"))?;
    let matches: Vec<&Task> = engine
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(prefix.as_str()))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => Err(anyhow!("No task matches id {}", prefix)),
        _ => Err(anyhow!("Id {} is ambiguous ({} matches)", prefix, matches.len())),
    }
}

fn print_board(engine: &Engine, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", engine.snapshot().encode()?);
        return Ok(());
    }

    if engine.tasks().is_empty() {
        println!("No tasks");
        return Ok(());
    }

    let current = engine.current_task_id();
    for task in engine.tasks() {
        let marker = if Some(task.id.as_str()) == current { '*' } else { ' ' };
        let check = match task.status {
            TaskStatus::Todo => "[ ]",
            TaskStatus::Suspended => "[~]",
            TaskStatus::Done => "[x]",
        };
        println!(
            "{}{} {} {}  {} {}",
            marker,
            check,
            task.id.chars().take(8).collect::<String>(),
            task.text,
            task.focus_state,
            format_timer(task)
        );
    }
    Ok(())
}

fn format_timer(task: &Task) -> String {
    let remaining = task.focus_remaining_sec;
    if task.overtime_sec > 0 {
        format!("+{:02}:{:02}", task.overtime_sec / 60, task.overtime_sec % 60)
    } else {
        format!("{:02}:{:02}", remaining / 60, remaining % 60)
    }
}
