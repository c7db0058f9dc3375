use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueHint};
use tracing_subscriber::EnvFilter;

use chronologer::model::{DEFAULT_REMIND_DAYS, HasDescription, TaskBuilder, parse_timestamp};
use chronologer::output::{self, OutputSink};
use chronologer::{
    Command, ExportFilter, InputSource, JsonFileStore, Priority, Reply, Session, Task, TaskError,
    TimeStamp, local_now,
};

/// Dated to-dos, deadlines and events with undo/redo and calendar export.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Main verb. If omitted, `list` is default action.
    #[command(subcommand)]
    verb: Option<Verb>,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Args, Debug, Clone)]
struct Settings {
    /// Task store file.
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath, default_value = "./chronologer.json")]
    output: PathBuf,

    /// Reminder window, in days, given to newly added tasks.
    #[arg(long, global = true, default_value_t = DEFAULT_REMIND_DAYS)]
    remind_days: u32,
}

/// Metadata shared by every verb that creates a task.
#[derive(Args, Debug, Clone, Default)]
struct TaskOptions {
    #[arg(short = 'p', long)]
    priority: Option<Priority>,

    /// Short module code shown in front of the description.
    #[arg(short = 'm', long)]
    mod_code: Option<String>,

    #[arg(short = 'l', long)]
    location: Option<String>,

    #[arg(short = 'c', long)]
    comment: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Verb {
    /// Add a to-do, optionally occupying a period.
    Todo {
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,

        #[arg(long, requires = "to", value_parser = parse_date)]
        from: Option<TimeStamp>,

        #[arg(long, requires = "from", value_parser = parse_date)]
        to: Option<TimeStamp>,

        #[command(flatten)]
        options: TaskOptions,
    },
    /// Add a deadline, due at `--by` ("dd/MM/yyyy HHmm").
    Deadline {
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,

        #[arg(long, value_parser = parse_date)]
        by: TimeStamp,

        #[command(flatten)]
        options: TaskOptions,
    },
    /// Add an event running from `--from` to `--to`.
    Event {
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,

        #[arg(long, value_parser = parse_date)]
        from: TimeStamp,

        #[arg(long, value_parser = parse_date)]
        to: TimeStamp,

        #[command(flatten)]
        options: TaskOptions,
    },
    /// Mark a task as done.
    Done { index: usize },
    Delete { index: usize },
    /// Set (or replace) the comment of a task.
    Comment {
        index: usize,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Rewrite the description of a task.
    Edit {
        index: usize,
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
    Priority { index: usize, level: Priority },
    /// Set the location of a task; no words clears it.
    Location { index: usize, location: Vec<String> },
    List,
    /// Tasks whose description contains the keyword (case-sensitive).
    Find { keyword: String },
    /// Tasks whose reminder is showing now.
    Reminders,
    Undo,
    Redo,
    /// Write dated tasks to `<name>.ics`. No kind flag means all kinds.
    Export {
        name: String,
        #[arg(long)]
        deadline: bool,
        #[arg(long)]
        event: bool,
        #[arg(long)]
        todo: bool,
    },
    /// Read commands from stdin, one per line, keeping undo history.
    Shell,
}

fn parse_date(input: &str) -> Result<TimeStamp, String> {
    parse_timestamp(input).map_err(|err| format!("expected dd/MM/yyyy HHmm ({err})"))
}

impl Verb {
    /// `None` for verbs that are not task commands (`shell`).
    fn into_command(self, settings: &Settings) -> Result<Option<Command>, TaskError> {
        let command = match self {
            Self::Todo {
                description,
                from,
                to,
                options,
            } => {
                let builder = task_builder(&description, options, settings);
                let task = match (from, to) {
                    (Some(start), Some(end)) => builder.build_todo_with_period(start, end)?,
                    _ => builder.build_todo()?,
                };
                Command::Add(task)
            }
            Self::Deadline {
                description,
                by,
                options,
            } => Command::Add(task_builder(&description, options, settings).build_deadline(by)?),
            Self::Event {
                description,
                from,
                to,
                options,
            } => Command::Add(task_builder(&description, options, settings).build_event(from, to)?),
            Self::Done { index } => Command::Done(index),
            Self::Delete { index } => Command::Delete(index),
            Self::Comment { index, text } => Command::Comment {
                index,
                text: text.join(" "),
            },
            Self::Edit { index, description } => Command::Describe {
                index,
                text: description.join(" "),
            },
            Self::Priority { index, level } => Command::SetPriority {
                index,
                priority: level,
            },
            Self::Location { index, location } => Command::SetLocation {
                index,
                location: Some(location.join(" ")).filter(|l| !l.trim().is_empty()),
            },
            Self::List => Command::List,
            Self::Find { keyword } => Command::Find(keyword),
            Self::Reminders => Command::Reminders,
            Self::Undo => Command::Undo,
            Self::Redo => Command::Redo,
            Self::Export {
                name,
                deadline,
                event,
                todo,
            } => Command::Export {
                path: export_path(&name),
                filter: ExportFilter::from_flags(deadline, event, todo),
            },
            Self::Shell => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn task_builder(words: &[String], options: TaskOptions, settings: &Settings) -> TaskBuilder<HasDescription> {
    let TaskOptions {
        priority,
        mod_code,
        location,
        comment,
    } = options;
    let mut builder = Task::builder()
        .remind_in_days(settings.remind_days)
        .priority(priority.unwrap_or_default());
    if let Some(code) = mod_code {
        builder = builder.mod_code(code);
    }
    if let Some(location) = location {
        builder = builder.location(location);
    }
    if let Some(comment) = comment {
        builder = builder.comment(comment);
    }
    builder.description(words.join(" "))
}

fn export_path(name: &str) -> PathBuf {
    let name = name.trim();
    if name.ends_with(".ics") {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{name}.ics"))
    }
}

/// Grammar of one line typed into the shell.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    verb: Verb,
}

/// Commands read line by line, split like a shell would split them.
struct ShellInput<R> {
    lines: io::Lines<R>,
    settings: Settings,
}

impl<R: BufRead> ShellInput<R> {
    fn new(reader: R, settings: Settings) -> Self {
        Self {
            lines: reader.lines(),
            settings,
        }
    }
}

impl<R: BufRead> InputSource for ShellInput<R> {
    fn next_command(&mut self) -> Option<Command> {
        loop {
            let raw = match self.lines.next()? {
                Ok(raw) => raw,
                Err(err) => {
                    eprintln!("cannot read input: {err}");
                    return None;
                }
            };
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "bye" | "exit") {
                return None;
            }

            let words = match shell_words::split(line) {
                Ok(words) => words,
                Err(err) => {
                    eprintln!("cannot split `{line}`: {err}");
                    continue;
                }
            };
            let verb = match ShellLine::try_parse_from(words) {
                Ok(parsed) => parsed.verb,
                Err(err) => {
                    // Also covers `help`, which clap reports as an "error".
                    let _ = err.print();
                    continue;
                }
            };
            match verb.into_command(&self.settings) {
                Ok(Some(command)) => return Some(command),
                Ok(None) => println!("Already in the shell."),
                Err(err) => eprintln!("{}", output::render_error(&err)),
            }
        }
    }
}

/// Prints replies to stdout and errors to stderr.
struct Console;

impl OutputSink for Console {
    fn reply(&mut self, reply: &Reply) {
        for line in output::render(reply) {
            println!("{line}");
        }
    }

    fn error(&mut self, error: &TaskError) {
        eprintln!("{}", output::render_error(error));
    }

    fn farewell(&mut self) {
        println!("{}", output::FAREWELL);
    }
}

fn main() -> Result<()> {
    let Cli { verb, settings } = Cli::parse();
    install_tracing();

    let store = JsonFileStore::new(&settings.output);
    let mut session = Session::open(store)
        .with_context(|| format!("loading tasks from {}", settings.output.display()))?;
    let mut console = Console;

    match verb.unwrap_or(Verb::List) {
        Verb::Shell => {
            println!("{}", output::GREETING);
            let mut input = ShellInput::new(io::stdin().lock(), settings);
            chronologer::run(&mut session, &mut input, &mut console, local_now)
                .context("shell session aborted")?;
        }
        verb => {
            if let Some(command) = verb.into_command(&settings)? {
                let reply = session.execute(command, local_now())?;
                console.reply(&reply);
            }
        }
    }
    Ok(())
}

fn install_tracing() {
    // RUST_LOG wins; otherwise only warnings, on stderr, away from command output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}
