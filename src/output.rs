//! Line rendering of replies and the sinks they are sent to.

use crate::command::Reply;
use crate::error::TaskError;
use crate::model::Task;

pub const GREETING: &str = "Hello! I'm Chronologer. What can I do for you?";
pub const FAREWELL: &str = "Bye. Hope to see you again soon!";

pub trait OutputSink {
    fn reply(&mut self, reply: &Reply);
    fn error(&mut self, error: &TaskError);
    /// The input ran out and the session is over.
    fn farewell(&mut self);
}

/// Collects rendered lines instead of printing them.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Hand over everything collected so far and start empty.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl OutputSink for Transcript {
    fn reply(&mut self, reply: &Reply) {
        self.lines.extend(render(reply));
    }

    fn error(&mut self, error: &TaskError) {
        self.lines.push(render_error(error));
    }

    fn farewell(&mut self) {
        self.lines.push(FAREWELL.to_owned());
    }
}

pub fn render_error(error: &TaskError) -> String {
    format!("OOPS!!! {error}")
}

/// Human-readable lines for one reply.
pub fn render(reply: &Reply) -> Vec<String> {
    let mut lines = Vec::new();
    match reply {
        Reply::Added {
            task,
            count,
            clashes,
        } => {
            lines.push("Got it. I've added this task:".to_owned());
            lines.push(format!("  {task}"));
            lines.push(count_line(*count));
            if !clashes.is_empty() {
                lines.push("Heads up, it clashes with:".to_owned());
                lines.extend(numbered(clashes));
            }
        }
        Reply::Completed(task) => {
            lines.push("Nice! I've marked this task as done:".to_owned());
            lines.push(format!("  {task}"));
        }
        Reply::Deleted { task, count } => {
            lines.push("Noted. I've removed this task:".to_owned());
            lines.push(format!("  {task}"));
            lines.push(count_line(*count));
        }
        Reply::Commented(task) => {
            lines.push("Noted. Your new task comment is:".to_owned());
            lines.push(format!("  {}", task.comment().unwrap_or_default()));
        }
        Reply::Updated(task) => {
            lines.push("Noted. The task now reads:".to_owned());
            lines.push(format!("  {}", details(task)));
        }
        Reply::Listing(tasks) if tasks.is_empty() => {
            lines.push("Your list is empty.".to_owned());
        }
        Reply::Listing(tasks) => {
            lines.push("Here are the tasks in your list:".to_owned());
            lines.extend(numbered(tasks));
        }
        Reply::Found(tasks) if tasks.is_empty() => {
            lines.push("No task matches.".to_owned());
        }
        Reply::Found(tasks) => {
            lines.push("Here are the matching tasks in your list:".to_owned());
            lines.extend(numbered(tasks));
        }
        Reply::Reminders(tasks) if tasks.is_empty() => {
            lines.push("Nothing coming up.".to_owned());
        }
        Reply::Reminders(tasks) => {
            lines.push("You have these upcoming tasks:".to_owned());
            lines.extend(numbered(tasks));
        }
        Reply::Undone { count } => {
            lines.push("Undo successful.".to_owned());
            lines.push(count_line(*count));
        }
        Reply::Redone { count } => {
            lines.push("Redo successful.".to_owned());
            lines.push(count_line(*count));
        }
        Reply::Exported(path) => {
            lines.push(format!("Calendar exported to {}", path.display()));
        }
    }
    lines
}

fn count_line(count: usize) -> String {
    let noun = if count == 1 { "task" } else { "tasks" };
    format!("Now you have {count} {noun} in the list.")
}

fn numbered(tasks: &[(usize, Task)]) -> impl Iterator<Item = String> + '_ {
    tasks.iter().map(|(index, task)| format!("{index}. {task}"))
}

/// Rendered task plus the metadata the one-line form leaves out.
fn details(task: &Task) -> String {
    let mut out = format!("{task} [priority: {}]", task.priority());
    if let Some(location) = task.location() {
        out.push_str(&format!(" [at: {location}]"));
    }
    out
}
