//! Parsed commands going into a session and the payloads coming out.

use std::path::PathBuf;

use crate::export::ExportFilter;
use crate::model::{Priority, Task};

/// One fully parsed request. Indices are 1-based list positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(Task),
    Done(usize),
    Delete(usize),
    Comment { index: usize, text: String },
    Describe { index: usize, text: String },
    SetPriority { index: usize, priority: Priority },
    SetLocation { index: usize, location: Option<String> },
    List,
    Find(String),
    Reminders,
    Undo,
    Redo,
    Export { path: PathBuf, filter: ExportFilter },
}

/// Result payload of a successful command; formatting is left to an
/// [`OutputSink`](crate::output::OutputSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Added {
        task: Task,
        count: usize,
        /// Tasks already in the list that overlap the new one.
        clashes: Vec<(usize, Task)>,
    },
    Completed(Task),
    Deleted {
        task: Task,
        count: usize,
    },
    Commented(Task),
    Updated(Task),
    Listing(Vec<(usize, Task)>),
    Found(Vec<(usize, Task)>),
    Reminders(Vec<(usize, Task)>),
    Undone {
        count: usize,
    },
    Redone {
        count: usize,
    },
    Exported(PathBuf),
}

/// Supplier of parsed commands. `None` ends the session.
pub trait InputSource {
    fn next_command(&mut self) -> Option<Command>;
}

impl<I> InputSource for I
where
    I: Iterator<Item = Command>,
{
    fn next_command(&mut self) -> Option<Command> {
        self.next()
    }
}
