//! Error taxonomy shared by every component of the task engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::TimeStamp;

/// Errors raised by task, history, storage and export operations.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A 1-based index pointed outside the current list.
    #[error("task {index} does not exist (the list has {len} tasks)")]
    InvalidIndex { index: usize, len: usize },

    /// A task description was blank.
    #[error("the description of a task cannot be empty")]
    EmptyDescription,

    /// A period ended before it started.
    #[error("a period cannot end ({end}) before it starts ({start})")]
    InvalidPeriod { start: TimeStamp, end: TimeStamp },

    /// The task was already marked as done.
    #[error("task \"{0}\" is already done")]
    AlreadyCompleted(String),

    #[error("there is nothing to undo")]
    NothingToUndo,

    #[error("there is nothing to redo")]
    NothingToRedo,

    /// Persisted content could not be turned back into tasks.
    #[error("storage file {} is corrupt: {reason}", path.display())]
    StorageCorrupt { path: PathBuf, reason: String },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("there are no tasks to export")]
    EmptyExport,

    /// Filtering left nothing that can go into a calendar.
    #[error("no task of the selected kinds can be exported to a calendar")]
    EmptyCalendar,

    #[error("cannot write calendar date: {0}")]
    CalendarDate(#[from] time::error::Format),
}

impl TaskError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::StorageCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether a running session can carry on after this error.
    ///
    /// Only a corrupt store is fatal: it aborts startup rather than letting the
    /// session overwrite tasks it failed to read.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::StorageCorrupt { .. })
    }
}
