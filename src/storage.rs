// --- Atomic JSON persistence helpers ---

use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile; // For atomic writes
use time::OffsetDateTime;
use tracing::debug;

use crate::error::TaskError;
use crate::model::{Priority, Task, TaskKind, TimeStamp};

/// Layout version written into every store file.
pub const STORE_VERSION: u32 = 1;

/// Durable home of the task sequence. Every write replaces the whole sequence.
pub trait FileStore {
    /// Read the stored sequence. A missing or empty store reads as no tasks.
    fn read(&self) -> Result<Vec<Task>, TaskError>;

    /// Replace the stored sequence with `tasks`.
    fn write(&self, tasks: &[Task]) -> Result<(), TaskError>;
}

// --- One persisted task ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub kind: TaskKind,
    pub description: String,
    pub start: Option<TimeStamp>,
    pub end: Option<TimeStamp>,
    pub created: TimeStamp,
    pub done: bool,
    pub priority: Priority,
    pub comment: Option<String>,
    pub location: Option<String>,
    pub mod_code: Option<String>,
    #[serde(default = "default_remind_days")]
    pub remind_in_days: u32,
}

const fn default_remind_days() -> u32 {
    crate::model::DEFAULT_REMIND_DAYS
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            kind: task.kind(),
            description: task.description().to_owned(),
            start: task.start(),
            end: task.end(),
            created: task.created_at(),
            done: task.is_done(),
            priority: task.priority(),
            comment: task.comment().map(str::to_owned),
            location: task.location().map(str::to_owned),
            mod_code: task.mod_code().map(str::to_owned),
            remind_in_days: task.remind_in_days(),
        }
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = String;

    /// Rebuild a task, re-checking every invariant a constructor checks.
    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let TaskRecord {
            kind,
            description,
            start,
            end,
            created,
            done,
            priority,
            comment,
            location,
            mod_code,
            remind_in_days,
        } = record;

        let mut builder = Task::builder()
            .priority(priority)
            .remind_in_days(remind_in_days)
            .created_at(created)
            .done(done);
        if let Some(c) = comment {
            builder = builder.comment(c);
        }
        if let Some(l) = location {
            builder = builder.location(l);
        }
        if let Some(m) = mod_code {
            builder = builder.mod_code(m);
        }
        let builder = builder.description(description);

        let built = match (kind, start, end) {
            (TaskKind::Todo, None, None) => builder.build_todo(),
            (TaskKind::Todo, Some(s), Some(e)) => builder.build_todo_with_period(s, e),
            (TaskKind::Deadline, Some(s), Some(e)) if s == e => builder.build_deadline(e),
            (TaskKind::Deadline, ..) => {
                return Err("a deadline needs equal start and end dates".to_owned());
            }
            (TaskKind::Event, Some(s), Some(e)) => builder.build_event(s, e),
            (kind, ..) => return Err(format!("{kind:?} has an incomplete period")),
        };
        built.map_err(|err| err.to_string())
    }
}

// --- File-level metadata ---
#[derive(Debug, Deserialize, Serialize)]
pub struct Meta {
    version: u32,
    #[serde(with = "time::serde::rfc3339")]
    generated_at: OffsetDateTime,
}

// -- Top level container ---
#[derive(Debug, Deserialize, Serialize)]
pub struct StoreFile {
    meta: Meta,
    tasks: Vec<TaskRecord>,
}

impl StoreFile {
    pub fn new(tasks: &[Task]) -> Self {
        Self {
            meta: Meta {
                version: STORE_VERSION,
                generated_at: OffsetDateTime::now_utc(),
            },
            tasks: tasks.iter().map(TaskRecord::from).collect(),
        }
    }
}

/// JSON file on the local disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileStore for JsonFileStore {
    fn read(&self) -> Result<Vec<Task>, TaskError> {
        let Some(file) = open_locked(&self.path)? else {
            debug!(path = %self.path.display(), "no store file yet");
            return Ok(Vec::new());
        };

        let Some(data) = load_from(&file, &self.path)? else {
            return Ok(Vec::new());
        };
        if data.meta.version != STORE_VERSION {
            return Err(TaskError::corrupt(
                &self.path,
                format!("unsupported layout version {}", data.meta.version),
            ));
        }

        let tasks = data
            .tasks
            .into_iter()
            .enumerate()
            .map(|(pos, record)| {
                Task::try_from(record).map_err(|reason| {
                    TaskError::corrupt(&self.path, format!("record {}: {reason}", pos + 1))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(path = %self.path.display(), count = tasks.len(), "tasks loaded");
        Ok(tasks)
    }

    fn write(&self, tasks: &[Task]) -> Result<(), TaskError> {
        // Wait for any other process reading the store, then release before
        // the rename so the replacement never races an open handle.
        let file = open_locked(&self.path)?;
        drop(file);

        let bytes = serde_json::to_vec_pretty(&StoreFile::new(tasks))
            .map_err(|err| TaskError::io(&self.path, err.into()))?;
        atomic_write(&self.path, &bytes)?;
        debug!(path = %self.path.display(), count = tasks.len(), "tasks saved");
        Ok(())
    }
}

/// Open an existing file *with* an exclusive advisory lock.
/// Returns `None` when there is no file yet.
fn open_locked(path: &Path) -> Result<Option<File>, TaskError> {
    match OpenOptions::new().read(true).open(path) {
        Ok(file) => {
            lock_file(&file, path)?;
            Ok(Some(file))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TaskError::io(path, e)),
    }
}

/// Atomically replace `path` with `contents`: the previous content stays in
/// place until the whole payload is safely on disk.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), TaskError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Write into a temp file in the *same* directory.
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| TaskError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| TaskError::io(path, e))?;

    // push os buffers
    tmp.flush().map_err(|e| TaskError::io(path, e))?;

    // fsync before the rename
    tmp.as_file().sync_all().map_err(|e| TaskError::io(path, e))?;

    // atomic rename the tmp file with final path on POSIX, safe fallback on Windows
    tmp.persist(path).map_err(|e| TaskError::io(path, e.error))?;

    Ok(())
}

/// Read the store container from an already-opened & locked file.
/// An empty file reads as `None`.
fn load_from<R>(mut file: R, path: &Path) -> Result<Option<StoreFile>, TaskError>
where
    R: Read + Seek,
{
    // Rewind since caller may have read.
    file.seek(SeekFrom::Start(0))
        .map_err(|e| TaskError::io(path, e))?;

    let mut raw = String::new();
    file.read_to_string(&mut raw)
        .map_err(|e| TaskError::io(path, e))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| TaskError::corrupt(path, format!("JSON parse: {err}")))
}

// --- Internal Helper: advisory locking ---
fn lock_file(file: &File, path: &Path) -> Result<(), TaskError> {
    FileExt::lock_exclusive(file).map_err(|e| TaskError::io(path, e))
}
