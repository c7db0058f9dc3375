//! A running session: live task list, its history, and the store kept in step.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::command::{Command, InputSource, Reply};
use crate::error::TaskError;
use crate::export::{ExportFilter, Exporter, IcsExporter};
use crate::history::{HistoryStack, HistoryState};
use crate::model::{Task, TimeStamp};
use crate::output::OutputSink;
use crate::storage::{FileStore, atomic_write};
use crate::task_list::TaskList;

/// Applies commands one at a time.
///
/// Every mutation runs on a copy of the list; the copy becomes live and lands
/// on the history stack only once the store has accepted it.
pub struct Session<S> {
    tasks: TaskList,
    history: HistoryStack,
    store: S,
}

impl<S: FileStore> Session<S> {
    /// Load the stored tasks. A corrupt store fails the whole start.
    pub fn open(store: S) -> Result<Self, TaskError> {
        let tasks = TaskList::from_tasks(store.read()?);
        info!(count = tasks.len(), "session started");
        let history = HistoryStack::new(HistoryState::capture(&tasks));
        Ok(Self {
            tasks,
            history,
            store,
        })
    }

    pub const fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    pub const fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Run one command. `now` is the wall-clock time reminders and exports see.
    pub fn execute(&mut self, command: Command, now: TimeStamp) -> Result<Reply, TaskError> {
        debug!(?command, "executing");
        match command {
            Command::Add(task) => self.add(task),
            Command::Done(index) => self.commit(|list| {
                list.mark_done(index).cloned().map(Reply::Completed)
            }),
            Command::Delete(index) => self.commit(|list| {
                let task = list.delete(index)?;
                Ok(Reply::Deleted {
                    task,
                    count: list.len(),
                })
            }),
            Command::Comment { index, text } => self.commit(|list| {
                list.edit_comment(index, text).cloned().map(Reply::Commented)
            }),
            Command::Describe { index, text } => self.commit(|list| {
                list.edit_description(index, text).cloned().map(Reply::Updated)
            }),
            Command::SetPriority { index, priority } => self.commit(|list| {
                list.set_priority(index, priority).cloned().map(Reply::Updated)
            }),
            Command::SetLocation { index, location } => self.commit(|list| {
                list.set_location(index, location).cloned().map(Reply::Updated)
            }),
            Command::List => Ok(Reply::Listing(owned(self.tasks.iter()))),
            Command::Find(needle) => Ok(Reply::Found(owned(self.tasks.find_by_keyword(&needle)))),
            Command::Reminders => Ok(Reply::Reminders(owned(self.tasks.scan_reminders(now)))),
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::Export { path, filter } => {
                self.export_with(&IcsExporter::new(now), &path, filter)?;
                Ok(Reply::Exported(path))
            }
        }
    }

    fn add(&mut self, task: Task) -> Result<Reply, TaskError> {
        let clashes = owned(self.tasks.scan_clashes(&task));
        if !clashes.is_empty() {
            debug!(count = clashes.len(), "new task clashes with existing ones");
        }
        self.commit(move |list| {
            let count = list.add(task.clone());
            Ok(Reply::Added {
                task,
                count,
                clashes,
            })
        })
    }

    /// Step back to the state before the most recent mutation.
    ///
    /// The cursor only moves once the restored state is saved.
    pub fn undo(&mut self) -> Result<Reply, TaskError> {
        let restored = self.history.peek_undo()?.to_task_list();
        self.store
            .write(restored.tasks())
            .inspect_err(|err| warn!(%err, "undo not saved, staying put"))?;
        self.history.undo()?;
        self.tasks = restored;
        info!(count = self.tasks.len(), "undo");
        Ok(Reply::Undone {
            count: self.tasks.len(),
        })
    }

    /// Re-apply the most recently undone mutation.
    pub fn redo(&mut self) -> Result<Reply, TaskError> {
        let restored = self.history.peek_redo()?.to_task_list();
        self.store
            .write(restored.tasks())
            .inspect_err(|err| warn!(%err, "redo not saved, staying put"))?;
        self.history.redo()?;
        self.tasks = restored;
        info!(count = self.tasks.len(), "redo");
        Ok(Reply::Redone {
            count: self.tasks.len(),
        })
    }

    /// Write the live tasks as a calendar file at `path`. Nothing is written on error.
    pub fn export_with<E: Exporter>(
        &self,
        exporter: &E,
        path: &Path,
        filter: ExportFilter,
    ) -> Result<(), TaskError> {
        let document = exporter.export(self.tasks.tasks(), filter)?;
        atomic_write(path, document.as_bytes())?;
        info!(path = %path.display(), "calendar exported");
        Ok(())
    }

    fn commit<F>(&mut self, mutate: F) -> Result<Reply, TaskError>
    where
        F: FnOnce(&mut TaskList) -> Result<Reply, TaskError>,
    {
        let mut next = self.tasks.clone();
        let reply = mutate(&mut next)?;
        if let Err(err) = self.store.write(next.tasks()) {
            warn!(%err, "mutation not saved, rolled back");
            return Err(err);
        }
        self.history.push_state(HistoryState::capture(&next));
        self.tasks = next;
        info!(
            count = self.tasks.len(),
            undo_depth = self.history.undo_depth(),
            "mutation committed"
        );
        Ok(reply)
    }
}

fn owned<'a>(pairs: impl Iterator<Item = (usize, &'a Task)>) -> Vec<(usize, Task)> {
    pairs.map(|(index, task)| (index, task.clone())).collect()
}

/// Feed every command from `input` through `session`, reporting to `output`.
///
/// Recoverable errors are reported and the loop goes on; anything else stops it.
/// The sink says goodbye once the input runs out.
pub fn run<S, I, O, C>(
    session: &mut Session<S>,
    input: &mut I,
    output: &mut O,
    clock: C,
) -> Result<(), TaskError>
where
    S: FileStore,
    I: InputSource + ?Sized,
    O: OutputSink + ?Sized,
    C: Fn() -> TimeStamp,
{
    while let Some(command) = input.next_command() {
        match session.execute(command, clock()) {
            Ok(reply) => output.reply(&reply),
            Err(err) if err.is_recoverable() => output.error(&err),
            Err(err) => {
                output.error(&err);
                return Err(err);
            }
        }
    }
    output.farewell();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use time::macros::datetime;

    const NOW: TimeStamp = datetime!(2025-01-05 12:00);

    /// In-memory store that can be told to fail its next writes.
    #[derive(Default)]
    struct MemoryStore {
        saved: RefCell<Vec<Task>>,
        writes: Cell<usize>,
        fail_writes: Cell<bool>,
    }

    impl MemoryStore {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            Self {
                saved: RefCell::new(tasks),
                ..Self::default()
            }
        }
    }

    impl FileStore for MemoryStore {
        fn read(&self) -> Result<Vec<Task>, TaskError> {
            Ok(self.saved.borrow().clone())
        }

        fn write(&self, tasks: &[Task]) -> Result<(), TaskError> {
            if self.fail_writes.get() {
                return Err(TaskError::io("memory", std::io::Error::other("disk full")));
            }
            self.writes.set(self.writes.get() + 1);
            *self.saved.borrow_mut() = tasks.to_vec();
            Ok(())
        }
    }

    fn todo(desc: &str) -> Task {
        Task::builder()
            .description(desc)
            .created_at(datetime!(2025-01-01 09:00))
            .build_todo()
            .unwrap_or_else(|err| panic!("todo must build: {err}"))
    }

    fn session() -> Session<MemoryStore> {
        Session::open(MemoryStore::default()).unwrap_or_else(|err| panic!("must open: {err}"))
    }

    #[test]
    fn every_mutation_is_saved_in_full() -> Result<(), TaskError> {
        let mut s = session();
        s.execute(Command::Add(todo("a")), NOW)?;
        s.execute(Command::Add(todo("b")), NOW)?;
        s.execute(Command::Done(2), NOW)?;
        assert_eq!(s.store().writes.get(), 3);
        assert_eq!(*s.store().saved.borrow(), s.tasks().tasks().to_vec());
        Ok(())
    }

    #[test]
    fn queries_neither_save_nor_push_history() -> Result<(), TaskError> {
        let mut s = session();
        s.execute(Command::Add(todo("a")), NOW)?;
        s.execute(Command::List, NOW)?;
        s.execute(Command::Find("a".into()), NOW)?;
        s.execute(Command::Reminders, NOW)?;
        assert_eq!(s.store().writes.get(), 1);
        assert_eq!(s.history().undo_depth(), 1);
        Ok(())
    }

    #[test]
    fn failed_validation_changes_nothing() -> Result<(), TaskError> {
        let mut s = session();
        s.execute(Command::Add(todo("a")), NOW)?;
        let before = s.tasks().clone();
        assert!(matches!(s.execute(Command::Delete(5), NOW), Err(TaskError::InvalidIndex { .. })));
        s.execute(Command::Done(1), NOW)?;
        assert!(matches!(s.execute(Command::Done(1), NOW), Err(TaskError::AlreadyCompleted(_))));
        s.execute(Command::Undo, NOW)?;
        assert_eq!(s.tasks(), &before);
        assert_eq!(s.history().undo_depth(), 1);
        Ok(())
    }

    #[test]
    fn failed_save_rolls_back_mutation() -> Result<(), TaskError> {
        let mut s = session();
        s.execute(Command::Add(todo("a")), NOW)?;
        s.store().fail_writes.set(true);

        assert!(matches!(s.execute(Command::Add(todo("b")), NOW), Err(TaskError::Io { .. })));
        assert_eq!(s.tasks().len(), 1);
        assert_eq!(s.history().undo_depth(), 1);

        // Retrying once the store recovers works.
        s.store().fail_writes.set(false);
        s.execute(Command::Add(todo("b")), NOW)?;
        assert_eq!(s.tasks().len(), 2);
        Ok(())
    }

    #[test]
    fn failed_save_keeps_history_cursor() -> Result<(), TaskError> {
        let mut s = session();
        s.execute(Command::Add(todo("a")), NOW)?;
        s.execute(Command::Add(todo("b")), NOW)?;
        s.store().fail_writes.set(true);
        assert!(s.execute(Command::Undo, NOW).is_err());
        assert_eq!(s.tasks().len(), 2);
        assert_eq!(s.history().undo_depth(), 2);
        assert!(!s.history().can_redo());

        s.store().fail_writes.set(false);
        s.execute(Command::Undo, NOW)?;
        s.store().fail_writes.set(true);
        assert!(s.execute(Command::Redo, NOW).is_err());
        assert_eq!(s.tasks().len(), 1);
        assert_eq!(s.history().redo_depth(), 1);
        Ok(())
    }

    #[test]
    fn add_reports_clashes_but_still_adds() -> Result<(), TaskError> {
        let mut s = session();
        let lecture = Task::builder()
            .description("lecture")
            .build_event(datetime!(2025-01-10 10:00), datetime!(2025-01-10 11:00))?;
        let lab = Task::builder()
            .description("lab")
            .build_event(datetime!(2025-01-10 11:00), datetime!(2025-01-10 12:00))?;
        s.execute(Command::Add(lecture.clone()), NOW)?;
        match s.execute(Command::Add(lab), NOW)? {
            Reply::Added { count, clashes, .. } => {
                assert_eq!(count, 2);
                assert_eq!(clashes, vec![(1, lecture)]);
            }
            other => panic!("expected Added, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn session_opened_on_existing_tasks_starts_at_initial() -> Result<(), TaskError> {
        let mut s = Session::open(MemoryStore::with_tasks(vec![todo("kept")]))?;
        assert_eq!(s.tasks().len(), 1);
        assert!(matches!(s.execute(Command::Undo, NOW), Err(TaskError::NothingToUndo)));
        Ok(())
    }

    #[test]
    fn run_reports_recoverable_errors_and_continues() -> Result<(), TaskError> {
        let mut s = session();
        let mut input = vec![Command::Undo, Command::Add(todo("a")), Command::List].into_iter();
        let mut out = crate::output::Transcript::new();
        run(&mut s, &mut input, &mut out, || NOW)?;
        let lines = out.take();
        assert_eq!(lines[0], "OOPS!!! there is nothing to undo");
        assert_eq!(
            lines[lines.len() - 2..],
            ["1. [T][\u{2718}] a", crate::output::FAREWELL]
        );
        Ok(())
    }

    #[test]
    fn failed_save_is_reported_and_the_loop_finishes() {
        let mut s = session();
        s.store().fail_writes.set(true);
        let mut input = vec![Command::Add(todo("a"))].into_iter();
        let mut out = crate::output::Transcript::new();
        assert!(run(&mut s, &mut input, &mut out, || NOW).is_ok());
        assert_eq!(out.lines().len(), 2);
        assert!(out.lines()[0].starts_with("OOPS!!! I/O error on memory"));
        assert_eq!(out.lines()[1], crate::output::FAREWELL);
        assert!(s.tasks().is_empty());
    }
}
