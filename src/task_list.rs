//! Ordered task collection addressed by 1-based positions.

use tracing::debug;

use crate::error::TaskError;
use crate::model::{Priority, Task, TimeStamp};

/// Tasks in insertion order. Indices are positions, not identifiers:
/// removing a task shifts every later one down by one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, index: usize) -> Result<&Task, TaskError> {
        let pos = self.position(index)?;
        Ok(&self.tasks[pos])
    }

    /// `(index, task)` pairs in list order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Task)> + Clone {
        self.tasks.iter().enumerate().map(|(pos, t)| (pos + 1, t))
    }

    /// Append and return the new task's index. No duplicate or clash checks.
    pub fn add(&mut self, task: Task) -> usize {
        self.tasks.push(task);
        debug!(count = self.tasks.len(), "task appended");
        self.tasks.len()
    }

    pub fn mark_done(&mut self, index: usize) -> Result<&Task, TaskError> {
        let task = self.get_mut(index)?;
        task.mark_done()?;
        Ok(task)
    }

    /// Remove and return the task at `index`.
    pub fn delete(&mut self, index: usize) -> Result<Task, TaskError> {
        let pos = self.position(index)?;
        Ok(self.tasks.remove(pos))
    }

    pub fn edit_comment<S: Into<String>>(&mut self, index: usize, text: S) -> Result<&Task, TaskError> {
        let task = self.get_mut(index)?;
        task.set_comment(text);
        Ok(task)
    }

    pub fn edit_description<S: Into<String>>(&mut self, index: usize, text: S) -> Result<&Task, TaskError> {
        let task = self.get_mut(index)?;
        task.set_description(text)?;
        Ok(task)
    }

    pub fn set_priority(&mut self, index: usize, priority: Priority) -> Result<&Task, TaskError> {
        let task = self.get_mut(index)?;
        task.set_priority(priority);
        Ok(task)
    }

    pub fn set_location(&mut self, index: usize, location: Option<String>) -> Result<&Task, TaskError> {
        let task = self.get_mut(index)?;
        task.set_location(location);
        Ok(task)
    }

    /// Tasks whose description contains `needle` (case-sensitive), lazily.
    ///
    /// The iterator is `Clone`, so a caller can walk the matches again.
    pub fn find_by_keyword<'a>(
        &'a self,
        needle: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Task)> + Clone + 'a {
        self.iter()
            .filter(move |(_, t)| t.description().contains(needle))
    }

    /// Existing tasks that clash with `task`.
    pub fn scan_clashes<'a>(
        &'a self,
        task: &'a Task,
    ) -> impl Iterator<Item = (usize, &'a Task)> + Clone + 'a {
        self.iter().filter(move |(_, t)| t.check_for_clash(task))
    }

    /// Tasks whose reminder is showing at `now`.
    pub fn scan_reminders(&self, now: TimeStamp) -> impl Iterator<Item = (usize, &Task)> + Clone {
        self.iter()
            .filter(move |(_, t)| t.check_reminder_trigger(now))
    }

    fn position(&self, index: usize) -> Result<usize, TaskError> {
        if index == 0 || index > self.tasks.len() {
            return Err(TaskError::InvalidIndex {
                index,
                len: self.tasks.len(),
            });
        }
        Ok(index - 1)
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Task, TaskError> {
        let pos = self.position(index)?;
        Ok(&mut self.tasks[pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn todo(desc: &str) -> Task {
        Task::builder()
            .description(desc)
            .created_at(datetime!(2025-01-01 09:00))
            .build_todo()
            .unwrap_or_else(|err| panic!("todo must build: {err}"))
    }

    fn list_of(descs: &[&str]) -> TaskList {
        TaskList::from_tasks(descs.iter().map(|d| todo(d)).collect())
    }

    #[test]
    fn add_returns_one_based_index() {
        let mut list = TaskList::new();
        assert_eq!(list.add(todo("a")), 1);
        assert_eq!(list.add(todo("a")), 2);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn out_of_range_indices_leave_list_untouched() {
        let mut list = list_of(&["a", "b"]);
        let before = list.clone();
        for index in [0, 3, usize::MAX] {
            assert!(matches!(list.mark_done(index), Err(TaskError::InvalidIndex { .. })));
            assert!(matches!(list.delete(index), Err(TaskError::InvalidIndex { .. })));
            assert!(matches!(list.edit_comment(index, "x"), Err(TaskError::InvalidIndex { .. })));
        }
        assert_eq!(list, before);
    }

    #[test]
    fn delete_shifts_later_tasks_down() -> Result<(), TaskError> {
        let mut list = list_of(&["a", "b", "c", "d"]);
        let removed = list.delete(2)?;
        assert_eq!(removed.description(), "b");
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(1)?.description(), "a");
        assert_eq!(list.get(2)?.description(), "c");
        assert_eq!(list.get(3)?.description(), "d");
        Ok(())
    }

    #[test]
    fn double_mark_done_is_rejected() -> Result<(), TaskError> {
        let mut list = list_of(&["a"]);
        list.mark_done(1)?;
        let before = list.clone();
        assert!(matches!(list.mark_done(1), Err(TaskError::AlreadyCompleted(_))));
        assert_eq!(list, before);
        Ok(())
    }

    #[test]
    fn blank_description_edit_is_rejected() {
        let mut list = list_of(&["a"]);
        let before = list.clone();
        assert!(matches!(list.edit_description(1, " "), Err(TaskError::EmptyDescription)));
        assert_eq!(list, before);
    }

    #[test]
    fn priority_and_location_edits_touch_only_their_task() -> Result<(), TaskError> {
        let mut list = list_of(&["a", "b"]);
        list.set_priority(2, Priority::Low)?;
        list.set_location(2, Some("lab".into()))?;
        assert_eq!(list.get(2)?.priority(), Priority::Low);
        assert_eq!(list.get(2)?.location(), Some("lab"));
        assert_eq!(list.get(1)?, &todo("a"));

        list.set_location(2, None)?;
        assert_eq!(list.get(2)?.location(), None);
        assert!(matches!(
            list.set_priority(3, Priority::High),
            Err(TaskError::InvalidIndex { index: 3, len: 2 })
        ));
        Ok(())
    }

    #[test]
    fn find_is_case_sensitive_ordered_and_restartable() {
        let list = list_of(&["Read book", "read news", "write", "reread notes"]);
        let found = list.find_by_keyword("read");
        let first: Vec<usize> = found.clone().map(|(i, _)| i).collect();
        let second: Vec<usize> = found.map(|(i, _)| i).collect();
        assert_eq!(first, vec![2, 4]);
        assert_eq!(first, second);
    }

    #[test]
    fn scan_clashes_reports_overlapping_tasks() -> Result<(), TaskError> {
        let mut list = list_of(&["plain"]);
        list.add(
            Task::builder()
                .description("lecture")
                .build_event(datetime!(2025-01-10 10:00), datetime!(2025-01-10 12:00))?,
        );
        list.add(
            Task::builder()
                .description("lunch")
                .build_event(datetime!(2025-01-10 12:30), datetime!(2025-01-10 13:30))?,
        );
        let probe = Task::builder()
            .description("call")
            .build_event(datetime!(2025-01-10 11:30), datetime!(2025-01-10 12:00))?;
        let hits: Vec<&str> = list.scan_clashes(&probe).map(|(_, t)| t.description()).collect();
        assert_eq!(hits, vec!["lecture"]);
        Ok(())
    }

    #[test]
    fn scan_reminders_keeps_list_order() -> Result<(), TaskError> {
        let mut list = list_of(&["old todo"]);
        list.add(
            Task::builder()
                .description("far deadline")
                .build_deadline(datetime!(2025-06-01 12:00))?,
        );
        list.add(
            Task::builder()
                .description("near deadline")
                .build_deadline(datetime!(2025-01-11 12:00))?,
        );
        let due: Vec<usize> = list
            .scan_reminders(datetime!(2025-01-10 12:00))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(due, vec![1, 3]);
        Ok(())
    }
}
