//! Snapshot-based linear undo/redo.

use std::sync::Arc;

use tracing::debug;

use crate::error::TaskError;
use crate::model::Task;
use crate::task_list::TaskList;

/// Immutable copy of the task sequence at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryState {
    tasks: Arc<[Task]>,
}

impl HistoryState {
    pub fn capture(list: &TaskList) -> Self {
        Self {
            tasks: list.tasks().into(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Fresh, independently mutable list holding this state's tasks.
    pub fn to_task_list(&self) -> TaskList {
        TaskList::from_tasks(self.tasks.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPosition {
    /// Only the starting state is on the undo stack.
    AtInitial,
    CanUndo,
}

/// Two stacks; the live list always equals the top of `undo`.
///
/// `undo[0]` is the state the session started from and is never popped.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    undo: Vec<HistoryState>,
    redo: Vec<HistoryState>,
}

impl HistoryStack {
    pub fn new(initial: HistoryState) -> Self {
        Self {
            undo: vec![initial],
            redo: Vec::new(),
        }
    }

    pub fn position(&self) -> HistoryPosition {
        if self.undo.len() > 1 {
            HistoryPosition::CanUndo
        } else {
            HistoryPosition::AtInitial
        }
    }

    pub fn can_undo(&self) -> bool {
        self.position() == HistoryPosition::CanUndo
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of steps that can be undone.
    pub fn undo_depth(&self) -> usize {
        self.undo.len() - 1
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn current(&self) -> &HistoryState {
        // `undo` is never emptied.
        &self.undo[self.undo.len() - 1]
    }

    /// Record a new state; every undone future is discarded.
    pub fn push_state(&mut self, state: HistoryState) {
        self.undo.push(state);
        if !self.redo.is_empty() {
            debug!(discarded = self.redo.len(), "redo history invalidated");
            self.redo.clear();
        }
    }

    /// The state [`undo`](Self::undo) would restore, without moving.
    pub fn peek_undo(&self) -> Result<&HistoryState, TaskError> {
        if !self.can_undo() {
            return Err(TaskError::NothingToUndo);
        }
        Ok(&self.undo[self.undo.len() - 2])
    }

    /// The state [`redo`](Self::redo) would restore, without moving.
    pub fn peek_redo(&self) -> Result<&HistoryState, TaskError> {
        self.redo.last().ok_or(TaskError::NothingToRedo)
    }

    /// Step back and return the state to restore.
    pub fn undo(&mut self) -> Result<&HistoryState, TaskError> {
        if !self.can_undo() {
            return Err(TaskError::NothingToUndo);
        }
        if let Some(top) = self.undo.pop() {
            self.redo.push(top);
        }
        Ok(self.current())
    }

    /// Step forward again and return the state to restore.
    pub fn redo(&mut self) -> Result<&HistoryState, TaskError> {
        let state = self.redo.pop().ok_or(TaskError::NothingToRedo)?;
        self.undo.push(state);
        Ok(self.current())
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(HistoryState::capture(&TaskList::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn list_of(descs: &[&str]) -> TaskList {
        TaskList::from_tasks(
            descs
                .iter()
                .map(|d| {
                    Task::builder()
                        .description(*d)
                        .created_at(datetime!(2025-01-01 09:00))
                        .build_todo()
                        .unwrap_or_else(|err| panic!("todo must build: {err}"))
                })
                .collect(),
        )
    }

    #[test]
    fn fresh_stack_has_nothing_to_undo_or_redo() {
        let mut history = HistoryStack::default();
        assert_eq!(history.position(), HistoryPosition::AtInitial);
        assert!(matches!(history.undo(), Err(TaskError::NothingToUndo)));
        assert!(matches!(history.redo(), Err(TaskError::NothingToRedo)));
        assert!(history.current().tasks().is_empty());
    }

    #[test]
    fn undo_then_redo_restores_identical_state() -> Result<(), TaskError> {
        let mut history = HistoryStack::default();
        let one = HistoryState::capture(&list_of(&["a"]));
        let two = HistoryState::capture(&list_of(&["a", "b"]));
        history.push_state(one.clone());
        history.push_state(two.clone());

        assert_eq!(history.undo()?, &one);
        assert_eq!(history.redo()?, &two);
        assert_eq!(history.current(), &two);
        Ok(())
    }

    #[test]
    fn undo_all_then_redo_all_round_trips() -> Result<(), TaskError> {
        let mut history = HistoryStack::default();
        let states: Vec<HistoryState> = (1..=4)
            .map(|n| {
                let descs: Vec<String> = (0..n).map(|i| format!("task {i}")).collect();
                let refs: Vec<&str> = descs.iter().map(String::as_str).collect();
                HistoryState::capture(&list_of(&refs))
            })
            .collect();
        for state in &states {
            history.push_state(state.clone());
        }

        for _ in &states {
            history.undo()?;
        }
        assert!(history.current().tasks().is_empty());
        assert_eq!(history.position(), HistoryPosition::AtInitial);

        for _ in &states {
            history.redo()?;
        }
        assert_eq!(history.current(), &states[3]);
        assert!(!history.can_redo());
        Ok(())
    }

    #[test]
    fn peeking_leaves_the_cursor_alone() -> Result<(), TaskError> {
        let mut history = HistoryStack::default();
        assert!(matches!(history.peek_undo(), Err(TaskError::NothingToUndo)));
        let one = HistoryState::capture(&list_of(&["a"]));
        history.push_state(one.clone());

        assert!(history.peek_undo()?.tasks().is_empty());
        assert_eq!(history.undo_depth(), 1);
        history.undo()?;
        assert_eq!(history.peek_redo()?, &one);
        assert_eq!(history.redo_depth(), 1);
        Ok(())
    }

    #[test]
    fn push_after_undo_discards_redo_branch() -> Result<(), TaskError> {
        let mut history = HistoryStack::default();
        history.push_state(HistoryState::capture(&list_of(&["a"])));
        history.push_state(HistoryState::capture(&list_of(&["a", "b"])));
        history.undo()?;
        history.undo()?;
        assert_eq!(history.redo_depth(), 2);

        history.push_state(HistoryState::capture(&list_of(&["c"])));
        assert_eq!(history.redo_depth(), 0);
        assert!(matches!(history.redo(), Err(TaskError::NothingToRedo)));
        assert_eq!(history.undo_depth(), 1);
        Ok(())
    }

    #[test]
    fn restored_list_is_detached_from_snapshot() -> Result<(), TaskError> {
        let state = HistoryState::capture(&list_of(&["a"]));
        let mut list = state.to_task_list();
        list.mark_done(1)?;
        assert!(!state.tasks()[0].is_done());
        Ok(())
    }
}
