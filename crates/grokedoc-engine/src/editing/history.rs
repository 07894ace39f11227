use std::collections::VecDeque;
use std::rc::Rc;

use crate::editing::buffer::TextBuffer;
use crate::editing::selection::Selection;
use crate::editing::tree::DocumentTree;

/// Checkpoint of the full editing state.
///
/// The tree and buffer content are shared with the live state through `Rc`
/// until the next edit copies them.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tree: Rc<DocumentTree>,
    pub buffer: TextBuffer,
    pub selection: Option<Selection>,
}

impl Snapshot {
    /// Same buffer content, checking the shared pointer before comparing logs.
    /// Tree and selection are not compared.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.buffer.shares_content_with(&other.buffer)
            || self.buffer.content() == other.buffer.content()
    }
}

/// Bounded undo/redo stacks of [`Snapshot`]s.
#[derive(Debug)]
pub struct History {
    past: VecDeque<Snapshot>,
    future: Vec<Snapshot>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            limit,
        }
    }

    /// Record a checkpoint. Returns `false` when it duplicates the newest one.
    ///
    /// A real push invalidates the redo stack and drops the oldest
    /// checkpoints beyond the limit.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        if self
            .past
            .back()
            .is_some_and(|top| top.same_content(&snapshot))
        {
            log::debug!("history push skipped, content unchanged");
            return false;
        }
        self.past.push_back(snapshot);
        self.future.clear();
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
        log::debug!("history push, {} checkpoints", self.past.len());
        true
    }

    /// Trade `current` for the newest checkpoint, keeping `current` for redo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.past.pop_back()?;
        self.future.push(current);
        Some(previous)
    }

    /// Trade `current` for the newest undone state, keeping `current` for undo.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.future.pop()?;
        self.past.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(text: &str) -> Snapshot {
        Snapshot {
            tree: Rc::new(DocumentTree::single_paragraph(text.chars().count())),
            buffer: TextBuffer::from_text(text),
            selection: None,
        }
    }

    fn text_of(snapshot: &Snapshot) -> String {
        snapshot.buffer.get_text()
    }

    #[test]
    fn test_push_dedups_identical_state() {
        let mut history = History::new(10);
        let first = snapshot("a");
        assert!(history.push(first.clone()));
        assert!(!history.push(first.clone()));
        assert_eq!(history.undo_depth(), 1);

        // Equal content behind different pointers is still a duplicate
        let copy = Snapshot {
            tree: Rc::new((*first.tree).clone()),
            buffer: TextBuffer::from_content(first.buffer.to_content()),
            selection: None,
        };
        assert!(!history.push(copy));
    }

    #[test]
    fn test_push_ignores_tree_and_selection_changes() {
        let mut history = History::new(10);
        let first = snapshot("abc");
        assert!(history.push(first.clone()));

        let moved = Snapshot {
            tree: Rc::new(DocumentTree::single_paragraph(3)),
            buffer: first.buffer.clone(),
            selection: Some(Selection::caret(first.tree.leaves()[0].id(), 2)),
        };
        assert!(!history.push(moved));
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn test_undo_redo_swap_states() {
        let mut history = History::new(10);
        history.push(snapshot("one"));
        let restored = history.undo(snapshot("two")).unwrap();
        assert_eq!(text_of(&restored), "one");
        assert!(history.can_redo());
        assert!(!history.can_undo());

        let again = history.redo(restored).unwrap();
        assert_eq!(text_of(&again), "two");
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_stacks_return_none() {
        let mut history = History::new(10);
        assert!(history.undo(snapshot("x")).is_none());
        assert!(history.redo(snapshot("x")).is_none());
    }

    #[test]
    fn test_push_clears_future() {
        let mut history = History::new(10);
        history.push(snapshot("a"));
        history.undo(snapshot("b"));
        assert!(history.can_redo());
        history.push(snapshot("c"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(2);
        history.push(snapshot("a"));
        history.push(snapshot("b"));
        history.push(snapshot("c"));
        assert_eq!(history.undo_depth(), 2);
        let newest = history.undo(snapshot("d")).unwrap();
        assert_eq!(text_of(&newest), "c");
        let oldest = history.undo(newest).unwrap();
        assert_eq!(text_of(&oldest), "b");
        assert!(!history.can_undo());
    }
}
