//! Note storage edited by the undoable actions.
//!
//! A `Sequence` is shared between a project and every action that edits it
//! through a `SequenceHandle`. Mutators return `false` and leave the
//! sequence unchanged when the edit does not apply.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::note::Note;

/// Shared, single-threaded handle to a sequence.
pub type SequenceHandle = Rc<RefCell<Sequence>>;

/// Notes ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    notes: BTreeMap<u64, Note>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence from `notes`; later duplicates replace earlier ones.
    pub fn from_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        Self {
            notes: notes.into_iter().map(|n| (n.id, n)).collect(),
        }
    }

    /// Wraps this sequence in a shared handle.
    pub fn into_handle(self) -> SequenceHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Note> {
        self.notes.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.notes.contains_key(&id)
    }

    /// Notes in id order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.notes.keys().copied().collect()
    }

    /// Adds a note. Fails if its id is taken.
    pub fn insert(&mut self, note: Note) -> bool {
        if self.notes.contains_key(&note.id) {
            return false;
        }
        self.notes.insert(note.id, note);
        true
    }

    /// Removes and returns the note with `id`.
    pub fn remove(&mut self, id: u64) -> Option<Note> {
        self.notes.remove(&id)
    }

    /// Replaces `before` with `after`. Both must share an id, and the stored
    /// note must still equal `before`.
    pub fn change(&mut self, before: &Note, after: &Note) -> bool {
        if before.id != after.id {
            return false;
        }
        match self.notes.get_mut(&before.id) {
            Some(slot) if *slot == *before => {
                *slot = after.clone();
                true
            }
            _ => false,
        }
    }

    /// Adds every note, or none if any id is taken or repeated.
    pub fn insert_group(&mut self, notes: &[Note]) -> bool {
        let mut seen = HashSet::new();
        if notes
            .iter()
            .any(|n| self.notes.contains_key(&n.id) || !seen.insert(n.id))
        {
            return false;
        }
        for note in notes {
            self.notes.insert(note.id, note.clone());
        }
        true
    }

    /// Removes every note, or none if any is missing or repeated.
    pub fn remove_group(&mut self, notes: &[Note]) -> bool {
        let mut seen = HashSet::new();
        if notes
            .iter()
            .any(|n| !self.notes.contains_key(&n.id) || !seen.insert(n.id))
        {
            return false;
        }
        for note in notes {
            self.notes.remove(&note.id);
        }
        true
    }

    /// Applies pairwise changes, or none if any pair does not apply or an
    /// id repeats.
    pub fn change_group(&mut self, before: &[Note], after: &[Note]) -> bool {
        let mut seen = HashSet::new();
        if before.len() != after.len()
            || before.iter().zip(after).any(|(b, a)| {
                b.id != a.id || self.notes.get(&b.id) != Some(b) || !seen.insert(b.id)
            })
        {
            return false;
        }
        for note in after {
            self.notes.insert(note.id, note.clone());
        }
        true
    }
}
