/// Single-note insert, remove, and change actions.
use std::any::Any;
use std::rc::Rc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{from_params, to_params, NOTE_CHANGE, NOTE_INSERT, NOTE_REMOVE};
use crate::history::UndoAction;
use crate::note::Note;
use crate::sequence::SequenceHandle;

#[derive(Serialize, Deserialize)]
struct NoteParams {
    note: Note,
}

#[derive(Serialize, Deserialize)]
struct ChangeParams {
    before: Note,
    after: Note,
}

/// Adds one note.
pub struct NoteInsertAction {
    sequence: SequenceHandle,
    note: Note,
}

impl NoteInsertAction {
    pub fn new(sequence: SequenceHandle, note: Note) -> Self {
        Self { sequence, note }
    }

    /// Empty action awaiting `deserialize_params`.
    pub(crate) fn unbound(sequence: SequenceHandle) -> Self {
        Self::new(sequence, Note::default())
    }

    pub fn note(&self) -> &Note {
        &self.note
    }
}

impl UndoAction for NoteInsertAction {
    fn perform(&mut self) -> bool {
        self.sequence.borrow_mut().insert(self.note.clone())
    }

    fn undo(&mut self) -> bool {
        self.sequence.borrow_mut().remove(self.note.id).is_some()
    }

    fn size_in_units(&self) -> usize {
        1
    }

    fn kind_tag(&self) -> &'static str {
        NOTE_INSERT
    }

    fn serialize_params(&self) -> Result<Value> {
        to_params(&NoteParams {
            note: self.note.clone(),
        })
    }

    fn deserialize_params(&mut self, params: &Value) -> Result<()> {
        let params: NoteParams = from_params(params)?;
        self.note = params.note;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Removes one note, remembering it for undo.
pub struct NoteRemoveAction {
    sequence: SequenceHandle,
    note: Note,
}

impl NoteRemoveAction {
    pub fn new(sequence: SequenceHandle, note: Note) -> Self {
        Self { sequence, note }
    }

    pub(crate) fn unbound(sequence: SequenceHandle) -> Self {
        Self::new(sequence, Note::default())
    }
}

impl UndoAction for NoteRemoveAction {
    fn perform(&mut self) -> bool {
        self.sequence.borrow_mut().remove(self.note.id).is_some()
    }

    fn undo(&mut self) -> bool {
        self.sequence.borrow_mut().insert(self.note.clone())
    }

    fn size_in_units(&self) -> usize {
        1
    }

    fn kind_tag(&self) -> &'static str {
        NOTE_REMOVE
    }

    fn serialize_params(&self) -> Result<Value> {
        to_params(&NoteParams {
            note: self.note.clone(),
        })
    }

    fn deserialize_params(&mut self, params: &Value) -> Result<()> {
        let params: NoteParams = from_params(params)?;
        self.note = params.note;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Replaces a note's properties.
///
/// Consecutive changes of the same note in one transaction collapse into a
/// single change from the first state to the last, so dragging a note
/// leaves one undo entry instead of one per mouse move.
pub struct NoteChangeAction {
    sequence: SequenceHandle,
    before: Note,
    after: Note,
}

impl NoteChangeAction {
    pub fn new(sequence: SequenceHandle, before: Note, after: Note) -> Self {
        Self {
            sequence,
            before,
            after,
        }
    }

    pub(crate) fn unbound(sequence: SequenceHandle) -> Self {
        Self::new(sequence, Note::default(), Note::default())
    }

    pub fn before(&self) -> &Note {
        &self.before
    }

    pub fn after(&self) -> &Note {
        &self.after
    }
}

impl UndoAction for NoteChangeAction {
    fn perform(&mut self) -> bool {
        self.sequence.borrow_mut().change(&self.before, &self.after)
    }

    fn undo(&mut self) -> bool {
        self.sequence.borrow_mut().change(&self.after, &self.before)
    }

    fn size_in_units(&self) -> usize {
        2
    }

    fn kind_tag(&self) -> &'static str {
        NOTE_CHANGE
    }

    fn try_coalesce(&self, next: &dyn UndoAction) -> Option<Box<dyn UndoAction>> {
        let next = next.as_any().downcast_ref::<NoteChangeAction>()?;
        if !Rc::ptr_eq(&self.sequence, &next.sequence) || self.after != next.before {
            return None;
        }
        Some(Box::new(NoteChangeAction::new(
            Rc::clone(&self.sequence),
            self.before.clone(),
            next.after.clone(),
        )))
    }

    fn serialize_params(&self) -> Result<Value> {
        to_params(&ChangeParams {
            before: self.before.clone(),
            after: self.after.clone(),
        })
    }

    fn deserialize_params(&mut self, params: &Value) -> Result<()> {
        let params: ChangeParams = from_params(params)?;
        self.before = params.before;
        self.after = params.after;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
