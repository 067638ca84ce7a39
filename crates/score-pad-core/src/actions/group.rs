/// Multi-note insert, remove, and change actions.
use std::any::Any;
use std::rc::Rc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{from_params, to_params, NOTES_GROUP_CHANGE, NOTES_GROUP_INSERT, NOTES_GROUP_REMOVE};
use crate::history::UndoAction;
use crate::note::Note;
use crate::sequence::SequenceHandle;

#[derive(Serialize, Deserialize)]
struct GroupParams {
    notes: Vec<Note>,
}

#[derive(Serialize, Deserialize)]
struct GroupChangeParams {
    before: Vec<Note>,
    after: Vec<Note>,
}

/// Adds several notes at once. Either all are added or none.
pub struct NotesGroupInsertAction {
    sequence: SequenceHandle,
    notes: Vec<Note>,
}

impl NotesGroupInsertAction {
    pub fn new(sequence: SequenceHandle, notes: Vec<Note>) -> Self {
        Self { sequence, notes }
    }

    pub(crate) fn unbound(sequence: SequenceHandle) -> Self {
        Self::new(sequence, Vec::new())
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }
}

impl UndoAction for NotesGroupInsertAction {
    fn perform(&mut self) -> bool {
        self.sequence.borrow_mut().insert_group(&self.notes)
    }

    fn undo(&mut self) -> bool {
        self.sequence.borrow_mut().remove_group(&self.notes)
    }

    fn size_in_units(&self) -> usize {
        self.notes.len()
    }

    fn kind_tag(&self) -> &'static str {
        NOTES_GROUP_INSERT
    }

    fn serialize_params(&self) -> Result<Value> {
        to_params(&GroupParams {
            notes: self.notes.clone(),
        })
    }

    fn deserialize_params(&mut self, params: &Value) -> Result<()> {
        let params: GroupParams = from_params(params)?;
        self.notes = params.notes;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Removes several notes at once.
pub struct NotesGroupRemoveAction {
    sequence: SequenceHandle,
    notes: Vec<Note>,
}

impl NotesGroupRemoveAction {
    pub fn new(sequence: SequenceHandle, notes: Vec<Note>) -> Self {
        Self { sequence, notes }
    }

    pub(crate) fn unbound(sequence: SequenceHandle) -> Self {
        Self::new(sequence, Vec::new())
    }
}

impl UndoAction for NotesGroupRemoveAction {
    fn perform(&mut self) -> bool {
        self.sequence.borrow_mut().remove_group(&self.notes)
    }

    fn undo(&mut self) -> bool {
        self.sequence.borrow_mut().insert_group(&self.notes)
    }

    fn size_in_units(&self) -> usize {
        self.notes.len()
    }

    fn kind_tag(&self) -> &'static str {
        NOTES_GROUP_REMOVE
    }

    fn serialize_params(&self) -> Result<Value> {
        to_params(&GroupParams {
            notes: self.notes.clone(),
        })
    }

    fn deserialize_params(&mut self, params: &Value) -> Result<()> {
        let params: GroupParams = from_params(params)?;
        self.notes = params.notes;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Changes several notes at once. `before[i]` and `after[i]` describe the
/// same note.
pub struct NotesGroupChangeAction {
    sequence: SequenceHandle,
    before: Vec<Note>,
    after: Vec<Note>,
}

impl NotesGroupChangeAction {
    pub fn new(sequence: SequenceHandle, before: Vec<Note>, after: Vec<Note>) -> Self {
        Self {
            sequence,
            before,
            after,
        }
    }

    pub(crate) fn unbound(sequence: SequenceHandle) -> Self {
        Self::new(sequence, Vec::new(), Vec::new())
    }

    pub fn before(&self) -> &[Note] {
        &self.before
    }

    pub fn after(&self) -> &[Note] {
        &self.after
    }
}

impl UndoAction for NotesGroupChangeAction {
    fn perform(&mut self) -> bool {
        self.sequence
            .borrow_mut()
            .change_group(&self.before, &self.after)
    }

    fn undo(&mut self) -> bool {
        self.sequence
            .borrow_mut()
            .change_group(&self.after, &self.before)
    }

    fn size_in_units(&self) -> usize {
        self.before.len() * 2
    }

    fn kind_tag(&self) -> &'static str {
        NOTES_GROUP_CHANGE
    }

    fn try_coalesce(&self, next: &dyn UndoAction) -> Option<Box<dyn UndoAction>> {
        let next = next.as_any().downcast_ref::<NotesGroupChangeAction>()?;
        if !Rc::ptr_eq(&self.sequence, &next.sequence) || self.after != next.before {
            return None;
        }
        Some(Box::new(NotesGroupChangeAction::new(
            Rc::clone(&self.sequence),
            self.before.clone(),
            next.after.clone(),
        )))
    }

    fn serialize_params(&self) -> Result<Value> {
        to_params(&GroupChangeParams {
            before: self.before.clone(),
            after: self.after.clone(),
        })
    }

    fn deserialize_params(&mut self, params: &Value) -> Result<()> {
        let params: GroupChangeParams = from_params(params)?;
        self.before = params.before;
        self.after = params.after;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
