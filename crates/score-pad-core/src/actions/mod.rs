//! Undoable note edits and their registration with the action factory.

mod group;
mod note;

use std::rc::Rc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::history::ActionRegistry;
use crate::sequence::SequenceHandle;

pub use group::{NotesGroupChangeAction, NotesGroupInsertAction, NotesGroupRemoveAction};
pub use note::{NoteChangeAction, NoteInsertAction, NoteRemoveAction};

// Persisted kind tags. Never rename: stored histories refer to them.
pub const NOTE_INSERT: &str = "noteInsertAction";
pub const NOTE_REMOVE: &str = "noteRemoveAction";
pub const NOTE_CHANGE: &str = "noteChangeAction";
pub const NOTES_GROUP_INSERT: &str = "notesGroupInsertAction";
pub const NOTES_GROUP_REMOVE: &str = "notesGroupRemoveAction";
pub const NOTES_GROUP_CHANGE: &str = "notesGroupChangeAction";

/// Registers a constructor for every note action kind, bound to `sequence`.
pub fn register_note_actions(registry: &mut ActionRegistry, sequence: &SequenceHandle) {
    let seq = Rc::clone(sequence);
    registry.register(NOTE_INSERT, move || {
        Box::new(NoteInsertAction::unbound(Rc::clone(&seq)))
    });
    let seq = Rc::clone(sequence);
    registry.register(NOTE_REMOVE, move || {
        Box::new(NoteRemoveAction::unbound(Rc::clone(&seq)))
    });
    let seq = Rc::clone(sequence);
    registry.register(NOTE_CHANGE, move || {
        Box::new(NoteChangeAction::unbound(Rc::clone(&seq)))
    });
    let seq = Rc::clone(sequence);
    registry.register(NOTES_GROUP_INSERT, move || {
        Box::new(NotesGroupInsertAction::unbound(Rc::clone(&seq)))
    });
    let seq = Rc::clone(sequence);
    registry.register(NOTES_GROUP_REMOVE, move || {
        Box::new(NotesGroupRemoveAction::unbound(Rc::clone(&seq)))
    });
    let seq = Rc::clone(sequence);
    registry.register(NOTES_GROUP_CHANGE, move || {
        Box::new(NotesGroupChangeAction::unbound(Rc::clone(&seq)))
    });
}

fn to_params<T: Serialize>(params: &T) -> Result<Value> {
    serde_json::to_value(params).context("Failed to encode action parameters")
}

fn from_params<T: DeserializeOwned>(params: &Value) -> Result<T> {
    serde_json::from_value(params.clone()).context("Failed to decode action parameters")
}
