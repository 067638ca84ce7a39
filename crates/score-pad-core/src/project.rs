//! A note sequence paired with its undo history.
//!
//! `Project` is the entry point for editing: every edit goes through a note
//! action performed on the project's `UndoStack`, so it can be undone,
//! redone, persisted, and restored. Project files are JSON nodes tagged
//! `project` that carry the notes and, as a child, the serialized history.

use std::cell::Ref;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{
    register_note_actions, NoteChangeAction, NoteInsertAction, NoteRemoveAction,
    NotesGroupChangeAction, NotesGroupInsertAction, NotesGroupRemoveAction,
};
use crate::history::{
    doc_id_for_path, generate_unsaved_id, ActionRegistry, HistoryConfig, PersistenceLayer,
    UndoStack,
};
use crate::note::Note;
use crate::sequence::{Sequence, SequenceHandle};

/// Tag of the project file's root node.
const PROJECT_TAG: &str = "project";

/// On-disk layout of a project file.
#[derive(Serialize, Deserialize)]
struct ProjectFile {
    tag: String,
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    children: Vec<Value>,
}

pub struct Project {
    sequence: SequenceHandle,
    history: UndoStack,
    registry: ActionRegistry,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("notes", &self.sequence.borrow().len())
            .field("history", &self.history)
            .finish()
    }
}

impl Project {
    /// Creates an empty project with in-memory history and default settings.
    pub fn in_memory() -> Self {
        let sequence = Sequence::new().into_handle();
        let registry = Self::registry_for(&sequence);
        Self {
            sequence,
            history: UndoStack::in_memory(),
            registry,
        }
    }

    /// Creates an empty, unsaved project.
    pub fn new(config: HistoryConfig, persistence: Option<Arc<PersistenceLayer>>) -> Self {
        let sequence = Sequence::new().into_handle();
        let registry = Self::registry_for(&sequence);
        Self {
            sequence,
            history: UndoStack::new(generate_unsaved_id(), config, persistence),
            registry,
        }
    }

    /// Wraps `sequence`, loading any history stored for `doc_id`.
    ///
    /// The stored history must describe edits that led to `sequence`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored history cannot be read or rebuilt.
    pub fn with_sequence(
        sequence: Sequence,
        doc_id: String,
        config: HistoryConfig,
        persistence: Option<Arc<PersistenceLayer>>,
    ) -> Result<Self> {
        let sequence = sequence.into_handle();
        let registry = Self::registry_for(&sequence);
        let history = UndoStack::load_or_new(doc_id, config, persistence, &registry)
            .context("failed to load undo history")?;
        Ok(Self {
            sequence,
            history,
            registry,
        })
    }

    /// Opens a project file, restoring the history embedded in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a project node,
    /// or embeds a history that cannot be rebuilt.
    pub fn open_file(
        path: &Path,
        config: HistoryConfig,
        persistence: Option<Arc<PersistenceLayer>>,
    ) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read project: {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse project: {}", path.display()))?;
        let file: ProjectFile =
            serde_json::from_value(value.clone()).context("malformed project node")?;
        if file.tag != PROJECT_TAG {
            bail!("Expected a `{PROJECT_TAG}` node, found `{}`", file.tag);
        }

        let sequence = Sequence::from_notes(file.notes).into_handle();
        let registry = Self::registry_for(&sequence);
        let mut history = UndoStack::new(doc_id_for_path(path), config, persistence);
        history
            .deserialize(&value, &registry)
            .context("failed to restore embedded history")?;

        tracing::info!(
            "Opened {} with {} notes and {} transactions",
            path.display(),
            sequence.borrow().len(),
            history.len()
        );
        Ok(Self {
            sequence,
            history,
            registry,
        })
    }

    /// Writes the notes and the undoable history to `path`, then flushes
    /// the history to the persistence layer if one is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or either write fails.
    pub fn save_file(&mut self, path: &Path) -> Result<()> {
        let history = serde_json::to_value(self.history.serialize()?)
            .context("failed to encode history")?;
        let file = ProjectFile {
            tag: PROJECT_TAG.to_string(),
            notes: self.sequence.borrow().notes().cloned().collect(),
            children: vec![history],
        };
        let json = serde_json::to_string_pretty(&file).context("failed to encode project")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write project: {}", path.display()))?;
        self.history.flush()?;
        tracing::info!("Saved {}", path.display());
        Ok(())
    }

    fn registry_for(sequence: &SequenceHandle) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        register_note_actions(&mut registry, sequence);
        registry
    }

    pub fn sequence(&self) -> Ref<'_, Sequence> {
        self.sequence.borrow()
    }

    /// Shared handle for building actions outside the project.
    pub fn handle(&self) -> SequenceHandle {
        Rc::clone(&self.sequence)
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut UndoStack {
        &mut self.history
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    // --- Single-note edits ---

    pub fn insert_note(&mut self, note: Note) -> bool {
        let action = NoteInsertAction::new(self.handle(), note);
        self.history.perform_action(Box::new(action))
    }

    /// Removes the note with `id`. Returns `false` if there is none.
    pub fn remove_note(&mut self, id: u64) -> bool {
        let Some(note) = self.lookup(id) else {
            return false;
        };
        let action = NoteRemoveAction::new(self.handle(), note);
        self.history.perform_action(Box::new(action))
    }

    /// Replaces the note sharing `after`'s id.
    pub fn change_note(&mut self, after: Note) -> bool {
        let Some(before) = self.lookup(after.id) else {
            return false;
        };
        let action = NoteChangeAction::new(self.handle(), before, after);
        self.history.perform_action(Box::new(action))
    }

    // --- Group edits ---

    pub fn insert_notes(&mut self, notes: Vec<Note>) -> bool {
        let action = NotesGroupInsertAction::new(self.handle(), notes);
        self.history.perform_action(Box::new(action))
    }

    /// Removes every note in `ids`, or none if any is missing or repeated.
    pub fn remove_notes(&mut self, ids: &[u64]) -> bool {
        let Some(notes) = self.lookup_all(ids) else {
            return false;
        };
        let action = NotesGroupRemoveAction::new(self.handle(), notes);
        self.history.perform_action(Box::new(action))
    }

    /// Replaces every note sharing an id with one of `after`.
    pub fn change_notes(&mut self, after: Vec<Note>) -> bool {
        let ids: Vec<u64> = after.iter().map(|n| n.id).collect();
        let Some(before) = self.lookup_all(&ids) else {
            return false;
        };
        let action = NotesGroupChangeAction::new(self.handle(), before, after);
        self.history.perform_action(Box::new(action))
    }

    fn lookup(&self, id: u64) -> Option<Note> {
        self.sequence.borrow().get(id).cloned()
    }

    fn lookup_all(&self, ids: &[u64]) -> Option<Vec<Note>> {
        let sequence = self.sequence.borrow();
        let notes = ids.iter().map(|id| sequence.get(*id).cloned()).collect();
        notes
    }

    // --- History ---

    /// Starts a new undo step; the next edit will not merge into the last.
    pub fn checkpoint(&mut self, name: &str) {
        self.history.begin_transaction(name);
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    /// Flushes the history to the persistence layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_history(&mut self) -> Result<()> {
        self.history.flush()
    }

    /// The undoable history as an `undo-history` JSON node.
    ///
    /// # Errors
    ///
    /// Returns an error if an action fails to serialize.
    pub fn export_history(&self) -> Result<Value> {
        serde_json::to_value(self.history.serialize()?).context("failed to encode history")
    }

    /// Replaces the history with the one in `value`.
    ///
    /// `value` may be the history node or a project node embedding it.
    ///
    /// # Errors
    ///
    /// Returns an error if the history is malformed or names an unknown
    /// action kind; the history is left empty in that case.
    pub fn restore_history(&mut self, value: &Value) -> Result<()> {
        self.history.deserialize(value, &self.registry)
    }
}
