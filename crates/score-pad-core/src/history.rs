// Re-exports from score-pad-mod-history used throughout the core crate.
pub use score_pad_mod_history::config::{doc_id_for_path, generate_unsaved_id};
pub use score_pad_mod_history::{
    ActionRegistry, HistoryConfig, HistoryRecord, PersistenceLayer, Transaction, UndoAction,
    UndoStack,
};
