/// Linear undo/redo history for editable documents.
///
/// Provides an `UndoStack` that records reversible `UndoAction`s in named
/// transactions, merges compatible edits, bounds its memory use with a
/// retention policy, and can persist the most recent past transactions to
/// an embedded key-value store (redb) on disk.
pub mod action;
pub mod config;
pub mod manager;
pub mod persistence;
pub mod record;
pub mod registry;
pub mod transaction;

pub use action::UndoAction;
pub use config::HistoryConfig;
pub use manager::{ListenerId, UndoStack};
pub use persistence::{DocumentMeta, PersistenceLayer};
pub use record::{ActionRecord, HistoryRecord, TransactionRecord};
pub use registry::ActionRegistry;
pub use transaction::Transaction;
