/// Core undo/redo manager: a linear timeline of transactions with a cursor.
///
/// Transactions before the cursor can be undone, transactions at or after it
/// can be redone. Performing a new action discards everything after the
/// cursor. Older transactions are pruned once the stored size exceeds the
/// configured ceiling, but never below the configured floor.
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::action::UndoAction;
use crate::config::HistoryConfig;
use crate::persistence::{DocumentMeta, PersistenceLayer};
use crate::record::HistoryRecord;
use crate::registry::ActionRegistry;
use crate::transaction::Transaction;

/// Handle returned by `UndoStack::subscribe`.
pub type ListenerId = u64;

type Listener = Box<dyn FnMut()>;

/// Marks the stack busy for the lifetime of the scope.
struct BusyScope {
    flag: Rc<Cell<bool>>,
}

impl BusyScope {
    fn enter(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self {
            flag: Rc::clone(flag),
        }
    }
}

impl Drop for BusyScope {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Manages undo/redo history for a single document.
///
/// Each document gets its own `UndoStack`. The stack can optionally persist
/// its most recent past transactions via a shared `PersistenceLayer`.
pub struct UndoStack {
    /// Stored transactions, oldest first.
    transactions: Vec<Transaction>,
    /// Index of the first redoable transaction.
    cursor: usize,
    /// Whether the next performed action opens a new transaction.
    pending_new_transaction: bool,
    /// Name given to the next opened transaction.
    pending_name: String,
    /// Sum of `total_size` over `transactions`.
    units_stored: usize,
    /// Set while a transaction is being undone or redone.
    busy: Rc<Cell<bool>>,
    /// Retention ceiling, at least 1.
    max_units: usize,
    /// Retention floor, at least 1.
    min_transactions: usize,
    /// Change listeners, called after every state change.
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
    /// Document identifier used as the persistence key.
    doc_id: String,
    /// Configuration parameters.
    config: HistoryConfig,
    /// Optional disk persistence (None = in-memory only).
    persistence: Option<Arc<PersistenceLayer>>,
    /// Whether in-memory state has changed since the last flush.
    dirty: bool,
}

impl std::fmt::Debug for UndoStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoStack")
            .field("doc_id", &self.doc_id)
            .field("transactions", &self.transactions.len())
            .field("cursor", &self.cursor)
            .field("pending_new_transaction", &self.pending_new_transaction)
            .field("units_stored", &self.units_stored)
            .field("max_units", &self.max_units)
            .field("min_transactions", &self.min_transactions)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl UndoStack {
    /// Creates a new empty UndoStack.
    ///
    /// Pass `persistence: None` for in-memory-only mode (useful in tests
    /// or for documents that don't need disk persistence).
    pub fn new(
        doc_id: String,
        config: HistoryConfig,
        persistence: Option<Arc<PersistenceLayer>>,
    ) -> Self {
        let mut stack = Self {
            transactions: Vec::new(),
            cursor: 0,
            pending_new_transaction: true,
            pending_name: String::new(),
            units_stored: 0,
            busy: Rc::new(Cell::new(false)),
            max_units: 1,
            min_transactions: 1,
            listeners: Vec::new(),
            next_listener_id: 0,
            doc_id,
            config,
            persistence,
            dirty: false,
        };
        stack.set_max_stored_units(stack.config.max_units, stack.config.min_transactions);
        stack
    }

    /// Creates an in-memory-only UndoStack with default config.
    ///
    /// Convenience constructor for tests and simple usage.
    pub fn in_memory() -> Self {
        Self::new(String::from("test"), HistoryConfig::default(), None)
    }

    /// Loads existing history from disk, or creates a fresh stack.
    ///
    /// Stored transactions are rebuilt through `registry` and become the
    /// undoable past. If no history exists on disk, behaves like `new()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence layer fails to read or a stored
    /// action kind is not registered.
    pub fn load_or_new(
        doc_id: String,
        config: HistoryConfig,
        persistence: Option<Arc<PersistenceLayer>>,
        registry: &ActionRegistry,
    ) -> Result<Self> {
        let stored = match &persistence {
            Some(pl) => pl
                .read_history(&doc_id)
                .context("Failed to load history from disk")?,
            None => None,
        };

        let mut stack = Self::new(doc_id, config, persistence);
        if let Some(record) = stored {
            stack
                .restore(&record, registry)
                .with_context(|| format!("Failed to restore history for `{}`", stack.doc_id))?;
            stack.dirty = false;
        }
        Ok(stack)
    }

    /// Returns the document ID.
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Sets the retention ceiling and floor, each clamped to at least 1.
    ///
    /// Takes effect on the next performed action.
    pub fn set_max_stored_units(&mut self, max_units: usize, min_transactions: usize) {
        self.max_units = max_units.max(1);
        self.min_transactions = min_transactions.max(1);
    }

    /// Total retention cost of every stored transaction, past and future.
    pub fn units_stored(&self) -> usize {
        self.units_stored
    }

    /// Number of stored transactions, past and future.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Position separating undoable from redoable transactions.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Stored transactions, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Performs an action and records it.
    ///
    /// The action is merged into the open transaction when one of its
    /// members accepts it via `try_coalesce`, appended to it otherwise, or
    /// placed in a new transaction when a boundary is pending. Returns
    /// `false` if the call is reentrant or the action had no effect; the
    /// history is left untouched in both cases.
    pub fn perform_action(&mut self, mut action: Box<dyn UndoAction>) -> bool {
        if self.busy.get() {
            tracing::warn!(
                "Rejected `{}`: performed from inside an undo or redo",
                action.kind_tag()
            );
            return false;
        }

        if !action.perform() {
            tracing::debug!("Discarded `{}`: perform had no effect", action.kind_tag());
            return false;
        }

        let added = if !self.pending_new_transaction && self.cursor > 0 {
            let current = &mut self.transactions[self.cursor - 1];
            let merge = current.actions.iter().enumerate().rev().find_map(|(i, member)| {
                member
                    .try_coalesce(&*action)
                    .map(|merged| (i, merged))
            });
            match merge {
                Some((i, merged)) => {
                    tracing::debug!(
                        "Coalesced `{}` into member {i} of `{}`",
                        action.kind_tag(),
                        current.name()
                    );
                    let size = merged.size_in_units();
                    let replaced = std::mem::replace(&mut current.actions[i], merged);
                    self.units_stored -= replaced.size_in_units();
                    size
                }
                None => {
                    let size = action.size_in_units();
                    current.push(action);
                    size
                }
            }
        } else {
            let mut transaction = Transaction::new(std::mem::take(&mut self.pending_name));
            tracing::debug!("Opened transaction `{}`", transaction.name());
            let size = action.size_in_units();
            transaction.push(action);
            self.transactions.insert(self.cursor, transaction);
            self.cursor += 1;
            self.pending_new_transaction = false;
            size
        };

        self.units_stored += added;
        self.clear_future_transactions();
        self.dirty = true;
        self.notify();
        true
    }

    /// Performs an action and, on success, names the current transaction.
    ///
    /// An empty `name` leaves the existing name untouched.
    pub fn perform_named(&mut self, action: Box<dyn UndoAction>, name: &str) -> bool {
        if !self.perform_action(action) {
            return false;
        }
        if !name.is_empty() {
            self.set_current_transaction_name(name);
        }
        true
    }

    /// Drops the redo branch, then prunes the oldest transactions while
    /// the stored size exceeds the ceiling and the floor allows it.
    fn clear_future_transactions(&mut self) {
        while self.cursor < self.transactions.len() {
            if let Some(stale) = self.transactions.pop() {
                tracing::debug!("Discarded redo transaction `{}`", stale.name());
                self.units_stored -= stale.total_size();
            }
        }

        while self.cursor > 0
            && self.units_stored > self.max_units
            && self.transactions.len() > self.min_transactions
        {
            let oldest = self.transactions.remove(0);
            tracing::debug!("Pruned transaction `{}`", oldest.name());
            self.units_stored -= oldest.total_size();
            self.cursor -= 1;
        }
    }

    /// Ensures the next performed action opens a new transaction.
    pub fn begin_transaction(&mut self, name: &str) {
        self.pending_new_transaction = true;
        self.pending_name = name.to_string();
    }

    /// Renames the pending transaction if a boundary is pending, or the
    /// current one otherwise.
    pub fn set_current_transaction_name(&mut self, name: &str) {
        if self.pending_new_transaction {
            self.pending_name = name.to_string();
        } else if self.cursor > 0 {
            self.transactions[self.cursor - 1].set_name(name);
            self.dirty = true;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.transactions.len()
    }

    /// Undoes the transaction before the cursor.
    ///
    /// Returns `false` if there was nothing to undo. If the transaction
    /// fails to undo, the whole history is cleared.
    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }

        let undone = {
            let _scope = BusyScope::enter(&self.busy);
            self.transactions[self.cursor - 1].undo()
        };

        if undone {
            self.cursor -= 1;
            tracing::debug!(
                "Undid `{}`",
                self.transactions[self.cursor].name()
            );
        } else {
            tracing::warn!("Undo failed, clearing history for `{}`", self.doc_id);
            self.reset();
        }

        self.begin_transaction("");
        self.dirty = true;
        self.notify();
        true
    }

    /// Redoes the transaction at the cursor.
    ///
    /// Returns `false` if there was nothing to redo. If the transaction
    /// fails to perform, the whole history is cleared.
    pub fn redo(&mut self) -> bool {
        if self.cursor >= self.transactions.len() {
            return false;
        }

        let redone = {
            let _scope = BusyScope::enter(&self.busy);
            self.transactions[self.cursor].perform()
        };

        if redone {
            tracing::debug!(
                "Redid `{}`",
                self.transactions[self.cursor].name()
            );
            self.cursor += 1;
        } else {
            tracing::warn!("Redo failed, clearing history for `{}`", self.doc_id);
            self.reset();
        }

        self.begin_transaction("");
        self.dirty = true;
        self.notify();
        true
    }

    /// Undoes the open transaction, if no boundary has been drawn since
    /// its last action.
    pub fn undo_current_transaction_only(&mut self) -> bool {
        if self.pending_new_transaction {
            false
        } else {
            self.undo()
        }
    }

    /// Name of the transaction `undo` would revert.
    pub fn undo_description(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.transactions.get(i))
            .map(Transaction::name)
    }

    /// Name of the transaction `redo` would reapply.
    pub fn redo_description(&self) -> Option<&str> {
        self.transactions.get(self.cursor).map(Transaction::name)
    }

    /// Kind tags of the open transaction's members.
    ///
    /// Empty when a boundary is pending.
    pub fn actions_in_current_transaction(&self) -> Vec<&'static str> {
        self.current_transaction()
            .map(|t| t.kind_tags().collect())
            .unwrap_or_default()
    }

    /// Number of members in the open transaction, 0 when a boundary is pending.
    pub fn num_actions_in_current_transaction(&self) -> usize {
        self.current_transaction().map_or(0, Transaction::len)
    }

    fn current_transaction(&self) -> Option<&Transaction> {
        if self.pending_new_transaction || self.cursor == 0 {
            return None;
        }
        self.transactions.get(self.cursor - 1)
    }

    /// Removes every transaction and notifies listeners.
    pub fn clear_history(&mut self) {
        self.reset();
        self.dirty = true;
        self.notify();
    }

    fn reset(&mut self) {
        self.transactions.clear();
        self.cursor = 0;
        self.units_stored = 0;
    }

    /// Registers a listener called after every successful perform, undo,
    /// redo, clear, and restore.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut() + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if the id is unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        for (_, listener) in self.listeners.iter_mut() {
            listener();
        }
    }

    /// Serializes the most recent past transactions, oldest first.
    ///
    /// At most `max_persisted_transactions` are included. The redo branch
    /// is never serialized.
    ///
    /// # Errors
    ///
    /// Returns an error if an action fails to serialize its parameters.
    pub fn serialize(&self) -> Result<HistoryRecord> {
        let start = self
            .cursor
            .saturating_sub(self.config.max_persisted_transactions);
        let children = self.transactions[start..self.cursor]
            .iter()
            .map(Transaction::to_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(HistoryRecord::new(children))
    }

    /// Replaces the history with the one found in `value`.
    ///
    /// `value` may be the `undo-history` node itself or a node containing
    /// it as a child. Does nothing if no such node exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is malformed or names an action kind
    /// that `registry` cannot build. The history is left empty on error.
    pub fn deserialize(&mut self, value: &Value, registry: &ActionRegistry) -> Result<()> {
        let Some(record) = HistoryRecord::locate(value)? else {
            return Ok(());
        };
        self.restore(&record, registry)
    }

    /// Replaces the history with `record`. Every restored transaction is
    /// undoable and the next action opens a new transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if an action kind is unknown or its parameters are
    /// invalid. The history is left empty on error.
    pub fn restore(&mut self, record: &HistoryRecord, registry: &ActionRegistry) -> Result<()> {
        self.reset();
        self.begin_transaction("");

        for child in &record.children {
            let transaction = match Transaction::from_record(child, registry) {
                Ok(transaction) => transaction,
                Err(e) => {
                    self.reset();
                    self.notify();
                    return Err(e);
                }
            };
            self.units_stored += transaction.total_size();
            self.transactions.insert(self.cursor, transaction);
            self.cursor += 1;
        }

        tracing::debug!(
            "Restored {} transactions for `{}`",
            self.transactions.len(),
            self.doc_id
        );
        self.dirty = true;
        self.notify();
        Ok(())
    }

    /// Flushes the serialized history to disk.
    ///
    /// Called on document save and on application shutdown.
    /// No-op if the stack is in-memory-only or nothing has changed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the disk write fails.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(pl) = &self.persistence {
            let record = self.serialize()?;
            pl.write_history(&self.doc_id, &record)
                .context("Failed to flush history to disk")?;
            pl.save_meta(&self.doc_id, DocumentMeta::now(record.children.len()))
                .context("Failed to save history metadata")?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Clears all history from memory and disk.
    ///
    /// # Errors
    ///
    /// Returns an error if disk cleanup fails.
    pub fn delete_history(&mut self) -> Result<()> {
        self.clear_history();
        self.dirty = false;

        if let Some(pl) = &self.persistence {
            pl.delete_document(&self.doc_id)
                .context("Failed to clear history from disk")?;
        }
        Ok(())
    }
}
