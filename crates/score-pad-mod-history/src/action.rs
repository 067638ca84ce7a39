/// The capability contract every undoable edit implements.
use std::any::Any;

use anyhow::Result;
use serde_json::Value;

/// One primitive, reversible edit to a document.
///
/// Implementations hold a handle to the document they mutate. The history
/// never touches the document itself; every change goes through `perform`
/// and `undo`.
pub trait UndoAction: Any {
    /// Applies the edit. Returns `false` if nothing was applied, in which
    /// case the action is discarded.
    fn perform(&mut self) -> bool;

    /// Reverses a previously applied edit. Returns `false` if the document
    /// could not be restored.
    fn undo(&mut self) -> bool;

    /// Retention cost of keeping this action in the history.
    fn size_in_units(&self) -> usize;

    /// Stable identifier used as the persisted tag for this action kind.
    fn kind_tag(&self) -> &'static str;

    /// Attempts to merge `next` into this action.
    ///
    /// `next` has already been performed. A returned action must behave
    /// like `self` followed by `next` on perform, and reverse both on undo.
    fn try_coalesce(&self, _next: &dyn UndoAction) -> Option<Box<dyn UndoAction>> {
        None
    }

    /// Serializes the action's parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters cannot be represented.
    fn serialize_params(&self) -> Result<Value>;

    /// Restores parameters previously produced by `serialize_params`.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` has the wrong shape for this kind.
    fn deserialize_params(&mut self, params: &Value) -> Result<()>;

    /// Upcast used by `try_coalesce` implementations to inspect `next`.
    fn as_any(&self) -> &dyn Any;
}
