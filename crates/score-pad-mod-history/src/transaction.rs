/// A named group of actions that form a single undo step.
use anyhow::{Context, Result};

use crate::action::UndoAction;
use crate::record::{ActionRecord, TransactionRecord};
use crate::registry::ActionRegistry;

/// Actions applied and reverted together as one user-visible step.
///
/// A failing member stops `perform`/`undo` immediately. Members that already
/// ran are left applied; there is no rollback.
pub struct Transaction {
    /// Display name shown in undo/redo menus.
    name: String,
    /// Members in application order.
    pub(crate) actions: Vec<Box<dyn UndoAction>>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.name)
            .field("actions", &self.kind_tags().collect::<Vec<_>>())
            .field("total_size", &self.total_size())
            .finish()
    }
}

impl Transaction {
    /// Creates an empty transaction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Kind tags of the members, in application order.
    pub fn kind_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.iter().map(|a| a.kind_tag())
    }

    /// Appends an already-performed action.
    pub(crate) fn push(&mut self, action: Box<dyn UndoAction>) {
        self.actions.push(action);
    }

    /// Re-applies every member in insertion order.
    pub fn perform(&mut self) -> bool {
        for action in self.actions.iter_mut() {
            if !action.perform() {
                return false;
            }
        }
        true
    }

    /// Reverts every member in reverse insertion order.
    pub fn undo(&mut self) -> bool {
        for action in self.actions.iter_mut().rev() {
            if !action.undo() {
                return false;
            }
        }
        true
    }

    /// Sum of member retention costs.
    pub fn total_size(&self) -> usize {
        self.actions.iter().map(|a| a.size_in_units()).sum()
    }

    /// Builds the serialized node for this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any member fails to serialize its parameters.
    pub fn to_record(&self) -> Result<TransactionRecord> {
        let children = self
            .actions
            .iter()
            .map(|action| {
                let params = action.serialize_params().with_context(|| {
                    format!("Failed to serialize `{}` parameters", action.kind_tag())
                })?;
                Ok(ActionRecord {
                    tag: action.kind_tag().to_string(),
                    params,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TransactionRecord::new(self.name.clone(), children))
    }

    /// Rebuilds a transaction, constructing each member through `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if any member's kind is unknown or its parameters
    /// are invalid.
    pub fn from_record(record: &TransactionRecord, registry: &ActionRegistry) -> Result<Self> {
        let mut transaction = Self::new(record.name.clone());
        for child in &record.children {
            let action = registry
                .instantiate(child)
                .with_context(|| format!("Failed to restore transaction `{}`", record.name))?;
            transaction.push(action);
        }
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::{json, Value};

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Step {
        label: String,
        size: usize,
        fail_perform: bool,
        fail_undo: bool,
        log: Log,
    }

    impl Step {
        fn new(label: &str, log: &Log) -> Self {
            Self {
                label: label.to_string(),
                size: 1,
                fail_perform: false,
                fail_undo: false,
                log: Rc::clone(log),
            }
        }
    }

    impl UndoAction for Step {
        fn perform(&mut self) -> bool {
            if self.fail_perform {
                return false;
            }
            self.log.borrow_mut().push(format!("do {}", self.label));
            true
        }
        fn undo(&mut self) -> bool {
            if self.fail_undo {
                return false;
            }
            self.log.borrow_mut().push(format!("undo {}", self.label));
            true
        }
        fn size_in_units(&self) -> usize {
            self.size
        }
        fn kind_tag(&self) -> &'static str {
            "step"
        }
        fn serialize_params(&self) -> Result<Value> {
            Ok(json!({ "label": self.label, "size": self.size }))
        }
        fn deserialize_params(&mut self, params: &Value) -> Result<()> {
            self.label = params["label"].as_str().context("label")?.to_string();
            self.size = params["size"].as_u64().context("size")? as usize;
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_perform_in_order_undo_in_reverse() {
        let log = log();
        let mut tx = Transaction::new("edit");
        tx.push(Box::new(Step::new("a", &log)));
        tx.push(Box::new(Step::new("b", &log)));

        assert!(tx.perform());
        assert!(tx.undo());
        assert_eq!(*log.borrow(), vec!["do a", "do b", "undo b", "undo a"]);
    }

    #[test]
    fn test_failed_member_is_not_rolled_back() {
        let log = log();
        let mut tx = Transaction::new("edit");
        tx.push(Box::new(Step::new("a", &log)));
        let mut broken = Step::new("b", &log);
        broken.fail_perform = true;
        tx.push(Box::new(broken));
        tx.push(Box::new(Step::new("c", &log)));

        assert!(!tx.perform());
        // "a" stays applied and "c" never runs
        assert_eq!(*log.borrow(), vec!["do a"]);
    }

    #[test]
    fn test_failed_undo_stops_immediately() {
        let log = log();
        let mut tx = Transaction::new("edit");
        tx.push(Box::new(Step::new("a", &log)));
        let mut broken = Step::new("b", &log);
        broken.fail_undo = true;
        tx.push(Box::new(broken));

        assert!(!tx.undo());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_total_size_sums_members() {
        let log = log();
        let mut tx = Transaction::new("edit");
        assert_eq!(tx.total_size(), 0);
        let mut big = Step::new("a", &log);
        big.size = 40;
        tx.push(Box::new(big));
        tx.push(Box::new(Step::new("b", &log)));
        assert_eq!(tx.total_size(), 41);
        assert_eq!(tx.len(), 2);
    }

    #[test]
    fn test_record_restores_through_registry() {
        let log = log();
        let mut tx = Transaction::new("pair");
        tx.push(Box::new(Step::new("a", &log)));
        tx.push(Box::new(Step::new("b", &log)));
        let record = tx.to_record().expect("record");
        assert_eq!(record.name, "pair");
        assert_eq!(record.children.len(), 2);

        let mut registry = ActionRegistry::new();
        let shared = Rc::clone(&log);
        registry.register("step", move || Box::new(Step::new("", &shared)));

        let mut restored = Transaction::from_record(&record, &registry).expect("restore");
        assert_eq!(restored.name(), "pair");
        assert_eq!(restored.kind_tags().collect::<Vec<_>>(), vec!["step", "step"]);
        assert!(restored.undo());
        assert_eq!(*log.borrow(), vec!["undo b", "undo a"]);
    }

    #[test]
    fn test_record_with_unknown_kind_fails() {
        let record = TransactionRecord::new(
            "odd",
            vec![ActionRecord {
                tag: "ghost".to_string(),
                params: Value::Null,
            }],
        );
        let err = Transaction::from_record(&record, &ActionRegistry::new()).unwrap_err();
        assert!(format!("{err:#}").contains("ghost"));
    }
}
