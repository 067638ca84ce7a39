// Integration tests for the history system.
//
// These tests exercise full workflows spanning the UndoStack and
// PersistenceLayer together, simulating realistic usage patterns.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use score_pad_mod_history::{
    ActionRegistry, HistoryConfig, PersistenceLayer, UndoAction, UndoStack,
};

/// Append-only log edited by `Push`.
type Log = Rc<RefCell<Vec<u64>>>;

/// Appends a value; undo pops it back off.
struct Push {
    log: Log,
    value: u64,
}

impl UndoAction for Push {
    fn perform(&mut self) -> bool {
        self.log.borrow_mut().push(self.value);
        true
    }

    fn undo(&mut self) -> bool {
        let mut log = self.log.borrow_mut();
        if log.last() != Some(&self.value) {
            return false;
        }
        log.pop();
        true
    }

    fn size_in_units(&self) -> usize {
        1
    }

    fn kind_tag(&self) -> &'static str {
        "push"
    }

    fn serialize_params(&self) -> Result<Value> {
        Ok(json!({ "value": self.value }))
    }

    fn deserialize_params(&mut self, params: &Value) -> Result<()> {
        self.value = params["value"].as_u64().context("missing value")?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn push(log: &Log, value: u64) -> Box<dyn UndoAction> {
    Box::new(Push {
        log: Rc::clone(log),
        value,
    })
}

fn registry(log: &Log) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    let log = Rc::clone(log);
    registry.register("push", move || {
        Box::new(Push {
            log: Rc::clone(&log),
            value: 0,
        })
    });
    registry
}

fn test_config(dir: &std::path::Path) -> HistoryConfig {
    HistoryConfig {
        max_units: 1000,
        min_transactions: 5,
        max_persisted_transactions: 10,
        data_dir: dir.to_path_buf(),
    }
}

fn new_stack(doc_id: &str, pl: &Arc<PersistenceLayer>, config: &HistoryConfig, log: &Log) -> UndoStack {
    UndoStack::load_or_new(
        doc_id.to_string(),
        config.clone(),
        Some(Arc::clone(pl)),
        &registry(log),
    )
    .unwrap()
}

fn record_steps(stack: &mut UndoStack, log: &Log, values: std::ops::Range<u64>) {
    for value in values {
        stack.begin_transaction(&format!("step {value}"));
        assert!(stack.perform_action(push(log, value)));
    }
}

// --- Full workflow ---

#[test]
fn test_full_workflow_perform_undo_flush_reload_undo() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pl = PersistenceLayer::open(dir.path()).unwrap();
    let log: Log = Rc::default();

    // Phase 1: 20 steps, then undo 5
    let mut stack = new_stack("full-workflow", &pl, &config, &log);
    record_steps(&mut stack, &log, 0..20);
    for _ in 0..5 {
        assert!(stack.undo());
    }
    assert_eq!(log.borrow().len(), 15);

    // Phase 2: flush and drop
    stack.flush().unwrap();
    drop(stack);

    // Phase 3: reload; only the 10 newest past steps survive
    let mut reloaded = new_stack("full-workflow", &pl, &config, &log);
    assert_eq!(reloaded.len(), 10);
    assert!(!reloaded.can_redo());
    assert_eq!(reloaded.undo_description(), Some("step 14"));

    let mut undone = 0;
    while reloaded.can_undo() {
        assert!(reloaded.undo());
        undone += 1;
    }
    assert_eq!(undone, 10);
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_reloaded_history_accepts_new_edits() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pl = PersistenceLayer::open(dir.path()).unwrap();
    let log: Log = Rc::default();

    let mut stack = new_stack("continue", &pl, &config, &log);
    record_steps(&mut stack, &log, 0..3);
    stack.flush().unwrap();
    drop(stack);

    let mut reloaded = new_stack("continue", &pl, &config, &log);
    // Restored history is idle: the next edit opens its own transaction
    assert!(reloaded.perform_action(push(&log, 99)));
    assert_eq!(reloaded.len(), 4);
    assert_eq!(reloaded.num_actions_in_current_transaction(), 1);
    assert!(reloaded.undo());
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
}

// --- Multi-document isolation ---

#[test]
fn test_multi_document_same_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pl = PersistenceLayer::open(dir.path()).unwrap();
    let logs: Vec<Log> = (0..5).map(|_| Rc::default()).collect();

    let mut stacks: Vec<UndoStack> = logs
        .iter()
        .enumerate()
        .map(|(i, log)| new_stack(&format!("doc-{i}"), &pl, &config, log))
        .collect();

    for (i, (stack, log)) in stacks.iter_mut().zip(&logs).enumerate() {
        record_steps(stack, log, 0..(i as u64 + 1));
        stack.flush().unwrap();
    }

    for (i, log) in logs.iter().enumerate() {
        let stack = new_stack(&format!("doc-{i}"), &pl, &config, log);
        assert_eq!(stack.len(), i + 1);
        let meta = pl.load_meta(&format!("doc-{i}")).unwrap().unwrap();
        assert_eq!(meta.transactions, i as u64 + 1);
    }

    let docs = pl.list_documents().unwrap();
    assert_eq!(docs.len(), 5);
}

#[test]
fn test_delete_one_document_preserves_others() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pl = PersistenceLayer::open(dir.path()).unwrap();
    let log_a: Log = Rc::default();
    let log_b: Log = Rc::default();

    let mut stack_a = new_stack("doc-a", &pl, &config, &log_a);
    let mut stack_b = new_stack("doc-b", &pl, &config, &log_b);
    record_steps(&mut stack_a, &log_a, 0..3);
    record_steps(&mut stack_b, &log_b, 0..4);
    stack_a.flush().unwrap();
    stack_b.flush().unwrap();

    stack_a.delete_history().unwrap();
    assert!(!stack_a.can_undo());

    let reloaded_a = new_stack("doc-a", &pl, &config, &log_a);
    let reloaded_b = new_stack("doc-b", &pl, &config, &log_b);
    assert!(reloaded_a.is_empty());
    assert_eq!(reloaded_b.len(), 4);
    assert_eq!(pl.list_documents().unwrap(), vec!["doc-b".to_string()]);
}

// --- Failure handling ---

#[test]
fn test_reload_with_unregistered_kind_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pl = PersistenceLayer::open(dir.path()).unwrap();
    let log: Log = Rc::default();

    let mut stack = new_stack("strange", &pl, &config, &log);
    record_steps(&mut stack, &log, 0..2);
    stack.flush().unwrap();

    let err = UndoStack::load_or_new(
        "strange".to_string(),
        config.clone(),
        Some(Arc::clone(&pl)),
        &ActionRegistry::new(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("push"));
}

#[test]
fn test_retention_then_persist() {
    let dir = tempfile::tempdir().unwrap();
    let config = HistoryConfig {
        max_units: 6,
        min_transactions: 2,
        ..test_config(dir.path())
    };
    let pl = PersistenceLayer::open(dir.path()).unwrap();
    let log: Log = Rc::default();

    let mut stack = new_stack("bounded", &pl, &config, &log);
    record_steps(&mut stack, &log, 0..20);
    assert_eq!(stack.len(), 6);
    assert_eq!(stack.units_stored(), 6);
    stack.flush().unwrap();

    let reloaded = new_stack("bounded", &pl, &config, &log);
    assert_eq!(reloaded.len(), 6);
    assert_eq!(reloaded.undo_description(), Some("step 19"));
}
