/// Serialized form of a history: a tagged tree of transactions and actions.
///
/// ```text
/// undo-history
/// ├── transaction (name)
/// │   ├── <action kind tag> (params)
/// │   └── ...
/// └── ...
/// ```
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag of the root history node.
pub const HISTORY_TAG: &str = "undo-history";

/// Tag of each transaction node.
pub const TRANSACTION_TAG: &str = "transaction";

/// Root node holding the persisted past transactions, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub tag: String,
    #[serde(default)]
    pub children: Vec<TransactionRecord>,
}

/// One transaction: a name plus its actions in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children: Vec<ActionRecord>,
}

/// One action, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub tag: String,
    #[serde(default)]
    pub params: Value,
}

impl HistoryRecord {
    pub fn new(children: Vec<TransactionRecord>) -> Self {
        Self {
            tag: HISTORY_TAG.to_string(),
            children,
        }
    }

    /// Finds the history node in `value`.
    ///
    /// Accepts either the history node itself or a parent node that has it
    /// among its `children`. Returns `None` if neither is present.
    ///
    /// # Errors
    ///
    /// Returns an error if a history node is found but is malformed.
    pub fn locate(value: &Value) -> Result<Option<Self>> {
        let node = if tag_of(value) == Some(HISTORY_TAG) {
            Some(value)
        } else {
            value
                .get("children")
                .and_then(Value::as_array)
                .and_then(|children| {
                    children
                        .iter()
                        .find(|child| tag_of(child) == Some(HISTORY_TAG))
                })
        };

        let Some(node) = node else {
            return Ok(None);
        };

        let record: HistoryRecord =
            serde_json::from_value(node.clone()).context("Malformed undo history node")?;
        record.validate()?;
        Ok(Some(record))
    }

    /// Checks that every transaction node carries the transaction tag.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unexpected tag.
    pub fn validate(&self) -> Result<()> {
        if self.tag != HISTORY_TAG {
            bail!("Expected `{HISTORY_TAG}` node, found `{}`", self.tag);
        }
        for transaction in &self.children {
            if transaction.tag != TRANSACTION_TAG {
                bail!(
                    "Expected `{TRANSACTION_TAG}` node, found `{}`",
                    transaction.tag
                );
            }
        }
        Ok(())
    }

    /// Encodes the record as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to encode undo history")
    }

    /// Decodes a record previously produced by `to_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid history node.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).context("Failed to decode undo history")?;
        Self::locate(&value)?.context("Stored data has no undo history node")
    }
}

impl TransactionRecord {
    pub fn new(name: impl Into<String>, children: Vec<ActionRecord>) -> Self {
        Self {
            tag: TRANSACTION_TAG.to_string(),
            name: name.into(),
            children,
        }
    }
}

fn tag_of(value: &Value) -> Option<&str> {
    value.get("tag").and_then(Value::as_str)
}
