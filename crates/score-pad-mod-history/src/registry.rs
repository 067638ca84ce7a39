/// Lookup table from persisted kind tags to action constructors.
use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::action::UndoAction;
use crate::record::ActionRecord;

type ActionConstructor = Box<dyn Fn() -> Box<dyn UndoAction>>;

/// Builds fresh, document-bound actions from their kind tags.
///
/// Used only while restoring a persisted history. Every tag that was ever
/// written must stay registered, since an unknown tag cannot be replayed.
#[derive(Default)]
pub struct ActionRegistry {
    constructors: HashMap<String, ActionConstructor>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for `tag`, replacing any previous one.
    pub fn register<F>(&mut self, tag: &str, constructor: F)
    where
        F: Fn() -> Box<dyn UndoAction> + 'static,
    {
        if self
            .constructors
            .insert(tag.to_string(), Box::new(constructor))
            .is_some()
        {
            tracing::debug!("Replaced action constructor for `{tag}`");
        }
    }

    /// Whether a constructor is registered for `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Constructs an empty action for `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if no constructor is registered for `tag`.
    pub fn create(&self, tag: &str) -> Result<Box<dyn UndoAction>> {
        let constructor = self
            .constructors
            .get(tag)
            .with_context(|| format!("Unknown action kind: `{tag}`"))?;
        Ok(constructor())
    }

    /// Constructs an action and loads its parameters from `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is unknown or the parameters are invalid.
    pub fn instantiate(&self, record: &ActionRecord) -> Result<Box<dyn UndoAction>> {
        let mut action = self.create(&record.tag)?;
        action
            .deserialize_params(&record.params)
            .with_context(|| format!("Invalid parameters for `{}`", record.tag))?;
        Ok(action)
    }
}
