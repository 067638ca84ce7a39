/// Configuration and utility functions for the history system.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use score_pad_config::AppConfig;

/// Retention ceiling, in action size units.
const DEFAULT_MAX_UNITS: usize = 30_000;

/// Retention floor: transactions kept undoable even above the ceiling.
const DEFAULT_MIN_TRANSACTIONS: usize = 30;

/// Most recent past transactions written out by `UndoStack::serialize`.
const DEFAULT_MAX_PERSISTED_TRANSACTIONS: usize = 10;

/// Configuration for the history system.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Retention ceiling in abstract cost units.
    pub max_units: usize,
    /// Minimum transactions retained regardless of size.
    pub min_transactions: usize,
    /// Cap on past transactions included in serialized history.
    pub max_persisted_transactions: usize,
    /// Root directory for the persistence database.
    pub data_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_units: DEFAULT_MAX_UNITS,
            min_transactions: DEFAULT_MIN_TRANSACTIONS,
            max_persisted_transactions: DEFAULT_MAX_PERSISTED_TRANSACTIONS,
            data_dir: resolve_data_dir(),
        }
    }
}

impl HistoryConfig {
    /// Builds a history config from the application settings.
    ///
    /// An empty `data_dir` in the settings falls back to `resolve_data_dir`.
    pub fn from_app_config(app: &AppConfig) -> Self {
        let data_dir = if app.data_dir.is_empty() {
            resolve_data_dir()
        } else {
            PathBuf::from(&app.data_dir)
        };
        Self {
            max_units: app.history.max_units,
            min_transactions: app.history.min_transactions,
            max_persisted_transactions: app.history.persisted_transactions,
            data_dir,
        }
    }
}

/// Resolves the data directory path.
///
/// Resolution order:
/// 1. `SCORE_PAD_DATA_DIR` environment variable
/// 2. `.data/` directory next to the executable
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SCORE_PAD_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    exe.parent().unwrap_or(Path::new(".")).join(".data")
}

/// Generates a document ID for a project file on disk.
///
/// Uses a hash of the canonical path for stability across sessions.
pub fn doc_id_for_path(path: &Path) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("project-{:016x}", hasher.finish())
}

/// Counter for generating unique unsaved document IDs within a session.
static UNSAVED_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a unique document ID for a project that has no file yet.
pub fn generate_unsaved_id() -> String {
    let count = UNSAVED_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("unsaved-{count}")
}
