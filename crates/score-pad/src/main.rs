mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use score_pad_config::AppConfig;
use score_pad_core::Project;
use score_pad_mod_history::{DocumentMeta, HistoryConfig, HistoryRecord, PersistenceLayer};

/// Inspect, maintain, and replay persisted note-editing histories.
#[derive(Parser, Debug)]
#[command(name = "score-pad", version, about)]
struct Cli {
    /// Directory holding the history database.
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List documents with stored history.
    List,
    /// Print the stored transactions of a document.
    Show { doc: String },
    /// Delete the stored history of a document.
    Delete { doc: String },
    /// Print the notes and history of a project file.
    Inspect { file: PathBuf },
    /// Replay an edit script against an empty project.
    Replay {
        script: PathBuf,
        /// Store the resulting history under this document id.
        #[arg(long)]
        save: Option<String>,
        /// Write the resulting project file here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let app_config = AppConfig::load_or_create(&config_path);

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&app_config.log_filter)),
        )
        .init();

    let mut history_config = HistoryConfig::from_app_config(&app_config);
    if let Some(dir) = cli.data_dir {
        history_config.data_dir = dir;
    }
    tracing::debug!("Using data dir {}", history_config.data_dir.display());

    match cli.command {
        Command::List => list(&*open_store(&history_config)?),
        Command::Show { doc } => show(&*open_store(&history_config)?, &doc),
        Command::Delete { doc } => {
            open_store(&history_config)?.delete_document(&doc)?;
            tracing::info!("Deleted history for `{doc}`");
            Ok(())
        }
        Command::Inspect { file } => inspect(&file, history_config),
        Command::Replay { script, save, out } => {
            replay(&script, history_config, save.as_deref(), out.as_deref())
        }
    }
}

fn open_store(config: &HistoryConfig) -> Result<Arc<PersistenceLayer>> {
    PersistenceLayer::open(&config.data_dir)
        .with_context(|| format!("failed to open history store in {}", config.data_dir.display()))
}

fn list(store: &PersistenceLayer) -> Result<()> {
    for doc in store.list_documents()? {
        match store.load_meta(&doc)? {
            Some(meta) => {
                let saved = meta
                    .saved_at_utc()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("{doc}\t{} transactions\tsaved {saved}", meta.transactions);
            }
            None => println!("{doc}"),
        }
    }
    Ok(())
}

fn show(store: &PersistenceLayer, doc: &str) -> Result<()> {
    let Some(record) = store.read_history(doc)? else {
        println!("No history stored for `{doc}`");
        return Ok(());
    };
    print_history(&record);
    Ok(())
}

fn print_history(record: &HistoryRecord) {
    for (index, transaction) in record.children.iter().enumerate() {
        let name = if transaction.name.is_empty() {
            "(unnamed)"
        } else {
            transaction.name.as_str()
        };
        let kinds: Vec<&str> = transaction.children.iter().map(|a| a.tag.as_str()).collect();
        println!("{:>3}  {name}  [{}]", index + 1, kinds.join(", "));
    }
}

fn print_project(project: &Project) {
    for note in project.sequence().notes() {
        println!(
            "note {}: key {} beat {} length {} velocity {}",
            note.id, note.key, note.beat, note.length, note.velocity
        );
    }
    let history = project.history();
    println!(
        "undo: {}  redo: {}  units stored: {}",
        history.undo_description().unwrap_or("-"),
        history.redo_description().unwrap_or("-"),
        history.units_stored()
    );
}

fn inspect(file: &Path, config: HistoryConfig) -> Result<()> {
    let project = Project::open_file(file, config, None)?;
    print_project(&project);
    print_history(&project.history().serialize()?);
    Ok(())
}

fn replay(
    script_path: &Path,
    config: HistoryConfig,
    save: Option<&str>,
    out: Option<&Path>,
) -> Result<()> {
    let text = std::fs::read_to_string(script_path)
        .with_context(|| format!("failed to read script: {}", script_path.display()))?;
    let commands = script::parse(&text)?;

    let store = match save {
        Some(_) => Some(open_store(&config)?),
        None => None,
    };

    let mut project = Project::new(config, None);
    for command in &commands {
        if !script::apply(&mut project, command) {
            tracing::warn!("No effect: {command:?}");
        }
    }
    print_project(&project);

    if let Some(path) = out {
        project.save_file(path)?;
    }
    if let (Some(doc), Some(store)) = (save, store) {
        let record = project.history().serialize()?;
        store.write_history(doc, &record)?;
        store.save_meta(doc, DocumentMeta::now(record.children.len()))?;
        tracing::info!("Stored {} transactions as `{doc}`", record.children.len());
    }
    Ok(())
}
