/// Line-based edit scripts replayed against a project.
///
/// One command per line, `#` starts a comment:
///
/// ```text
/// begin add melody
/// insert 1 60 0 96
/// insert 2 64 96 96 80
/// move 2 12 0
/// change 1 62 0 48
/// remove 1
/// undo
/// redo
/// ```
use anyhow::{bail, Context, Result};
use score_pad_core::{Note, Project};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Begin(String),
    Insert(Note),
    Remove(u64),
    Change(Note),
    /// Moves a note by a tick and key offset.
    Move { id: u64, ticks: i64, keys: i32 },
    Undo,
    Redo,
}

/// Parses a whole script.
///
/// # Errors
///
/// Returns an error naming the first line that is not a valid command.
pub fn parse(text: &str) -> Result<Vec<Command>> {
    let mut commands = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if let Some(command) =
            parse_line(line).with_context(|| format!("line {}: `{}`", index + 1, line.trim()))?
        {
            commands.push(command);
        }
    }
    Ok(commands)
}

fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.split('#').next().unwrap_or_default().trim();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb {
        "begin" => Command::Begin(args.join(" ")),
        "insert" => Command::Insert(parse_note(&args)?),
        "change" => Command::Change(parse_note(&args)?),
        "remove" => {
            expect_args(&args, 1)?;
            Command::Remove(number(args[0], "id")?)
        }
        "move" => {
            expect_args(&args, 3)?;
            Command::Move {
                id: number(args[0], "id")?,
                ticks: number(args[1], "ticks")?,
                keys: number(args[2], "keys")?,
            }
        }
        "undo" => {
            expect_args(&args, 0)?;
            Command::Undo
        }
        "redo" => {
            expect_args(&args, 0)?;
            Command::Redo
        }
        other => bail!("Unknown command `{other}`"),
    };
    Ok(Some(command))
}

/// `<id> <key> <beat> <length> [velocity]`
fn parse_note(args: &[&str]) -> Result<Note> {
    if args.len() != 4 && args.len() != 5 {
        bail!("Expected `<id> <key> <beat> <length> [velocity]`");
    }
    let note = Note::new(
        number(args[0], "id")?,
        number(args[1], "key")?,
        number(args[2], "beat")?,
        number(args[3], "length")?,
    );
    match args.get(4) {
        Some(velocity) => Ok(note.with_velocity(number(velocity, "velocity")?)),
        None => Ok(note),
    }
}

fn expect_args(args: &[&str], count: usize) -> Result<()> {
    if args.len() != count {
        bail!("Expected {count} argument(s), found {}", args.len());
    }
    Ok(())
}

fn number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    text.parse()
        .map_err(|_| anyhow::anyhow!("Invalid {what} `{text}`"))
}

/// Applies one command. Returns whether it changed anything.
pub fn apply(project: &mut Project, command: &Command) -> bool {
    match command {
        Command::Begin(name) => {
            project.checkpoint(name);
            true
        }
        Command::Insert(note) => project.insert_note(note.clone()),
        Command::Remove(id) => project.remove_note(*id),
        Command::Change(note) => project.change_note(note.clone()),
        Command::Move { id, ticks, keys } => {
            let moved = project.sequence().get(*id).map(|n| n.shifted(*ticks, *keys));
            match moved {
                Some(note) => project.change_note(note),
                None => false,
            }
        }
        Command::Undo => project.undo(),
        Command::Redo => project.redo(),
    }
}
