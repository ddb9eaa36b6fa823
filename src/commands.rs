use anyhow::{Context, Result};
use log::{info, warn};
use std::io::{self, BufRead};
use std::thread;
use tokio::sync::mpsc;

pub const HELP: &str = "commands: r (refresh) | limit <N> | interval <S> (0 = off) | t <N> (expand/collapse entry) | q (quit)";

/// User controls of the log panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    SetLimit(u32),
    SetInterval(u64),
    /// 0-based entry index.
    Toggle(usize),
    Help,
    Quit,
}

/// Parses one input line. Empty lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();
    if parts.next().is_some() {
        anyhow::bail!("Too many arguments: {}", line.trim());
    }

    let command = match (word.to_lowercase().as_str(), arg) {
        ("r" | "refresh", None) => Command::Refresh,
        ("limit" | "l", Some(value)) => {
            let limit: u32 = value
                .parse()
                .with_context(|| format!("Invalid limit: {}", value))?;
            if limit == 0 {
                anyhow::bail!("Limit must be a positive integer");
            }
            Command::SetLimit(limit)
        }
        ("interval" | "auto" | "i", Some(value)) => Command::SetInterval(
            value
                .parse()
                .with_context(|| format!("Invalid interval: {}", value))?,
        ),
        ("t" | "toggle", Some(value)) => Command::Toggle(parse_entry_number(value)?),
        ("h" | "help" | "?", None) => Command::Help,
        ("q" | "quit" | "exit", None) => Command::Quit,
        (number, None) if number.chars().all(|c| c.is_ascii_digit()) => {
            Command::Toggle(parse_entry_number(number)?)
        }
        _ => anyhow::bail!("Unknown command: {}", line.trim()),
    };

    Ok(Some(command))
}

/// Entries are numbered from 1 on screen.
fn parse_entry_number(value: &str) -> Result<usize> {
    let number: usize = value
        .parse()
        .with_context(|| format!("Invalid entry number: {}", value))?;
    number
        .checked_sub(1)
        .context("Entry numbers start at 1")
}

/// Forwards parsed commands until end of input or the panel goes away.
/// End of input is reported as `Quit`. Blocking; runs on its own thread.
pub fn read_commands<R: BufRead>(input: R, commands: &mpsc::Sender<Command>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(command)) => {
                if commands.blocking_send(command).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{} ({})", e, HELP),
        }
    }

    info!("Input closed");
    let _ = commands.blocking_send(Command::Quit);
}

/// Reads stdin on a detached thread so a pending read never holds up shutdown.
pub fn spawn_stdin_reader(commands: mpsc::Sender<Command>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || read_commands(io::stdin().lock(), &commands))
        .context("Failed to spawn input thread")?;
    Ok(())
}
