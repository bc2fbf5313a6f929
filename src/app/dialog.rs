//! Interactive conflict prompts on the terminal.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use crate::core::commands::{ConflictDialog, ConflictInfo, DialogResult};

/// Maps one line of user input to an answer. Unknown input yields `None`.
pub fn parse_answer(input: &str) -> Option<DialogResult> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(DialogResult::Yes),
        "a" | "all" | "yes to all" => Some(DialogResult::YesToAll),
        "n" | "no" => Some(DialogResult::No),
        "none" | "no to all" => Some(DialogResult::NoToAll),
        "c" | "q" | "cancel" => Some(DialogResult::Cancel),
        _ => None,
    }
}

/// Prompts on stderr and reads answers from stdin.
///
/// The lock keeps prompts from interleaving when several runs share one dialog.
#[derive(Debug, Default)]
pub struct ConsoleDialog {
    lock: Mutex<()>,
}

impl ConsoleDialog {
    pub fn new() -> Self {
        Self::default()
    }

    fn prompt(&self, info: &ConflictInfo) -> io::Result<DialogResult> {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        loop {
            write!(
                stderr,
                "{:?}: {} already exists (from {}). Overwrite? [y]es/[n]o/[a]ll/none/[c]ancel: ",
                info.kind,
                info.destination.display(),
                info.source.display()
            )?;
            stderr.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(DialogResult::Cancel);
            }
            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None => writeln!(stderr, "Please answer y, n, a, none or c.")?,
            }
        }
    }
}

impl ConflictDialog for ConsoleDialog {
    fn resolve(&self, info: &ConflictInfo) -> DialogResult {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.prompt(info) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Failed to read answer from terminal: {}", e);
                DialogResult::Cancel
            }
        }
    }
}
