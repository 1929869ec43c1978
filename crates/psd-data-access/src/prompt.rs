//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Interactive confirmation for destructive operations."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use parking_lot::Mutex;

/// Source of yes/no answers.
pub trait Confirm: Send + Sync {
    /// Show `prompt` and return the raw answer.
    fn ask(&self, prompt: &str) -> io::Result<String>;

    /// Whether the answer to `prompt` is an explicit yes.
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        Ok(self.ask(prompt)?.trim().eq_ignore_ascii_case("y"))
    }
}

/// Reads answers from the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn ask(&self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt} ")?;
        stdout.flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer)
    }
}

/// Replays prepared answers and records the prompts it was shown.
///
/// Once the answers run out every further prompt gets an empty answer,
/// which counts as "no".
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    /// Confirmation source answering with `answers` in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl Confirm for ScriptedConfirm {
    fn ask(&self, prompt: &str) -> io::Result<String> {
        self.prompts.lock().push(prompt.to_owned());
        Ok(self.answers.lock().pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_y_counts_as_yes() {
        let confirm = ScriptedConfirm::new(["Y", "yes", "", " y\n"]);
        assert!(confirm.confirm("first").unwrap());
        assert!(!confirm.confirm("second").unwrap());
        assert!(!confirm.confirm("third").unwrap());
        assert!(confirm.confirm("fourth").unwrap());
        assert!(!confirm.confirm("exhausted").unwrap());
        assert_eq!(confirm.prompts().len(), 5);
    }
}
