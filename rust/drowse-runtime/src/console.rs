//! The four-method console surface the engine and the command loop use.

use crate::io::IoFault;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, Write};

pub trait Console: Send + Sync {
    /// Next line of input without its terminator, `None` at end of input.
    fn read_line(&self, prompt: &str) -> Result<Option<String>, IoFault>;

    fn print(&self, text: &str);

    fn print_line(&self, text: &str) {
        self.print(text);
        self.print("\n");
    }

    fn clear(&self);
}

/// Console over the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&self, prompt: &str) -> Result<Option<String>, IoFault> {
        if !prompt.is_empty() {
            self.print(prompt);
        }
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn print(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn clear(&self) {
        self.print("\x1b[2J\x1b[H");
    }
}

/// In-memory console: scripted input and captured output.
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: Mutex<VecDeque<String>>,
    output: Mutex<String>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BufferConsole {
            input: Mutex::new(lines.into_iter().map(Into::into).collect()),
            output: Mutex::new(String::new()),
        }
    }

    pub fn push_input(&self, line: impl Into<String>) {
        self.input.lock().push_back(line.into());
    }

    pub fn output(&self) -> String {
        self.output.lock().clone()
    }

    /// Drain captured output.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.output.lock())
    }
}

impl Console for BufferConsole {
    fn read_line(&self, _prompt: &str) -> Result<Option<String>, IoFault> {
        Ok(self.input.lock().pop_front())
    }

    fn print(&self, text: &str) {
        self.output.lock().push_str(text);
    }

    fn clear(&self) {
        self.output.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_console_round_trip() {
        let console = BufferConsole::with_input(["one", "two"]);
        assert_eq!(console.read_line("> ").unwrap().as_deref(), Some("one"));
        console.print_line("hello");
        assert_eq!(console.output(), "hello\n");
        assert_eq!(console.read_line("").unwrap().as_deref(), Some("two"));
        assert_eq!(console.read_line("").unwrap(), None);
        console.clear();
        assert!(console.take_output().is_empty());
    }
}
