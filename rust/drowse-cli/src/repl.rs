//! Line-editing console backed by rustyline.
//!
//! The editor lives on its own thread and serves prompts over a channel,
//! so the console can be shared with running scripts like any other
//! [`Console`].

use crate::colors::gray;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use drowse_runtime::{Console, IoFault};
use parking_lot::Mutex;
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use thiserror::Error;

/// Environment variable used to override the history location.
pub const HISTORY_PATH_ENV: &str = "DROWSE_HISTORY";

const COMMANDS: &[&str] = &[
    "help", "load", "unload", "list", "run", "tree", "env", "debug", "profile", "clear", "quit",
];

#[derive(Debug, Error)]
pub enum ReplError {
    #[error("cannot start the line editor: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("line editor failed: {0}")]
    Editor(String),
}

struct CommandCompleter {
    files: FilenameCompleter,
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let head = &line[..pos];
        if head.starts_with("load ") {
            return self.files.complete(line, pos, ctx);
        }
        if head.contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(head))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: format!("{} ", cmd),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}

impl Validator for CommandCompleter {}

impl Helper for CommandCompleter {}

enum Request {
    ReadLine { prompt: String, reply: Sender<Reply> },
    Shutdown,
}

enum Reply {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

/// Console whose input comes from a rustyline editor with history.
pub struct EditorConsole {
    requests: Sender<Request>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EditorConsole {
    pub fn start(history: Option<PathBuf>) -> Result<Self, ReplError> {
        let (requests, inbox) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let worker = std::thread::Builder::new()
            .name("drowse-editor".into())
            .spawn(move || serve(inbox, history, ready_tx))?;
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(EditorConsole {
                requests,
                worker: Mutex::new(Some(worker)),
            }),
            Ok(Err(message)) => Err(ReplError::Editor(message)),
            Err(_) => Err(ReplError::Editor("editor thread exited during startup".into())),
        }
    }
}

fn serve(inbox: Receiver<Request>, history: Option<PathBuf>, ready: Sender<Result<(), String>>) {
    let config = rustyline::Config::builder().auto_add_history(true).build();
    let mut editor: Editor<CommandCompleter, DefaultHistory> = match Editor::with_config(config) {
        Ok(editor) => editor,
        Err(err) => {
            let _ = ready.send(Err(err.to_string()));
            return;
        }
    };
    editor.set_helper(Some(CommandCompleter {
        files: FilenameCompleter::new(),
    }));
    if let Some(path) = history.as_deref().filter(|p| p.exists()) {
        if let Err(err) = editor.load_history(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to load history");
        }
    }
    let _ = ready.send(Ok(()));

    for request in inbox {
        match request {
            Request::ReadLine { prompt, reply } => {
                let answer = match editor.readline(&prompt) {
                    Ok(line) => Reply::Line(line),
                    Err(ReadlineError::Interrupted) => Reply::Interrupted,
                    Err(ReadlineError::Eof) => Reply::Eof,
                    Err(err) => Reply::Failed(err.to_string()),
                };
                let _ = reply.send(answer);
            }
            Request::Shutdown => break,
        }
    }

    if let Some(path) = history.as_deref() {
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %err, "failed to create history directory");
            }
        }
        if let Err(err) = editor.save_history(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to save history");
        }
    }
}

impl Console for EditorConsole {
    fn read_line(&self, prompt: &str) -> Result<Option<String>, IoFault> {
        let (reply, answer) = bounded(1);
        self.requests
            .send(Request::ReadLine {
                prompt: prompt.to_string(),
                reply,
            })
            .map_err(|_| IoFault::Closed)?;
        match answer.recv().map_err(|_| IoFault::Closed)? {
            Reply::Line(line) => Ok(Some(line)),
            Reply::Interrupted => {
                self.print_line(&gray("(Ctrl-D to exit)"));
                Ok(Some(String::new()))
            }
            Reply::Eof => Ok(None),
            Reply::Failed(message) => Err(IoFault::Io(std::io::Error::other(message))),
        }
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

impl Drop for EditorConsole {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

/// Resolve the path to the history file.
///
/// - an absolute override is used as-is;
/// - `~/...` and relative overrides resolve under `home`;
/// - otherwise `${HOME}/.drowse/history`.
pub fn resolve_history_path(home: Option<&Path>, override_path: Option<&str>) -> Option<PathBuf> {
    let home_path = || home.map(Path::to_path_buf);

    if let Some(raw) = override_path.map(str::trim).filter(|value| !value.is_empty()) {
        if raw == "~" {
            return home_path();
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            return home_path().map(|home| home.join(rest));
        }
        let configured = PathBuf::from(raw);
        if configured.is_relative() {
            return home_path().map(|home| home.join(configured));
        }
        return Some(configured);
    }

    home_path().map(|home| home.join(".drowse").join("history"))
}

/// History path from `DROWSE_HISTORY`, then the configured value.
pub fn history_path(configured: Option<&str>) -> Option<PathBuf> {
    let from_env = std::env::var(HISTORY_PATH_ENV).ok();
    let home = dirs::home_dir();
    resolve_history_path(home.as_deref(), from_env.as_deref().or(configured))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_history_path() {
        let home = Path::new("/home/tester");

        assert_eq!(
            resolve_history_path(Some(home), None),
            Some(PathBuf::from("/home/tester/.drowse/history"))
        );
        assert_eq!(
            resolve_history_path(Some(home), Some("drowse/history.log")),
            Some(PathBuf::from("/home/tester/drowse/history.log"))
        );
        assert_eq!(
            resolve_history_path(Some(home), Some("~/logs/console.log")),
            Some(PathBuf::from("/home/tester/logs/console.log"))
        );
        assert_eq!(
            resolve_history_path(Some(home), Some("/tmp/console.log")),
            Some(PathBuf::from("/tmp/console.log"))
        );
        assert_eq!(resolve_history_path(None, Some("relative.log")), None);
        assert_eq!(resolve_history_path(None, None), None);
    }
}
