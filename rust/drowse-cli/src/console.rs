//! Interactive command loop over loaded scripts.
//!
//! Every command reads and writes through the [`Console`] contract, so the
//! loop runs the same against a terminal or a [`drowse_runtime::BufferConsole`].

use crate::colors::{bold, cyan, gray, green, red, yellow};
use drowse_core::program::ProgramError;
use drowse_core::{EngineError, Program};
use drowse_runtime::Console;
use drowse_vm::profile::format_entry;
use drowse_vm::{format_stack_trace, DebugFlags, Engine, Script};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("no script named '{0}' is loaded")]
    NotLoaded(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Load(&'a str),
    Unload(&'a str),
    List,
    Run(&'a str),
    Tree(&'a str),
    Env(&'a str),
    Debug(&'a str, u32),
    Profile(&'a str),
    Clear,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Parsed<'a> {
    Empty,
    Unknown(&'a str),
    Usage(&'static str),
    Command(Command<'a>),
}

pub fn parse_command(line: &str) -> Parsed<'_> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Parsed::Empty;
    };
    let arg = words.next();
    let extra = words.next();

    fn named<'a>(arg: Option<&'a str>, make: fn(&'a str) -> Command<'a>, usage: &'static str) -> Parsed<'a> {
        match arg {
            Some(name) => Parsed::Command(make(name)),
            None => Parsed::Usage(usage),
        }
    }
    match cmd {
        "help" | "?" => Parsed::Command(Command::Help),
        "list" | "ls" => Parsed::Command(Command::List),
        "clear" => Parsed::Command(Command::Clear),
        "quit" | "exit" => Parsed::Command(Command::Quit),
        "load" => {
            let path = line.trim_start()[cmd.len()..].trim();
            named((!path.is_empty()).then_some(path), Command::Load, "usage: load <file>")
        }
        "unload" => named(arg, Command::Unload, "usage: unload <name>"),
        "run" => named(arg, Command::Run, "usage: run <name>"),
        "tree" => named(arg, Command::Tree, "usage: tree <name>"),
        "env" => named(arg, Command::Env, "usage: env <name>"),
        "profile" => named(arg, Command::Profile, "usage: profile <name>"),
        "debug" => match (arg, extra.map(str::parse::<u32>)) {
            (Some(name), Some(Ok(level))) => Parsed::Command(Command::Debug(name, level)),
            _ => Parsed::Usage("usage: debug <name> <level>"),
        },
        other => Parsed::Unknown(other),
    }
}

/// Scripts loaded into one console session, keyed by program name.
pub struct Session {
    engine: Engine,
    scripts: BTreeMap<String, Script>,
}

impl Session {
    pub fn new(engine: Engine) -> Self {
        Session {
            engine,
            scripts: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn script(&self, name: &str) -> Result<&Script, SessionError> {
        self.scripts
            .get(name)
            .ok_or_else(|| SessionError::NotLoaded(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    /// Load a program image and return the name it was registered under.
    /// Loading a name again replaces the earlier script.
    pub fn load(&mut self, path: &Path) -> Result<String, SessionError> {
        let program = Program::load(path)?;
        self.insert(program)
    }

    pub fn insert(&mut self, program: Program) -> Result<String, SessionError> {
        let script = self.engine.load(program)?;
        let name = script.name().to_string();
        if self.scripts.insert(name.clone(), script).is_some() {
            tracing::debug!(script = %name, "replaced loaded script");
        }
        Ok(name)
    }

    pub fn unload(&mut self, name: &str) -> Result<Script, SessionError> {
        self.scripts
            .remove(name)
            .ok_or_else(|| SessionError::NotLoaded(name.to_string()))
    }

    /// Run one command line. Returns `false` when the session should end.
    pub fn execute(&mut self, line: &str, out: &dyn Console) -> bool {
        match parse_command(line) {
            Parsed::Empty => true,
            Parsed::Unknown(cmd) => {
                out.print_line(&format!("{} unknown command '{}'. Type help for usage.", red("error:"), cmd));
                true
            }
            Parsed::Usage(usage) => {
                out.print_line(&format!("{} {}", red("error:"), usage));
                true
            }
            Parsed::Command(Command::Quit) => false,
            Parsed::Command(command) => {
                if let Err(err) = self.dispatch(command, out) {
                    out.print_line(&format!("{} {}", red("error:"), err));
                }
                true
            }
        }
    }

    fn dispatch(&mut self, command: Command<'_>, out: &dyn Console) -> Result<(), SessionError> {
        match command {
            Command::Help => print_help(out),
            Command::Clear => out.clear(),
            Command::Quit => {}
            Command::Load(path) => {
                let name = self.load(Path::new(path))?;
                out.print_line(&format!("{} {}", green("loaded"), bold(&name)));
            }
            Command::Unload(name) => {
                self.unload(name)?;
                out.print_line(&format!("{} {}", gray("unloaded"), name));
            }
            Command::List => {
                if self.scripts.is_empty() {
                    out.print_line(&gray("no scripts loaded"));
                }
                for (name, script) in &self.scripts {
                    out.print_line(&format!(
                        "{} {}",
                        bold(name),
                        gray(&format!("(debug {})", script.config().debug.level()))
                    ));
                }
            }
            Command::Run(name) => {
                let script = self.script(name)?;
                match script.run() {
                    Ok(value) if value.is_null() => {}
                    Ok(value) => out.print_line(&format!("{} {}", cyan("=>"), value.describe())),
                    Err(err) => {
                        out.print_line(&format!("{} {}", red("aborted:"), err));
                        let trace = script.last_trace();
                        if !trace.is_empty() {
                            out.print_line(&format_stack_trace(&trace));
                        }
                    }
                }
            }
            Command::Tree(name) => {
                let script = self.script(name)?;
                out.print(&script.program().main.dump());
            }
            Command::Env(name) => {
                let script = self.script(name)?;
                let env = script.environment();
                out.print_line(&format!("{} {}", bold("functions:"), env.function_names().join(" ")));
                out.print_line(&format!("{} {}", bold("operators:"), env.operator_names().join(" ")));
                out.print_line(&format!("{} {}", bold("predicates:"), env.predicate_names().join(" ")));
                let mut globals = script.globals().keys();
                globals.sort();
                out.print_line(&format!("{} {}", bold("globals:"), globals.join(" ")));
            }
            Command::Debug(name, level) => {
                let script = self.script(name)?;
                script.set_debug(DebugFlags::from_level(level));
                out.print_line(&format!("{} debug level {}", bold(name), level));
            }
            Command::Profile(name) => {
                let script = self.script(name)?;
                let entries = script.profile();
                if entries.is_empty() {
                    out.print_line(&yellow(&format!(
                        "nothing profiled; try `debug {} 24` and run it again",
                        name
                    )));
                }
                for entry in &entries {
                    out.print_line(&format_entry(entry));
                }
            }
        }
        Ok(())
    }
}

/// Read and execute commands until `quit` or end of input.
pub fn command_loop(session: &mut Session, console: &dyn Console, prompt: &str) {
    loop {
        let line = match console.read_line(prompt) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                console.print_line(&format!("{} {}", red("error:"), err));
                break;
            }
        };
        if !session.execute(&line, console) {
            break;
        }
    }
}

fn print_help(out: &dyn Console) {
    let rows = [
        ("help", "Show this help"),
        ("load <file>", "Load a .json or .dwc program image"),
        ("unload <name>", "Forget a loaded script"),
        ("list", "List loaded scripts"),
        ("run <name>", "Run a script's top-level block"),
        ("tree <name>", "Print a script's instruction tree"),
        ("env <name>", "Show functions, operators, predicates and globals"),
        ("debug <name> <level>", "Set a script's debug level"),
        ("profile <name>", "Show profiler statistics"),
        ("clear", "Clear the screen"),
        ("quit", "Leave the console"),
    ];
    out.print_line(&bold("Commands:"));
    for (usage, about) in rows {
        out.print_line(&format!("  {} {}", cyan(&format!("{:<22}", usage)), gray(about)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Parsed::Empty);
        assert_eq!(parse_command("run hello"), Parsed::Command(Command::Run("hello")));
        assert_eq!(parse_command("debug hello 24"), Parsed::Command(Command::Debug("hello", 24)));
        assert_eq!(parse_command("debug hello"), Parsed::Usage("usage: debug <name> <level>"));
        assert_eq!(parse_command("debug hello x"), Parsed::Usage("usage: debug <name> <level>"));
        assert_eq!(parse_command("load"), Parsed::Usage("usage: load <file>"));
        assert_eq!(
            parse_command("load my programs/a.json"),
            Parsed::Command(Command::Load("my programs/a.json"))
        );
        assert_eq!(parse_command("exit"), Parsed::Command(Command::Quit));
        assert_eq!(parse_command("frobnicate"), Parsed::Unknown("frobnicate"));
    }
}
