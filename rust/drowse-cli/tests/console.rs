//! Console command loop against saved program images.

use drowse_cli::colors;
use drowse_cli::console::{command_loop, Session};
use drowse_core::build::{BlockBuilder, Expr};
use drowse_core::Program;
use drowse_runtime::{BufferConsole, CollectingWatcher};
use drowse_vm::Engine;
use std::path::PathBuf;
use std::sync::Arc;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("drowse-cli-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn greeter() -> Program {
    Program::new(
        "greeter",
        BlockBuilder::new()
            .sub(
                "&greet",
                BlockBuilder::new()
                    .ret(Expr::op(".", Expr::str("hello "), Expr::var("$1")))
                    .build(),
            )
            .call("&println", vec![Expr::call("&greet", vec![Expr::str("world")])])
            .ret(Expr::int(42))
            .build(),
    )
}

fn session(console: &Arc<BufferConsole>) -> Session {
    colors::set_enabled(false);
    Session::new(
        Engine::new()
            .with_console(console.clone())
            .with_watcher(Arc::new(CollectingWatcher::new())),
    )
}

#[test]
fn console_load_run_and_inspect() {
    let dir = scratch("run");
    let image = dir.join("greeter.dwc");
    greeter().save(&image).unwrap();

    let console = Arc::new(BufferConsole::with_input([
        format!("load {}", image.display()),
        "list".to_string(),
        "run greeter".to_string(),
        "env greeter".to_string(),
        "quit".to_string(),
        "run greeter".to_string(),
    ]));
    let mut session = session(&console);
    command_loop(&mut session, console.as_ref(), "> ");

    let output = console.output();
    assert!(output.contains("loaded greeter"), "{}", output);
    assert!(output.contains("hello world\n"), "{}", output);
    assert!(output.contains("=> 42"), "{}", output);
    assert!(output.contains("&greet"), "{}", output);
    // Nothing after quit runs.
    assert_eq!(output.matches("hello world").count(), 1, "{}", output);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn console_reports_unknown_scripts_and_commands() {
    let console = Arc::new(BufferConsole::with_input(["run nothing", "bogus", "debug x"]));
    let mut session = session(&console);
    command_loop(&mut session, console.as_ref(), "> ");

    let output = console.output();
    assert!(output.contains("no script named 'nothing' is loaded"), "{}", output);
    assert!(output.contains("unknown command 'bogus'"), "{}", output);
    assert!(output.contains("usage: debug <name> <level>"), "{}", output);
}

#[test]
fn console_debug_level_enables_profiling() {
    let console = Arc::new(BufferConsole::new());
    let mut session = session(&console);
    session.insert(greeter()).unwrap();

    assert!(session.execute("debug greeter 24", console.as_ref()));
    assert!(session.execute("run greeter", console.as_ref()));
    console.take_output();
    assert!(session.execute("profile greeter", console.as_ref()));
    let output = console.take_output();
    assert!(output.contains("&greet"), "{}", output);
    assert!(output.contains("&println"), "{}", output);
}

#[test]
fn console_tree_and_unload() {
    let dir = scratch("tree");
    let image = dir.join("greeter.json");
    greeter().save(&image).unwrap();

    let console = Arc::new(BufferConsole::new());
    let mut session = session(&console);
    session.load(&image).unwrap();

    session.execute("tree greeter", console.as_ref());
    let tree = console.take_output();
    assert!(tree.contains("&greet"), "{}", tree);

    session.execute("unload greeter", console.as_ref());
    assert_eq!(session.names().count(), 0);
    session.execute("list", console.as_ref());
    assert!(console.take_output().contains("no scripts loaded"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn console_load_rejects_unknown_format() {
    let console = Arc::new(BufferConsole::new());
    let mut session = session(&console);
    session.execute("load script.txt", console.as_ref());
    assert!(console.output().contains("unrecognised program format"));
}
