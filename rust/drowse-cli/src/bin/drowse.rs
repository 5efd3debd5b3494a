//! Drowse CLI — run and inspect compiled Drowse programs.

use clap::{Parser as ClapParser, Subcommand};
use drowse_cli::colors::{self, bold, gray, red, status_label, yellow};
use drowse_cli::config::{DrowseConfig, Overrides, CONFIG_FILE};
use drowse_cli::console::{command_loop, Session};
use drowse_cli::repl::{history_path, EditorConsole};
use drowse_core::{Program, Scalar};
use drowse_runtime::{Console, StdConsole};
use drowse_vm::Engine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(ClapParser)]
#[command(name = "drowse", version, about = "Run compiled Drowse programs")]
struct Cli {
    /// Use this configuration file instead of searching for drowse.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Track tainted data from consoles, sockets and processes
    #[arg(long, global = true)]
    taint: bool,

    /// Debug level (1 errors, 2 warnings, 4 strict, 8 trace, 24 profile)
    #[arg(long, global = true)]
    debug: Option<u32>,

    /// Maximum call depth before a stack overflow fault
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a .json or .dwc program image
    Run {
        file: PathBuf,

        /// Call this function after the top-level block has run
        #[arg(long)]
        call: Option<String>,

        /// Arguments for --call
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print a program image as JSON, or convert it to another format
    Dump {
        file: PathBuf,

        /// Output path; the extension picks the format
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the instruction tree instead of JSON
        #[arg(long)]
        tree: bool,
    },
    /// Start the interactive console, optionally preloading programs
    Console { files: Vec<PathBuf> },
    /// Create a drowse.toml in the current directory
    Init,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            taint: self.taint.then_some(true),
            max_call_depth: self.max_depth,
            debug: self.debug,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    colors::init_from_env();

    let loaded = match &cli.config {
        Some(path) => DrowseConfig::load_from(path).map(|cfg| (Some(path.clone()), cfg)),
        None => DrowseConfig::load(),
    };
    let (config_path, mut config) = loaded.unwrap_or_else(|err| {
        eprintln!("{} {}", red("error:"), err);
        std::process::exit(2);
    });
    config.apply(&cli.overrides());
    drowse_cli::init_logging(&config.log.filter);
    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "using configuration");
    }

    let stack = config.stack_size();
    let code = match drowse_cli::run_on_stack(stack, move || dispatch(cli.command, config)) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {}", red("error:"), err);
            1
        }
    };
    std::process::exit(code);
}

fn dispatch(command: Commands, config: DrowseConfig) -> i32 {
    match command {
        Commands::Run { file, call, args } => cmd_run(&file, call.as_deref(), args, &config),
        Commands::Dump { file, output, tree } => cmd_dump(&file, output.as_deref(), tree),
        Commands::Console { files } => cmd_console(&files, &config),
        Commands::Init => cmd_init(),
    }
}

fn read_program(file: &Path) -> Option<Program> {
    match Program::load(file) {
        Ok(program) => Some(program),
        Err(err) => {
            eprintln!("{} {}: {}", red("error:"), bold(&file.display().to_string()), err);
            None
        }
    }
}

fn cmd_run(file: &Path, call: Option<&str>, args: Vec<String>, config: &DrowseConfig) -> i32 {
    let Some(program) = read_program(file) else {
        return 1;
    };
    let engine = Engine::new().with_config(config.engine_config());
    let script = match engine.load(program) {
        Ok(script) => script,
        Err(err) => {
            eprintln!("{} {}", red("error:"), err);
            return 1;
        }
    };

    let mut outcome = script.run();
    if let (Ok(_), Some(function)) = (&outcome, call) {
        outcome = script.call(function, args.into_iter().map(Scalar::string).collect());
    }
    match outcome {
        Ok(value) => {
            if !value.is_null() {
                println!("{}", value.describe());
            }
            0
        }
        Err(err) => {
            eprintln!("{} {}", red("runtime error:"), err);
            let trace = script.last_trace();
            if !trace.is_empty() {
                eprintln!("{}", drowse_vm::format_stack_trace(&trace));
            }
            1
        }
    }
}

fn cmd_dump(file: &Path, output: Option<&Path>, tree: bool) -> i32 {
    let Some(program) = read_program(file) else {
        return 1;
    };
    if tree {
        print!("{}", program.main.dump());
        return 0;
    }
    match output {
        Some(out) => match program.save(out) {
            Ok(()) => {
                println!("{} {}", status_label("Wrote"), out.display());
                0
            }
            Err(err) => {
                eprintln!("{} writing '{}': {}", red("error:"), out.display(), err);
                1
            }
        },
        None => match program.to_json() {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(err) => {
                eprintln!("{} {}", red("error:"), err);
                1
            }
        },
    }
}

fn cmd_console(files: &[PathBuf], config: &DrowseConfig) -> i32 {
    let console: Arc<dyn Console> = match EditorConsole::start(history_path(config.console.history.as_deref())) {
        Ok(editor) => Arc::new(editor),
        Err(err) => {
            eprintln!("{} {}; falling back to plain input", yellow("warning:"), err);
            Arc::new(StdConsole)
        }
    };
    let engine = Engine::new()
        .with_config(config.engine_config())
        .with_console(console.clone());
    let mut session = Session::new(engine);
    for file in files {
        if let Err(err) = session.load(file) {
            console.print_line(&format!("{} {}: {}", red("error:"), file.display(), err));
        }
    }

    console.print_line(&bold(&format!("Drowse console v{}", env!("CARGO_PKG_VERSION"))));
    console.print_line(&gray("Type help for available commands, quit to exit."));
    command_loop(&mut session, console.as_ref(), &config.console.prompt);
    0
}

fn cmd_init() -> i32 {
    let path = PathBuf::from(CONFIG_FILE);
    match DrowseConfig::write_template(&path) {
        Ok(true) => {
            println!("{} {}", status_label("Created"), CONFIG_FILE);
            0
        }
        Ok(false) => {
            eprintln!("{} {} already exists, not overwriting", red("error:"), CONFIG_FILE);
            1
        }
        Err(err) => {
            eprintln!("{} {}", red("error:"), err);
            1
        }
    }
}
