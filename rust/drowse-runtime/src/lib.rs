//! Drowse Runtime
//!
//! The contracts the engine is embedded through (variable storage, console,
//! diagnostics, I/O handles) with their default implementations, plus the
//! port listener registry, background workers and the panic boundary used
//! around host code.

pub mod console;
pub mod diagnostics;
pub mod io;
pub mod listeners;
pub mod panic_boundary;
pub mod variables;
pub mod worker;

pub use console::{BufferConsole, Console, StdConsole};
pub use diagnostics::{CollectingWatcher, LogWatcher, Warning, Watcher};
pub use io::{BufferHandle, IoFault, IoHandle, StreamHandle};
pub use listeners::ListenerRegistry;
pub use variables::{HashVariables, Variables, VarsRef};
pub use worker::{BackgroundTask, WorkerError};
