//! Drowse CLI library.
//!
//! Configuration discovery, the console command loop and the rustyline
//! console behind the `drowse` binary.

pub mod colors;
pub mod config;
pub mod console;
pub mod repl;

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "DROWSE_LOG";

/// Initialize logging to stderr. `DROWSE_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run `work` on a thread with a `stack_size` byte stack and wait for it.
/// Deeply recursive scripts need more than the main thread offers.
pub fn run_on_stack<T, F>(stack_size: usize, work: F) -> std::io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("drowse-main".into())
        .stack_size(stack_size)
        .spawn(work)?;
    handle
        .join()
        .map_err(|_| std::io::Error::other("script thread panicked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_on_stack_returns_the_result() {
        assert_eq!(run_on_stack(4 * 1024 * 1024, || 6 * 7).unwrap(), 42);
    }

    #[test]
    fn run_on_stack_reports_a_panic() {
        let result = run_on_stack(1024 * 1024, || -> u8 { panic!("boom") });
        assert!(result.is_err());
    }
}
