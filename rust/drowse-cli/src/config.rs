//! Configuration file parsing for `drowse.toml`.
//!
//! Searches the current directory then its ancestors, falling back to
//! `~/.config/drowse/drowse.toml` when no project-level file is found.
//! Command-line flags are applied on top with [`DrowseConfig::apply`].

use drowse_vm::{DebugFlags, EngineConfig, DEFAULT_MAX_CALL_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "drowse.toml";

/// Default stack for the thread scripts run on, in MiB.
pub const DEFAULT_STACK_MIB: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct DrowseConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub console: ConsoleSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSection {
    pub taint: bool,
    pub max_call_depth: usize,
    /// Numeric debug level, the same one `&debug` takes.
    pub debug: u32,
    pub stack_mib: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        EngineSection {
            taint: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            debug: DebugFlags::default().level(),
            stack_mib: DEFAULT_STACK_MIB,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConsoleSection {
    pub prompt: String,
    /// History file; relative paths and `~/` resolve under the home directory.
    pub history: Option<String>,
}

impl Default for ConsoleSection {
    fn default() -> Self {
        ConsoleSection {
            prompt: "drowse> ".to_string(),
            history: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogSection {
    /// Used when `DROWSE_LOG` is unset.
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        LogSection {
            filter: "warn".to_string(),
        }
    }
}

/// Values given on the command line; `None` keeps the file's value.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub taint: Option<bool>,
    pub max_call_depth: Option<usize>,
    pub debug: Option<u32>,
}

impl DrowseConfig {
    /// Load the nearest `drowse.toml`, or the defaults when there is none.
    /// Returns the path of the file used.
    pub fn load() -> Result<(Option<PathBuf>, Self), ConfigError> {
        let start = std::env::current_dir().ok();
        let found = start
            .as_deref()
            .and_then(|dir| discover(dir, global_path().as_deref()));
        match found {
            Some(path) => {
                let config = Self::load_from(&path)?;
                tracing::debug!(path = %path.display(), "loaded configuration");
                Ok((Some(path), config))
            }
            None => Ok((None, Self::default())),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a TOML string directly.
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(taint) = overrides.taint {
            self.engine.taint = taint;
        }
        if let Some(depth) = overrides.max_call_depth {
            self.engine.max_call_depth = depth;
        }
        if let Some(level) = overrides.debug {
            self.engine.debug = level;
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            taint: self.engine.taint,
            max_call_depth: self.engine.max_call_depth,
            debug: DebugFlags::from_level(self.engine.debug),
        }
    }

    pub fn stack_size(&self) -> usize {
        self.engine.stack_mib.max(1) * 1024 * 1024
    }

    /// Write the default template to `path`, refusing to overwrite.
    pub fn write_template(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_template()).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }

    pub fn default_template() -> &'static str {
        r#"# Drowse configuration

[engine]
# Track data read from the console, sockets and processes.
taint = false
max_call_depth = 1024
# 1 errors, 2 warnings, 4 strict, 8 trace calls, 24 profile only,
# 34 warnings throw, 64 trace logic, 128 trace taint
debug = 3
stack_mib = 64

[console]
prompt = "drowse> "
# history = "~/.drowse/history"

[log]
# Overridden by DROWSE_LOG.
filter = "warn"
"#
    }
}

/// `~/.config/drowse/drowse.toml`
pub fn global_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("drowse").join(CONFIG_FILE))
}

/// Nearest `drowse.toml` at or above `start`, then `global` if it exists.
pub fn discover(start: &Path, global: Option<&Path>) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    global.filter(|path| path.is_file()).map(Path::to_path_buf)
}
