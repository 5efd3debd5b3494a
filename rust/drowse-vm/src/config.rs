//! Engine configuration.
//!
//! Every switch lives on the engine instance; nothing here is process-wide.
//! The numeric debug level is the compact form used by `&debug` and the
//! console `debug` command.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

const LEVEL_ERRORS: u32 = 1;
const LEVEL_WARNINGS: u32 = 2;
const LEVEL_STRICT: u32 = 4;
const LEVEL_TRACE: u32 = 8;
const LEVEL_PROFILE_ONLY: u32 = 16;
const LEVEL_THROW_WARNINGS: u32 = 32;
const LEVEL_TRACE_LOGIC: u32 = 64;
const LEVEL_TRACE_TAINT: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Install the taint wrappers when a script is loaded.
    pub taint: bool,
    pub max_call_depth: usize,
    pub debug: DebugFlags,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            taint: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            debug: DebugFlags::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugFlags {
    pub show_errors: bool,
    pub show_warnings: bool,
    /// Warn when a variable is used before it is declared.
    pub strict: bool,
    pub trace_calls: bool,
    pub profile: bool,
    pub trace_logic: bool,
    pub trace_taint: bool,
    /// Warnings become script throws.
    pub throw_warnings: bool,
}

impl Default for DebugFlags {
    fn default() -> Self {
        DebugFlags::from_level(LEVEL_ERRORS | LEVEL_WARNINGS)
    }
}

impl DebugFlags {
    pub fn from_level(level: u32) -> Self {
        let traced = level & LEVEL_TRACE != 0;
        let profile_only = traced && level & LEVEL_PROFILE_ONLY != 0;
        DebugFlags {
            show_errors: level & LEVEL_ERRORS != 0,
            show_warnings: level & LEVEL_WARNINGS != 0,
            strict: level & LEVEL_STRICT != 0,
            trace_calls: traced && !profile_only,
            profile: traced,
            trace_logic: level & LEVEL_TRACE_LOGIC != 0,
            trace_taint: level & LEVEL_TRACE_TAINT != 0,
            throw_warnings: level & LEVEL_THROW_WARNINGS != 0,
        }
    }

    pub fn level(&self) -> u32 {
        let mut level = 0;
        if self.show_errors {
            level |= LEVEL_ERRORS;
        }
        if self.show_warnings {
            level |= LEVEL_WARNINGS;
        }
        if self.strict {
            level |= LEVEL_STRICT;
        }
        if self.trace_calls {
            level |= LEVEL_TRACE;
        } else if self.profile {
            level |= LEVEL_TRACE | LEVEL_PROFILE_ONLY;
        }
        if self.throw_warnings {
            level |= LEVEL_THROW_WARNINGS;
        }
        if self.trace_logic {
            level |= LEVEL_TRACE_LOGIC;
        }
        if self.trace_taint {
            level |= LEVEL_TRACE_TAINT;
        }
        level
    }

    /// Whether the dispatcher has to time calls at all.
    pub fn timing(&self) -> bool {
        self.trace_calls || self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_only_level() {
        let flags = DebugFlags::from_level(24);
        assert!(flags.profile);
        assert!(!flags.trace_calls);
        assert_eq!(flags.level(), 24);
    }

    #[test]
    fn test_trace_implies_profile() {
        let flags = DebugFlags::from_level(8);
        assert!(flags.trace_calls && flags.profile);
        assert_eq!(flags.level(), 8);
    }

    #[test]
    fn test_throw_warnings_level() {
        let flags = DebugFlags::from_level(34);
        assert!(flags.throw_warnings && flags.show_warnings);
        assert!(!flags.show_errors);
    }

    #[test]
    fn test_levels_survive_conversion() {
        for level in [0, 1, 3, 7, 64, 128, 1 | 64 | 128] {
            assert_eq!(DebugFlags::from_level(level).level(), level);
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str("taint = true\n[debug]\nstrict = true\n").unwrap();
        assert!(config.taint);
        assert!(config.debug.strict);
        assert!(config.debug.show_errors);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }
}
