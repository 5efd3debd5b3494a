//! ANSI color helpers for console output.
//!
//! Coloring is on unless `NO_COLOR` is set or [`set_enabled`] turns it off.

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// Turn coloring off when `NO_COLOR` is present.
pub fn init_from_env() {
    if std::env::var_os("NO_COLOR").is_some() {
        set_enabled(false);
    }
}

fn paint(code: &str, s: &str) -> String {
    if ENABLED.load(Ordering::Relaxed) {
        format!("\x1b[{}m{}\x1b[0m", code, s)
    } else {
        s.to_string()
    }
}

pub fn green(s: &str) -> String {
    paint("32", s)
}

pub fn red(s: &str) -> String {
    paint("31", s)
}

pub fn yellow(s: &str) -> String {
    paint("33", s)
}

pub fn cyan(s: &str) -> String {
    paint("36", s)
}

pub fn bold(s: &str) -> String {
    paint("1", s)
}

pub fn gray(s: &str) -> String {
    paint("90", s)
}

/// Right-aligned, green, bold status label.
pub fn status_label(label: &str) -> String {
    paint("1;32", &format!("{:>12}", label))
}
