//! Call profiler: self time per callee name and per call-site line.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileStat {
    pub calls: u64,
    pub total: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub name: String,
    pub calls: u64,
    pub total: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub source: Option<String>,
    pub line: u32,
    pub calls: u64,
    pub total: Duration,
}

#[derive(Debug, Default)]
pub struct Profiler {
    by_name: Mutex<HashMap<String, ProfileStat>>,
    by_line: Mutex<HashMap<(Option<String>, u32), ProfileStat>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, source: Option<&str>, line: u32, self_time: Duration) {
        {
            let mut by_name = self.by_name.lock();
            let stat = by_name.entry(name.to_string()).or_default();
            stat.calls += 1;
            stat.total += self_time;
        }
        let mut by_line = self.by_line.lock();
        let stat = by_line
            .entry((source.map(str::to_string), line))
            .or_default();
        stat.calls += 1;
        stat.total += self_time;
    }

    /// Per-name statistics, most expensive first.
    pub fn entries(&self) -> Vec<ProfileEntry> {
        let mut entries: Vec<ProfileEntry> = self
            .by_name
            .lock()
            .iter()
            .map(|(name, stat)| ProfileEntry {
                name: name.clone(),
                calls: stat.calls,
                total: stat.total,
            })
            .collect();
        entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        entries
    }

    pub fn line_entries(&self) -> Vec<LineEntry> {
        let mut entries: Vec<LineEntry> = self
            .by_line
            .lock()
            .iter()
            .map(|((source, line), stat)| LineEntry {
                source: source.clone(),
                line: *line,
                calls: stat.calls,
                total: stat.total,
            })
            .collect();
        entries.sort_by(|a, b| (&a.source, a.line).cmp(&(&b.source, b.line)));
        entries
    }

    pub fn reset(&self) {
        self.by_name.lock().clear();
        self.by_line.lock().clear();
    }
}

/// Render one entry the way `&profile` and the console report it.
pub fn format_entry(entry: &ProfileEntry) -> String {
    format!(
        "{:.3}s {} {}",
        entry.total.as_secs_f64(),
        entry.calls,
        entry.name
    )
}
