//! Per-name syscall counters, partitioned by whether enforcement was
//! already active when the call was observed.
//!
//! The maps are owned by the event-loop thread; they are only published at
//! shutdown, and only in trace mode, as two fixed-name files in the current
//! working directory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

pub const BEFORE_ENFORCE_FILE: &str = "gk-syscalls-before-enforce.txt";
pub const AFTER_ENFORCE_FILE: &str = "gk-syscalls-after-enforce.txt";

#[derive(Default)]
pub struct SyscallStats {
    before: HashMap<&'static str, u64>,
    after: HashMap<&'static str, u64>,
}

impl SyscallStats {
    pub fn new() -> SyscallStats {
        SyscallStats::default()
    }

    /// Exactly one of the two maps is incremented per observed enter.
    pub fn record(&mut self, name: &'static str, enforced: bool) {
        let map = if enforced { &mut self.after } else { &mut self.before };
        *map.entry(name).or_insert(0) += 1;
    }

    pub fn seen_before(&self, name: &str) -> u64 {
        self.before.get(name).copied().unwrap_or(0)
    }

    pub fn seen_after(&self, name: &str) -> u64 {
        self.after.get(name).copied().unwrap_or(0)
    }

    /// Write both maps into `dir`, one syscall name per line. Failures are
    /// logged and swallowed; statistics are never worth failing a shutdown.
    pub fn write_to(&self, dir: &Path) {
        for (file, map) in &[
            (BEFORE_ENFORCE_FILE, &self.before),
            (AFTER_ENFORCE_FILE, &self.after),
        ] {
            if let Err(e) = write_names(&dir.join(file), map) {
                warn!("unable to write {}: {}", file, e);
            }
        }
    }

    pub fn write_to_cwd(&self) {
        self.write_to(Path::new("."));
    }
}

fn write_names(path: &Path, map: &HashMap<&'static str, u64>) -> io::Result<()> {
    let mut names: Vec<&str> = map.keys().copied().collect();
    names.sort_unstable();
    let mut f = File::create(path)?;
    for name in names {
        writeln!(f, "{}", name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_event_increments_exactly_one_map() {
        let mut stats = SyscallStats::new();
        stats.record("openat", false);
        stats.record("openat", true);
        stats.record("read", true);
        assert_eq!(stats.seen_before("openat"), 1);
        assert_eq!(stats.seen_after("openat"), 1);
        assert_eq!(stats.seen_before("read"), 0);
        assert_eq!(stats.seen_after("read"), 1);
    }

    #[test]
    fn files_contain_one_name_per_line() {
        let td = tempfile::tempdir().unwrap();
        let mut stats = SyscallStats::new();
        stats.record("write", true);
        stats.record("openat", true);
        stats.record("openat", true);
        stats.write_to(td.path());

        let after = std::fs::read_to_string(td.path().join(AFTER_ENFORCE_FILE)).unwrap();
        assert_eq!(after, "openat\nwrite\n");
        let before = std::fs::read_to_string(td.path().join(BEFORE_ENFORCE_FILE)).unwrap();
        assert_eq!(before, "");
    }
}
