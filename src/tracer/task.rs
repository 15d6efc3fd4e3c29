//! Per-process bookkeeping.

use nix::unistd::Pid;
use std::time::Instant;

/// ptrace does not tell you whether a syscall-stop is a syscall-enter-stop
/// or a syscall-exit-stop; the tracer keeps that bit per pid. This is the
/// whole reason this record exists.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LastStop {
    Enter,
    Exit,
    Other,
}

pub struct TracedProcess {
    pub pid: Pid,
    pub last_stop: LastStop,
    /// Timestamp of the most recent syscall-enter, for durations at exit.
    pub enter_time: Option<Instant>,
    /// The enter-stop of the current syscall was denied with the
    /// simulate-error action; the matching exit-stop must rewrite the
    /// result registers.
    pub denied_at_enter: bool,
}

impl TracedProcess {
    pub fn new(pid: Pid, last_stop: LastStop) -> TracedProcess {
        TracedProcess {
            pid,
            last_stop,
            enter_time: None,
            denied_at_enter: false,
        }
    }
}
