//! The tracer event loop.
//!
//! A single-threaded cooperative dispatcher: the kernel binds the tracing
//! relationship to the thread that set it up, so every trace operation
//! (register access, memory peeks, resumes, waits) is issued from this one
//! thread for the lifetime of the program. The loop reaps stop events from
//! every descendant of the initial tracee, classifies each stop, keeps the
//! per-pid enter/exit bit, asks the gate for a decision on each enter, and
//! resumes the process with an optional injected signal.

pub mod event;
pub mod spawn;
pub mod task;

use crate::enforcement;
use crate::errors::{GatekeeperError, GkResult};
use crate::gate;
use crate::gate::SyscallCtx;
use crate::kernel_metadata::signal_string;
use crate::policy::{DenialAction, ExecutionMode, Policy};
use crate::registers::Registers;
use crate::remote_mem::PtraceMem;
use crate::stats::SyscallStats;
use crate::tracer::event::SyscallEvent;
use crate::tracer::task::{LastStop, TracedProcess};
use crate::wait_status::wait_any;
use nix::errno::Errno;
use nix::unistd::Pid;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// An invalid syscall number; rewriting the number register to this makes
/// the kernel reject the call without running any handler.
const INVALID_SYSCALL: i64 = -1;

/// How the tracee tree ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TraceeExit {
    Code(i32),
    Signal(i32),
}

impl TraceeExit {
    /// 0/propagated for normal exits, 111 when the tracee died to a signal.
    pub fn exit_code(&self) -> i32 {
        match self {
            TraceeExit::Code(code) => *code,
            TraceeExit::Signal(_) => 111,
        }
    }
}

/// Restart a stopped tracee with PTRACE_SYSCALL, optionally injecting a
/// signal. Raw because the injected signal may be anything the kernel
/// delivered, including realtime signals.
pub(crate) fn resume(pid: Pid, sig: i32) -> Result<(), Errno> {
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_SYSCALL,
            pid.as_raw(),
            std::ptr::null_mut::<libc::c_void>(),
            sig as libc::c_long,
        )
    };
    if rc < 0 {
        Err(Errno::last())
    } else {
        Ok(())
    }
}

fn ptrace_event_msg(pid: Pid) -> Result<u64, Errno> {
    let mut msg: libc::c_ulong = 0;
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_GETEVENTMSG,
            pid.as_raw(),
            std::ptr::null_mut::<libc::c_void>(),
            &mut msg as *mut libc::c_ulong,
        )
    };
    if rc < 0 {
        Err(Errno::last())
    } else {
        Ok(msg as u64)
    }
}

pub struct Tracer {
    processes: HashMap<Pid, TracedProcess>,
    stats: SyscallStats,
}

enum StopAction {
    /// Resume with this signal (0 for none).
    Resume(i32),
    /// The process is gone; nothing to resume.
    Gone,
}

impl Tracer {
    pub fn new() -> Tracer {
        Tracer {
            processes: HashMap::new(),
            stats: SyscallStats::new(),
        }
    }

    /// Track a process. New clone/fork/vfork children start with
    /// `LastStop::Exit` because their first visible syscall-stop will be an
    /// enter.
    pub fn adopt(&mut self, pid: Pid, last_stop: LastStop) {
        self.processes.insert(pid, TracedProcess::new(pid, last_stop));
    }

    pub fn stats(&self) -> &SyscallStats {
        &self.stats
    }

    /// Run until every tracked descendant has exited. Only structural
    /// failures come back as errors; a tracee dying under us is normal and
    /// is folded into the next wait.
    pub fn run_loop(&mut self, policy: &Policy) -> GkResult<TraceeExit> {
        loop {
            let (pid, status) = match wait_any() {
                Ok(pair) => pair,
                Err(Errno::ECHILD) => {
                    // Every watched process disappeared without the map
                    // draining first; nothing left to supervise.
                    warn!("all watched processes are gone");
                    return Err(GatekeeperError::trace(Pid::from_raw(-1), "wait4", Errno::ECHILD));
                }
                Err(e) => {
                    return Err(GatekeeperError::trace(Pid::from_raw(-1), "wait4", e));
                }
            };

            // Other children (pipe helpers and the like) are not ours to
            // manage.
            if !self.processes.contains_key(&pid) {
                continue;
            }

            if status.exited() {
                debug!(pid = pid.as_raw(), code = status.exit_status(), "tracee exited");
                self.processes.remove(&pid);
                if self.processes.is_empty() {
                    return Ok(TraceeExit::Code(status.exit_status()));
                }
                continue;
            }

            if status.signaled() {
                debug!(
                    pid = pid.as_raw(),
                    signal = %signal_string(status.term_signal()),
                    "tracee killed by signal"
                );
                self.processes.remove(&pid);
                if self.processes.is_empty() {
                    return Ok(TraceeExit::Signal(status.term_signal()));
                }
                continue;
            }

            let action = if status.stopped() {
                self.on_stop(policy, pid, status.stop_signal(), status.ptrace_event())?
            } else {
                StopAction::Resume(0)
            };

            let inject = match action {
                StopAction::Resume(sig) => sig,
                StopAction::Gone => continue,
            };

            match resume(pid, inject) {
                Ok(()) => {}
                Err(Errno::ESRCH) => {
                    // The tracee died between the stop and the resume; the
                    // next wait will deliver its exit.
                    debug!(pid = pid.as_raw(), "tracee vanished before resume");
                }
                Err(e) => return Err(GatekeeperError::trace(pid, "ptrace(PTRACE_SYSCALL)", e)),
            }
        }
    }

    fn on_stop(
        &mut self,
        policy: &Policy,
        pid: Pid,
        stop_signal: i32,
        ptrace_event: i32,
    ) -> GkResult<StopAction> {
        if stop_signal == crate::wait_status::TRAP_SYSGOOD {
            return self.on_syscall_stop(policy, pid);
        }

        match stop_signal {
            // Group stops: pass the signal through on resume.
            libc::SIGSTOP | libc::SIGTSTP | libc::SIGTTOU | libc::SIGTTIN => {
                debug!(pid = pid.as_raw(), signal = %signal_string(stop_signal), "group stop");
                Ok(StopAction::Resume(stop_signal))
            }
            libc::SIGTRAP => match ptrace_event {
                libc::PTRACE_EVENT_CLONE | libc::PTRACE_EVENT_FORK | libc::PTRACE_EVENT_VFORK => {
                    let child = match ptrace_event_msg(pid) {
                        Ok(msg) => Pid::from_raw(msg as libc::pid_t),
                        Err(Errno::ESRCH) => return Ok(StopAction::Gone),
                        Err(e) => {
                            return Err(GatekeeperError::trace(pid, "ptrace(PTRACE_GETEVENTMSG)", e))
                        }
                    };
                    // The child's first visible syscall-stop will be an
                    // enter, so its record starts as if an exit just
                    // happened.
                    self.adopt(child, LastStop::Exit);
                    debug!(pid = pid.as_raw(), child = child.as_raw(), "new child adopted");
                    Ok(StopAction::Resume(0))
                }
                // The exec event and any other PTRACE_EVENT stop just get
                // resumed.
                event if event != 0 => Ok(StopAction::Resume(0)),
                // A plain SIGTRAP (e.g. from tkill) is an ordinary
                // signal-delivery-stop.
                _ => Ok(StopAction::Resume(stop_signal)),
            },
            // Ordinary signal-delivery-stop: inject the signal on resume.
            other => {
                debug!(pid = pid.as_raw(), signal = %signal_string(other), "signal stop");
                Ok(StopAction::Resume(other))
            }
        }
    }

    fn on_syscall_stop(&mut self, policy: &Policy, pid: Pid) -> GkResult<StopAction> {
        let regs = match Registers::read(pid) {
            Ok(regs) => regs,
            // Race with tracee shutdown; the exit will show up on the next
            // wait.
            Err(Errno::ESRCH) => return Ok(StopAction::Gone),
            Err(e) => return Err(GatekeeperError::trace(pid, "ptrace(PTRACE_GETREGSET)", e)),
        };

        let proc = match self.processes.get_mut(&pid) {
            Some(proc) => proc,
            None => return Ok(StopAction::Resume(0)),
        };

        let is_enter = proc.last_stop != LastStop::Enter;
        if is_enter {
            proc.last_stop = LastStop::Enter;
            proc.enter_time = Some(Instant::now());
        } else {
            proc.last_stop = LastStop::Exit;
        }

        if !is_enter {
            let duration = proc.enter_time.take().map(|t| t.elapsed());
            if proc.denied_at_enter {
                proc.denied_at_enter = false;
                let mut rewritten = regs;
                rewritten.set_syscall_result(-(libc::EPERM as i64));
                rewritten.set_second_result(libc::EPERM as u64);
                match rewritten.flush(pid) {
                    Ok(()) => {}
                    Err(Errno::ESRCH) => return Ok(StopAction::Gone),
                    Err(e) => return Err(GatekeeperError::trace(pid, "ptrace(PTRACE_SETREGSET)", e)),
                }
            } else if policy.verbose_log {
                let ev = SyscallEvent::at_exit(&regs, duration);
                debug!(
                    pid = proc.pid.as_raw(),
                    result = ev.ret[0] as i64,
                    duration_us = ev.duration.map(|d| d.as_micros() as u64).unwrap_or(0),
                    "exit {}",
                    ev.display_name()
                );
            }
            return Ok(StopAction::Resume(0));
        }

        let ev = SyscallEvent::at_enter(&regs);
        let name = match ev.name {
            Some(name) => name,
            None => {
                // Suspicious: the stop may not belong to a real syscall.
                // Keep the tracee running either way.
                debug!(pid = pid.as_raw(), sysno = ev.sysno, "unknown syscall number");
                return Ok(StopAction::Resume(0));
            }
        };

        self.stats.record(name, enforcement::is_enforced());
        if policy.verbose_log {
            debug!(pid = pid.as_raw(), "enter {}", name);
        }

        if !enforcement::is_enforced() || policy.mode != ExecutionMode::Run {
            return Ok(StopAction::Resume(0));
        }

        let mem = PtraceMem::new(pid);
        let ctx = SyscallCtx {
            pid,
            args: ev.args,
            mem: &mem,
        };
        if gate::decide(policy, name, &ctx) {
            return Ok(StopAction::Resume(0));
        }

        warn!(pid = pid.as_raw(), "syscall not allowed: {}", name);
        match policy.denial_action {
            DenialAction::Kill => Ok(StopAction::Resume(libc::SIGKILL)),
            DenialAction::SimulateError => {
                // Invalidate the call so the kernel never runs it; the
                // matching exit-stop rewrites the result to EPERM.
                let mut rewritten = regs;
                rewritten.set_syscallno(INVALID_SYSCALL);
                match rewritten.flush(pid) {
                    Ok(()) => {}
                    Err(Errno::ESRCH) => return Ok(StopAction::Gone),
                    Err(e) => return Err(GatekeeperError::trace(pid, "ptrace(PTRACE_SETREGSET)", e)),
                }
                if let Some(proc) = self.processes.get_mut(&pid) {
                    proc.denied_at_enter = true;
                }
                Ok(StopAction::Resume(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_propagate() {
        assert_eq!(TraceeExit::Code(0).exit_code(), 0);
        assert_eq!(TraceeExit::Code(7).exit_code(), 7);
        assert_eq!(TraceeExit::Signal(libc::SIGKILL).exit_code(), 111);
    }

    #[test]
    fn adopted_children_start_at_exit() {
        let mut tracer = Tracer::new();
        let pid = Pid::from_raw(4242);
        tracer.adopt(pid, LastStop::Exit);
        assert_eq!(tracer.processes[&pid].last_stop, LastStop::Exit);
        assert!(!tracer.processes[&pid].denied_at_enter);
    }
}
