//! A thin wrapper over the raw wait status word.
//!
//! nix's `WaitStatus` refuses statuses carrying realtime signals, and the
//! tracer must pass those through to the tracee untouched, so the loop
//! decodes the raw value itself.

use nix::errno::Errno;
use nix::unistd::Pid;

/// With PTRACE_O_TRACESYSGOOD the stop signal for syscall-stops is
/// SIGTRAP with bit 7 set, which distinguishes them from SIGTRAPs sent by
/// tkill(2) or breakpoints.
pub const TRAP_SYSGOOD: i32 = libc::SIGTRAP | 0x80;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WaitStatus {
    status: i32,
}

impl WaitStatus {
    pub fn new(status: i32) -> WaitStatus {
        WaitStatus { status }
    }

    pub fn exited(&self) -> bool {
        libc::WIFEXITED(self.status)
    }

    pub fn exit_status(&self) -> i32 {
        libc::WEXITSTATUS(self.status)
    }

    pub fn signaled(&self) -> bool {
        libc::WIFSIGNALED(self.status)
    }

    pub fn term_signal(&self) -> i32 {
        libc::WTERMSIG(self.status)
    }

    pub fn stopped(&self) -> bool {
        libc::WIFSTOPPED(self.status)
    }

    pub fn stop_signal(&self) -> i32 {
        libc::WSTOPSIG(self.status)
    }

    pub fn is_syscall_stop(&self) -> bool {
        self.stopped() && self.stop_signal() == TRAP_SYSGOOD
    }

    /// The PTRACE_EVENT_* number riding in bits 16..24, or 0.
    pub fn ptrace_event(&self) -> i32 {
        (self.status >> 16) & 0xff
    }
}

/// Block until any descendant changes state (`waitpid(-1, __WALL)`).
pub fn wait_any() -> Result<(Pid, WaitStatus), Errno> {
    let mut status: i32 = 0;
    let pid = unsafe { libc::waitpid(-1, &mut status, libc::__WALL) };
    if pid < 0 {
        Err(Errno::last())
    } else {
        Ok((Pid::from_raw(pid), WaitStatus::new(status)))
    }
}

/// Wait for one specific pid; used by the launcher for the post-exec stop.
pub fn wait_for(pid: Pid) -> Result<WaitStatus, Errno> {
    let mut status: i32 = 0;
    let rc = unsafe { libc::waitpid(pid.as_raw(), &mut status, libc::__WALL) };
    if rc < 0 {
        Err(Errno::last())
    } else {
        Ok(WaitStatus::new(status))
    }
}
