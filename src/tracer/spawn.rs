//! Launching the initial tracee.
//!
//! The child sets the trace-me flag and execs; the kernel then delivers a
//! SIGTRAP stop from inside the fresh task image. Once that stop is
//! collected the trace options are set and the child is resumed with a
//! syscall-restart, at which point the event loop owns it.

use crate::errors::{GatekeeperError, GkResult};
use crate::policy::{EnforcementTrigger, Policy};
use crate::signals;
use crate::stdout_scan;
use crate::tracer::resume;
use crate::wait_status::wait_for;
use nix::sys::ptrace;
use nix::unistd::{close, dup2, fork, ForkResult, Pid};
use std::ffi::CString;
use tracing::debug;

fn launch_err(what: &str, err: impl std::fmt::Display) -> GatekeeperError {
    GatekeeperError::Launch(format!("{}: {}", what, err))
}

pub fn spawn(policy: &Policy, target: &str, target_args: &[String]) -> GkResult<Pid> {
    let prog = CString::new(target).map_err(|e| launch_err("bad target name", e))?;
    let mut argv = vec![prog.clone()];
    for arg in target_args {
        argv.push(CString::new(arg.as_str()).map_err(|e| launch_err("bad target argument", e))?);
    }

    // The tracee's stdout and stderr are piped through the gatekeeper so the
    // log-match trigger can watch the output while still forwarding it.
    let (out_r, out_w) = nix::unistd::pipe().map_err(|e| launch_err("pipe", e))?;
    let (err_r, err_w) = nix::unistd::pipe().map_err(|e| launch_err("pipe", e))?;

    let child = match unsafe { fork() } {
        Err(e) => return Err(launch_err("fork", e)),
        Ok(ForkResult::Child) => {
            // Only async-signal-safe calls between fork and exec.
            let _ = dup2(out_w, libc::STDOUT_FILENO);
            let _ = dup2(err_w, libc::STDERR_FILENO);
            let _ = close(out_r);
            let _ = close(out_w);
            let _ = close(err_r);
            let _ = close(err_w);
            if ptrace::traceme().is_err() {
                unsafe { libc::_exit(126) };
            }
            let _ = nix::unistd::execvp(&prog, &argv);
            unsafe { libc::_exit(127) }
        }
        Ok(ForkResult::Parent { child }) => child,
    };

    let _ = close(out_w);
    let _ = close(err_w);

    match &policy.trigger {
        EnforcementTrigger::OnStdoutMatch(pattern) if !policy.enforce_on_startup => {
            stdout_scan::spawn_stdout_forwarder(out_r, Some(pattern.clone()));
        }
        _ => stdout_scan::spawn_stdout_forwarder(out_r, None),
    }
    stdout_scan::spawn_stderr_forwarder(err_r);

    // The first stop is NOT a syscall-exit of the execve: it is the SIGTRAP
    // delivered at the end of a successful exec, inside the new task image.
    let status = wait_for(child).map_err(|e| launch_err("initial wait", e))?;
    if status.exited() {
        return Err(GatekeeperError::Launch(match status.exit_status() {
            127 => format!("could not execute {}: no such file or directory", target),
            126 => format!("could not trace {}: PTRACE_TRACEME failed", target),
            code => format!("{} exited with status {} before it could be traced", target, code),
        }));
    }
    if !status.stopped() || status.stop_signal() != libc::SIGTRAP {
        return Err(GatekeeperError::Launch(format!(
            "unexpected initial stop for pid {} (stop signal {})",
            child,
            status.stop_signal()
        )));
    }

    ptrace::setoptions(
        child,
        ptrace::Options::PTRACE_O_TRACESYSGOOD
            | ptrace::Options::PTRACE_O_EXITKILL
            | ptrace::Options::PTRACE_O_TRACEEXEC
            | ptrace::Options::PTRACE_O_TRACECLONE
            | ptrace::Options::PTRACE_O_TRACEFORK
            | ptrace::Options::PTRACE_O_TRACEVFORK,
    )
    .map_err(|e| launch_err("ptrace(PTRACE_SETOPTIONS)", e))?;

    signals::set_tracee(child);

    resume(child, 0).map_err(|e| launch_err("failed to resume initial tracee", e))?;
    debug!(pid = child.as_raw(), program = target, "tracee launched");
    Ok(child)
}
