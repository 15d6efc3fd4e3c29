//! Signal plumbing: the outer shutdown path and the on-signal enforcement
//! trigger.
//!
//! Handlers run on whatever thread the kernel picks, so they are limited to
//! async-signal-safe work: storing atomics and forwarding signals. The
//! one-second grace period before a forced kill is driven by a watchdog
//! thread, not by the handler itself.

use crate::enforcement;
use crate::errors::{GatekeeperError, GkResult};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;
use std::time::Duration;

static TRACEE_PID: AtomicI32 = AtomicI32::new(0);
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn set_tracee(pid: Pid) {
    TRACEE_PID.store(pid.as_raw(), Ordering::SeqCst);
}

fn tracee() -> Option<Pid> {
    match TRACEE_PID.load(Ordering::SeqCst) {
        0 => None,
        raw => Some(Pid::from_raw(raw)),
    }
}

extern "C" fn handle_shutdown(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    let pid = TRACEE_PID.load(Ordering::SeqCst);
    if pid > 0 {
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
    }
}

extern "C" fn handle_enforce(_sig: libc::c_int) {
    enforcement::enforce_now();
}

fn install(signal: Signal, handler: extern "C" fn(libc::c_int)) -> GkResult<()> {
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::SA_RESTART, SigSet::empty());
    unsafe { sigaction(signal, &action) }
        .map(|_| ())
        .map_err(|e| GatekeeperError::Launch(format!("sigaction({:?}): {}", signal, e)))
}

/// SIGINT/SIGTERM forward a SIGTERM to the tracee; the event loop then
/// observes the exits and terminates naturally. If the tracee has not gone
/// away after one second, the watchdog forces it with SIGKILL.
pub fn install_shutdown_handler() -> GkResult<()> {
    install(Signal::SIGINT, handle_shutdown)?;
    install(Signal::SIGTERM, handle_shutdown)?;

    thread::Builder::new()
        .name("gk-watchdog".into())
        .spawn(|| loop {
            thread::sleep(Duration::from_millis(100));
            if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_secs(1));
                if let Some(pid) = tracee() {
                    let _ = nix::sys::signal::kill(pid, Signal::SIGKILL);
                }
                return;
            }
        })
        .map_err(|e| GatekeeperError::Launch(format!("unable to spawn watchdog thread: {}", e)))?;
    Ok(())
}

/// Arm the deferred-enforcement trigger: receiving `signal` flips the
/// global enforcement bit.
pub fn install_enforce_trigger(signal: Signal) -> GkResult<()> {
    install(signal, handle_enforce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforce_trigger_flips_the_bit_on_signal() {
        install_enforce_trigger(Signal::SIGUSR1).unwrap();
        nix::sys::signal::raise(Signal::SIGUSR1).unwrap();
        assert!(enforcement::is_enforced());
    }
}
