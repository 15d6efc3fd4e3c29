//! Error types used across the gatekeeper.
//!
//! Only structural failures leave the tracer: configuration problems,
//! launch problems, and ptrace plumbing failures. Policy violations are
//! normal decisions and never surface here.

use nix::errno::Errno;
use thiserror::Error;

pub type GkResult<T> = Result<T, GatekeeperError>;

#[derive(Debug, Error)]
pub enum GatekeeperError {
    /// Bad flag, empty target, conflicting trigger flags, malformed
    /// environment values.
    #[error("configuration error: {0}")]
    Config(String),

    /// The initial tracee could not be started: fork failure, exec failure,
    /// initial wait failure or option-set failure.
    #[error("launch error: {0}")]
    Launch(String),

    /// A ptrace operation on a live tracee failed. ESRCH is handled in
    /// place by the event loop and never reaches this variant.
    #[error("trace error on pid {pid}: {op} failed: {errno}")]
    Trace {
        pid: i32,
        op: &'static str,
        errno: Errno,
    },
}

impl GatekeeperError {
    pub fn trace(pid: nix::unistd::Pid, op: &'static str, errno: Errno) -> GatekeeperError {
        GatekeeperError::Trace {
            pid: pid.as_raw(),
            op,
            errno,
        }
    }

    /// Exit-code contract: 100 for configuration, 2 for launch, 3 for a
    /// fatal event-loop error.
    pub fn exit_code(&self) -> i32 {
        match self {
            GatekeeperError::Config(_) => 100,
            GatekeeperError::Launch(_) => 2,
            GatekeeperError::Trace { .. } => 3,
        }
    }
}
