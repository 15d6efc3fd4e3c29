//! Per-syscall gating decisions.
//!
//! Every gated syscall gets one decision function; everything else is a pure
//! allow-map lookup by name. The decision functions see a small context:
//! the tracee pid, the six-argument vector, and a capability for reading the
//! tracee's memory. They are synchronous, brief, and run on the tracer
//! thread while the tracee is stopped at a syscall-enter.

pub mod fd;
pub mod fs;
pub mod io;
pub mod net;
pub mod path;

use crate::policy::Policy;
use crate::remote_mem::TraceeMem;
use crate::remote_ptr::RemotePtr;
use nix::unistd::Pid;

pub struct SyscallCtx<'a> {
    pub pid: Pid,
    pub args: [u64; 6],
    pub mem: &'a dyn TraceeMem,
}

impl<'a> SyscallCtx<'a> {
    pub fn arg(&self, index: usize) -> u64 {
        self.args[index]
    }

    pub fn arg_i32(&self, index: usize) -> i32 {
        self.args[index] as i32
    }

    pub fn arg_ptr<T>(&self, index: usize) -> RemotePtr<T> {
        RemotePtr::new(self.args[index])
    }
}

/// Decide whether the named syscall may proceed. Called at syscall-enter
/// only; the policy is the frozen process-wide record.
pub fn decide(policy: &Policy, name: &str, ctx: &SyscallCtx) -> bool {
    match name {
        "open" => fs::open_allowed(policy, ctx),
        "openat" => fs::openat_allowed(policy, ctx),
        "openat2" => fs::openat2_allowed(policy, ctx),

        "access" => fs::access_allowed(policy, ctx),
        "faccessat" | "faccessat2" => fs::faccessat_allowed(policy, ctx),

        "rename" | "link" => fs::write_paths_allowed(policy, ctx, &[(0, None), (1, None)]),
        "renameat" | "renameat2" => {
            fs::write_paths_allowed(policy, ctx, &[(1, Some(0)), (3, Some(2))])
        }
        "linkat" => fs::write_paths_allowed(policy, ctx, &[(1, Some(0)), (3, Some(2))]),
        "symlink" => fs::write_paths_allowed(policy, ctx, &[(1, None)]),
        "symlinkat" => fs::write_paths_allowed(policy, ctx, &[(2, Some(1))]),
        "mkdir" | "rmdir" | "unlink" => fs::write_paths_allowed(policy, ctx, &[(0, None)]),
        "mkdirat" | "unlinkat" => fs::write_paths_allowed(policy, ctx, &[(1, Some(0))]),

        "socket" => net::socket_allowed(policy, ctx),
        "connect" => net::connect_allowed(policy, ctx),
        "shutdown" => net::shutdown_allowed(policy, ctx),

        "read" | "readv" | "recv" | "recvfrom" | "recvmsg" | "recvmmsg" => {
            io::read_allowed(policy, name, ctx)
        }
        "write" | "writev" | "send" | "sendto" | "sendmsg" | "sendmmsg" => {
            io::write_allowed(policy, name, ctx)
        }

        "close" => true,

        _ => policy.allows(name),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::policy::{DenialAction, EnforcementTrigger, ExecutionMode};
    use std::collections::HashMap;

    /// A deny-everything policy with an empty whitelist; tests flip the
    /// fields they care about.
    pub fn policy() -> Policy {
        Policy {
            allow_map: HashMap::new(),
            fs_allow_read: false,
            fs_allow_write: false,
            net_allow_client: false,
            net_allow_server: false,
            local_sockets_allow: false,
            verbose_log: false,
            enforce_on_startup: true,
            fs_allowed_paths: Vec::new(),
            denial_action: DenialAction::Kill,
            trigger: EnforcementTrigger::AtStartup,
            mode: ExecutionMode::Run,
            server_enabled: false,
            server_port: 8081,
        }
    }

    pub fn ctx<'a>(mem: &'a dyn crate::remote_mem::TraceeMem, args: [u64; 6]) -> SyscallCtx<'a> {
        SyscallCtx {
            pid: nix::unistd::getpid(),
            args,
            mem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ctx, policy};
    use super::*;
    use crate::remote_mem::testing::FakeMem;

    #[test]
    fn close_is_always_allowed() {
        let mem = FakeMem::new();
        let p = policy();
        assert!(decide(&p, "close", &ctx(&mem, [0; 6])));
    }

    #[test]
    fn ungated_syscalls_use_the_allow_map() {
        let mem = FakeMem::new();
        let mut p = policy();
        assert!(!decide(&p, "futex", &ctx(&mem, [0; 6])));
        p.allow_map.insert("futex", true);
        assert!(decide(&p, "futex", &ctx(&mem, [0; 6])));
    }

    #[test]
    fn unknown_names_are_denied() {
        let mem = FakeMem::new();
        let p = policy();
        assert!(!decide(&p, "completely_made_up", &ctx(&mem, [0; 6])));
    }
}
