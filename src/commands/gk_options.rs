//! Command-line surface.
//!
//! ```text
//! gatekeeper <trace|run> [flags...] -- <target> [target-args...]
//! ```
//!
//! The `--allow-syscall-<name>` form embeds the syscall name in the flag
//! itself, which no derive can express, so the raw argument list is scanned
//! for those before the structured parse; the names are validated against
//! the host's syscall table on the spot.

use crate::errors::{GatekeeperError, GkResult};
use crate::kernel_metadata::is_known_syscall;
use crate::policy::PolicySources;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "gatekeeper",
    about = "Userspace syscall gatekeeper: trace a target process tree and permit, rewrite or kill its syscalls"
)]
pub struct GkOptions {
    #[structopt(subcommand)]
    pub cmd: GkSubCommand,
}

#[derive(StructOpt, Debug)]
pub enum GkSubCommand {
    /// Observe and count every syscall; never deny anything.
    #[structopt(name = "trace")]
    Trace {
        #[structopt(flatten)]
        permissions: PermissionArgs,
        /// Target program and its arguments, after `--`.
        #[structopt(last = true)]
        target: Vec<String>,
    },
    /// Enforce the configured policy on the target.
    #[structopt(name = "run")]
    Run {
        #[structopt(flatten)]
        permissions: PermissionArgs,
        /// Target program and its arguments, after `--`.
        #[structopt(last = true)]
        target: Vec<String>,
    },
}

impl GkSubCommand {
    pub fn permissions(&self) -> &PermissionArgs {
        match self {
            GkSubCommand::Trace { permissions, .. } => permissions,
            GkSubCommand::Run { permissions, .. } => permissions,
        }
    }
}

#[derive(StructOpt, Debug, Default)]
pub struct PermissionArgs {
    /// Allow read-only filesystem access (open O_RDONLY, read, stat, list).
    #[structopt(long)]
    pub allow_file_system_read: bool,

    /// Allow modifying the filesystem (create, write, rename, unlink, truncate).
    #[structopt(long)]
    pub allow_file_system_write: bool,

    /// Alias for --allow-file-system-write.
    #[structopt(long)]
    pub allow_file_system: bool,

    /// Allow changing file ownership and permissions (chmod/chown/fchmod/fchown*).
    #[structopt(long)]
    pub allow_file_system_permissions: bool,

    /// Whitelist a filesystem path prefix (repeatable).
    #[structopt(long, number_of_values = 1)]
    pub allow_file_system_path: Vec<String>,

    /// Allow outbound network connections (socket/connect/send/recv).
    #[structopt(long)]
    pub allow_network_client: bool,

    /// Allow listening sockets and incoming connections (socket/bind/listen/accept).
    #[structopt(long)]
    pub allow_network_server: bool,

    /// Allow local-only sockets (AF_UNIX, AF_NETLINK).
    #[structopt(long)]
    pub allow_network_local_sockets: bool,

    /// Allow both client and server networking.
    #[structopt(long)]
    pub allow_networking: bool,

    /// Allow process/thread creation and lifecycle control (exec/fork/clone/wait).
    #[structopt(long)]
    pub allow_process_management: bool,

    /// Allow memory mapping and related syscalls (mmap/mprotect/mremap/brk).
    #[structopt(long)]
    pub allow_memory_management: bool,

    /// Allow setting and handling POSIX signals (rt_sig*, sigaltstack).
    #[structopt(long)]
    pub allow_signals: bool,

    /// Allow timers and clock syscalls (clock_gettime, timerfd_*, nanosleep).
    #[structopt(long)]
    pub allow_timers_and_clocks_management: bool,

    /// Allow identity/capability changes and seccomp (setuid/setgid/capset/seccomp).
    #[structopt(long)]
    pub allow_security_and_permissions: bool,

    /// Allow system information and rlimit operations (uname/sysinfo/getrlimit).
    #[structopt(long)]
    pub allow_system_information: bool,

    /// Allow IPC mechanisms (SysV shm/sem/msg, POSIX mqueue, pipes).
    #[structopt(long)]
    pub allow_process_communication: bool,

    /// Allow synchronization primitives (futex/flock/robust list).
    #[structopt(long)]
    pub allow_process_synchronization: bool,

    /// Allow miscellaneous syscalls (includes ioctl, splice, vmsplice).
    #[structopt(long)]
    pub allow_misc: bool,

    /// Allow a single syscall by name (repeatable). The
    /// --allow-syscall-<name> spelling is also accepted.
    #[structopt(long, number_of_values = 1)]
    pub allow_syscall: Vec<String>,

    /// Start with enforcement enabled (the default).
    #[structopt(long, conflicts_with = "no-enforce-on-startup")]
    pub enforce_on_startup: bool,

    /// Start with enforcement disabled; combine with a trigger flag.
    #[structopt(long)]
    pub no_enforce_on_startup: bool,

    /// Disable the baseline process/memory/sync/signals/misc/security/sysinfo
    /// permissions.
    #[structopt(long)]
    pub no_implicit_allow: bool,

    /// Enable enforcement when the target's stdout contains this string.
    #[structopt(long)]
    pub trigger_enforce_on_log_match: Option<String>,

    /// Enable enforcement upon receiving this signal (name or number).
    #[structopt(long)]
    pub trigger_enforce_on_signal: Option<String>,

    /// Action when a syscall is denied: 'kill' or 'error'.
    #[structopt(long)]
    pub on_syscall_denied: Option<String>,

    /// Verbose decision logging from the tracer.
    #[structopt(long)]
    pub verbose: bool,
}

impl PermissionArgs {
    pub fn to_sources(&self, dynamic_syscalls: Vec<String>) -> PolicySources {
        let mut allow_syscalls = self.allow_syscall.clone();
        allow_syscalls.extend(dynamic_syscalls);
        PolicySources {
            allow_file_system_read: self.allow_file_system_read,
            allow_file_system_write: self.allow_file_system_write,
            allow_file_system: self.allow_file_system,
            allow_file_system_permissions: self.allow_file_system_permissions,
            allow_file_system_paths: self.allow_file_system_path.clone(),
            allow_network_client: self.allow_network_client,
            allow_network_server: self.allow_network_server,
            allow_network_local_sockets: self.allow_network_local_sockets,
            allow_networking: self.allow_networking,
            allow_process_management: self.allow_process_management,
            allow_memory_management: self.allow_memory_management,
            allow_signals: self.allow_signals,
            allow_timers_and_clocks: self.allow_timers_and_clocks_management,
            allow_security_and_permissions: self.allow_security_and_permissions,
            allow_system_information: self.allow_system_information,
            allow_process_communication: self.allow_process_communication,
            allow_process_synchronization: self.allow_process_synchronization,
            allow_misc: self.allow_misc,
            allow_syscalls,
            no_implicit_allow: self.no_implicit_allow,
            enforce_on_startup: if self.no_enforce_on_startup {
                Some(false)
            } else if self.enforce_on_startup {
                Some(true)
            } else {
                None
            },
            trigger_enforce_on_log_match: self.trigger_enforce_on_log_match.clone(),
            trigger_enforce_on_signal: self.trigger_enforce_on_signal.clone(),
            on_syscall_denied: self.on_syscall_denied.clone(),
            verbose: self.verbose,
        }
    }
}

/// Scan the raw arguments for `--allow-syscall-<name>` flags, validate the
/// names against the host table, and return the remaining arguments plus
/// the collected names.
pub fn prescan_dynamic_syscalls<I>(raw: I) -> GkResult<(Vec<String>, Vec<String>)>
where
    I: IntoIterator<Item = String>,
{
    let mut filtered = Vec::new();
    let mut dynamic = Vec::new();
    for arg in raw {
        if let Some(rest) = arg.strip_prefix("--allow-syscall-") {
            let name = rest.split('=').next().unwrap_or("");
            if name.is_empty() || !is_known_syscall(name) {
                return Err(GatekeeperError::Config(format!(
                    "--allow-syscall-{}: unknown syscall name",
                    rest
                )));
            }
            dynamic.push(name.to_string());
            continue;
        }
        filtered.push(arg);
    }
    Ok((filtered, dynamic))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GkOptions {
        GkOptions::from_iter_safe(args.iter().copied()).unwrap()
    }

    #[test]
    fn parses_run_mode_with_permissions_and_target() {
        let opts = parse(&[
            "gatekeeper",
            "run",
            "--allow-file-system-read",
            "--allow-file-system-path",
            "/etc",
            "--allow-file-system-path=/var",
            "--",
            "cat",
            "/etc/resolv.conf",
        ]);
        match opts.cmd {
            GkSubCommand::Run {
                permissions,
                target,
            } => {
                assert!(permissions.allow_file_system_read);
                assert_eq!(permissions.allow_file_system_path, vec!["/etc", "/var"]);
                assert_eq!(target, vec!["cat", "/etc/resolv.conf"]);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn parses_trace_mode() {
        let opts = parse(&["gatekeeper", "trace", "--", "/bin/ls"]);
        match opts.cmd {
            GkSubCommand::Trace { target, .. } => assert_eq!(target, vec!["/bin/ls"]),
            _ => panic!("expected trace subcommand"),
        }
    }

    #[test]
    fn enforce_flags_conflict() {
        let r = GkOptions::from_iter_safe(
            [
                "gatekeeper",
                "run",
                "--enforce-on-startup",
                "--no-enforce-on-startup",
                "--",
                "true",
            ]
            .iter()
            .copied(),
        );
        assert!(r.is_err());
    }

    #[test]
    fn prescan_collects_and_validates_dynamic_flags() {
        let raw = vec![
            "gatekeeper".to_string(),
            "run".to_string(),
            "--allow-syscall-getpid".to_string(),
            "--verbose".to_string(),
        ];
        let (filtered, dynamic) = prescan_dynamic_syscalls(raw).unwrap();
        assert_eq!(filtered, vec!["gatekeeper", "run", "--verbose"]);
        assert_eq!(dynamic, vec!["getpid"]);
    }

    #[test]
    fn prescan_rejects_unknown_names() {
        let raw = vec!["gatekeeper".to_string(), "--allow-syscall-frobnicate".to_string()];
        let err = prescan_dynamic_syscalls(raw).unwrap_err();
        assert_eq!(err.exit_code(), 100);
    }

    #[test]
    fn equals_form_goes_through_the_regular_flag() {
        let opts = parse(&["gatekeeper", "run", "--allow-syscall=getpid", "--", "true"]);
        match opts.cmd {
            GkSubCommand::Run { permissions, .. } => {
                assert_eq!(permissions.allow_syscall, vec!["getpid"]);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn sources_merge_dynamic_syscalls() {
        let opts = parse(&["gatekeeper", "run", "--allow-syscall=getpid", "--", "true"]);
        let sources = opts.cmd.permissions().to_sources(vec!["gettid".to_string()]);
        assert_eq!(sources.allow_syscalls, vec!["getpid", "gettid"]);
    }

    #[test]
    fn no_enforce_on_startup_maps_to_sources() {
        let opts = parse(&["gatekeeper", "run", "--no-enforce-on-startup", "--", "true"]);
        assert_eq!(
            opts.cmd.permissions().to_sources(Vec::new()).enforce_on_startup,
            Some(false)
        );
    }
}
