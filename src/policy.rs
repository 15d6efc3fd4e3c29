//! The process-wide policy record.
//!
//! The policy is assembled exactly once at startup from the command line and
//! the `GATEKEEPER_*` environment (flags win), then installed and frozen.
//! The event loop and the predicates only ever see it as a shared borrow;
//! nothing is synchronized because nothing is ever written after install.

use crate::errors::{GatekeeperError, GkResult};
use crate::kernel_metadata;
use crate::syscall_catalog::{build_allow_map, AllowListBuilder};
use nix::sys::signal::Signal;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const ENV_PREFIX: &str = "GATEKEEPER_";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExecutionMode {
    /// Observe and count syscalls; never deny.
    Trace,
    /// Enforce the policy.
    Run,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DenialAction {
    /// SIGKILL the offending process.
    Kill,
    /// Rewrite the syscall so it fails with EPERM without reaching the
    /// kernel.
    SimulateError,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnforcementTrigger {
    AtStartup,
    OnStdoutMatch(String),
    OnSignal(Signal),
}

#[derive(Debug)]
pub struct Policy {
    pub allow_map: HashMap<&'static str, bool>,
    pub fs_allow_read: bool,
    pub fs_allow_write: bool,
    pub net_allow_client: bool,
    pub net_allow_server: bool,
    pub local_sockets_allow: bool,
    pub verbose_log: bool,
    pub enforce_on_startup: bool,
    pub fs_allowed_paths: Vec<PathBuf>,
    pub denial_action: DenialAction,
    pub trigger: EnforcementTrigger,
    pub mode: ExecutionMode,
    pub server_enabled: bool,
    pub server_port: u16,
}

static POLICY: OnceLock<Policy> = OnceLock::new();

impl Policy {
    /// Pure allow-map lookup; unknown names are denied.
    pub fn allows(&self, name: &str) -> bool {
        *self.allow_map.get(name).unwrap_or(&false)
    }

    pub fn any_socket_capability(&self) -> bool {
        self.net_allow_client || self.net_allow_server || self.local_sockets_allow
    }

    pub fn install(policy: Policy) -> &'static Policy {
        if POLICY.set(policy).is_err() {
            panic!("policy installed twice");
        }
        Policy::get()
    }

    pub fn get() -> &'static Policy {
        POLICY.get().expect("policy must be installed before use")
    }
}

/// Everything the flag parser hands over; plain data so this module does not
/// depend on the CLI derive types.
#[derive(Default, Clone)]
pub struct PolicySources {
    pub allow_file_system_read: bool,
    pub allow_file_system_write: bool,
    pub allow_file_system: bool,
    pub allow_file_system_permissions: bool,
    pub allow_file_system_paths: Vec<String>,
    pub allow_network_client: bool,
    pub allow_network_server: bool,
    pub allow_network_local_sockets: bool,
    pub allow_networking: bool,
    pub allow_process_management: bool,
    pub allow_memory_management: bool,
    pub allow_signals: bool,
    pub allow_timers_and_clocks: bool,
    pub allow_security_and_permissions: bool,
    pub allow_system_information: bool,
    pub allow_process_communication: bool,
    pub allow_process_synchronization: bool,
    pub allow_misc: bool,
    pub allow_syscalls: Vec<String>,
    pub no_implicit_allow: bool,
    pub enforce_on_startup: Option<bool>,
    pub trigger_enforce_on_log_match: Option<String>,
    pub trigger_enforce_on_signal: Option<String>,
    pub on_syscall_denied: Option<String>,
    pub verbose: bool,
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(name: &str) -> GkResult<Option<bool>> {
    match env_var(name) {
        None => Ok(None),
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| GatekeeperError::Config(format!("{}{}: not a boolean: {:?}", ENV_PREFIX, name, raw))),
    }
}

fn env_list(name: &str) -> Vec<String> {
    env_var(name)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_denial_action(value: &str) -> GkResult<DenialAction> {
    match value {
        "kill" => Ok(DenialAction::Kill),
        "error" => Ok(DenialAction::SimulateError),
        other => Err(GatekeeperError::Config(format!(
            "invalid value for on-syscall-denied: {}. Must be 'kill' or 'error'",
            other
        ))),
    }
}

/// Accept a signal by name ("SIGUSR1" or "USR1") or by number ("10").
pub(crate) fn parse_signal(value: &str) -> GkResult<Signal> {
    if let Ok(n) = value.parse::<i32>() {
        return Signal::try_from(n)
            .map_err(|_| GatekeeperError::Config(format!("unknown signal number: {}", n)));
    }
    let mut name = value.to_ascii_uppercase();
    if !name.starts_with("SIG") {
        name = format!("SIG{}", name);
    }
    name.parse::<Signal>()
        .map_err(|_| GatekeeperError::Config(format!("unknown signal name: {}", value)))
}

fn absolutize(raw: &str) -> GkResult<PathBuf> {
    use crate::gate::path::clean_path;
    let p = PathBuf::from(raw);
    let abs = if p.is_absolute() {
        p
    } else {
        let cwd = env::current_dir()
            .map_err(|e| GatekeeperError::Config(format!("cannot resolve working directory: {}", e)))?;
        cwd.join(p)
    };
    Ok(clean_path(&abs))
}

impl Policy {
    /// Merge flags over the environment, validate, and derive the allow-map.
    /// No partial state is ever observable: either a complete `Policy` comes
    /// back or the process aborts with a configuration diagnostic.
    pub fn from_sources(mode: ExecutionMode, src: &PolicySources) -> GkResult<Policy> {
        let fs_write_env = env_bool("ALLOW_FILE_SYSTEM_WRITE")?.unwrap_or(false)
            || env_bool("ALLOW_FILE_SYSTEM")?.unwrap_or(false);
        let fs_allow_read = src.allow_file_system_read || env_bool("ALLOW_FILE_SYSTEM_READ")?.unwrap_or(false);
        // --allow-file-system is an alias for write access.
        let fs_allow_write = src.allow_file_system_write || src.allow_file_system || fs_write_env;
        let fs_permissions =
            src.allow_file_system_permissions || env_bool("ALLOW_FILE_SYSTEM_PERMISSIONS")?.unwrap_or(false);

        let networking = src.allow_networking || env_bool("ALLOW_NETWORKING")?.unwrap_or(false);
        let net_allow_client =
            src.allow_network_client || networking || env_bool("ALLOW_NETWORK_CLIENT")?.unwrap_or(false);
        let net_allow_server =
            src.allow_network_server || networking || env_bool("ALLOW_NETWORK_SERVER")?.unwrap_or(false);
        let local_sockets_allow =
            src.allow_network_local_sockets || env_bool("ALLOW_NETWORK_LOCAL_SOCKETS")?.unwrap_or(false);

        let process_management =
            src.allow_process_management || env_bool("ALLOW_PROCESS_MANAGEMENT")?.unwrap_or(false);
        let memory_management =
            src.allow_memory_management || env_bool("ALLOW_MEMORY_MANAGEMENT")?.unwrap_or(false);
        let signals = src.allow_signals || env_bool("ALLOW_SIGNALS")?.unwrap_or(false);
        let timers =
            src.allow_timers_and_clocks || env_bool("ALLOW_TIMERS_AND_CLOCKS_MANAGEMENT")?.unwrap_or(false);
        let security = src.allow_security_and_permissions
            || env_bool("ALLOW_SECURITY_AND_PERMISSIONS")?.unwrap_or(false);
        let sysinfo =
            src.allow_system_information || env_bool("ALLOW_SYSTEM_INFORMATION")?.unwrap_or(false);
        let ipc = src.allow_process_communication
            || env_bool("ALLOW_PROCESS_COMMUNICATION")?.unwrap_or(false);
        let sync = src.allow_process_synchronization
            || env_bool("ALLOW_PROCESS_SYNCHRONIZATION")?.unwrap_or(false);
        let misc = src.allow_misc || env_bool("ALLOW_MISC")?.unwrap_or(false);

        let no_implicit_allow = src.no_implicit_allow || env_bool("NO_IMPLICIT_ALLOW")?.unwrap_or(false);
        let verbose = src.verbose || env_bool("VERBOSE")?.unwrap_or(false);

        let enforce_on_startup = match src.enforce_on_startup {
            Some(v) => v,
            None => env_bool("ENFORCE_ON_STARTUP")?.unwrap_or(true),
        };

        let log_match = src
            .trigger_enforce_on_log_match
            .clone()
            .or_else(|| env_var("TRIGGER_ENFORCE_ON_LOG_MATCH"));
        let signal_trigger = src
            .trigger_enforce_on_signal
            .clone()
            .or_else(|| env_var("TRIGGER_ENFORCE_ON_SIGNAL"));

        let trigger = match (log_match, signal_trigger) {
            (Some(_), Some(_)) => {
                return Err(GatekeeperError::Config(
                    "at most one of --trigger-enforce-on-log-match and --trigger-enforce-on-signal may be given"
                        .into(),
                ))
            }
            (Some(pattern), None) => {
                if pattern.is_empty() {
                    return Err(GatekeeperError::Config(
                        "--trigger-enforce-on-log-match requires a non-empty pattern".into(),
                    ));
                }
                EnforcementTrigger::OnStdoutMatch(pattern)
            }
            (None, Some(sig)) => EnforcementTrigger::OnSignal(parse_signal(&sig)?),
            (None, None) => EnforcementTrigger::AtStartup,
        };

        if trigger != EnforcementTrigger::AtStartup && enforce_on_startup {
            return Err(GatekeeperError::Config(
                "a deferred enforcement trigger conflicts with --enforce-on-startup; pass --no-enforce-on-startup"
                    .into(),
            ));
        }

        let denial_action = match src
            .on_syscall_denied
            .clone()
            .or_else(|| env_var("ON_SYSCALL_DENIED"))
        {
            Some(v) => parse_denial_action(&v)?,
            None => DenialAction::Kill,
        };

        let mut allow = AllowListBuilder::new();
        if !no_implicit_allow {
            allow.allow_baseline();
        }
        if fs_allow_read {
            allow.allow_file_system_read();
        }
        if fs_allow_write {
            allow.allow_file_system_write();
        }
        if fs_permissions {
            allow.allow_file_permissions();
        }
        if net_allow_client {
            allow.allow_network_client();
        }
        if net_allow_server {
            allow.allow_network_server();
        }
        if local_sockets_allow {
            allow.allow_local_sockets();
        }
        if process_management {
            allow.allow_process_management();
        }
        if memory_management {
            allow.allow_memory_management();
        }
        if signals {
            allow.allow_signals();
        }
        if timers {
            allow.allow_timers_and_clocks();
        }
        if security {
            allow.allow_security_and_permissions();
        }
        if sysinfo {
            allow.allow_system_information();
        }
        if ipc {
            allow.allow_process_communication();
        }
        if sync {
            allow.allow_process_synchronization();
        }
        if misc {
            allow.allow_misc();
        }

        let mut explicit = src.allow_syscalls.clone();
        explicit.extend(env_list("SYSCALLS_ALLOW_LIST"));
        for name in &explicit {
            match kernel_metadata::canonical_name(name) {
                Some(interned) => allow.allow_syscall(interned),
                None => {
                    return Err(GatekeeperError::Config(format!(
                        "--allow-syscall: unknown syscall name: {}",
                        name
                    )))
                }
            }
        }

        let mut fs_allowed_paths = Vec::new();
        let mut raw_paths = src.allow_file_system_paths.clone();
        raw_paths.extend(env_list("ALLOW_FILE_SYSTEM_PATHS"));
        for raw in &raw_paths {
            fs_allowed_paths.push(absolutize(raw)?);
        }

        let server_enabled = env_bool("SERVER_ENABLED")?.unwrap_or(true);
        let server_port = match env_var("SERVER_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                GatekeeperError::Config(format!("{}SERVER_PORT: not a port number: {:?}", ENV_PREFIX, raw))
            })?,
            None => 8081,
        };

        Ok(Policy {
            allow_map: build_allow_map(&allow),
            fs_allow_read,
            fs_allow_write,
            net_allow_client,
            net_allow_server,
            local_sockets_allow,
            verbose_log: verbose,
            enforce_on_startup,
            fs_allowed_paths,
            denial_action,
            trigger,
            mode,
            server_enabled,
            server_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_on_by_default() {
        let p = Policy::from_sources(ExecutionMode::Run, &PolicySources::default()).unwrap();
        assert!(p.allows("futex"));
        assert!(p.allows("mmap"));
        assert!(!p.allows("openat"));
        assert!(!p.allows("connect"));
    }

    #[test]
    fn no_implicit_allow_leaves_only_explicit_buckets() {
        let src = PolicySources {
            no_implicit_allow: true,
            allow_process_synchronization: true,
            ..Default::default()
        };
        let p = Policy::from_sources(ExecutionMode::Run, &src).unwrap();
        assert!(p.allows("futex"));
        assert!(!p.allows("mmap"));
        assert!(!p.allows("exit_group"));
    }

    #[test]
    fn file_system_flag_is_a_write_alias() {
        let src = PolicySources {
            allow_file_system: true,
            ..Default::default()
        };
        let p = Policy::from_sources(ExecutionMode::Run, &src).unwrap();
        assert!(p.fs_allow_write);
        assert!(!p.fs_allow_read);
        assert!(p.allows("write"));
        assert!(p.allows("openat"));
    }

    #[test]
    fn networking_enables_both_directions() {
        let src = PolicySources {
            allow_networking: true,
            ..Default::default()
        };
        let p = Policy::from_sources(ExecutionMode::Run, &src).unwrap();
        assert!(p.net_allow_client);
        assert!(p.net_allow_server);
        assert!(p.allows("bind"));
        assert!(p.allows("connect"));
    }

    #[test]
    fn explicit_syscall_allows_are_validated() {
        let src = PolicySources {
            allow_syscalls: vec!["made_up_syscall".into()],
            ..Default::default()
        };
        let err = Policy::from_sources(ExecutionMode::Run, &src).unwrap_err();
        assert_eq!(err.exit_code(), 100);
    }

    #[test]
    fn conflicting_triggers_are_rejected() {
        let src = PolicySources {
            enforce_on_startup: Some(false),
            trigger_enforce_on_log_match: Some("ready".into()),
            trigger_enforce_on_signal: Some("SIGUSR1".into()),
            ..Default::default()
        };
        assert!(Policy::from_sources(ExecutionMode::Run, &src).is_err());
    }

    #[test]
    fn deferred_trigger_requires_no_enforce_on_startup() {
        let src = PolicySources {
            trigger_enforce_on_log_match: Some("ready".into()),
            ..Default::default()
        };
        assert!(Policy::from_sources(ExecutionMode::Run, &src).is_err());

        let src = PolicySources {
            enforce_on_startup: Some(false),
            trigger_enforce_on_log_match: Some("ready".into()),
            ..Default::default()
        };
        let p = Policy::from_sources(ExecutionMode::Run, &src).unwrap();
        assert_eq!(p.trigger, EnforcementTrigger::OnStdoutMatch("ready".into()));
    }

    #[test]
    fn signal_trigger_parses_names_and_numbers() {
        assert_eq!(parse_signal("SIGUSR1").unwrap(), Signal::SIGUSR1);
        assert_eq!(parse_signal("usr2").unwrap(), Signal::SIGUSR2);
        assert_eq!(parse_signal("10").unwrap(), Signal::SIGUSR1);
        assert!(parse_signal("SIGNOPE").is_err());
    }

    #[test]
    fn denial_action_parses() {
        assert_eq!(parse_denial_action("kill").unwrap(), DenialAction::Kill);
        assert_eq!(parse_denial_action("error").unwrap(), DenialAction::SimulateError);
        assert!(parse_denial_action("maim").is_err());
    }

    #[test]
    fn allowed_paths_are_cleaned_and_absolute() {
        let src = PolicySources {
            allow_file_system_paths: vec!["/etc/../tmp/./data".into()],
            ..Default::default()
        };
        let p = Policy::from_sources(ExecutionMode::Run, &src).unwrap();
        assert_eq!(p.fs_allowed_paths, vec![PathBuf::from("/tmp/data")]);
    }

}
