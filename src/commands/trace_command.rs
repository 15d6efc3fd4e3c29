use crate::commands::gk_options::{GkOptions, GkSubCommand};
use crate::commands::{execute, GkCommand};
use crate::errors::{GatekeeperError, GkResult};
use crate::policy::{ExecutionMode, Policy, PolicySources};
use crate::tracer::TraceeExit;

pub struct TraceCommand {
    sources: PolicySources,
    target: Vec<String>,
}

impl TraceCommand {
    pub fn new(options: &GkOptions, dynamic_syscalls: Vec<String>) -> TraceCommand {
        match &options.cmd {
            GkSubCommand::Trace {
                permissions,
                target,
            } => TraceCommand {
                sources: permissions.to_sources(dynamic_syscalls),
                target: target.clone(),
            },
            _ => panic!("Unexpected GkSubCommand variant. Not a `Trace` variant!"),
        }
    }
}

impl GkCommand for TraceCommand {
    fn run(&mut self) -> GkResult<TraceeExit> {
        if self.target.is_empty() {
            return Err(GatekeeperError::Config(
                "no target program given; usage: gatekeeper trace [flags...] -- <target> [args...]".into(),
            ));
        }
        let policy = Policy::install(Policy::from_sources(ExecutionMode::Trace, &self.sources)?);
        execute(policy, &self.target[0], &self.target[1..])
    }
}
