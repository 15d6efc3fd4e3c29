use crate::commands::gk_options::{GkOptions, GkSubCommand};
use crate::commands::{execute, GkCommand};
use crate::errors::{GatekeeperError, GkResult};
use crate::policy::{ExecutionMode, Policy, PolicySources};
use crate::tracer::TraceeExit;

pub struct RunCommand {
    sources: PolicySources,
    target: Vec<String>,
}

impl RunCommand {
    pub fn new(options: &GkOptions, dynamic_syscalls: Vec<String>) -> RunCommand {
        match &options.cmd {
            GkSubCommand::Run {
                permissions,
                target,
            } => RunCommand {
                sources: permissions.to_sources(dynamic_syscalls),
                target: target.clone(),
            },
            _ => panic!("Unexpected GkSubCommand variant. Not a `Run` variant!"),
        }
    }
}

impl GkCommand for RunCommand {
    fn run(&mut self) -> GkResult<TraceeExit> {
        if self.target.is_empty() {
            return Err(GatekeeperError::Config(
                "no target program given; usage: gatekeeper run [flags...] -- <target> [args...]".into(),
            ));
        }
        let policy = Policy::install(Policy::from_sources(ExecutionMode::Run, &self.sources)?);
        execute(policy, &self.target[0], &self.target[1..])
    }
}
