pub mod gk_options;
pub mod run_command;
pub mod trace_command;

use crate::enforcement;
use crate::errors::GkResult;
use crate::liveness;
use crate::policy::{EnforcementTrigger, ExecutionMode, Policy};
use crate::signals;
use crate::tracer::spawn::spawn;
use crate::tracer::task::LastStop;
use crate::tracer::{TraceeExit, Tracer};

pub trait GkCommand {
    fn run(&mut self) -> GkResult<TraceeExit>;
}

/// Shared driver for both execution modes: wire up the triggers and the
/// liveness endpoint, launch the tracee, and hand the current thread to the
/// event loop. The loop must stay on this thread from here on; the kernel
/// ties the tracing relationship to it.
pub(crate) fn execute(
    policy: &'static Policy,
    target: &str,
    target_args: &[String],
) -> GkResult<TraceeExit> {
    signals::install_shutdown_handler()?;
    if let EnforcementTrigger::OnSignal(sig) = &policy.trigger {
        signals::install_enforce_trigger(*sig)?;
    }
    liveness::start();

    if policy.enforce_on_startup {
        enforcement::enforce_now();
    }

    let pid = spawn(policy, target, target_args)?;
    let mut tracer = Tracer::new();
    tracer.adopt(pid, LastStop::Exit);
    let exit = tracer.run_loop(policy)?;

    if policy.mode == ExecutionMode::Trace {
        tracer.stats().write_to_cwd();
    }
    Ok(exit)
}
