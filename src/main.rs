//! gatekeeper: launch a target program under ptrace and permit, rewrite or
//! kill the syscalls it (and every descendant) attempts.

mod commands;
mod enforcement;
mod errors;
mod gate;
mod kernel_abi;
mod kernel_metadata;
mod liveness;
mod policy;
mod registers;
mod remote_mem;
mod remote_ptr;
mod signals;
mod stats;
mod stdout_scan;
mod syscall_catalog;
mod tracer;
mod wait_status;

use crate::commands::gk_options::{prescan_dynamic_syscalls, GkOptions, GkSubCommand};
use crate::commands::run_command::RunCommand;
use crate::commands::trace_command::TraceCommand;
use crate::commands::GkCommand;
use crate::kernel_metadata::signal_string;
use crate::tracer::TraceeExit;
use structopt::clap::ErrorKind;
use structopt::StructOpt;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let (args, dynamic_syscalls) = match prescan_dynamic_syscalls(std::env::args()) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{}", e);
            return e.exit_code();
        }
    };

    let options = match GkOptions::from_iter_safe(args) {
        Ok(options) => options,
        Err(e)
            if e.kind == ErrorKind::HelpDisplayed || e.kind == ErrorKind::VersionDisplayed =>
        {
            println!("{}", e.message);
            return 0;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            return 100;
        }
    };

    init_logging(options.cmd.permissions().verbose);
    debug!(arch = std::env::consts::ARCH, "gatekeeper starting");

    let result = match &options.cmd {
        GkSubCommand::Trace { .. } => TraceCommand::new(&options, dynamic_syscalls).run(),
        GkSubCommand::Run { .. } => RunCommand::new(&options, dynamic_syscalls).run(),
    };

    match result {
        Ok(exit) => {
            if let TraceeExit::Signal(sig) = &exit {
                info!("tracee terminated by {}", signal_string(*sig));
            }
            exit.exit_code()
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}
