//! The transient record built for each syscall stop.

use crate::kernel_metadata::syscall_name;
use crate::registers::Registers;
use std::time::Duration;

pub struct SyscallEvent {
    /// The raw syscall number as decoded from the registers.
    pub sysno: i64,
    /// Resolved name; `None` when the architecture does not map the number.
    pub name: Option<&'static str>,
    /// The six-entry argument vector.
    pub args: [u64; 6],
    /// The return register pair; meaningful at exit only.
    pub ret: [u64; 2],
    /// Enter-to-exit duration; populated at exit only.
    pub duration: Option<Duration>,
}

impl SyscallEvent {
    pub fn at_enter(regs: &Registers) -> SyscallEvent {
        let sysno = regs.syscallno();
        SyscallEvent {
            sysno,
            name: syscall_name(sysno),
            args: regs.args(),
            ret: [0, 0],
            duration: None,
        }
    }

    pub fn at_exit(regs: &Registers, duration: Option<Duration>) -> SyscallEvent {
        let sysno = regs.syscallno();
        SyscallEvent {
            sysno,
            name: syscall_name(sysno),
            args: regs.args(),
            ret: regs.ret_pair(),
            duration,
        }
    }

    pub fn display_name(&self) -> String {
        match self.name {
            Some(name) => name.to_string(),
            None => format!("syscall_{}", self.sysno),
        }
    }
}
