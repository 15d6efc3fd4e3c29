//! Access to a stopped tracee's general-purpose registers.
//!
//! All architecture knowledge lives here: where the six syscall arguments
//! sit, where the syscall number is read from, and which registers carry the
//! result pair. Callers deal in plain `u64`/`i64` values and never touch the
//! raw `user_regs_struct` layout.
//!
//! Registers are fetched and stored with `PTRACE_GETREGSET`/`PTRACE_SETREGSET`
//! on `NT_PRSTATUS`, which works uniformly across x86_64, aarch64 and
//! riscv64. aarch64 is special in one way: the kernel latches the syscall
//! number separately, so rewriting it requires an additional store to the
//! `NT_ARM_SYSTEM_CALL` regset.

use libc::user_regs_struct;
use nix::errno::Errno;
use nix::unistd::Pid;
use std::mem;

const NT_PRSTATUS: libc::c_int = 1;
#[cfg(target_arch = "aarch64")]
const NT_ARM_SYSTEM_CALL: libc::c_int = 0x404;

#[derive(Copy, Clone)]
pub struct Registers {
    u: user_regs_struct,
    /// Set when the syscall number was rewritten; aarch64 needs a dedicated
    /// regset store for the kernel to pick the change up.
    #[cfg(target_arch = "aarch64")]
    syscallno_written: Option<i64>,
}

fn regset_io(
    pid: Pid,
    request: libc::c_uint,
    nt: libc::c_int,
    buf: *mut libc::c_void,
    len: usize,
) -> Result<(), Errno> {
    let mut iov = libc::iovec {
        iov_base: buf,
        iov_len: len,
    };
    let rc = unsafe {
        libc::ptrace(
            request,
            pid.as_raw(),
            nt as usize as *mut libc::c_void,
            &mut iov as *mut libc::iovec,
        )
    };
    if rc < 0 {
        Err(Errno::last())
    } else {
        Ok(())
    }
}

impl Registers {
    /// Fetch the registers of `pid`, which must be in a ptrace stop.
    pub fn read(pid: Pid) -> Result<Registers, Errno> {
        let mut u: user_regs_struct = unsafe { mem::zeroed() };
        regset_io(
            pid,
            libc::PTRACE_GETREGSET,
            NT_PRSTATUS,
            &mut u as *mut user_regs_struct as *mut libc::c_void,
            mem::size_of::<user_regs_struct>(),
        )?;
        Ok(Registers {
            u,
            #[cfg(target_arch = "aarch64")]
            syscallno_written: None,
        })
    }

    /// Store the (possibly rewritten) registers back into `pid`.
    pub fn flush(&self, pid: Pid) -> Result<(), Errno> {
        let mut u = self.u;
        regset_io(
            pid,
            libc::PTRACE_SETREGSET,
            NT_PRSTATUS,
            &mut u as *mut user_regs_struct as *mut libc::c_void,
            mem::size_of::<user_regs_struct>(),
        )?;
        #[cfg(target_arch = "aarch64")]
        if let Some(nr) = self.syscallno_written {
            let mut nr = nr as libc::c_int;
            regset_io(
                pid,
                libc::PTRACE_SETREGSET,
                NT_ARM_SYSTEM_CALL,
                &mut nr as *mut libc::c_int as *mut libc::c_void,
                mem::size_of::<libc::c_int>(),
            )?;
        }
        Ok(())
    }

    /// The six-argument vector, in syscall ABI order.
    pub fn args(&self) -> [u64; 6] {
        #[cfg(target_arch = "x86_64")]
        {
            [
                self.u.rdi, self.u.rsi, self.u.rdx, self.u.r10, self.u.r8, self.u.r9,
            ]
        }
        #[cfg(target_arch = "aarch64")]
        {
            [
                self.u.regs[0],
                self.u.regs[1],
                self.u.regs[2],
                self.u.regs[3],
                self.u.regs[4],
                self.u.regs[5],
            ]
        }
        #[cfg(target_arch = "riscv64")]
        {
            [
                self.u.a0, self.u.a1, self.u.a2, self.u.a3, self.u.a4, self.u.a5,
            ]
        }
    }

    pub fn syscallno(&self) -> i64 {
        #[cfg(target_arch = "x86_64")]
        {
            self.u.orig_rax as i64
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.u.regs[8] as i64
        }
        #[cfg(target_arch = "riscv64")]
        {
            self.u.a7 as i64
        }
    }

    pub fn set_syscallno(&mut self, nr: i64) {
        #[cfg(target_arch = "x86_64")]
        {
            self.u.orig_rax = nr as u64;
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.u.regs[8] = nr as u64;
            self.syscallno_written = Some(nr);
        }
        #[cfg(target_arch = "riscv64")]
        {
            self.u.a7 = nr as u64;
        }
    }

    /// The result pair as populated by the kernel at a syscall-exit stop.
    /// The first entry is the syscall return value; the second is the
    /// register conventionally used to carry auxiliary results.
    pub fn ret_pair(&self) -> [u64; 2] {
        #[cfg(target_arch = "x86_64")]
        {
            [self.u.rax, self.u.rdx]
        }
        #[cfg(target_arch = "aarch64")]
        {
            [self.u.regs[0], self.u.regs[1]]
        }
        #[cfg(target_arch = "riscv64")]
        {
            [self.u.a0, self.u.a1]
        }
    }

    pub fn syscall_result_signed(&self) -> i64 {
        self.ret_pair()[0] as i64
    }

    pub fn set_syscall_result(&mut self, value: i64) {
        #[cfg(target_arch = "x86_64")]
        {
            self.u.rax = value as u64;
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.u.regs[0] = value as u64;
        }
        #[cfg(target_arch = "riscv64")]
        {
            self.u.a0 = value as u64;
        }
    }

    pub fn set_second_result(&mut self, value: u64) {
        #[cfg(target_arch = "x86_64")]
        {
            self.u.rdx = value;
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.u.regs[1] = value;
        }
        #[cfg(target_arch = "riscv64")]
        {
            self.u.a1 = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed() -> Registers {
        Registers {
            u: unsafe { mem::zeroed() },
            #[cfg(target_arch = "aarch64")]
            syscallno_written: None,
        }
    }

    #[test]
    fn syscallno_roundtrip() {
        let mut r = zeroed();
        r.set_syscallno(-1);
        assert_eq!(r.syscallno(), -1);
        r.set_syscallno(42);
        assert_eq!(r.syscallno(), 42);
    }

    #[test]
    fn result_registers_roundtrip() {
        let mut r = zeroed();
        r.set_syscall_result(-(libc::EPERM as i64));
        r.set_second_result(libc::EPERM as u64);
        assert_eq!(r.syscall_result_signed(), -(libc::EPERM as i64));
        assert_eq!(r.ret_pair()[1], libc::EPERM as u64);
    }

    #[test]
    fn args_are_zero_on_fresh_registers() {
        let r = zeroed();
        assert_eq!(r.args(), [0u64; 6]);
    }
}
