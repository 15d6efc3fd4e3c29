//! Reading a stopped tracee's memory.
//!
//! The reader is expressed as a trait so the per-syscall predicates can be
//! exercised in tests against an in-memory fake; the one production
//! implementation peeks words out of the tracee with ptrace. Reads only make
//! sense while the tracee is held in a ptrace stop.

use crate::remote_ptr::RemotePtr;
use memchr::memchr;
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::unistd::Pid;
use std::mem;

/// NUL-terminated reads are capped; paths cannot be longer than this anyway.
pub const READ_STR_MAX: usize = 4096;

const WORD: usize = mem::size_of::<libc::c_long>();

pub trait TraceeMem {
    /// Fill `buf` from the tracee starting at `addr`. All-or-error: a short
    /// read is reported as the underlying errno, never as a partial buffer.
    fn read_bytes(&self, addr: RemotePtr<u8>, buf: &mut [u8]) -> Result<(), Errno>;

    /// Read a NUL-terminated byte sequence starting at `addr`, capped at
    /// [`READ_STR_MAX`] bytes. The terminator is not included. Paths are not
    /// required to be UTF-8, so the raw bytes are returned.
    fn read_c_str(&self, addr: RemotePtr<u8>) -> Result<Vec<u8>, Errno> {
        let mut out = Vec::new();
        let mut chunk = [0u8; WORD];
        while out.len() < READ_STR_MAX {
            self.read_bytes(addr.add_bytes(out.len() as u64), &mut chunk)?;
            match memchr(0, &chunk) {
                Some(nul) => {
                    out.extend_from_slice(&chunk[..nul]);
                    return Ok(out);
                }
                None => out.extend_from_slice(&chunk),
            }
        }
        out.truncate(READ_STR_MAX);
        Ok(out)
    }
}

/// Read one fixed-width value of type `T` from the tracee. The caller either
/// gets the whole struct or an error; no partial-structure interpretation.
pub fn read_val<T: Copy>(mem: &dyn TraceeMem, addr: RemotePtr<T>) -> Result<T, Errno> {
    let mut buf = vec![0u8; mem::size_of::<T>()];
    mem.read_bytes(addr.cast(), &mut buf)?;
    // The buffer holds exactly size_of::<T>() bytes of tracee data; alignment
    // of the local copy is handled by read_unaligned.
    Ok(unsafe { (buf.as_ptr() as *const T).read_unaligned() })
}

/// The production reader: PTRACE_PEEKDATA, one word at a time.
pub struct PtraceMem {
    pid: Pid,
}

impl PtraceMem {
    pub fn new(pid: Pid) -> PtraceMem {
        PtraceMem { pid }
    }
}

impl TraceeMem for PtraceMem {
    fn read_bytes(&self, addr: RemotePtr<u8>, buf: &mut [u8]) -> Result<(), Errno> {
        let mut off = 0usize;
        while off < buf.len() {
            let word = ptrace::read(self.pid, addr.add_bytes(off as u64).as_u64() as *mut libc::c_void)?;
            let bytes = word.to_ne_bytes();
            let n = (buf.len() - off).min(WORD);
            buf[off..off + n].copy_from_slice(&bytes[..n]);
            off += n;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// A fake tracee address space backed by a byte map, for predicate tests.
    #[derive(Default)]
    pub struct FakeMem {
        bytes: HashMap<u64, u8>,
    }

    impl FakeMem {
        pub fn new() -> FakeMem {
            FakeMem::default()
        }

        pub fn store(&mut self, addr: u64, data: &[u8]) {
            for (i, b) in data.iter().enumerate() {
                self.bytes.insert(addr + i as u64, *b);
            }
        }

        pub fn store_c_str(&mut self, addr: u64, s: &str) {
            self.store(addr, s.as_bytes());
            self.store(addr + s.len() as u64, &[0]);
            // Pad the trailing word so chunked reads stay in range.
            self.store(addr + s.len() as u64 + 1, &[0u8; WORD]);
        }
    }

    impl TraceeMem for FakeMem {
        fn read_bytes(&self, addr: RemotePtr<u8>, buf: &mut [u8]) -> Result<(), Errno> {
            for (i, out) in buf.iter_mut().enumerate() {
                *out = *self
                    .bytes
                    .get(&(addr.as_u64() + i as u64))
                    .ok_or(Errno::EFAULT)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeMem;
    use super::*;

    #[test]
    fn c_str_reads_stop_at_nul() {
        let mut mem = FakeMem::new();
        mem.store_c_str(0x1000, "/etc/resolv.conf");
        let s = mem.read_c_str(RemotePtr::new(0x1000)).unwrap();
        assert_eq!(s, b"/etc/resolv.conf");
    }

    #[test]
    fn c_str_reads_fail_on_unmapped_memory() {
        let mem = FakeMem::new();
        assert_eq!(
            mem.read_c_str(RemotePtr::new(0x2000)),
            Err(Errno::EFAULT)
        );
    }

    #[test]
    fn typed_reads_are_native_endian() {
        let mut mem = FakeMem::new();
        mem.store(0x3000, &2u16.to_ne_bytes());
        let family: u16 = read_val(&mem, RemotePtr::new(0x3000)).unwrap();
        assert_eq!(family, 2);
    }

    #[test]
    fn typed_reads_are_all_or_nothing() {
        let mut mem = FakeMem::new();
        // Only half of a u32 is mapped.
        mem.store(0x4000, &[1u8, 2]);
        let r: Result<u32, Errno> = read_val(&mem, RemotePtr::new(0x4000));
        assert_eq!(r, Err(Errno::EFAULT));
    }
}
