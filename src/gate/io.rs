//! Decisions for the read and write syscall families, driven by what the
//! descriptor at argument 0 actually is.

use super::fd::{classify, FdKind};
use super::SyscallCtx;
use crate::policy::Policy;

/// read/readv/recv/recvfrom/recvmsg/recvmmsg.
pub fn read_allowed(policy: &Policy, name: &str, ctx: &SyscallCtx<'_>) -> bool {
    match classify(ctx.pid, ctx.arg_i32(0)) {
        FdKind::Stdio => true,
        FdKind::Pipe => true,
        FdKind::Socket if policy.any_socket_capability() => true,
        FdKind::File if policy.fs_allow_read => true,
        _ => policy.allows(name),
    }
}

/// write/writev/send/sendto/sendmsg/sendmmsg. Same scheme as the read
/// family but guarded by write permission; event descriptors are additionally
/// allowed because runtimes signal their own wakeups through them.
pub fn write_allowed(policy: &Policy, name: &str, ctx: &SyscallCtx<'_>) -> bool {
    match classify(ctx.pid, ctx.arg_i32(0)) {
        FdKind::Stdio => true,
        FdKind::Pipe => true,
        FdKind::EventFd => true,
        FdKind::Socket if policy.any_socket_capability() => true,
        FdKind::File if policy.fs_allow_write => true,
        _ => policy.allows(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testing::{ctx, policy};
    use crate::remote_mem::testing::FakeMem;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn standard_streams_and_pipes_are_always_readable() {
        let mem = FakeMem::new();
        let p = policy();
        assert!(read_allowed(&p, "read", &ctx(&mem, [0, 0, 0, 0, 0, 0])));

        let (r, w) = nix::unistd::pipe().unwrap();
        assert!(read_allowed(&p, "read", &ctx(&mem, [r as u64, 0, 0, 0, 0, 0])));
        assert!(write_allowed(&p, "write", &ctx(&mem, [w as u64, 0, 0, 0, 0, 0])));
        nix::unistd::close(r).unwrap();
        nix::unistd::close(w).unwrap();
    }

    #[test]
    fn file_reads_need_the_read_capability() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "x").unwrap();
        let fd = f.as_file().as_raw_fd() as u64;

        let mem = FakeMem::new();
        let mut p = policy();
        assert!(!read_allowed(&p, "read", &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
        p.fs_allow_read = true;
        assert!(read_allowed(&p, "read", &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
    }

    #[test]
    fn file_writes_need_the_write_capability() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let fd = f.as_file().as_raw_fd() as u64;

        let mem = FakeMem::new();
        let mut p = policy();
        p.fs_allow_read = true;
        assert!(!write_allowed(&p, "write", &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
        p.fs_allow_write = true;
        assert!(write_allowed(&p, "write", &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
    }

    #[test]
    fn socket_io_needs_any_socket_capability() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let fd = listener.as_raw_fd() as u64;

        let mem = FakeMem::new();
        let mut p = policy();
        assert!(!read_allowed(&p, "recvmsg", &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
        p.local_sockets_allow = true;
        assert!(read_allowed(&p, "recvmsg", &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
        assert!(write_allowed(&p, "sendmsg", &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
    }

    #[test]
    fn event_descriptors_are_writable() {
        let efd = unsafe { libc::eventfd(0, 0) };
        assert!(efd >= 0);

        let mem = FakeMem::new();
        let p = policy();
        assert!(write_allowed(&p, "write", &ctx(&mem, [efd as u64, 0, 0, 0, 0, 0])));
        // Reads from an eventfd still go through the allow-map.
        assert!(!read_allowed(&p, "read", &ctx(&mem, [efd as u64, 0, 0, 0, 0, 0])));
        unsafe { libc::close(efd) };
    }

    #[test]
    fn unknown_descriptors_fall_back_to_the_map() {
        let mem = FakeMem::new();
        let mut p = policy();
        let args = [999_999, 0, 0, 0, 0, 0];
        assert!(!read_allowed(&p, "read", &ctx(&mem, args)));
        p.allow_map.insert("read", true);
        assert!(read_allowed(&p, "read", &ctx(&mem, args)));
    }
}
