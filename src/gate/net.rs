//! Decisions for socket creation, connect and shutdown.

use super::fd::{classify, is_standard_stream, FdKind};
use super::SyscallCtx;
use crate::policy::Policy;
use crate::remote_mem::read_val;

/// socket(domain, type, protocol): gate on the address family.
pub fn socket_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    match ctx.arg_i32(0) {
        libc::AF_UNIX | libc::AF_NETLINK => policy.local_sockets_allow,
        libc::AF_INET | libc::AF_INET6 | libc::AF_PACKET => {
            policy.net_allow_client || policy.net_allow_server
        }
        _ => policy.allows("socket"),
    }
}

/// connect(sockfd, addr, addrlen): the first two bytes of the sockaddr are
/// the family. connect is a client operation, so the inet families require
/// the client capability specifically.
pub fn connect_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    let addr = ctx.arg_ptr::<u16>(1);
    if addr.is_null() {
        return false;
    }
    let family = match read_val::<u16>(ctx.mem, addr) {
        Ok(family) => family,
        Err(_) => return false,
    };
    match family as i32 {
        libc::AF_UNIX | libc::AF_NETLINK => policy.local_sockets_allow,
        libc::AF_INET | libc::AF_INET6 | libc::AF_PACKET => policy.net_allow_client,
        // Disconnecting a datagram socket is fine for anyone who could have
        // connected it.
        libc::AF_UNSPEC => policy.local_sockets_allow || policy.net_allow_client,
        _ => false,
    }
}

/// shutdown(sockfd, how): a socket with any networking capability, or a
/// standard stream.
pub fn shutdown_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    let fd = ctx.arg_i32(0);
    if is_standard_stream(fd) {
        return true;
    }
    classify(ctx.pid, fd) == FdKind::Socket && policy.any_socket_capability()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testing::{ctx, policy};
    use crate::remote_mem::testing::FakeMem;
    use std::os::unix::io::AsRawFd;

    fn sockaddr_mem(family: i32) -> FakeMem {
        let mut mem = FakeMem::new();
        mem.store(0x1000, &(family as u16).to_ne_bytes());
        mem.store(0x1002, &[0u8; 8]);
        mem
    }

    #[test]
    fn socket_inet_needs_a_network_capability() {
        let mem = FakeMem::new();
        let mut p = policy();
        let args = [libc::AF_INET as u64, 0, 0, 0, 0, 0];
        assert!(!socket_allowed(&p, &ctx(&mem, args)));
        p.net_allow_server = true;
        assert!(socket_allowed(&p, &ctx(&mem, args)));
    }

    #[test]
    fn socket_unix_needs_local_sockets() {
        let mem = FakeMem::new();
        let mut p = policy();
        let args = [libc::AF_UNIX as u64, 0, 0, 0, 0, 0];
        assert!(!socket_allowed(&p, &ctx(&mem, args)));
        p.local_sockets_allow = true;
        assert!(socket_allowed(&p, &ctx(&mem, args)));
    }

    #[test]
    fn socket_other_domains_fall_back_to_the_map() {
        let mem = FakeMem::new();
        let mut p = policy();
        let args = [libc::AF_BLUETOOTH as u64, 0, 0, 0, 0, 0];
        assert!(!socket_allowed(&p, &ctx(&mem, args)));
        p.allow_map.insert("socket", true);
        assert!(socket_allowed(&p, &ctx(&mem, args)));
    }

    #[test]
    fn connect_is_a_client_operation() {
        let mem = sockaddr_mem(libc::AF_INET);
        let mut p = policy();
        p.net_allow_server = true;
        let args = [3, 0x1000, 16, 0, 0, 0];
        assert!(!connect_allowed(&p, &ctx(&mem, args)));
        p.net_allow_client = true;
        assert!(connect_allowed(&p, &ctx(&mem, args)));
    }

    #[test]
    fn connect_unix_uses_local_sockets() {
        let mem = sockaddr_mem(libc::AF_UNIX);
        let mut p = policy();
        let args = [3, 0x1000, 16, 0, 0, 0];
        assert!(!connect_allowed(&p, &ctx(&mem, args)));
        p.local_sockets_allow = true;
        assert!(connect_allowed(&p, &ctx(&mem, args)));
    }

    #[test]
    fn connect_unspec_accepts_either_capability() {
        let mem = sockaddr_mem(libc::AF_UNSPEC);
        let mut p = policy();
        let args = [3, 0x1000, 16, 0, 0, 0];
        assert!(!connect_allowed(&p, &ctx(&mem, args)));
        p.local_sockets_allow = true;
        assert!(connect_allowed(&p, &ctx(&mem, args)));

        let mut p = policy();
        p.net_allow_client = true;
        assert!(connect_allowed(&p, &ctx(&mem, args)));
    }

    #[test]
    fn connect_with_null_or_unreadable_sockaddr_is_denied() {
        let mem = FakeMem::new();
        let mut p = policy();
        p.net_allow_client = true;
        assert!(!connect_allowed(&p, &ctx(&mem, [3, 0, 16, 0, 0, 0])));
        assert!(!connect_allowed(&p, &ctx(&mem, [3, 0x7000, 16, 0, 0, 0])));
    }

    #[test]
    fn shutdown_requires_a_socket_and_a_capability() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let fd = listener.as_raw_fd() as u64;
        let mem = FakeMem::new();

        let mut p = policy();
        assert!(!shutdown_allowed(&p, &ctx(&mem, [fd, 0, 0, 0, 0, 0])));
        p.net_allow_server = true;
        assert!(shutdown_allowed(&p, &ctx(&mem, [fd, 0, 0, 0, 0, 0])));

        // Standard streams pass regardless.
        let q = policy();
        assert!(shutdown_allowed(&q, &ctx(&mem, [1, 0, 0, 0, 0, 0])));
    }
}
