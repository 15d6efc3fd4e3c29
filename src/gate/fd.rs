//! Classifying a tracee's file descriptors.
//!
//! The kind of `(pid, fd)` is derived from the host's per-process descriptor
//! metadata: stat `/proc/<pid>/fd/<fd>` and decode the type bits. Anonymous
//! inodes carry no type bits at all, so those are disambiguated by the
//! symbolic link target (`anon_inode:[eventfd]` and friends). Any failure to
//! stat or readlink yields `Unknown`.

use nix::sys::stat::stat;
use nix::unistd::Pid;
use std::fs;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FdKind {
    File,
    Dir,
    Symlink,
    CharDev,
    BlockDev,
    Socket,
    Pipe,
    EventFd,
    EventPoll,
    IoUring,
    /// One of the standard streams 0/1/2.
    Stdio,
    Unknown,
}

pub fn is_standard_stream(fd: i32) -> bool {
    fd == libc::STDIN_FILENO || fd == libc::STDOUT_FILENO || fd == libc::STDERR_FILENO
}

pub fn classify(pid: Pid, fd: i32) -> FdKind {
    if is_standard_stream(fd) {
        return FdKind::Stdio;
    }
    if fd < 0 {
        return FdKind::Unknown;
    }

    let link = format!("/proc/{}/fd/{}", pid.as_raw(), fd);
    let st = match stat(link.as_str()) {
        Ok(st) => st,
        Err(_) => return FdKind::Unknown,
    };

    match st.st_mode & libc::S_IFMT {
        libc::S_IFREG => FdKind::File,
        libc::S_IFDIR => FdKind::Dir,
        libc::S_IFLNK => FdKind::Symlink,
        libc::S_IFCHR => FdKind::CharDev,
        libc::S_IFBLK => FdKind::BlockDev,
        libc::S_IFSOCK => FdKind::Socket,
        libc::S_IFIFO => FdKind::Pipe,
        // Anonymous inodes carry no format bits at all.
        _ => classify_anon(&link),
    }
}

fn classify_anon(link: &str) -> FdKind {
    let target = match fs::read_link(link) {
        Ok(t) => t,
        Err(_) => return FdKind::Unknown,
    };
    match target.to_str() {
        Some("anon_inode:[eventfd]") => FdKind::EventFd,
        Some("anon_inode:[eventpoll]") => FdKind::EventPoll,
        Some("anon_inode:[io_uring]") => FdKind::IoUring,
        _ => FdKind::Unknown,
    }
}
