//! Decisions for the open, access and path-writing syscall families.

use super::path::path_is_allowed;
use super::SyscallCtx;
use crate::policy::Policy;
use crate::remote_mem::read_val;

/// `openat2(2)` takes its flags in a structured argument block read out of
/// the tracee.
#[repr(C)]
#[derive(Copy, Clone)]
struct OpenHow {
    flags: u64,
    mode: u64,
    resolve: u64,
}

/// Read-only intent: no write access mode, and none of the flags that
/// modify the filesystem even under O_RDONLY.
fn read_only_intent(flags: u64) -> bool {
    let write_acc = (libc::O_WRONLY | libc::O_RDWR) as u64;
    let mutating = (libc::O_CREAT | libc::O_TRUNC | libc::O_APPEND) as u64;
    flags & write_acc == 0 && flags & mutating == 0
}

fn open_intent_allowed(
    policy: &Policy,
    ctx: &SyscallCtx<'_>,
    read_only: bool,
    path_arg: usize,
    dirfd_arg: Option<usize>,
) -> bool {
    if read_only && policy.fs_allow_read {
        return path_is_allowed(policy, ctx, path_arg, dirfd_arg);
    }
    if !read_only && policy.fs_allow_write {
        return path_is_allowed(policy, ctx, path_arg, dirfd_arg);
    }
    false
}

/// open(pathname, flags, mode)
pub fn open_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    open_intent_allowed(policy, ctx, read_only_intent(ctx.arg(1)), 0, None)
}

/// openat(dirfd, pathname, flags, mode)
pub fn openat_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    open_intent_allowed(policy, ctx, read_only_intent(ctx.arg(2)), 1, Some(0))
}

/// openat2(dirfd, pathname, how, size); the flags live in the open_how
/// block. An unreadable block is treated as write intent.
pub fn openat2_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    let read_only = match read_val::<OpenHow>(ctx.mem, ctx.arg_ptr(2)) {
        Ok(how) => read_only_intent(how.flags),
        Err(_) => false,
    };
    open_intent_allowed(policy, ctx, read_only, 1, Some(0))
}

/// access(pathname, mode)
pub fn access_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    if !policy.fs_allow_read {
        return false;
    }
    path_is_allowed(policy, ctx, 0, None)
}

/// faccessat/faccessat2(dirfd, pathname, mode, flags)
pub fn faccessat_allowed(policy: &Policy, ctx: &SyscallCtx<'_>) -> bool {
    if !policy.fs_allow_read {
        return false;
    }
    path_is_allowed(policy, ctx, 1, Some(0))
}

/// The rename/link/symlink/mkdir/rmdir/unlink families: write permission
/// plus the whitelist for every path argument the syscall carries.
pub fn write_paths_allowed(
    policy: &Policy,
    ctx: &SyscallCtx<'_>,
    paths: &[(usize, Option<usize>)],
) -> bool {
    if !policy.fs_allow_write {
        return false;
    }
    paths
        .iter()
        .all(|&(path_arg, dirfd_arg)| path_is_allowed(policy, ctx, path_arg, dirfd_arg))
}
