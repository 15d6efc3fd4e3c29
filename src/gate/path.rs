//! Resolving tracee-supplied paths against the configured whitelist.
//!
//! Resolution is lexical plus `/proc` links: a relative path is joined to
//! the directory named by the dirfd argument (or the tracee's working
//! directory for `AT_FDCWD`), and the result is component-folded without
//! touching symlinks in the path itself. The tracee could rewrite the path
//! buffer between this check and the kernel's own copy; that window is
//! inherent to ptrace-based gating.

use super::SyscallCtx;
use crate::policy::Policy;
use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStringExt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Lexical cleanup: fold `.` and `..` without consulting the filesystem.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let absolute = path.is_absolute();
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if absolute {
                    // Popping at the root is a no-op; "/.." is "/".
                    out.pop();
                } else {
                    let last_is_dotdot = out
                        .components()
                        .next_back()
                        .map(|c| c == Component::ParentDir)
                        .unwrap_or(false);
                    if last_is_dotdot || !out.pop() {
                        out.push("..");
                    }
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(if absolute { "/" } else { "." });
    }
    out
}

fn proc_link(pid: libc::pid_t, what: &str) -> Option<PathBuf> {
    fs::read_link(format!("/proc/{}/{}", pid, what)).ok()
}

/// Whether the path argument at `path_arg` (resolved through `dirfd_arg`
/// when relative) falls under the configured whitelist. An empty whitelist
/// means no path-level restriction.
pub fn path_is_allowed(
    policy: &Policy,
    ctx: &SyscallCtx<'_>,
    path_arg: usize,
    dirfd_arg: Option<usize>,
) -> bool {
    if policy.fs_allowed_paths.is_empty() {
        return true;
    }

    let raw = match ctx.mem.read_c_str(ctx.arg_ptr(path_arg)) {
        Ok(bytes) if !bytes.is_empty() => OsString::from_vec(bytes),
        _ => return false,
    };
    let path = PathBuf::from(raw);

    let resolved = if path.is_absolute() {
        clean_path(&path)
    } else {
        let base = match dirfd_arg {
            Some(idx) => {
                let dirfd = ctx.arg_i32(idx);
                if dirfd == libc::AT_FDCWD {
                    proc_link(ctx.pid.as_raw(), "cwd")
                } else {
                    proc_link(ctx.pid.as_raw(), &format!("fd/{}", dirfd))
                }
            }
            None => proc_link(ctx.pid.as_raw(), "cwd"),
        };
        match base {
            Some(base) => clean_path(&base.join(&path)),
            None => return false,
        }
    };

    // A path that does not exist yet is judged by its parent, so creating
    // new files under a whitelisted directory stays possible.
    let check: &Path = if resolved.exists() {
        &resolved
    } else {
        resolved.parent().unwrap_or(&resolved)
    };

    for prefix in &policy.fs_allowed_paths {
        if check.starts_with(prefix) {
            return true;
        }
    }

    debug!(path = %check.display(), "path is not allowed");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testing::{ctx, policy};
    use crate::remote_mem::testing::FakeMem;
    use std::fs::File;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn clean_path_folds_components() {
        assert_eq!(clean_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(clean_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(clean_path(Path::new("a/../..")), PathBuf::from(".."));
        assert_eq!(clean_path(Path::new("./x//y/")), PathBuf::from("x/y"));
    }

    #[test]
    fn empty_whitelist_allows_everything() {
        let mem = FakeMem::new();
        let p = policy();
        assert!(path_is_allowed(&p, &ctx(&mem, [0; 6]), 0, None));
    }

    #[test]
    fn absolute_path_under_whitelisted_prefix() {
        let td = tempfile::tempdir().unwrap();
        let file = td.path().join("file.txt");
        File::create(&file).unwrap();

        let mut mem = FakeMem::new();
        mem.store_c_str(0x1000, file.to_str().unwrap());

        let mut p = policy();
        p.fs_allowed_paths = vec![td.path().to_path_buf()];
        assert!(path_is_allowed(&p, &ctx(&mem, [0x1000, 0, 0, 0, 0, 0]), 0, None));
    }

    #[test]
    fn absolute_path_outside_whitelist_is_denied() {
        let td = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("file.txt");
        File::create(&file).unwrap();

        let mut mem = FakeMem::new();
        mem.store_c_str(0x1000, file.to_str().unwrap());

        let mut p = policy();
        p.fs_allowed_paths = vec![td.path().to_path_buf()];
        assert!(!path_is_allowed(&p, &ctx(&mem, [0x1000, 0, 0, 0, 0, 0]), 0, None));
    }

    #[test]
    fn relative_path_resolves_through_dirfd() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir(td.path().join("sub")).unwrap();
        File::create(td.path().join("sub/file.txt")).unwrap();

        let dir = File::open(td.path()).unwrap();
        let dirfd = dir.as_raw_fd() as u64;

        let mut mem = FakeMem::new();
        mem.store_c_str(0x2000, "sub/file.txt");

        let mut p = policy();
        p.fs_allowed_paths = vec![td.path().to_path_buf()];
        // The test process is its own tracee here: /proc/<pid>/fd/<dirfd>
        // resolves against our own descriptor table.
        assert!(path_is_allowed(&p, &ctx(&mem, [dirfd, 0x2000, 0, 0, 0, 0]), 1, Some(0)));
    }

    #[test]
    fn new_file_under_whitelisted_parent_is_allowed() {
        let td = tempfile::tempdir().unwrap();
        let missing = td.path().join("not-created-yet.txt");

        let mut mem = FakeMem::new();
        mem.store_c_str(0x3000, missing.to_str().unwrap());

        let mut p = policy();
        p.fs_allowed_paths = vec![td.path().to_path_buf()];
        assert!(path_is_allowed(&p, &ctx(&mem, [0x3000, 0, 0, 0, 0, 0]), 0, None));
    }

    #[test]
    fn parent_of_whitelisted_child_is_not_allowed() {
        let td = tempfile::tempdir().unwrap();
        let child = td.path().join("childdir");
        std::fs::create_dir(&child).unwrap();

        let mut mem = FakeMem::new();
        mem.store_c_str(0x4000, td.path().to_str().unwrap());

        let mut p = policy();
        p.fs_allowed_paths = vec![child];
        assert!(!path_is_allowed(&p, &ctx(&mem, [0x4000, 0, 0, 0, 0, 0]), 0, None));
    }

    #[test]
    fn unreadable_path_argument_is_denied() {
        let mem = FakeMem::new();
        let mut p = policy();
        p.fs_allowed_paths = vec![PathBuf::from("/tmp")];
        assert!(!path_is_allowed(&p, &ctx(&mem, [0x5000, 0, 0, 0, 0, 0]), 0, None));
    }
}
