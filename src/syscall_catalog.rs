//! Static grouping of syscall names into capability buckets.
//!
//! Bucket membership is a fixed contract: one permission flag enables one
//! bucket (or a documented union of buckets). The groups are architecture
//! independent; number decoding lives in [`crate::kernel_metadata`].
//!
//! Buckets are additive. Filesystem write access, for instance, pulls in the
//! open and descriptor buckets as well, because the kernel cannot perform a
//! write without the prior open and descriptor plumbing.

use std::collections::HashMap;

pub static FILE_READ_OPS: &[&str] = &[
    "access",
    "faccessat",
    "faccessat2",
    "cachestat",
    "fstat",
    "fstat64",
    "fstatat64",
    "fstatfs",
    "fstatfs64",
    "getcwd",
    "getdents",
    "getdents64",
    "getxattr",
    "fgetxattr",
    "lgetxattr",
    "listxattr",
    "flistxattr",
    "llistxattr",
    "lstat",
    "lstat64",
    "newfstatat",
    "pread64",
    "preadv",
    "preadv2",
    "read",
    "readahead",
    "readlink",
    "readlinkat",
    "readv",
    "stat",
    "stat64",
    "statfs",
    "statfs64",
    "statx",
];

pub static FILE_WRITE_OPS: &[&str] = &[
    "copy_file_range",
    "creat",
    "fallocate",
    "fdatasync",
    "fremovexattr",
    "fsetxattr",
    "fsync",
    "ftruncate",
    "ftruncate64",
    "futimesat",
    "fadvise64",
    "fadvise64_64",
    "link",
    "linkat",
    "lremovexattr",
    "lsetxattr",
    "mkdir",
    "mkdirat",
    "mknod",
    "mknodat",
    "pwrite64",
    "pwritev",
    "pwritev2",
    "removexattr",
    "rename",
    "renameat",
    "renameat2",
    "rmdir",
    "sendfile",
    "sendfile64",
    "setxattr",
    "symlink",
    "symlinkat",
    "sync_file_range",
    "truncate",
    "truncate64",
    "unlink",
    "unlinkat",
    "utime",
    "utimensat",
    "utimensat_time64",
    "utimes",
    "write",
    "writev",
];

pub static FILE_PERMISSIONS: &[&str] = &[
    "chmod",
    "chown",
    "chown32",
    "fchmod",
    "fchmodat",
    "fchmodat2",
    "fchown",
    "fchown32",
    "fchownat",
    "lchown",
    "lchown32",
    "umask",
];

pub static FILE_OPEN_OPS: &[&str] = &["open", "openat", "openat2"];

pub static FD_OPS: &[&str] = &[
    "chdir",
    "close",
    "close_range",
    "dup",
    "dup2",
    "dup3",
    "epoll_create",
    "epoll_create1",
    "epoll_ctl",
    "epoll_ctl_old",
    "epoll_pwait",
    "epoll_pwait2",
    "epoll_wait",
    "epoll_wait_old",
    "eventfd",
    "eventfd2",
    "fanotify_mark",
    "fchdir",
    "fcntl",
    "fcntl64",
    "inotify_add_watch",
    "inotify_init",
    "inotify_init1",
    "inotify_rm_watch",
    "io_cancel",
    "io_destroy",
    "io_getevents",
    "io_pgetevents",
    "io_pgetevents_time64",
    "io_setup",
    "io_submit",
    "lseek",
    "_llseek",
    "_newselect",
    "pipe",
    "pipe2",
    "poll",
    "ppoll",
    "ppoll_time64",
    "pselect6",
    "pselect6_time64",
    "select",
];

pub static NETWORKING_CLIENT: &[&str] = &[
    "connect",
    "getpeername",
    "getsockname",
    "getsockopt",
    "recv",
    "recvfrom",
    "recvmmsg",
    "recvmmsg_time64",
    "recvmsg",
    "send",
    "sendmmsg",
    "sendmsg",
    "sendto",
    "setsockopt",
    "shutdown",
    "socket",
];

pub static NETWORKING_SERVER: &[&str] = &[
    "accept",
    "accept4",
    "bind",
    "getpeername",
    "getsockname",
    "getsockopt",
    "listen",
    "recv",
    "recvfrom",
    "recvmmsg",
    "recvmmsg_time64",
    "recvmsg",
    "send",
    "sendmmsg",
    "sendmsg",
    "sendto",
    "setsockopt",
    "shutdown",
    "socket",
];

pub static LOCAL_SOCKETS: &[&str] = &[
    "accept",
    "accept4",
    "bind",
    "connect",
    "getpeername",
    "getsockname",
    "getsockopt",
    "listen",
    "recv",
    "recvfrom",
    "recvmmsg",
    "recvmsg",
    "send",
    "sendmmsg",
    "sendmsg",
    "sendto",
    "setsockopt",
    "shutdown",
    "socket",
    "socketpair",
];

pub static PROCESS_MANAGEMENT: &[&str] = &[
    "arch_prctl",
    "clone",
    "clone3",
    "execve",
    "execveat",
    "exit",
    "exit_group",
    "fork",
    "getcpu",
    "getpgid",
    "getpgrp",
    "getpid",
    "getppid",
    "getpriority",
    "getrusage",
    "getsid",
    "gettid",
    "pidfd_getfd",
    "pidfd_open",
    "prctl",
    "process_mrelease",
    "sched_get_priority_max",
    "sched_get_priority_min",
    "sched_getaffinity",
    "sched_getattr",
    "sched_getparam",
    "sched_getscheduler",
    "sched_rr_get_interval",
    "sched_rr_get_interval_time64",
    "sched_setaffinity",
    "sched_setattr",
    "sched_setparam",
    "sched_setscheduler",
    "setpgid",
    "setpriority",
    "setsid",
    "times",
    "vfork",
    "wait4",
    "waitid",
    "waitpid",
];

pub static MEMORY_MANAGEMENT: &[&str] = &[
    "brk",
    "madvise",
    "map_shadow_stack",
    "membarrier",
    "memfd_create",
    "memfd_secret",
    "mincore",
    "mlock",
    "mlock2",
    "mlockall",
    "mmap",
    "mmap2",
    "mprotect",
    "mremap",
    "msync",
    "munlock",
    "munlockall",
    "munmap",
    "pkey_alloc",
    "pkey_free",
    "pkey_mprotect",
    "remap_file_pages",
];

pub static SIGNALS: &[&str] = &[
    "kill",
    "pause",
    "pidfd_send_signal",
    "rt_sigaction",
    "rt_sigpending",
    "rt_sigprocmask",
    "rt_sigqueueinfo",
    "rt_sigreturn",
    "rt_sigsuspend",
    "rt_sigtimedwait",
    "rt_sigtimedwait_time64",
    "rt_tgsigqueueinfo",
    "sigaltstack",
    "signalfd",
    "signalfd4",
    "sigprocmask",
    "sigreturn",
    "tgkill",
    "tkill",
];

pub static TIMERS_AND_CLOCKS: &[&str] = &[
    "adjtimex",
    "alarm",
    "clock_adjtime",
    "clock_adjtime64",
    "clock_getres",
    "clock_getres_time64",
    "clock_gettime",
    "clock_gettime64",
    "clock_nanosleep",
    "clock_nanosleep_time64",
    "getitimer",
    "nanosleep",
    "setitimer",
    "timer_create",
    "timer_delete",
    "timer_getoverrun",
    "timer_gettime",
    "timer_gettime64",
    "timer_settime",
    "timer_settime64",
    "timerfd_create",
    "timerfd_gettime",
    "timerfd_gettime64",
    "timerfd_settime",
    "timerfd_settime64",
];

pub static SECURITY_AND_PERMISSIONS: &[&str] = &[
    "capget",
    "capset",
    "getegid",
    "getegid32",
    "geteuid",
    "geteuid32",
    "getgid",
    "getgid32",
    "getgroups",
    "getgroups32",
    "getresgid",
    "getresgid32",
    "getresuid",
    "getresuid32",
    "getuid",
    "getuid32",
    "landlock_add_rule",
    "landlock_create_ruleset",
    "landlock_restrict_self",
    "seccomp",
    "setfsgid",
    "setfsgid32",
    "setfsuid",
    "setfsuid32",
    "setgid",
    "setgid32",
    "setgroups",
    "setgroups32",
    "setregid",
    "setregid32",
    "setresgid",
    "setresgid32",
    "setresuid",
    "setresuid32",
    "setreuid",
    "setreuid32",
    "setuid",
    "setuid32",
];

pub static SYSTEM_INFORMATION: &[&str] = &[
    "getrlimit",
    "prlimit64",
    "setrlimit",
    "sysinfo",
    "ugetrlimit",
    "uname",
];

pub static IPC: &[&str] = &[
    "ipc",
    "mq_getsetattr",
    "mq_notify",
    "mq_open",
    "mq_timedreceive",
    "mq_timedreceive_time64",
    "mq_timedsend",
    "mq_timedsend_time64",
    "mq_unlink",
    "msgctl",
    "msgget",
    "msgrcv",
    "msgsnd",
    "pipe",
    "pipe2",
    "semctl",
    "semget",
    "semop",
    "semtimedop",
    "semtimedop_time64",
    "shmat",
    "shmctl",
    "shmdt",
    "shmget",
];

pub static SYNCHRONIZATION: &[&str] = &[
    "flock",
    "futex",
    "futex_requeue",
    "futex_time64",
    "futex_wait",
    "futex_waitv",
    "futex_wake",
    "get_robust_list",
    "membarrier",
    "rseq",
    "sched_yield",
    "set_robust_list",
    "set_tid_address",
];

pub static MISCELLANEOUS: &[&str] = &[
    "getrandom",
    "ioctl",
    "ioprio_get",
    "ioprio_set",
    "name_to_handle_at",
    "restart_syscall",
    "socketcall",
    "splice",
    "sync",
    "syncfs",
    "tee",
    "vmsplice",
];

pub static BASIC_TIME: &[&str] = &[
    "clock_getres",
    "clock_getres_time64",
    "clock_gettime",
    "clock_gettime64",
    "clock_nanosleep",
    "clock_nanosleep_time64",
    "gettimeofday",
    "nanosleep",
    "restart_syscall",
    "time",
];

static ALL_BUCKETS: &[&[&str]] = &[
    FILE_READ_OPS,
    FILE_WRITE_OPS,
    FILE_PERMISSIONS,
    FILE_OPEN_OPS,
    FD_OPS,
    NETWORKING_CLIENT,
    NETWORKING_SERVER,
    LOCAL_SOCKETS,
    PROCESS_MANAGEMENT,
    MEMORY_MANAGEMENT,
    SIGNALS,
    TIMERS_AND_CLOCKS,
    SECURITY_AND_PERMISSIONS,
    SYSTEM_INFORMATION,
    IPC,
    SYNCHRONIZATION,
    MISCELLANEOUS,
    BASIC_TIME,
];

/// Accumulates the allow-list for the enabled permission flags. The
/// resulting names seed the per-name allow-map; duplicates across buckets
/// are harmless because the map is boolean.
#[derive(Default)]
pub struct AllowListBuilder {
    names: Vec<&'static str>,
}

impl AllowListBuilder {
    pub fn new() -> AllowListBuilder {
        AllowListBuilder::default()
    }

    fn extend(&mut self, bucket: &[&'static str]) {
        self.names.extend_from_slice(bucket);
    }

    pub fn allow_file_system_read(&mut self) {
        self.extend(FILE_READ_OPS);
        self.extend(FILE_OPEN_OPS);
        self.extend(FD_OPS);
    }

    pub fn allow_file_system_write(&mut self) {
        self.extend(FILE_WRITE_OPS);
        self.extend(FILE_OPEN_OPS);
        self.extend(FD_OPS);
    }

    pub fn allow_file_permissions(&mut self) {
        self.extend(FILE_PERMISSIONS);
    }

    pub fn allow_file_system_access(&mut self) {
        self.allow_file_system_read();
        self.allow_file_system_write();
        self.allow_file_permissions();
    }

    pub fn allow_network_client(&mut self) {
        self.extend(NETWORKING_CLIENT);
    }

    pub fn allow_network_server(&mut self) {
        self.extend(NETWORKING_SERVER);
    }

    pub fn allow_networking(&mut self) {
        self.allow_network_client();
        self.allow_network_server();
    }

    pub fn allow_local_sockets(&mut self) {
        self.extend(LOCAL_SOCKETS);
    }

    pub fn allow_process_management(&mut self) {
        self.extend(PROCESS_MANAGEMENT);
    }

    pub fn allow_memory_management(&mut self) {
        self.extend(MEMORY_MANAGEMENT);
    }

    pub fn allow_signals(&mut self) {
        self.extend(SIGNALS);
    }

    pub fn allow_timers_and_clocks(&mut self) {
        self.extend(TIMERS_AND_CLOCKS);
    }

    pub fn allow_security_and_permissions(&mut self) {
        self.extend(SECURITY_AND_PERMISSIONS);
    }

    pub fn allow_system_information(&mut self) {
        self.extend(SYSTEM_INFORMATION);
    }

    pub fn allow_process_communication(&mut self) {
        self.extend(IPC);
    }

    pub fn allow_process_synchronization(&mut self) {
        self.extend(SYNCHRONIZATION);
    }

    pub fn allow_misc(&mut self) {
        self.extend(MISCELLANEOUS);
    }

    pub fn allow_basic_time(&mut self) {
        self.extend(BASIC_TIME);
    }

    /// The baseline permissions every target gets unless
    /// `--no-implicit-allow` is given: a process has to be able to start,
    /// map memory, synchronize and exit before any policy question is
    /// interesting.
    pub fn allow_baseline(&mut self) {
        self.allow_process_management();
        self.allow_memory_management();
        self.allow_process_synchronization();
        self.allow_signals();
        self.allow_misc();
        self.allow_security_and_permissions();
        self.allow_system_information();
        self.allow_basic_time();
    }

    pub fn allow_syscall(&mut self, name: &'static str) {
        self.names.push(name);
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
}

/// Build the per-name allow-map: every name in the catalog or any bucket is
/// present with `false`, then the accumulated allow-list flips its entries
/// to `true`. Lookup of a name outside the map means "not allowed".
pub fn build_allow_map(allow: &AllowListBuilder) -> HashMap<&'static str, bool> {
    let mut map = HashMap::new();
    for name in crate::kernel_metadata::known_names() {
        map.insert(name, false);
    }
    for bucket in ALL_BUCKETS {
        for &name in *bucket {
            map.insert(name, false);
        }
    }
    for &name in allow.names() {
        map.insert(name, true);
    }
    map
}
