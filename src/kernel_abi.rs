//! Build-time architecture gate for the tracer.
//!
//! Register indices and syscall-number decoding are architecture specific;
//! that knowledge lives in [`crate::registers`] and the tables in
//! [`crate::kernel_metadata`]. Rather than silently using wrong register
//! offsets, any target outside the supported set is rejected here at
//! compile time.

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64"
)))]
compile_error!("the gatekeeper only supports 64-bit Linux on x86_64, aarch64 and riscv64");

#[cfg(not(target_os = "linux"))]
compile_error!("the gatekeeper drives Linux ptrace and cannot be built for other operating systems");
