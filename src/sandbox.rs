//! One-shot restriction of the process's system-call surface
//!
//! The pump activates its sandbox exactly once, after the codec state has
//! been allocated and before the first byte is read. A sandbox that fails to
//! install terminates the process: running with weaker isolation than asked
//! for is not an option.

use std::io;
use tracing::{debug, error};

/// Capability to confine the current process
pub trait Sandbox {
    fn name(&self) -> &'static str;

    /// Apply the restriction; irreversible once it succeeds
    fn install(&self) -> io::Result<()>;
}

/// Sandbox that leaves the process unrestricted
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfined;

impl Sandbox for Unconfined {
    fn name(&self) -> &'static str {
        "unconfined"
    }

    fn install(&self) -> io::Result<()> {
        debug!("running without a syscall sandbox");
        Ok(())
    }
}

/// Install `sandbox` or abort the process
pub fn activate_or_abort(sandbox: &dyn Sandbox) {
    match sandbox.install() {
        Ok(()) => debug!(sandbox = sandbox.name(), "sandbox active"),
        Err(e) => {
            error!(sandbox = sandbox.name(), error = %e, "sandbox activation failed");
            std::process::abort();
        }
    }
}

#[cfg(all(
    feature = "seccomp",
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
pub use self::seccomp::SyscallFilter;

#[cfg(all(
    feature = "seccomp",
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
mod seccomp {
    use super::Sandbox;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    // Classic BPF opcodes and seccomp return actions (linux/filter.h, linux/seccomp.h).
    const BPF_LD_W_ABS: u16 = 0x20; // BPF_LD | BPF_W | BPF_ABS
    const BPF_JMP_JEQ_K: u16 = 0x15; // BPF_JMP | BPF_JEQ | BPF_K
    const BPF_RET_K: u16 = 0x06; // BPF_RET | BPF_K
    const SECCOMP_MODE_FILTER: libc::c_ulong = 2;
    const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;
    const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

    // Offsets into struct seccomp_data.
    const DATA_NR: u32 = 0;
    const DATA_ARCH: u32 = 4;

    #[cfg(target_arch = "x86_64")]
    const AUDIT_ARCH: u32 = 0xc000_003e;
    #[cfg(target_arch = "aarch64")]
    const AUDIT_ARCH: u32 = 0xc000_00b7;

    /// Calls a running pump needs: stream I/O, exit, signal return, and
    /// heap management for the allocator behind the codec buffers.
    const ALLOWED: &[libc::c_long] = &[
        libc::SYS_read,
        libc::SYS_write,
        libc::SYS_exit,
        libc::SYS_exit_group,
        libc::SYS_rt_sigreturn,
        libc::SYS_sigaltstack,
        libc::SYS_futex,
        libc::SYS_brk,
        libc::SYS_mmap,
        libc::SYS_munmap,
        libc::SYS_mremap,
        libc::SYS_madvise,
    ];

    static INSTALLED: AtomicBool = AtomicBool::new(false);

    /// seccomp-BPF allow list; any other syscall kills the process
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SyscallFilter;

    fn stmt(code: u16, k: u32) -> libc::sock_filter {
        libc::sock_filter {
            code,
            jt: 0,
            jf: 0,
            k,
        }
    }

    fn jump(code: u16, k: u32, jt: u8, jf: u8) -> libc::sock_filter {
        libc::sock_filter { code, jt, jf, k }
    }

    impl SyscallFilter {
        fn program() -> Vec<libc::sock_filter> {
            let mut prog = vec![
                stmt(BPF_LD_W_ABS, DATA_ARCH),
                jump(BPF_JMP_JEQ_K, AUDIT_ARCH, 1, 0),
                stmt(BPF_RET_K, SECCOMP_RET_KILL_PROCESS),
                stmt(BPF_LD_W_ABS, DATA_NR),
            ];
            for &nr in ALLOWED {
                prog.push(jump(BPF_JMP_JEQ_K, nr as u32, 0, 1));
                prog.push(stmt(BPF_RET_K, SECCOMP_RET_ALLOW));
            }
            prog.push(stmt(BPF_RET_K, SECCOMP_RET_KILL_PROCESS));
            prog
        }
    }

    impl Sandbox for SyscallFilter {
        fn name(&self) -> &'static str {
            "seccomp"
        }

        fn install(&self) -> io::Result<()> {
            // prctl itself is outside the allow list, so a second install
            // would kill the process; the first one already confines it.
            if INSTALLED.swap(true, Ordering::SeqCst) {
                return Ok(());
            }

            let mut prog = Self::program();
            let fprog = libc::sock_fprog {
                len: prog.len() as libc::c_ushort,
                filter: prog.as_mut_ptr(),
            };

            // SAFETY: PR_SET_NO_NEW_PRIVS takes plain integer arguments.
            let rc = unsafe {
                libc::prctl(
                    libc::PR_SET_NO_NEW_PRIVS,
                    1 as libc::c_ulong,
                    0 as libc::c_ulong,
                    0 as libc::c_ulong,
                    0 as libc::c_ulong,
                )
            };
            if rc != 0 {
                INSTALLED.store(false, Ordering::SeqCst);
                return Err(io::Error::last_os_error());
            }

            // SAFETY: `fprog` points at `prog`, which outlives the call; the
            // kernel copies the program before returning.
            let rc = unsafe {
                libc::prctl(
                    libc::PR_SET_SECCOMP,
                    SECCOMP_MODE_FILTER,
                    &fprog as *const libc::sock_fprog,
                )
            };
            if rc != 0 {
                INSTALLED.store(false, Ordering::SeqCst);
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }

}
