/*!
 * Unix Signal Process Control
 * Fallback for Unix platforms without pidfds
 */

use super::traits::ProcessController;
use super::types::PlatformType;
use crate::core::errors::{ControlError, ControlResult};
use crate::core::types::Pid;
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use tracing::{info, warn};

/// PID-based handle
///
/// Nothing is held open, so the PID can in principle be recycled after the
/// target exits; the liveness check on every tick keeps that window small.
#[derive(Debug)]
pub struct SignalHandle {
    pid: Pid,
    nix_pid: NixPid,
}

impl SignalHandle {
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

/// kill(2)-based controller
#[derive(Debug, Clone, Default)]
pub struct SignalController;

impl SignalController {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessController for SignalController {
    type Handle = SignalHandle;

    fn init(&self) -> ControlResult<()> {
        if nix::unistd::geteuid().is_root() {
            info!("Process control running with root privileges");
        } else {
            warn!("Not running as root - only processes owned by this user can be throttled");
        }
        Ok(())
    }

    fn open(&self, pid: Pid) -> ControlResult<SignalHandle> {
        let raw = i32::try_from(pid).map_err(|_| ControlError::NotFound(pid))?;
        if raw <= 0 {
            // 0 and negatives address process groups, never a single target.
            return Err(ControlError::NotFound(pid));
        }
        let nix_pid = NixPid::from_raw(raw);

        // Signal 0 checks existence and permission without delivering anything.
        kill(nix_pid, None).map_err(|e| ControlError::from_errno(pid, e))?;
        if is_zombie(raw) {
            return Err(ControlError::NotFound(pid));
        }
        Ok(SignalHandle { pid, nix_pid })
    }

    fn suspend(&self, handle: &SignalHandle) -> ControlResult<()> {
        kill(handle.nix_pid, Signal::SIGSTOP).map_err(|e| ControlError::from_errno(handle.pid, e))
    }

    fn resume(&self, handle: &SignalHandle) -> ControlResult<()> {
        kill(handle.nix_pid, Signal::SIGCONT).map_err(|e| ControlError::from_errno(handle.pid, e))
    }

    fn is_alive(&self, handle: &SignalHandle) -> bool {
        // EPERM still proves the process exists. A zombie also answers
        // signal 0 until its parent reaps it, so check its state as well.
        match kill(handle.nix_pid, None) {
            Err(Errno::ESRCH) => false,
            _ => !is_zombie(handle.nix_pid.as_raw()),
        }
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn platform(&self) -> PlatformType {
        PlatformType::UnixSignal
    }
}

/// Whether `pid` has exited and is only waiting to be reaped
///
/// Unreadable state counts as not exited; the next signal-0 probe settles it
/// once the process is reaped.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn is_zombie(pid: libc::pid_t) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| stat_state(&stat))
        .is_some_and(|state| matches!(state, 'Z' | 'X'))
}

/// State letter from a `/proc/<pid>/stat` line
///
/// The command name is parenthesized and may itself contain spaces or
/// parentheses, so the state is found after the last `)`.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn stat_state(stat: &str) -> Option<char> {
    stat.rsplit_once(')')?.1.trim_start().chars().next()
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn is_zombie(pid: libc::pid_t) -> bool {
    // sys/proc.h
    const SZOMB: libc::c_char = 5;
    kinfo_proc(pid).is_some_and(|info| info.kp_proc.p_stat == SZOMB)
}

#[cfg(target_os = "freebsd")]
fn is_zombie(pid: libc::pid_t) -> bool {
    // sys/proc.h
    const SZOMB: libc::c_char = 5;
    kinfo_proc(pid).is_some_and(|info| info.ki_stat == SZOMB)
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn kinfo_proc(pid: libc::pid_t) -> Option<libc::kinfo_proc> {
    let mut mib = [libc::CTL_KERN, libc::KERN_PROC, libc::KERN_PROC_PID, pid];
    let mut info = std::mem::MaybeUninit::<libc::kinfo_proc>::zeroed();
    let mut size = std::mem::size_of::<libc::kinfo_proc>();

    // SAFETY: the buffer is sized for one kinfo_proc and `size` tells the
    // kernel how much of it may be written.
    let res = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            info.as_mut_ptr().cast(),
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    if res != 0 || size < std::mem::size_of::<libc::kinfo_proc>() {
        return None;
    }
    // SAFETY: zero-initialized plain data, fully written by the kernel.
    Some(unsafe { info.assume_init() })
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
fn is_zombie(_pid: libc::pid_t) -> bool {
    false
}
