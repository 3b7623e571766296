/*!
 * Linux Process Control
 * SIGSTOP/SIGCONT delivered through pidfds
 *
 * A pidfd pins the process identity, so a recycled PID can never receive a
 * signal meant for the original target, and it becomes readable once the
 * process exits, which gives a non-blocking liveness check.
 */

use super::traits::ProcessController;
use super::types::PlatformType;
use crate::core::errors::{ControlError, ControlResult};
use crate::core::types::Pid;
use nix::errno::Errno;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::Signal;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use tracing::{debug, info, trace, warn};

/// Owned pidfd for a managed process
#[derive(Debug)]
pub struct PidfdHandle {
    pid: Pid,
    fd: OwnedFd,
}

impl PidfdHandle {
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl Drop for PidfdHandle {
    fn drop(&mut self) {
        trace!(pid = self.pid, fd = self.fd.as_raw_fd(), "Releasing pidfd");
    }
}

/// pidfd-based controller
#[derive(Debug, Clone)]
pub struct LinuxController {
    supported: bool,
}

impl LinuxController {
    pub fn new() -> Self {
        // Probe with our own PID; kernels before 5.3 answer ENOSYS.
        let supported = match pidfd_open(std::process::id()) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "pidfd_open unavailable");
                false
            }
        };
        Self { supported }
    }
}

impl Default for LinuxController {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessController for LinuxController {
    type Handle = PidfdHandle;

    fn init(&self) -> ControlResult<()> {
        if nix::unistd::geteuid().is_root() {
            info!("Process control running with root privileges");
        } else {
            warn!("Not running as root - only processes owned by this user can be throttled");
        }
        Ok(())
    }

    fn open(&self, pid: Pid) -> ControlResult<PidfdHandle> {
        let fd = pidfd_open(pid).map_err(|e| ControlError::from_errno(pid, e))?;
        debug!(pid, fd = fd.as_raw_fd(), "Opened pidfd");
        Ok(PidfdHandle { pid, fd })
    }

    fn suspend(&self, handle: &PidfdHandle) -> ControlResult<()> {
        pidfd_send_signal(&handle.fd, Signal::SIGSTOP)
            .map_err(|e| ControlError::from_errno(handle.pid, e))
    }

    fn resume(&self, handle: &PidfdHandle) -> ControlResult<()> {
        pidfd_send_signal(&handle.fd, Signal::SIGCONT)
            .map_err(|e| ControlError::from_errno(handle.pid, e))
    }

    fn is_alive(&self, handle: &PidfdHandle) -> bool {
        let mut fds = [PollFd::new(handle.fd.as_fd(), PollFlags::POLLIN)];
        let polled = poll(&mut fds, PollTimeout::ZERO);
        if let Err(e) = polled {
            if e != Errno::EINTR {
                warn!(pid = handle.pid, error = %e, "pidfd poll failed, assuming process alive");
            }
        }
        alive_from_poll(polled, fds[0].revents())
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn platform(&self) -> PlatformType {
        PlatformType::LinuxPidfd
    }
}

/// Interpret a zero-timeout poll on a pidfd
///
/// The pidfd turns readable once the process exits. A failed poll says
/// nothing about the target, so it counts as alive and is asked again on the
/// next tick; reporting it dead would drop the entry without a resume.
fn alive_from_poll(polled: nix::Result<i32>, revents: Option<PollFlags>) -> bool {
    match polled {
        Ok(0) | Err(_) => true,
        Ok(_) => !revents
            .is_some_and(|events| events.intersects(PollFlags::POLLIN | PollFlags::POLLHUP)),
    }
}

fn pidfd_open(pid: Pid) -> nix::Result<OwnedFd> {
    let pid = libc::pid_t::try_from(pid).map_err(|_| Errno::EINVAL)?;
    // SAFETY: pidfd_open only reads its integer arguments.
    let res = unsafe { libc::syscall(libc::SYS_pidfd_open, pid, 0 as libc::c_uint) };
    let fd = Errno::result(res)?;
    // SAFETY: the kernel returned a fresh descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
}

fn pidfd_send_signal(fd: &OwnedFd, signal: Signal) -> nix::Result<()> {
    // SAFETY: the descriptor is valid for the borrow and a null siginfo is allowed.
    let res = unsafe {
        libc::syscall(
            libc::SYS_pidfd_send_signal,
            fd.as_raw_fd(),
            signal as libc::c_int,
            std::ptr::null::<libc::siginfo_t>(),
            0 as libc::c_uint,
        )
    };
    Errno::result(res).map(drop)
}
