//! Passing descriptors to spawned children.
//!
//! The child sees the descriptor at a fixed number (conventionally 3, the
//! first slot after stdio), whatever number it had in the parent.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Arranges for `fd` to be open at descriptor `target` in the child spawned
/// from `cmd`, and returns `target`.
///
/// The parent keeps ownership of `fd`; `cmd` holds its own duplicate so the
/// caller may drop its copy as soon as the child has been spawned.
///
/// # Errors
///
/// Returns an error if `fd` cannot be duplicated.
pub fn inherit_fd(cmd: &mut Command, fd: &OwnedFd, target: i32) -> std::io::Result<i32> {
    let held = fd.try_clone()?;
    // SAFETY: the closure runs between fork and exec and only calls
    // async-signal-safe functions (`dup2`, `fcntl`) on descriptors that are
    // open in the forked child. `held` is moved into the closure so the raw
    // descriptor stays valid until the Command is dropped.
    unsafe {
        let _ = cmd.pre_exec(move || {
            let raw = held.as_raw_fd();
            if raw == target {
                let flags = libc::fcntl(raw, libc::F_GETFD);
                if flags < 0 || libc::fcntl(raw, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
            } else if libc::dup2(raw, target) < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    Ok(target)
}

/// Takes ownership of descriptor `fd`, inherited from the parent process.
///
/// The descriptor is marked close-on-exec so it does not leak further into
/// processes spawned by the caller.
///
/// # Errors
///
/// Returns `EBADF` if `fd` is not open, or the `fcntl(2)` error.
pub fn adopt_fd(fd: RawFd) -> std::io::Result<OwnedFd> {
    // SAFETY: `fcntl` with `F_GETFD`/`F_SETFD` only inspects or updates the
    // descriptor flags and fails cleanly on a closed descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: see above.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: the descriptor is open, and the process convention is that an
    // inherited descriptor is claimed exactly once, by this call.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
