use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

use libc::{self, c_int, fcntl, F_GETFL, F_SETFL, O_NONBLOCK};

/// Owned POSIX file descriptor, closed exactly once on drop.
pub(crate) struct Fd {
    pub(crate) inner: RawFd,
}

impl Fd {
    #[cfg(any(
        test,
        all(
            any(target_os = "illumos", target_os = "solaris"),
            target_pointer_width = "64"
        )
    ))]
    pub fn new(value: RawFd) -> io::Result<Self> {
        if value < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Fd { inner: value })
    }

    /// Open a device node; the descriptor is not inherited across exec.
    #[cfg(any(
        test,
        all(
            any(target_os = "illumos", target_os = "solaris"),
            target_pointer_width = "64"
        )
    ))]
    pub fn open(path: &std::path::Path, flags: c_int) -> io::Result<Self> {
        use std::os::unix::ffi::OsStrExt;
        let path = std::ffi::CString::new(path.as_os_str().as_bytes())?;
        Fd::new(unsafe { libc::open(path.as_ptr(), flags | libc::O_CLOEXEC) })
    }

    /// Returns the `(read, write)` ends of a new pipe.
    pub fn pipe() -> io::Result<(Fd, Fd)> {
        let mut fds: [c_int; 2] = [0; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        let (read, write) = (Fd { inner: fds[0] }, Fd { inner: fds[1] });
        for fd in [&read, &write] {
            if unsafe { fcntl(fd.inner, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok((read, write))
    }

    /// Enable non-blocking mode
    pub fn set_nonblock(&self) -> io::Result<()> {
        match unsafe { fcntl(self.inner, F_SETFL, fcntl(self.inner, F_GETFL) | O_NONBLOCK) } {
            0 => Ok(()),
            _ => Err(io::Error::last_os_error()),
        }
    }

    #[cfg(test)]
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let amount = unsafe { libc::read(self.inner, buf.as_mut_ptr() as *mut _, buf.len()) };
        if amount < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(amount as usize)
    }

    #[inline]
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let amount = unsafe { libc::write(self.inner, buf.as_ptr() as *const _, buf.len()) };
        if amount < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(amount as usize)
    }
}

impl AsRawFd for Fd {
    fn as_raw_fd(&self) -> RawFd {
        self.inner
    }
}

impl IntoRawFd for Fd {
    fn into_raw_fd(mut self) -> RawFd {
        let fd = self.inner;
        self.inner = -1;
        fd
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        if self.inner >= 0 {
            unsafe { libc::close(self.inner) };
        }
    }
}
