use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};
#[cfg(any(
    test,
    all(
        any(target_os = "illumos", target_os = "solaris"),
        target_pointer_width = "64"
    )
))]
use std::{io, path::Path};

use super::Fd;

/// An open STREAMS device node, closed on drop.
pub struct StreamFd(Fd);

impl StreamFd {
    /// Open `path` read-write.
    #[cfg(any(
        test,
        all(
            any(target_os = "illumos", target_os = "solaris"),
            target_pointer_width = "64"
        )
    ))]
    pub(crate) fn open(path: &Path) -> io::Result<Self> {
        Fd::open(path, libc::O_RDWR).map(StreamFd)
    }
}

impl AsRawFd for StreamFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl IntoRawFd for StreamFd {
    fn into_raw_fd(self) -> RawFd {
        self.0.into_raw_fd()
    }
}

impl FromRawFd for StreamFd {
    /// # Safety
    /// `fd` must be open and owned by the caller.
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        StreamFd(Fd { inner: fd })
    }
}

impl std::fmt::Debug for StreamFd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamFd").field(&self.0.inner).finish()
    }
}
