pub mod sys;

mod streams;

pub use self::streams::SysStreams;

use crate::error::{Error, Result};
use std::os::fd::RawFd;

/// A TUN interface plumbed through the host kernel.
pub type SyncDevice = crate::Device<SysStreams>;

/// Reconstituting a device from a bare descriptor is not supported: neither
/// the PPA nor the mux id behind it can be recovered.
///
/// # Safety
/// The fd passed in must be an owned file descriptor; in particular, it must be open.
pub unsafe fn create_with_fd(_fd: RawFd) -> Result<SyncDevice> {
    Err(Error::NotImplemented)
}
