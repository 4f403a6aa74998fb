//! STREAMS plumbing of a TUN interface under the IP multiplexor.

use std::ffi::CStr;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

pub mod layout;
mod plumb;
mod ppa;

#[cfg(test)]
pub(crate) mod mock;

pub use self::plumb::{plumb, Plumbing, DEFAULT_IP_NODE, DEFAULT_TUN_NODE, IP_MODULE, TUN_PREFIX};
pub use self::ppa::{allocate, PPA_LIMIT};

/// The kernel verbs needed to plumb and drive a TUN interface.
///
/// Handles are owned: dropping one closes the underlying descriptor.
pub trait Streams {
    type Handle: AsRawFd;

    /// Open a STREAMS device node read-write.
    fn open(&self, path: &Path) -> io::Result<Self::Handle>;

    /// `I_STR`/`TUNNEWPPA`: ask the TUN driver for `candidate`, returning the PPA granted.
    /// A PPA already in use fails with [`io::ErrorKind::AlreadyExists`].
    fn new_ppa(&self, tun: &Self::Handle, candidate: u32) -> io::Result<u32>;

    /// `I_PUSH`
    fn push_module(&self, fd: &Self::Handle, module: &CStr) -> io::Result<()>;

    /// `IF_UNITSEL`
    fn unit_select(&self, fd: &Self::Handle, ppa: u32) -> io::Result<()>;

    /// `I_PLINK`: link `lower` persistently beneath `ip`, returning the mux id.
    fn plink(&self, ip: &Self::Handle, lower: &Self::Handle) -> io::Result<i32>;

    /// `I_PUNLINK`
    fn punlink(&self, ip: &Self::Handle, mux_id: i32) -> io::Result<()>;

    /// `SIOCGLIFMUXID`: the IP mux id recorded for interface `name`.
    fn ip_muxid(&self, ip: &Self::Handle, name: &str) -> io::Result<i32>;

    /// `SIOCSLIFMUXID`
    fn set_ip_muxid(&self, ip: &Self::Handle, name: &str, mux_id: i32) -> io::Result<()>;

    /// Receive exactly one STREAMS message into `buf`, returning its length.
    /// A message longer than `buf` is discarded whole and fails with `EMSGSIZE`.
    fn getmsg(&self, fd: &Self::Handle, buf: &mut [u8]) -> io::Result<usize>;

    /// Send `buf` as one STREAMS message.
    fn putmsg(&self, fd: &Self::Handle, buf: &[u8]) -> io::Result<usize>;
}
