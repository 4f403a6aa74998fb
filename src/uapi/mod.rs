//! Control socket used by the management client to configure the daemon.
//!
//! The socket lives at `<directory>/<name>.sock`. Ownership of the path is
//! settled once, at bootstrap: a live peer answering on it wins, a stale
//! socket file is replaced.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use nix::sys::stat::{umask, Mode};

use crate::error::{Error, Result};

mod listener;
pub use self::listener::{Incoming, UapiListener};

pub const DEFAULT_SOCKET_DIRECTORY: &str = "/var/run/wireguard";
const SOCKET_SUFFIX: &str = ".sock";

/// Where control sockets are created.
#[derive(Clone, Debug)]
pub struct UapiConfig {
    socket_directory: PathBuf,
}

impl Default for UapiConfig {
    fn default() -> Self {
        UapiConfig {
            socket_directory: PathBuf::from(DEFAULT_SOCKET_DIRECTORY),
        }
    }
}

/// Restores the previous file-creation mask when dropped.
struct UmaskGuard(Mode);

impl UmaskGuard {
    fn set(mask: Mode) -> Self {
        UmaskGuard(umask(mask))
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        umask(self.0);
    }
}

impl UapiConfig {
    pub fn new<P: Into<PathBuf>>(socket_directory: P) -> Self {
        UapiConfig {
            socket_directory: socket_directory.into(),
        }
    }

    pub fn socket_directory(&self) -> &Path {
        &self.socket_directory
    }

    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.socket_directory.join(format!("{name}{SOCKET_SUFFIX}"))
    }

    /// Claim the control socket for interface `name` and start accepting on it.
    pub fn bootstrap(&self, name: &str) -> Result<UapiListener> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidSocketName);
        }
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.socket_directory)
            .map_err(Error::step("create socket directory"))?;

        let path = self.socket_path(name);
        let listener = {
            let _umask = UmaskGuard::set(Mode::from_bits_truncate(0o077));
            bind_exclusive(&path)?
        };
        log::info!("control socket listening on {}", path.display());
        UapiListener::from_std(listener, path)
    }
}

fn bind_exclusive(path: &Path) -> Result<UnixListener> {
    match UnixListener::bind(path) {
        Ok(listener) => return Ok(listener),
        Err(err) if err.kind() == io::ErrorKind::AddrInUse => {}
        Err(err) => return Err(Error::step("bind control socket")(err)),
    }

    if UnixStream::connect(path).is_ok() {
        return Err(Error::PortInUse);
    }

    log::info!("removing stale control socket {}", path.display());
    fs::remove_file(path).map_err(Error::step("remove stale control socket"))?;
    UnixListener::bind(path).map_err(Error::step("bind control socket"))
}
