use std::io;

/// `-EIO`, reported to the configuration protocol for I/O failures.
pub const IPC_ERROR_IO: i64 = -(libc::EIO as i64);
/// `-EPROTO`, reported for protocol violations.
pub const IPC_ERROR_PROTOCOL: i64 = -(libc::EPROTO as i64);
/// `-EINVAL`, reported for invalid arguments.
pub const IPC_ERROR_INVALID: i64 = -(libc::EINVAL as i64);
/// `-EADDRINUSE`, reported when the control socket is owned by a live peer.
pub const IPC_ERROR_PORT_IN_USE: i64 = -(libc::EADDRINUSE as i64);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not implemented")]
    NotImplemented,

    #[error("interface name must be 'tun'")]
    InvalidName,

    #[error("control socket name must be a single non-empty path component")]
    InvalidSocketName,

    #[error("interface name too long")]
    NameTooLong,

    #[error("PPA allocation failure: all PPAs are busy")]
    PpaExhausted,

    #[error("unix socket in use")]
    PortInUse,

    #[error("already closed")]
    Closed,

    #[error("{record} record must be {expected} bytes, got {actual}")]
    Layout {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("could not {step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("TUN read failure: {0}")]
    Read(#[source] io::Error),

    #[error("TUN write failure: {0}")]
    Write(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn step(step: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::Step { step, source }
    }

    /// Maps the error onto the negative errno surfaced by the configuration protocol.
    pub fn ipc_code(&self) -> i64 {
        match self {
            Error::PortInUse => IPC_ERROR_PORT_IN_USE,
            Error::InvalidName
            | Error::InvalidSocketName
            | Error::NameTooLong
            | Error::Layout { .. } => IPC_ERROR_INVALID,
            Error::NotImplemented => IPC_ERROR_PROTOCOL,
            Error::PpaExhausted | Error::Closed => IPC_ERROR_IO,
            Error::Step { source: err, .. }
            | Error::Read(err)
            | Error::Write(err)
            | Error::Io(err) => match err.kind() {
                io::ErrorKind::AddrInUse => IPC_ERROR_PORT_IN_USE,
                io::ErrorKind::InvalidInput => IPC_ERROR_INVALID,
                _ if err.raw_os_error() == Some(libc::EPROTO) => IPC_ERROR_PROTOCOL,
                _ => IPC_ERROR_IO,
            },
        }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(err) => err,
            Error::PortInUse => io::Error::new(io::ErrorKind::AddrInUse, value),
            Error::InvalidName
            | Error::InvalidSocketName
            | Error::NameTooLong
            | Error::Layout { .. } => io::Error::new(io::ErrorKind::InvalidInput, value),
            Error::Step { ref source, .. } | Error::Read(ref source) | Error::Write(ref source) => {
                io::Error::new(source.kind(), value)
            }
            _ => io::Error::other(value),
        }
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;
