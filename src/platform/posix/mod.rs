mod fd;
pub(crate) use self::fd::Fd;

mod stream;
pub use self::stream::StreamFd;
