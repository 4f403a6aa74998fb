use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{SocketAddr, UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::platform::posix::Fd;

#[derive(Default)]
struct Slot {
    /// The next accepted connection, at most one.
    conn: Option<UnixStream>,
    /// First accept error; once set the accept loop is gone.
    error: Option<io::Error>,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    /// Signalled when `conn`, `error` or `closed` changes.
    ready: Condvar,
    /// Signalled when `conn` is taken.
    vacant: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand `conn` to the next `accept`, waiting for the slot to empty.
    /// Returns `false` once closed; `conn` is then dropped.
    fn offer(&self, conn: UnixStream) -> bool {
        let mut slot = self.lock();
        while slot.conn.is_some() && !slot.closed {
            slot = self
                .vacant
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if slot.closed {
            return false;
        }
        slot.conn = Some(conn);
        drop(slot);
        self.ready.notify_one();
        true
    }

    fn fail(&self, err: io::Error) {
        let mut slot = self.lock();
        if !slot.closed {
            slot.error = Some(err);
        }
        drop(slot);
        self.ready.notify_all();
    }

    fn accept(&self) -> Result<UnixStream> {
        let mut slot = self.lock();
        loop {
            if let Some(conn) = slot.conn.take() {
                self.vacant.notify_one();
                return Ok(conn);
            }
            if let Some(err) = slot.error.as_ref() {
                return Err(Error::Io(io::Error::new(err.kind(), err.to_string())));
            }
            if slot.closed {
                return Err(Error::Closed);
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Accepts control connections on a background thread.
///
/// [`UapiListener::accept`] blocks until the next connection, the first
/// accept error, or [`UapiListener::close`] from any thread. The socket file
/// is unlinked on close.
pub struct UapiListener {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    path: PathBuf,
    waker: Fd,
    // Kept open so waking never writes into a pipe without a reader.
    _wake_rx: Arc<Fd>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UapiListener {
    /// Serve an already bound listener whose socket file is `path`.
    pub fn from_std<P: Into<PathBuf>>(listener: UnixListener, path: P) -> Result<Self> {
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let (wake_rx, waker) = Fd::pipe()?;
        wake_rx.set_nonblock()?;
        let wake_rx = Arc::new(wake_rx);
        let shared = Arc::new(Shared::default());
        let worker = {
            let shared = shared.clone();
            let wake_rx = wake_rx.clone();
            thread::Builder::new()
                .name("uapi-accept".into())
                .spawn(move || accept_loop(|| next_conn(&listener, &wake_rx), &shared))?
        };
        Ok(UapiListener {
            shared,
            local_addr,
            path: path.into(),
            waker,
            _wake_rx: wake_rx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Wait for the next connection.
    ///
    /// After an accept error every call fails with an error of the same kind
    /// and message. After close, [`Error::Closed`].
    pub fn accept(&self) -> Result<UnixStream> {
        self.shared.accept()
    }

    /// Iterate over connections until the listener closes or fails.
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { listener: self }
    }

    pub fn local_addr(&self) -> &SocketAddr {
        &self.local_addr
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting, wake every waiter and unlink the socket file.
    pub fn close(&self) -> Result<()> {
        {
            let mut slot = self.shared.lock();
            if slot.closed {
                return Err(Error::Closed);
            }
            slot.closed = true;
            // A connection nobody took is refused by dropping it.
            slot.conn = None;
        }
        self.shared.ready.notify_all();
        self.shared.vacant.notify_all();
        if let Err(err) = self.waker.write(&[1]) {
            log::warn!("could not wake accept loop: {err}");
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::warn!("accept loop panicked");
            }
        }

        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                Err(Error::step("remove control socket")(err))
            }
            _ => Ok(()),
        }
    }
}

impl Drop for UapiListener {
    fn drop(&mut self) {
        match self.close() {
            Ok(()) | Err(Error::Closed) => {}
            Err(err) => log::warn!("{}: {err}", self.path.display()),
        }
    }
}

/// Iterator over accepted connections, see [`UapiListener::incoming`].
pub struct Incoming<'a> {
    listener: &'a UapiListener,
}

impl Iterator for Incoming<'_> {
    type Item = Result<UnixStream>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.listener.accept() {
            Err(Error::Closed) => None,
            rs => Some(rs),
        }
    }
}

/// Block until the listener is readable. Returns `false` once woken for shutdown.
fn wait_readable(listener: &UnixListener, wake_rx: &Fd) -> io::Result<bool> {
    let mut fds = [
        libc::pollfd {
            fd: listener.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: wake_rx.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
    ];
    loop {
        let rs = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rs == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(fds[1].revents == 0);
    }
}

/// The next connection, or `None` once woken for shutdown.
fn next_conn(listener: &UnixListener, wake_rx: &Fd) -> io::Result<Option<UnixStream>> {
    loop {
        if !wait_readable(listener, wake_rx)? {
            return Ok(None);
        }
        match listener.accept() {
            Ok((conn, _)) => match conn.set_nonblocking(false) {
                Ok(()) => return Ok(Some(conn)),
                Err(err) => log::warn!("dropping control connection: {err}"),
            },
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(err) => return Err(err),
        }
    }
}

/// Feed connections into the slot until shutdown or the first error, which is latched.
fn accept_loop<F>(mut next: F, shared: &Shared)
where
    F: FnMut() -> io::Result<Option<UnixStream>>,
{
    loop {
        match next() {
            Ok(Some(conn)) => {
                if !shared.offer(conn) {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                log::warn!("control socket accept failed: {err}");
                shared.fail(err);
                break;
            }
        }
    }
    log::debug!("control socket accept loop stopped");
}
