use crate::error::{Error, Result};
use crate::streams::{Plumbing, Streams};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};

/// Capacity of the link event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 10;

/// Link events delivered to the consumer of a [`Device`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    /// The interface is administratively ready. Emitted once right after
    /// creation; the kernel link state is not consulted.
    Up,
    /// Reserved: link loss is never detected, so this is never emitted.
    Down,
}

/// Lifecycle of a [`Device`].
///
/// A device under construction (handles open, mux link not yet recorded)
/// only exists as the in-flight plumbing sequence; a returned device starts
/// out `Plumbed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Plumbed,
    Closed,
}

type ErrorSlot = Arc<Mutex<Option<io::Error>>>;

/// Latches an asynchronous error that the next [`Device::read`] returns.
#[derive(Clone)]
pub struct ErrorSender(ErrorSlot);

impl ErrorSender {
    /// Returns `false` when an error is already pending; the new one is dropped.
    pub fn send(&self, err: io::Error) -> bool {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(err);
        true
    }
}

/// A `tun<ppa>` interface linked beneath the IP multiplexor.
///
/// `read` and `write` take `&self` and may run concurrently with each other;
/// callers keep a single reader and a single writer. Teardown needs `&mut self`.
pub struct Device<S: Streams> {
    streams: S,
    name: String,
    ppa: u32,
    mtu: u16,
    tun: Option<S::Handle>,
    ip: Option<S::Handle>,
    mux_id: Option<i32>,
    state: State,
    events_tx: Option<SyncSender<Event>>,
    events_rx: Mutex<Option<Receiver<Event>>>,
    errors: ErrorSlot,
}

impl<S: Streams> Device<S> {
    pub(crate) fn from_plumbing(streams: S, plumbing: Plumbing<S::Handle>, mtu: u16) -> Self {
        let (events_tx, events_rx) = sync_channel(EVENT_QUEUE_CAPACITY);
        let device = Device {
            streams,
            name: plumbing.name,
            ppa: plumbing.ppa,
            mtu,
            tun: Some(plumbing.tun),
            ip: Some(plumbing.ip),
            mux_id: Some(plumbing.mux_id),
            state: State::Plumbed,
            events_tx: Some(events_tx),
            events_rx: Mutex::new(Some(events_rx)),
            errors: Arc::new(Mutex::new(None)),
        };
        device.send_event(Event::Up);
        device
    }

    fn send_event(&self, event: Event) {
        let Some(tx) = self.events_tx.as_ref() else {
            return;
        };
        if let Err(TrySendError::Full(event)) = tx.try_send(event) {
            log::warn!("{}: event queue full, dropping {event:?}", self.name);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ppa(&self) -> u32 {
        self.ppa
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The mux id established at creation, while plumbed.
    pub fn mux_id(&self) -> Option<i32> {
        self.mux_id
    }

    /// Take the link event queue. Only the first call returns it.
    ///
    /// The queue is closed (disconnected) once the device is closed.
    pub fn events(&self) -> Option<Receiver<Event>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn error_sender(&self) -> ErrorSender {
        ErrorSender(self.errors.clone())
    }

    fn packet_handle(&self) -> Result<&S::Handle> {
        self.tun.as_ref().ok_or(Error::Closed)
    }

    /// Recv one packet from the tun device.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let pending = self
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(err) = pending {
            return Err(Error::Io(err));
        }
        let tun = self.packet_handle()?;
        self.streams.getmsg(tun, buf).map_err(Error::Read)
    }

    /// Like [`Device::read`], filling `buf[offset..]`.
    pub fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<usize> {
        let buf = buf
            .get_mut(offset..)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
        self.read(buf)
    }

    /// Send `buf` to the tun device as one packet.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let tun = self.packet_handle()?;
        self.streams.putmsg(tun, buf).map_err(Error::Write)?;
        Ok(buf.len())
    }

    /// Like [`Device::write`], sending `buf[offset..]`.
    pub fn write_at(&self, buf: &[u8], offset: usize) -> Result<usize> {
        let buf = buf
            .get(offset..)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
        self.write(buf)
    }

    /// Every write is already one message on the stream.
    pub fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Unlink the interface from IP and release every handle.
    ///
    /// Teardown continues past failures and reports the first one. A closed
    /// device stays closed: calling this again returns [`Error::Closed`]
    /// without touching the kernel.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Err(Error::Closed);
        }
        self.state = State::Closed;
        self.mux_id = None;

        let mut result = Ok(());
        if let Some(ip) = self.ip.take() {
            result = self.unplumb(&ip);
        }
        drop(self.tun.take());
        drop(self.events_tx.take());
        result
    }

    fn unplumb(&self, ip: &S::Handle) -> Result<()> {
        let mux_id = self
            .streams
            .ip_muxid(ip, &self.name)
            .map_err(Error::step("get IP mux id"))?;
        self.streams
            .punlink(ip, mux_id)
            .map_err(Error::step("unlink TUN from IP"))?;
        log::debug!("{} unlinked from IP (mux id {mux_id})", self.name);
        Ok(())
    }
}

impl<S: Streams> AsRawFd for Device<S> {
    /// The packet descriptor, or `-1` once closed.
    fn as_raw_fd(&self) -> RawFd {
        self.tun.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }
}

impl<S: Streams> Drop for Device<S> {
    fn drop(&mut self) {
        if self.state != State::Closed {
            if let Err(err) = self.close() {
                log::warn!("{}: teardown failed: {err}", self.name);
            }
        }
    }
}
