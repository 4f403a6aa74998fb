//! In-memory STREAMS driver used by the unit tests.

use super::Streams;
use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::CStr;
use std::io;
use std::ops::Range;
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct State {
    next_fd: RawFd,
    open: HashSet<RawFd>,
    busy_ppas: HashSet<u32>,
    ppa_offset: u32,
    ppa_requests: usize,
    failures: Vec<(&'static str, i32)>,
    calls: Vec<String>,
    next_mux_id: i32,
    links: HashSet<i32>,
    muxids: HashMap<String, i32>,
    messages: VecDeque<Vec<u8>>,
}

impl State {
    /// Record a call and report the scripted failure for it, if any.
    fn call(&mut self, label: String) -> io::Result<()> {
        let failure = self
            .failures
            .iter()
            .find(|(verb, _)| label.starts_with(verb))
            .map(|&(_, errno)| errno);
        self.calls.push(label);
        match failure {
            Some(errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockStreams {
    state: Arc<Mutex<State>>,
}

pub(crate) struct MockHandle {
    fd: RawFd,
    state: Arc<Mutex<State>>,
}

impl AsRawFd for MockHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.open.remove(&self.fd), "fd {} closed twice", self.fd);
        state.calls.push("close".to_string());
    }
}

impl MockStreams {
    pub(crate) fn new() -> Self {
        let streams = Self::default();
        {
            let mut state = streams.lock();
            state.next_fd = 3;
            state.next_mux_id = 100;
        }
        streams
    }
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
    pub(crate) fn occupy_ppas(&self, ppas: Range<u32>) {
        self.lock().busy_ppas.extend(ppas);
    }
    pub(crate) fn grant_ppa_offset(&self, offset: u32) {
        self.lock().ppa_offset = offset;
    }
    /// Every later call whose label starts with `verb` fails with `errno`.
    pub(crate) fn fail(&self, verb: &'static str, errno: i32) {
        self.lock().failures.push((verb, errno));
    }
    pub(crate) fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
    pub(crate) fn open_handles(&self) -> usize {
        self.lock().open.len()
    }
    pub(crate) fn ppa_requests(&self) -> usize {
        self.lock().ppa_requests
    }
    pub(crate) fn linked(&self) -> Vec<i32> {
        let mut links: Vec<i32> = self.lock().links.iter().copied().collect();
        links.sort_unstable();
        links
    }
    pub(crate) fn recorded_muxid(&self, name: &str) -> Option<i32> {
        self.lock().muxids.get(name).copied()
    }
}

impl Streams for MockStreams {
    type Handle = MockHandle;

    fn open(&self, path: &Path) -> io::Result<MockHandle> {
        let mut state = self.lock();
        state.call(format!("open {}", path.display()))?;
        let fd = state.next_fd;
        state.next_fd += 1;
        state.open.insert(fd);
        Ok(MockHandle {
            fd,
            state: self.state.clone(),
        })
    }

    fn new_ppa(&self, _tun: &MockHandle, candidate: u32) -> io::Result<u32> {
        let mut state = self.lock();
        state.ppa_requests += 1;
        state.call("new_ppa".to_string())?;
        if !state.busy_ppas.insert(candidate) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        Ok(candidate + state.ppa_offset)
    }

    fn push_module(&self, _fd: &MockHandle, module: &CStr) -> io::Result<()> {
        self.lock()
            .call(format!("push_module {}", module.to_string_lossy()))
    }

    fn unit_select(&self, _fd: &MockHandle, ppa: u32) -> io::Result<()> {
        self.lock().call(format!("unit_select {ppa}"))
    }

    fn plink(&self, _ip: &MockHandle, _lower: &MockHandle) -> io::Result<i32> {
        let mut state = self.lock();
        state.call("plink".to_string())?;
        let mux_id = state.next_mux_id;
        state.next_mux_id += 1;
        state.links.insert(mux_id);
        Ok(mux_id)
    }

    fn punlink(&self, _ip: &MockHandle, mux_id: i32) -> io::Result<()> {
        let mut state = self.lock();
        state.call("punlink".to_string())?;
        if !state.links.remove(&mux_id) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        Ok(())
    }

    fn ip_muxid(&self, _ip: &MockHandle, name: &str) -> io::Result<i32> {
        let mut state = self.lock();
        state.call(format!("ip_muxid {name}"))?;
        state
            .muxids
            .get(name)
            .copied()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENXIO))
    }

    fn set_ip_muxid(&self, _ip: &MockHandle, name: &str, mux_id: i32) -> io::Result<()> {
        let mut state = self.lock();
        state.call(format!("set_ip_muxid {name}"))?;
        state.muxids.insert(name.to_string(), mux_id);
        Ok(())
    }

    fn getmsg(&self, _fd: &MockHandle, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.call("getmsg".to_string())?;
        let message = state
            .messages
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
        if message.len() > buf.len() {
            return Err(io::Error::from_raw_os_error(libc::EMSGSIZE));
        }
        buf[..message.len()].copy_from_slice(&message);
        Ok(message.len())
    }

    fn putmsg(&self, _fd: &MockHandle, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.call("putmsg".to_string())?;
        state.messages.push_back(buf.to_vec());
        Ok(buf.len())
    }
}
