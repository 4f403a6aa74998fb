use super::sys::*;
use crate::platform::posix::StreamFd;
use crate::streams::layout::{LifReq, StrBuf, StrIoctl};
use crate::streams::Streams;
use libc::c_int;
use std::ffi::CStr;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr;

/// The STREAMS verbs of the running illumos/Solaris kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct SysStreams;

/// Largest message the TUN driver hands up; sizes the drain buffer.
const MAX_MESSAGE: usize = 65535;

fn len_i32(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// One `getmsg(2)` of data only. Returns the result bits and the data length.
fn getmsg_data(fd: &StreamFd, buf: &mut [u8]) -> io::Result<(c_int, usize)> {
    let mut data = StrBuf {
        maxlen: len_i32(buf.len()),
        len: 0,
        buf: buf.as_mut_ptr() as usize as u64,
    }
    .encode();
    let mut flags: c_int = 0;
    let rs = unsafe {
        getmsg(
            fd.as_raw_fd(),
            ptr::null_mut(),
            data.as_mut_ptr() as *mut _,
            &mut flags,
        )
    };
    if rs < 0 {
        return Err(io::Error::last_os_error());
    }
    let len = StrBuf::decode(&data)?.len;
    Ok((rs, usize::try_from(len).unwrap_or(0)))
}

impl Streams for SysStreams {
    type Handle = StreamFd;

    fn open(&self, path: &Path) -> io::Result<StreamFd> {
        StreamFd::open(path)
    }

    fn new_ppa(&self, tun: &StreamFd, candidate: u32) -> io::Result<u32> {
        // -1 would ask the driver to pick; an explicit candidate lets the
        // caller probe in order.
        let mut ppa = c_int::try_from(candidate)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut strioc = StrIoctl {
            cmd: TUNNEWPPA,
            timeout: 0,
            len: std::mem::size_of::<c_int>() as i32,
            dp: &mut ppa as *mut c_int as usize as u64,
        }
        .encode();
        let granted = unsafe { i_str(tun.as_raw_fd(), strioc.as_mut_ptr()) }?;
        u32::try_from(granted).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn push_module(&self, fd: &StreamFd, module: &CStr) -> io::Result<()> {
        unsafe { i_push(fd.as_raw_fd(), module.as_ptr()) }?;
        Ok(())
    }

    fn unit_select(&self, fd: &StreamFd, ppa: u32) -> io::Result<()> {
        let ppa = c_int::try_from(ppa).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        unsafe { if_unitsel(fd.as_raw_fd(), &ppa) }?;
        Ok(())
    }

    fn plink(&self, ip: &StreamFd, lower: &StreamFd) -> io::Result<i32> {
        Ok(unsafe { i_plink(ip.as_raw_fd(), lower.as_raw_fd()) }?)
    }

    fn punlink(&self, ip: &StreamFd, mux_id: i32) -> io::Result<()> {
        unsafe { i_punlink(ip.as_raw_fd(), mux_id) }?;
        Ok(())
    }

    fn ip_muxid(&self, ip: &StreamFd, name: &str) -> io::Result<i32> {
        let mut req = LifReq::new(name)?.encode()?;
        unsafe { siocglifmuxid(ip.as_raw_fd(), req.as_mut_ptr()) }?;
        let mux_id = LifReq::decode(&req)?.ip_muxid;
        log::debug!("{name} has IP mux id {mux_id}");
        Ok(mux_id)
    }

    fn set_ip_muxid(&self, ip: &StreamFd, name: &str, mux_id: i32) -> io::Result<()> {
        let mut req = LifReq::new(name)?;
        req.ip_muxid = mux_id;
        let raw = req.encode()?;
        unsafe { siocslifmuxid(ip.as_raw_fd(), raw.as_ptr()) }?;
        Ok(())
    }

    fn getmsg(&self, fd: &StreamFd, buf: &mut [u8]) -> io::Result<usize> {
        let (mut rs, len) = getmsg_data(fd, buf)?;
        if rs & MOREDATA == 0 {
            return Ok(len);
        }
        // Discard the tail so the next read starts on a message boundary.
        let mut scratch = vec![0u8; MAX_MESSAGE];
        let mut dropped = 0;
        while rs & MOREDATA != 0 {
            let (next, len) = getmsg_data(fd, &mut scratch)?;
            rs = next;
            dropped += len;
        }
        log::warn!(
            "dropped packet larger than {} bytes ({} bytes discarded)",
            buf.len(),
            len + dropped
        );
        Err(io::Error::from_raw_os_error(libc::EMSGSIZE))
    }

    fn putmsg(&self, fd: &StreamFd, buf: &[u8]) -> io::Result<usize> {
        let data = StrBuf {
            maxlen: 0,
            len: len_i32(buf.len()),
            buf: buf.as_ptr() as usize as u64,
        }
        .encode();
        let rs = unsafe { putmsg(fd.as_raw_fd(), ptr::null(), data.as_ptr() as *const _, 0) };
        if rs < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(buf.len())
    }
}
