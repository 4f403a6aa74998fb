use super::Streams;
use crate::error::{Error, Result};
use std::io;

/// PPAs are probed in `0..PPA_LIMIT`.
pub const PPA_LIMIT: u32 = 128;

/// Allocate the first free PPA on the TUN driver behind `tun`.
///
/// The kernel decides: a candidate rejected as already in use moves the probe
/// on to the next one, any other failure aborts the allocation.
pub fn allocate<S: Streams>(streams: &S, tun: &S::Handle) -> Result<u32> {
    for candidate in 0..PPA_LIMIT {
        match streams.new_ppa(tun, candidate) {
            Ok(ppa) => {
                log::debug!("allocated PPA {ppa} (candidate {candidate})");
                return Ok(ppa);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                log::trace!("PPA {candidate} is busy");
            }
            Err(err) => return Err(Error::step("allocate PPA")(err)),
        }
    }
    Err(Error::PpaExhausted)
}
