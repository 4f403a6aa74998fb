use super::{ppa, Streams};
use crate::error::{Error, Result};
use std::ffi::CStr;
use std::path::Path;

/// Duplex handle onto the IP multiplexor.
pub const DEFAULT_IP_NODE: &str = "/dev/udp";
pub const DEFAULT_TUN_NODE: &str = "/dev/tun";
pub const IP_MODULE: &CStr = c"ip";
pub const TUN_PREFIX: &str = "tun";

/// A TUN stream linked under IP, ready to carry packets.
pub struct Plumbing<H> {
    pub(crate) ip: H,
    pub(crate) tun: H,
    pub(crate) ppa: u32,
    pub(crate) name: String,
    pub(crate) mux_id: i32,
}

impl<H> Plumbing<H> {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn ppa(&self) -> u32 {
        self.ppa
    }
    pub fn mux_id(&self) -> i32 {
        self.mux_id
    }
}

/// Create a `tun<ppa>` interface and link it persistently beneath IP.
///
/// Any failure drops the handles opened so far in reverse order. When the
/// mux id cannot be recorded, the link made just before is undone on a best
/// effort basis.
pub fn plumb<S: Streams>(
    streams: &S,
    ip_node: &Path,
    tun_node: &Path,
) -> Result<Plumbing<S::Handle>> {
    let ip = streams
        .open(ip_node)
        .map_err(Error::step("open IP device"))?;
    let tun = streams
        .open(tun_node)
        .map_err(Error::step("open TUN device"))?;

    let ppa = ppa::allocate(streams, &tun)?;
    let name = format!("{TUN_PREFIX}{ppa}");

    // The interface stream only lives until it is linked.
    let if_fd = streams
        .open(tun_node)
        .map_err(Error::step("open second TUN device"))?;
    streams
        .push_module(&if_fd, IP_MODULE)
        .map_err(Error::step("push IP module"))?;
    streams
        .unit_select(&if_fd, ppa)
        .map_err(Error::step("select unit"))?;
    let mux_id = streams
        .plink(&ip, &if_fd)
        .map_err(Error::step("link TUN under IP"))?;
    log::debug!("{name} linked under IP with mux id {mux_id}");
    drop(if_fd);

    if let Err(err) = streams.set_ip_muxid(&ip, &name, mux_id) {
        if let Err(unlink) = streams.punlink(&ip, mux_id) {
            log::warn!("could not unlink mux id {mux_id} of {name}: {unlink}");
        }
        return Err(Error::step("set IP mux id")(err));
    }

    Ok(Plumbing {
        ip,
        tun,
        ppa,
        name,
        mux_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::mock::MockStreams;

    fn plumb_default(streams: &MockStreams) -> Result<Plumbing<<MockStreams as Streams>::Handle>> {
        plumb(
            streams,
            Path::new(DEFAULT_IP_NODE),
            Path::new(DEFAULT_TUN_NODE),
        )
    }

    #[test]
    fn plumbs_in_order() {
        let streams = MockStreams::new();
        let plumbing = plumb_default(&streams).unwrap();
        assert_eq!(plumbing.name(), "tun0");
        assert_eq!(plumbing.ppa(), 0);
        assert_eq!(
            streams.calls(),
            [
                "open /dev/udp",
                "open /dev/tun",
                "new_ppa",
                "open /dev/tun",
                "push_module ip",
                "unit_select 0",
                "plink",
                "close",
                "set_ip_muxid tun0",
            ]
        );
        assert_eq!(streams.open_handles(), 2);
        assert_eq!(streams.linked(), vec![plumbing.mux_id()]);
        assert_eq!(streams.recorded_muxid("tun0"), Some(plumbing.mux_id()));
    }

    #[test]
    fn failures_leak_no_handles() {
        for (verb, step) in [
            ("open /dev/udp", "open IP device"),
            ("push_module", "push IP module"),
            ("unit_select", "select unit"),
            ("plink", "link TUN under IP"),
            ("set_ip_muxid", "set IP mux id"),
        ] {
            let streams = MockStreams::new();
            streams.fail(verb, libc::ENXIO);
            match plumb_default(&streams) {
                Err(Error::Step { step: failed, .. }) => assert_eq!(failed, step),
                Err(err) => panic!("{verb}: unexpected error {err}"),
                Ok(_) => panic!("{verb}: plumbing should fail"),
            }
            assert_eq!(streams.open_handles(), 0, "{verb} leaked a handle");
            assert!(streams.linked().is_empty(), "{verb} left a link behind");
        }
    }

    #[test]
    fn exhausted_ppas_leak_no_handles() {
        let streams = MockStreams::new();
        streams.occupy_ppas(0..crate::streams::PPA_LIMIT);
        assert!(matches!(
            plumb_default(&streams),
            Err(Error::PpaExhausted)
        ));
        assert_eq!(streams.open_handles(), 0);
    }

    #[test]
    fn set_muxid_failure_unlinks() {
        let streams = MockStreams::new();
        streams.fail("set_ip_muxid", libc::EINVAL);
        assert!(plumb_default(&streams).is_err());
        let calls = streams.calls();
        let tail = &calls[calls.len() - 4..];
        assert_eq!(tail, ["set_ip_muxid tun0", "punlink", "close", "close"]);
    }

    #[test]
    fn unlink_failure_during_rollback_is_ignored() {
        let streams = MockStreams::new();
        streams.fail("set_ip_muxid", libc::EINVAL);
        streams.fail("punlink", libc::EIO);
        let err = plumb_default(&streams).err().unwrap();
        assert!(matches!(err, Error::Step { step: "set IP mux id", .. }));
        assert_eq!(streams.open_handles(), 0);
    }
}
