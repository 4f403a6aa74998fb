use std::path::{Path, PathBuf};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::streams::{self, Streams, DEFAULT_IP_NODE, DEFAULT_TUN_NODE, TUN_PREFIX};

pub const DEFAULT_MTU: u16 = 1420;

/// Configuration for a TUN interface.
#[derive(Clone, Debug)]
pub(crate) struct DeviceConfig {
    pub mtu: u16,
    pub ip_node: PathBuf,
    pub tun_node: PathBuf,
}

/// Builder for a TUN interface.
#[derive(Default)]
pub struct DeviceBuilder {
    dev_name: Option<String>,
    mtu: Option<u16>,
    ip_node: Option<PathBuf>,
    tun_node: Option<PathBuf>,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    /// Interface family to create. Only `tun` is accepted; the kernel picks
    /// the unit, so the final name is `tun<ppa>`.
    pub fn name<S: Into<String>>(mut self, dev_name: S) -> Self {
        self.dev_name = Some(dev_name.into());
        self
    }
    /// Recorded and reported by [`Device::mtu`]; the kernel is not told.
    pub fn mtu(mut self, mtu: u16) -> Self {
        self.mtu = Some(mtu);
        self
    }
    /// Device node of the IP multiplexor, `/dev/udp` by default.
    pub fn ip_node<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ip_node = Some(path.as_ref().to_path_buf());
        self
    }
    /// Device node of the TUN driver, `/dev/tun` by default.
    pub fn tun_node<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.tun_node = Some(path.as_ref().to_path_buf());
        self
    }
    pub(crate) fn build_config(&mut self) -> Result<DeviceConfig> {
        if let Some(name) = self.dev_name.take() {
            if name != TUN_PREFIX {
                return Err(Error::InvalidName);
            }
        }
        Ok(DeviceConfig {
            mtu: self.mtu.take().unwrap_or(DEFAULT_MTU),
            ip_node: self
                .ip_node
                .take()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IP_NODE)),
            tun_node: self
                .tun_node
                .take()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TUN_NODE)),
        })
    }
    /// Plumb a new interface through `streams`.
    pub fn build_with<S: Streams>(mut self, streams: S) -> Result<Device<S>> {
        let config = self.build_config()?;
        let plumbing = streams::plumb(&streams, &config.ip_node, &config.tun_node)?;
        log::info!("created interface {}", plumbing.name());
        Ok(Device::from_plumbing(streams, plumbing, config.mtu))
    }
    /// Plumb a new interface through the host kernel.
    #[cfg(all(
        any(target_os = "illumos", target_os = "solaris"),
        target_pointer_width = "64"
    ))]
    pub fn build_sync(self) -> Result<crate::SyncDevice> {
        self.build_with(crate::platform::SysStreams)
    }
}
