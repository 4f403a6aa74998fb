/*!
TUN interfaces on STREAMS kernels (illumos, Solaris) and the control socket
a tunnel daemon is configured through.

# Example:
```ignore
use tun_streams::DeviceBuilder;
let mut dev = DeviceBuilder::new().name("tun").mtu(1420).build_sync()?;
println!("created {}", dev.name());
let mut buf = [0; 65535];
loop {
    let len = dev.read(&mut buf)?;
    println!("buf= {:?}", &buf[..len]);
}
```
# Example control socket:
```no_run
use tun_streams::UapiConfig;
# fn main() -> tun_streams::Result<()> {
let listener = UapiConfig::default().bootstrap("tun0")?;
for conn in listener.incoming() {
    let conn = conn?;
    println!("client {:?}", conn.peer_addr());
}
# Ok(())
# }
```
*/

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::builder::{DeviceBuilder, DEFAULT_MTU};
pub use crate::device::{Device, ErrorSender, Event, State, EVENT_QUEUE_CAPACITY};
pub use crate::error::{
    BoxError, Error, Result, IPC_ERROR_INVALID, IPC_ERROR_IO, IPC_ERROR_PORT_IN_USE,
    IPC_ERROR_PROTOCOL,
};
#[cfg(unix)]
pub use crate::uapi::{UapiConfig, UapiListener, DEFAULT_SOCKET_DIRECTORY};

#[cfg(all(
    any(target_os = "illumos", target_os = "solaris"),
    target_pointer_width = "64"
))]
pub use crate::platform::{SyncDevice, SysStreams};

mod builder;
mod device;
mod error;

pub mod platform;
pub mod streams;
#[cfg(unix)]
pub mod uapi;

