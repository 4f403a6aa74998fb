use libc::{c_char, c_int, c_void};
use nix::{ioctl_readwrite_bad, ioctl_write_int_bad, ioctl_write_ptr_bad};

/// `/dev/tun` private `I_STR` commands.
pub const TUNNEWPPA: c_int = 0x540001;
pub const TUNSETPPA: c_int = 0x540002;

// sys/stropts.h
pub const I_STR: u32 = 0x5308;
pub const I_POP: u32 = 0x5303;
pub const I_PUSH: u32 = 0x5302;
pub const I_PLINK: u32 = 0x5316;
pub const I_PUNLINK: u32 = 0x5317;

// sys/sockio.h
pub const IF_UNITSEL: u32 = 0x80047336;
pub const SIOCSLIFMUXID: u32 = 0x80786984;
pub const SIOCGLIFMUXID: u32 = 0xc0786983;
pub const SIOCGLIFINDEX: u32 = 0xc0786985;

/// `getmsg` result bits: more of the message remains to be read.
pub const MORECTL: c_int = 1;
pub const MOREDATA: c_int = 2;

ioctl_readwrite_bad!(i_str, I_STR, u8);
ioctl_write_ptr_bad!(i_push, I_PUSH, c_char);
ioctl_write_int_bad!(i_plink, I_PLINK);
ioctl_write_int_bad!(i_punlink, I_PUNLINK);
ioctl_write_ptr_bad!(if_unitsel, IF_UNITSEL, c_int);
ioctl_readwrite_bad!(siocglifmuxid, SIOCGLIFMUXID, u8);
ioctl_write_ptr_bad!(siocslifmuxid, SIOCSLIFMUXID, u8);

extern "C" {
    /// `ctlptr`/`dataptr` point at `struct strbuf` records.
    pub fn getmsg(
        fildes: c_int,
        ctlptr: *mut c_void,
        dataptr: *mut c_void,
        flagsp: *mut c_int,
    ) -> c_int;
    pub fn putmsg(
        fildes: c_int,
        ctlptr: *const c_void,
        dataptr: *const c_void,
        flags: c_int,
    ) -> c_int;
}
