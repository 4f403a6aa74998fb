//! Byte-exact encodings of the records exchanged with the STREAMS kernel interfaces.
//!
//! Fields are written in native byte order at the offsets the amd64 illumos
//! headers use. Every decoder validates the buffer length before reading.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, NativeEndian};
use std::ops::{Deref, DerefMut};

/// `sizeof (struct lifreq)`.
pub const LIFREQ_SIZE: usize = 0x178;
/// `LIFNAMSIZ`, including the terminating NUL.
pub const LIFNAMSIZ: usize = 32;
pub const LIFR_NAME_OFFSET: usize = 0;
pub const LIFR_TYPE_OFFSET: usize = 36;
/// `lifr_lifru.lif_muxid[0]`, the IP multiplexor id.
pub const LIFR_IP_MUXID_OFFSET: usize = 40;
/// `lifr_lifru.lif_muxid[1]`, the ARP multiplexor id.
pub const LIFR_ARP_MUXID_OFFSET: usize = 44;

/// `sizeof (struct strioctl)`.
pub const STRIOCTL_SIZE: usize = 0x18;
pub const IC_CMD_OFFSET: usize = 0;
pub const IC_TIMOUT_OFFSET: usize = 4;
pub const IC_LEN_OFFSET: usize = 8;
pub const IC_DP_OFFSET: usize = 16;

/// `sizeof (struct strbuf)`.
pub const STRBUF_SIZE: usize = 0x10;
pub const SB_MAXLEN_OFFSET: usize = 0;
pub const SB_LEN_OFFSET: usize = 4;
pub const SB_BUF_OFFSET: usize = 8;

/// A fixed-size record aligned for the kernel to read its pointer fields.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawRecord<const N: usize>(pub [u8; N]);

impl<const N: usize> RawRecord<N> {
    pub fn zeroed() -> Self {
        RawRecord([0; N])
    }
}

impl<const N: usize> Deref for RawRecord<N> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> DerefMut for RawRecord<N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

fn check_len(record: &'static str, expected: usize, buf: &[u8]) -> Result<()> {
    if buf.len() != expected {
        return Err(Error::Layout {
            record,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Logical interface request (`struct lifreq`), restricted to the fields used here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LifReq {
    pub name: String,
    pub lif_type: u32,
    pub ip_muxid: i32,
    pub arp_muxid: i32,
}

impl LifReq {
    pub fn new(name: &str) -> Result<Self> {
        if name.len() >= LIFNAMSIZ {
            return Err(Error::NameTooLong);
        }
        Ok(LifReq {
            name: name.to_string(),
            ..Default::default()
        })
    }

    pub fn encode(&self) -> Result<RawRecord<LIFREQ_SIZE>> {
        let mut raw = RawRecord::zeroed();
        self.encode_into(&mut raw)?;
        Ok(raw)
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        check_len("lifreq", LIFREQ_SIZE, buf)?;
        let name = self.name.as_bytes();
        if name.len() >= LIFNAMSIZ {
            return Err(Error::NameTooLong);
        }
        buf.fill(0);
        buf[LIFR_NAME_OFFSET..LIFR_NAME_OFFSET + name.len()].copy_from_slice(name);
        NativeEndian::write_u32(&mut buf[LIFR_TYPE_OFFSET..], self.lif_type);
        NativeEndian::write_i32(&mut buf[LIFR_IP_MUXID_OFFSET..], self.ip_muxid);
        NativeEndian::write_i32(&mut buf[LIFR_ARP_MUXID_OFFSET..], self.arp_muxid);
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len("lifreq", LIFREQ_SIZE, buf)?;
        let field = &buf[LIFR_NAME_OFFSET..LIFR_NAME_OFFSET + LIFNAMSIZ];
        let end = field.iter().position(|&b| b == 0).unwrap_or(LIFNAMSIZ);
        Ok(LifReq {
            name: String::from_utf8_lossy(&field[..end]).into_owned(),
            lif_type: NativeEndian::read_u32(&buf[LIFR_TYPE_OFFSET..]),
            ip_muxid: NativeEndian::read_i32(&buf[LIFR_IP_MUXID_OFFSET..]),
            arp_muxid: NativeEndian::read_i32(&buf[LIFR_ARP_MUXID_OFFSET..]),
        })
    }
}

/// STREAMS ioctl request (`struct strioctl`) carried by `I_STR`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrIoctl {
    pub cmd: i32,
    pub timeout: i32,
    pub len: i32,
    /// Address of the request payload.
    pub dp: u64,
}

impl StrIoctl {
    pub fn encode(&self) -> RawRecord<STRIOCTL_SIZE> {
        let mut raw = RawRecord::zeroed();
        NativeEndian::write_i32(&mut raw[IC_CMD_OFFSET..], self.cmd);
        NativeEndian::write_i32(&mut raw[IC_TIMOUT_OFFSET..], self.timeout);
        NativeEndian::write_i32(&mut raw[IC_LEN_OFFSET..], self.len);
        NativeEndian::write_u64(&mut raw[IC_DP_OFFSET..], self.dp);
        raw
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len("strioctl", STRIOCTL_SIZE, buf)?;
        Ok(StrIoctl {
            cmd: NativeEndian::read_i32(&buf[IC_CMD_OFFSET..]),
            timeout: NativeEndian::read_i32(&buf[IC_TIMOUT_OFFSET..]),
            len: NativeEndian::read_i32(&buf[IC_LEN_OFFSET..]),
            dp: NativeEndian::read_u64(&buf[IC_DP_OFFSET..]),
        })
    }
}

/// STREAMS message buffer descriptor (`struct strbuf`) for `getmsg`/`putmsg`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrBuf {
    pub maxlen: i32,
    /// Bytes present in the buffer; `-1` when the message had no such part.
    pub len: i32,
    pub buf: u64,
}

impl StrBuf {
    pub fn encode(&self) -> RawRecord<STRBUF_SIZE> {
        let mut raw = RawRecord::zeroed();
        NativeEndian::write_i32(&mut raw[SB_MAXLEN_OFFSET..], self.maxlen);
        NativeEndian::write_i32(&mut raw[SB_LEN_OFFSET..], self.len);
        NativeEndian::write_u64(&mut raw[SB_BUF_OFFSET..], self.buf);
        raw
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len("strbuf", STRBUF_SIZE, buf)?;
        Ok(StrBuf {
            maxlen: NativeEndian::read_i32(&buf[SB_MAXLEN_OFFSET..]),
            len: NativeEndian::read_i32(&buf[SB_LEN_OFFSET..]),
            buf: NativeEndian::read_u64(&buf[SB_BUF_OFFSET..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifreq_field_offsets() {
        let req = LifReq {
            name: "tun3".into(),
            lif_type: 7,
            ip_muxid: 0x1234,
            arp_muxid: -1,
        };
        let raw = req.encode().unwrap();
        assert_eq!(raw.len(), LIFREQ_SIZE);
        assert_eq!(&raw[..5], b"tun3\0");
        assert_eq!(NativeEndian::read_u32(&raw[36..40]), 7);
        assert_eq!(NativeEndian::read_i32(&raw[40..44]), 0x1234);
        assert_eq!(NativeEndian::read_i32(&raw[44..48]), -1);
        assert!(raw[48..].iter().all(|&b| b == 0));
        assert_eq!(LifReq::decode(&raw).unwrap(), req);
    }

    #[test]
    fn lifreq_rejects_long_names() {
        assert!(matches!(
            LifReq::new(&"x".repeat(LIFNAMSIZ)),
            Err(Error::NameTooLong)
        ));
        assert!(LifReq::new(&"x".repeat(LIFNAMSIZ - 1)).is_ok());
    }

    #[test]
    fn decoders_validate_length() {
        let err = LifReq::decode(&[0u8; 0x100]).unwrap_err();
        assert!(matches!(
            err,
            Error::Layout {
                record: "lifreq",
                expected: LIFREQ_SIZE,
                actual: 0x100
            }
        ));
        assert!(StrIoctl::decode(&[0u8; STRIOCTL_SIZE + 1]).is_err());
        assert!(StrBuf::decode(&[0u8; 8]).is_err());
        let mut short = [0u8; 16];
        assert!(LifReq::default().encode_into(&mut short).is_err());
    }

    #[test]
    fn strioctl_layout() {
        let raw = StrIoctl {
            cmd: 0x540001,
            timeout: 0,
            len: 4,
            dp: 0xdead_beef_0000_1000,
        }
        .encode();
        assert_eq!(NativeEndian::read_i32(&raw[0..4]), 0x540001);
        assert_eq!(NativeEndian::read_i32(&raw[4..8]), 0);
        assert_eq!(NativeEndian::read_i32(&raw[8..12]), 4);
        assert_eq!(&raw[12..16], &[0; 4]);
        assert_eq!(NativeEndian::read_u64(&raw[16..24]), 0xdead_beef_0000_1000);
    }

    #[test]
    fn strbuf_layout() {
        let raw = StrBuf {
            maxlen: 1500,
            len: -1,
            buf: 0x1000,
        }
        .encode();
        assert_eq!(NativeEndian::read_i32(&raw[0..4]), 1500);
        assert_eq!(NativeEndian::read_i32(&raw[4..8]), -1);
        assert_eq!(NativeEndian::read_u64(&raw[8..16]), 0x1000);
        assert_eq!(StrBuf::decode(&raw).unwrap().len, -1);
    }

    #[test]
    fn records_are_pointer_aligned() {
        assert_eq!(std::mem::align_of::<RawRecord<STRBUF_SIZE>>(), 8);
        assert_eq!(std::mem::size_of::<RawRecord<LIFREQ_SIZE>>(), LIFREQ_SIZE);
    }
}
