// SPDX-License-Identifier: MIT OR Apache-2.0
//! ZMODEM header frames: type codes, encodings and wire serialization.

use crate::escape::Escaper;
use crate::host::Host;
use crate::{crc, Result, XON, ZDLE, ZPAD};
use bitflags::bitflags;
use core::convert::TryFrom;
use std::fmt::{self, Display};

/// A wire byte that does not name a known encoding, frame type or
/// terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidData;

#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Header frame encodings
pub enum Encoding {
    ZBIN = 0x41,
    ZHEX = 0x42,
    ZBIN32 = 0x43,
}

const ENCODINGS: &[Encoding] = &[Encoding::ZBIN, Encoding::ZHEX, Encoding::ZBIN32];

impl TryFrom<u8> for Encoding {
    type Error = InvalidData;

    fn try_from(value: u8) -> core::result::Result<Self, InvalidData> {
        ENCODINGS
            .iter()
            .find(|e| value == **e as u8)
            .copied()
            .ok_or(InvalidData)
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#02x}", *self as u8)
    }
}

#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Header frame types
pub enum FrameKind {
    /// Request receive init
    ZRQINIT = 0,
    /// Receiver capabilities and packet size
    ZRINIT = 1,
    /// Send init sequence, defines the attention string
    ZSINIT = 2,
    /// ACK to above
    ZACK = 3,
    /// File name from sender
    ZFILE = 4,
    /// To sender: skip this file
    ZSKIP = 5,
    /// Last packet was garbled
    ZNAK = 6,
    /// Abort batch transfers
    ZABORT = 7,
    /// Finish session
    ZFIN = 8,
    /// Resume data trans at this position
    ZRPOS = 9,
    /// Data packet(s) follow
    ZDATA = 10,
    /// End of file
    ZEOF = 11,
    /// Fatal Read or Write error detected
    ZFERR = 12,
    /// Request for file CRC and response
    ZCRC = 13,
    /// Receiver's challenge
    ZCHALLENGE = 14,
    /// Request is complete
    ZCOMPL = 15,
    /// Other end canned session with CAN*5
    ZCAN = 16,
    /// Request for free bytes on filesystem
    ZFREECNT = 17,
    /// Command from sending program
    ZCOMMAND = 18,
    /// Output to standard error, data follows
    ZSTDERR = 19,
}

const KINDS: &[FrameKind] = &[
    FrameKind::ZRQINIT,
    FrameKind::ZRINIT,
    FrameKind::ZSINIT,
    FrameKind::ZACK,
    FrameKind::ZFILE,
    FrameKind::ZSKIP,
    FrameKind::ZNAK,
    FrameKind::ZABORT,
    FrameKind::ZFIN,
    FrameKind::ZRPOS,
    FrameKind::ZDATA,
    FrameKind::ZEOF,
    FrameKind::ZFERR,
    FrameKind::ZCRC,
    FrameKind::ZCHALLENGE,
    FrameKind::ZCOMPL,
    FrameKind::ZCAN,
    FrameKind::ZFREECNT,
    FrameKind::ZCOMMAND,
    FrameKind::ZSTDERR,
];

impl TryFrom<u8> for FrameKind {
    type Error = InvalidData;

    fn try_from(value: u8) -> core::result::Result<Self, InvalidData> {
        KINDS
            .iter()
            .find(|t| value == **t as u8)
            .copied()
            .ok_or(InvalidData)
    }
}

impl Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#02x}", *self as u8)
    }
}

bitflags! {
   /// `ZRINIT` flags, describing receiver capabilities
   #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
   pub struct Zrinit: u8 {
        /// Can send and receive in full-duplex
        const CANFDX = 0x01;
        /// Can receive data in parallel with disk I/O
        const CANOVIO = 0x02;
        /// Can send a break signal
        const CANBRK = 0x04;
        /// Can decrypt
        const CANCRY = 0x08;
        /// Can uncompress
        const CANLZW = 0x10;
        /// Can use 32-bit frame check
        const CANFC32 = 0x20;
        /// Expects control characters to be escaped
        const ESCCTL = 0x40;
        /// Expects 8th bit to be escaped
        const ESC8 = 0x80;
    }
}

bitflags! {
   /// `ZSINIT` flags, describing sender capabilities
   #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
   pub struct Zsinit: u8 {
        /// Tx needs control characters escaped
        const TESCCTL = 0x40;
        /// Tx needs 8th bit escaped
        const TESC8 = 0x80;
    }
}

/// ZFILE conversion option (f0): binary transfer
pub const ZCBIN: u8 = 1;
/// ZFILE conversion option (f0): convert NL to the local convention
pub const ZCNL: u8 = 2;
/// ZFILE conversion option (f0): resume an interrupted transfer
pub const ZCRESUM: u8 = 3;
/// ZFILE management option (f1): transfer if CRC or length differs
pub const ZMCRC: u8 = 2;
/// ZFILE management option (f1): replace an existing file
pub const ZMCLOB: u8 = 4;
/// Mask isolating the f1 management option
pub const ZMMASK: u8 = 0x1f;
/// ZFILE management modifier (f1): skip if not present at the receiver
pub const ZMSKNOLOC: u8 = 0x80;

/// A ZMODEM header frame: a type code and four payload bytes.
///
/// The payload is position-dependent: a 32-bit little-endian number for
/// the offset-carrying kinds, four independent flag bytes for the
/// negotiation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    encoding: Encoding,
    kind: FrameKind,
    data: [u8; 4],
}

impl Header {
    pub const fn new(encoding: Encoding, kind: FrameKind) -> Self {
        Self {
            encoding,
            kind,
            data: [0; 4],
        }
    }

    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub const fn kind(&self) -> FrameKind {
        self.kind
    }

    /// The payload interpreted as a little-endian count or offset.
    pub const fn count(&self) -> u32 {
        u32::from_le_bytes(self.data)
    }

    pub const fn data(&self) -> &[u8; 4] {
        &self.data
    }

    pub const fn with_count(self, count: u32) -> Self {
        Self {
            encoding: self.encoding,
            kind: self.kind,
            data: count.to_le_bytes(),
        }
    }

    pub const fn with_data(self, data: [u8; 4]) -> Self {
        Self {
            encoding: self.encoding,
            kind: self.kind,
            data,
        }
    }

    /// Serializes the header into `out`, ZDLE-escaping the binary forms.
    pub fn encode_into(&self, esc: &mut Escaper, out: &mut Vec<u8>) {
        out.push(ZPAD);
        if self.encoding == Encoding::ZHEX {
            out.push(ZPAD);
        }
        out.push(ZDLE);
        out.push(self.encoding as u8);

        let mut body = [0u8; 5];
        body[0] = self.kind as u8;
        body[1..].copy_from_slice(&self.data);
        let mut trailer = [0u8; 4];
        let trailer_len = crc::make(&body, None, self.encoding == Encoding::ZBIN32, &mut trailer);

        if self.encoding == Encoding::ZHEX {
            let mut raw = [0u8; 7];
            raw[..5].copy_from_slice(&body);
            raw[5..].copy_from_slice(&trailer[..2]);
            let mut digits = [0u8; 14];
            // Lengths are fixed, the encode cannot fail.
            let _ = hex::encode_to_slice(raw, &mut digits);
            out.extend_from_slice(&digits);
            out.extend_from_slice(b"\r\n");
            // An XON tail restarts paused senders; ZACK and ZFIN flow the
            // other way and go without.
            if self.kind != FrameKind::ZACK && self.kind != FrameKind::ZFIN {
                out.push(XON);
            }
        } else {
            esc.escape_slice(&body, out);
            esc.escape_slice(&trailer[..trailer_len], out);
        }
    }

    /// Serializes the header and hands it to the host's wire output.
    pub fn write<H: Host>(&self, host: &mut H, esc: &mut Escaper) -> Result<()> {
        let mut out = Vec::with_capacity(32);
        self.encode_into(esc, &mut out);
        log::trace!("send header {} {:02x?}", self, self.data);
        host.send(&out)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:8} {}", self.encoding, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(Encoding::ZBIN, FrameKind::ZRQINIT, [0; 4], &[ZPAD, ZDLE, 0x41, 0, 0, 0, 0, 0, 0, 0])]
    #[case(Encoding::ZBIN32, FrameKind::ZRQINIT, [0; 4], &[ZPAD, ZDLE, 0x43, 0, 0, 0, 0, 0, 29, 247, 34, 198])]
    #[case(Encoding::ZBIN, FrameKind::ZRQINIT, [1; 4], &[ZPAD, ZDLE, 0x41, 0, 1, 1, 1, 1, 98, 148])]
    #[case(Encoding::ZHEX, FrameKind::ZRQINIT, [1; 4], &[ZPAD, ZPAD, ZDLE, 0x42, b'0', b'0', b'0', b'1', b'0', b'1', b'0', b'1', b'0', b'1', b'6', b'2', b'9', b'4', b'\r', b'\n', XON])]
    fn test_header_encode(
        #[case] encoding: Encoding,
        #[case] kind: FrameKind,
        #[case] data: [u8; 4],
        #[case] expected: &[u8],
    ) {
        let header = Header::new(encoding, kind).with_data(data);
        let mut out = Vec::new();
        header.encode_into(&mut Escaper::new(), &mut out);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_hex_header_known_vector() {
        let header = Header::new(Encoding::ZHEX, FrameKind::ZRINIT).with_data([0, 0, 0, 0x23]);
        let mut out = Vec::new();
        header.encode_into(&mut Escaper::new(), &mut out);
        assert_eq!(out, b"**\x18B0100000023a87c\r\n\x11");
    }

    #[test]
    fn test_count_round_trip() {
        let header = Header::new(Encoding::ZBIN32, FrameKind::ZRPOS).with_count(0x0123_4567);
        assert_eq!(header.count(), 0x0123_4567);
        assert_eq!(header.data(), &[0x67, 0x45, 0x23, 0x01]);
    }

    #[test]
    fn test_kind_try_from() {
        assert_eq!(FrameKind::try_from(9), Ok(FrameKind::ZRPOS));
        assert!(FrameKind::try_from(20).is_err());
    }
}
