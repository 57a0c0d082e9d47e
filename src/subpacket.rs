// SPDX-License-Identifier: MIT OR Apache-2.0
//! ZMODEM data subpackets and their terminators.

use crate::escape::Escaper;
use crate::frame::InvalidData;
use crate::host::Host;
use crate::{crc, Result, ZDLE};
use core::convert::TryFrom;
use std::fmt::{self, Display};

#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The subpacket terminator byte, sent ZDLE-prefixed after the payload.
pub enum Terminator {
    /// CRC next, frame ends, header follows
    ZCRCE = 0x68,
    /// CRC next, frame continues nonstop
    ZCRCG = 0x69,
    /// CRC next, send ZACK, frame continues nonstop
    ZCRCQ = 0x6a,
    /// CRC next, send ZACK, frame ends, header follows
    ZCRCW = 0x6b,
}

const TERMINATORS: &[Terminator] = &[
    Terminator::ZCRCE,
    Terminator::ZCRCG,
    Terminator::ZCRCQ,
    Terminator::ZCRCW,
];

impl Terminator {
    /// Whether the data frame ends here and a new header follows.
    pub const fn ends_frame(self) -> bool {
        matches!(self, Terminator::ZCRCE | Terminator::ZCRCW)
    }

    /// Whether the receiver must answer with ZACK.
    pub const fn wants_ack(self) -> bool {
        matches!(self, Terminator::ZCRCQ | Terminator::ZCRCW)
    }
}

impl TryFrom<u8> for Terminator {
    type Error = InvalidData;

    fn try_from(value: u8) -> core::result::Result<Self, InvalidData> {
        TERMINATORS
            .iter()
            .find(|e| value == **e as u8)
            .copied()
            .ok_or(InvalidData)
    }
}

impl Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#02x}", *self as u8)
    }
}

/// Serializes one data subpacket: escaped payload, ZDLE + terminator,
/// escaped CRC covering payload and terminator.
pub(crate) fn write<H: Host>(
    host: &mut H,
    esc: &mut Escaper,
    bin32: bool,
    terminator: Terminator,
    data: &[u8],
) -> Result<()> {
    let mut out = Vec::with_capacity(data.len() * 2 + 16);
    esc.escape_slice(data, &mut out);
    out.push(ZDLE);
    out.push(terminator as u8);
    let mut trailer = [0u8; 4];
    let trailer_len = crc::make(data, Some(terminator as u8), bin32, &mut trailer);
    esc.escape_slice(&trailer[..trailer_len], &mut out);
    log::trace!("send subpacket {} len={}", terminator, data.len());
    host.send(&out)
}

/// Validates a reassembled subpacket against its received CRC trailer.
pub(crate) fn check_crc(data: &[u8], terminator: Terminator, wire: &[u8], bin32: bool) -> bool {
    crc::check(data, Some(terminator as u8), wire, bin32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(Terminator::ZCRCE, true, false)]
    #[case(Terminator::ZCRCG, false, false)]
    #[case(Terminator::ZCRCQ, false, true)]
    #[case(Terminator::ZCRCW, true, true)]
    fn test_terminator_semantics(
        #[case] terminator: Terminator,
        #[case] ends: bool,
        #[case] acks: bool,
    ) {
        assert_eq!(terminator.ends_frame(), ends);
        assert_eq!(terminator.wants_ack(), acks);
    }

    #[rstest::rstest]
    #[case(false, Terminator::ZCRCE, &[])]
    #[case(false, Terminator::ZCRCW, &[0x00])]
    #[case(true, Terminator::ZCRCQ, &[0, 1, 2, 3, 4, 0x60, 0x60])]
    #[case(true, Terminator::ZCRCG, &[0x18, 0x11, 0x7f, 0xff, 0x0d])]
    fn test_write_and_check(
        #[case] bin32: bool,
        #[case] terminator: Terminator,
        #[case] data: &[u8],
    ) {
        let mut wire = Vec::new();
        write(&mut wire, &mut Escaper::new(), bin32, terminator, data).unwrap();

        // Decode the escaped stream by hand and validate the trailer.
        let mut decoded = Vec::new();
        let mut pending = false;
        let mut seen = None;
        for &b in &wire {
            if pending {
                pending = false;
                if let Ok(t) = Terminator::try_from(b) {
                    seen = Some(t);
                } else {
                    decoded.push(crate::escape::unescape(b).unwrap());
                }
            } else if b == ZDLE {
                pending = true;
            } else {
                decoded.push(b);
            }
        }
        assert_eq!(seen, Some(terminator));
        let crc_len = if bin32 { 4 } else { 2 };
        let (payload, trailer) = decoded.split_at(decoded.len() - crc_len);
        assert_eq!(payload, data);
        assert!(check_crc(payload, terminator, trailer, bin32));
    }
}
