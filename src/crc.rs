// SPDX-License-Identifier: MIT OR Apache-2.0
//! CRC helpers for headers and data subpackets.

use crc::{Crc, CRC_16_XMODEM, CRC_32_ISO_HDLC};

/// CRC algorithm for `ZBIN` and `ZHEX` encoded transmissions.
pub(crate) const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC algorithm for `ZBIN32` encoded transmissions.
pub(crate) const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Computes the wire CRC of `buf`, optionally folding in the subpacket
/// terminator byte, and writes it into `out`. Returns the number of CRC
/// bytes. CRC-16 goes out big-endian; CRC-32 little-endian, matching the
/// byte order ZMODEM has used since its VAX days.
pub(crate) fn make(buf: &[u8], terminator: Option<u8>, bin32: bool, out: &mut [u8; 4]) -> usize {
    if bin32 {
        let mut digest = CRC32.digest();
        digest.update(buf);
        if let Some(t) = terminator {
            digest.update(&[t]);
        }
        out.copy_from_slice(&digest.finalize().to_le_bytes());
        4
    } else {
        let mut digest = CRC16.digest();
        digest.update(buf);
        if let Some(t) = terminator {
            digest.update(&[t]);
        }
        out[..2].copy_from_slice(&digest.finalize().to_be_bytes());
        2
    }
}

/// Validates received trailer bytes against a locally computed CRC.
pub(crate) fn check(buf: &[u8], terminator: Option<u8>, wire: &[u8], bin32: bool) -> bool {
    let mut local = [0u8; 4];
    let len = make(buf, terminator, bin32, &mut local);
    wire.len() == len && *wire == local[..len]
}
