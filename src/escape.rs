// SPDX-License-Identifier: MIT OR Apache-2.0
//! ZDLE escape encoding and decoding.

use crate::{ZDLE, ZRUB0, ZRUB1};

/// ZDLE escape encoder.
///
/// Escaping is almost a pure byte map, but two rules force state onto the
/// encoder: a CR is escaped only when the previous byte was `@` (protects
/// the `@CR` modem hangup sequence), and the `ZSINIT`/`ZRINIT` capability
/// flags can demand escaping of all control bytes or all 8th-bit-set
/// bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Escaper {
    at_sign: bool,
    /// Escape every byte below 0x20 (ESCCTL/TESCCTL).
    pub esc_ctrl: bool,
    /// Escape every byte with the 8th bit set (ESC8/TESC8).
    pub esc_8bit: bool,
}

impl Escaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the lookback byte, e.g. after a line turn-around.
    pub fn reset(&mut self) {
        self.at_sign = false;
    }

    /// Appends `c` to `out`, ZDLE-escaped when the wire demands it.
    pub fn escape_into(&mut self, c: u8, out: &mut Vec<u8>) {
        let low = c & 0x7f;
        let must = c == ZDLE
            || low == 0x10            // DLE, either parity
            || low == 0x11            // XON
            || low == 0x13            // XOFF
            || low == 0x7f            // DEL (covers 0xff as well)
            || low == 0x1b            // ESC
            || low == 0x1d            // GS
            || (low == 0x0d && self.at_sign)
            || (self.esc_ctrl && low < 0x20)
            // Of the 8th-bit-set bytes only the control half survives the
            // XOR mapping; the rest must go raw.
            || (self.esc_8bit && c & 0xe0 == 0x80);
        if must {
            out.push(ZDLE);
            out.push(match c {
                0x7f => ZRUB0,
                0xff => ZRUB1,
                _ => c ^ 0x40,
            });
        } else {
            out.push(c);
        }
        self.at_sign = low == b'@';
    }

    /// Escapes a whole slice.
    pub fn escape_slice(&mut self, src: &[u8], out: &mut Vec<u8>) {
        for &c in src {
            self.escape_into(c, out);
        }
    }
}

/// Decodes the byte following a ZDLE. Returns `None` for followers that
/// no conforming encoder produces; subpacket terminators are handled by
/// the caller before this point.
pub fn unescape(c: u8) -> Option<u8> {
    match c {
        ZRUB0 => Some(0x7f),
        ZRUB1 => Some(0xff),
        _ if c & 0x60 == 0x40 => Some(c ^ 0x40),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(0x18, &[ZDLE, 0x58])]
    #[case(0x10, &[ZDLE, 0x50])]
    #[case(0x90, &[ZDLE, 0xd0])]
    #[case(0x11, &[ZDLE, 0x51])]
    #[case(0x91, &[ZDLE, 0xd1])]
    #[case(0x13, &[ZDLE, 0x53])]
    #[case(0x93, &[ZDLE, 0xd3])]
    #[case(0x7f, &[ZDLE, ZRUB0])]
    #[case(0xff, &[ZDLE, ZRUB1])]
    #[case(0x1b, &[ZDLE, 0x5b])]
    #[case(0x1d, &[ZDLE, 0x5d])]
    #[case(b'a', &[b'a'])]
    #[case(0x0d, &[0x0d])]
    fn test_escape(#[case] c: u8, #[case] expected: &[u8]) {
        let mut esc = Escaper::new();
        let mut out = Vec::new();
        esc.escape_into(c, &mut out);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_cr_after_at_sign() {
        let mut esc = Escaper::new();
        let mut out = Vec::new();
        esc.escape_slice(b"@\r", &mut out);
        assert_eq!(out, &[b'@', ZDLE, 0x4d]);
        out.clear();
        esc.escape_slice(b"x\r", &mut out);
        assert_eq!(out, b"x\r");
    }

    #[test]
    fn test_escape_control() {
        let mut esc = Escaper::new();
        esc.esc_ctrl = true;
        let mut out = Vec::new();
        esc.escape_into(0x01, &mut out);
        assert_eq!(out, &[ZDLE, 0x41]);
    }

    #[test]
    fn test_round_trip_identity() {
        for flags in 0..4u8 {
            let mut esc = Escaper::new();
            esc.esc_ctrl = flags & 1 != 0;
            esc.esc_8bit = flags & 2 != 0;
            let src: Vec<u8> = (0u16..=0xff).map(|b| b as u8).collect();
            let mut wire = Vec::new();
            esc.escape_slice(&src, &mut wire);

            let mut decoded = Vec::new();
            let mut pending = false;
            for &b in &wire {
                if pending {
                    decoded.push(unescape(b).unwrap());
                    pending = false;
                } else if b == ZDLE {
                    pending = true;
                } else {
                    decoded.push(b);
                }
            }
            assert_eq!(decoded, src);
        }
    }
}
