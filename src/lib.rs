// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sans-I/O engine for the ZMODEM file transfer protocol, with automatic
//! fallback to YMODEM and XMODEM.
//!
//! The engine never touches a socket, a serial port or the filesystem:
//! the host program reads the wire and calls [`Session::feed`], runs the
//! clock and calls [`Session::on_timeout`], and supplies everything else
//! through the [`Host`] trait (wire output, file access, progress
//! reporting). One call to `feed` drives the whole pipeline: bytes are
//! unescaped and reassembled into headers and data subpackets, the
//! protocol state machine picks a transition, and any response bytes are
//! handed back to [`Host::send`].
//!
//! A minimal receive loop:
//!
//! ```no_run
//! # fn read_wire(_t: u16) -> Vec<u8> { Vec::new() }
//! # struct MyHost;
//! # impl zmcore::Host for MyHost {
//! #     fn send(&mut self, _data: &[u8]) -> zmcore::Result<()> { Ok(()) }
//! # }
//! use zmcore::{Config, Control, Session};
//!
//! let mut host = MyHost;
//! let mut session = Session::new_receiver(Config::default());
//! session.start(&mut host)?;
//! loop {
//!     let input = read_wire(session.timeout_secs());
//!     let control = if input.is_empty() {
//!         session.on_timeout(&mut host)?
//!     } else {
//!         session.feed(&mut host, &input)?
//!     };
//!     if control == Control::Done {
//!         break;
//!     }
//! }
//! # Ok::<(), zmcore::Error>(())
//! ```
//!
//! The sender side works the same way, with [`Session::send_file`]
//! offering each file and [`Session::finish`] closing the batch. A
//! returned [`Control::Done`] means "previous operation complete": offer
//! the next file or finish.

mod crc;
mod escape;
mod error;
mod frame;
mod host;
mod proto;
mod recv;
mod send;
mod session;
mod subpacket;
mod ymodem;

pub use error::{Control, Error, Result};
pub use escape::{unescape, Escaper};
pub use frame::{
    Encoding, FrameKind, Header, InvalidData, Zrinit, Zsinit, ZCBIN, ZCNL, ZCRESUM, ZMCLOB, ZMCRC,
    ZMMASK, ZMSKNOLOC,
};
pub use host::{attn_steps, AttnStep, FileDisposition, FileInfo, Host, Status};
pub use session::{Config, Protocol, Role, Session, State, Streaming};
pub use subpacket::Terminator;

/// Header pad character, `'*'`.
pub const ZPAD: u8 = b'*';
/// The escape byte. Doubles as CAN, which is why five of them in a row
/// reads as a cancel.
pub const ZDLE: u8 = 0x18;
pub const XON: u8 = 0x11;
pub const XOFF: u8 = 0x13;
pub const CAN: u8 = 0x18;

/// Attention-string sentinel: transmit a line break here.
pub const ATTN_BREAK: u8 = 0xdd;
/// Attention-string sentinel: pause for about a second here.
pub const ATTN_PAUSE: u8 = 0xde;

pub(crate) const ZRUB0: u8 = b'l';
pub(crate) const ZRUB1: u8 = b'm';

pub(crate) const SOH: u8 = 0x01;
pub(crate) const STX: u8 = 0x02;
pub(crate) const EOT: u8 = 0x04;
pub(crate) const ACK: u8 = 0x06;
pub(crate) const NAK: u8 = 0x15;
pub(crate) const BS: u8 = 0x08;
pub(crate) const SUB: u8 = 0x1a;

/// Sent in the ZCOMPL reply to a refused ZCOMMAND.
pub(crate) const EPERM: u8 = 1;

/// Idle noise tolerated while streaming before the sender inserts a
/// waiting packet.
pub(crate) const MAX_NOISE: u32 = 64;
/// Data errors tolerated before the receiver cancels the transfer.
pub(crate) const MAX_ERRS: u32 = 20;
/// Reasonable seconds for the sender to answer a receiver request.
pub(crate) const RESPONSE_TIME: u16 = 10;
/// Receiver serial number, echoed in the ZSINIT ack.
pub(crate) const SERIAL_NUMBER: u32 = 1;
/// Reassembly buffer size; the classic engines allocated 8 KiB.
pub(crate) const RX_BUFFER_SIZE: usize = 8192;
