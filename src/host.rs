// SPDX-License-Identifier: MIT OR Apache-2.0
//! The host interface: everything the engine cannot do itself.
//!
//! The engine performs no I/O. Wire output, file access, flushing and
//! progress reporting all go through a [`Host`] implementation passed
//! into each entry point.

use crate::session::Streaming;
use crate::{Error, Result, ATTN_BREAK, ATTN_PAUSE};

/// Attributes of the file in transfer, as carried by the ZFILE frame
/// (or the YMODEM packet 0).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    /// Length in bytes; 0 when the sender did not say.
    pub len: u32,
    /// Modification time, seconds since the epoch.
    pub date: u32,
    /// Unix permission bits.
    pub mode: u32,
    pub file_type: u32,
    /// Advisory: files left in the batch, including this one.
    pub files_remaining: u32,
    /// Advisory: bytes left in the batch, including this file.
    pub bytes_remaining: u32,
    /// f0: conversion option (ZCBIN, ZCNL, ZCRESUM).
    pub conversion: u8,
    /// f1: management option (ZMCRC and friends, ZMSKNOLOC modifier).
    pub management: u8,
    /// f2: transport option (compression hint; never acted on here).
    pub transport: u8,
    /// f3: extended options (sparse hint; never acted on here).
    pub extended: u8,
}

/// The receiving host's verdict on an offered file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileDisposition {
    /// Take the file, starting at `offset`. Non-zero only makes sense
    /// for a ZCRESUM offer, where it is the length already on disk.
    Accept { offset: u32 },
    /// Refuse the file; the sender moves on to the next one.
    Skip,
}

/// Progress and diagnostic events, reported through [`Host::status`].
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    /// Total bytes received for the current file.
    BytesReceived(u32),
    /// Total bytes sent for the current file.
    BytesSent(u32),
    /// The peer went quiet; the value is the consecutive timeout count.
    PeerTimeout(u32),
    /// The peer reports the session was cancelled.
    RemoteCancel,
    /// A header arrived that the current state has no use for. The value
    /// is the raw header type byte. Not fatal.
    ProtocolError(u8),
    /// Message the peer asked to put on standard error.
    RemoteMessage(String),
    /// A data subpacket failed its CRC; the value is the running error
    /// count.
    DataError(u32),
    /// A host file callback failed mid-transfer.
    FileError,
    FileBegin(String),
    FileEnd(String),
    FileSkip(String),
    /// The streaming discipline chosen after capability exchange.
    Streaming(Streaming),
}

/// One step of an attention sequence. See [`attn_steps`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttnStep<'a> {
    /// Send these bytes verbatim.
    Bytes(&'a [u8]),
    /// Transmit a line break.
    Break,
    /// Pause for about one second.
    Pause,
}

/// Splits an attention string into sendable steps, decoding the two
/// in-band sentinels (`ATTN_BREAK`, `ATTN_PAUSE`).
pub fn attn_steps(seq: &[u8]) -> impl Iterator<Item = AttnStep<'_>> {
    AttnSteps { rest: seq }
}

struct AttnSteps<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for AttnSteps<'a> {
    type Item = AttnStep<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest[0] {
            ATTN_BREAK => {
                self.rest = &self.rest[1..];
                Some(AttnStep::Break)
            }
            ATTN_PAUSE => {
                self.rest = &self.rest[1..];
                Some(AttnStep::Pause)
            }
            _ => {
                let end = self
                    .rest
                    .iter()
                    .position(|&b| b == ATTN_BREAK || b == ATTN_PAUSE)
                    .unwrap_or(self.rest.len());
                let (chunk, rest) = self.rest.split_at(end);
                self.rest = rest;
                Some(AttnStep::Bytes(chunk))
            }
        }
    }
}

/// Host callbacks. Only [`send`](Host::send) is mandatory; the file
/// callbacks default to failing so a receive-only host need not
/// implement the sender half and vice versa.
pub trait Host {
    /// Queue bytes for the wire. Whatever is written here is the
    /// engine's sole output.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Discard any input read from the wire but not yet fed to the
    /// engine. (Input already inside a `feed` call is dropped by the
    /// engine itself.)
    fn flush_input(&mut self) {}

    /// Push previously queued output onto the wire.
    fn flush_output(&mut self) {}

    /// Emit the attention sequence. The default sends the verbatim
    /// chunks and skips break/pause, which is right for transports
    /// without out-of-band signalling; serial hosts should walk
    /// [`attn_steps`] themselves.
    fn attention(&mut self, seq: &[u8]) -> Result<()> {
        for step in attn_steps(seq) {
            if let AttnStep::Bytes(chunk) = step {
                self.send(chunk)?;
            }
        }
        Ok(())
    }

    /// Progress and diagnostics. Purely informational.
    fn status(&mut self, _status: &Status) {}

    /// Text seen on the wire while the engine was idle (login banners,
    /// line noise, the peer's shell prompt).
    fn idle_bytes(&mut self, _data: &[u8]) {}

    /// Receiver policy: decide whether to take an offered file. `crc`
    /// is the whole-file CRC-32 when the sender supplied one.
    fn open_file(&mut self, _info: &FileInfo, _crc: Option<u32>) -> Result<FileDisposition> {
        Ok(FileDisposition::Skip)
    }

    /// Append received data to the open file.
    fn write_file(&mut self, _data: &[u8]) -> Result<()> {
        Err(Error::System)
    }

    /// Close the open file. Called exactly once per accepted file.
    fn close_file(&mut self) {}

    /// Sender: read the next bytes of the outgoing file. Returning less
    /// than `buf.len()` (eventually 0) signals end of file.
    fn read_file(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::System)
    }

    /// Sender: reposition the outgoing file, typically after ZRPOS.
    fn seek_file(&mut self, _offset: u32) -> Result<()> {
        Err(Error::System)
    }

    /// Sender: CRC-32 over the entire outgoing file, for the ZCRC reply.
    fn file_crc32(&mut self) -> Result<u32> {
        Err(Error::System)
    }
}

/// A plain buffer collects wire output; handy for tests and for hosts
/// that drain the queue themselves.
impl Host for Vec<u8> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attn_steps() {
        let seq = [b'h', b'i', ATTN_BREAK, b'!', ATTN_PAUSE, ATTN_PAUSE];
        let steps: Vec<_> = attn_steps(&seq).collect();
        assert_eq!(
            steps,
            vec![
                AttnStep::Bytes(b"hi"),
                AttnStep::Break,
                AttnStep::Bytes(b"!"),
                AttnStep::Pause,
                AttnStep::Pause,
            ]
        );
        assert_eq!(attn_steps(&[]).count(), 0);
    }
}
