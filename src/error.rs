// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session outcome and error types.

use thiserror::Error;

/// Fatal session errors. Once one of these is returned from
/// [`Session::feed`](crate::Session::feed) or
/// [`Session::on_timeout`](crate::Session::on_timeout), the engine has
/// already emitted its wire epitaph and the session must not be fed
/// further input.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The peer sent five consecutive CAN bytes, or the host aborted.
    #[error("session cancelled by the peer or the host")]
    Cancelled,
    /// No usable input arrived within the state's timeout and the retry
    /// budget is spent.
    #[error("timed out waiting for the peer")]
    ReceiveTimeout,
    /// The peer stopped acknowledging transmitted data.
    #[error("peer did not acknowledge in time")]
    SendTimeout,
    /// CRC failures on data subpackets exceeded the error budget.
    #[error("too many data errors")]
    DataError,
    /// A YMODEM/XMODEM packet arrived out of sequence.
    #[error("packet received out of sequence")]
    Sequence,
    /// A host callback reported failure.
    #[error("host callback failed")]
    System,
    /// The file to be transferred could not be opened.
    #[error("cannot open the requested file")]
    CannotOpen,
    /// The file name and attributes do not fit in a single packet.
    #[error("file name does not fit in a packet")]
    FilenameTooLong,
}

pub type Result<T> = core::result::Result<T, Error>;

/// What a successful call to the engine means for the host.
///
/// `Done` mirrors the classic driver contract: the previous operation has
/// completed, so either hand the engine the next file, call
/// [`Session::finish`](crate::Session::finish), or stop if the whole
/// session is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Keep feeding wire input (and the clock).
    Pending,
    /// The current operation finished.
    Done,
}
