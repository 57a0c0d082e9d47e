// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sender-side actions: capability exchange, file offers, the data pump
//! and its terminator selection, end-of-file and session teardown.

use crate::frame::{FrameKind, Zrinit, Zsinit};
use crate::host::{Host, Status};
use crate::session::{Session, State, Streaming};
use crate::subpacket::{self, Terminator};
use crate::{Control, Error, Result};

/// Appends `value` in octal, the notation the ZFILE info string inherited
/// from `ls`-era Unix.
pub(crate) fn push_octal(out: &mut Vec<u8>, mut value: u32) {
    let mut digits = [0u8; 11];
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (value & 7) as u8;
        value >>= 3;
        if value == 0 {
            break;
        }
    }
    out.extend_from_slice(&digits[i..]);
}

/// ZRINIT landed: record the receiver's capabilities and derive the
/// streaming discipline.
pub(crate) fn got_rinit<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.rcv_buffer_size = s.hdr_data[1] as u32 | (s.hdr_data[2] as u32) << 8;
    s.rcv_flags = Zrinit::from_bits_truncate(s.hdr_data[4]);
    s.crc32 = s.rcv_flags.contains(Zrinit::CANFC32);
    s.escaper.esc_ctrl = s.config.escape_control || s.rcv_flags.contains(Zrinit::ESCCTL);
    s.escaper.esc_8bit = s.rcv_flags.contains(Zrinit::ESC8);
    s.rinit_seen = true;

    let duplex =
        s.rcv_flags.contains(Zrinit::CANFDX) && s.rcv_flags.contains(Zrinit::CANOVIO);
    s.streaming = if duplex && s.config.can_sample && s.rcv_buffer_size == 0 {
        if s.config.window_size == 0 {
            Streaming::Full
        } else {
            Streaming::StrWindow
        }
    } else if duplex && s.rcv_buffer_size == 0 {
        // No way to notice a mid-stream interrupt; count ZACKs instead.
        Streaming::SlidingWindow
    } else {
        Streaming::Segmented
    };
    log::debug!(
        "peer caps {:?}, bufsize {}, streaming {:?}",
        s.rcv_flags,
        s.rcv_buffer_size,
        s.streaming
    );
    host.status(&Status::Streaming(s.streaming));

    if !s.config.attn.is_empty() || !s.config.sender_flags.is_empty() {
        return send_zsinit(s, host);
    }
    if s.file_pending {
        s.file_pending = false;
        send_filename(s, host)?;
        return Ok(Control::Pending);
    }
    Ok(Control::Done)
}

/// ZSINIT carries our flags and the attention string the receiver should
/// use to interrupt us.
pub(crate) fn send_zsinit<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.state = State::TInit;
    s.timeout = 60;
    let mut flags = s.config.sender_flags;
    if s.config.escape_control {
        flags |= Zsinit::TESCCTL;
    }
    s.send_bin_header(host, FrameKind::ZSINIT, [0, 0, 0, flags.bits()])?;
    let mut payload = s.config.attn.clone();
    payload.push(0);
    subpacket::write(host, &mut s.escaper, s.crc32, Terminator::ZCRCW, &payload)?;
    Ok(Control::Pending)
}

/// The ZSINIT got its ZACK; the file offer can proceed.
pub(crate) fn sinit_acked<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    if s.file_pending {
        s.file_pending = false;
        send_filename(s, host)?;
        return Ok(Control::Pending);
    }
    Ok(Control::Done)
}

/// Sends the ZFILE header plus the name-and-attributes subpacket.
pub(crate) fn send_filename<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    let info = s.file.clone().ok_or(Error::CannotOpen)?;
    s.state = State::FileWait;
    s.timeout = 60;
    log::debug!("offering {:?}", info.name);
    // Header order is f3 f2 f1 f0; the info fields ride in the subpacket.
    s.send_bin_header(
        host,
        FrameKind::ZFILE,
        [info.extended, info.transport, info.management, info.conversion],
    )?;

    let mut payload = Vec::with_capacity(info.name.len() + 48);
    payload.extend_from_slice(info.name.as_bytes());
    payload.push(0);
    let mut num = itoa::Buffer::new();
    payload.extend_from_slice(num.format(info.len).as_bytes());
    payload.push(b' ');
    push_octal(&mut payload, info.date);
    payload.push(b' ');
    push_octal(&mut payload, info.mode);
    payload.extend_from_slice(b" 0 ");
    payload.extend_from_slice(num.format(info.files_remaining).as_bytes());
    payload.push(b' ');
    payload.extend_from_slice(num.format(info.bytes_remaining).as_bytes());
    payload.extend_from_slice(b" 0");
    payload.push(0);
    if payload.len() > 1024 {
        return Err(Error::FilenameTooLong);
    }
    subpacket::write(host, &mut s.escaper, s.crc32, Terminator::ZCRCW, &payload)
}

/// ZCRC request: answer with the CRC-32 of the whole file.
pub(crate) fn send_file_crc<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.state = State::CrcWait;
    let crc = host.file_crc32()?;
    s.send_hex_header(host, FrameKind::ZCRC, crc.to_le_bytes())?;
    Ok(Control::Pending)
}

/// First ZRPOS for this file: clear any pause and start the data phase.
pub(crate) fn send_file_data<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.wait_flag = false;
    start_file_data(s, host)
}

/// Seeks to the offset the receiver named and opens a ZDATA frame there.
fn start_file_data<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    let offset = s.hdr_count();
    s.offset = offset;
    s.last_acked = offset;
    s.zrpos_offset = offset;
    s.interrupt = false;
    s.file_eof = false;
    host.seek_file(offset)?;
    s.state = State::Sending;
    log::debug!("ZDATA at {}", offset);
    s.send_bin_header(host, FrameKind::ZDATA, offset.to_le_bytes())?;
    send_more_file_data(s, host)
}

/// Emits one data subpacket. The terminator encodes the flow decision:
/// waiting after an error or a full window (ZCRCW), streaming on (ZCRCG),
/// streaming with an ack request (ZCRCQ), or closing the frame for an
/// immediate ZEOF (ZCRCE).
pub(crate) fn send_more_file_data<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    if s.interrupt {
        // The receiver pulled the attention cord; hold everything and
        // wait for its ZRPOS.
        s.state = State::SendWait;
        s.timeout = 60;
        return Ok(Control::Pending);
    }

    let mut len = s.config.packet_size;
    let pending = s.offset.saturating_sub(s.last_acked) as usize;
    let mut qfull = false;
    if s.config.window_size != 0 {
        let room = (s.config.window_size as usize).saturating_sub(pending);
        if room <= len {
            len = room;
            qfull = true;
        }
    }
    if s.rcv_buffer_size != 0 {
        let room = (s.rcv_buffer_size as usize).saturating_sub(pending);
        if room <= len {
            len = room;
            qfull = true;
        }
    }
    if len == 0 {
        // Window still full; wait for an ack to drain it.
        s.state = State::SendWait;
        s.timeout = 60;
        return Ok(Control::Pending);
    }

    let mut raw = [0u8; 1024];
    let want = len.min(raw.len());
    let mut got = 0;
    while got < want {
        let n = host.read_file(&mut raw[got..want])?;
        if n == 0 {
            s.file_eof = true;
            break;
        }
        got += n;
    }

    let mut terminator = if s.wait_flag {
        s.wait_flag = false;
        Terminator::ZCRCW
    } else if qfull {
        Terminator::ZCRCW
    } else {
        match s.streaming {
            Streaming::Full | Streaming::Segmented => Terminator::ZCRCG,
            Streaming::StrWindow => {
                s.window_count += got as u32;
                if s.window_count < s.config.window_size / 4 {
                    Terminator::ZCRCG
                } else {
                    s.window_count = 0;
                    Terminator::ZCRCQ
                }
            }
            Streaming::SlidingWindow => Terminator::ZCRCQ,
        }
    };
    if s.file_eof {
        // End the frame here if the ZEOF header can tag along at once;
        // otherwise close with ZCRCW and let the ack path send it.
        let room = len.saturating_sub(got);
        terminator = if qfull || (s.rcv_buffer_size != 0 && room < 24) {
            Terminator::ZCRCW
        } else {
            Terminator::ZCRCE
        };
    }

    subpacket::write(host, &mut s.escaper, s.crc32, terminator, &raw[..got])?;
    s.offset += got as u32;
    host.status(&Status::BytesSent(s.offset));

    match terminator {
        Terminator::ZCRCE => {
            s.state = State::SendEof;
            s.timeout = 60;
            s.send_hex_header(host, FrameKind::ZEOF, s.offset.to_le_bytes())?;
        }
        Terminator::ZCRCW => {
            s.state = if s.file_eof {
                State::SendDone
            } else {
                State::SendWait
            };
            s.timeout = 60;
        }
        _ => {
            // Keep streaming: a zero timeout asks the host to call
            // on_timeout straight away for the next subpacket.
            s.state = State::Sending;
            s.timeout = 0;
        }
    }
    Ok(Control::Pending)
}

/// ZACK while streaming: just note how far the receiver got.
pub(crate) fn got_send_ack(s: &mut Session) -> Result<Control> {
    let offset = s.hdr_count();
    if offset > s.last_acked {
        s.last_acked = offset;
    }
    Ok(Control::Pending)
}

/// ZACK for the last data subpacket: follow with ZEOF.
pub(crate) fn got_send_done_ack<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    let offset = s.hdr_count();
    if offset > s.last_acked {
        s.last_acked = offset;
    }
    s.state = State::SendEof;
    s.timeout = 60;
    s.send_hex_header(host, FrameKind::ZEOF, s.offset.to_le_bytes())?;
    Ok(Control::Pending)
}

/// The ZDATA header itself was garbled; replay from the last ZRPOS.
pub(crate) fn got_send_nak<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.offset = s.zrpos_offset;
    s.file_eof = false;
    host.seek_file(s.offset)?;
    send_more_file_data(s, host)
}

/// ZRPOS mid-file: the receiver wants a replay from an earlier offset.
pub(crate) fn got_send_pos<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.err_count += 1;
    host.status(&Status::DataError(s.err_count));
    // Resync with a waiting packet before streaming on.
    s.wait_flag = true;
    start_file_data(s, host)
}

/// ZACK while paused: reopen the data frame and continue.
pub(crate) fn got_send_wait_ack<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    let offset = s.hdr_count();
    if offset > s.last_acked {
        s.last_acked = offset;
    }
    s.send_bin_header(host, FrameKind::ZDATA, s.offset.to_le_bytes())?;
    send_more_file_data(s, host)
}

/// The file is over, by completion (ZRINIT after ZEOF) or refusal
/// (ZSKIP). Either way the host gets its handle back.
pub(crate) fn skip_file<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    host.close_file();
    s.file_eof = false;
    Ok(Control::Done)
}

pub(crate) fn resend_eof<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.send_hex_header(host, FrameKind::ZEOF, s.offset.to_le_bytes())?;
    Ok(Control::Pending)
}

/// Final ZFIN handshake done; sign off.
pub(crate) fn over_and_out<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    log::debug!("over and out in {:?}", s.state);
    host.send(b"OO")?;
    Ok(Control::Done)
}
