// SPDX-License-Identifier: MIT OR Apache-2.0
//! Receiver-side actions: init, file acceptance policy, data write-out
//! and error recovery.

use crate::frame::{FrameKind, Zrinit, Zsinit, ZCRESUM, ZMCRC, ZMMASK};
use crate::host::{FileDisposition, FileInfo, Host, Status};
use crate::session::{InputState, Session, State};
use crate::{Control, Error, Result, MAX_ERRS, RESPONSE_TIME, SERIAL_NUMBER};
use binread::{io::Cursor, BinReaderExt, NullString};

/// (Re)announce our capabilities and buffer size.
pub(crate) fn send_rinit<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    s.timeout = RESPONSE_TIME;
    let mut caps = s.config.capabilities;
    if s.config.escape_control {
        caps |= Zrinit::ESCCTL;
    }
    let size = s.config.buffer_size;
    s.send_hex_header(host, FrameKind::ZRINIT, [size as u8, (size >> 8) as u8, 0, caps.bits()])
}

/// ZSINIT header: note the sender's escape demands, then collect the
/// attention string it carries.
pub(crate) fn got_sinit(s: &mut Session) -> Result<Control> {
    s.snd_flags = Zsinit::from_bits_truncate(s.hdr_data[4]);
    s.escaper.esc_ctrl = s.config.escape_control || s.snd_flags.contains(Zsinit::TESCCTL);
    s.escaper.esc_8bit = s.snd_flags.contains(Zsinit::TESC8);
    s.data_setup();
    Ok(Control::Pending)
}

/// Rest of the ZSINIT packet: the attention string itself.
pub(crate) fn got_sinit_data<H: Host>(s: &mut Session, host: &mut H, crc_ok: bool) -> Result<Control> {
    s.input_state = InputState::Idle;
    s.chr_count = 0;
    s.state = State::RStart;
    if !crc_ok {
        s.send_hex_header(host, FrameKind::ZNAK, [0; 4])?;
        return Ok(Control::Pending);
    }
    let end = s.buffer.iter().position(|&b| b == 0).unwrap_or(s.buffer.len());
    s.attn = s.buffer[..end].to_vec();
    log::debug!("attention string set, {} bytes", s.attn.len());
    s.send_hex_header(host, FrameKind::ZACK, SERIAL_NUMBER.to_le_bytes())?;
    Ok(Control::Pending)
}

/// ZFILE header: cache the transfer flags and collect the name packet.
pub(crate) fn got_file(s: &mut Session) -> Result<Control> {
    s.err_count = 0;
    s.file_flags = [s.hdr_data[4], s.hdr_data[3], s.hdr_data[2], s.hdr_data[1]];
    s.data_setup();
    Ok(Control::Pending)
}

/// Splits a `name NUL attributes NUL` payload, shared between the ZFILE
/// subpacket and the YMODEM packet 0. Numeric attributes are the Unix
/// convention: decimal length, octal date and mode.
pub(crate) fn parse_file_payload(buf: &[u8], flags: [u8; 4]) -> Option<FileInfo> {
    let mut cursor = Cursor::new(buf);
    let name: NullString = cursor.read_ne().ok()?;
    let attrs: NullString = cursor.read_ne().ok()?;
    let name = String::from_utf8(name.0).ok()?;
    if name.is_empty() || name.len() > 255 {
        return None;
    }
    let mut info = FileInfo {
        name,
        conversion: flags[0],
        management: flags[1],
        transport: flags[2],
        extended: flags[3],
        ..FileInfo::default()
    };
    let attrs = String::from_utf8_lossy(&attrs.0).into_owned();
    let mut fields = attrs.split_ascii_whitespace();
    if let Some(v) = fields.next() {
        info.len = v.parse().unwrap_or(0);
    }
    if let Some(v) = fields.next() {
        info.date = u32::from_str_radix(v, 8).unwrap_or(0);
    }
    if let Some(v) = fields.next() {
        info.mode = u32::from_str_radix(v, 8).unwrap_or(0);
    }
    let _serial = fields.next();
    if let Some(v) = fields.next() {
        info.files_remaining = v.parse().unwrap_or(0);
    }
    if let Some(v) = fields.next() {
        info.bytes_remaining = v.parse().unwrap_or(0);
    }
    if let Some(v) = fields.next() {
        info.file_type = v.parse().unwrap_or(0);
    }
    Some(info)
}

/// Name packet in: parse it and run the host's acceptance policy, or ask
/// for the file CRC first when the management mode wants a comparison.
pub(crate) fn got_file_name<H: Host>(s: &mut Session, host: &mut H, crc_ok: bool) -> Result<Control> {
    s.input_state = InputState::Idle;
    s.chr_count = 0;
    if !crc_ok {
        s.state = State::RStart;
        s.send_hex_header(host, FrameKind::ZNAK, [0; 4])?;
        return Ok(Control::Pending);
    }
    let info = match parse_file_payload(&s.buffer, s.file_flags) {
        Some(info) => info,
        None => {
            s.state = State::RStart;
            s.send_hex_header(host, FrameKind::ZNAK, [0; 4])?;
            return Ok(Control::Pending);
        }
    };
    log::debug!("offered {:?}, {} bytes", info.name, info.len);
    s.file = Some(info);
    if s.file_flags[1] & ZMMASK == ZMCRC {
        s.state = State::RCrc;
        s.send_hex_header(host, FrameKind::ZCRC, [0; 4])?;
        return Ok(Control::Pending);
    }
    s.state = State::RFile;
    request_file(s, host, None)
}

/// The sender answered our ZCRC request.
pub(crate) fn got_file_crc<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    let crc = s.hdr_count();
    request_file(s, host, Some(crc))
}

/// Run the host's open-file policy and answer ZRPOS or ZSKIP.
fn request_file<H: Host>(s: &mut Session, host: &mut H, crc: Option<u32>) -> Result<Control> {
    let info = s.file.clone().ok_or(Error::System)?;
    match host.open_file(&info, crc)? {
        FileDisposition::Skip => {
            s.state = State::RStart;
            host.status(&Status::FileSkip(info.name));
            s.send_hex_header(host, FrameKind::ZSKIP, [0; 4])?;
        }
        FileDisposition::Accept { offset } => {
            s.offset = if info.conversion == ZCRESUM { offset } else { 0 };
            s.state = State::RFile;
            host.status(&Status::FileBegin(info.name));
            s.send_hex_header(host, FrameKind::ZRPOS, s.offset.to_le_bytes())?;
        }
    }
    Ok(Control::Pending)
}

pub(crate) fn resend_crc_req<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    s.send_hex_header(host, FrameKind::ZCRC, [0; 4])
}

pub(crate) fn resend_rpos<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    let offset = s.offset;
    s.send_hex_header(host, FrameKind::ZRPOS, offset.to_le_bytes())
}

/// ZDATA header: enter data mode if it lands on our offset, otherwise
/// interrupt the sender and renew the ZRPOS.
pub(crate) fn got_data<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    if s.hdr_count() != s.offset {
        log::debug!("ZDATA at {}, wanted {}", s.hdr_count(), s.offset);
        send_attn(s, host)?;
        let offset = s.offset;
        s.send_hex_header(host, FrameKind::ZRPOS, offset.to_le_bytes())?;
        return Ok(Control::Pending);
    }
    s.data_setup();
    Ok(Control::Pending)
}

/// A data subpacket finished reassembly.
pub(crate) fn got_file_data<H: Host>(s: &mut Session, host: &mut H, crc_ok: bool) -> Result<Control> {
    if !crc_ok {
        // The attention sequence has likely chopped the input stream
        // mid-packet; everything until the next valid header is noise.
        s.err_count += 1;
        host.status(&Status::DataError(s.err_count));
        if s.err_count > MAX_ERRS {
            s.abort(host)?;
            return Err(Error::DataError);
        }
        s.state = State::RFile;
        let offset = s.offset;
        return file_error(s, host, FrameKind::ZRPOS, offset);
    }

    if host.write_file(&s.buffer).is_err() {
        host.status(&Status::FileError);
        s.state = State::RFinish;
        return file_error(s, host, FrameKind::ZFERR, 0);
    }

    s.offset += s.buffer.len() as u32;
    host.status(&Status::BytesReceived(s.offset));

    if s.packet_type.ends_frame() {
        s.state = State::RFile;
        s.input_state = InputState::Idle;
        s.chr_count = 0;
    } else {
        s.data_setup();
    }
    if s.packet_type.wants_ack() {
        let offset = s.offset;
        s.send_hex_header(host, FrameKind::ZACK, offset.to_le_bytes())?;
    }
    Ok(Control::Pending)
}

/// ZEOF: close out the file if the offsets agree, else it was stale.
pub(crate) fn got_eof<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    if s.hdr_count() != s.offset {
        log::debug!("stale ZEOF at {}, have {}", s.hdr_count(), s.offset);
        s.state = State::RFile;
        return Ok(Control::Pending);
    }
    host.close_file();
    let name = s.file.take().map(|f| f.name).unwrap_or_default();
    host.status(&Status::FileEnd(name));
    send_rinit(s, host)?;
    Ok(Control::Pending)
}

/// ZFIN: answer in kind and wait for the closing "OO".
pub(crate) fn got_fin<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.input_state = InputState::Finish;
    s.chr_count = 0;
    s.send_hex_header(host, FrameKind::ZFIN, [0; 4])?;
    Ok(Control::Pending)
}

/// ZFREECNT: report unlimited free space; quota is the host's business.
pub(crate) fn got_freecnt<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.send_hex_header(host, FrameKind::ZACK, u32::MAX.to_le_bytes())?;
    Ok(Control::Pending)
}

/// Interrupt the sender (attention sequence first, when we have one) and
/// send a recovery header.
fn file_error<H: Host>(s: &mut Session, host: &mut H, kind: FrameKind, value: u32) -> Result<Control> {
    s.input_state = InputState::Idle;
    s.chr_count = 0;
    send_attn(s, host)?;
    s.send_hex_header(host, kind, value.to_le_bytes())?;
    Ok(Control::Pending)
}

fn send_attn<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    if s.attn.is_empty() {
        return Ok(());
    }
    let attn = s.attn.clone();
    host.attention(&attn)
}
