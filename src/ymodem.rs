// SPDX-License-Identifier: MIT OR Apache-2.0
//! YMODEM/XMODEM fallback, both roles.
//!
//! Engaged when the peer never speaks ZMODEM: a sender that sees `C`,
//! `G` or NAK instead of ZRINIT flips to the YMODEM transmit states, and
//! a receiver that times out waiting for ZRQINIT starts hailing with
//! `C`. XMODEM is the same machine minus the filename packet.

use crate::host::{FileDisposition, Host, Status};
use crate::recv;
use crate::send::push_octal;
use crate::session::{InputState, Protocol, Session, State};
use crate::{Control, Error, Result, ACK, CAN, EOT, NAK, SOH, STX, SUB};

const CAN_CAN: [u8; 2] = [CAN, CAN];

/// Sends one packet: SOH/STX, sequence, complement, payload, then CRC-16
/// or the additive checksum depending on the negotiated handshake.
fn xmit_data<H: Host>(s: &mut Session, host: &mut H, start: usize, len: usize) -> Result<()> {
    let seq = (s.packet_count & 0xff) as u8;
    let lead = if len == 1024 { STX } else { SOH };
    host.send(&[lead, seq, !seq])?;
    let data = &s.buffer[start..start + len];
    host.send(data)?;
    if s.y_handshake == NAK {
        let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        host.send(&[sum])
    } else {
        let crc = crate::crc::CRC16.checksum(data);
        host.send(&crc.to_be_bytes())
    }
}

/// Packet 0: `name NUL length date mode serial NUL`, zero-padded.
pub(crate) fn send_filename<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    let info = s.file.clone().ok_or(Error::CannotOpen)?;
    s.state = if s.y_handshake != b'G' {
        State::YTFile
    } else {
        State::YTDataWait
    };
    s.packet_count = 0;
    s.offset = 0;
    s.chr_count = 0;
    s.y_bufp = 0;

    let mut payload = Vec::with_capacity(128);
    payload.extend_from_slice(info.name.as_bytes());
    payload.push(0);
    let mut num = itoa::Buffer::new();
    payload.extend_from_slice(num.format(info.len).as_bytes());
    payload.push(b' ');
    push_octal(&mut payload, info.date);
    payload.push(b' ');
    push_octal(&mut payload, info.mode);
    payload.extend_from_slice(b" 0");
    payload.push(0);
    let len = if payload.len() > 128 { 1024 } else { 128 };
    if payload.len() > len {
        return Err(Error::FilenameTooLong);
    }
    payload.resize(len, 0);

    s.buffer.clear();
    s.buffer.extend_from_slice(&payload);
    s.y_len = len;
    xmit_data(s, host, 0, len)
}

/// Refills the packet buffer from the file when it runs dry, then sends
/// the next packet, or EOT once the file is exhausted.
pub(crate) fn send_data<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    if s.chr_count == 0 {
        s.y_bufp = 0;
        let want = s.config.packet_size;
        s.buffer.set_len(want);
        let mut got = 0;
        while got < want {
            let n = host.read_file(&mut s.buffer[got..want])?;
            if n == 0 {
                break;
            }
            got += n;
        }
        s.file_eof = got < want;
        // Pad the short tail with SUBs up to the packet grid.
        let padded = if got == 0 { 0 } else { got.max(128).div_ceil(128) * 128 };
        for slot in &mut s.buffer[got..padded] {
            *slot = SUB;
        }
        s.buffer.set_len(padded);
        s.chr_count = padded;
    }

    if s.chr_count == 0 {
        host.close_file();
        s.state = State::YTEof;
        return host.send(&[EOT]);
    }

    s.y_len = if s.chr_count >= 1024 { 1024 } else { 128 };
    s.packet_count += 1;
    s.state = State::YTData;
    let (start, len) = (s.y_bufp, s.y_len);
    xmit_data(s, host, start, len)?;
    if s.y_handshake == b'G' {
        // Blast mode: nobody will ack, advance on our own.
        s.offset += s.y_len as u32;
        s.y_bufp += s.y_len;
        s.chr_count -= s.y_len;
        host.status(&Status::BytesSent(s.offset));
    }
    Ok(())
}

/// Batch end: a zeroed packet 0.
pub(crate) fn send_fin<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    s.state = State::YTFin;
    s.packet_count = 0;
    s.buffer.clear();
    s.buffer.extend_from_slice(&[0u8; 128]);
    s.y_len = 128;
    xmit_data(s, host, 0, 128)
}

/// Sender-side parser: every received byte lands here while the session
/// speaks Y/XMODEM.
pub(crate) fn send_char<H: Host>(s: &mut Session, host: &mut H, c: u8) -> Result<Control> {
    if s.can_count >= 2 {
        host.status(&Status::RemoteCancel);
        s.state = State::Done;
        return Err(Error::Cancelled);
    }
    match s.state {
        State::YTStart => match c {
            b'G' | b'C' | NAK => {
                s.y_handshake = c;
                if s.file_pending {
                    s.file_pending = false;
                    if s.protocol == Protocol::Xmodem {
                        send_data(s, host)?;
                    } else {
                        send_filename(s, host)?;
                    }
                    return Ok(Control::Pending);
                }
                Ok(Control::Done)
            }
            _ => Ok(Control::Pending),
        },
        State::YTFile => match c {
            NAK | b'C' | b'G' => {
                s.err_count += 1;
                host.status(&Status::DataError(s.err_count));
                send_filename(s, host)?;
                Ok(Control::Pending)
            }
            ACK => {
                s.state = State::YTDataWait;
                Ok(Control::Pending)
            }
            _ => Ok(Control::Pending),
        },
        State::YTDataWait => match c {
            NAK | b'C' | b'G' => {
                s.chr_count = 0;
                send_data(s, host)?;
                if s.y_handshake == b'G' {
                    while s.state == State::YTData {
                        send_data(s, host)?;
                    }
                }
                Ok(Control::Pending)
            }
            _ => Ok(Control::Pending),
        },
        State::YTData => match c {
            b'C' | b'G' if s.protocol == Protocol::Ymodem => {
                // Handshake over again: the receiver lost the file.
                s.err_count += 1;
                host.status(&Status::DataError(s.err_count));
                host.seek_file(0)?;
                s.chr_count = 0;
                send_filename(s, host)?;
                Ok(Control::Pending)
            }
            NAK | b'C' | b'G' => {
                s.err_count += 1;
                host.status(&Status::DataError(s.err_count));
                let (start, len) = (s.y_bufp, s.y_len);
                xmit_data(s, host, start, len)?;
                Ok(Control::Pending)
            }
            ACK => {
                // A stale ack (a dup the receiver re-acked) carries no
                // new information; only advance past data actually out.
                if s.chr_count >= s.y_len {
                    s.offset += s.y_len as u32;
                    s.y_bufp += s.y_len;
                    s.chr_count -= s.y_len;
                    host.status(&Status::BytesSent(s.offset));
                    send_data(s, host)?;
                }
                Ok(Control::Pending)
            }
            _ => Ok(Control::Pending),
        },
        State::YTEof => match c {
            NAK => {
                host.send(&[EOT])?;
                Ok(Control::Pending)
            }
            ACK => {
                s.state = if s.protocol == Protocol::Ymodem {
                    State::YTStart
                } else {
                    State::Done
                };
                Ok(Control::Done)
            }
            _ => Ok(Control::Pending),
        },
        State::YTFin => match c {
            NAK => {
                send_fin(s, host)?;
                Ok(Control::Pending)
            }
            ACK => {
                s.state = State::Done;
                Ok(Control::Done)
            }
            _ => Ok(Control::Pending),
        },
        _ => Ok(Control::Pending),
    }
}

/// Receiver-side parser.
pub(crate) fn recv_char<H: Host>(s: &mut Session, host: &mut H, c: u8) -> Result<Control> {
    if s.can_count >= 2 {
        host.status(&Status::RemoteCancel);
        s.state = State::Done;
        return Err(Error::Cancelled);
    }
    match s.state {
        State::YREof if c == EOT => {
            host.close_file();
            let name = s.file.take().map(|f| f.name).unwrap_or_default();
            host.status(&Status::FileEnd(name));
            accept_packet(s, host)?;
            if s.protocol == Protocol::Xmodem {
                s.state = State::Done;
                return Ok(Control::Done);
            }
            s.packet_count = -1;
            s.offset = 0;
            s.state = State::YRStart;
            host.send(b"C")?;
            Ok(Control::Pending)
        }
        State::YRStart | State::YRDataWait | State::YREof => match c {
            SOH | STX => {
                s.y_pkt_len = if c == SOH { 128 + 4 } else { 1024 + 4 };
                s.state = State::YRData;
                s.buffer.clear();
                s.timeout = 1;
                s.noise_count = 0;
                Ok(Control::Pending)
            }
            EOT => {
                // Ignore the first EOT to guard against a corrupted one.
                s.state = State::YREof;
                reject_packet(s, host)?;
                Ok(Control::Pending)
            }
            _ => {
                s.noise_count += 1;
                if s.noise_count > 135 {
                    host.send(&[NAK])?;
                }
                Ok(Control::Pending)
            }
        },
        State::YRData => {
            s.buffer.push(c);
            if s.buffer.len() >= s.y_pkt_len {
                return process_packet(s, host);
            }
            Ok(Control::Pending)
        }
        _ => Ok(Control::Pending),
    }
}

fn process_packet<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    s.state = State::YRDataWait;
    let idx = s.buffer[0] as i64;
    if s.buffer[1] != !s.buffer[0] {
        s.err_count += 1;
        host.status(&Status::DataError(s.err_count));
        reject_packet(s, host)?;
        return Ok(Control::Pending);
    }
    if idx == s.packet_count.rem_euclid(256) {
        // Duplicate of the packet we already have; its ack got lost.
        accept_packet(s, host)?;
        return Ok(Control::Pending);
    }
    if idx != (s.packet_count + 1).rem_euclid(256) {
        host.send(&CAN_CAN)?;
        return Err(Error::Sequence);
    }

    let data_len = s.y_pkt_len - 4;
    let wire_crc = u16::from_be_bytes([s.buffer[s.y_pkt_len - 2], s.buffer[s.y_pkt_len - 1]]);
    if crate::crc::CRC16.checksum(&s.buffer[2..2 + data_len]) != wire_crc {
        s.err_count += 1;
        host.status(&Status::DataError(s.err_count));
        reject_packet(s, host)?;
        return Ok(Control::Pending);
    }
    s.packet_count += 1;

    if s.packet_count == 0 {
        // YMODEM packet 0: the file name, or batch end when empty.
        if s.buffer[2] == 0 {
            accept_packet(s, host)?;
            s.state = State::Done;
            return Ok(Control::Done);
        }
        let info = match recv::parse_file_payload(&s.buffer[2..2 + data_len], [0; 4]) {
            Some(info) => info,
            None => {
                host.send(&CAN_CAN)?;
                return Err(Error::CannotOpen);
            }
        };
        match host.open_file(&info, None)? {
            FileDisposition::Accept { .. } => {}
            FileDisposition::Skip => {
                // No skip verb in this protocol; bail out.
                host.send(&CAN_CAN)?;
                return Err(Error::CannotOpen);
            }
        }
        host.status(&Status::FileBegin(info.name.clone()));
        s.file = Some(info);
        accept_packet(s, host)?;
        host.send(b"C")?;
        return Ok(Control::Pending);
    }

    if host.write_file(&s.buffer[2..2 + data_len]).is_err() {
        host.status(&Status::FileError);
        host.send(&CAN_CAN)?;
        return Err(Error::System);
    }
    s.offset += data_len as u32;
    host.status(&Status::BytesReceived(s.offset));
    accept_packet(s, host)?;
    Ok(Control::Pending)
}

fn accept_packet<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    s.state = State::YRDataWait;
    s.timeout = 10;
    host.send(&[ACK])
}

fn reject_packet<H: Host>(s: &mut Session, host: &mut H) -> Result<()> {
    s.timeout = 10;
    host.send(&[NAK])
}

/// Receiver timer: renew the hail or nak the last packet, ten strikes
/// and out.
pub(crate) fn recv_timeout<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    if s.timeout_count >= 10 {
        host.send(&CAN_CAN)?;
        return Err(Error::ReceiveTimeout);
    }
    if s.state == State::YRStart {
        host.send(b"C")?;
    } else {
        host.send(&[NAK])?;
    }
    Ok(Control::Pending)
}

/// The ZMODEM receiver gave up waiting for ZRQINIT; hail as YMODEM.
pub(crate) fn downgrade_receiver<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    log::debug!("no ZMODEM sender, downgrading to YMODEM receive");
    s.protocol = Protocol::Ymodem;
    s.input_state = InputState::Yrcv;
    s.state = State::YRStart;
    s.err_count = 0;
    s.can_count = 0;
    s.chr_count = 0;
    s.noise_count = 0;
    s.packet_count = -1;
    s.timeout_count = 0;
    s.timeout = 10;
    s.offset = 0;
    host.flush_input();
    host.send(b"C")?;
    Ok(Control::Pending)
}
