// SPDX-License-Identifier: MIT OR Apache-2.0
//! The transfer session: all engine state plus the wire-reception
//! lexical state machine.
//!
//! Bytes from the wire enter through [`Session::feed`], which reassembles
//! headers and data subpackets and hands complete events to the protocol
//! layer. The clock enters through [`Session::on_timeout`]. Nothing in
//! here blocks or performs I/O; output happens through the [`Host`].

use crate::escape::{self, Escaper};
use crate::frame::{Encoding, FrameKind, Header, Zrinit, Zsinit};
use crate::host::{FileDisposition, FileInfo, Host, Status};
use crate::subpacket::Terminator;
use crate::{
    crc, proto, recv, send, ymodem, Control, Error, Result, BS, CAN, MAX_NOISE, NAK,
    RX_BUFFER_SIZE, XOFF, XON, ZDLE, ZPAD,
};
use tinyvec::ArrayVec;

/// Reassembly buffer for incoming data subpackets.
pub(crate) type RxBuffer = ArrayVec<[u8; RX_BUFFER_SIZE]>;

/// Which end of the transfer this session is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

/// The protocol in effect. Starts as configured and may downgrade from
/// ZMODEM to YMODEM when the peer turns out not to speak ZMODEM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Zmodem,
    Ymodem,
    Xmodem,
}

/// The sender's streaming discipline, derived from the receiver's
/// capabilities at ZRINIT time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Streaming {
    /// Blast ZCRCG subpackets nonstop; errors recovered via attention
    /// plus ZRPOS.
    Full,
    /// Mostly ZCRCG, with a ZCRCQ each quarter-window to keep the
    /// unacked byte count known.
    StrWindow,
    /// ZCRCQ subpackets, harvesting piggybacked ZACKs.
    SlidingWindow,
    /// One ZCRCW per receiver buffer, stop-and-wait.
    Segmented,
}

/// Protocol-layer states for both roles, the Y/XMODEM fallback included.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Receiver: sent ZRINIT, waiting for ZFILE or ZSINIT
    RStart,
    /// Receiver: got ZSINIT, waiting for the attention string
    RSinitWait,
    /// Receiver: got ZFILE, waiting for filename and attributes
    RFileName,
    /// Receiver: asked for the file CRC
    RCrc,
    /// Receiver: ready for ZDATA
    RFile,
    /// Receiver: reading data subpackets
    RData,
    /// Receiver: sent ZFIN, waiting for "OO"
    RFinish,
    /// Sender: waiting for ZRINIT
    TStart,
    /// Sender: sent ZSINIT, waiting for ZACK
    TInit,
    /// Sender: sent ZFILE, waiting for ZRPOS
    FileWait,
    /// Sender: sent file CRC, waiting for ZRPOS
    CrcWait,
    /// Sender: streaming data subpackets
    Sending,
    /// Sender: paused, waiting for ZACK
    SendWait,
    /// Sender: last data sent, needs ZEOF after the ZACK
    SendDone,
    /// Sender: sent ZEOF, waiting for ZRINIT
    SendEof,
    /// Sender: sent ZFIN, waiting for ZFIN
    TFinish,
    /// Either: collecting a ZSTDERR message
    StderrData,
    Done,
    /// Y sender: waiting for 'G', 'C' or NAK
    YTStart,
    /// Y sender: sent filename, waiting for ACK
    YTFile,
    /// Y sender: waiting for the data-phase handshake
    YTDataWait,
    /// Y sender: sent data, waiting for ACK
    YTData,
    /// Y sender: sent EOT, waiting for ACK
    YTEof,
    /// Y sender: sent the null filename, waiting for ACK
    YTFin,
    /// Y receiver: sent 'C', waiting for the first packet
    YRStart,
    /// Y receiver: between packets
    YRDataWait,
    /// Y receiver: collecting a packet
    YRData,
    /// Y receiver: saw the first EOT, waiting for the second
    YREof,
}

/// Lexical layer states. `InHeader` and `InData` track partial frames;
/// `Ysend`/`Yrcv` route all input to the fallback protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InputState {
    Idle,
    InHeader,
    InData,
    Finish,
    Ysend,
    Yrcv,
}

/// Tunables fixed at session creation.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capabilities advertised in ZRINIT (receiver role).
    pub capabilities: Zrinit,
    /// Capabilities advertised in ZSINIT (sender role).
    pub sender_flags: Zsinit,
    /// Attention string handed to the receiver via ZSINIT. Empty means
    /// no ZSINIT exchange.
    pub attn: Vec<u8>,
    /// Receive buffer size advertised in ZRINIT; 0 = unlimited.
    pub buffer_size: u16,
    /// Transmit subpacket payload size. Clamped to 1024; YMODEM uses
    /// 1024 or 128, XMODEM 128.
    pub packet_size: usize,
    /// Maximum unacknowledged bytes in flight; 0 = unlimited.
    pub window_size: u32,
    /// Escape all control characters on transmit.
    pub escape_control: bool,
    /// Send the classic `"rz\r"` nudge ahead of ZRQINIT.
    pub send_rz_nudge: bool,
    /// The sending host can watch the reverse channel (or take an
    /// attention callback) while streaming. Off, the sender falls back
    /// to the sliding-window discipline.
    pub can_sample: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capabilities: Zrinit::CANFDX | Zrinit::CANOVIO | Zrinit::CANFC32,
            sender_flags: Zsinit::empty(),
            attn: Vec::new(),
            buffer_size: 0,
            packet_size: 1024,
            window_size: 0,
            escape_control: false,
            send_rz_nudge: true,
            can_sample: true,
        }
    }
}

/// One file-transfer session. See the crate docs for the drive loop.
pub struct Session {
    pub(crate) role: Role,
    pub(crate) protocol: Protocol,
    pub(crate) state: State,
    pub(crate) input_state: InputState,
    pub(crate) config: Config,
    pub(crate) escaper: Escaper,

    // Negotiated peer properties.
    pub(crate) rcv_flags: Zrinit,
    pub(crate) snd_flags: Zsinit,
    pub(crate) attn: Vec<u8>,
    pub(crate) rcv_buffer_size: u32,
    pub(crate) streaming: Streaming,
    pub(crate) crc32: bool,
    pub(crate) rinit_seen: bool,

    // Current file.
    pub(crate) file: Option<FileInfo>,
    /// f0..f3 from the last ZFILE header, cached until the name arrives.
    pub(crate) file_flags: [u8; 4],
    pub(crate) file_pending: bool,
    pub(crate) file_eof: bool,
    pub(crate) offset: u32,
    pub(crate) last_acked: u32,
    pub(crate) zrpos_offset: u32,
    pub(crate) window_count: u32,

    // Lexical reassembly.
    pub(crate) hdr_raw: ArrayVec<[u8; 16]>,
    pub(crate) hdr_data: [u8; 5],
    pub(crate) buffer: RxBuffer,
    pub(crate) chr_count: usize,
    pub(crate) crc_buf: [u8; 4],
    pub(crate) crc_need: usize,
    pub(crate) crc_got: usize,
    pub(crate) data_type: Encoding,
    pub(crate) packet_type: Terminator,
    pub(crate) escape_pending: bool,
    pub(crate) drop_pending: bool,

    // Counters and flags.
    pub(crate) can_count: u32,
    pub(crate) noise_count: u32,
    pub(crate) err_count: u32,
    pub(crate) timeout_count: u32,
    pub(crate) interrupt: bool,
    pub(crate) wait_flag: bool,
    pub(crate) timeout: u16,
    pub(crate) resume_state: State,

    // Y/XMODEM bookkeeping.
    pub(crate) packet_count: i64,
    pub(crate) y_handshake: u8,
    pub(crate) y_len: usize,
    pub(crate) y_bufp: usize,
    pub(crate) y_pkt_len: usize,
}

impl Session {
    fn new(role: Role, protocol: Protocol, state: State, input_state: InputState, config: Config) -> Self {
        let mut escaper = Escaper::new();
        escaper.esc_ctrl = config.escape_control;
        let packet_size = match protocol {
            Protocol::Zmodem => config.packet_size.clamp(32, 1024),
            Protocol::Ymodem | Protocol::Xmodem => {
                if config.packet_size == 1024 {
                    1024
                } else {
                    128
                }
            }
        };
        let mut config = config;
        config.packet_size = packet_size;
        Self {
            role,
            protocol,
            state,
            input_state,
            config,
            escaper,
            rcv_flags: Zrinit::empty(),
            snd_flags: Zsinit::empty(),
            attn: Vec::new(),
            rcv_buffer_size: 0,
            streaming: Streaming::Segmented,
            crc32: false,
            rinit_seen: false,
            file: None,
            file_flags: [0; 4],
            file_pending: false,
            file_eof: false,
            offset: 0,
            last_acked: 0,
            zrpos_offset: 0,
            window_count: 0,
            hdr_raw: ArrayVec::new(),
            hdr_data: [0; 5],
            buffer: RxBuffer::new(),
            chr_count: 0,
            crc_buf: [0; 4],
            crc_need: 0,
            crc_got: 0,
            data_type: Encoding::ZBIN,
            packet_type: Terminator::ZCRCG,
            escape_pending: false,
            drop_pending: false,
            can_count: 0,
            noise_count: 0,
            err_count: 0,
            timeout_count: 0,
            interrupt: false,
            wait_flag: false,
            timeout: 60,
            resume_state: state,
            packet_count: 0,
            y_handshake: 0,
            y_len: 0,
            y_bufp: 0,
            y_pkt_len: 0,
        }
    }

    /// A ZMODEM sender, ready for [`start`](Session::start).
    pub fn new_sender(config: Config) -> Self {
        Self::new(Role::Sender, Protocol::Zmodem, State::TStart, InputState::Idle, config)
    }

    /// A ZMODEM receiver with automatic YMODEM downgrade.
    pub fn new_receiver(config: Config) -> Self {
        Self::new(Role::Receiver, Protocol::Zmodem, State::RStart, InputState::Idle, config)
    }

    pub fn new_ymodem_sender(config: Config) -> Self {
        Self::new(Role::Sender, Protocol::Ymodem, State::YTStart, InputState::Ysend, config)
    }

    pub fn new_xmodem_sender(config: Config) -> Self {
        Self::new(Role::Sender, Protocol::Xmodem, State::YTStart, InputState::Ysend, config)
    }

    pub fn new_ymodem_receiver(config: Config) -> Self {
        let mut s = Self::new(Role::Receiver, Protocol::Ymodem, State::YRStart, InputState::Yrcv, config);
        s.packet_count = -1;
        s
    }

    pub fn new_xmodem_receiver(config: Config) -> Self {
        Self::new(Role::Receiver, Protocol::Xmodem, State::YRStart, InputState::Yrcv, config)
    }

    /// Opens the session on the wire.
    pub fn start<H: Host>(&mut self, host: &mut H) -> Result<()> {
        host.flush_input();
        match (self.role, self.protocol) {
            (Role::Sender, Protocol::Zmodem) => {
                if self.config.send_rz_nudge {
                    host.send(b"rz\r")?;
                }
                self.send_hex_header(host, FrameKind::ZRQINIT, [0; 4])?;
                self.timeout = 60;
            }
            (Role::Sender, _) => {
                // Nothing to transmit; the receiver opens with its
                // handshake character.
                self.timeout = 60;
            }
            (Role::Receiver, Protocol::Zmodem) => {
                // A ZRQINIT may already be queued on the wire; give
                // feed() first look. Timeout zero makes the host call
                // on_timeout immediately otherwise, which sends ZRINIT.
                self.timeout = 0;
            }
            (Role::Receiver, Protocol::Ymodem) => {
                self.timeout = 10;
                host.send(b"C")?;
            }
            (Role::Receiver, Protocol::Xmodem) => {
                // No filename packet will arrive; open the output now.
                match host.open_file(&FileInfo::default(), None)? {
                    FileDisposition::Accept { .. } => {}
                    FileDisposition::Skip => return Err(Error::CannotOpen),
                }
                self.timeout = 10;
                host.send(b"C")?;
            }
        }
        Ok(())
    }

    /// Sender: offer the next file. May be called right after
    /// [`start`](Session::start); the offer goes out once the peer is
    /// ready. The host must be prepared to serve
    /// [`read_file`](Host::read_file) for this file from now on.
    pub fn send_file<H: Host>(&mut self, host: &mut H, info: &FileInfo) -> Result<()> {
        self.file = Some(info.clone());
        self.file_eof = false;
        self.offset = 0;
        self.last_acked = 0;
        self.zrpos_offset = 0;
        self.window_count = 0;
        self.err_count = 0;
        match self.protocol {
            Protocol::Zmodem => {
                if self.rinit_seen {
                    send::send_filename(self, host)
                } else {
                    self.file_pending = true;
                    Ok(())
                }
            }
            Protocol::Ymodem => {
                if self.y_handshake != 0 {
                    ymodem::send_filename(self, host)
                } else {
                    self.file_pending = true;
                    Ok(())
                }
            }
            Protocol::Xmodem => {
                if self.y_handshake != 0 {
                    ymodem::send_data(self, host)
                } else {
                    self.file_pending = true;
                    Ok(())
                }
            }
        }
    }

    /// Sender: no more files.
    pub fn finish<H: Host>(&mut self, host: &mut H) -> Result<Control> {
        match self.protocol {
            Protocol::Xmodem => {
                self.state = State::Done;
                Ok(Control::Done)
            }
            Protocol::Ymodem => {
                ymodem::send_fin(self, host)?;
                Ok(Control::Pending)
            }
            Protocol::Zmodem => {
                self.state = State::TFinish;
                self.timeout = 60;
                self.send_hex_header(host, FrameKind::ZFIN, [0; 4])?;
                Ok(Control::Pending)
            }
        }
    }

    /// Force the session down, with the CAN barrage on the wire. The
    /// trailing backspaces erase the CANs on a peer that dropped back to
    /// a terminal.
    pub fn abort<H: Host>(&mut self, host: &mut H) -> Result<()> {
        self.state = State::Done;
        self.input_state = InputState::Idle;
        host.flush_input();
        host.flush_output();
        let mut epitaph = [CAN; 18];
        epitaph[8..].fill(BS);
        host.send(&epitaph)
    }

    /// The host saw the attention sequence arrive out-of-band.
    pub fn on_attention<H: Host>(&mut self, host: &mut H) {
        if self.state == State::Sending {
            host.flush_output();
            self.interrupt = true;
        }
    }

    /// Hands received wire bytes to the engine, in order. Stops early
    /// when the session completes or dies.
    pub fn feed<H: Host>(&mut self, host: &mut H, data: &[u8]) -> Result<Control> {
        self.drop_pending = false;
        for &c in data {
            if c == CAN {
                self.can_count += 1;
                if self.can_count >= 5 {
                    host.status(&Status::RemoteCancel);
                    self.state = State::Done;
                    return Err(Error::Cancelled);
                }
            } else {
                self.can_count = 0;
            }
            let ctl = match self.input_state {
                InputState::Ysend => ymodem::send_char(self, host, c)?,
                InputState::Yrcv => ymodem::recv_char(self, host, c)?,
                _ if c == XON || c == XOFF => Control::Pending,
                InputState::Idle => self.idle_char(host, c)?,
                InputState::InHeader => self.header_char(host, c)?,
                InputState::InData => self.data_char(host, c)?,
                InputState::Finish => self.finish_char(c),
            };
            if ctl == Control::Done {
                return Ok(Control::Done);
            }
            if self.drop_pending {
                self.drop_pending = false;
                break;
            }
        }
        Ok(Control::Pending)
    }

    /// The host's read timer expired with no input. Drives retries,
    /// resyncs, the YMODEM downgrade, and the sender's streaming pump
    /// (a zero [`timeout_secs`](Session::timeout_secs) asks for an
    /// immediate call).
    pub fn on_timeout<H: Host>(&mut self, host: &mut H) -> Result<Control> {
        self.timeout_count += 1;
        log::debug!("timeout {} in {:?}", self.timeout_count, self.state);
        match self.state {
            State::RStart if self.timeout_count > 4 => ymodem::downgrade_receiver(self, host),
            State::RStart | State::RSinitWait | State::RFileName => {
                if self.timeout > 0 {
                    host.status(&Status::PeerTimeout(self.timeout_count));
                }
                if self.timeout_count > 4 {
                    return Err(Error::ReceiveTimeout);
                }
                self.state = State::RStart;
                recv::send_rinit(self, host)?;
                Ok(Control::Pending)
            }
            State::RCrc | State::RFile | State::RData => {
                host.status(&Status::PeerTimeout(self.timeout_count));
                if self.timeout_count > 2 {
                    self.timeout_count = 0;
                    self.state = State::RStart;
                    recv::send_rinit(self, host)?;
                } else if self.state == State::RCrc {
                    recv::resend_crc_req(self, host)?;
                } else {
                    recv::resend_rpos(self, host)?;
                }
                Ok(Control::Pending)
            }
            State::RFinish => {
                host.status(&Status::PeerTimeout(self.timeout_count));
                self.state = State::Done;
                Ok(Control::Done)
            }
            State::YRStart | State::YRDataWait | State::YRData | State::YREof => {
                ymodem::recv_timeout(self, host)
            }
            State::Sending => send::send_more_file_data(self, host),
            State::SendWait | State::SendDone | State::SendEof => {
                host.status(&Status::PeerTimeout(self.timeout_count));
                Err(Error::SendTimeout)
            }
            State::StderrData => Err(Error::SendTimeout),
            State::Done => Ok(Control::Done),
            _ => {
                // TStart, TInit, FileWait, CrcWait, TFinish and the Y
                // sender states all wait on the peer with one long timer.
                host.status(&Status::PeerTimeout(self.timeout_count));
                Err(Error::ReceiveTimeout)
            }
        }
    }

    /// How long the host should wait for input before calling
    /// [`on_timeout`](Session::on_timeout). Zero means "no input needed,
    /// call it now" and drives the sender's streaming loop.
    pub fn timeout_secs(&self) -> u16 {
        self.timeout
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn streaming(&self) -> Streaming {
        self.streaming
    }

    /// Next byte offset within the current file.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Highest offset the peer has acknowledged.
    pub fn last_acked(&self) -> u32 {
        self.last_acked
    }

    pub fn err_count(&self) -> u32 {
        self.err_count
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Attributes of the file in transfer, once known.
    pub fn file(&self) -> Option<&FileInfo> {
        self.file.as_ref()
    }

    // ---- lexical layer ----

    /// Hunts for the ZPAD [ZPAD] ZDLE header introducer. Everything else
    /// is idle text for the host, noise for a streaming sender, or a
    /// YMODEM handshake aimed at a sender whose peer never spoke ZMODEM.
    fn idle_char<H: Host>(&mut self, host: &mut H, c: u8) -> Result<Control> {
        if self.chr_count == 0 {
            if c == ZPAD {
                self.chr_count = 1;
            } else if self.state == State::Sending {
                self.noise_count += 1;
                if self.noise_count > MAX_NOISE {
                    self.wait_flag = true;
                } else {
                    host.idle_bytes(&[c]);
                }
            } else if self.state == State::TStart && (c == b'C' || c == b'G' || c == NAK) {
                log::debug!("peer speaks YMODEM, downgrading");
                self.state = State::YTStart;
                self.input_state = InputState::Ysend;
                self.protocol = Protocol::Ymodem;
                return ymodem::send_char(self, host, c);
            } else {
                host.idle_bytes(&[c]);
            }
        } else {
            match c {
                ZPAD => self.chr_count += 1,
                ZDLE => {
                    self.input_state = InputState::InHeader;
                    self.escape_pending = false;
                    self.chr_count = 0;
                }
                _ => {
                    // False start: replay the swallowed pads as idle text.
                    for _ in 0..self.chr_count {
                        host.idle_bytes(b"*");
                    }
                    self.chr_count = 0;
                }
            }
        }
        Ok(Control::Pending)
    }

    /// Collects one header: a format byte, then 7 ZDLE-decoded bytes
    /// (ZBIN), 9 (ZBIN32), or 14 hex digits plus the CR LF tail (ZHEX).
    fn header_char<H: Host>(&mut self, host: &mut H, c: u8) -> Result<Control> {
        let mut c = c;
        if c == ZDLE {
            self.escape_pending = true;
            return Ok(Control::Pending);
        }
        if self.escape_pending {
            self.escape_pending = false;
            match escape::unescape(c) {
                Some(decoded) => c = decoded,
                None => return self.header_nak(host),
            }
        }
        if self.chr_count == 0 {
            return match Encoding::try_from(c) {
                Ok(encoding) => {
                    self.data_type = encoding;
                    self.chr_count = 1;
                    self.hdr_raw.clear();
                    Ok(Control::Pending)
                }
                Err(_) => {
                    // False start, back to hunting.
                    self.input_state = InputState::Idle;
                    Ok(Control::Pending)
                }
            };
        }
        match self.data_type {
            Encoding::ZHEX => {
                if self.chr_count <= 14 {
                    if !c.is_ascii_hexdigit() {
                        return self.header_nak(host);
                    }
                    self.hdr_raw.push(c);
                }
                if self.chr_count == 16 {
                    // Positions 15 and 16 swallow the CR LF tail.
                    let mut raw = [0u8; 7];
                    if hex::decode_to_slice(&self.hdr_raw[..14], &mut raw).is_err() {
                        return self.header_nak(host);
                    }
                    return self.header_complete(host, &raw);
                }
                self.chr_count += 1;
            }
            Encoding::ZBIN => {
                self.hdr_raw.push(c);
                self.chr_count += 1;
                if self.chr_count > 7 {
                    let mut raw = [0u8; 7];
                    raw.copy_from_slice(&self.hdr_raw[..7]);
                    return self.header_complete(host, &raw);
                }
            }
            Encoding::ZBIN32 => {
                self.hdr_raw.push(c);
                self.chr_count += 1;
                if self.chr_count > 9 {
                    let mut raw = [0u8; 9];
                    raw.copy_from_slice(&self.hdr_raw[..9]);
                    return self.header_complete(host, &raw);
                }
            }
        }
        Ok(Control::Pending)
    }

    fn header_complete<H: Host>(&mut self, host: &mut H, raw: &[u8]) -> Result<Control> {
        self.input_state = InputState::Idle;
        self.chr_count = 0;
        let bin32 = self.data_type == Encoding::ZBIN32;
        if !crc::check(&raw[..5], None, &raw[5..], bin32) {
            log::debug!("header CRC mismatch");
            self.send_hex_header(host, FrameKind::ZNAK, [0; 4])?;
            return Ok(Control::Pending);
        }
        self.hdr_data.copy_from_slice(&raw[..5]);
        proto::on_header(self, host)
    }

    fn header_nak<H: Host>(&mut self, host: &mut H) -> Result<Control> {
        self.input_state = InputState::Idle;
        self.chr_count = 0;
        self.send_hex_header(host, FrameKind::ZNAK, [0; 4])?;
        Ok(Control::Pending)
    }

    /// Reassembles a data subpacket: ZDLE-decoded payload, a terminator,
    /// then 2 or 4 CRC bytes.
    fn data_char<H: Host>(&mut self, host: &mut H, c: u8) -> Result<Control> {
        let mut c = c;
        if c == ZDLE {
            self.escape_pending = true;
            return Ok(Control::Pending);
        }
        if self.escape_pending {
            self.escape_pending = false;
            if self.crc_need == 0 {
                if let Ok(terminator) = Terminator::try_from(c) {
                    self.packet_type = terminator;
                    self.crc_need = if self.data_type == Encoding::ZBIN32 { 4 } else { 2 };
                    self.crc_got = 0;
                    return Ok(Control::Pending);
                }
            }
            match escape::unescape(c) {
                Some(decoded) => c = decoded,
                None => {
                    log::debug!("invalid escape in data");
                    return proto::on_data(self, host, false);
                }
            }
        }
        if self.crc_need == 0 {
            if self.buffer.len() == self.buffer.capacity() {
                log::debug!("subpacket overflows the reassembly buffer");
                return proto::on_data(self, host, false);
            }
            self.buffer.push(c);
        } else {
            self.crc_buf[self.crc_got] = c;
            self.crc_got += 1;
            if self.crc_got == self.crc_need {
                let bin32 = self.data_type == Encoding::ZBIN32;
                let good = crc::check(
                    &self.buffer,
                    Some(self.packet_type as u8),
                    &self.crc_buf[..self.crc_need],
                    bin32,
                );
                self.crc_need = 0;
                return proto::on_data(self, host, good);
            }
        }
        Ok(Control::Pending)
    }

    /// Waits out the closing "OO".
    fn finish_char(&mut self, c: u8) -> Control {
        if c == b'O' {
            self.chr_count += 1;
            if self.chr_count >= 2 {
                self.state = State::Done;
                return Control::Done;
            }
        } else {
            self.chr_count = 0;
        }
        Control::Pending
    }

    // ---- shared wire helpers ----

    pub(crate) fn send_hex_header<H: Host>(
        &mut self,
        host: &mut H,
        kind: FrameKind,
        data: [u8; 4],
    ) -> Result<()> {
        Header::new(Encoding::ZHEX, kind)
            .with_data(data)
            .write(host, &mut self.escaper)
    }

    /// Binary header, upgraded to ZBIN32 when the session runs 32-bit
    /// CRCs.
    pub(crate) fn send_bin_header<H: Host>(
        &mut self,
        host: &mut H,
        kind: FrameKind,
        data: [u8; 4],
    ) -> Result<()> {
        let encoding = if self.crc32 {
            Encoding::ZBIN32
        } else {
            Encoding::ZBIN
        };
        Header::new(encoding, kind)
            .with_data(data)
            .write(host, &mut self.escaper)
    }

    /// Arms the lexical layer for an incoming data subpacket.
    pub(crate) fn data_setup(&mut self) {
        self.input_state = InputState::InData;
        self.buffer.clear();
        self.escape_pending = false;
        self.crc_need = 0;
        self.crc_got = 0;
    }

    /// The four-byte little-endian payload of the last header.
    pub(crate) fn hdr_count(&self) -> u32 {
        u32::from_le_bytes([
            self.hdr_data[1],
            self.hdr_data[2],
            self.hdr_data[3],
            self.hdr_data[4],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHost {
        wire: Vec<u8>,
        idle: Vec<u8>,
    }

    impl NullHost {
        fn new() -> Self {
            Self {
                wire: Vec::new(),
                idle: Vec::new(),
            }
        }
    }

    impl Host for NullHost {
        fn send(&mut self, data: &[u8]) -> Result<()> {
            self.wire.extend_from_slice(data);
            Ok(())
        }

        fn idle_bytes(&mut self, data: &[u8]) {
            self.idle.extend_from_slice(data);
        }
    }

    #[test]
    fn test_idle_text_reaches_host() {
        let mut host = NullHost::new();
        let mut s = Session::new_receiver(Config::default());
        assert_eq!(s.feed(&mut host, b"login: "), Ok(Control::Pending));
        assert_eq!(host.idle, b"login: ");
    }

    #[test]
    fn test_lone_pad_is_replayed() {
        let mut host = NullHost::new();
        let mut s = Session::new_receiver(Config::default());
        s.feed(&mut host, b"*x").unwrap();
        assert_eq!(host.idle, b"*");
    }

    #[test]
    fn test_five_cans_cancel() {
        let mut host = NullHost::new();
        let mut s = Session::new_receiver(Config::default());
        assert_eq!(
            s.feed(&mut host, &[CAN, CAN, CAN, CAN, CAN]),
            Err(Error::Cancelled)
        );
        assert!(s.is_done());
    }

    #[test]
    fn test_can_counter_resets() {
        let mut host = NullHost::new();
        let mut s = Session::new_receiver(Config::default());
        let noisy = [CAN, CAN, CAN, CAN, b'x', CAN, CAN, CAN, CAN, b'x'];
        assert_eq!(s.feed(&mut host, &noisy), Ok(Control::Pending));
    }

    #[test]
    fn test_bad_header_format_byte_returns_to_idle() {
        let mut host = NullHost::new();
        let mut s = Session::new_receiver(Config::default());
        s.feed(&mut host, &[ZPAD, ZPAD, ZDLE, b'Q']).unwrap();
        assert_eq!(s.input_state, InputState::Idle);
        assert!(host.wire.is_empty());
    }

    #[test]
    fn test_receiver_first_timeout_sends_zrinit() {
        let mut host = NullHost::new();
        let mut s = Session::new_receiver(Config::default());
        s.start(&mut host).unwrap();
        assert_eq!(s.timeout_secs(), 0);
        s.on_timeout(&mut host).unwrap();
        // ZRINIT, hex-encoded: "**\x18B01...".
        assert_eq!(&host.wire[..4], &[ZPAD, ZPAD, ZDLE, 0x42]);
    }
}
