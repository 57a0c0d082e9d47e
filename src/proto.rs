// SPDX-License-Identifier: MIT OR Apache-2.0
//! Protocol-layer state machine.
//!
//! One transition rule per (state, header kind) pair: an action, two
//! flush flags and the successor state. States not reachable for a
//! header fall through to [`Action::ProtocolErr`], which reports and
//! ignores — stray headers happen whenever a line echoes or old
//! pipelined frames finally land.

use crate::frame::FrameKind;
use crate::host::{Host, Status};
use crate::session::{InputState, Session, State};
use crate::{recv, send, Control, Result, EPERM};
use core::convert::TryFrom;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Ignore,
    ProtocolErr,
    RetDone,
    AnswerChallenge,
    GotAbort,
    GotCommand,
    GotStderr,
    // receiver
    SendRinit,
    GotSinit,
    GotFile,
    GotFin,
    GotData,
    GotEof,
    GotFreecnt,
    GotFileCrc,
    ResendCrcReq,
    ResendRpos,
    // sender
    GotRinit,
    SendZsinit,
    SendFilename,
    SendFileCrc,
    SendFileData,
    SkipFile,
    GotSendAck,
    GotSendDoneAck,
    GotSendNak,
    GotSendPos,
    GotSendWaitAck,
    ResendEof,
    Finish,
    OverAndOut,
}

pub(crate) struct Rule {
    pub action: Action,
    pub flush_in: bool,
    pub flush_out: bool,
    pub next: State,
}

const fn rule(action: Action, flush_in: bool, flush_out: bool, next: State) -> Rule {
    Rule {
        action,
        flush_in,
        flush_out,
        next,
    }
}

/// The transition table, one match arm per state. Rows mirror the order
/// the classic driver searched them in; the final arm of each state is
/// its wildcard.
fn rule_for(state: State, kind: FrameKind) -> Rule {
    use Action as A;
    use FrameKind::*;
    use State::*;
    match state {
        RStart => match kind {
            ZSINIT => rule(A::GotSinit, false, true, RSinitWait),
            ZFILE => rule(A::GotFile, false, false, RFileName),
            ZRQINIT => rule(A::SendRinit, false, true, RStart),
            ZFIN => rule(A::GotFin, true, false, RFinish),
            ZNAK => rule(A::SendRinit, true, false, RStart),
            ZFREECNT => rule(A::GotFreecnt, false, false, RStart),
            ZCOMMAND => rule(A::GotCommand, false, false, RStart),
            ZSTDERR => rule(A::GotStderr, false, false, StderrData),
            _ => rule(A::ProtocolErr, false, false, RStart),
        },
        RSinitWait => rule(A::ProtocolErr, false, false, RSinitWait),
        RFileName => rule(A::ProtocolErr, false, false, RFileName),
        RCrc => match kind {
            ZCRC => rule(A::GotFileCrc, false, false, RFile),
            ZNAK => rule(A::ResendCrcReq, false, false, RCrc),
            ZRQINIT => rule(A::SendRinit, true, true, RStart),
            ZFIN => rule(A::GotFin, true, true, RFinish),
            _ => rule(A::ProtocolErr, false, false, RCrc),
        },
        RFile => match kind {
            ZDATA => rule(A::GotData, false, false, RData),
            ZNAK => rule(A::ResendRpos, false, false, RFile),
            ZEOF => rule(A::GotEof, false, false, RStart),
            ZRQINIT => rule(A::SendRinit, true, true, RStart),
            ZFILE => rule(A::ResendRpos, false, false, RFile),
            ZFIN => rule(A::GotFin, true, true, RFinish),
            _ => rule(A::ProtocolErr, false, false, RFile),
        },
        RData => match kind {
            ZRQINIT => rule(A::SendRinit, true, true, RStart),
            ZFILE => rule(A::GotFile, false, true, RFileName),
            ZNAK => rule(A::ResendRpos, true, true, RFile),
            ZFIN => rule(A::GotFin, true, true, RFinish),
            ZDATA => rule(A::GotData, false, true, RData),
            ZEOF => rule(A::GotEof, true, true, RStart),
            _ => rule(A::ProtocolErr, false, false, RData),
        },
        RFinish => match kind {
            ZRQINIT => rule(A::SendRinit, true, true, RStart),
            ZFILE => rule(A::GotFile, true, true, RFileName),
            ZNAK | ZFIN => rule(A::GotFin, true, true, RFinish),
            _ => rule(A::ProtocolErr, false, false, RFinish),
        },
        TStart => match kind {
            ZRINIT => rule(A::GotRinit, true, true, TStart),
            ZCHALLENGE => rule(A::AnswerChallenge, true, false, TStart),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            ZNAK => rule(A::Ignore, false, false, TStart),
            ZCOMMAND => rule(A::GotCommand, false, false, TStart),
            ZSTDERR => rule(A::GotStderr, false, false, StderrData),
            _ => rule(A::ProtocolErr, false, false, TStart),
        },
        TInit => match kind {
            ZACK => rule(A::RetDone, true, false, TInit),
            ZNAK => rule(A::SendZsinit, true, false, TInit),
            ZRINIT => rule(A::GotRinit, true, true, TInit),
            ZCHALLENGE => rule(A::AnswerChallenge, true, false, TInit),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            ZCOMMAND => rule(A::GotCommand, false, false, TInit),
            ZSTDERR => rule(A::GotStderr, false, false, StderrData),
            _ => rule(A::ProtocolErr, false, false, TInit),
        },
        FileWait => match kind {
            ZRPOS => rule(A::SendFileData, true, false, Sending),
            ZSKIP => rule(A::SkipFile, true, false, FileWait),
            ZCRC => rule(A::SendFileCrc, true, false, FileWait),
            ZNAK => rule(A::SendFilename, true, false, FileWait),
            // The receiver lost track and reopened; offer the file again.
            ZRINIT => rule(A::SendFilename, true, true, FileWait),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            ZCHALLENGE => rule(A::AnswerChallenge, true, false, FileWait),
            ZCOMMAND => rule(A::GotCommand, false, false, FileWait),
            ZSTDERR => rule(A::GotStderr, false, false, StderrData),
            _ => rule(A::ProtocolErr, false, false, FileWait),
        },
        CrcWait => match kind {
            ZRPOS => rule(A::SendFileData, true, false, Sending),
            ZSKIP => rule(A::SkipFile, true, false, FileWait),
            ZNAK => rule(A::SendFileCrc, true, false, CrcWait),
            ZRINIT => rule(A::SendFilename, true, true, FileWait),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            ZCRC => rule(A::SendFileCrc, false, false, CrcWait),
            ZCHALLENGE => rule(A::AnswerChallenge, false, false, CrcWait),
            _ => rule(A::ProtocolErr, false, false, CrcWait),
        },
        Sending => match kind {
            ZACK => rule(A::GotSendAck, false, false, Sending),
            ZRPOS => rule(A::GotSendPos, true, true, Sending),
            ZSKIP => rule(A::SkipFile, true, true, FileWait),
            ZNAK => rule(A::GotSendNak, true, true, Sending),
            ZRINIT => rule(A::SendFilename, true, true, FileWait),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            _ => rule(A::ProtocolErr, false, false, SendWait),
        },
        SendDone => match kind {
            ZACK => rule(A::GotSendDoneAck, false, false, SendWait),
            ZRPOS => rule(A::GotSendPos, true, true, Sending),
            ZSKIP => rule(A::SkipFile, true, true, FileWait),
            ZNAK => rule(A::GotSendNak, true, true, Sending),
            ZRINIT => rule(A::SendFilename, true, true, FileWait),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            _ => rule(A::ProtocolErr, false, false, SendWait),
        },
        SendWait => match kind {
            ZACK => rule(A::GotSendWaitAck, false, false, Sending),
            ZRPOS => rule(A::GotSendPos, false, false, SendWait),
            ZSKIP => rule(A::SkipFile, true, true, FileWait),
            ZNAK => rule(A::GotSendNak, false, false, Sending),
            ZRINIT => rule(A::SendFilename, true, true, FileWait),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            _ => rule(A::ProtocolErr, false, false, SendWait),
        },
        SendEof => match kind {
            // The fresh ZRINIT is the receiver accepting the file.
            ZRINIT => rule(A::SkipFile, true, false, TStart),
            ZACK => rule(A::Ignore, false, false, SendEof),
            ZRPOS => rule(A::GotSendPos, true, true, SendWait),
            ZSKIP => rule(A::SkipFile, true, true, TStart),
            ZNAK => rule(A::ResendEof, true, false, SendEof),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            _ => rule(A::ProtocolErr, false, false, SendEof),
        },
        TFinish => match kind {
            ZFIN => rule(A::OverAndOut, true, true, Done),
            ZNAK | ZRINIT => rule(A::Finish, true, true, TFinish),
            ZABORT | ZFERR => rule(A::GotAbort, true, true, TFinish),
            _ => rule(A::ProtocolErr, false, false, TFinish),
        },
        StderrData => rule(A::ProtocolErr, false, false, StderrData),
        Done => rule(A::ProtocolErr, false, false, Done),
        // The fallback states never see ZMODEM headers; their input goes
        // through the Y parsers instead.
        _ => rule(A::ProtocolErr, false, false, state),
    }
}

/// Entry point from the lexical layer: a complete, CRC-checked header
/// sits in `s.hdr_data`.
pub(crate) fn on_header<H: Host>(s: &mut Session, host: &mut H) -> Result<Control> {
    let kind = match FrameKind::try_from(s.hdr_data[0]) {
        Ok(kind) => kind,
        Err(_) => {
            host.status(&Status::ProtocolError(s.hdr_data[0]));
            return Ok(Control::Pending);
        }
    };
    log::debug!(
        "received {:?} {:02x?} in {:?}",
        kind,
        &s.hdr_data[1..],
        s.state
    );
    s.timeout_count = 0;
    s.noise_count = 0;

    let r = rule_for(s.state, kind);
    // Where a ZSTDERR burst returns to once its message is in.
    s.resume_state = s.state;
    s.state = r.next;
    if r.flush_in {
        s.drop_pending = true;
        host.flush_input();
    }
    if r.flush_out {
        host.flush_output();
    }
    run(s, host, r.action)
}

fn run<H: Host>(s: &mut Session, host: &mut H, action: Action) -> Result<Control> {
    use Action as A;
    match action {
        A::Ignore => Ok(Control::Pending),
        A::ProtocolErr => {
            // Pause any in-progress transmission until the peer resyncs.
            s.wait_flag = true;
            host.status(&Status::ProtocolError(s.hdr_data[0]));
            Ok(Control::Pending)
        }
        A::RetDone => send::sinit_acked(s, host),
        A::AnswerChallenge => {
            let nonce = [s.hdr_data[1], s.hdr_data[2], s.hdr_data[3], s.hdr_data[4]];
            s.send_hex_header(host, FrameKind::ZACK, nonce)?;
            Ok(Control::Pending)
        }
        A::GotAbort => {
            host.status(&Status::RemoteCancel);
            s.send_hex_header(host, FrameKind::ZFIN, [0; 4])?;
            Ok(Control::Pending)
        }
        A::GotCommand => {
            // Remote command execution stays refused.
            s.send_hex_header(host, FrameKind::ZCOMPL, [EPERM, 0, 0, 0])?;
            Ok(Control::Pending)
        }
        A::GotStderr => {
            s.data_setup();
            Ok(Control::Pending)
        }
        A::SendRinit => recv::send_rinit(s, host).map(|_| Control::Pending),
        A::GotSinit => recv::got_sinit(s),
        A::GotFile => recv::got_file(s),
        A::GotFin => recv::got_fin(s, host),
        A::GotData => recv::got_data(s, host),
        A::GotEof => recv::got_eof(s, host),
        A::GotFreecnt => recv::got_freecnt(s, host),
        A::GotFileCrc => recv::got_file_crc(s, host),
        A::ResendCrcReq => recv::resend_crc_req(s, host).map(|_| Control::Pending),
        A::ResendRpos => recv::resend_rpos(s, host).map(|_| Control::Pending),
        A::GotRinit => send::got_rinit(s, host),
        A::SendZsinit => send::send_zsinit(s, host),
        A::SendFilename => send::send_filename(s, host).map(|_| Control::Pending),
        A::SendFileCrc => send::send_file_crc(s, host),
        A::SendFileData => send::send_file_data(s, host),
        A::SkipFile => send::skip_file(s, host),
        A::GotSendAck => send::got_send_ack(s),
        A::GotSendDoneAck => send::got_send_done_ack(s, host),
        A::GotSendNak => send::got_send_nak(s, host),
        A::GotSendPos => send::got_send_pos(s, host),
        A::GotSendWaitAck => send::got_send_wait_ack(s, host),
        A::ResendEof => send::resend_eof(s, host),
        A::Finish => s.finish(host),
        A::OverAndOut => send::over_and_out(s, host),
    }
}

/// Entry point from the lexical layer for a complete data subpacket.
pub(crate) fn on_data<H: Host>(s: &mut Session, host: &mut H, crc_ok: bool) -> Result<Control> {
    match s.state {
        State::RSinitWait => recv::got_sinit_data(s, host, crc_ok),
        State::RFileName => recv::got_file_name(s, host, crc_ok),
        State::RData => recv::got_file_data(s, host, crc_ok),
        State::StderrData => {
            s.input_state = InputState::Idle;
            s.chr_count = 0;
            s.state = s.resume_state;
            if crc_ok {
                let msg = String::from_utf8_lossy(&s.buffer).into_owned();
                host.status(&Status::RemoteMessage(msg));
            }
            Ok(Control::Pending)
        }
        _ => {
            // Data with no frame to own it; drop it and resync.
            s.input_state = InputState::Idle;
            s.chr_count = 0;
            s.wait_flag = true;
            host.status(&Status::ProtocolError(s.hdr_data[0]));
            Ok(Control::Pending)
        }
    }
}
