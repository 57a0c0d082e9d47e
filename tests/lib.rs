use rand::RngCore;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use zmcore::{
    attn_steps, AttnStep, Config, Control, Encoding, Error, Escaper, FileDisposition, FileInfo,
    FrameKind, Header, Host, Protocol, Session, Status, Streaming, Zrinit, ZCBIN, ZMCRC,
};

const ZPAD: u8 = b'*';
const ZDLE: u8 = 0x18;
const CAN: u8 = 0x18;

#[derive(Default)]
struct TestHost {
    wire: Vec<u8>,
    statuses: Vec<Status>,
    idle: Vec<u8>,
    attn_calls: usize,
    // receiver side
    received: Vec<u8>,
    opened: usize,
    closed: usize,
    open_crc: Option<Option<u32>>,
    skip: bool,
    // sender side
    outgoing: Cursor<Vec<u8>>,
    seeks: Vec<u32>,
}

impl TestHost {
    fn new() -> Self {
        Self::default()
    }

    fn sending(data: &[u8]) -> Self {
        Self {
            outgoing: Cursor::new(data.to_vec()),
            ..Self::default()
        }
    }

    fn take_wire(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.wire)
    }

    fn has_status(&self, wanted: &Status) -> bool {
        self.statuses.iter().any(|s| s == wanted)
    }
}

impl Host for TestHost {
    fn send(&mut self, data: &[u8]) -> zmcore::Result<()> {
        self.wire.extend_from_slice(data);
        Ok(())
    }

    fn status(&mut self, status: &Status) {
        self.statuses.push(status.clone());
    }

    fn idle_bytes(&mut self, data: &[u8]) {
        self.idle.extend_from_slice(data);
    }

    fn attention(&mut self, seq: &[u8]) -> zmcore::Result<()> {
        self.attn_calls += 1;
        for step in attn_steps(seq) {
            if let AttnStep::Bytes(chunk) = step {
                self.send(chunk)?;
            }
        }
        Ok(())
    }

    fn open_file(&mut self, _info: &FileInfo, crc: Option<u32>) -> zmcore::Result<FileDisposition> {
        if self.skip {
            return Ok(FileDisposition::Skip);
        }
        self.opened += 1;
        self.open_crc = Some(crc);
        Ok(FileDisposition::Accept { offset: 0 })
    }

    fn write_file(&mut self, data: &[u8]) -> zmcore::Result<()> {
        self.received.extend_from_slice(data);
        Ok(())
    }

    fn close_file(&mut self) {
        self.closed += 1;
    }

    fn read_file(&mut self, buf: &mut [u8]) -> zmcore::Result<usize> {
        self.outgoing.read(buf).map_err(|_| Error::System)
    }

    fn seek_file(&mut self, offset: u32) -> zmcore::Result<()> {
        self.seeks.push(offset);
        self.outgoing
            .seek(SeekFrom::Start(offset.into()))
            .map(|_| ())
            .map_err(|_| Error::System)
    }

    fn file_crc32(&mut self) -> zmcore::Result<u32> {
        let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
        Ok(crc.checksum(self.outgoing.get_ref()))
    }
}

fn hex_header(kind: FrameKind, data: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::new();
    Header::new(Encoding::ZHEX, kind)
        .with_data(data)
        .encode_into(&mut Escaper::new(), &mut out);
    out
}

fn random_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

/// Runs both ends against each other until the sender reports Done.
fn drive(
    sender: &mut Session,
    sh: &mut TestHost,
    receiver: &mut Session,
    rh: &mut TestHost,
) -> Control {
    for _ in 0..100_000 {
        if sender.timeout_secs() == 0 && sender.on_timeout(sh).unwrap() == Control::Done {
            return Control::Done;
        }
        assert!(sender.last_acked() <= sender.offset());
        let s_out = sh.take_wire();
        if !s_out.is_empty() {
            receiver.feed(rh, &s_out).unwrap();
        }
        if receiver.timeout_secs() == 0 {
            receiver.on_timeout(rh).unwrap();
        }
        let r_out = rh.take_wire();
        if !r_out.is_empty() && sender.feed(sh, &r_out).unwrap() == Control::Done {
            return Control::Done;
        }
        if s_out.is_empty() && r_out.is_empty() && sender.timeout_secs() != 0 {
            panic!(
                "deadlock: sender {:?}, receiver {:?}",
                sender.state(),
                receiver.state()
            );
        }
    }
    panic!("no progress");
}

/// One full ZMODEM batch of a single file, returning both hosts.
fn transfer(data: &[u8], info: FileInfo, sender_cfg: Config, receiver_cfg: Config) -> (TestHost, TestHost) {
    let mut sh = TestHost::sending(data);
    let mut rh = TestHost::new();
    let mut sender = Session::new_sender(sender_cfg);
    let mut receiver = Session::new_receiver(receiver_cfg);

    sender.start(&mut sh).unwrap();
    receiver.start(&mut rh).unwrap();
    sender.send_file(&mut sh, &info).unwrap();
    assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);

    sender.finish(&mut sh).unwrap();
    assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);
    assert!(sender.is_done());

    // Let the receiver see the closing "OO".
    let tail = sh.take_wire();
    assert_eq!(receiver.feed(&mut rh, &tail), Ok(Control::Done));
    assert!(receiver.is_done());
    (sh, rh)
}

fn file_info(name: &str, len: usize) -> FileInfo {
    FileInfo {
        name: name.into(),
        len: len as u32,
        files_remaining: 1,
        conversion: ZCBIN,
        ..FileInfo::default()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn zmodem_small_file() {
    let data = b"hello, wire";
    let (_, rh) = transfer(
        data,
        file_info("hello.txt", data.len()),
        Config::default(),
        Config::default(),
    );
    assert_eq!(rh.received, data);
    assert_eq!(rh.opened, 1);
    assert_eq!(rh.closed, 1);
    assert!(rh.has_status(&Status::FileBegin("hello.txt".into())));
    assert!(rh.has_status(&Status::FileEnd("hello.txt".into())));
}

#[test]
fn zmodem_large_random_file() {
    let data = random_payload(200 * 1024 + 37);
    let (sh, rh) = transfer(
        &data,
        file_info("blob.bin", data.len()),
        Config::default(),
        Config::default(),
    );
    assert_eq!(rh.received, data);
    assert!(sh.has_status(&Status::Streaming(Streaming::Full)));
}

#[test]
fn zmodem_exact_packet_multiple() {
    let data = random_payload(2048);
    let (_, rh) = transfer(
        &data,
        file_info("even.bin", data.len()),
        Config::default(),
        Config::default(),
    );
    assert_eq!(rh.received, data);
}

#[test]
fn zmodem_empty_file() {
    let (_, rh) = transfer(
        b"",
        file_info("empty", 0),
        Config::default(),
        Config::default(),
    );
    assert_eq!(rh.received, b"");
    assert_eq!(rh.closed, 1);
}

#[test]
fn zmodem_segmented_mode() {
    let data = random_payload(10 * 1024);
    let receiver_cfg = Config {
        capabilities: Zrinit::CANFC32,
        buffer_size: 1024,
        ..Config::default()
    };
    let (sh, rh) = transfer(
        &data,
        file_info("seg.bin", data.len()),
        Config::default(),
        receiver_cfg,
    );
    assert_eq!(rh.received, data);
    assert!(sh.has_status(&Status::Streaming(Streaming::Segmented)));
}

#[test]
fn zmodem_windowed_mode() {
    let data = random_payload(64 * 1024);
    let sender_cfg = Config {
        window_size: 8192,
        ..Config::default()
    };
    let (sh, rh) = transfer(
        &data,
        file_info("win.bin", data.len()),
        sender_cfg,
        Config::default(),
    );
    assert_eq!(rh.received, data);
    assert!(sh.has_status(&Status::Streaming(Streaming::StrWindow)));
}

#[test]
fn zmodem_sliding_window_mode() {
    let data = random_payload(16 * 1024);
    let sender_cfg = Config {
        can_sample: false,
        ..Config::default()
    };
    let (sh, rh) = transfer(
        &data,
        file_info("slide.bin", data.len()),
        sender_cfg,
        Config::default(),
    );
    assert_eq!(rh.received, data);
    assert!(sh.has_status(&Status::Streaming(Streaming::SlidingWindow)));
}

#[test]
fn zmodem_sinit_attention_exchange() {
    let data = random_payload(4096);
    let sender_cfg = Config {
        attn: b"#int#".to_vec(),
        ..Config::default()
    };
    let (_, rh) = transfer(
        &data,
        file_info("attn.bin", data.len()),
        sender_cfg,
        Config::default(),
    );
    assert_eq!(rh.received, data);
}

#[test]
fn zmodem_crc_challenge() {
    let data = random_payload(3000);
    let mut info = file_info("crc.bin", data.len());
    info.management = ZMCRC;
    let (_, rh) = transfer(&data, info, Config::default(), Config::default());
    assert_eq!(rh.received, data);
    // The acceptance policy saw the whole-file CRC.
    let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(&data);
    assert_eq!(rh.open_crc, Some(Some(crc)));
}

#[test]
fn zmodem_receiver_skip() {
    let mut sh = TestHost::sending(b"unwanted");
    let mut rh = TestHost::new();
    rh.skip = true;
    let mut sender = Session::new_sender(Config::default());
    let mut receiver = Session::new_receiver(Config::default());
    sender.start(&mut sh).unwrap();
    receiver.start(&mut rh).unwrap();
    sender.send_file(&mut sh, &file_info("junk", 8)).unwrap();
    assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);
    assert!(rh.received.is_empty());
    assert!(rh.has_status(&Status::FileSkip("junk".into())));
}

#[test]
fn sender_classifies_full_streaming() {
    // Literal ZRINIT off the wire: flags CANFDX|CANOVIO|CANFC32.
    let mut sh = TestHost::sending(b"");
    let mut sender = Session::new_sender(Config::default());
    sender.start(&mut sh).unwrap();
    sh.take_wire();
    let ctl = sender.feed(&mut sh, b"**\x18B0100000023a87c\r\n\x11").unwrap();
    assert_eq!(ctl, Control::Done);
    assert_eq!(sender.streaming(), Streaming::Full);
    assert!(sh.has_status(&Status::Streaming(Streaming::Full)));
}

#[test]
fn sender_without_duplex_peer_goes_segmented() {
    let mut sh = TestHost::sending(b"");
    let mut sender = Session::new_sender(Config::default());
    sender.start(&mut sh).unwrap();
    let zrinit = hex_header(FrameKind::ZRINIT, [0, 0, 0, Zrinit::CANFC32.bits()]);
    sender.feed(&mut sh, &zrinit).unwrap();
    assert_eq!(sender.streaming(), Streaming::Segmented);
}

#[test]
fn sender_happy_path_wire_shape() {
    let mut sh = TestHost::sending(b"data");
    let mut sender = Session::new_sender(Config::default());
    sender.start(&mut sh).unwrap();
    sender.send_file(&mut sh, &file_info("a", 4)).unwrap();
    sh.take_wire();

    // ZRINIT with CANFDX|CANOVIO|CANFC32 answers the ZRQINIT.
    sender
        .feed(&mut sh, &hex_header(FrameKind::ZRINIT, [0, 0, 0, 0x23]))
        .unwrap();
    let offer = sh.take_wire();
    // Binary-32 ZFILE header, then the name and attributes.
    assert_eq!(&offer[..4], &[ZPAD, ZDLE, 0x43, FrameKind::ZFILE as u8]);
    assert!(contains(&offer, b"a\x004 0 0 0 1 0 0\x00"));

    sender
        .feed(&mut sh, &hex_header(FrameKind::ZRPOS, 0u32.to_le_bytes()))
        .unwrap();
    let burst = sh.take_wire();
    // ZDATA(0), the escaped payload, and an immediate hex ZEOF(4).
    assert_eq!(&burst[..8], &[ZPAD, ZDLE, 0x43, FrameKind::ZDATA as u8, 0, 0, 0, 0]);
    assert!(contains(&burst, b"data"));
    assert!(contains(&burst, b"B0b04000000"));

    let ctl = sender
        .feed(&mut sh, &hex_header(FrameKind::ZRINIT, [0, 0, 0, 0x23]))
        .unwrap();
    assert_eq!(ctl, Control::Done);
}

#[test]
fn sender_reseeks_on_zrpos() {
    let data = random_payload(8 * 1024);
    let mut sh = TestHost::sending(&data);
    let mut sender = Session::new_sender(Config::default());
    sender.start(&mut sh).unwrap();
    sender.send_file(&mut sh, &file_info("re.bin", data.len())).unwrap();
    sender
        .feed(&mut sh, &hex_header(FrameKind::ZRINIT, [0, 0, 0, 0x23]))
        .unwrap();
    sender
        .feed(&mut sh, &hex_header(FrameKind::ZRPOS, 0u32.to_le_bytes()))
        .unwrap();
    // Pump a couple of streaming subpackets.
    sender.on_timeout(&mut sh).unwrap();
    sender.on_timeout(&mut sh).unwrap();
    assert!(sender.offset() > 100);
    sh.take_wire();

    sender
        .feed(&mut sh, &hex_header(FrameKind::ZRPOS, 100u32.to_le_bytes()))
        .unwrap();
    let replay = sh.take_wire();
    assert!(sh.seeks.contains(&100));
    // A fresh ZDATA frame opens at the requested offset.
    assert_eq!(&replay[..8], &[ZPAD, ZDLE, 0x43, FrameKind::ZDATA as u8, 100, 0, 0, 0]);
    assert_eq!(sender.err_count(), 1);
}

#[test]
fn receiver_bad_crc_recovery() {
    // Stage a sender whose attention string the receiver will learn.
    let mut sh = TestHost::sending(b"data");
    let mut sender = Session::new_sender(Config {
        attn: b"@!".to_vec(),
        ..Config::default()
    });
    sender.start(&mut sh).unwrap();
    sh.take_wire();
    sender
        .feed(&mut sh, &hex_header(FrameKind::ZRINIT, [0, 0, 0, 0x23]))
        .unwrap();
    let sinit = sh.take_wire();
    sender
        .feed(&mut sh, &hex_header(FrameKind::ZACK, 1u32.to_le_bytes()))
        .unwrap();
    sender.send_file(&mut sh, &file_info("x", 4)).unwrap();
    let offer = sh.take_wire();
    sender
        .feed(&mut sh, &hex_header(FrameKind::ZRPOS, 0u32.to_le_bytes()))
        .unwrap();
    let mut burst = sh.take_wire();

    // Now play it at a receiver, with one payload byte flipped.
    let mut rh = TestHost::new();
    let mut receiver = Session::new_receiver(Config::default());
    receiver.start(&mut rh).unwrap();
    receiver.on_timeout(&mut rh).unwrap();
    receiver.feed(&mut rh, &sinit).unwrap();
    receiver.feed(&mut rh, &offer).unwrap();
    assert_eq!(rh.opened, 1);
    rh.take_wire();

    let pos = burst.windows(4).position(|w| w == b"data").unwrap();
    burst[pos] = b'e';
    receiver.feed(&mut rh, &burst).unwrap();

    assert_eq!(receiver.err_count(), 1);
    assert!(rh.has_status(&Status::DataError(1)));
    assert_eq!(rh.attn_calls, 1);
    assert!(rh.received.is_empty());
    // The recovery ZRPOS asks for offset zero.
    let out = rh.take_wire();
    assert!(contains(&out, b"B0900000000"));
}

#[test]
fn five_cans_cancel_mid_transfer() {
    let data = random_payload(4096);
    let mut sh = TestHost::sending(&data);
    let mut rh = TestHost::new();
    let mut sender = Session::new_sender(Config::default());
    let mut receiver = Session::new_receiver(Config::default());
    sender.start(&mut sh).unwrap();
    receiver.start(&mut rh).unwrap();
    sender.send_file(&mut sh, &file_info("c.bin", data.len())).unwrap();
    // Bring the receiver into the data phase.
    receiver.feed(&mut rh, &sh.take_wire()).unwrap();
    sender.feed(&mut sh, &rh.take_wire()).unwrap();
    receiver.feed(&mut rh, &sh.take_wire()).unwrap();

    assert_eq!(
        receiver.feed(&mut rh, &[CAN; 5]),
        Err(Error::Cancelled)
    );
    assert!(rh.has_status(&Status::RemoteCancel));
    assert!(receiver.is_done());
}

#[test]
fn receiver_downgrades_to_ymodem_after_timeouts() {
    let mut rh = TestHost::new();
    let mut receiver = Session::new_receiver(Config::default());
    receiver.start(&mut rh).unwrap();
    for _ in 0..4 {
        receiver.on_timeout(&mut rh).unwrap();
    }
    assert_eq!(receiver.protocol(), Protocol::Zmodem);
    rh.take_wire();
    receiver.on_timeout(&mut rh).unwrap();
    assert_eq!(receiver.protocol(), Protocol::Ymodem);
    assert_eq!(rh.take_wire(), b"C");
}

fn y_transfer(
    mut sender: Session,
    mut sh: TestHost,
    mut receiver: Session,
    mut rh: TestHost,
    info: FileInfo,
) -> (TestHost, TestHost) {
    sender.start(&mut sh).unwrap();
    receiver.start(&mut rh).unwrap();
    sender.send_file(&mut sh, &info).unwrap();
    assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);
    if sender.finish(&mut sh).unwrap() == Control::Pending {
        assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);
    }
    let tail = sh.take_wire();
    if !tail.is_empty() {
        let _ = receiver.feed(&mut rh, &tail);
    }
    (sh, rh)
}

#[test]
fn ymodem_loopback() {
    let data = random_payload(5000);
    let (_, rh) = y_transfer(
        Session::new_ymodem_sender(Config::default()),
        TestHost::sending(&data),
        Session::new_ymodem_receiver(Config::default()),
        TestHost::new(),
        file_info("y.bin", data.len()),
    );
    // YMODEM pads the tail out to the packet grid with SUBs.
    assert!(rh.received.len() >= data.len());
    assert_eq!(&rh.received[..data.len()], &data[..]);
    assert!(rh.received[data.len()..].iter().all(|&b| b == 0x1a));
    assert!(rh.has_status(&Status::FileBegin("y.bin".into())));
}

#[test]
fn xmodem_loopback() {
    let data = random_payload(1000);
    let (_, rh) = y_transfer(
        Session::new_xmodem_sender(Config::default()),
        TestHost::sending(&data),
        Session::new_xmodem_receiver(Config::default()),
        TestHost::new(),
        file_info("x.bin", data.len()),
    );
    assert_eq!(&rh.received[..data.len()], &data[..]);
    assert_eq!(rh.opened, 1);
    assert_eq!(rh.closed, 1);
}

#[test]
fn zmodem_sender_downgrades_for_ymodem_receiver() {
    let data = random_payload(700);
    let (sh, rh) = y_transfer(
        Session::new_sender(Config::default()),
        TestHost::sending(&data),
        Session::new_ymodem_receiver(Config::default()),
        TestHost::new(),
        file_info("down.bin", data.len()),
    );
    assert_eq!(sh.statuses.iter().filter(|s| matches!(s, Status::RemoteCancel)).count(), 0);
    assert_eq!(&rh.received[..data.len()], &data[..]);
}

#[test]
fn batch_of_two_files() {
    let first = random_payload(1500);
    let second = random_payload(100);
    let mut sh = TestHost::sending(&first);
    let mut rh = TestHost::new();
    let mut sender = Session::new_sender(Config::default());
    let mut receiver = Session::new_receiver(Config::default());
    sender.start(&mut sh).unwrap();
    receiver.start(&mut rh).unwrap();

    sender.send_file(&mut sh, &file_info("one", first.len())).unwrap();
    assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);

    sh.outgoing = Cursor::new(second.clone());
    sender.send_file(&mut sh, &file_info("two", second.len())).unwrap();
    assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);

    sender.finish(&mut sh).unwrap();
    assert_eq!(drive(&mut sender, &mut sh, &mut receiver, &mut rh), Control::Done);

    let mut both = first;
    both.extend_from_slice(&second);
    assert_eq!(rh.received, both);
    assert_eq!(rh.closed, 2);
}

/// End-to-end against real files, receiver writing into a scratch dir.
#[test]
fn zmodem_to_disk() {
    struct DiskHost {
        wire: Vec<u8>,
        dir: std::path::PathBuf,
        file: Option<std::fs::File>,
        path: Option<std::path::PathBuf>,
    }

    impl Host for DiskHost {
        fn send(&mut self, data: &[u8]) -> zmcore::Result<()> {
            self.wire.extend_from_slice(data);
            Ok(())
        }

        fn open_file(&mut self, info: &FileInfo, _crc: Option<u32>) -> zmcore::Result<FileDisposition> {
            let path = self.dir.join(&info.name);
            self.file = Some(std::fs::File::create(&path).map_err(|_| Error::System)?);
            self.path = Some(path);
            Ok(FileDisposition::Accept { offset: 0 })
        }

        fn write_file(&mut self, data: &[u8]) -> zmcore::Result<()> {
            self.file
                .as_mut()
                .ok_or(Error::System)?
                .write_all(data)
                .map_err(|_| Error::System)
        }

        fn close_file(&mut self) {
            self.file = None;
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let data = random_payload(30_000);
    let mut sh = TestHost::sending(&data);
    let mut rh = DiskHost {
        wire: Vec::new(),
        dir: dir.path().to_path_buf(),
        file: None,
        path: None,
    };
    let mut sender = Session::new_sender(Config::default());
    let mut receiver = Session::new_receiver(Config::default());
    sender.start(&mut sh).unwrap();
    receiver.start(&mut rh).unwrap();
    sender.send_file(&mut sh, &file_info("disk.bin", data.len())).unwrap();

    for _ in 0..100_000 {
        if sender.timeout_secs() == 0 && sender.on_timeout(&mut sh).unwrap() == Control::Done {
            break;
        }
        let s_out = sh.take_wire();
        if !s_out.is_empty() {
            receiver.feed(&mut rh, &s_out).unwrap();
        }
        let r_out = std::mem::take(&mut rh.wire);
        if !r_out.is_empty() && sender.feed(&mut sh, &r_out).unwrap() == Control::Done {
            break;
        }
    }
    let written = std::fs::read(rh.path.as_ref().unwrap()).unwrap();
    assert_eq!(written, data);
}

#[test]
fn idle_text_is_passed_through() {
    let mut rh = TestHost::new();
    let mut receiver = Session::new_receiver(Config::default());
    receiver.start(&mut rh).unwrap();
    receiver.feed(&mut rh, b"NO CARRIER\r\n").unwrap();
    assert_eq!(rh.idle, b"NO CARRIER\r\n");
}

#[test]
fn challenge_is_echoed() {
    let mut sh = TestHost::sending(b"");
    let mut sender = Session::new_sender(Config::default());
    sender.start(&mut sh).unwrap();
    sh.take_wire();
    sender
        .feed(&mut sh, &hex_header(FrameKind::ZCHALLENGE, [0xde, 0xad, 0xbe, 0xef]))
        .unwrap();
    let reply = sh.take_wire();
    // Hex ZACK carrying the nonce back: type 03, payload de ad be ef.
    assert!(contains(&reply, b"B03deadbeef"));
}

#[test]
fn freecnt_reports_unlimited() {
    let mut rh = TestHost::new();
    let mut receiver = Session::new_receiver(Config::default());
    receiver.start(&mut rh).unwrap();
    receiver.on_timeout(&mut rh).unwrap();
    rh.take_wire();
    receiver
        .feed(&mut rh, &hex_header(FrameKind::ZFREECNT, [0; 4]))
        .unwrap();
    let reply = rh.take_wire();
    assert!(contains(&reply, b"B03ffffffff"));
}
