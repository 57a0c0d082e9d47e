// SPDX-License-Identifier: MIT OR Apache-2.0
//! `sz` work-alike: sends the named files over stdin/stdout, e.g. to `rz`.

use clap::{App, Arg};
use crc::{Crc, CRC_32_ISO_HDLC};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Stdout, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;
use zmcore::{Config, Control, FileInfo, Host, Session, ZCBIN};

struct SzHost {
    out: Stdout,
    file: Option<File>,
}

impl Host for SzHost {
    fn send(&mut self, data: &[u8]) -> zmcore::Result<()> {
        let mut out = self.out.lock();
        out.write_all(data)
            .and_then(|_| out.flush())
            .map_err(|_| zmcore::Error::System)
    }

    fn read_file(&mut self, buf: &mut [u8]) -> zmcore::Result<usize> {
        self.file
            .as_mut()
            .ok_or(zmcore::Error::System)?
            .read(buf)
            .map_err(|_| zmcore::Error::System)
    }

    fn seek_file(&mut self, offset: u32) -> zmcore::Result<()> {
        self.file
            .as_mut()
            .ok_or(zmcore::Error::System)?
            .seek(SeekFrom::Start(offset.into()))
            .map(|_| ())
            .map_err(|_| zmcore::Error::System)
    }

    fn file_crc32(&mut self) -> zmcore::Result<u32> {
        const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
        let file = self.file.as_mut().ok_or(zmcore::Error::System)?;
        file.seek(SeekFrom::Start(0))
            .map_err(|_| zmcore::Error::System)?;
        let mut digest = CRC32.digest();
        let mut buf = [0u8; 4096];
        loop {
            let n = file.read(&mut buf).map_err(|_| zmcore::Error::System)?;
            if n == 0 {
                break;
            }
            digest.update(&buf[..n]);
        }
        file.seek(SeekFrom::Start(0))
            .map_err(|_| zmcore::Error::System)?;
        Ok(digest.finalize())
    }

    fn close_file(&mut self) {
        self.file = None;
    }
}

fn file_info(path: &str, files_remaining: u32) -> FileInfo {
    let meta = std::fs::metadata(path).ok();
    let date = meta
        .as_ref()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    FileInfo {
        name,
        len: meta.as_ref().map(|m| m.len() as u32).unwrap_or(0),
        date,
        mode: 0o100644,
        files_remaining,
        conversion: ZCBIN,
        ..FileInfo::default()
    }
}

fn pump(session: &mut Session, host: &mut SzHost, stdin: &mut impl Read) -> Control {
    let mut buf = [0u8; 4096];
    loop {
        if session.timeout_secs() == 0 {
            match session.on_timeout(host) {
                Ok(Control::Pending) => continue,
                Ok(Control::Done) => return Control::Done,
                Err(err) => {
                    eprintln!("transfer failed: {err}");
                    std::process::exit(1);
                }
            }
        }
        let n = stdin.read(&mut buf).expect("read stdin");
        if n == 0 {
            eprintln!("peer went away");
            std::process::exit(1);
        }
        match session.feed(host, &buf[..n]) {
            Ok(Control::Pending) => (),
            Ok(Control::Done) => return Control::Done,
            Err(err) => {
                eprintln!("transfer failed: {err}");
                std::process::exit(1);
            }
        }
    }
}

fn main() {
    let matches = App::new("Sans-I/O sz")
        .arg(
            Arg::with_name("files")
                .help("files to send")
                .required(true)
                .multiple(true),
        )
        .get_matches();
    let files: Vec<&str> = matches.values_of("files").unwrap().collect();

    let mut host = SzHost {
        out: std::io::stdout(),
        file: None,
    };
    let mut session = Session::new_sender(Config::default());
    let mut stdin = std::io::stdin();
    session.start(&mut host).expect("start");

    let total = files.len() as u32;
    for (i, &path) in files.iter().enumerate() {
        host.file = Some(File::open(path).expect("open file"));
        let info = file_info(path, total - i as u32);
        session.send_file(&mut host, &info).expect("offer file");
        pump(&mut session, &mut host, &mut stdin);
        eprintln!("sent {path}");
    }
    session.finish(&mut host).expect("finish");
    pump(&mut session, &mut host, &mut stdin);
}
