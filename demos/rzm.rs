// SPDX-License-Identifier: MIT OR Apache-2.0
//! `rz` work-alike: receives files over stdin/stdout, e.g. from `sz`.

use clap::{App, Arg};
use std::fs::File;
use std::io::{Read, Stdout, Write};
use std::path::{Path, PathBuf};
use zmcore::{Config, Control, FileDisposition, FileInfo, Host, Session, Status};

struct RzHost {
    out: Stdout,
    dir: PathBuf,
    file: Option<File>,
}

impl Host for RzHost {
    fn send(&mut self, data: &[u8]) -> zmcore::Result<()> {
        let mut out = self.out.lock();
        out.write_all(data)
            .and_then(|_| out.flush())
            .map_err(|_| zmcore::Error::System)
    }

    fn open_file(&mut self, info: &FileInfo, _crc: Option<u32>) -> zmcore::Result<FileDisposition> {
        // Strip any path the sender put on the name.
        let name = Path::new(&info.name)
            .file_name()
            .ok_or(zmcore::Error::System)?;
        let file = File::create(self.dir.join(name)).map_err(|_| zmcore::Error::System)?;
        self.file = Some(file);
        Ok(FileDisposition::Accept { offset: 0 })
    }

    fn write_file(&mut self, data: &[u8]) -> zmcore::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data).map_err(|_| zmcore::Error::System),
            None => Err(zmcore::Error::System),
        }
    }

    fn close_file(&mut self) {
        self.file = None;
    }

    fn status(&mut self, status: &Status) {
        match status {
            Status::FileBegin(name) => eprintln!("receiving {name}"),
            Status::FileEnd(name) => eprintln!("finished {name}"),
            Status::FileSkip(name) => eprintln!("skipping {name}"),
            _ => (),
        }
    }
}

fn main() {
    let matches = App::new("Sans-I/O rz")
        .arg(Arg::with_name("dir").help("output directory").index(1))
        .get_matches();
    let dir = PathBuf::from(matches.value_of("dir").unwrap_or("."));

    let mut host = RzHost {
        out: std::io::stdout(),
        dir,
        file: None,
    };
    let mut session = Session::new_receiver(Config::default());
    session.start(&mut host).expect("start");
    if session.timeout_secs() == 0 {
        session.on_timeout(&mut host).expect("greet");
    }

    let mut stdin = std::io::stdin();
    let mut buf = [0u8; 4096];
    loop {
        let n = stdin.read(&mut buf).expect("read stdin");
        if n == 0 {
            eprintln!("peer went away");
            std::process::exit(1);
        }
        match session.feed(&mut host, &buf[..n]) {
            Ok(Control::Pending) => (),
            Ok(Control::Done) => break,
            Err(err) => {
                eprintln!("transfer failed: {err}");
                std::process::exit(1);
            }
        }
    }
}
