// Copyright (c) 2025 Huawei Technologies Co.,Ltd. All rights reserved.
//
// Argonc is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use std::{
    fs::remove_file,
    io::IoSliceMut,
    mem,
    os::{
        fd::RawFd,
        unix::io::AsRawFd,
        unix::net::{UnixListener, UnixStream},
    },
    path::Path,
    process::exit,
};

use anyhow::{bail, Context, Result};
use clap::{builder::NonEmptyStringValueParser, crate_description, Parser};
use nix::{
    cmsg_space,
    errno::Errno,
    sys::socket::{recvmsg, ControlMessageOwned, MsgFlags, UnixAddr},
    unistd,
};

#[derive(Parser, Debug)]
#[command(version, author, about = crate_description!())]
struct Cli {
    // Specify path of the notify socket to listen on.
    #[arg(value_parser = NonEmptyStringValueParser::new(), required = true)]
    pub notify_socket: String,
}

// Each message carries a little-endian u64 payload length, the payload and
// one descriptor as ancillary data.
fn print_payload(stream: &UnixStream) -> Result<()> {
    let mut len_bytes = [0u8; mem::size_of::<u64>()];
    let mut payload = vec![0u8; 2048];
    let mut cmsg_buffer = cmsg_space!([RawFd; 1]);
    let mut fd: RawFd = -1;

    let bytes = loop {
        let mut iov = [
            IoSliceMut::new(&mut len_bytes),
            IoSliceMut::new(&mut payload),
        ];
        match recvmsg::<UnixAddr>(
            stream.as_raw_fd(),
            &mut iov,
            Some(&mut cmsg_buffer),
            MsgFlags::MSG_CMSG_CLOEXEC,
        ) {
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e).with_context(|| "recvmsg error"),
            Ok(msg) => {
                for cmsg in msg.cmsgs() {
                    if let ControlMessageOwned::ScmRights(fds) = cmsg {
                        fd = fds[0];
                    }
                }
                break msg.bytes;
            }
        }
    };

    if bytes < len_bytes.len() {
        bail!("Received a truncated message of {} bytes", bytes);
    }
    if fd < 0 {
        bail!("No file descriptor received");
    }

    let payload_len = u64::from_le_bytes(len_bytes) as usize;
    let payload = &payload[..payload_len.min(payload.len())];
    println!("{}", String::from_utf8_lossy(payload).trim_end_matches('\0'));

    unistd::close(fd).with_context(|| "Failed to close received descriptor")?;
    Ok(())
}

fn listen_on_socket(listener: &UnixListener) -> Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(s) => {
                if let Err(e) = print_payload(&s) {
                    eprintln!("{}", e);
                }
            }
            Err(e) => bail!("Failed to accept incoming connection: {}", e),
        }
    }
    Ok(())
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();

    let path = Path::new(&cli.notify_socket);
    if path.exists() {
        remove_file(path).with_context(|| "Failed to remove stale socket")?;
    }
    let listener =
        UnixListener::bind(path).with_context(|| "Failed to bind to the socket")?;
    listen_on_socket(&listener)?;

    Ok(())
}

fn main() {
    match real_main() {
        Ok(_) => exit(0),
        Err(e) => {
            eprintln!("{}", e);
            exit(1)
        }
    }
}
