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
    io::{ErrorKind, IoSlice, IoSliceMut},
    mem,
    os::{
        fd::RawFd,
        unix::io::{AsRawFd, IntoRawFd},
        unix::net::{UnixListener, UnixStream},
    },
    path::Path,
};

use anyhow::{Context, Result};
use nix::{
    cmsg_space,
    errno::Errno,
    sys::socket::{
        recvmsg, sendmsg, socketpair, AddressFamily, ControlMessage, ControlMessageOwned,
        MsgFlags, SockFlag, SockType, UnixAddr,
    },
    unistd,
};
use thiserror::Error;

/// Transport failures a caller may want to tell apart from each other.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Connection closed by peer")]
    Closed,
    #[error("Received {got} bytes of a {expected} byte frame")]
    Truncated { expected: usize, got: usize },
    #[error("No file descriptor attached to the received message")]
    NoDescriptor,
}

/// One end of a bidirectional channel carrying a byte payload plus exactly
/// one open file descriptor per message.
///
/// Each message is framed with a little-endian u64 payload length. The sent
/// descriptor stays open on the sending side; the received descriptor is a
/// new one owned by the caller, and the channel never closes it.
pub struct Endpoint {
    fd: RawFd,
}

impl Endpoint {
    /// Create two connected endpoints, usable across a later fork.
    pub fn pair() -> Result<(Endpoint, Endpoint)> {
        let (first, second) = socketpair(
            AddressFamily::Unix,
            SockType::SeqPacket,
            None,
            SockFlag::SOCK_CLOEXEC,
        )
        .with_context(|| "Failed to create socket pair")?;
        Ok((Endpoint { fd: first }, Endpoint { fd: second }))
    }

    /// Connect to a rendezvous socket bound by a peer process.
    pub fn connect(path: &Path) -> Result<Endpoint> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("Failed to connect to {}", path.display()))?;
        Ok(Endpoint {
            fd: stream.into_raw_fd(),
        })
    }

    fn from_raw(fd: RawFd) -> Endpoint {
        Endpoint { fd }
    }

    pub fn close(&self) -> Result<()> {
        Ok(unistd::close(self.fd)?)
    }

    /// Transmit `payload` together with one open descriptor. Interrupted
    /// calls are retried.
    pub fn send(&self, fd: RawFd, payload: &[u8]) -> Result<()> {
        let len_bytes = (payload.len() as u64).to_le_bytes();
        let iov = [IoSlice::new(&len_bytes), IoSlice::new(payload)];
        let fds = [fd];
        let cmsgs = [ControlMessage::ScmRights(&fds)];

        loop {
            match sendmsg::<UnixAddr>(self.fd, &iov, &cmsgs, MsgFlags::empty(), None) {
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e).with_context(|| "Failed to send message"),
                Ok(_) => return Ok(()),
            }
        }
    }

    fn peek_payload_len(&self) -> Result<u64> {
        let mut len_bytes = [0u8; mem::size_of::<u64>()];
        let expected_len = len_bytes.len();

        loop {
            let mut iov = [IoSliceMut::new(&mut len_bytes)];
            match recvmsg::<UnixAddr>(self.fd, &mut iov, None, MsgFlags::MSG_PEEK) {
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e).with_context(|| "Failed to peek message length"),
                Ok(msg) => match msg.bytes {
                    0 => return Err(ChannelError::Closed.into()),
                    got if got < expected_len => {
                        return Err(ChannelError::Truncated {
                            expected: expected_len,
                            got,
                        }
                        .into())
                    }
                    _ => break,
                },
            }
        }
        Ok(u64::from_le_bytes(len_bytes))
    }

    /// Block until a message arrives and return the attached descriptor
    /// together with the payload. The descriptor must be closed by the
    /// caller once consumed.
    pub fn recv(&self) -> Result<(RawFd, Vec<u8>)> {
        let payload_len = self.peek_payload_len()? as usize;
        let mut len_bytes = [0u8; mem::size_of::<u64>()];
        let mut payload = vec![0u8; payload_len];
        let mut cmsg_buffer = cmsg_space!([RawFd; 1]);

        let (bytes, fd) = loop {
            let mut iov = [
                IoSliceMut::new(&mut len_bytes),
                IoSliceMut::new(&mut payload),
            ];
            match recvmsg::<UnixAddr>(
                self.fd,
                &mut iov,
                Some(&mut cmsg_buffer),
                MsgFlags::MSG_CMSG_CLOEXEC,
            ) {
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e).with_context(|| "Failed to receive message"),
                Ok(msg) => {
                    let mut fd = None;
                    for cmsg in msg.cmsgs() {
                        if let ControlMessageOwned::ScmRights(fds) = cmsg {
                            fd = fds.first().copied();
                        }
                    }
                    break (msg.bytes, fd);
                }
            }
        };

        if bytes == 0 {
            return Err(ChannelError::Closed.into());
        }
        let frame_len = mem::size_of::<u64>() + payload_len;
        if bytes < frame_len {
            return Err(ChannelError::Truncated {
                expected: frame_len,
                got: bytes,
            }
            .into());
        }
        let fd = fd.ok_or(ChannelError::NoDescriptor)?;
        Ok((fd, payload))
    }
}

impl AsRawFd for Endpoint {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// Single-shot rendezvous point for descriptor hand-off between unrelated
/// processes: bind a well-known path, accept one connection, receive one
/// message.
pub struct FdListener {
    socket: UnixListener,
}

impl FdListener {
    /// Bind `path`, removing a stale socket left behind by an earlier
    /// listener first.
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }
        let socket = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind {}", path.display()))?;
        Ok(Self { socket })
    }

    /// Accept exactly one connection and receive one message from it.
    pub fn accept_one(&self) -> Result<(RawFd, Vec<u8>)> {
        let stream = loop {
            match self.socket.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).with_context(|| "Failed to accept connection"),
            }
        };
        Endpoint::from_raw(stream.as_raw_fd()).recv()
    }

    pub fn close(&self) -> Result<()> {
        Ok(unistd::close(self.socket.as_raw_fd())?)
    }
}
