// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener descriptor transfer over a Unix domain socket.
//!
//! One ancillary message per handshake: the ASCII payload `PROCEED` in the
//! data portion and exactly one file descriptor attached as `SCM_RIGHTS`.
//! The kernel duplicates the descriptor on transfer; sender and receiver
//! hold independent references afterwards and close their own.

use std::io::{self, IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

use nix::sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags};
use nix::sys::stat::{fstat, SFlag};
use thiserror::Error;

/// Data payload accompanying the descriptor.
pub const PROCEED: &[u8] = b"PROCEED";

/// Data buffer for the receiving side. The payload is 7 bytes; the buffer
/// stays comfortably larger so a future payload change is not truncated.
const DATA_BUF: usize = 128;

/// Errors from descriptor transfer and inspection.
#[derive(Debug, Error)]
pub enum FdPassError {
    #[error("ancillary send failed: {0}")]
    Send(#[source] nix::Error),

    #[error("ancillary receive failed: {0}")]
    Recv(#[source] nix::Error),

    #[error("peer sent {payload:?} with no descriptor attached")]
    NoDescriptor { payload: String },

    #[error("descriptor inspection failed: {0}")]
    Inspect(#[source] nix::Error),
}

/// Send the listener descriptor with the `PROCEED` payload.
///
/// The descriptor is borrowed from the live listener; the caller must not
/// convert the listener out of the runtime's reactor (or clear its
/// non-blocking flag) to obtain it.
pub fn send_listener(conn: &impl AsRawFd, listener_fd: RawFd) -> Result<usize, FdPassError> {
    let iov = [IoSlice::new(PROCEED)];
    let fds = [listener_fd];
    let cmsgs = [ControlMessage::ScmRights(&fds)];
    sendmsg::<()>(conn.as_raw_fd(), &iov, &cmsgs, MsgFlags::empty(), None)
        .map_err(FdPassError::Send)
}

/// Receive one descriptor and the accompanying payload bytes.
///
/// Zero attached descriptors is an error; surplus descriptors beyond the
/// first are closed so they cannot leak.
pub fn recv_listener(conn: &impl AsRawFd) -> Result<(RawFd, Vec<u8>), FdPassError> {
    let mut data = [0u8; DATA_BUF];
    let mut cmsg_buf = nix::cmsg_space!([RawFd; 1]);
    let mut fds: Vec<RawFd> = Vec::new();

    let bytes = {
        let mut iov = [IoSliceMut::new(&mut data)];
        let msg = recvmsg::<()>(conn.as_raw_fd(), &mut iov, Some(&mut cmsg_buf), MsgFlags::empty())
            .map_err(FdPassError::Recv)?;
        for cmsg in msg.cmsgs().map_err(FdPassError::Recv)? {
            if let ControlMessageOwned::ScmRights(received) = cmsg {
                fds.extend(received);
            }
        }
        msg.bytes
    };

    let payload = data[..bytes].to_vec();
    match fds.split_first() {
        Some((&fd, extra)) => {
            for &surplus in extra {
                let _ = nix::unistd::close(surplus);
            }
            Ok((fd, payload))
        }
        None => Err(FdPassError::NoDescriptor {
            payload: String::from_utf8_lossy(&payload).into_owned(),
        }),
    }
}

/// What an inspected descriptor turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdKind {
    Socket,
    RegularFile,
    Pipe,
    Other,
}

impl FdKind {
    pub fn describe(&self) -> &'static str {
        match self {
            FdKind::Socket => "socket",
            FdKind::RegularFile => "regular file",
            FdKind::Pipe => "pipe",
            FdKind::Other => "unknown file type",
        }
    }
}

/// `fstat` the descriptor and classify it. The worker requires
/// [`FdKind::Socket`] before any accept begins.
pub fn inspect_fd(fd: RawFd) -> Result<FdKind, FdPassError> {
    let stat = fstat(fd).map_err(FdPassError::Inspect)?;
    let fmt = SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT;
    Ok(if fmt == SFlag::S_IFSOCK {
        FdKind::Socket
    } else if fmt == SFlag::S_IFREG {
        FdKind::RegularFile
    } else if fmt == SFlag::S_IFIFO {
        FdKind::Pipe
    } else {
        FdKind::Other
    })
}

/// Rebuild a TCP listener from a received descriptor.
#[allow(unsafe_code)]
pub fn rebuild_listener(fd: RawFd) -> io::Result<std::net::TcpListener> {
    // SAFETY: the fd arrived via SCM_RIGHTS and has no other owner in this
    // process.
    let listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
    listener.set_nonblocking(true)?;
    Ok(listener)
}

#[cfg(test)]
#[path = "fdpass_tests.rs"]
mod tests;
