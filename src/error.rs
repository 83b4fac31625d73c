//! Error types for fileferry.

use thiserror::Error;

/// Error kinds for the transfer protocol and its sessions.
///
/// `Setup` failures are fatal to the process; everything else is scoped to
/// the session that hit it and never takes down other connections.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket create/bind/listen/connect or address failure at startup.
    #[error("setup error: {0}")]
    Setup(String),

    /// Transport failure: short read/write, peer closed, broken pipe.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed data from the peer (bad status, negative size, bad name).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Requested path escapes the permitted root.
    #[error("path rejected: {0}")]
    PathRejected(String),

    /// Local file open/read/write failure.
    #[error("local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),
}

impl Error {
    /// Wrap a transport-level I/O error, folding the common peer-closed
    /// cases into a readable message.
    pub fn connection(context: &str, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                Error::Connection(format!("{context}: peer closed the connection"))
            }
            _ => Error::Connection(format!("{context}: {err}")),
        }
    }

    /// True when the peer simply went away, as opposed to a malfunction.
    pub fn is_peer_close(&self) -> bool {
        matches!(self, Error::Connection(msg) if msg.contains("peer closed"))
    }
}
