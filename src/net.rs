//! Async TCP transport for the fileferry protocol.
//!
//! The two primitives at the top ([`send_exact`], [`recv_exact`]) are the
//! only place partial stream I/O is handled; everything else composes from
//! them. The `server` and `client` submodules hold the per-connection
//! session loops.

use crate::error::Error;
use crate::protocol::CHUNK_SIZE;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write the whole buffer, looping on partial writes. Fails with
/// [`Error::Connection`] if the peer closes or any write errors.
pub async fn send_exact<W>(writer: &mut W, buf: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(buf)
        .await
        .map_err(|e| Error::connection("send", e))
}

/// Read until the buffer is full, accumulating across short reads. Either
/// the buffer is filled exactly or this fails with [`Error::Connection`];
/// there is no partial-result success.
pub async fn recv_exact<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
{
    reader
        .read_exact(buf)
        .await
        .map(|_| ())
        .map_err(|e| Error::connection("recv", e))
}

/// Copy exactly `len` bytes from `src` to `dst` in chunks of at most
/// [`CHUNK_SIZE`], forwarding each chunk as soon as it is read. Read
/// failures surface as [`Error::LocalIo`], write failures as
/// [`Error::Connection`].
async fn pump_chunks<R, W>(src: &mut R, len: u64, dst: &mut W) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let take = remaining.min(CHUNK_SIZE as u64) as usize;
        src.read_exact(&mut buf[..take]).await?;
        send_exact(dst, &buf[..take]).await?;
        remaining -= take as u64;
    }
    Ok(())
}

/// Read and throw away exactly `len` bytes, in chunks of at most
/// [`CHUNK_SIZE`]. Used to resynchronize a session when an announced
/// payload turns out to have nowhere to go locally.
async fn discard_exact<R>(reader: &mut R, len: u64) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let take = remaining.min(CHUNK_SIZE as u64) as usize;
        recv_exact(reader, &mut buf[..take]).await?;
        remaining -= take as u64;
    }
    Ok(())
}

pub mod server {
    use super::*;
    use crate::paths::resolve_under_root;
    use crate::protocol::{
        decode_request, encode_size, encode_status, REQUEST_LEN, STATUS_AVAILABLE, STATUS_NOT_FOUND,
    };
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use tokio::fs::File;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinSet;
    use tokio_util::sync::CancellationToken;
    use tracing::{info, warn};

    /// Listening daemon: accepts connections and spawns one handler task
    /// per connection. Handlers share nothing but the canonical root and a
    /// child cancellation token.
    pub struct Server {
        listener: TcpListener,
        root: PathBuf,
    }

    impl Server {
        /// Bind the listener and canonicalize the serving root. Failures
        /// here are fatal setup errors.
        pub async fn bind(bind: &str, root: &Path) -> Result<Server, Error> {
            let listener = TcpListener::bind(bind)
                .await
                .map_err(|e| Error::Setup(format!("bind {bind}: {e}")))?;
            let root = root
                .canonicalize()
                .map_err(|e| Error::Setup(format!("root {}: {e}", root.display())))?;
            Ok(Server { listener, root })
        }

        pub fn local_addr(&self) -> Result<SocketAddr, Error> {
            self.listener
                .local_addr()
                .map_err(|e| Error::Setup(format!("local addr: {e}")))
        }

        /// Accept loop. Runs until `shutdown` is cancelled, then stops
        /// admitting connections and waits for in-flight handlers to finish
        /// their current request cycle.
        pub async fn run(self, shutdown: CancellationToken) -> Result<(), Error> {
            info!(root = %self.root.display(), "serving");
            let mut handlers = JoinSet::new();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    accepted = self.listener.accept() => {
                        let (stream, peer) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                warn!(error = %e, "accept failed");
                                continue;
                            }
                        };
                        let _ = stream.set_nodelay(true);
                        info!(%peer, "connection accepted");
                        let root = self.root.clone();
                        let session_stop = shutdown.child_token();
                        handlers.spawn(async move {
                            match handle_connection(stream, &root, session_stop).await {
                                Ok(()) => info!(%peer, "connection closed"),
                                Err(e) if e.is_peer_close() => info!(%peer, "peer disconnected"),
                                Err(e) => warn!(%peer, error = %e, "session ended"),
                            }
                        });
                    }
                }
            }
            info!(in_flight = handlers.len(), "shutting down, draining handlers");
            while handlers.join_next().await.is_some() {}
            Ok(())
        }
    }

    /// Per-connection request loop: read a fixed-width request, answer 200
    /// with size and chunked payload, or 404 alone, then await the next
    /// request. Exits on transport failure or cancellation.
    async fn handle_connection(
        mut stream: TcpStream,
        root: &Path,
        shutdown: CancellationToken,
    ) -> Result<(), Error> {
        let mut frame = [0u8; REQUEST_LEN];
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                received = recv_exact(&mut stream, &mut frame) => received?,
            }
            let name = match decode_request(&frame) {
                Ok(name) => name,
                Err(e) => {
                    // Undecodable names get the same 404 as missing files.
                    warn!(error = %e, "bad request frame");
                    send_exact(&mut stream, &encode_status(STATUS_NOT_FOUND)).await?;
                    continue;
                }
            };
            match open_requested(root, name).await {
                Ok((mut file, len)) => {
                    send_exact(&mut stream, &encode_status(STATUS_AVAILABLE)).await?;
                    send_exact(&mut stream, &encode_size(len as i64)).await?;
                    pump_chunks(&mut file, len, &mut stream).await?;
                    info!(file = name, bytes = len, "served");
                }
                Err(e) => {
                    // Missing, unreadable, and traversal-rejected paths are
                    // indistinguishable on the wire.
                    info!(file = name, reason = %e, "request refused");
                    send_exact(&mut stream, &encode_status(STATUS_NOT_FOUND)).await?;
                }
            }
        }
    }

    /// Validate the requested name against the root and open it. Any error
    /// maps to a 404 at the call site.
    async fn open_requested(root: &Path, name: &str) -> Result<(File, u64), Error> {
        let path = resolve_under_root(root, Path::new(name))?;
        let file = File::open(&path).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(Error::PathRejected(format!("{name} is not a regular file")));
        }
        Ok((file, meta.len()))
    }
}

pub mod client {
    use super::*;
    use crate::paths::{resolve_for_write, safe_relative};
    use crate::protocol::{
        decode_size, decode_status, encode_request, STATUS_NOT_FOUND,
    };
    use std::path::{Path, PathBuf};
    use tokio::net::TcpStream;

    /// Outcome of one request cycle.
    #[derive(Debug)]
    pub enum Fetched {
        /// Server sent the payload; it was written to `path` in full.
        Written { path: PathBuf, bytes: u64 },
        /// Server answered 404. Nothing was created or modified locally.
        NotFound,
    }

    /// Connect to the daemon. The `(host, port)` pair goes through
    /// `ToSocketAddrs`, so hostnames and bare IPv6 literals both work.
    pub async fn connect(host: &str, port: u16) -> Result<TcpStream, Error> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Setup(format!("connect {host}:{port}: {e}")))?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    /// Request `name` and write the payload under `dest_dir`.
    ///
    /// The name is screened before anything is sent, so a rejected name
    /// leaves the connection untouched. After a 200 the write path is fully
    /// resolved under `dest_dir` (the same guard the server applies to
    /// reads) before anything is created; if that resolution refuses — a
    /// symlinked subdirectory inside the destination, say — the announced
    /// payload is drained off the socket first, so the connection stays in
    /// sync and a [`Error::PathRejected`] always leaves it reusable.
    pub async fn fetch(
        stream: &mut TcpStream,
        name: &str,
        dest_dir: &Path,
    ) -> Result<Fetched, Error> {
        let relative = safe_relative(Path::new(name))?;

        let frame = encode_request(name)?;
        send_exact(stream, &frame).await?;

        let mut status_buf = [0u8; 4];
        recv_exact(stream, &mut status_buf).await?;
        if decode_status(status_buf)? == STATUS_NOT_FOUND {
            return Ok(Fetched::NotFound);
        }

        let mut size_buf = [0u8; 8];
        recv_exact(stream, &mut size_buf).await?;
        let size = decode_size(size_buf)?;

        let local = match resolve_for_write(dest_dir, &relative) {
            Ok(path) => path,
            Err(e) => {
                // The server is already committed to sending `size` bytes.
                discard_exact(stream, size).await?;
                return Err(e);
            }
        };
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&local).await?;
        let mut buf = [0u8; CHUNK_SIZE];
        let mut remaining = size;
        while remaining > 0 {
            let take = remaining.min(CHUNK_SIZE as u64) as usize;
            recv_exact(stream, &mut buf[..take]).await?;
            file.write_all(&buf[..take]).await?;
            remaining -= take as u64;
        }
        file.flush().await?;
        Ok(Fetched::Written { path: local, bytes: size })
    }
}
