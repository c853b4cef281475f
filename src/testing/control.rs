//! Line-based control channel.
//!
//! ```text
//! client                     ControlServer
//!   "cancel\n"      ───►      cancels its token   ───► "ok\n"
//!   "deactivate\n"  ───►      latches deactivated ───► "ok\n"
//!   "ping\n"        ───►                          ───► "ok\n"
//!   anything else   ───►                          ───► "unknown\n"
//! ```
//! One command per line; a connection may carry several.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::control::ControlAddress;
use crate::error::RuntimeError;

/// Command that stops serving.
pub const CMD_CANCEL: &str = "cancel";
/// Command that detaches from the router before a cancel.
pub const CMD_DEACTIVATE: &str = "deactivate";
/// Liveness check.
pub const CMD_PING: &str = "ping";

const REPLY_OK: &str = "ok";
const REPLY_UNKNOWN: &str = "unknown";

#[derive(Default)]
struct Shared {
    cancel: CancellationToken,
    deactivated: AtomicBool,
}

/// Accepts control commands on a [`ControlAddress`] until dropped.
pub struct ControlServer {
    shared: Arc<Shared>,
    accept: JoinHandle<()>,
    socket_path: Option<PathBuf>,
}

impl ControlServer {
    /// Binds `addr` and starts accepting connections on the current runtime.
    ///
    /// A stale socket file left at an IPC path is removed first.
    pub async fn bind(addr: &ControlAddress) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let (accept, socket_path) = match addr {
            ControlAddress::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port)).await?;
                let state = Arc::clone(&shared);
                let task = tokio::spawn(async move {
                    loop {
                        match listener.accept().await {
                            Ok((stream, _)) => {
                                tokio::spawn(serve_conn(stream, Arc::clone(&state)));
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "control accept failed");
                                return;
                            }
                        }
                    }
                });
                (task, None)
            }
            ControlAddress::Ipc { path } => {
                match std::fs::remove_file(path) {
                    Ok(()) => tracing::debug!(path = %path.display(), "removed stale control socket"),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err),
                }
                let listener = UnixListener::bind(path)?;
                let state = Arc::clone(&shared);
                let task = tokio::spawn(async move {
                    loop {
                        match listener.accept().await {
                            Ok((stream, _)) => {
                                tokio::spawn(serve_conn(stream, Arc::clone(&state)));
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "control accept failed");
                                return;
                            }
                        }
                    }
                });
                (task, Some(path.clone()))
            }
        };

        tracing::debug!(%addr, "control server listening");
        Ok(Self {
            shared,
            accept,
            socket_path,
        })
    }

    /// Completes once a cancel command has been received.
    pub async fn cancelled(&self) {
        self.shared.cancel.cancelled().await;
    }

    /// Whether a cancel command has been received.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Whether a deactivate command has been received.
    pub fn is_deactivated(&self) -> bool {
        self.shared.deactivated.load(Ordering::SeqCst)
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.accept.abort();
        if let Some(path) = &self.socket_path {
            let _ = std::fs::remove_file(path);
        }
    }
}

async fn serve_conn<S>(stream: S, state: Arc<Shared>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (rd, mut wr) = tokio::io::split(stream);
    let mut lines = BufReader::new(rd).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => {
                tracing::debug!(error = %err, "control connection closed");
                return;
            }
        };
        let reply = match line.trim() {
            CMD_CANCEL => {
                state.cancel.cancel();
                REPLY_OK
            }
            CMD_DEACTIVATE => {
                state.deactivated.store(true, Ordering::SeqCst);
                REPLY_OK
            }
            CMD_PING => REPLY_OK,
            _ => REPLY_UNKNOWN,
        };
        if wr.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
            return;
        }
        if wr.flush().await.is_err() {
            return;
        }
    }
}

/// Sends one command to `addr` and waits for an `ok` reply.
pub async fn send_command(
    addr: &ControlAddress,
    cmd: &str,
    timeout: Duration,
) -> Result<(), RuntimeError> {
    let exchange = async {
        match addr {
            ControlAddress::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                round_trip(stream, cmd).await
            }
            ControlAddress::Ipc { path } => {
                let stream = UnixStream::connect(path).await?;
                round_trip(stream, cmd).await
            }
        }
    };

    let reason = match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(reply)) if reply == REPLY_OK => return Ok(()),
        Ok(Ok(reply)) => format!("unexpected reply `{reply}` to `{cmd}`"),
        Ok(Err(err)) => err.to_string(),
        Err(_elapsed) => format!("no reply to `{cmd}` within {timeout:?}"),
    };
    Err(RuntimeError::Control {
        addr: addr.to_string(),
        reason,
    })
}

async fn round_trip<S>(stream: S, cmd: &str) -> io::Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (rd, mut wr) = tokio::io::split(stream);
    wr.write_all(format!("{cmd}\n").as_bytes()).await?;
    wr.flush().await?;

    let mut reply = String::new();
    BufReader::new(rd).read_line(&mut reply).await?;
    Ok(reply.trim().to_string())
}
