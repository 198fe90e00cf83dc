use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::FrameCodec;
use crate::command::Command;
use crate::error::{ElevsimError, Result};
use crate::frame::Frame;

/// Frames buffered in each direction before senders wait.
const CHANNEL_CAPACITY: usize = 100;

/// A duplex connection to a simulation server.
///
/// Owns the transport through two background tasks: a writer draining
/// outbound frames and a reader yielding validated inbound frames. Frames
/// that fail validation are logged and dropped; the connection stays up.
#[derive(Debug)]
pub struct Connection {
    // Channel to send frames to background writer task
    tx: mpsc::Sender<Frame>,
    // Channel to receive frames from background reader task
    rx: mpsc::Receiver<Frame>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut net_writer, mut net_reader) = Framed::new(stream, FrameCodec::new()).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(frame) = network_rx.recv().await {
                debug!(opcode = frame.opcode(), len = frame.payload_len(), "sending frame");
                if let Err(e) = net_writer.send(frame).await {
                    warn!(error = %e, "network write error");
                    break;
                }
            }
            // Every sender is gone: flush and shut down the write half.
            let _ = net_writer.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                let envelope = match result {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(error = %e, "network read error");
                        break;
                    }
                };
                match Frame::decode(&envelope) {
                    Ok(frame) => {
                        debug!(opcode = frame.opcode(), len = frame.payload_len(), "received frame");
                        if network_tx.send(frame).await.is_err() {
                            // user_rx was dropped, stop reading
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, kind = ?e.kind(), "dropping invalid frame");
                    }
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
            reader,
            writer,
        }
    }

    pub async fn connect(info: &ConnectionInfo) -> Result<Self> {
        let stream = TcpStream::connect(info.to_string()).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    pub async fn connect_timeout(info: &ConnectionInfo, timeout: Duration) -> Result<Self> {
        tokio::time::timeout(timeout, Self::connect(info))
            .await
            .map_err(|_| {
                ElevsimError::Connection(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {info} timed out after {timeout:?}"),
                ))
            })?
    }

    /// Encode and queue a command. Fire-and-forget: no reply is awaited.
    pub async fn send(&self, command: &Command) -> Result<()> {
        let frame = command.to_frame()?;
        self.tx.send(frame).await?;
        Ok(())
    }

    /// Queue an already-built frame.
    pub async fn send_frame(&self, frame: Frame) -> Result<()> {
        self.tx.send(frame).await?;
        Ok(())
    }

    /// Next validated inbound frame; `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// A cloneable handle for issuing commands from elsewhere.
    pub fn sender(&self) -> ConnectionSender {
        ConnectionSender {
            tx: self.tx.clone(),
        }
    }

    /// Flush pending writes and tear down the transport.
    ///
    /// Outstanding [`ConnectionSender`]s keep the write half open until
    /// they are dropped.
    pub async fn close(self) {
        let Self {
            tx,
            rx,
            reader,
            writer,
        } = self;
        drop(tx);
        drop(rx);
        reader.abort();
        let _ = writer.await;
    }
}

/// Cloneable command handle detached from the receive side.
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    tx: mpsc::Sender<Frame>,
}

impl ConnectionSender {
    pub async fn send(&self, command: &Command) -> Result<()> {
        let frame = command.to_frame()?;
        self.tx.send(frame).await?;
        Ok(())
    }
}

// ── ConnectionInfo ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ConnectionInfo {
    type Err = ElevsimError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ElevsimError::Other(format!("missing port in address {s:?}")))?;
        let port = port
            .parse()
            .map_err(|_| ElevsimError::Other(format!("invalid port in address {s:?}")))?;
        if host.is_empty() {
            return Err(ElevsimError::Other(format!("missing host in address {s:?}")));
        }
        Ok(Self::new(host, port))
    }
}
