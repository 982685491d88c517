//! TCP link to the matrix switch.
//!
//! One spawned task owns the socket and every piece of shared state around
//! it: the receive buffer, the outgoing FIFO queue, and the pending-request
//! list. Callers talk to the task through a [`MatrixLink`] handle; all event
//! handling inside the task is strictly sequential, so none of that state
//! needs a lock.
//!
//! # Command discipline
//!
//! The switch accepts one command at a time and cannot absorb back-to-back
//! writes, so the task sends queued frames in FIFO order with a mandatory
//! pacing gap between consecutive writes. The gap is a timer in the task's
//! select loop, never a blocking sleep.
//!
//! # Correlation
//!
//! Replies carry no request ids. A tracked submission registers its token in
//! a pending list at enqueue time, and each fully decoded status reply
//! resolves the oldest pending token. When a tracked command is enqueued
//! while earlier ones are still outstanding, the reply that resolves it may
//! belong to a different logical request; the task logs this known ambiguity
//! instead of guessing.
//!
//! # Disconnect
//!
//! On EOF, socket error, or receive-buffer overflow, every queued and
//! pending resolver fails with [`MatrixError::LinkDown`] in the same
//! scheduling tick, the connection-state watch flips to `Disconnected`, and
//! the task exits. Reconnecting is the caller's decision.

use crate::ingest::StatusIngestor;
use crate::protocol::{self, Decoded, StatusReply};
use matrix_core::error::{MatrixError, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};

/// Default TCP port of the switch's control interface.
pub const DEFAULT_PORT: u16 = 5000;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default pacing gap between consecutive writes in milliseconds.
///
/// The switch firmware drops commands written back-to-back; roughly 200ms of
/// settling time between writes is required.
pub const DEFAULT_PACING_MS: u64 = 200;

/// Default receive-buffer cap in bytes.
pub const DEFAULT_MAX_BUFFER: usize = 16 * 1024;

/// Tunable link parameters.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Mandatory gap between consecutive writes.
    pub pacing: Duration,
    /// Receive-buffer cap; exceeding it fails the connection.
    pub max_buffer: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            pacing: Duration::from_millis(DEFAULT_PACING_MS),
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

/// Connection lifecycle as published through the state watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; the link task has exited.
    Disconnected,
    /// TCP dial in progress.
    Connecting,
    /// Socket established; commands may be issued.
    Connected,
}

/// Resolution of a tracked submission.
#[derive(Debug)]
pub struct Confirmation {
    /// The caller-supplied tracking token, passed back verbatim.
    pub token: Option<String>,
    /// The status reply that resolved the token.
    pub reply: StatusReply,
}

/// A tracked submission awaiting its confirming status reply.
struct Tracked {
    token: Option<String>,
    queued_at: Instant,
    done: oneshot::Sender<Result<Confirmation>>,
}

struct Submission {
    frame: String,
    tracked: Option<Tracked>,
}

/// Handle to the link task.
///
/// Cheap to clone; all clones feed the same socket and FIFO queue.
#[derive(Clone)]
pub struct MatrixLink {
    tx: mpsc::UnboundedSender<Submission>,
    state: watch::Receiver<ConnectionState>,
}

impl MatrixLink {
    /// Dial the switch and spawn the link task.
    ///
    /// Callers are expected to issue a status query right after connecting so
    /// the current switch state is known before any command is sent.
    pub async fn connect(
        address: &str,
        port: u16,
        options: LinkOptions,
        ingestor: std::sync::Arc<StatusIngestor>,
    ) -> Result<Self> {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let stream = timeout(options.connect_timeout, TcpStream::connect((address, port)))
            .await
            .map_err(|_| {
                MatrixError::Connection(format!("connection timeout to {}:{}", address, port))
            })?
            .map_err(|e| {
                MatrixError::Connection(format!("failed to connect to {}:{}: {}", address, port, e))
            })?;

        // Disable Nagle's algorithm; frames are tiny and latency-sensitive
        stream.set_nodelay(true)?;

        tracing::info!(address, port, "connected to matrix");
        Ok(Self::spawn(stream, options, ingestor, state_tx, state_rx))
    }

    /// Run the link task over an already-established stream.
    ///
    /// Used by tests to drive the link over an in-memory duplex pipe.
    pub fn attach<S>(
        stream: S,
        options: LinkOptions,
        ingestor: std::sync::Arc<StatusIngestor>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        Self::spawn(stream, options, ingestor, state_tx, state_rx)
    }

    fn spawn<S>(
        stream: S,
        options: LinkOptions,
        ingestor: std::sync::Arc<StatusIngestor>,
        state_tx: watch::Sender<ConnectionState>,
        state_rx: watch::Receiver<ConnectionState>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let _ = state_tx.send(ConnectionState::Connected);
        let (tx, rx) = mpsc::unbounded_channel();
        let (reader, writer) = tokio::io::split(stream);

        let actor = LinkActor {
            reader,
            writer,
            rx,
            state: state_tx,
            ingestor,
            options,
            buffer: String::new(),
            send_queue: VecDeque::new(),
            pending: VecDeque::new(),
            gate: None,
        };
        tokio::spawn(actor.run());

        Self {
            tx,
            state: state_rx,
        }
    }

    /// Queue a fire-and-forget frame.
    pub fn submit(&self, frame: impl Into<String>) -> Result<()> {
        self.tx
            .send(Submission {
                frame: frame.into(),
                tracked: None,
            })
            .map_err(|_| MatrixError::LinkDown)
    }

    /// Queue a frame whose effect is confirmed by a later status reply.
    ///
    /// Returns a receiver that resolves with a [`Confirmation`] once a status
    /// reply arrives, or with [`MatrixError::LinkDown`] if the connection
    /// drops first. Awaiting with a timeout is the caller's responsibility.
    pub fn submit_tracked(
        &self,
        frame: impl Into<String>,
        token: Option<String>,
    ) -> Result<oneshot::Receiver<Result<Confirmation>>> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Submission {
                frame: frame.into(),
                tracked: Some(Tracked {
                    token,
                    queued_at: Instant::now(),
                    done,
                }),
            })
            .map_err(|_| MatrixError::LinkDown)?;
        Ok(rx)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to connection-state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

/// The socket-owning task.
struct LinkActor<R, W> {
    reader: R,
    writer: W,
    rx: mpsc::UnboundedReceiver<Submission>,
    state: watch::Sender<ConnectionState>,
    ingestor: std::sync::Arc<StatusIngestor>,
    options: LinkOptions,
    buffer: String,
    send_queue: VecDeque<String>,
    pending: VecDeque<Tracked>,
    gate: Option<Instant>,
}

impl<R, W> LinkActor<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn run(mut self) {
        match self.drive().await {
            Ok(()) => tracing::info!("matrix link closed"),
            Err(err) => tracing::warn!(error = %err, "matrix link lost"),
        }
        self.shutdown();
    }

    async fn drive(&mut self) -> Result<()> {
        let mut chunk = [0u8; 1024];
        loop {
            let deadline = self.gate.unwrap_or_else(Instant::now);
            let want_send = !self.send_queue.is_empty();

            // Biased: drain submissions first, then inbound bytes, then the
            // send gate, so event handling is deterministic.
            tokio::select! {
                biased;

                submission = self.rx.recv() => {
                    match submission {
                        Some(submission) => self.accept(submission),
                        // All handles dropped; nobody is left to talk to.
                        None => return Ok(()),
                    }
                }
                read = self.reader.read(&mut chunk) => {
                    let n = read?;
                    if n == 0 {
                        return Err(MatrixError::LinkDown);
                    }
                    self.on_chunk(&chunk[..n]).await?;
                }
                _ = sleep_until(deadline), if want_send => {
                    self.write_next().await?;
                }
            }
        }
    }

    fn accept(&mut self, submission: Submission) {
        if let Some(tracked) = submission.tracked {
            if !self.pending.is_empty() {
                tracing::warn!(
                    outstanding = self.pending.len(),
                    "tracked command enqueued while replies are outstanding; \
                     confirmations correlate by arrival order only"
                );
            }
            self.pending.push_back(tracked);
        }
        self.send_queue.push_back(submission.frame);
    }

    async fn write_next(&mut self) -> Result<()> {
        let Some(frame) = self.send_queue.pop_front() else {
            return Ok(());
        };
        tracing::debug!(frame = %frame, ">> matrix");
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        self.gate = Some(Instant::now() + self.options.pacing);
        Ok(())
    }

    async fn on_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let text = match std::str::from_utf8(chunk) {
            Ok(text) => text,
            Err(_) => {
                let lossy = String::from_utf8_lossy(chunk).into_owned();
                tracing::warn!(error = %MatrixError::MalformedFrame(lossy), "dropping chunk");
                return Ok(());
            }
        };

        // A chunk that begins a new frame replaces any stale partial buffer.
        if text.starts_with(protocol::STATUS_PREFIX) {
            self.buffer.clear();
        }
        self.buffer.push_str(text);

        if self.buffer.len() > self.options.max_buffer {
            return Err(MatrixError::ReceiveOverflow {
                max: self.options.max_buffer,
            });
        }

        if let Decoded::Complete(reply) = protocol::try_decode_status(&self.buffer) {
            let frame = std::mem::take(&mut self.buffer);
            tracing::debug!(frame = %frame, "<< matrix");

            let delimiters = protocol::STATUS_PREFIX.len() + protocol::STATUS_SUFFIX.len();
            if reply.records.is_empty() && frame.len() > delimiters {
                tracing::warn!(error = %MatrixError::MalformedFrame(frame), "dropping reply");
                return Ok(());
            }

            // A store failure loses one patch, not the connection.
            if let Err(err) = self.ingestor.publish(&reply).await {
                tracing::warn!(error = %err, "state store ingest failed");
            }
            self.resolve_oldest(reply);
        }
        Ok(())
    }

    fn resolve_oldest(&mut self, reply: StatusReply) {
        let Some(Tracked {
            token,
            queued_at,
            done,
        }) = self.pending.pop_front()
        else {
            return;
        };
        tracing::debug!(
            token = token.as_deref().unwrap_or("-"),
            elapsed_ms = queued_at.elapsed().as_millis() as u64,
            "resolving oldest pending command"
        );
        if done.send(Ok(Confirmation { token, reply })).is_err() {
            tracing::debug!("confirmation receiver dropped before resolution");
        }
    }

    /// Fail everything still queued or pending, then publish `Disconnected`.
    fn shutdown(&mut self) {
        self.rx.close();
        while let Ok(submission) = self.rx.try_recv() {
            if let Some(tracked) = submission.tracked {
                self.pending.push_back(tracked);
            }
        }
        for tracked in self.pending.drain(..) {
            let _ = tracked.done.send(Err(MatrixError::LinkDown));
        }
        self.send_queue.clear();
        let _ = self.state.send(ConnectionState::Disconnected);
    }
}
