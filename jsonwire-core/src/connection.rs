//! Connection I/O engine.
//!
//! A [`Connection`] owns one byte stream and drives it from a single
//! background task. Callers enqueue outbound messages with [`Connection::send`]
//! and take decoded inbound messages with [`Connection::receive`]; only the
//! task ever touches the stream.
//!
//! Shutdown runs `Running -> Stopping -> Closed`: once the running flag is
//! cleared (by [`Connection::close`] or by a dropped peer) the task flushes
//! the outbound queue, writes the terminal `{"operation":0}` frame if the
//! stream is still usable, and closes the stream exactly once.

use jsonwire_protocol::{read_message, write_message, Message, ProtocolError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

/// Default idle wait between checks of the running flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on how long the task sleeps while idle.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The running flag is set.
    Running,
    /// The flag is cleared but the task has not finished draining.
    Stopping,
    /// The task has exited and the stream is closed.
    Closed,
}

/// Byte streams the engine can drive.
trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

type BoxedTransport = Box<dyn Transport>;

/// State shared between the handle and the engine task.
struct Shared {
    running: AtomicBool,
    finished: AtomicBool,
    inbound: Mutex<VecDeque<Message>>,
    inbound_ready: Notify,
    close_requested: Notify,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn push_inbound(&self, message: Message) {
        self.inbound.lock().push_back(message);
        self.inbound_ready.notify_waiters();
    }
}

/// Not-yet-started half of the engine.
struct Pending {
    stream: BoxedTransport,
    outbound: mpsc::UnboundedReceiver<Message>,
}

/// A queued, framed, bidirectional connection over one stream.
pub struct Connection {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Message>,
    pending: Mutex<Option<Pending>>,
    task: Mutex<Option<JoinHandle<()>>>,
    closing: AtomicBool,
    peer_addr: Option<SocketAddr>,
    label: String,
    config: EngineConfig,
}

impl Connection {
    /// Wraps an already-connected TCP stream. The engine is not started.
    pub fn new(stream: TcpStream) -> Self {
        Self::with_config(stream, EngineConfig::default())
    }

    /// Wraps a TCP stream with custom engine settings.
    pub fn with_config(stream: TcpStream, config: EngineConfig) -> Self {
        stream.set_nodelay(true).ok();
        let peer_addr = stream.peer_addr().ok();
        Self::build(Box::new(stream), peer_addr, config)
    }

    /// Wraps any async byte stream (pipes, in-memory duplex streams, ...).
    pub fn from_stream<S>(stream: S, config: EngineConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        Self::build(Box::new(stream), None, config)
    }

    fn build(stream: BoxedTransport, peer_addr: Option<SocketAddr>, config: EngineConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let label = peer_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "local".to_string());

        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(true),
                finished: AtomicBool::new(false),
                inbound: Mutex::new(VecDeque::new()),
                inbound_ready: Notify::new(),
                close_requested: Notify::new(),
            }),
            outbound: tx,
            pending: Mutex::new(Some(Pending {
                stream,
                outbound: rx,
            })),
            task: Mutex::new(None),
            closing: AtomicBool::new(false),
            peer_addr,
            label,
            config,
        }
    }

    /// Spawns the engine task. Only the first call has an effect.
    pub fn start(&self) {
        if self.closing.load(Ordering::Acquire) {
            tracing::warn!("[{}] start() called on a closing connection", self.label);
            return;
        }
        if !self.spawn_task() {
            tracing::warn!("[{}] Connection already started", self.label);
        }
    }

    fn spawn_task(&self) -> bool {
        let Some(pending) = self.pending.lock().take() else {
            return false;
        };

        let engine = Engine {
            shared: self.shared.clone(),
            outbound: pending.outbound,
            poll_interval: self.config.poll_interval,
            label: self.label.clone(),
        };
        let handle = tokio::spawn(engine.run(pending.stream));
        *self.task.lock() = Some(handle);
        true
    }

    /// Queues a message for transmission. Never blocks.
    ///
    /// Has no effect once the engine task has exited.
    pub fn send(&self, message: Message) {
        if let Err(mpsc::error::SendError(message)) = self.outbound.send(message) {
            tracing::debug!(
                "[{}] Connection stopped, dropping outbound message: {}",
                self.label,
                message
            );
        }
    }

    /// Waits for the next inbound message, in arrival order.
    ///
    /// When the engine stops it queues a terminal `{"operation":0}` message,
    /// and a stopped engine with an empty queue keeps answering with one, so
    /// a waiting caller is always released.
    pub async fn receive(&self) -> Message {
        loop {
            let notified = self.shared.inbound_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.shared.inbound.lock().pop_front();
            if let Some(message) = next {
                return message;
            }
            if self.shared.finished.load(Ordering::Acquire) {
                return Message::shutdown();
            }

            notified.await;
        }
    }

    /// Returns whether an inbound message is ready.
    pub fn has_received(&self) -> bool {
        !self.shared.inbound.lock().is_empty()
    }

    /// Returns the running flag.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ConnectionState {
        if self.shared.finished.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else if self.shared.is_running() {
            ConnectionState::Running
        } else {
            ConnectionState::Stopping
        }
    }

    /// Remote address, for TCP connections.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Closes the connection gracefully and waits for the engine to exit.
    ///
    /// Queued messages are flushed and the terminal frame is written before
    /// the stream is closed. Calls after the first have no further effect;
    /// they only wait for the engine to finish.
    pub async fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            self.wait_closed().await;
            return;
        }

        tracing::info!("[{}] Closing connection...", self.label);
        self.shared.running.store(false, Ordering::Release);
        self.shared.close_requested.notify_one();

        // A never-started engine still owes the peer its queued messages
        // and the terminal frame.
        self.spawn_task();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("[{}] Connection task failed: {}", self.label, e);
            }
        }
    }

    async fn wait_closed(&self) {
        loop {
            let notified = self.shared.inbound_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.finished.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Why the engine woke up.
enum Wake {
    Outbound(Option<Message>),
    Readable(io::Result<bool>),
    CloseRequested,
    Idle,
}

/// The background half: owns the stream and the outbound receiver.
struct Engine {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedReceiver<Message>,
    poll_interval: Duration,
    label: String,
}

impl Engine {
    async fn run(mut self, stream: BoxedTransport) {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);
        let mut connected = true;

        tracing::debug!("[{}] Connection engine started", self.label);

        while self.shared.is_running() && connected {
            let wake = tokio::select! {
                biased;
                _ = self.shared.close_requested.notified() => Wake::CloseRequested,
                filled = reader.fill_buf() => Wake::Readable(filled.map(|buf| !buf.is_empty())),
                message = self.outbound.recv() => Wake::Outbound(message),
                _ = tokio::time::sleep(self.poll_interval) => Wake::Idle,
            };

            let outgoing = match wake {
                Wake::Outbound(Some(message)) => Some(message),
                Wake::Outbound(None) => {
                    tracing::debug!("[{}] Connection handle dropped", self.label);
                    self.shared.running.store(false, Ordering::Release);
                    continue;
                }
                Wake::Readable(Ok(false)) => {
                    tracing::debug!("[{}] Connection closed by peer", self.label);
                    connected = false;
                    continue;
                }
                Wake::Readable(Err(e)) => {
                    tracing::debug!("[{}] Read error: {}", self.label, e);
                    connected = false;
                    continue;
                }
                Wake::CloseRequested => continue,
                Wake::Readable(Ok(true)) | Wake::Idle => self.outbound.try_recv().ok(),
            };

            if let Some(message) = outgoing {
                match write_message(&mut writer, &message).await {
                    Ok(()) => tracing::debug!("[{}] Sent: {}", self.label, message),
                    Err(e) => connected = self.recover(&mut writer, e).await,
                }
            }

            if connected && !reader.buffer().is_empty() {
                let read = tokio::select! {
                    result = read_message(&mut reader) => Some(result),
                    _ = self.shared.close_requested.notified() => None,
                };
                match read {
                    Some(Ok(message)) => {
                        tracing::debug!("[{}] Received: {}", self.label, message);
                        self.shared.push_inbound(message);
                    }
                    Some(Err(e)) => connected = self.recover(&mut writer, e).await,
                    // Close requested while a frame was only partly received
                    None => {}
                }
            }
        }

        self.outbound.close();
        if connected {
            connected = self.drain(&mut writer).await;
        }
        if !connected {
            self.report_undelivered();
        }

        self.shared.running.store(false, Ordering::Release);
        if let Err(e) = writer.shutdown().await {
            tracing::debug!("[{}] Shutdown error: {}", self.label, e);
        }
        drop(reader.into_inner().unsplit(writer));

        self.shared.push_inbound(Message::shutdown());
        self.shared.finished.store(true, Ordering::Release);
        self.shared.inbound_ready.notify_waiters();
        tracing::info!("[{}] Socket closed", self.label);
    }

    /// Handles a failed send/receive. Returns whether the stream is usable.
    async fn recover(
        &self,
        writer: &mut WriteHalf<BoxedTransport>,
        error: ProtocolError,
    ) -> bool {
        if error.is_fatal() {
            tracing::debug!("[{}] Connection lost: {}", self.label, error);
            return false;
        }

        tracing::warn!(
            "[{}] Error sending/receiving data from socket: {}",
            self.label,
            error
        );
        let reply = Message::error(error.error_code());
        match write_message(writer, &reply).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("[{}] Failed to send error reply: {}", self.label, e);
                !e.is_fatal()
            }
        }
    }

    /// Flushes queued messages, then writes the terminal frame.
    /// Returns whether the stream stayed usable.
    async fn drain(&mut self, writer: &mut WriteHalf<BoxedTransport>) -> bool {
        while let Ok(message) = self.outbound.try_recv() {
            match write_message(writer, &message).await {
                Ok(()) => tracing::debug!("[{}] Sent: {}", self.label, message),
                Err(e) if e.is_fatal() => {
                    tracing::debug!("[{}] Failed to flush {}: {}", self.label, message, e);
                    return false;
                }
                Err(e) => tracing::warn!("[{}] Dropping unsendable message: {}", self.label, e),
            }
        }

        match write_message(writer, &Message::shutdown()).await {
            Ok(()) => {
                tracing::debug!("[{}] Sent terminal frame", self.label);
                true
            }
            Err(e) => {
                tracing::debug!("[{}] Failed to send terminal frame: {}", self.label, e);
                false
            }
        }
    }

    fn report_undelivered(&mut self) {
        let mut undelivered = Vec::new();
        while let Ok(message) = self.outbound.try_recv() {
            undelivered.push(message);
        }
        if undelivered.is_empty() {
            return;
        }

        tracing::warn!(
            "[{}] Socket is not connected, {} queued message(s) were not sent",
            self.label,
            undelivered.len()
        );
        for message in undelivered {
            tracing::warn!("[{}] Undelivered: {}", self.label, message);
        }
    }
}
