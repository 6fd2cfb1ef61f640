// Console client and dispatch loop.
//
// One spawned task owns the TCP stream, the line reassembler, and the
// request queue receiver. The console protocol has no request
// identifiers, so the loop keeps exactly one request in flight and
// treats the command-prompt marker as the only end-of-response signal.
// Public handles communicate with the task over channels only.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use il2ds_core::{ChatMessage, ConnectionEvent};

use super::events::{self, ConsoleEvent};
use super::lines::{LineEvent, LineReassembler};
use super::LINE_DELIMITER;
use crate::error::Error;

const REQUEST_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 256;
const READ_BUFFER_SIZE: usize = 4096;

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ── Settings ─────────────────────────────────────────────────────────

/// Connection settings for the console client.
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    /// Address of the server's console TCP listener.
    pub address: SocketAddr,
    /// Default per-request deadline. Individual calls can override it via
    /// [`ConsoleClient::execute_with_timeout`].
    pub request_timeout: Duration,
}

impl ConsoleSettings {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ── Chat addressing ──────────────────────────────────────────────────

/// Recipient of a console chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    All,
    Army(u8),
    User(String),
}

impl ChatTarget {
    pub(crate) fn wire(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Army(code) => format!("ARMY {code}"),
            Self::User(callsign) => format!("USER {callsign}"),
        }
    }
}

// ── Request envelope ─────────────────────────────────────────────────

pub(crate) struct RequestEnvelope {
    pub(crate) body: String,
    pub(crate) timeout: Duration,
    /// Log every collected response line at debug level.
    pub(crate) trace: bool,
    pub(crate) result_tx: oneshot::Sender<Result<Vec<String>, Error>>,
}

// ── Client handle ────────────────────────────────────────────────────

/// Handle to a console connection.
///
/// Cheaply cloneable; all clones feed the same strictly ordered request
/// queue. Typed request methods live in `requests.rs`.
#[derive(Clone)]
pub struct ConsoleClient {
    request_tx: mpsc::Sender<RequestEnvelope>,
    chat_tx: broadcast::Sender<Arc<ChatMessage>>,
    connection_tx: broadcast::Sender<Arc<ConnectionEvent>>,
    raw_tx: broadcast::Sender<Arc<String>>,
    cancel: CancellationToken,
    closed_rx: watch::Receiver<bool>,
    request_timeout: Duration,
}

impl ConsoleClient {
    /// Connect to the console and spawn the dispatch loop.
    pub async fn connect(settings: ConsoleSettings) -> Result<Self, Error> {
        let stream = TcpStream::connect(settings.address).await?;
        info!(address = %settings.address, "console connected");

        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (chat_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (connection_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (raw_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (closed_tx, closed_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let worker = Worker {
            stream,
            reassembler: LineReassembler::new(),
            request_rx,
            chat_tx: chat_tx.clone(),
            connection_tx: connection_tx.clone(),
            raw_tx: raw_tx.clone(),
            cancel: cancel.clone(),
            closed_tx,
        };
        tokio::spawn(worker.run());

        Ok(Self {
            request_tx,
            chat_tx,
            connection_tx,
            raw_tx,
            cancel,
            closed_rx,
            request_timeout: settings.request_timeout,
        })
    }

    // ── Raw request surface ──────────────────────────────────────────

    /// Send a raw command and return the response lines.
    pub async fn execute(&self, command: &str) -> Result<Vec<String>, Error> {
        self.request(command.to_string(), self.request_timeout, true)
            .await
    }

    /// [`execute`](Self::execute) with an explicit deadline.
    pub async fn execute_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, Error> {
        self.request(command.to_string(), timeout, true).await
    }

    /// Enqueue a request and await its result.
    ///
    /// Requests are served strictly in enqueue order, one at a time.
    pub(crate) async fn request(
        &self,
        body: String,
        timeout: Duration,
        trace: bool,
    ) -> Result<Vec<String>, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::ConnectionClosed);
        }
        let (result_tx, result_rx) = oneshot::channel();
        self.request_tx
            .send(RequestEnvelope {
                body,
                timeout,
                trace,
                result_tx,
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        result_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    pub(crate) fn default_timeout(&self) -> Duration {
        self.request_timeout
    }

    // ── Event subscriptions ──────────────────────────────────────────

    /// Subscribe to chat messages relayed through the console.
    pub fn chat_events(&self) -> broadcast::Receiver<Arc<ChatMessage>> {
        self.chat_tx.subscribe()
    }

    /// Subscribe to human-connection lifecycle events.
    pub fn connection_events(&self) -> broadcast::Receiver<Arc<ConnectionEvent>> {
        self.connection_tx.subscribe()
    }

    /// Subscribe to every inbound logical line, before any parsing.
    pub fn raw_lines(&self) -> broadcast::Receiver<Arc<String>> {
        self.raw_tx.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Close the connection and wait for the dispatch loop to finish.
    ///
    /// Idempotent. Requests still queued when the loop exits fail with
    /// [`Error::ConnectionClosed`]; requests enqueued afterwards fail
    /// immediately.
    pub async fn close(&self) {
        self.cancel.cancel();
        let mut closed = self.closed_rx.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Whether the dispatch loop has torn down the connection.
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }
}

// ── Dispatch loop ────────────────────────────────────────────────────

enum Flow {
    Continue,
    Shutdown,
}

enum LoopEvent {
    Cancelled,
    Read(std::io::Result<usize>),
    Request(Option<RequestEnvelope>),
}

enum AwaitEvent {
    Cancelled,
    Deadline,
    Read(std::io::Result<usize>),
}

struct Worker {
    stream: TcpStream,
    reassembler: LineReassembler,
    request_rx: mpsc::Receiver<RequestEnvelope>,
    chat_tx: broadcast::Sender<Arc<ChatMessage>>,
    connection_tx: broadcast::Sender<Arc<ConnectionEvent>>,
    raw_tx: broadcast::Sender<Arc<String>>,
    cancel: CancellationToken,
    closed_tx: watch::Sender<bool>,
}

impl Worker {
    async fn run(mut self) {
        let cancel = self.cancel.clone();
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => LoopEvent::Cancelled,
                result = self.stream.read(&mut buf) => LoopEvent::Read(result),
                envelope = self.request_rx.recv() => LoopEvent::Request(envelope),
            };

            match event {
                LoopEvent::Cancelled => break,
                LoopEvent::Read(Ok(0)) => {
                    info!("console connection lost");
                    break;
                }
                LoopEvent::Read(Ok(n)) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    for event in self.reassembler.feed(&chunk) {
                        self.handle_idle_event(event);
                    }
                }
                LoopEvent::Read(Err(e)) => {
                    warn!(error = %e, "console read failed");
                    break;
                }
                LoopEvent::Request(None) => break,
                LoopEvent::Request(Some(envelope)) => {
                    if matches!(self.serve(envelope, &mut buf).await, Flow::Shutdown) {
                        break;
                    }
                }
            }
        }

        self.shutdown();
    }

    /// Serve one request: write the body, then collect lines until the
    /// prompt marker completes a batch that is genuinely ours.
    async fn serve(&mut self, envelope: RequestEnvelope, buf: &mut [u8]) -> Flow {
        let RequestEnvelope {
            body,
            timeout,
            trace,
            result_tx,
        } = envelope;

        debug!(command = %body, "dispatching console request");
        let wire = format!("{body}{LINE_DELIMITER}");
        if let Err(e) = self.stream.write_all(wire.as_bytes()).await {
            warn!(error = %e, "console write failed");
            let _ = result_tx.send(Err(Error::Transport(e)));
            return Flow::Shutdown;
        }

        let started = Instant::now();
        let deadline = started + timeout;
        let cancel = self.cancel.clone();
        let mut collected: Vec<String> = Vec::new();

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => AwaitEvent::Cancelled,
                _ = tokio::time::sleep_until(deadline) => AwaitEvent::Deadline,
                result = self.stream.read(buf) => AwaitEvent::Read(result),
            };

            match event {
                AwaitEvent::Cancelled => {
                    let _ = result_tx.send(Err(Error::ConnectionClosed));
                    return Flow::Shutdown;
                }
                AwaitEvent::Deadline => {
                    warn!(command = %body, "console request timed out");
                    let _ = result_tx.send(Err(Error::timeout(started.elapsed())));
                    // Stale lines still arriving for this request are
                    // consumed by the idle loop and dropped there.
                    return Flow::Continue;
                }
                AwaitEvent::Read(Ok(0)) => {
                    info!("console connection lost");
                    let _ = result_tx.send(Err(Error::ConnectionClosed));
                    return Flow::Shutdown;
                }
                AwaitEvent::Read(Err(e)) => {
                    warn!(error = %e, "console read failed");
                    let _ = result_tx.send(Err(Error::Transport(e)));
                    return Flow::Shutdown;
                }
                AwaitEvent::Read(Ok(n)) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    let mut events = self.reassembler.feed(&chunk).into_iter();
                    while let Some(event) = events.next() {
                        match event {
                            LineEvent::Line(line) => {
                                if !self.deliver_line(&line) {
                                    if trace {
                                        debug!(line = %line, "response line");
                                    }
                                    collected.push(line);
                                }
                            }
                            LineEvent::Prompt => {
                                if events::is_foreign_batch(&collected) {
                                    debug!(
                                        lines = collected.len(),
                                        "discarding foreign console batch"
                                    );
                                    collected.clear();
                                    continue;
                                }
                                let _ = result_tx.send(Ok(collected));
                                // Anything past the prompt in this chunk is
                                // unsolicited traffic.
                                for leftover in events {
                                    self.handle_idle_event(leftover);
                                }
                                return Flow::Continue;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Handle a reassembled item while no request is in flight.
    fn handle_idle_event(&self, event: LineEvent) {
        match event {
            LineEvent::Line(line) => {
                if !self.deliver_line(&line) {
                    debug!(line = %line, "dropping unsolicited console line");
                }
            }
            LineEvent::Prompt => debug!("stray prompt marker"),
        }
    }

    /// Broadcast the raw line, then offer it to the event matchers.
    /// Returns `true` if the line was consumed as an event.
    fn deliver_line(&self, line: &str) -> bool {
        let _ = self.raw_tx.send(Arc::new(line.to_string()));
        match events::match_event(line) {
            Some(ConsoleEvent::Chat(chat)) => {
                let _ = self.chat_tx.send(Arc::new(chat));
                true
            }
            Some(ConsoleEvent::Connection(event)) => {
                let _ = self.connection_tx.send(Arc::new(event));
                true
            }
            None => false,
        }
    }

    /// Fail everything still queued, then raise the closed signal.
    fn shutdown(&mut self) {
        self.request_rx.close();
        while let Ok(envelope) = self.request_rx.try_recv() {
            let _ = envelope.result_tx.send(Err(Error::ConnectionClosed));
        }
        let _ = self.closed_tx.send(true);
        info!("console client closed");
    }
}
