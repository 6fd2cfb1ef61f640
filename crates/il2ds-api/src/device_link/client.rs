// Device Link client and dispatch loop.
//
// One spawned task owns the UDP socket and the request queue receiver.
// Answers carry no sequence numbers, only the opcode of the request
// they belong to, so the loop serves one request at a time and matches
// inbound messages against the opcodes it is waiting for.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use il2ds_core::{
    AircraftPosition, GroundUnitPosition, HousePosition, ShipPosition, StationaryObjectPosition,
};

use super::codec::{self, Datagram, DatagramKind, Message};
use super::messages::{self, ActorKind, RawPosition, RADAR_REFRESH};
use super::MAX_GROUP_SIZE;
use crate::error::Error;

const REQUEST_CHANNEL_SIZE: usize = 64;
const READ_BUFFER_SIZE: usize = 8192;

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ── Settings ─────────────────────────────────────────────────────────

/// Connection settings for the Device Link client.
#[derive(Debug, Clone)]
pub struct DeviceLinkSettings {
    /// Address of the server's Device Link UDP listener.
    pub address: SocketAddr,
    /// Deadline for a whole call, including every datagram a large
    /// batch needs.
    pub request_timeout: Duration,
}

impl DeviceLinkSettings {
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

// ── Request envelope ─────────────────────────────────────────────────

struct RequestEnvelope {
    messages: Vec<Message>,
    /// `false` for fire-and-forget requests the server never answers.
    wait_for_answers: bool,
    timeout: Duration,
    result_tx: oneshot::Sender<Result<Vec<Message>, Error>>,
}

// ── Client handle ────────────────────────────────────────────────────

/// Handle to a Device Link endpoint.
///
/// Cheaply cloneable; all clones feed the same strictly ordered request
/// queue. Position data is only exported for missions whose radar
/// refresh is enabled, see [`DeviceLinkClient::refresh_radar`].
#[derive(Clone)]
pub struct DeviceLinkClient {
    request_tx: mpsc::Sender<RequestEnvelope>,
    cancel: CancellationToken,
    closed_rx: watch::Receiver<bool>,
    request_timeout: Duration,
}

impl DeviceLinkClient {
    /// Bind a local socket and spawn the dispatch loop.
    ///
    /// UDP carries no session, so this succeeds even when no server is
    /// listening; an unreachable server surfaces as request timeouts.
    pub async fn connect(settings: DeviceLinkSettings) -> Result<Self, Error> {
        let bind: SocketAddr = if settings.address.is_ipv6() {
            (IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0).into()
        } else {
            (IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        info!(address = %settings.address, "device link socket bound");

        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (closed_tx, closed_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let worker = Worker {
            socket,
            server: settings.address,
            request_rx,
            cancel: cancel.clone(),
            closed_tx,
        };
        tokio::spawn(worker.run());

        Ok(Self {
            request_tx,
            cancel,
            closed_rx,
            request_timeout: settings.request_timeout,
        })
    }

    // ── Radar ────────────────────────────────────────────────────────

    /// Tell the server to refresh its radar picture. Missions gate
    /// coordinate export behind this; call it after a mission starts
    /// and the position queries below begin returning data.
    pub async fn refresh_radar(&self) -> Result<(), Error> {
        self.request(vec![Message::new(RADAR_REFRESH)], self.request_timeout, false)
            .await?;
        Ok(())
    }

    // ── Actor enumeration ────────────────────────────────────────────

    pub async fn aircraft_count(&self) -> Result<usize, Error> {
        self.count(ActorKind::Aircraft, self.request_timeout).await
    }

    /// Positions of all pilot-controlled aircraft.
    pub async fn aircraft_positions(&self) -> Result<Vec<AircraftPosition>, Error> {
        let raw = self.positions(ActorKind::Aircraft).await?;
        Ok(raw
            .into_iter()
            .map(|raw| {
                let (callsign, seat) = messages::split_aircraft_id(&raw.id);
                AircraftPosition {
                    callsign,
                    seat,
                    pos: raw.pos,
                }
            })
            .collect())
    }

    pub async fn ground_unit_count(&self) -> Result<usize, Error> {
        self.count(ActorKind::GroundUnit, self.request_timeout).await
    }

    pub async fn ground_unit_positions(&self) -> Result<Vec<GroundUnitPosition>, Error> {
        let raw = self.positions(ActorKind::GroundUnit).await?;
        Ok(raw
            .into_iter()
            .map(|raw| GroundUnitPosition {
                id: raw.id,
                pos: raw.pos,
            })
            .collect())
    }

    pub async fn ship_count(&self) -> Result<usize, Error> {
        self.count(ActorKind::Ship, self.request_timeout).await
    }

    pub async fn ship_positions(&self) -> Result<Vec<ShipPosition>, Error> {
        let raw = self.positions(ActorKind::Ship).await?;
        Ok(raw
            .into_iter()
            .map(|raw| ShipPosition {
                id: raw.id,
                pos: raw.pos,
            })
            .collect())
    }

    pub async fn stationary_object_count(&self) -> Result<usize, Error> {
        self.count(ActorKind::StationaryObject, self.request_timeout)
            .await
    }

    pub async fn stationary_object_positions(
        &self,
    ) -> Result<Vec<StationaryObjectPosition>, Error> {
        let raw = self.positions(ActorKind::StationaryObject).await?;
        Ok(raw
            .into_iter()
            .map(|raw| StationaryObjectPosition {
                id: raw.id,
                pos: raw.pos,
            })
            .collect())
    }

    pub async fn house_count(&self) -> Result<usize, Error> {
        self.count(ActorKind::House, self.request_timeout).await
    }

    pub async fn house_positions(&self) -> Result<Vec<HousePosition>, Error> {
        let raw = self.positions(ActorKind::House).await?;
        Ok(raw
            .into_iter()
            .map(|raw| HousePosition {
                id: raw.id,
                pos: raw.pos,
            })
            .collect())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Close the socket and wait for the dispatch loop to finish.
    ///
    /// Idempotent. Requests still queued when the loop exits fail with
    /// [`Error::ConnectionClosed`]; requests enqueued afterwards fail
    /// immediately.
    pub async fn close(&self) {
        self.cancel.cancel();
        let mut closed = self.closed_rx.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Whether the dispatch loop has torn down the socket.
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn count(&self, kind: ActorKind, timeout: Duration) -> Result<usize, Error> {
        let opcode = kind.count_opcode();
        let answers = self.request(vec![Message::new(opcode)], timeout, true).await?;
        let answer = answers
            .iter()
            .find(|message| message.opcode == opcode)
            .ok_or_else(|| Error::response(format!("no {} count in answer", kind.name())))?;
        messages::parse_count(answer.value.as_deref())
    }

    /// Two-phase enumeration: ask how many actors exist, then ask for
    /// each index. Both phases share one deadline. Actors that left the
    /// mission in between answer with a sentinel and are dropped.
    async fn positions(&self, kind: ActorKind) -> Result<Vec<RawPosition>, Error> {
        let started = Instant::now();
        let deadline = started + self.request_timeout;

        let count = self
            .count(kind, remaining_budget(started, deadline)?)
            .await?;
        debug!(kind = kind.name(), count, "enumerating actor positions");
        if count == 0 {
            return Ok(Vec::new());
        }

        let requests = (0..count)
            .map(|index| Message::with_value(kind.position_opcode(), index.to_string()))
            .collect();
        let answers = self
            .request(requests, remaining_budget(started, deadline)?, true)
            .await?;

        let mut entries = Vec::with_capacity(answers.len());
        for answer in answers {
            let value = answer
                .value
                .as_deref()
                .ok_or_else(|| Error::response("position answer carries no value"))?;
            if let Some(entry) = messages::parse_position(value)? {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|(index, _)| *index);
        Ok(entries.into_iter().map(|(_, raw)| raw).collect())
    }

    /// Enqueue a request and await its result.
    async fn request(
        &self,
        messages: Vec<Message>,
        timeout: Duration,
        wait_for_answers: bool,
    ) -> Result<Vec<Message>, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::ConnectionClosed);
        }
        let (result_tx, result_rx) = oneshot::channel();
        self.request_tx
            .send(RequestEnvelope {
                messages,
                wait_for_answers,
                timeout,
                result_tx,
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        result_rx.await.map_err(|_| Error::ConnectionClosed)?
    }
}

// ── Dispatch loop ────────────────────────────────────────────────────

enum Flow {
    Continue,
    Shutdown,
}

enum LoopEvent {
    Cancelled,
    Recv(std::io::Result<(usize, SocketAddr)>),
    Request(Option<RequestEnvelope>),
}

enum AwaitEvent {
    Cancelled,
    Deadline,
    Recv(std::io::Result<(usize, SocketAddr)>),
}

struct Worker {
    socket: UdpSocket,
    server: SocketAddr,
    request_rx: mpsc::Receiver<RequestEnvelope>,
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
                result = self.socket.recv_from(&mut buf) => LoopEvent::Recv(result),
                envelope = self.request_rx.recv() => LoopEvent::Request(envelope),
            };

            match event {
                LoopEvent::Cancelled => break,
                LoopEvent::Recv(Ok((n, peer))) => {
                    // No request in flight, so nothing can claim this.
                    debug!(bytes = n, peer = %peer, "discarding unsolicited datagram");
                }
                LoopEvent::Recv(Err(e)) => {
                    warn!(error = %e, "device link receive failed");
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

    /// Serve one request: send each group as a datagram and, unless the
    /// request is fire-and-forget, collect answers until every message
    /// in the group has been answered.
    async fn serve(&mut self, envelope: RequestEnvelope, buf: &mut [u8]) -> Flow {
        let RequestEnvelope {
            messages,
            wait_for_answers,
            timeout,
            result_tx,
        } = envelope;

        let started = Instant::now();
        let deadline = started + timeout;
        let cancel = self.cancel.clone();
        let mut collected: Vec<Message> = Vec::new();

        for group in messages.chunks(MAX_GROUP_SIZE) {
            let wire = codec::compose(&Datagram {
                kind: DatagramKind::Request,
                messages: group.to_vec(),
            });
            debug!(messages = group.len(), "sending device link request");
            if let Err(e) = self.socket.send_to(wire.as_bytes(), self.server).await {
                warn!(error = %e, "device link send failed");
                let _ = result_tx.send(Err(Error::Transport(e)));
                return Flow::Shutdown;
            }
            if !wait_for_answers {
                continue;
            }

            let expected: HashSet<u16> = group.iter().map(|message| message.opcode).collect();
            let mut outstanding = group.len();
            while outstanding > 0 {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => AwaitEvent::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => AwaitEvent::Deadline,
                    result = self.socket.recv_from(buf) => AwaitEvent::Recv(result),
                };

                match event {
                    AwaitEvent::Cancelled => {
                        let _ = result_tx.send(Err(Error::ConnectionClosed));
                        return Flow::Shutdown;
                    }
                    AwaitEvent::Deadline => {
                        warn!(outstanding, "device link request timed out");
                        let _ = result_tx.send(Err(Error::timeout(started.elapsed())));
                        return Flow::Continue;
                    }
                    AwaitEvent::Recv(Err(e)) => {
                        warn!(error = %e, "device link receive failed");
                        let _ = result_tx.send(Err(Error::Transport(e)));
                        return Flow::Shutdown;
                    }
                    AwaitEvent::Recv(Ok((n, peer))) => {
                        if peer != self.server {
                            warn!(peer = %peer, "discarding datagram from unknown peer");
                            continue;
                        }
                        let text = String::from_utf8_lossy(&buf[..n]);
                        let datagram = match codec::decompose(&text) {
                            Ok(datagram) => datagram,
                            Err(e) => {
                                debug!(error = %e, "discarding malformed datagram");
                                continue;
                            }
                        };
                        if datagram.kind != DatagramKind::Answer {
                            debug!("discarding non-answer datagram");
                            continue;
                        }
                        for message in datagram.messages {
                            if outstanding > 0 && expected.contains(&message.opcode) {
                                collected.push(message);
                                outstanding -= 1;
                            } else {
                                debug!(
                                    opcode = message.opcode,
                                    "discarding unexpected answer message"
                                );
                            }
                        }
                    }
                }
            }
        }

        let _ = result_tx.send(Ok(collected));
        Flow::Continue
    }

    /// Fail everything still queued, then raise the closed signal.
    fn shutdown(&mut self) {
        self.request_rx.close();
        while let Ok(envelope) = self.request_rx.try_recv() {
            let _ = envelope.result_tx.send(Err(Error::ConnectionClosed));
        }
        let _ = self.closed_tx.send(true);
        info!("device link client closed");
    }
}

/// Remaining budget before `deadline`, or a timeout error carrying the
/// time actually spent.
fn remaining_budget(started: Instant, deadline: Instant) -> Result<Duration, Error> {
    let now = Instant::now();
    if now >= deadline {
        return Err(Error::timeout(now - started));
    }
    Ok(deadline - now)
}
