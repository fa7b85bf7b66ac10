use formpulse_core::config::HubConfig;
use formpulse_core::error::{FormpulseError, Result};
use formpulse_protocol::frames::{ConnectedFrame, Envelope, Frame};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Client, ClientHandle, ClientId};
use crate::room_key::RoomKey;
use crate::state::{ClientState, StateCell};
use crate::table::{Member, RoomTable};
use crate::{housekeeping, pump};

/// One broadcast in flight between `Hub::broadcast` and the event loop.
struct Message {
    room_key: RoomKey,
    kind: String,
    payload: Value,
}

/// Why a client is leaving its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepartureReason {
    PeerClosed,
    WriteFailed,
    SlowConsumer,
    Requested,
}

/// Unregister event. Carries everything needed to tear the client down even
/// if it already left the table.
pub(crate) struct Departure {
    pub(crate) id: ClientId,
    pub(crate) room_key: RoomKey,
    pub(crate) state: Arc<StateCell>,
    pub(crate) closed: CancellationToken,
    pub(crate) reason: DepartureReason,
}

impl Departure {
    fn of_member(id: ClientId, room_key: &RoomKey, member: &Member, reason: DepartureReason) -> Self {
        Self {
            id,
            room_key: room_key.clone(),
            state: Arc::clone(&member.state),
            closed: member.closed.clone(),
            reason,
        }
    }
}

/// Dispatch counters, readable from any task.
#[derive(Debug, Default)]
pub struct HubStats {
    dispatched: AtomicU64,
    dropped: AtomicU64,
    slow_consumers: AtomicU64,
}

impl HubStats {
    /// Broadcasts the event loop fanned out to a non-empty room.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Broadcasts dropped because the event queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Clients evicted because their mailbox was full.
    pub fn slow_consumers(&self) -> u64 {
        self.slow_consumers.load(Ordering::Relaxed)
    }
}

/// Handle to the broadcast hub. Cloning is cheap; every clone talks to the
/// same event loop.
///
/// ```rust,no_run
/// # async fn demo() -> formpulse_core::error::Result<()> {
/// use formpulse_hub::Hub;
///
/// let hub = Hub::spawn(Default::default())?;
/// hub.broadcast(
///     "507f1f77bcf86cd799439011",
///     "analytics:update",
///     serde_json::json!({ "totalResponses": 5 }),
/// );
/// assert_eq!(hub.room_size("507f1f77bcf86cd799439011"), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<Client>,
    departure_tx: mpsc::UnboundedSender<Departure>,
    broadcast_tx: mpsc::Sender<Message>,
    rooms: Arc<RoomTable>,
    stats: Arc<HubStats>,
    shutdown: CancellationToken,
}

impl Hub {
    /// Start the event loop (and the housekeeping sweep, if enabled) on the
    /// current tokio runtime.
    pub fn spawn(config: HubConfig) -> Result<Self> {
        let interval = config.housekeeping_interval_secs;
        let (hub, event_loop) = Self::detached(config)?;

        tokio::spawn(event_loop.run());
        if interval > 0 {
            housekeeping::spawn(
                Arc::clone(&hub.rooms),
                Duration::from_secs(interval),
                hub.shutdown.child_token(),
            );
        }
        info!("broadcast hub started");
        Ok(hub)
    }

    /// Build the handle and its event loop without starting anything.
    fn detached(config: HubConfig) -> Result<(Self, EventLoop)> {
        config.validate()?;

        let (register_tx, register_rx) = mpsc::channel(config.register_queue_capacity);
        let (departure_tx, departure_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.event_queue_capacity);
        let rooms = Arc::new(RoomTable::new());
        let stats = Arc::new(HubStats::default());
        let shutdown = CancellationToken::new();

        let event_loop = EventLoop {
            mailbox_capacity: config.mailbox_capacity,
            welcome_message: config.welcome_message,
            register_rx,
            departure_rx,
            broadcast_rx,
            departure_tx: departure_tx.clone(),
            rooms: Arc::clone(&rooms),
            stats: Arc::clone(&stats),
            shutdown: shutdown.clone(),
        };
        let hub = Self {
            register_tx,
            departure_tx,
            broadcast_tx,
            rooms,
            stats,
            shutdown,
        };
        Ok((hub, event_loop))
    }

    /// Hand a validated client to the event loop. The returned handle can be
    /// used to observe its lifecycle or to unregister it later.
    pub async fn register(&self, client: Client) -> Result<ClientHandle> {
        if self.shutdown.is_cancelled() {
            return Err(FormpulseError::HubStopped);
        }
        let handle = client.handle();
        self.register_tx
            .send(client)
            .await
            .map_err(|_| FormpulseError::HubStopped)?;
        Ok(handle)
    }

    /// Ask the event loop to remove a client. Safe to call more than once.
    pub fn unregister(&self, client: &ClientHandle) {
        let departure = Departure {
            id: client.id,
            room_key: client.room_key.clone(),
            state: Arc::clone(&client.state),
            closed: client.closed.clone(),
            reason: DepartureReason::Requested,
        };
        let _ = self.departure_tx.send(departure);
    }

    /// Fire-and-forget broadcast to every client watching `form_id`.
    ///
    /// Never blocks and never fails: invalid identifiers and a saturated event
    /// queue are logged and the update is dropped.
    pub fn broadcast(&self, form_id: &str, kind: &str, payload: impl Serialize) {
        if let Err(e) = self.try_broadcast(form_id, kind, payload) {
            warn!(form_id, kind, code = e.code(), error = %e, "broadcast dropped");
        }
    }

    /// Like [`Hub::broadcast`] but reports why an update was not enqueued.
    pub fn try_broadcast(&self, form_id: &str, kind: &str, payload: impl Serialize) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(FormpulseError::HubStopped);
        }
        let room_key = RoomKey::normalize(form_id)?;
        let message = Message {
            payload: serde_json::to_value(payload)?,
            kind: kind.to_string(),
            room_key,
        };

        self.broadcast_tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(message) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                FormpulseError::EventQueueSaturated {
                    form_id: message.room_key.to_string(),
                }
            }
            TrySendError::Closed(_) => FormpulseError::HubStopped,
        })
    }

    /// Live connections in one room; 0 for unknown or malformed identifiers.
    pub fn room_size(&self, form_id: &str) -> usize {
        match RoomKey::normalize(form_id) {
            Ok(key) => self.rooms.size(&key),
            Err(_) => 0,
        }
    }

    pub fn total_connections(&self) -> usize {
        self.rooms.total()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// Every non-empty room with its member count, ordered by room key.
    pub fn snapshot(&self) -> Vec<(RoomKey, usize)> {
        self.rooms.snapshot()
    }

    pub fn stats(&self) -> &HubStats {
        &self.stats
    }

    /// Stop the event loop and housekeeping. Every remaining client's mailbox
    /// is closed, so its writer says goodbye and exits.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}

/// Sole owner of room-table mutation.
struct EventLoop {
    mailbox_capacity: usize,
    welcome_message: String,
    register_rx: mpsc::Receiver<Client>,
    departure_rx: mpsc::UnboundedReceiver<Departure>,
    broadcast_rx: mpsc::Receiver<Message>,
    /// Cloned into every client's pumps.
    departure_tx: mpsc::UnboundedSender<Departure>,
    rooms: Arc<RoomTable>,
    stats: Arc<HubStats>,
    shutdown: CancellationToken,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            // departures first: a client that already left is torn down
            // before more work reaches it
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(departure) = self.departure_rx.recv() => self.on_departure(departure),
                Some(client) = self.register_rx.recv() => self.on_register(client),
                Some(message) = self.broadcast_rx.recv() => self.on_broadcast(message),
                else => break,
            }
        }

        let members = self.rooms.drain();
        let closed = members.len();
        for (_, member) in members {
            member.state.advance(ClientState::Disconnecting);
            member.state.advance(ClientState::Removed);
        }
        info!(closed, "broadcast hub stopped");
    }

    fn on_register(&self, client: Client) {
        let Client {
            id,
            room_key,
            transport,
            state,
            closed,
        } = client;

        // unregistered while still waiting in the register queue
        if closed.is_cancelled() || state.get() >= ClientState::Disconnecting {
            debug!(client_id = %id, form_id = %room_key, "client left before joining, dropping");
            closed.cancel();
            state.advance(ClientState::Removed);
            return;
        }

        // the welcome is queued before anything else can reach the mailbox
        let (mailbox, mailbox_rx) = mpsc::channel(self.mailbox_capacity);
        let welcome = Frame::json(&ConnectedFrame::new(&self.welcome_message, room_key.as_str()));
        if let Err(e) = welcome.map_err(FormpulseError::from).and_then(|frame| {
            mailbox
                .try_send(frame)
                .map_err(|e| FormpulseError::Transport(e.to_string()))
        }) {
            warn!(client_id = %id, form_id = %room_key, error = %e, "welcome frame rejected, dropping client");
            closed.cancel();
            state.advance(ClientState::Removed);
            return;
        }

        let member = Member {
            mailbox: mailbox.clone(),
            state: Arc::clone(&state),
            closed: closed.clone(),
        };
        let room_size = self.rooms.insert(&room_key, id, member);
        state.advance(ClientState::Registered);

        let (sink, stream) = transport.split();
        let ctx = pump::PumpContext {
            id,
            room_key: room_key.clone(),
            state: Arc::clone(&state),
            closed,
            departures: self.departure_tx.clone(),
        };
        pump::spawn_writer(ctx.clone(), mailbox_rx, sink);
        pump::spawn_reader(ctx, mailbox.downgrade(), stream);
        state.advance(ClientState::Active);

        info!(client_id = %id, form_id = %room_key, room_size, "client joined room");
    }

    fn on_departure(&self, departure: Departure) {
        let Departure {
            id,
            room_key,
            state,
            closed,
            reason,
        } = departure;

        if reason == DepartureReason::SlowConsumer {
            // a peer that stopped reading cannot be given a graceful close
            closed.cancel();
        }
        state.advance(ClientState::Disconnecting);

        match self.rooms.remove(&room_key, id) {
            Some((member, remaining)) => {
                drop(member);
                if reason == DepartureReason::SlowConsumer {
                    self.stats.slow_consumers.fetch_add(1, Ordering::Relaxed);
                }
                info!(
                    client_id = %id,
                    form_id = %room_key,
                    ?reason,
                    room_size = remaining,
                    "client left room"
                );
            }
            None => debug!(client_id = %id, ?reason, "client already removed"),
        }
        state.advance(ClientState::Removed);
    }

    fn on_broadcast(&self, message: Message) {
        let Message {
            room_key,
            kind,
            payload,
        } = message;

        let Some(members) = self.rooms.members(&room_key) else {
            debug!(form_id = %room_key, kind = %kind, "broadcast to empty room");
            return;
        };

        let envelope = Envelope {
            form_id: room_key.to_string(),
            kind,
            data: payload,
        };
        let frame = match Frame::json(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(form_id = %room_key, error = %e, "failed to serialize broadcast");
                return;
            }
        };

        let mut delivered = 0usize;
        for (id, member) in &members {
            if member.closed.is_cancelled() {
                // already tearing down, its departure is queued
                continue;
            }
            match member.mailbox.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client_id = %id, form_id = %room_key, "slow consumer, evicting");
                    self.on_departure(Departure::of_member(
                        *id,
                        &room_key,
                        member,
                        DepartureReason::SlowConsumer,
                    ));
                }
                Err(TrySendError::Closed(_)) => {
                    self.on_departure(Departure::of_member(
                        *id,
                        &room_key,
                        member,
                        DepartureReason::WriteFailed,
                    ));
                }
            }
        }

        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(
            form_id = %room_key,
            kind = %envelope.kind,
            delivered,
            members = members.len(),
            "broadcast dispatched"
        );
    }
}
