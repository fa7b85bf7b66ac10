use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::room_key::RoomKey;
use crate::state::{ClientState, StateCell};
use crate::transport::Transport;

/// Opaque per-connection identity. Never reused once a client is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated connection waiting to be handed to [`Hub::register`](crate::Hub::register).
///
/// The room key is fixed at construction; a client never changes rooms.
pub struct Client {
    pub(crate) id: ClientId,
    pub(crate) room_key: RoomKey,
    pub(crate) transport: Transport,
    pub(crate) state: Arc<StateCell>,
    /// Cancelled when either pump exits, or when the hub evicts the client.
    pub(crate) closed: CancellationToken,
}

impl Client {
    pub fn new(room_key: RoomKey, transport: Transport) -> Self {
        Self {
            id: ClientId::new(),
            room_key,
            transport,
            state: Arc::new(StateCell::new()),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn room_key(&self) -> &RoomKey {
        &self.room_key
    }

    /// Observation handle that stays valid after the client is moved into the hub.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            id: self.id,
            room_key: self.room_key.clone(),
            state: Arc::clone(&self.state),
            closed: self.closed.clone(),
        }
    }
}

/// Cheap, cloneable view of a client owned by the hub.
#[derive(Clone)]
pub struct ClientHandle {
    pub(crate) id: ClientId,
    pub(crate) room_key: RoomKey,
    pub(crate) state: Arc<StateCell>,
    pub(crate) closed: CancellationToken,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn room_key(&self) -> &RoomKey {
        &self.room_key
    }

    pub fn state(&self) -> ClientState {
        self.state.get()
    }

    /// Resolves once either pump has stopped.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("room_key", &self.room_key)
            .field("state", &self.state.get())
            .finish()
    }
}
