use dashmap::DashMap;
use formpulse_protocol::frames::Frame;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::ClientId;
use crate::room_key::RoomKey;
use crate::state::StateCell;

/// Hub-side record of one room member.
#[derive(Clone)]
pub(crate) struct Member {
    /// The only strong sender into the client's mailbox; dropping it closes the mailbox.
    pub(crate) mailbox: mpsc::Sender<Frame>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) closed: CancellationToken,
}

/// Room key -> members. Written only by the hub event loop; read from anywhere.
///
/// Invariant: a room with zero members is never left in the map.
#[derive(Default)]
pub(crate) struct RoomTable {
    rooms: DashMap<RoomKey, HashMap<ClientId, Member>>,
}

impl RoomTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a member, creating the room on first join. Returns the new room size.
    pub(crate) fn insert(&self, key: &RoomKey, id: ClientId, member: Member) -> usize {
        let mut room = self.rooms.entry(key.clone()).or_default();
        room.insert(id, member);
        room.len()
    }

    /// Remove a member and drop the room if it emptied.
    /// Returns the removed member and the remaining room size.
    pub(crate) fn remove(&self, key: &RoomKey, id: ClientId) -> Option<(Member, usize)> {
        let (member, remaining) = {
            let mut room = self.rooms.get_mut(key)?;
            let member = room.remove(&id)?;
            (member, room.len())
        };
        if remaining == 0 {
            self.rooms.remove_if(key, |_, members| members.is_empty());
        }
        Some((member, remaining))
    }

    /// Copy of a room's members, or `None` when nobody is listening.
    pub(crate) fn members(&self, key: &RoomKey) -> Option<Vec<(ClientId, Member)>> {
        let room = self.rooms.get(key)?;
        if room.is_empty() {
            return None;
        }
        Some(room.iter().map(|(id, m)| (*id, m.clone())).collect())
    }

    pub(crate) fn size(&self, key: &RoomKey) -> usize {
        self.rooms.get(key).map(|room| room.len()).unwrap_or(0)
    }

    pub(crate) fn total(&self) -> usize {
        self.rooms.iter().map(|room| room.len()).sum()
    }

    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// (room, size) pairs ordered by room key.
    pub(crate) fn snapshot(&self) -> Vec<(RoomKey, usize)> {
        let mut rooms: Vec<_> = self
            .rooms
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();
        rooms.sort();
        rooms
    }

    /// Empty the table, handing back every member.
    pub(crate) fn drain(&self) -> Vec<(ClientId, Member)> {
        let keys: Vec<RoomKey> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.rooms.remove(&key))
            .flat_map(|(_, members)| members)
            .collect()
    }
}
