use std::sync::atomic::{AtomicU8, Ordering};

/// Client lifecycle — linear progression, no backwards transitions.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    /// Identifier validated, waiting for the hub to accept it.
    Connecting = 0,
    /// Inserted into its room.
    Registered = 1,
    /// Both pumps running.
    Active = 2,
    /// A pump failed or an unregister was requested.
    Disconnecting = 3,
    /// Mailbox closed and room-table entry gone.
    Removed = 4,
}

impl ClientState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ClientState::Connecting,
            1 => ClientState::Registered,
            2 => ClientState::Active,
            3 => ClientState::Disconnecting,
            _ => ClientState::Removed,
        }
    }
}

/// Shared lifecycle cell that only ever moves forward.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ClientState::Connecting as u8))
    }

    pub(crate) fn get(&self) -> ClientState {
        ClientState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` if it is later than the current state.
    /// Returns true when this call made the transition.
    pub(crate) fn advance(&self, next: ClientState) -> bool {
        let prev = self.0.fetch_max(next as u8, Ordering::AcqRel);
        prev < next as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_connecting() {
        assert_eq!(StateCell::new().get(), ClientState::Connecting);
    }

    #[test]
    fn never_moves_backwards() {
        let cell = StateCell::new();
        assert!(cell.advance(ClientState::Active));
        assert!(!cell.advance(ClientState::Registered));
        assert_eq!(cell.get(), ClientState::Active);
        assert!(cell.advance(ClientState::Removed));
        assert!(!cell.advance(ClientState::Disconnecting));
        assert_eq!(cell.get(), ClientState::Removed);
    }

    #[test]
    fn repeated_transition_reports_once() {
        let cell = StateCell::new();
        assert!(cell.advance(ClientState::Disconnecting));
        assert!(!cell.advance(ClientState::Disconnecting));
    }
}
