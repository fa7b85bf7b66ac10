//! Real-time analytics broadcast hub.
//!
//! Browser clients watching a form join that form's room; the rest of the
//! system pushes updates with [`Hub::broadcast`] and the hub fans them out
//! to every live connection in the room. All room-table mutation happens on
//! a single event-loop task, and each client gets a reader and a writer pump.

pub mod client;
pub mod hub;
mod housekeeping;
mod pump;
pub mod room_key;
pub mod state;
mod table;
pub mod transport;

pub use client::{Client, ClientHandle, ClientId};
pub use hub::{Hub, HubStats};
pub use room_key::RoomKey;
pub use state::ClientState;
pub use transport::Transport;
