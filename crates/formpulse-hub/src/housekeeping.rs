//! Periodic read-only sweep over the room table. Diagnostics only.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::table::RoomTable;

/// Start the sweep. It stops when `shutdown` is cancelled, so it never
/// outlives the hub that owns the token.
pub(crate) fn spawn(
    rooms: Arc<RoomTable>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => sweep(&rooms),
            }
        }
        debug!("housekeeping stopped");
    })
}

fn sweep(rooms: &RoomTable) {
    let snapshot = rooms.snapshot();
    let connections: usize = snapshot.iter().map(|(_, size)| size).sum();
    info!(rooms = snapshot.len(), connections, "housekeeping sweep");
    for (key, size) in &snapshot {
        debug!(form_id = %key, members = size, "room");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stops_with_its_token() {
        let rooms = Arc::new(RoomTable::new());
        let shutdown = CancellationToken::new();
        let task = spawn(Arc::clone(&rooms), Duration::from_secs(60), shutdown.clone());

        tokio::time::advance(Duration::from_secs(125)).await;
        assert!(!task.is_finished());

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(rooms.room_count(), 0);
    }
}
