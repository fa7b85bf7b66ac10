//! Per-client connection pumps.
//!
//! The writer is the only consumer of the mailbox; the reader answers pings
//! through a weak mailbox sender so it never keeps a removed client's mailbox
//! open. Either pump exiting cancels the other and reports a departure.

use formpulse_core::config::MAX_INBOUND_FRAME_BYTES;
use formpulse_protocol::frames::{Frame, InboundFrame, PongFrame};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::ClientId;
use crate::hub::{Departure, DepartureReason};
use crate::room_key::RoomKey;
use crate::state::{ClientState, StateCell};
use crate::transport::{FrameSink, FrameStream};

#[derive(Clone)]
pub(crate) struct PumpContext {
    pub(crate) id: ClientId,
    pub(crate) room_key: RoomKey,
    pub(crate) state: Arc<StateCell>,
    pub(crate) closed: CancellationToken,
    pub(crate) departures: mpsc::UnboundedSender<Departure>,
}

impl PumpContext {
    /// Tear down: ask the hub to drop us, then stop the sibling pump.
    /// The departure is queued before the sibling wakes, so our reason wins.
    fn leave(&self, reason: DepartureReason) {
        self.state.advance(ClientState::Disconnecting);
        let _ = self.departures.send(Departure {
            id: self.id,
            room_key: self.room_key.clone(),
            state: Arc::clone(&self.state),
            closed: self.closed.clone(),
            reason,
        });
        self.closed.cancel();
    }
}

pub(crate) fn spawn_writer(ctx: PumpContext, mailbox: mpsc::Receiver<Frame>, sink: FrameSink) {
    tokio::spawn(run_writer(ctx, mailbox, sink));
}

pub(crate) fn spawn_reader(ctx: PumpContext, mailbox: mpsc::WeakSender<Frame>, stream: FrameStream) {
    tokio::spawn(run_reader(ctx, mailbox, stream));
}

/// Drain the mailbox to the transport in FIFO order.
async fn run_writer(ctx: PumpContext, mut mailbox: mpsc::Receiver<Frame>, mut sink: FrameSink) {
    let reason = loop {
        let next = tokio::select! {
            biased;
            _ = ctx.closed.cancelled() => break DepartureReason::PeerClosed,
            next = mailbox.recv() => next,
        };

        let Some(frame) = next else {
            // mailbox closed by the hub: say goodbye, then hang up
            tokio::select! {
                biased;
                _ = ctx.closed.cancelled() => {}
                _ = sink.send(Frame::Close) => {}
            }
            break DepartureReason::Requested;
        };

        let sent = tokio::select! {
            biased;
            _ = ctx.closed.cancelled() => break DepartureReason::PeerClosed,
            sent = sink.send(frame) => sent,
        };
        if let Err(e) = sent {
            debug!(client_id = %ctx.id, error = %e, "write failed");
            break DepartureReason::WriteFailed;
        }
    };

    ctx.leave(reason);
    debug!(client_id = %ctx.id, ?reason, "writer stopped");
}

/// Read peer frames until the peer goes away or the client is torn down.
async fn run_reader(ctx: PumpContext, mailbox: mpsc::WeakSender<Frame>, mut stream: FrameStream) {
    let reason = loop {
        let next = tokio::select! {
            biased;
            _ = ctx.closed.cancelled() => break DepartureReason::Requested,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Frame::Text(text))) => {
                if text.len() > MAX_INBOUND_FRAME_BYTES {
                    warn!(client_id = %ctx.id, size = text.len(), "inbound frame too large");
                    break DepartureReason::PeerClosed;
                }
                if let Err(reason) = handle_text(&ctx, &text, &mailbox) {
                    break reason;
                }
            }
            Some(Ok(Frame::Binary(_))) => {}
            Some(Ok(Frame::Close)) | None => break DepartureReason::PeerClosed,
            Some(Err(e)) => {
                debug!(client_id = %ctx.id, error = %e, "read failed");
                break DepartureReason::PeerClosed;
            }
        }
    };

    ctx.leave(reason);
    debug!(client_id = %ctx.id, ?reason, "reader stopped");
}

/// Handle one inbound text frame. Only `ping` gets an answer.
fn handle_text(
    ctx: &PumpContext,
    text: &str,
    mailbox: &mpsc::WeakSender<Frame>,
) -> Result<(), DepartureReason> {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(client_id = %ctx.id, error = %e, "malformed frame");
            return Ok(());
        }
    };

    let Some(ping) = frame.as_ping() else {
        debug!(client_id = %ctx.id, frame_type = %frame.frame_type, "ignoring frame");
        return Ok(());
    };

    let pong = match Frame::json(&PongFrame::reply_to(ping)) {
        Ok(pong) => pong,
        Err(e) => {
            warn!(client_id = %ctx.id, error = %e, "failed to serialize pong");
            return Ok(());
        }
    };

    let Some(mailbox) = mailbox.upgrade() else {
        return Err(DepartureReason::Requested);
    };
    match mailbox.try_send(pong) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            warn!(client_id = %ctx.id, "mailbox full while answering ping");
            Err(DepartureReason::SlowConsumer)
        }
        Err(TrySendError::Closed(_)) => Err(DepartureReason::Requested),
    }
}
