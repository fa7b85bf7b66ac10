#![allow(dead_code)]

use formpulse_core::config::HubConfig;
use formpulse_core::error::{FormpulseError, Result};
use formpulse_hub::{Client, ClientHandle, Hub, RoomKey, Transport};
use formpulse_protocol::frames::Frame;
use futures_util::SinkExt;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::PollSender;

pub const FORM_A: &str = "507f1f77bcf86cd799439011";
pub const FORM_B: &str = "507f191e810c19729de860ea";

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

pub fn hub(mailbox_capacity: usize) -> Hub {
    Hub::spawn(HubConfig {
        mailbox_capacity,
        housekeeping_interval_secs: 0,
        ..HubConfig::default()
    })
    .unwrap()
}

/// Test side of an in-memory transport.
pub struct Peer {
    pub handle: ClientHandle,
    inbound: Option<mpsc::Sender<Result<Frame>>>,
    outbound: mpsc::Receiver<Frame>,
}

/// Register a client whose transport is a pair of tokio channels.
/// `peer_buffer` bounds how many frames the writer can push before it blocks.
pub async fn connect(hub: &Hub, form_id: &str, peer_buffer: usize) -> Peer {
    let (out_tx, outbound) = mpsc::channel::<Frame>(peer_buffer);
    let (inbound, in_rx) = mpsc::channel::<Result<Frame>>(16);

    let sink = PollSender::new(out_tx).sink_map_err(|e| FormpulseError::Transport(e.to_string()));
    let transport = Transport::new(sink, ReceiverStream::new(in_rx));
    let client = Client::new(RoomKey::normalize(form_id).unwrap(), transport);
    let handle = hub.register(client).await.unwrap();

    Peer {
        handle,
        inbound: Some(inbound),
        outbound,
    }
}

impl Peer {
    pub async fn recv(&mut self) -> Option<Frame> {
        timeout(RECV_TIMEOUT, self.outbound.recv()).await.ok().flatten()
    }

    pub async fn recv_json(&mut self) -> Value {
        let frame = self.recv().await.expect("expected a frame");
        serde_json::from_str(frame.as_text().expect("expected a text frame")).unwrap()
    }

    pub async fn expect_welcome(&mut self) -> Value {
        let welcome = self.recv_json().await;
        assert_eq!(welcome["type"], "connected");
        welcome
    }

    pub async fn assert_silent(&mut self) {
        let next = timeout(QUIET, self.outbound.recv()).await;
        assert!(next.is_err(), "unexpected frame: {next:?}");
    }

    pub async fn send_text(&self, text: &str) {
        self.inbound
            .as_ref()
            .expect("peer already hung up")
            .send(Ok(Frame::text(text)))
            .await
            .unwrap();
    }

    /// Like `send_text`, but reports false once the reader has gone away.
    pub async fn offer_text(&self, text: &str) -> bool {
        match &self.inbound {
            Some(inbound) => inbound.send(Ok(Frame::text(text))).await.is_ok(),
            None => false,
        }
    }

    /// Close the peer's side: the reader sees end-of-stream.
    pub fn hang_up(&mut self) {
        self.inbound.take();
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(RECV_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// TotalConnections equals the sum of room sizes and no empty room lingers.
pub fn assert_table_consistent(hub: &Hub) {
    let snapshot = hub.snapshot();
    let sum: usize = snapshot.iter().map(|(_, size)| size).sum();
    assert_eq!(hub.total_connections(), sum);
    assert_eq!(hub.room_count(), snapshot.len());
    for (key, size) in &snapshot {
        assert!(*size > 0, "empty room {key} left in table");
        assert_eq!(hub.room_size(key.as_str()), *size);
    }
}
