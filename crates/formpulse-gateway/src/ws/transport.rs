//! Adapts an axum WebSocket to the hub's frame transport.

use axum::extract::ws::{Message, WebSocket};
use formpulse_core::error::FormpulseError;
use formpulse_hub::Transport;
use formpulse_protocol::frames::Frame;
use futures_util::{future, SinkExt, StreamExt};

pub fn from_socket(socket: WebSocket) -> Transport {
    let (sink, stream) = socket.split();

    let sink = sink
        .sink_map_err(|e| FormpulseError::Transport(e.to_string()))
        .with(|frame: Frame| future::ready(Ok::<_, FormpulseError>(to_message(frame))));

    // protocol-level ping/pong is answered by the websocket layer itself
    let stream = stream.filter_map(|item| {
        future::ready(match item {
            Ok(msg) => from_message(msg).map(Ok),
            Err(e) => Some(Err(FormpulseError::Transport(e.to_string()))),
        })
    });

    Transport::new(sink, stream)
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.to_string().into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(msg: Message) -> Option<Frame> {
    match msg {
        Message::Text(text) => Some(Frame::text(text.as_str())),
        Message::Binary(data) => Some(Frame::Binary(data.to_vec())),
        Message::Close(_) => Some(Frame::Close),
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_survives_both_directions() {
        let frame = Frame::text(r#"{"type":"pong","timestamp":123}"#);
        let back = from_message(to_message(frame.clone()));
        assert_eq!(back, Some(frame));
    }

    #[test]
    fn control_frames_are_not_surfaced() {
        assert_eq!(from_message(Message::Ping(Default::default())), None);
        assert_eq!(from_message(Message::Pong(Default::default())), None);
        assert_eq!(from_message(Message::Close(None)), Some(Frame::Close));
    }
}
