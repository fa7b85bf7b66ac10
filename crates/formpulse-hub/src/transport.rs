use formpulse_core::error::{FormpulseError, Result};
use formpulse_protocol::frames::Frame;
use futures_util::{Sink, Stream};
use std::pin::Pin;

pub(crate) type FrameSink = Pin<Box<dyn Sink<Frame, Error = FormpulseError> + Send>>;
pub(crate) type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// The two halves of one peer connection.
///
/// The writer pump owns the sink and the reader pump owns the stream, so any
/// duplex transport (an axum WebSocket, an in-memory channel pair) can back a
/// client once it is split and mapped onto [`Frame`].
pub struct Transport {
    sink: FrameSink,
    stream: FrameStream,
}

impl Transport {
    pub fn new<Si, St>(sink: Si, stream: St) -> Self
    where
        Si: Sink<Frame, Error = FormpulseError> + Send + 'static,
        St: Stream<Item = Result<Frame>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    pub(crate) fn split(self) -> (FrameSink, FrameStream) {
        (self.sink, self.stream)
    }
}
