pub mod websocket;

use async_trait::async_trait;

use crate::error::StreamError;
use crate::events::StreamEvent;

pub use websocket::{WebSocketConnector, WebSocketEventStream};

/// One live streaming connection.
#[async_trait]
pub trait EventStream: Send {
    /// Next decoded event. `None` once the peer closed the stream;
    /// `Some(Err(_))` when it broke.
    async fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>>;

    /// Close the connection. Safe to call more than once, and after the
    /// stream has already terminated.
    async fn close(&mut self);
}

/// Opens streaming connections; a successful `connect` is a completed
/// handshake.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    type Stream: EventStream + 'static;

    async fn connect(&self) -> Result<Self::Stream, StreamError>;
}
