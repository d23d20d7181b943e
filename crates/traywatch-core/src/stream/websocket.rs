use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{EventStream, StreamConnector};
use crate::error::StreamError;
use crate::events::StreamEvent;

/// Connects to the server's WebSocket endpoint with a bearer token.
#[derive(Clone)]
pub struct WebSocketConnector {
    url: String,
    token: String,
}

impl WebSocketConnector {
    pub fn new(host: &str, token: impl Into<String>) -> Self {
        Self::with_url(format!("wss://{}/api/v4/websocket", host), token)
    }

    pub fn with_url(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for WebSocketConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnector")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Request that authenticates an already open socket.
fn authentication_challenge(seq: u64, token: &str) -> serde_json::Value {
    json!({
        "seq": seq,
        "action": "authentication_challenge",
        "data": { "token": token }
    })
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    type Stream = WebSocketEventStream;

    async fn connect(&self) -> Result<Self::Stream, StreamError> {
        let mut request = self.url.as_str().into_client_request()?;
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))?,
        );

        let (mut socket, response) = connect_async(request).await?;
        debug!(status = %response.status(), url = %self.url, "WebSocket handshake complete");

        let challenge = serde_json::to_string(&authentication_challenge(1, &self.token))?;
        socket.send(Message::Text(challenge)).await?;

        info!(url = %self.url, "Connected to websocket");
        Ok(WebSocketEventStream {
            socket,
            closed: false,
        })
    }
}

pub struct WebSocketEventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl EventStream for WebSocketEventStream {
    async fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        if self.closed {
            return None;
        }

        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(StreamEvent::decode(&text))),
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "Server closed websocket");
                    self.closed = true;
                    return None;
                }
                // Pings are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.socket.close(None).await {
            debug!(error = %e, "Error while closing websocket");
        }
    }
}
