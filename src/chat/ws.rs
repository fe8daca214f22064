//! WebSocket transport over `tokio-tungstenite`.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::COOKIE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::transport::{
    Connector, EventSink, ReadyState, SharedReadyState, TransportEvent, TransportHandle,
};
use crate::api::Client;
use crate::error::Result;

/// Opens `/chat/ws/{peerId}` connections against the backend.
#[derive(Clone)]
pub struct WsConnector {
    client: Client,
}

impl std::fmt::Debug for WsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnector")
            .field("base_url", &self.client.base_url().as_str())
            .finish()
    }
}

impl WsConnector {
    /// Reuse the API client's base URL and access token.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the upgrade request; the token travels as the `access_token` cookie.
    pub fn request(&self, peer_id: &str) -> Result<Request> {
        let url = self.client.chat().socket_url(peer_id)?;
        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = self.client.access_token() {
            let cookie = HeaderValue::from_str(&format!("access_token={token}")).map_err(|e| {
                crate::Error::Config(format!("access token is not a valid header value: {e}"))
            })?;
            request.headers_mut().insert(COOKIE, cookie);
        }
        Ok(request)
    }
}

impl Connector for WsConnector {
    type Handle = WsHandle;

    /// # Panics
    ///
    /// Panics outside a Tokio runtime; the socket task is spawned.
    fn connect(&self, peer_id: &str, sink: EventSink) -> WsHandle {
        let state = SharedReadyState::default();
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        match self.request(peer_id) {
            Ok(request) => {
                tokio::spawn(run_socket(
                    request,
                    state.clone(),
                    outbound_rx,
                    cancel.clone(),
                    sink,
                ));
            }
            Err(e) => {
                state.set(ReadyState::Closed);
                sink.transport(TransportEvent::Error(e.to_string()));
                sink.transport(TransportEvent::Closed);
            }
        }

        WsHandle {
            state,
            outbound: outbound_tx,
            cancel,
        }
    }
}

/// Handle to one WebSocket conversation.
#[derive(Debug)]
pub struct WsHandle {
    state: SharedReadyState,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl TransportHandle for WsHandle {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send(&self, text: &str) -> bool {
        self.state.get() == ReadyState::Open && self.outbound.send(text.to_owned()).is_ok()
    }

    fn close(&mut self) {
        if matches!(self.state.get(), ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        self.state.set(ReadyState::Closing);
        self.cancel.cancel();
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_socket(
    request: Request,
    state: SharedReadyState,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    sink: EventSink,
) {
    let uri = request.uri().to_string();
    let connected = tokio::select! {
        () = cancel.cancelled() => {
            debug!(%uri, "Connect cancelled before completion");
            state.set(ReadyState::Closed);
            sink.transport(TransportEvent::Closed);
            return;
        }
        res = connect_async(request) => res,
    };

    let (socket, _response) = match connected {
        Ok(pair) => pair,
        Err(e) => {
            state.set(ReadyState::Closed);
            sink.transport(TransportEvent::Error(format!("connect {uri}: {e}")));
            sink.transport(TransportEvent::Closed);
            return;
        }
    };

    if !state.advance(ReadyState::Open) {
        // closed while the handshake was in flight
        let (mut write, _read) = socket.split();
        let _ = write.send(Message::Close(None)).await;
        state.set(ReadyState::Closed);
        sink.transport(TransportEvent::Closed);
        return;
    }
    info!(name: "chat.ws.connected", %uri, "Chat socket connected");
    sink.transport(TransportEvent::Opened);

    let (mut write, mut read) = socket.split();
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    sink.transport(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    sink.transport(TransportEvent::Frame(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    sink.transport(TransportEvent::Frame(
                        String::from_utf8_lossy(&bytes).into_owned(),
                    ));
                }
                Some(Ok(Message::Close(_))) | None => break,
                // ping/pong is answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.transport(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }

    state.set(ReadyState::Closed);
    sink.transport(TransportEvent::Closed);
}
