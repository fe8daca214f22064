//! Browser-facing chat socket.
//!
//! The browser cannot attach the backend's `access_token` cookie to a socket
//! on another origin, so the preview server opens the backend stream on its
//! behalf and relays frames both ways. Inbound messages reach the browser as
//! rendered bubbles; outbound text is trimmed and forwarded as is.

use axum::extract::ws::{CloseFrame, Message as BrowserMessage, Utf8Bytes, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as BackendMessage;
use tracing::{debug, info, warn};

use super::ServerState;
use crate::api::Client;
use crate::chat::{ChatMessage, WsConnector};
use crate::render::render_bubble;

/// Close code sent when the browser has no usable session.
pub const CLOSE_FORBIDDEN: u16 = 4003;
/// Close code sent when the backend stream cannot be opened.
pub const CLOSE_UPSTREAM_FAILED: u16 = 1011;

async fn refuse(mut browser: WebSocket, code: u16, reason: &'static str) {
    let _ = browser
        .send(BrowserMessage::Close(Some(CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        })))
        .await;
}

/// Relay one conversation until either side goes away.
pub(super) async fn run(
    browser: WebSocket,
    state: ServerState,
    token: Option<String>,
    peer_id: String,
) {
    let Some(token) = token else {
        debug!(peer_id = %peer_id, "Chat socket without session");
        return refuse(browser, CLOSE_FORBIDDEN, "Forbidden").await;
    };

    let client = match Client::with_client(&state.config.backend.base_url, state.http.clone()) {
        Ok(client) => client.with_access_token(token),
        Err(e) => {
            warn!(error = %e, "Invalid backend URL");
            return refuse(browser, CLOSE_UPSTREAM_FAILED, "Backend unavailable").await;
        }
    };

    let viewer_id = match client.users().me().await {
        Ok(me) => me.id,
        Err(e) if e.is_unauthorized() => {
            return refuse(browser, CLOSE_FORBIDDEN, "Forbidden").await;
        }
        Err(e) => {
            warn!(error = %e, "Could not resolve the viewer for the chat socket");
            return refuse(browser, CLOSE_UPSTREAM_FAILED, "Backend unavailable").await;
        }
    };
    if viewer_id == peer_id {
        return refuse(browser, CLOSE_FORBIDDEN, "Cannot chat with yourself").await;
    }

    let upstream = match WsConnector::new(client).request(&peer_id) {
        Ok(request) => connect_async(request).await.map_err(crate::Error::from),
        Err(e) => Err(e),
    };
    let upstream = match upstream {
        Ok((socket, _response)) => socket,
        Err(e) => {
            warn!(error = %e, peer_id = %peer_id, "Chat backend refused the relay");
            return refuse(browser, CLOSE_UPSTREAM_FAILED, "Backend unavailable").await;
        }
    };
    info!(name: "chat.relay.opened", peer_id = %peer_id, "Chat relay opened");

    let (mut to_backend, mut from_backend) = upstream.split();
    let (mut to_browser, mut from_browser) = browser.split();

    loop {
        tokio::select! {
            frame = from_browser.next() => match frame {
                Some(Ok(BrowserMessage::Text(text))) => {
                    let text = text.as_str().trim();
                    if text.is_empty() {
                        continue;
                    }
                    if to_backend.send(BackendMessage::text(text.to_owned())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(BrowserMessage::Close(_))) | None => {
                    let _ = to_backend.send(BackendMessage::Close(None)).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Browser socket failed");
                    let _ = to_backend.send(BackendMessage::Close(None)).await;
                    break;
                }
            },
            frame = from_backend.next() => {
                let raw = match frame {
                    Some(Ok(BackendMessage::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(BackendMessage::Binary(bytes))) => {
                        String::from_utf8_lossy(&bytes).into_owned()
                    }
                    Some(Ok(BackendMessage::Close(_))) | None => {
                        let _ = to_browser.send(BrowserMessage::Close(None)).await;
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "Backend socket failed");
                        let _ = to_browser.send(BrowserMessage::Close(None)).await;
                        break;
                    }
                };
                let message = match ChatMessage::from_frame(&raw) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(error = %e, "Dropping malformed chat frame");
                        continue;
                    }
                };
                let bubble = render_bubble(&message.to_bubble(&viewer_id));
                if to_browser.send(BrowserMessage::Text(bubble.into())).await.is_err() {
                    let _ = to_backend.send(BackendMessage::Close(None)).await;
                    break;
                }
            }
        }
    }

    info!(name: "chat.relay.closed", peer_id = %peer_id, "Chat relay closed");
}
