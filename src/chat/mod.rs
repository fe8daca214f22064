//! Direct-message conversations.
//!
//! # Architecture
//!
//! - [`ChatSessionManager`]: owns the one active conversation (peer, transport,
//!   hydration state) and renders it into a [`ChatSurface`]
//! - [`Connector`] / [`TransportHandle`]: the streaming transport seam, with
//!   [`WsConnector`] as the WebSocket implementation
//! - [`HistorySource`]: point-in-time history reads, implemented by
//!   [`crate::api::Client`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use adoppet_client::api::Client;
//! use adoppet_client::chat::{ChatSessionManager, Participant, WsConnector};
//! use adoppet_client::render::HtmlChatPane;
//!
//! # async fn example() -> adoppet_client::Result<()> {
//! let client = Client::new("http://localhost:8000")?.with_access_token("token");
//! let viewer = Participant::new("7", "Sam", "/static/img/default-avatar.svg");
//!
//! let mut chat = ChatSessionManager::new(
//!     viewer,
//!     WsConnector::new(client.clone()),
//!     Arc::new(client),
//!     HtmlChatPane::new(),
//! );
//! chat.open(Participant::new("42", "Alex", "/static/img/alex.png"));
//! while chat.pump().await {
//!     println!("{}", chat.surface().render());
//! }
//! # Ok(())
//! # }
//! ```

mod history;
mod message;
mod session;
mod surface;
pub mod transport;
mod ws;

pub use history::HistorySource;
pub use message::{Bubble, ChatMessage, Participant, Side};
pub use session::ChatSessionManager;
pub use surface::ChatSurface;
pub use transport::{
    Connector, EventKind, EventSink, ReadyState, SessionEvent, SharedReadyState, TransportEvent,
    TransportHandle,
};
pub use ws::{WsConnector, WsHandle};
