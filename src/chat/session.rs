//! Lifecycle of the single active direct-message conversation.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::history::HistorySource;
use super::surface::ChatSurface;
use super::transport::{
    Connector, EventKind, EventSink, ReadyState, SessionEvent, TransportEvent, TransportHandle,
};
use super::{ChatMessage, Participant};

/// Owns the viewer identity, at most one open conversation, and the surface
/// it renders into.
///
/// History reads and transport callbacks complete asynchronously and come
/// back as [`SessionEvent`]s; drive the manager by feeding
/// [`next_event`](Self::next_event) into [`handle_event`](Self::handle_event)
/// (or call [`pump`](Self::pump)). Each `open` and each `close` that tears a
/// conversation down starts a new generation, and events from older
/// generations are discarded.
pub struct ChatSessionManager<C: Connector, H, S> {
    viewer: Participant,
    connector: C,
    history: Arc<H>,
    surface: S,
    generation: u64,
    active: Option<Conversation<C::Handle>>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<C: Connector, H, S> std::fmt::Debug for ChatSessionManager<C, H, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSessionManager")
            .field("viewer", &self.viewer.id)
            .field("generation", &self.generation)
            .field("peer", &self.active.as_ref().map(|c| c.peer.id.as_str()))
            .finish_non_exhaustive()
    }
}

struct Conversation<T> {
    peer: Participant,
    transport: T,
    hydrated: bool,
    /// Live messages that arrived before history did.
    early: Vec<ChatMessage>,
    rendered_ids: HashSet<String>,
}

impl<T> Conversation<T> {
    fn new(peer: Participant, transport: T) -> Self {
        Self {
            peer,
            transport,
            hydrated: false,
            early: Vec::new(),
            rendered_ids: HashSet::new(),
        }
    }

    /// Append `message` unless a message with the same id is already on screen.
    fn render<S: ChatSurface>(
        &mut self,
        surface: &mut S,
        viewer_id: &str,
        message: &ChatMessage,
    ) -> bool {
        if let Some(id) = &message.id
            && !self.rendered_ids.insert(id.clone())
        {
            debug!(message_id = %id, "Skipping message already rendered");
            return false;
        }
        surface.append(&message.to_bubble(viewer_id));
        true
    }
}

impl<C, H, S> ChatSessionManager<C, H, S>
where
    C: Connector,
    H: HistorySource,
    S: ChatSurface,
{
    pub fn new(viewer: Participant, connector: C, history: Arc<H>, surface: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            viewer,
            connector,
            history,
            surface,
            generation: 0,
            active: None,
            tx,
            rx,
        }
    }

    pub fn viewer(&self) -> &Participant {
        &self.viewer
    }

    /// The peer of the open conversation.
    pub fn peer(&self) -> Option<&Participant> {
        self.active.as_ref().map(|c| &c.peer)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Ready state of the open conversation's transport.
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.active.as_ref().map(|c| c.transport.ready_state())
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Switch to the conversation with `peer`.
    ///
    /// The previous transport, if any, is closed before the new one is
    /// created. History and the new transport are requested independently.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime: the history request is
    /// spawned onto the current runtime.
    pub fn open(&mut self, peer: Participant) {
        if let Some(mut previous) = self.active.take() {
            previous.transport.close();
            debug!(peer_id = %previous.peer.id, "Closed previous conversation transport");
        }

        self.generation += 1;
        let generation = self.generation;

        self.surface.show(&peer);
        self.surface.clear();

        let sink = EventSink::new(generation, self.tx.clone());

        let history = Arc::clone(&self.history);
        let history_sink = sink.clone();
        let peer_id = peer.id.clone();
        tokio::spawn(async move {
            let result = history.conversation(&peer_id).await;
            history_sink.history(result);
        });

        let transport = self.connector.connect(&peer.id, sink);

        info!(
            name: "chat.session.opened",
            peer_id = %peer.id,
            peer_name = %peer.name,
            generation,
            "Conversation opened"
        );
        self.active = Some(Conversation::new(peer, transport));
    }

    /// Hide the surface and release the transport. No-op without a conversation.
    pub fn close(&mut self) {
        let Some(mut conversation) = self.active.take() else {
            return;
        };
        self.surface.hide();
        conversation.transport.close();
        self.generation += 1;
        info!(
            name: "chat.session.closed",
            peer_id = %conversation.peer.id,
            "Conversation closed"
        );
    }

    /// Send trimmed `text` on the open transport.
    ///
    /// Returns `false` (and sends nothing) for blank text, without a
    /// conversation, or while the transport is not `Open`.
    pub fn send(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let Some(conversation) = &self.active else {
            debug!("Send ignored: no open conversation");
            return false;
        };
        let state = conversation.transport.ready_state();
        if state != ReadyState::Open {
            debug!(?state, "Send ignored: transport not ready");
            return false;
        }
        conversation.transport.send(text)
    }

    /// Wait for the next asynchronous completion.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Wait for one event and apply it. Returns whether it was applied.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    /// Apply every event that is already queued. Returns how many were applied.
    pub fn drain_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            if self.handle_event(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one event. Events from another generation are discarded.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        let Self {
            viewer,
            surface,
            generation,
            active,
            ..
        } = self;

        let conversation = match active.as_mut() {
            Some(conversation) if event.generation == *generation => conversation,
            _ => {
                debug!(
                    event_generation = event.generation,
                    current_generation = *generation,
                    "Discarding stale session event"
                );
                return false;
            }
        };

        match event.kind {
            EventKind::History(Ok(messages)) => {
                surface.clear();
                conversation.rendered_ids.clear();
                for message in &messages {
                    conversation.render(surface, &viewer.id, message);
                }
                for message in std::mem::take(&mut conversation.early) {
                    conversation.render(surface, &viewer.id, &message);
                }
                conversation.hydrated = true;
                debug!(
                    peer_id = %conversation.peer.id,
                    count = messages.len(),
                    "Chat history rendered"
                );
            }
            EventKind::History(Err(e)) => {
                warn!(peer_id = %conversation.peer.id, error = %e, "Could not load chat history");
                conversation.early.clear();
                conversation.hydrated = true;
            }
            EventKind::Transport(TransportEvent::Frame(frame)) => {
                match ChatMessage::from_frame(&frame) {
                    Ok(message) => {
                        if !conversation.hydrated {
                            conversation.early.push(message.clone());
                        }
                        conversation.render(surface, &viewer.id, &message);
                    }
                    Err(e) => {
                        warn!(error = %e, %frame, "Dropping malformed chat frame");
                    }
                }
            }
            EventKind::Transport(TransportEvent::Opened) => {
                info!(name: "chat.socket.opened", peer_id = %conversation.peer.id, "Chat socket open");
            }
            EventKind::Transport(TransportEvent::Closed) => {
                info!(name: "chat.socket.closed", peer_id = %conversation.peer.id, "Chat socket closed");
            }
            EventKind::Transport(TransportEvent::Error(e)) => {
                error!(peer_id = %conversation.peer.id, error = %e, "Chat socket error");
            }
        }
        true
    }
}
