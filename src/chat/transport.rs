//! Streaming transport abstraction owned by the session manager.
//!
//! A [`Connector`] opens one [`TransportHandle`] per conversation. Opening never
//! blocks: the handle starts in [`ReadyState::Connecting`] and the connection
//! reports its progress as [`TransportEvent`]s through the [`EventSink`] it was
//! given.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

use super::ChatMessage;
use crate::error::Result;

/// Connection lifecycle, mirroring the browser `WebSocket.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Ready state shared between a handle and its I/O task.
#[derive(Debug, Clone)]
pub struct SharedReadyState(Arc<AtomicU8>);

impl Default for SharedReadyState {
    fn default() -> Self {
        Self(Arc::new(AtomicU8::new(ReadyState::Connecting.as_u8())))
    }
}

impl SharedReadyState {
    pub fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ReadyState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move to `next` unless the state is already `Closing`/`Closed`.
    ///
    /// Returns `false` when the transition was refused.
    pub fn advance(&self, next: ReadyState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < ReadyState::Closing.as_u8()).then_some(next.as_u8())
            })
            .is_ok()
    }
}

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and ready to send.
    Opened,
    /// One inbound text frame, unparsed.
    Frame(String),
    /// Transport-level failure. Logged only.
    Error(String),
    /// The connection ended (either side).
    Closed,
}

/// Payload of a [`SessionEvent`].
#[derive(Debug)]
pub enum EventKind {
    /// Completion of the history read issued by `open`.
    History(Result<Vec<ChatMessage>>),
    /// Progress of the conversation transport.
    Transport(TransportEvent),
}

/// An asynchronous completion, tagged with the generation that issued it.
#[derive(Debug)]
pub struct SessionEvent {
    pub generation: u64,
    pub kind: EventKind,
}

/// Posts events for one generation back to the session manager.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report a transport event. Returns `false` once the manager is gone.
    pub fn transport(&self, event: TransportEvent) -> bool {
        self.emit(EventKind::Transport(event))
    }

    pub(crate) fn history(&self, result: Result<Vec<ChatMessage>>) -> bool {
        self.emit(EventKind::History(result))
    }

    fn emit(&self, kind: EventKind) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }
}

/// Opens streaming transports scoped to a peer.
pub trait Connector {
    type Handle: TransportHandle;

    /// Start connecting to the conversation with `peer_id`.
    ///
    /// Must return immediately; progress is reported through `sink`.
    fn connect(&self, peer_id: &str, sink: EventSink) -> Self::Handle;
}

/// A live (or pending) transport for one conversation.
pub trait TransportHandle {
    fn ready_state(&self) -> ReadyState;

    /// Queue one outbound text frame. Returns `false` unless the state is `Open`.
    fn send(&self, text: &str) -> bool;

    /// Tear the transport down without waiting for acknowledgment. Idempotent.
    fn close(&mut self);
}
