use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use adoppet_client::chat::{
    ChatMessage, ChatSessionManager, Connector, EventKind, EventSink, HistorySource, Participant,
    ReadyState, SessionEvent, SharedReadyState, Side, TransportEvent, TransportHandle,
};
use adoppet_client::render::HtmlChatPane;
use adoppet_client::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Fakes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Link {
    sink: EventSink,
    sent: Arc<Mutex<Vec<String>>>,
}

/// Records connects and closes in one ordered log.
#[derive(Clone, Default)]
struct FakeConnector {
    auto_open: bool,
    log: Arc<Mutex<Vec<String>>>,
    links: Arc<Mutex<Vec<Link>>>,
}

impl FakeConnector {
    fn opening() -> Self {
        Self {
            auto_open: true,
            ..Self::default()
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn link(&self, index: usize) -> Link {
        self.links.lock().unwrap()[index].clone()
    }

    fn last(&self) -> Link {
        self.links.lock().unwrap().last().cloned().unwrap()
    }
}

struct FakeHandle {
    peer_id: String,
    state: SharedReadyState,
    sent: Arc<Mutex<Vec<String>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Connector for FakeConnector {
    type Handle = FakeHandle;

    fn connect(&self, peer_id: &str, sink: EventSink) -> FakeHandle {
        self.log.lock().unwrap().push(format!("connect:{peer_id}"));
        let state = SharedReadyState::default();
        if self.auto_open {
            state.advance(ReadyState::Open);
            sink.transport(TransportEvent::Opened);
        }
        let sent = Arc::new(Mutex::new(Vec::new()));
        self.links.lock().unwrap().push(Link {
            sink,
            sent: Arc::clone(&sent),
        });
        FakeHandle {
            peer_id: peer_id.to_string(),
            state,
            sent,
            log: Arc::clone(&self.log),
        }
    }
}

impl TransportHandle for FakeHandle {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send(&self, text: &str) -> bool {
        if self.state.get() != ReadyState::Open {
            return false;
        }
        self.sent.lock().unwrap().push(text.to_string());
        true
    }

    fn close(&mut self) {
        if matches!(self.state.get(), ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        self.state.set(ReadyState::Closed);
        self.log.lock().unwrap().push(format!("close:{}", self.peer_id));
    }
}

/// Serves canned history; a gated peer's read waits until released.
#[derive(Default)]
struct FakeHistory {
    conversations: Mutex<HashMap<String, Result<Vec<ChatMessage>>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl FakeHistory {
    fn with(self, peer_id: &str, messages: Vec<ChatMessage>) -> Self {
        self.conversations
            .lock()
            .unwrap()
            .insert(peer_id.to_string(), Ok(messages));
        self
    }

    fn failing(self, peer_id: &str) -> Self {
        self.conversations.lock().unwrap().insert(
            peer_id.to_string(),
            Err(Error::Api {
                status: 500,
                message: "boom".into(),
            }),
        );
        self
    }

    fn gate(&self, peer_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(peer_id.to_string(), Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn conversation(&self, peer_id: &str) -> Result<Vec<ChatMessage>> {
        let gate = self.gates.lock().unwrap().get(peer_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.conversations
            .lock()
            .unwrap()
            .remove(peer_id)
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

type Manager = ChatSessionManager<FakeConnector, FakeHistory, HtmlChatPane>;

fn viewer() -> Participant {
    Participant::new("7", "Sam", "/sam.png")
}

fn alex() -> Participant {
    Participant::new("42", "Alex", "/alex.png")
}

fn manager(connector: &FakeConnector, history: FakeHistory) -> Manager {
    ChatSessionManager::new(
        viewer(),
        connector.clone(),
        Arc::new(history),
        HtmlChatPane::new(),
    )
}

/// Let spawned history reads finish, then apply everything queued.
async fn settle(manager: &mut Manager) -> usize {
    let mut applied = 0;
    for _ in 0..10 {
        tokio::task::yield_now().await;
        applied += manager.drain_ready();
    }
    applied
}

fn texts(manager: &Manager) -> Vec<(Side, String)> {
    manager
        .surface()
        .bubbles()
        .iter()
        .map(|b| (b.side, b.text.clone()))
        .collect()
}

fn frame(link: &Link, json: &str) {
    assert!(link.sink.transport(TransportEvent::Frame(json.to_string())));
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_closes_previous_transport_first() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());

    chat.open(alex());
    chat.open(Participant::new("43", "Bea", "/bea.png"));

    assert_eq!(connector.log(), vec!["connect:42", "close:42", "connect:43"]);
    assert_eq!(chat.peer().map(|p| p.id.as_str()), Some("43"));
    assert_eq!(chat.ready_state(), Some(ReadyState::Open));
}

#[tokio::test]
async fn test_open_shows_surface_with_peer() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());

    chat.open(alex());
    assert!(chat.surface().is_visible());
    assert_eq!(chat.surface().peer(), Some(&alex()));
    assert!(chat.surface().render().contains("Alex"));
}

#[tokio::test]
async fn test_close_twice_is_noop() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());

    chat.open(alex());
    chat.close();
    let generation = chat.generation();
    chat.close();

    assert_eq!(connector.log(), vec!["connect:42", "close:42"]);
    assert_eq!(chat.generation(), generation);
    assert!(!chat.is_open());
    assert!(!chat.surface().is_visible());
}

#[tokio::test]
async fn test_close_without_conversation() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());

    chat.close();
    assert!(connector.log().is_empty());
    assert_eq!(chat.generation(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sending
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_blank_never_transmits() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());
    chat.open(alex());
    settle(&mut chat).await;

    assert!(!chat.send(""));
    assert!(!chat.send("   \t\n"));
    assert!(connector.last().sent.lock().unwrap().is_empty());

    assert!(chat.send("  hello there "));
    assert_eq!(*connector.last().sent.lock().unwrap(), vec!["hello there"]);
}

#[tokio::test]
async fn test_send_without_ready_transport() {
    let connector = FakeConnector::default();
    let mut chat = manager(&connector, FakeHistory::default());

    // no conversation at all
    assert!(!chat.send("hi"));

    // connecting, not yet open
    chat.open(alex());
    assert_eq!(chat.ready_state(), Some(ReadyState::Connecting));
    assert!(!chat.send("hi"));
    assert!(connector.last().sent.lock().unwrap().is_empty());

    // closed
    chat.close();
    assert!(!chat.send("hi"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_peer_message_renders_one_bubble() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());

    chat.open(alex());
    settle(&mut chat).await;
    frame(&connector.last(), r#"{"sender_id":"42","content":"hi"}"#);
    settle(&mut chat).await;

    assert_eq!(texts(&chat), vec![(Side::Peer, "hi".to_string())]);
}

#[tokio::test]
async fn test_sides_follow_sender() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());
    chat.open(alex());
    settle(&mut chat).await;

    let link = connector.last();
    frame(&link, r#"{"sender_id":"7","content":"mine"}"#);
    frame(&link, r#"{"sender_id":"42","content":"theirs"}"#);
    settle(&mut chat).await;

    assert_eq!(
        texts(&chat),
        vec![
            (Side::Own, "mine".to_string()),
            (Side::Peer, "theirs".to_string())
        ]
    );
    assert!(chat
        .surface()
        .render()
        .contains(r#"<div class="chat-message me">mine</div>"#));
}

#[tokio::test]
async fn test_malformed_frame_is_dropped() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());
    chat.open(alex());
    settle(&mut chat).await;

    let link = connector.last();
    frame(&link, "not json");
    frame(&link, r#"{"content":"no sender"}"#);
    frame(&link, r#"{"sender_id":"42","content":"still here"}"#);
    settle(&mut chat).await;

    assert_eq!(texts(&chat), vec![(Side::Peer, "still here".to_string())]);
    assert_eq!(chat.ready_state(), Some(ReadyState::Open));
}

#[tokio::test]
async fn test_history_renders_in_order() {
    let connector = FakeConnector::opening();
    let history = FakeHistory::default().with(
        "42",
        vec![
            ChatMessage::new("42", "first"),
            ChatMessage::new("7", "second"),
        ],
    );
    let mut chat = manager(&connector, history);

    chat.open(alex());
    settle(&mut chat).await;

    assert_eq!(
        texts(&chat),
        vec![
            (Side::Peer, "first".to_string()),
            (Side::Own, "second".to_string())
        ]
    );
}

#[tokio::test]
async fn test_history_failure_keeps_stream() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default().failing("42"));

    chat.open(alex());
    settle(&mut chat).await;
    assert!(chat.surface().bubbles().is_empty());

    frame(&connector.last(), r#"{"sender_id":"42","content":"live"}"#);
    settle(&mut chat).await;
    assert_eq!(texts(&chat), vec![(Side::Peer, "live".to_string())]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Generations
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stale_history_never_renders() {
    let connector = FakeConnector::opening();
    let history = FakeHistory::default()
        .with("42", vec![ChatMessage::new("42", "from alex")])
        .with("43", vec![ChatMessage::new("43", "from bea")]);
    let alex_gate = history.gate("42");
    let mut chat = manager(&connector, history);

    chat.open(alex());
    chat.open(Participant::new("43", "Bea", "/bea.png"));
    settle(&mut chat).await;

    // Alex's read completes after the switch
    alex_gate.notify_one();
    settle(&mut chat).await;

    assert_eq!(texts(&chat), vec![(Side::Peer, "from bea".to_string())]);
}

#[tokio::test]
async fn test_stale_transport_events_discarded() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());

    chat.open(alex());
    chat.open(Participant::new("43", "Bea", "/bea.png"));
    settle(&mut chat).await;

    frame(&connector.link(0), r#"{"sender_id":"42","content":"late"}"#);
    assert_eq!(settle(&mut chat).await, 0);
    assert!(chat.surface().bubbles().is_empty());

    let stale = SessionEvent {
        generation: chat.generation() - 1,
        kind: EventKind::Transport(TransportEvent::Opened),
    };
    assert!(!chat.handle_event(stale));
}

#[tokio::test]
async fn test_events_after_close_discarded() {
    let connector = FakeConnector::opening();
    let mut chat = manager(&connector, FakeHistory::default());

    chat.open(alex());
    settle(&mut chat).await;
    chat.close();

    frame(&connector.last(), r#"{"sender_id":"42","content":"late"}"#);
    assert_eq!(settle(&mut chat).await, 0);
    assert!(chat.surface().bubbles().is_empty());
}

#[tokio::test]
async fn test_early_live_messages_not_duplicated() {
    let connector = FakeConnector::opening();
    let history = FakeHistory::default().with(
        "42",
        vec![
            serde_json::from_str(r#"{"id":"m1","sender_id":"42","content":"first"}"#).unwrap(),
            serde_json::from_str(r#"{"id":"m2","sender_id":"7","content":"live"}"#).unwrap(),
        ],
    );
    let gate = history.gate("42");
    let mut chat = manager(&connector, history);

    chat.open(alex());
    let link = connector.last();
    frame(&link, r#"{"id":"m2","sender_id":"7","content":"live"}"#);
    frame(&link, r#"{"sender_id":"42","content":"no id"}"#);
    settle(&mut chat).await;

    // shown right away, before history
    assert_eq!(chat.surface().bubbles().len(), 2);

    gate.notify_one();
    settle(&mut chat).await;

    assert_eq!(
        texts(&chat),
        vec![
            (Side::Peer, "first".to_string()),
            (Side::Own, "live".to_string()),
            (Side::Peer, "no id".to_string()),
        ]
    );

    // a repeat of a rendered id is ignored
    frame(&link, r#"{"id":"m1","sender_id":"42","content":"first"}"#);
    settle(&mut chat).await;
    assert_eq!(chat.surface().bubbles().len(), 3);
}
