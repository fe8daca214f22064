//! Chat window rendered as an HTML fragment.

use std::fmt::Write as _;

use super::{encode_segment, escape_html};
use crate::chat::{Bubble, ChatSurface, Participant};

/// Render one message bubble.
pub fn render_bubble(bubble: &Bubble) -> String {
    format!(
        r#"<div class="chat-message {}">{}</div>"#,
        bubble.side.css_class(),
        escape_html(&bubble.text)
    )
}

/// In-memory chat window: keeps the state a browser would keep in the DOM
/// and renders it as the chat modal fragment.
#[derive(Debug, Clone, Default)]
pub struct HtmlChatPane {
    visible: bool,
    peer: Option<Participant>,
    bubbles: Vec<Bubble>,
}

impl HtmlChatPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn peer(&self) -> Option<&Participant> {
        self.peer.as_ref()
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    /// Render the overlay and modal. Hidden panes keep the `hidden` class.
    ///
    /// Once a peer is shown the modal carries `data-socket`, the relay path
    /// `/static/chat.js` connects to.
    pub fn render(&self) -> String {
        let hidden = if self.visible { "" } else { " hidden" };
        let socket = self
            .peer
            .as_ref()
            .map(|p| {
                format!(
                    r#" data-socket="/chat/ws/{}""#,
                    escape_html(&encode_segment(&p.id))
                )
            })
            .unwrap_or_default();
        let (name, avatar) = self
            .peer
            .as_ref()
            .map(|p| (escape_html(&p.name), escape_html(&p.avatar)))
            .unwrap_or_default();

        let mut messages = String::new();
        for bubble in &self.bubbles {
            let _ = writeln!(messages, "        {}", render_bubble(bubble));
        }

        format!(
            r#"<div id="chat-overlay" class="chat-overlay{hidden}"></div>
<div id="chat-modal" class="chat-modal{hidden}"{socket}>
    <div class="chat-header">
        <img id="chat-user-avatar" src="{avatar}" class="chat-avatar">
        <span id="chat-user-name">{name}</span>
        <button id="chat-close-btn" class="chat-close">&times;</button>
    </div>
    <div id="chat-messages" class="chat-messages">
{messages}    </div>
    <form id="chat-form" class="chat-form">
        <input id="chat-input" name="message" autocomplete="off" placeholder="Write a message...">
        <button type="submit">Send</button>
    </form>
</div>"#
        )
    }
}

impl ChatSurface for HtmlChatPane {
    fn show(&mut self, peer: &Participant) {
        self.visible = true;
        self.peer = Some(peer.clone());
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn clear(&mut self) {
        self.bubbles.clear();
    }

    fn append(&mut self, bubble: &Bubble) {
        self.bubbles.push(bubble.clone());
    }
}
