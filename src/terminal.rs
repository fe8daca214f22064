//! Line-oriented chat surface for the terminal front end.

use std::io::Write;

use crate::chat::{Bubble, ChatSurface, Participant, Side};

/// Prints the conversation as it happens, one line per bubble.
#[derive(Debug)]
pub struct TerminalSurface<W: Write> {
    out: W,
    peer_name: String,
    visible: bool,
    printed: usize,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            peer_name: String::new(),
            visible: false,
            printed: 0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %e, "Could not write to terminal");
        }
    }
}

impl<W: Write> ChatSurface for TerminalSurface<W> {
    fn show(&mut self, peer: &Participant) {
        self.visible = true;
        self.peer_name.clone_from(&peer.name);
        self.printed = 0;
        self.line(&format!("── chat with {} ({}) ──", peer.name, peer.id));
    }

    fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            self.line("── chat closed ──");
        }
    }

    // Lines already printed cannot be taken back; mark the redraw instead.
    fn clear(&mut self) {
        if self.printed > 0 {
            self.printed = 0;
            self.line("── history ──");
        }
    }

    fn append(&mut self, bubble: &Bubble) {
        let who = match bubble.side {
            Side::Own => "you".to_string(),
            Side::Peer => self.peer_name.clone(),
        };
        self.printed += 1;
        self.line(&format!("{who}: {}", bubble.text));
    }
}
