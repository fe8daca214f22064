//! The view a conversation renders into.

use super::{Bubble, Participant};

/// A chat window: header with the peer's name and avatar, a message list,
/// and close controls.
pub trait ChatSurface {
    /// Make the window visible with `peer` in the header.
    fn show(&mut self, peer: &Participant);

    fn hide(&mut self);

    /// Remove every bubble from the list.
    fn clear(&mut self);

    /// Add one bubble at the end of the list.
    fn append(&mut self, bubble: &Bubble);
}

impl<S: ChatSurface + ?Sized> ChatSurface for Box<S> {
    fn show(&mut self, peer: &Participant) {
        (**self).show(peer);
    }

    fn hide(&mut self) {
        (**self).hide();
    }

    fn clear(&mut self) {
        (**self).clear();
    }

    fn append(&mut self, bubble: &Bubble) {
        (**self).append(bubble);
    }
}
