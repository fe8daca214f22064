//! Conversation participants, messages and rendered bubbles.

use serde::{Deserialize, Serialize};

use crate::api::UserProfile;

/// A user taking part in a conversation: the viewer or the peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Opaque user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub avatar: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: avatar.into(),
        }
    }

    /// Build the viewer identity from `/users/me`, falling back to `default_avatar`.
    pub fn from_profile(profile: UserProfile, default_avatar: &str) -> Self {
        let avatar = profile
            .profile_image
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| default_avatar.to_string());
        Self {
            id: profile.id,
            name: profile.name,
            avatar,
        }
    }
}

/// A chat message, as served by the history endpoint and the stream.
///
/// Only `sender_id` and `content` are guaranteed; the rest is carried when the
/// backend sends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub content: String,
    /// Opaque; never used for ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatMessage {
    pub fn new(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            sender_id: sender_id.into(),
            receiver_id: None,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Parse one inbound stream frame.
    pub fn from_frame(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }

    /// Which side of the conversation this message belongs to, from the viewer's view.
    pub fn side_for(&self, viewer_id: &str) -> Side {
        if self.sender_id == viewer_id {
            Side::Own
        } else {
            Side::Peer
        }
    }

    pub fn to_bubble(&self, viewer_id: &str) -> Bubble {
        Bubble {
            side: self.side_for(viewer_id),
            text: self.content.clone(),
        }
    }
}

/// Which participant wrote a bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Own,
    Peer,
}

impl Side {
    /// CSS class used by the chat stylesheet.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Own => "me",
            Self::Peer => "them",
        }
    }
}

/// A message as shown in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bubble {
    pub side: Side,
    pub text: String,
}
