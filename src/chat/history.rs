//! Point-in-time conversation history reads.

use async_trait::async_trait;

use super::ChatMessage;
use crate::api::Client;
use crate::error::Result;

/// Reads the stored history of a conversation.
#[async_trait]
pub trait HistorySource: Send + Sync + 'static {
    /// Messages exchanged with `peer_id`, oldest first.
    async fn conversation(&self, peer_id: &str) -> Result<Vec<ChatMessage>>;
}

#[async_trait]
impl HistorySource for Client {
    async fn conversation(&self, peer_id: &str) -> Result<Vec<ChatMessage>> {
        self.chat().messages(peer_id).await
    }
}
