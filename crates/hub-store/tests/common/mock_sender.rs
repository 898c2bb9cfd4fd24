//! Sender that records outbound messages instead of delivering them

use async_trait::async_trait;
use hub_logic::{MessageType, SendError, Sender};
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub node: String,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    disconnected: Mutex<HashSet<String>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse deliveries to a node from now on
    pub fn disconnect(&self, node: &str) {
        self.disconnected.lock().insert(node.to_string());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, node: &str) -> Vec<SentMessage> {
        self.sent().into_iter().filter(|m| m.node == node).collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Sender for RecordingSender {
    async fn send_to_id(
        &self,
        node_id: &str,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Result<(), SendError> {
        if self.disconnected.lock().contains(node_id) {
            return Err(SendError::NotConnected(node_id.to_string()));
        }
        self.sent.lock().push(SentMessage {
            node: node_id.to_string(),
            message_type,
            payload,
        });
        Ok(())
    }
}
