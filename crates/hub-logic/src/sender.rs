//! Outbound messages to nodes
//!
//! The transport that actually reaches a node lives outside this crate;
//! the rule engine and scheduler only see the [`Sender`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message types the hub sends to nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    /// Ask a node to apply partial device states
    StateChange,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::StateChange => "state-change",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery errors reported by a [`Sender`]
#[derive(Debug, Error)]
pub enum SendError {
    #[error("node {0} is not connected")]
    NotConnected(String),

    #[error("failed to deliver to node {node}: {message}")]
    Delivery { node: String, message: String },
}

/// Best-effort delivery of one message to one node
///
/// Errors are logged by the caller and never retried here.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send_to_id(
        &self,
        node_id: &str,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Result<(), SendError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// A sent message as seen by [`RecordingSender`]
    #[derive(Debug, Clone, PartialEq)]
    pub struct Sent {
        pub node: String,
        pub message_type: MessageType,
        pub payload: serde_json::Value,
    }

    /// Sender that records everything and can refuse some nodes
    #[derive(Default)]
    pub struct RecordingSender {
        sent: Mutex<Vec<Sent>>,
        offline: Mutex<HashSet<String>>,
    }

    impl RecordingSender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_offline(&self, node: &str) {
            self.offline.lock().insert(node.to_string());
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
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
            if self.offline.lock().contains(node_id) {
                return Err(SendError::NotConnected(node_id.to_string()));
            }
            self.sent.lock().push(Sent {
                node: node_id.to_string(),
                message_type,
                payload,
            });
            Ok(())
        }
    }

    #[test]
    fn test_message_type_text() {
        assert_eq!(MessageType::StateChange.to_string(), "state-change");
        assert_eq!(
            serde_json::to_string(&MessageType::StateChange).unwrap(),
            r#""state-change""#
        );
    }
}
