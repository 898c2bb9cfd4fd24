//! Rule and task actions and their execution

use crate::savedstate::SavedStateStore;
use crate::sender::{MessageType, Sender};
use hub_core::HumanDuration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One step of an action list
///
/// Persisted as plain text: anything that parses as a duration (`"5s"`,
/// `"1m30s"`) is a sleep, everything else is the uuid of a saved state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Sleep(HumanDuration),
    SavedState(String),
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s.parse::<HumanDuration>() {
            Ok(duration) if !s.is_empty() => Action::Sleep(duration),
            _ => Action::SavedState(s.to_string()),
        }
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Action::from(s))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Sleep(duration) => write!(f, "{}", duration),
            Action::SavedState(uuid) => f.write_str(uuid),
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Action::from(raw.as_str()))
    }
}

/// Errors that abort an action run
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("saved state {0} does not exist")]
    SavedStateNotFound(String),
}

/// How an action run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Applies actions through the node [`Sender`]
///
/// Shared by the rule engine and the scheduler.
#[derive(Clone)]
pub struct ActionRunner {
    saved_states: Arc<SavedStateStore>,
    sender: Arc<dyn Sender>,
}

impl ActionRunner {
    pub fn new(saved_states: Arc<SavedStateStore>, sender: Arc<dyn Sender>) -> Self {
        Self {
            saved_states,
            sender,
        }
    }

    /// Send a saved state, one `state-change` message per node
    ///
    /// A delivery failure to one node is logged and the remaining nodes
    /// still get their message. Returns the number of nodes reached.
    pub async fn apply_saved_state(&self, uuid: &str) -> Result<usize, ActionError> {
        let saved = self
            .saved_states
            .get(uuid)
            .ok_or_else(|| ActionError::SavedStateNotFound(uuid.to_string()))?;

        info!(saved_state = %saved.name, uuid, "Applying saved state");

        let mut delivered = 0;
        for (node, states) in saved.group_by_node() {
            let payload = match serde_json::to_value(&states) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(node = %node, error = %e, "Failed to encode state-change payload");
                    continue;
                }
            };

            match self
                .sender
                .send_to_id(&node, MessageType::StateChange, payload)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => error!(node = %node, error = %e, "Failed to send state-change"),
            }
        }

        Ok(delivered)
    }

    /// Run actions in order until done, cancelled or a step fails
    ///
    /// Cancellation is observed during sleeps and before each saved state.
    pub async fn run(
        &self,
        actions: &[Action],
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ActionError> {
        for action in actions {
            match action {
                Action::Sleep(duration) => {
                    debug!(duration = %duration, "Sleeping");
                    tokio::select! {
                        _ = tokio::time::sleep(duration.as_duration()) => {}
                        _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
                    }
                }
                Action::SavedState(uuid) => {
                    if cancel.is_cancelled() {
                        return Ok(RunOutcome::Cancelled);
                    }
                    self.apply_saved_state(uuid).await?;
                }
            }
        }
        Ok(RunOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::savedstate::SavedState;
    use crate::sender::testing::RecordingSender;
    use hub_core::device_state;
    use hub_storage::Storage;
    use std::time::Duration;

    fn runner_with(sender: Arc<RecordingSender>) -> (ActionRunner, Arc<SavedStateStore>) {
        let saved_states = Arc::new(SavedStateStore::new(Storage::new("/nonexistent")));
        (ActionRunner::new(saved_states.clone(), sender), saved_states)
    }

    fn two_node_scene() -> SavedState {
        SavedState::new("scene")
            .with_device("node1.lamp".parse().unwrap(), device_state! { "on" => true })
            .with_device("node1.tv".parse().unwrap(), device_state! { "on" => false })
            .with_device("node2.heater".parse().unwrap(), device_state! { "temperature" => 20 })
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            "5s".parse::<Action>().unwrap(),
            Action::Sleep("5s".parse().unwrap())
        );
        let uuid = "4b1a4c8e-2f4a-4b7e-9c39-3e5c1f2d6a10";
        assert_eq!(
            uuid.parse::<Action>().unwrap(),
            Action::SavedState(uuid.to_string())
        );
    }

    #[test]
    fn test_action_serde_is_text() {
        let actions: Vec<Action> = serde_json::from_str(r#"["1m30s", "abc"]"#).unwrap();
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], Action::Sleep(_)));
        assert_eq!(actions[1], Action::SavedState("abc".to_string()));
        assert_eq!(serde_json::to_string(&actions).unwrap(), r#"["1m30s","abc"]"#);
    }

    #[tokio::test]
    async fn test_saved_state_sends_one_message_per_node() {
        let sender = Arc::new(RecordingSender::new());
        let (runner, saved_states) = runner_with(sender.clone());
        let scene = two_node_scene();
        let uuid = scene.uuid.clone();
        saved_states.insert(scene);

        let delivered = runner.apply_saved_state(&uuid).await.unwrap();
        assert_eq!(delivered, 2);

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].node, "node1");
        assert_eq!(sent[0].message_type, MessageType::StateChange);
        assert_eq!(
            sent[0].payload,
            serde_json::json!({ "node1.lamp": { "on": true }, "node1.tv": { "on": false } })
        );
        assert_eq!(sent[1].node, "node2");
    }

    #[tokio::test]
    async fn test_send_failure_continues_with_other_nodes() {
        let sender = Arc::new(RecordingSender::new());
        sender.set_offline("node1");
        let (runner, saved_states) = runner_with(sender.clone());
        let scene = two_node_scene();
        let uuid = scene.uuid.clone();
        saved_states.insert(scene);

        let delivered = runner.apply_saved_state(&uuid).await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(sender.sent()[0].node, "node2");
    }

    #[tokio::test]
    async fn test_missing_saved_state_aborts_run() {
        let sender = Arc::new(RecordingSender::new());
        let (runner, saved_states) = runner_with(sender.clone());
        let scene = two_node_scene();
        let uuid = scene.uuid.clone();
        saved_states.insert(scene);

        let actions = vec![Action::SavedState("missing".to_string()), Action::SavedState(uuid)];
        let result = runner.run(&actions, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ActionError::SavedStateNotFound(_))));
        assert_eq!(sender.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep() {
        let sender = Arc::new(RecordingSender::new());
        let (runner, saved_states) = runner_with(sender.clone());
        let scene = two_node_scene();
        let uuid = scene.uuid.clone();
        saved_states.insert(scene);

        let actions = vec![
            Action::Sleep(HumanDuration::from_duration(Duration::from_secs(10))),
            Action::SavedState(uuid),
        ];
        let cancel = CancellationToken::new();

        let run = {
            let cancel = cancel.clone();
            tokio::spawn(async move { runner.run(&actions, &cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(sender.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_after_sleep() {
        let sender = Arc::new(RecordingSender::new());
        let (runner, saved_states) = runner_with(sender.clone());
        let scene = two_node_scene();
        let uuid = scene.uuid.clone();
        saved_states.insert(scene);

        let actions = vec!["2s".parse().unwrap(), Action::SavedState(uuid)];
        let outcome = runner.run(&actions, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(sender.count(), 2);
    }
}
