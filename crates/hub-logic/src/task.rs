//! Scheduled tasks

use crate::action::{ActionError, ActionRunner};
use crate::cron::CronJob;
use crate::logic::ReportStateCallback;
use async_trait::async_trait;
use hub_core::device_state;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info};

/// All tasks keyed by uuid
pub type Tasks = BTreeMap<String, Task>;

/// A cron schedule that applies saved states in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,

    #[serde(default)]
    pub uuid: String,

    /// Six-field cron expression with seconds
    #[serde(default)]
    pub when: String,

    /// Saved-state uuids
    #[serde(default)]
    pub actions: Vec<String>,
}

impl Task {
    /// Create an unscheduled task with a fresh uuid
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            when: String::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = when.into();
        self
    }

    pub fn with_action(mut self, saved_state: impl Into<String>) -> Self {
        self.actions.push(saved_state.into());
        self
    }

    /// Apply every saved state in order, stopping at the first missing one
    pub async fn run(&self, runner: &ActionRunner) -> Result<(), ActionError> {
        info!(task = %self.name, uuid = %self.uuid, "Running task");
        for saved_state in &self.actions {
            runner.apply_saved_state(saved_state).await?;
        }
        Ok(())
    }
}

/// Uuids of tasks whose last run failed, shared by every registration
pub(crate) type FailedTasks = Arc<Mutex<HashSet<String>>>;

/// Cron job wrapping one task
pub(crate) struct TaskJob {
    task: Task,
    runner: ActionRunner,
    report_state: Arc<RwLock<Vec<ReportStateCallback>>>,
    failed: FailedTasks,
}

impl TaskJob {
    pub(crate) fn new(
        task: Task,
        runner: ActionRunner,
        report_state: Arc<RwLock<Vec<ReportStateCallback>>>,
        failed: FailedTasks,
    ) -> Self {
        Self {
            task,
            runner,
            report_state,
            failed,
        }
    }

    fn report(&self, message: String) {
        let callbacks = self.report_state.read().clone();
        for callback in &callbacks {
            callback(&self.task.uuid, device_state! { "error" => message.clone() });
        }
    }
}

#[async_trait]
impl CronJob for TaskJob {
    async fn run(&self) {
        match self.task.run(&self.runner).await {
            Ok(()) => {
                let recovered = self.failed.lock().remove(&self.task.uuid);
                if recovered {
                    self.report(String::new());
                }
            }
            Err(e) => {
                error!(task = %self.task.name, error = %e, "Task failed");
                self.failed.lock().insert(self.task.uuid.clone());
                self.report(e.to_string());
            }
        }
    }
}
