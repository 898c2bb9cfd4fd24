//! Rule definitions and their runtime state

use crate::action::Action;
use hub_core::HumanDuration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// All rule definitions keyed by uuid
pub type Rules = BTreeMap<String, Rule>;

fn default_enabled() -> bool {
    true
}

/// A persisted rule definition
///
/// `for` debounces activation: the expression must stay true for that long
/// before the actions run. A zero duration fires on the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,

    #[serde(default)]
    pub uuid: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub expression: String,

    #[serde(rename = "for", default)]
    pub for_duration: HumanDuration,

    #[serde(default)]
    pub actions: Vec<Action>,

    /// Notification destinations triggered when the actions complete
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl Rule {
    /// Create an enabled rule with a fresh uuid
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            enabled: true,
            expression: expression.into(),
            for_duration: HumanDuration::zero(),
            actions: Vec::new(),
            destinations: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn with_for(mut self, duration: HumanDuration) -> Self {
        self.for_duration = duration;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destinations.push(destination.into());
        self
    }

    pub fn is_debounced(&self) -> bool {
        !self.for_duration.is_zero()
    }
}

/// Point-in-time view of a rule's runtime flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleStatus {
    pub active: bool,
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Default)]
struct Runtime {
    active: bool,
    pending: bool,
    error: Option<String>,
    timer: Option<CancellationToken>,
    run: Option<CancellationToken>,
}

/// A rule definition together with its runtime state
///
/// Instances are replaced wholesale when the rule set changes; timers and
/// runs hold their own `Arc` and notice the replacement by identity.
pub struct RuleInstance {
    rule: Rule,
    runtime: Mutex<Runtime>,
}

impl RuleInstance {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            runtime: Mutex::new(Runtime::default()),
        }
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn uuid(&self) -> &str {
        &self.rule.uuid
    }

    pub fn is_active(&self) -> bool {
        self.runtime.lock().active
    }

    pub fn is_pending(&self) -> bool {
        self.runtime.lock().pending
    }

    pub fn status(&self) -> RuleStatus {
        let runtime = self.runtime.lock();
        RuleStatus {
            active: runtime.active,
            pending: runtime.pending,
            error: runtime.error.clone(),
        }
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.runtime.lock().active = active;
    }

    pub(crate) fn set_pending(&self, pending: bool) {
        self.runtime.lock().pending = pending;
    }

    /// Record an evaluation error; returns true when it differs from the last one
    pub(crate) fn set_error(&self, error: String) -> bool {
        let mut runtime = self.runtime.lock();
        if runtime.error.as_deref() == Some(error.as_str()) {
            return false;
        }
        runtime.error = Some(error);
        true
    }

    /// Clear the evaluation error; returns true if there was one
    pub(crate) fn clear_error(&self) -> bool {
        self.runtime.lock().error.take().is_some()
    }

    /// Install a new debounce timer token, cancelling the previous one
    pub(crate) fn replace_timer(&self, token: CancellationToken) {
        if let Some(previous) = self.runtime.lock().timer.replace(token) {
            previous.cancel();
        }
    }

    pub(crate) fn cancel_timer(&self) {
        if let Some(timer) = self.runtime.lock().timer.take() {
            timer.cancel();
        }
    }

    /// Install the token of a new action run, cancelling any run still in flight
    pub(crate) fn start_run(&self, token: CancellationToken) {
        if let Some(previous) = self.runtime.lock().run.replace(token) {
            previous.cancel();
        }
    }

    /// Cancel the in-flight action run, if any
    pub fn cancel(&self) {
        if let Some(run) = self.runtime.lock().run.take() {
            run.cancel();
        }
    }
}
