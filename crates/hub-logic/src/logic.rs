//! The rule engine
//!
//! All device updates and rule-set changes are jobs on one queue, consumed by
//! a single worker. After every job the worker evaluates every enabled rule,
//! so rule state only ever changes on that worker. Debounce timers and
//! action runs are separate tasks; an expired timer comes back through the
//! queue instead of touching rule state directly.

use crate::action::{ActionRunner, RunOutcome};
use crate::rule::{Rule, RuleInstance, RuleStatus, Rules};
use crate::savedstate::SavedStateStore;
use crate::sender::Sender;
use hub_core::{device_state, Device, DeviceList, DeviceState};
use hub_expression::{EvalSnapshot, ExpressionEvaluator, JinjaEvaluator};
use hub_storage::{Storage, StorageResult, RULES_FILE};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Receives `(uuid, partial state)` whenever a rule's externally visible
/// state changes
pub type ReportStateCallback = Arc<dyn Fn(&str, DeviceState) + Send + Sync>;

/// Receives `(destination uuid, rule name)` when a rule's actions complete
pub type TriggerDestinationCallback = Arc<dyn Fn(&str, &str) -> anyhow::Result<()> + Send + Sync>;

type Job = Box<dyn FnOnce(&Arc<Engine>) + Send>;

/// Handle to the rule engine
pub struct Logic {
    engine: Arc<Engine>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Engine {
    devices: DeviceList,
    rules: RwLock<HashMap<String, Arc<RuleInstance>>>,
    runner: ActionRunner,
    evaluator: Arc<dyn ExpressionEvaluator>,
    storage: Storage,
    jobs: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
    report_state: RwLock<Vec<ReportStateCallback>>,
    trigger_destination: RwLock<Vec<TriggerDestinationCallback>>,
}

impl Logic {
    /// Create an engine using the Jinja expression evaluator
    pub fn new(saved_states: Arc<SavedStateStore>, sender: Arc<dyn Sender>, storage: Storage) -> Self {
        Self::with_evaluator(saved_states, sender, Arc::new(JinjaEvaluator::new()), storage)
    }

    pub fn with_evaluator(
        saved_states: Arc<SavedStateStore>,
        sender: Arc<dyn Sender>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        storage: Storage,
    ) -> Self {
        let (jobs, receiver) = mpsc::unbounded_channel();
        let engine = Engine {
            devices: DeviceList::new(),
            rules: RwLock::new(HashMap::new()),
            runner: ActionRunner::new(saved_states, sender),
            evaluator,
            storage,
            jobs,
            shutdown: CancellationToken::new(),
            report_state: RwLock::new(Vec::new()),
            trigger_destination: RwLock::new(Vec::new()),
        };

        Self {
            engine: Arc::new(engine),
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
        }
    }

    /// Start the worker; it stops when `ctx` is cancelled
    pub fn start(&self, ctx: CancellationToken) {
        let Some(mut receiver) = self.receiver.lock().take() else {
            warn!("Logic worker already started");
            return;
        };

        let engine = Arc::clone(&self.engine);
        let handle = tokio::spawn(async move {
            info!("Logic worker started");
            loop {
                tokio::select! {
                    job = receiver.recv() => {
                        let Some(job) = job else { break };
                        job(&engine);
                        engine.evaluate_rules();
                    }
                    _ = ctx.cancelled() => break,
                }
            }
            engine.shutdown.cancel();
            info!("Logic worker stopped");
        });

        *self.worker.lock() = Some(handle);
    }

    /// Wait for the worker to exit after its context was cancelled
    pub async fn wait(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Logic worker panicked");
            }
        }
    }

    /// Wait until every job queued before this call has been processed
    ///
    /// Before [`Logic::start`] the queued jobs are applied right here, each
    /// followed by an evaluation pass, exactly as the worker would.
    pub async fn flush(&self) {
        {
            let mut receiver = self.receiver.lock();
            if let Some(receiver) = receiver.as_mut() {
                while let Ok(job) = receiver.try_recv() {
                    job(&self.engine);
                    self.engine.evaluate_rules();
                }
                return;
            }
        }
        let (done, wait) = oneshot::channel();
        self.engine.enqueue(Box::new(move |_: &Arc<Engine>| {
            let _ = done.send(());
        }));
        let _ = wait.await;
    }

    /// Queue a device report; rules are re-evaluated once it is merged
    pub fn update_device(&self, device: Device) {
        self.engine.enqueue(Box::new(move |engine: &Arc<Engine>| {
            engine.devices.upsert(&device);
        }));
    }

    /// Queue a replacement of the whole rule set
    ///
    /// A rule whose definition is unchanged keeps its instance, so an active
    /// rule does not run its actions again. Changed and new rules start
    /// inactive; timers and runs of replaced instances finish on their own
    /// and no longer affect rule state.
    pub fn set_rules(&self, rules: Rules) {
        self.engine.enqueue(Box::new(move |engine: &Arc<Engine>| {
            let mut current = engine.rules.write();
            let instances: HashMap<String, Arc<RuleInstance>> = rules
                .into_iter()
                .map(|(key, mut rule)| {
                    if rule.uuid.is_empty() {
                        rule.uuid = key;
                    }
                    let instance = reuse_or_create(&current, rule);
                    (instance.uuid().to_string(), instance)
                })
                .collect();
            *current = instances;
            debug!(count = current.len(), "Rules replaced");
        }));
    }

    /// Queue the addition of one rule, generating a uuid when missing
    pub fn add_rule(&self, mut rule: Rule) -> String {
        if rule.uuid.is_empty() {
            rule.uuid = uuid::Uuid::new_v4().to_string();
        }
        let uuid = rule.uuid.clone();
        self.engine.enqueue(Box::new(move |engine: &Arc<Engine>| {
            let mut current = engine.rules.write();
            let instance = reuse_or_create(&current, rule);
            current.insert(instance.uuid().to_string(), instance);
        }));
        uuid
    }

    /// Current rule definitions
    pub fn rules(&self) -> Rules {
        self.engine
            .rules
            .read()
            .iter()
            .map(|(uuid, instance)| (uuid.clone(), instance.rule().clone()))
            .collect()
    }

    /// Runtime flags of one rule
    pub fn rule_status(&self, uuid: &str) -> Option<RuleStatus> {
        self.engine.rules.read().get(uuid).map(|instance| instance.status())
    }

    /// Devices as last merged by the worker
    pub fn devices(&self) -> &DeviceList {
        &self.engine.devices
    }

    pub fn on_report_state(&self, callback: ReportStateCallback) {
        self.engine.report_state.write().push(callback);
    }

    pub fn on_trigger_destination(&self, callback: TriggerDestinationCallback) {
        self.engine.trigger_destination.write().push(callback);
    }

    /// Persist rule definitions to `rules.json`
    pub async fn save(&self) -> StorageResult<()> {
        self.flush().await;
        let rules = self.rules();
        self.engine.storage.save(RULES_FILE, &rules).await?;
        debug!(count = rules.len(), "Saved rules");
        Ok(())
    }

    /// Load `rules.json` and queue it as the new rule set
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(rules) = self.engine.storage.load::<Rules>(RULES_FILE).await? {
            info!(count = rules.len(), "Loaded rules");
            self.set_rules(rules);
        }
        Ok(())
    }
}

/// Keep the running instance when the definition did not change
fn reuse_or_create(current: &HashMap<String, Arc<RuleInstance>>, rule: Rule) -> Arc<RuleInstance> {
    match current.get(&rule.uuid) {
        Some(existing) if existing.rule() == &rule => Arc::clone(existing),
        _ => Arc::new(RuleInstance::new(rule)),
    }
}

impl Engine {
    fn enqueue(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            debug!("Logic worker gone, dropping job");
        }
    }

    fn report(&self, uuid: &str, state: DeviceState) {
        let callbacks = self.report_state.read().clone();
        for callback in &callbacks {
            callback(uuid, state.clone());
        }
    }

    fn rule_activity(&self) -> BTreeMap<String, bool> {
        self.rules
            .read()
            .iter()
            .map(|(uuid, instance)| (uuid.clone(), instance.is_active()))
            .collect()
    }

    fn is_current(&self, rule: &Arc<RuleInstance>) -> bool {
        self.rules
            .read()
            .get(rule.uuid())
            .is_some_and(|current| Arc::ptr_eq(current, rule))
    }

    /// Evaluate a rule; errors are reported and count as false
    fn evaluate(&self, rule: &RuleInstance, snapshot: &EvalSnapshot) -> bool {
        match self.evaluator.evaluate(&rule.rule().expression, snapshot) {
            Ok(result) => {
                if rule.clear_error() {
                    self.report(rule.uuid(), device_state! { "error" => "" });
                }
                result
            }
            Err(e) => {
                warn!(rule = %rule.rule().name, uuid = rule.uuid(), error = %e, "Error evaluating rule");
                let message = e.to_string();
                if rule.set_error(message.clone()) {
                    self.report(rule.uuid(), device_state! { "error" => message });
                }
                false
            }
        }
    }

    fn evaluate_rules(self: &Arc<Self>) {
        let mut rules: Vec<Arc<RuleInstance>> = self.rules.read().values().cloned().collect();
        if rules.is_empty() {
            return;
        }
        rules.sort_by(|a, b| a.uuid().cmp(b.uuid()));

        let mut snapshot = EvalSnapshot::from_devices(&self.devices);
        for rule in &rules {
            if !rule.rule().enabled {
                continue;
            }
            // Later rules see activity changes made by earlier ones
            snapshot.rules = self.rule_activity();
            let result = self.evaluate(rule, &snapshot);

            if rule.rule().is_debounced() {
                self.apply_debounced(rule, result);
            } else {
                self.apply_instant(rule, result);
            }
        }
    }

    fn apply_instant(self: &Arc<Self>, rule: &Arc<RuleInstance>, result: bool) {
        if result == rule.is_active() {
            return;
        }
        rule.set_active(result);
        self.report(rule.uuid(), device_state! { "active" => result });

        if result {
            info!(rule = %rule.rule().name, "Rule active, running actions");
            self.run_actions(rule);
        } else {
            debug!(rule = %rule.rule().name, "Rule inactive");
            rule.cancel();
        }
    }

    fn apply_debounced(self: &Arc<Self>, rule: &Arc<RuleInstance>, result: bool) {
        if result == rule.is_pending() {
            return;
        }
        rule.set_pending(result);

        if result {
            debug!(rule = %rule.rule().name, for_duration = %rule.rule().for_duration, "Rule pending");
            self.report(rule.uuid(), device_state! { "pending" => true });
            self.start_timer(rule);
        } else {
            debug!(rule = %rule.rule().name, "Rule no longer pending");
            rule.cancel_timer();
            rule.cancel();
            rule.set_active(false);
            self.report(rule.uuid(), device_state! { "pending" => false, "active" => false });
        }
    }

    fn start_timer(self: &Arc<Self>, rule: &Arc<RuleInstance>) {
        let token = self.shutdown.child_token();
        rule.replace_timer(token.clone());

        let delay = rule.rule().for_duration.as_duration();
        let rule = Arc::clone(rule);
        let jobs = self.jobs.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {
                    trace!(uuid = rule.uuid(), "Debounce timer cancelled");
                    return;
                }
            }
            let job: Job = Box::new(move |engine: &Arc<Engine>| engine.commit_pending(&rule, &token));
            if jobs.send(job).is_err() {
                debug!("Logic worker gone, dropping expired timer");
            }
        });
    }

    /// An expired debounce timer, running on the worker
    fn commit_pending(self: &Arc<Self>, rule: &Arc<RuleInstance>, token: &CancellationToken) {
        if token.is_cancelled() || !rule.is_pending() {
            return;
        }
        if !self.is_current(rule) {
            debug!(uuid = rule.uuid(), "Rule replaced, ignoring expired timer");
            return;
        }

        let snapshot = EvalSnapshot::from_devices(&self.devices).with_rules(self.rule_activity());
        if !self.evaluate(rule, &snapshot) {
            debug!(rule = %rule.rule().name, "Rule no longer true after debounce");
            return;
        }
        if rule.is_active() {
            return;
        }

        rule.set_active(true);
        self.report(rule.uuid(), device_state! { "active" => true });
        info!(rule = %rule.rule().name, "Rule active, running actions");
        self.run_actions(rule);
    }

    fn run_actions(&self, rule: &Arc<RuleInstance>) {
        let token = self.shutdown.child_token();
        rule.start_run(token.clone());

        let runner = self.runner.clone();
        let callbacks = self.trigger_destination.read().clone();
        let rule = Arc::clone(rule);

        tokio::spawn(async move {
            let definition = rule.rule();
            match runner.run(&definition.actions, &token).await {
                Ok(RunOutcome::Completed) => {
                    for destination in &definition.destinations {
                        info!(rule = %definition.name, destination = %destination, "Triggering destination");
                        for callback in &callbacks {
                            if let Err(e) = callback(destination, &definition.name) {
                                error!(destination = %destination, error = %e, "Failed to trigger destination");
                            }
                        }
                    }
                }
                Ok(RunOutcome::Cancelled) => {
                    debug!(rule = %definition.name, "Action run cancelled");
                }
                Err(e) => {
                    error!(rule = %definition.name, error = %e, "Action run aborted");
                }
            }
        });
    }
}
