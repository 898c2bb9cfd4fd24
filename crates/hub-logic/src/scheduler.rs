//! Cron-driven replay of saved states

use crate::action::{ActionError, ActionRunner};
use crate::cron::{self, Cron, CronEntry, CronError, JobId};
use crate::logic::ReportStateCallback;
use crate::savedstate::SavedStateStore;
use crate::sender::Sender;
use crate::task::{FailedTasks, Task, TaskJob, Tasks};
use hub_storage::{Storage, StorageResult, SCHEDULE_FILE};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

struct Scheduled {
    task: Task,
    job: Option<JobId>,
}

/// Owns the tasks and keeps one cron registration per scheduled task
pub struct Scheduler {
    tasks: RwLock<BTreeMap<String, Scheduled>>,
    cron: Cron,
    runner: ActionRunner,
    storage: Storage,
    report_state: Arc<RwLock<Vec<ReportStateCallback>>>,
    failed: FailedTasks,
}

impl Scheduler {
    pub fn new(saved_states: Arc<SavedStateStore>, sender: Arc<dyn Sender>, storage: Storage) -> Self {
        Self {
            tasks: RwLock::new(BTreeMap::new()),
            cron: Cron::new(),
            runner: ActionRunner::new(saved_states, sender),
            storage,
            report_state: Arc::new(RwLock::new(Vec::new())),
            failed: FailedTasks::default(),
        }
    }

    pub fn on_report_state(&self, callback: ReportStateCallback) {
        self.report_state.write().push(callback);
    }

    /// Start firing scheduled tasks
    pub fn start(&self) {
        info!(tasks = self.cron.len(), "Scheduler started");
        self.cron.start();
    }

    /// Stop firing; tasks and registrations are kept
    pub fn stop(&self) {
        self.cron.stop();
        info!("Scheduler stopped");
    }

    /// Copy of every task
    pub fn tasks(&self) -> Tasks {
        self.tasks
            .read()
            .iter()
            .map(|(uuid, scheduled)| (uuid.clone(), scheduled.task.clone()))
            .collect()
    }

    pub fn get_task(&self, uuid: &str) -> Option<Task> {
        self.tasks.read().get(uuid).map(|scheduled| scheduled.task.clone())
    }

    /// Registered cron entries
    pub fn entries(&self) -> Vec<CronEntry> {
        self.cron.entries()
    }

    /// Create an unscheduled task
    pub fn add_task(&self, name: impl Into<String>) -> Task {
        let task = Task::new(name);
        self.tasks.write().insert(
            task.uuid.clone(),
            Scheduled {
                task: task.clone(),
                job: None,
            },
        );
        task
    }

    /// Insert or replace one task and (re)register its schedule
    pub fn set_task(&self, task: Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write();
        if let Some(previous) = tasks.remove(&task.uuid) {
            if let Some(job) = previous.job {
                self.cron.remove_job(job);
            }
        }

        let job = self.register(&task)?;
        tasks.insert(task.uuid.clone(), Scheduled { task, job });
        Ok(())
    }

    /// Set the cron expression of a task and re-register it
    pub fn schedule_task(&self, uuid: &str, when: &str) -> SchedulerResult<()> {
        cron::parse(when)?;
        let mut task = self
            .get_task(uuid)
            .ok_or_else(|| SchedulerError::TaskNotFound(uuid.to_string()))?;
        task.when = when.to_string();
        self.set_task(task)
    }

    /// Remove a task and its registration
    pub fn remove_task(&self, uuid: &str) -> Option<Task> {
        let scheduled = self.tasks.write().remove(uuid)?;
        if let Some(job) = scheduled.job {
            self.cron.remove_job(job);
        }
        self.failed.lock().remove(uuid);
        Some(scheduled.task)
    }

    /// Run a task now, outside its schedule
    pub async fn run_task(&self, uuid: &str) -> SchedulerResult<()> {
        let task = self
            .get_task(uuid)
            .ok_or_else(|| SchedulerError::TaskNotFound(uuid.to_string()))?;
        task.run(&self.runner).await?;
        Ok(())
    }

    /// Replace all tasks
    pub fn set_tasks(&self, tasks: Tasks) {
        let mut current = self.tasks.write();
        *current = tasks
            .into_iter()
            .map(|(key, task)| (key, Scheduled { task, job: None }))
            .collect();
        self.resync(&mut current);
    }

    /// Drop every cron registration and register each task again
    ///
    /// Tasks without a uuid take their map key, or a fresh uuid when the key
    /// is empty too. The new jobs get the current sender and saved states;
    /// calling this any number of times leaves exactly one registration per
    /// task.
    pub fn sync_task_dependencies(&self) {
        let mut tasks = self.tasks.write();
        self.resync(&mut tasks);
    }

    fn resync(&self, tasks: &mut BTreeMap<String, Scheduled>) {
        self.cron.clear();
        *tasks = std::mem::take(tasks)
            .into_iter()
            .map(|(key, mut scheduled)| {
                if scheduled.task.uuid.is_empty() {
                    scheduled.task.uuid = if key.is_empty() {
                        uuid::Uuid::new_v4().to_string()
                    } else {
                        key
                    };
                }
                (scheduled.task.uuid.clone(), scheduled)
            })
            .collect();

        for scheduled in tasks.values_mut() {
            scheduled.job = match self.register(&scheduled.task) {
                Ok(job) => job,
                Err(e) => {
                    error!(task = %scheduled.task.name, error = %e, "Failed to schedule task");
                    None
                }
            };
        }
        debug!(tasks = tasks.len(), jobs = self.cron.len(), "Scheduler synced");
    }

    fn register(&self, task: &Task) -> Result<Option<JobId>, CronError> {
        if task.when.is_empty() {
            return Ok(None);
        }
        self.cron.add_job(&task.when, Arc::new(self.job_for(task))).map(Some)
    }

    fn job_for(&self, task: &Task) -> TaskJob {
        TaskJob::new(
            task.clone(),
            self.runner.clone(),
            Arc::clone(&self.report_state),
            Arc::clone(&self.failed),
        )
    }

    /// Persist tasks to `schedule.json`
    pub async fn save(&self) -> StorageResult<()> {
        let tasks = self.tasks();
        self.storage.save(SCHEDULE_FILE, &tasks).await?;
        debug!(count = tasks.len(), "Saved tasks");
        Ok(())
    }

    /// Load `schedule.json` and re-register every task
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(tasks) = self.storage.load::<Tasks>(SCHEDULE_FILE).await? {
            info!(count = tasks.len(), "Loaded tasks");
            self.set_tasks(tasks);
        }
        Ok(())
    }
}
