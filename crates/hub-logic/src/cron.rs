//! Minimal cron runner on top of tokio
//!
//! Expressions use the six-field form with seconds
//! (`sec min hour day-of-month month day-of-week`) and are evaluated in
//! local time. Each registered job gets its own timer task while the
//! runner is started.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use cron::Schedule;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// Identifier of a registered job
pub type JobId = u64;

/// Work run on every schedule tick
#[async_trait]
pub trait CronJob: Send + Sync + 'static {
    async fn run(&self);
}

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },
}

/// Public view of a registered job
#[derive(Debug, Clone, PartialEq)]
pub struct CronEntry {
    pub id: JobId,
    pub expression: String,
    pub next: Option<DateTime<Local>>,
}

struct Registration {
    expression: String,
    schedule: Schedule,
    job: Arc<dyn CronJob>,
    timer: Option<AbortHandle>,
}

/// Cron runner
#[derive(Default)]
pub struct Cron {
    jobs: Mutex<BTreeMap<JobId, Registration>>,
    next_id: AtomicU64,
    running: AtomicBool,
}

/// Parse an expression without registering anything
pub fn parse(expression: &str) -> Result<Schedule, CronError> {
    Schedule::from_str(expression).map_err(|e| CronError::InvalidExpression {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

impl Cron {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; it is armed right away if the runner is started
    pub fn add_job(&self, expression: &str, job: Arc<dyn CronJob>) -> Result<JobId, CronError> {
        let schedule = parse(expression)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let mut registration = Registration {
            expression: expression.to_string(),
            schedule,
            job,
            timer: None,
        };
        if self.is_running() {
            registration.timer = Some(arm(id, &registration));
        }

        self.jobs.lock().insert(id, registration);
        debug!(job_id = id, expression, "Cron job added");
        Ok(id)
    }

    /// Unregister a job; returns whether it existed
    pub fn remove_job(&self, id: JobId) -> bool {
        match self.jobs.lock().remove(&id) {
            Some(registration) => {
                if let Some(timer) = registration.timer {
                    timer.abort();
                }
                debug!(job_id = id, "Cron job removed");
                true
            }
            None => false,
        }
    }

    /// Unregister every job
    pub fn clear(&self) {
        let mut jobs = self.jobs.lock();
        for registration in jobs.values() {
            if let Some(timer) = &registration.timer {
                timer.abort();
            }
        }
        jobs.clear();
    }

    /// Arm every registered job
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut jobs = self.jobs.lock();
        for (id, registration) in jobs.iter_mut() {
            registration.timer = Some(arm(*id, registration));
        }
        debug!(count = jobs.len(), "Cron started");
    }

    /// Disarm every job; registrations are kept
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for registration in self.jobs.lock().values_mut() {
            if let Some(timer) = registration.timer.take() {
                timer.abort();
            }
        }
        debug!("Cron stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Registered jobs in registration order
    pub fn entries(&self) -> Vec<CronEntry> {
        self.jobs
            .lock()
            .iter()
            .map(|(id, registration)| CronEntry {
                id: *id,
                expression: registration.expression.clone(),
                next: registration.schedule.upcoming(Local).next(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

fn arm(id: JobId, registration: &Registration) -> AbortHandle {
    let schedule = registration.schedule.clone();
    let job = Arc::clone(&registration.job);

    tokio::spawn(async move {
        loop {
            let Some(next) = schedule.upcoming(Local).next() else {
                debug!(job_id = id, "Cron schedule has no upcoming time");
                return;
            };
            let wait = (next - Local::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            trace!(job_id = id, "Cron job firing");
            let job = Arc::clone(&job);
            tokio::spawn(async move { job.run().await });
        }
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl CronJob for Counter {
        async fn run(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_invalid_expression() {
        let cron = Cron::new();
        let result = cron.add_job("not a schedule", Arc::new(Counter::default()));
        assert!(matches!(result, Err(CronError::InvalidExpression { .. })));
        assert!(cron.is_empty());
    }

    #[test]
    fn test_add_remove_entries() {
        let cron = Cron::new();
        let first = cron.add_job("0 0 7 * * *", Arc::new(Counter::default())).unwrap();
        let second = cron.add_job("0 30 22 * * Mon-Fri", Arc::new(Counter::default())).unwrap();
        assert_ne!(first, second);

        let entries = cron.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].expression, "0 0 7 * * *");
        assert!(entries[0].next.is_some());

        assert!(cron.remove_job(first));
        assert!(!cron.remove_job(first));
        assert_eq!(cron.len(), 1);

        cron.clear();
        assert!(cron.is_empty());
    }

    #[tokio::test]
    async fn test_job_fires_while_started() {
        let cron = Cron::new();
        let counter = Arc::new(Counter::default());
        cron.add_job("* * * * * *", counter.clone()).unwrap();

        cron.start();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        cron.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let fired = counter.0.load(Ordering::SeqCst);
        assert!(fired >= 1, "fired {} times", fired);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), fired);
    }
}
