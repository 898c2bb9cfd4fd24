//! Reactive rules and scheduling for the automation hub
//!
//! # Architecture
//!
//! ```text
//! device report ──► Logic (single worker) ──► evaluate every rule
//!                                              │
//!                        rule becomes active ──┴──► ActionRunner ──► Sender
//!                                                   ▲
//! cron schedule ──► Scheduler ──► Task ─────────────┘
//! ```
//!
//! - [`Logic`] serializes every device update and rule-set change through one
//!   job queue and re-evaluates all rules after each job.
//! - [`Rule`] is a named boolean expression with optional debounce (`for`)
//!   and an ordered list of [`Action`]s.
//! - [`SavedStateStore`] holds named snapshots ("scenes") of target device
//!   state that actions apply.
//! - [`Scheduler`] replays saved states from cron schedules.

pub mod action;
pub mod cron;
pub mod logic;
pub mod rule;
pub mod savedstate;
pub mod scheduler;
pub mod sender;
pub mod task;

pub use action::{Action, ActionError, ActionRunner, RunOutcome};
pub use logic::{Logic, ReportStateCallback, TriggerDestinationCallback};
pub use rule::{Rule, RuleInstance, RuleStatus, Rules};
pub use savedstate::{SavedState, SavedStateStore, SavedStates};
pub use scheduler::{Scheduler, SchedulerError, SchedulerResult};
pub use sender::{MessageType, SendError, Sender};
pub use task::{Task, Tasks};
