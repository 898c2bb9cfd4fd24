//! Rules, saved states and scheduled tasks

use hub_logic::{Logic, Rules, SavedStateStore, SavedStates, Scheduler, Tasks};
use tracing::instrument;

use crate::{Area, Store, StoreResult};

impl Store {
    pub fn logic(&self) -> &Logic {
        &self.logic
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn saved_state_store(&self) -> &SavedStateStore {
        &self.saved_states
    }

    pub fn rules(&self) -> Rules {
        self.logic.rules()
    }

    /// Replace the rule set when it differs, persist and announce it
    #[instrument(skip_all, fields(count = rules.len()))]
    pub async fn add_or_update_rules(&self, rules: Rules) -> StoreResult<()> {
        self.logic.flush().await;
        if self.logic.rules() == rules {
            return Ok(());
        }

        self.logic.set_rules(rules);
        let saved = self.logic.save().await;
        self.run_callbacks(Area::Rules);
        Ok(saved?)
    }

    pub fn saved_states(&self) -> SavedStates {
        self.saved_states.all()
    }

    #[instrument(skip_all, fields(count = states.len()))]
    pub async fn add_or_update_saved_states(&self, states: SavedStates) -> StoreResult<()> {
        if self.saved_states.all() == states {
            return Ok(());
        }

        self.saved_states.set_state(states);
        let saved = self.saved_states.save().await;
        self.run_callbacks(Area::SavedStates);
        Ok(saved?)
    }

    pub fn scheduled_tasks(&self) -> Tasks {
        self.scheduler.tasks()
    }

    #[instrument(skip_all, fields(count = tasks.len()))]
    pub async fn add_or_update_scheduled_tasks(&self, tasks: Tasks) -> StoreResult<()> {
        if self.scheduler.tasks() == tasks {
            return Ok(());
        }

        self.scheduler.set_tasks(tasks);
        let saved = self.scheduler.save().await;
        self.run_callbacks(Area::Schedules);
        Ok(saved?)
    }
}
