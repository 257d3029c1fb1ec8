//! Transport that replays a fixed list of outcomes.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::model::Outcome;
use crate::error::ApplyError;
use crate::sync::{RemoteApplier, SyncQueueItem};

/// Reports scripted outcomes in order, then `Ok` for every later call.
#[derive(Debug, Default)]
pub struct ScriptedApplier {
    outcomes: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApplier {
    /// Create an applier that will report `outcomes` in order.
    #[must_use]
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// IDs of every item applied so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outcomes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl RemoteApplier for ScriptedApplier {
    async fn apply(&self, item: &SyncQueueItem) -> Result<(), ApplyError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.id.clone());

        let next = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next.unwrap_or(Outcome::Ok) {
            Outcome::Ok => Ok(()),
            Outcome::Fail => Err(ApplyError::Transport("scripted failure".to_string())),
            Outcome::Timeout => Err(ApplyError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{Mutation, Resource};
    use chrono::DateTime;
    use serde_json::json;

    #[tokio::test]
    async fn test_outcomes_replay_in_order_then_succeed() {
        let applier = ScriptedApplier::new([Outcome::Fail, Outcome::Timeout]);
        let item = SyncQueueItem::from_mutation(
            Mutation::create(Resource::List, json!({})),
            DateTime::UNIX_EPOCH,
        );

        assert!(matches!(applier.apply(&item).await, Err(ApplyError::Transport(_))));
        assert_eq!(applier.apply(&item).await, Err(ApplyError::Timeout));
        assert_eq!(applier.remaining(), 0);
        assert_eq!(applier.apply(&item).await, Ok(()));
        assert_eq!(applier.calls().len(), 3);
    }
}
