//! Dispatch plans: one action per market period.

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeDelta};

use crate::{
    core::lp::SolveStatus,
    quantity::{energy::KilowattHours, rate::KilowattHourRate},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Idle,
    Charge,
    Discharge,
}

#[derive(Copy, Clone, Debug)]
pub struct PlanAction {
    pub timestamp: DateTime<Local>,
    pub kind: ActionKind,

    /// DC energy to move; zero iff the action is [`ActionKind::Idle`].
    pub energy_dc: KilowattHours,

    pub buy: KilowattHourRate,
    pub sell: KilowattHourRate,
}

/// A solved window, keyed by the period count since the Unix epoch so that
/// lookups do not touch wall-clock structure.
pub struct Plan {
    period: TimeDelta,
    actions: HashMap<i64, PlanAction>,
    pub status: SolveStatus,
}

impl Plan {
    pub fn new(period: TimeDelta, actions: Vec<PlanAction>, status: SolveStatus) -> Self {
        let actions = actions
            .into_iter()
            .map(|action| (period_index(action.timestamp, period), action))
            .collect();
        Self { period, actions, status }
    }

    pub fn empty(period: TimeDelta) -> Self {
        Self { period, actions: HashMap::new(), status: SolveStatus::Optimal }
    }

    pub fn get(&self, timestamp: DateTime<Local>) -> Option<&PlanAction> {
        self.actions.get(&period_index(timestamp, self.period))
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn period_index(timestamp: DateTime<Local>, period: TimeDelta) -> i64 {
    timestamp.timestamp() / period.num_seconds()
}
