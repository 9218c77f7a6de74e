//! Rolling-horizon year simulator: replans at the day-ahead gate closure and
//! executes the plan one period at a time against the physical battery.

use std::ops::ControlFlow;

use chrono::{DateTime, Days, Local, TimeDelta, TimeZone, Timelike};
use serde::Serialize;

use crate::{
    core::{
        battery::{BatteryConfig, BatteryState, Exchange},
        lp::SolveStatus,
        plan::{ActionKind, Plan},
        planner::{DispatchPlanner, PlanPeriod, PlannerMode},
        series::{ForecastSeries, PriceSeries},
    },
    error::Error,
    prelude::*,
    quantity::{
        cost::Cost,
        energy::KilowattHours,
        rate::KilowattHourRate,
    },
    tariff::Tariff,
};

/// Local hour at which tomorrow's spot prices are published.
const GATE_CLOSURE_HOUR: u32 = 13;

/// Periods simulated between two checkpoint observations.
const CHECKPOINT_STRIDE: usize = 500;

/// Where the simulation currently is; handed to [`Checkpoint::observe`].
#[derive(Copy, Clone, Debug)]
pub struct Progress {
    pub step: usize,
    pub total: usize,
}

/// Cooperative yield point. Observed before every planner call and after
/// every [`CHECKPOINT_STRIDE`] simulated periods; breaking ends the run with
/// the history recorded so far.
pub trait Checkpoint {
    fn observe(&mut self, progress: Progress) -> ControlFlow<()>;
}

/// Runs to completion without yielding.
pub struct Unattended;

impl Checkpoint for Unattended {
    fn observe(&mut self, _progress: Progress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F: FnMut(Progress) -> ControlFlow<()>> Checkpoint for F {
    fn observe(&mut self, progress: Progress) -> ControlFlow<()> {
        self(progress)
    }
}

/// One fully simulated period.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct TimestepRecord {
    pub timestamp: DateTime<Local>,
    pub kind: ActionKind,

    /// DC energy moved through the battery this period.
    pub energy_dc: KilowattHours,

    /// AC energy exchanged by the battery with the grid this period.
    pub energy_ac: KilowattHours,

    /// State of charge after the action.
    pub soc: KilowattHours,

    pub buy: KilowattHourRate,
    pub sell: KilowattHourRate,
    pub consumption: KilowattHours,
    pub solar: KilowattHours,

    /// Net AC drawn from the grid, household load included.
    pub grid_import: KilowattHours,

    /// Net AC fed into the grid.
    pub grid_export: KilowattHours,

    /// `grid_export·sell − grid_import·buy`.
    pub cashflow: Cost,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    Completed,

    /// A checkpoint broke the run; the history holds every fully recorded
    /// period up to that point.
    Cancelled,
}

pub struct SimulationRun {
    pub history: Vec<TimestepRecord>,
    pub outcome: RunOutcome,
}

impl SimulationRun {
    pub fn total_cashflow(&self) -> Cost {
        self.history.iter().map(|record| record.cashflow).sum()
    }

    pub fn total_charged_dc(&self) -> KilowattHours {
        self.history
            .iter()
            .filter(|record| record.kind == ActionKind::Charge)
            .map(|record| record.energy_dc)
            .sum()
    }

    pub fn total_discharged_dc(&self) -> KilowattHours {
        self.history
            .iter()
            .filter(|record| record.kind == ActionKind::Discharge)
            .map(|record| record.energy_dc)
            .sum()
    }

    /// Full-capacity cycle equivalents over the whole run.
    pub fn cycles(&self, capacity: KilowattHours) -> f64 {
        let moved = (self.total_charged_dc() + self.total_discharged_dc()) / 2.0;
        moved / capacity
    }
}

pub struct RollingSimulator<'a> {
    prices: &'a PriceSeries,
    forecast: Option<&'a ForecastSeries>,
    tariff: &'a Tariff,
    battery: BatteryConfig,
    initial_soc: KilowattHours,
}

impl<'a> RollingSimulator<'a> {
    pub const fn new(
        prices: &'a PriceSeries,
        tariff: &'a Tariff,
        battery: BatteryConfig,
        initial_soc: KilowattHours,
    ) -> Self {
        Self { prices, forecast: None, tariff, battery, initial_soc }
    }

    /// Couple the run to a household load; the planner switches to the
    /// load-aware formulation.
    pub const fn with_forecast(mut self, forecast: &'a ForecastSeries) -> Self {
        self.forecast = Some(forecast);
        self
    }

    pub fn run(&self) -> Result<SimulationRun, Error> {
        self.run_with(&mut Unattended)
    }

    /// Drive the year, observing `checkpoint` at every yield point.
    pub fn run_with(&self, checkpoint: &mut dyn Checkpoint) -> Result<SimulationRun, Error> {
        let period = self.prices.period();
        let total = self.prices.len();
        let planner = DispatchPlanner::new(self.battery);
        let mode = if self.forecast.is_some() {
            PlannerMode::LoadAware
        } else {
            PlannerMode::Arbitrage
        };

        let mut battery = BatteryState::new(self.battery, self.initial_soc);
        let mut history: Vec<TimestepRecord> = Vec::with_capacity(total);
        let mut plan: Option<Plan> = None;

        for (index, point) in self.prices.iter().enumerate() {
            let timestamp = point.timestamp;
            let at_gate_closure =
                timestamp.hour() == GATE_CLOSURE_HOUR && timestamp.minute() == 0;
            if plan.is_none() || at_gate_closure {
                if checkpoint.observe(Progress { step: index, total }).is_break() {
                    return Ok(SimulationRun { history, outcome: RunOutcome::Cancelled });
                }
                debug!(%timestamp, soc = %battery.soc(), "replanning");
                plan = Some(self.replan(&planner, index, battery.soc(), period, mode)?);
            } else if index % CHECKPOINT_STRIDE == 0
                && checkpoint.observe(Progress { step: index, total }).is_break()
            {
                return Ok(SimulationRun { history, outcome: RunOutcome::Cancelled });
            }

            let buy = self.tariff.buy(point.price);
            let sell = self.tariff.sell(point.price);
            let forecast = self.forecast.map(|forecast| forecast.get(index));
            let (consumption, solar) = forecast
                .map_or((KilowattHours::ZERO, KilowattHours::ZERO), |point| {
                    (point.consumption, point.solar)
                });

            let action = plan.as_ref().and_then(|plan| plan.get(timestamp));
            let (kind, exchange) = match action.map(|action| (action.kind, action.energy_dc)) {
                Some((ActionKind::Charge, energy)) => {
                    (ActionKind::Charge, battery.charge(energy, period))
                }
                Some((ActionKind::Discharge, energy)) => {
                    (ActionKind::Discharge, battery.discharge(energy, period))
                }
                _ => (ActionKind::Idle, Exchange::default()),
            };
            // The battery may have clipped the whole action away.
            let kind = if exchange.dc == KilowattHours::ZERO { ActionKind::Idle } else { kind };

            let battery_ac = match kind {
                ActionKind::Charge => exchange.ac,
                ActionKind::Discharge => -exchange.ac,
                ActionKind::Idle => KilowattHours::ZERO,
            };
            let net = consumption - solar + battery_ac;
            let grid_import = net.max(KilowattHours::ZERO);
            let grid_export = (-net).max(KilowattHours::ZERO);

            history.push(TimestepRecord {
                timestamp,
                kind,
                energy_dc: exchange.dc,
                energy_ac: exchange.ac,
                soc: battery.soc(),
                buy,
                sell,
                consumption,
                solar,
                grid_import,
                grid_export,
                cashflow: grid_export * sell - grid_import * buy,
            });
        }

        Ok(SimulationRun { history, outcome: RunOutcome::Completed })
    }

    /// Plan from `index` up to the end of the next calendar day, clipped to
    /// the end of the series.
    fn replan(
        &self,
        planner: &DispatchPlanner,
        index: usize,
        soc: KilowattHours,
        period: TimeDelta,
        mode: PlannerMode,
    ) -> Result<Plan, Error> {
        let start = self
            .prices
            .get(index)
            .ok_or_else(|| Error::MissingData(format!("no price at index {index}")))?
            .timestamp;
        let horizon = end_of_next_day(start);
        let mut window = Vec::new();
        for offset in index..self.prices.len() {
            let Some(point) = self.prices.get(offset) else { break };
            if point.timestamp >= horizon {
                break;
            }
            let forecast = self.forecast.map(|forecast| forecast.get(offset));
            window.push(PlanPeriod {
                timestamp: point.timestamp,
                buy: self.tariff.buy(point.price),
                sell: self.tariff.sell(point.price),
                consumption: forecast.map_or(KilowattHours::ZERO, |point| point.consumption),
                solar: forecast.map_or(KilowattHours::ZERO, |point| point.solar),
            });
        }
        let plan = planner.plan(&window, soc, period, mode)?;
        if plan.status == SolveStatus::Feasible {
            warn!(%start, "the solver returned a feasible, non-optimal plan");
        }
        Ok(plan)
    }
}

/// Midnight after tomorrow in local time.
fn end_of_next_day(timestamp: DateTime<Local>) -> DateTime<Local> {
    let midnight = (timestamp.date_naive() + Days::new(2)).and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid wall-clock time");
    Local
        .from_local_datetime(&midnight)
        .earliest()
        // A DST transition exactly at midnight: fall back to a fixed horizon.
        .unwrap_or(timestamp + TimeDelta::hours(35))
}
