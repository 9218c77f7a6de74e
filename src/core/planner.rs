//! Rolling-horizon dispatch planner: a linear program over the battery state
//! trajectory within one planning window.

use chrono::{DateTime, Local, TimeDelta};

use crate::{
    core::{
        battery::BatteryConfig,
        lp::{Direction, LinearProgram, Relation, SolveStatus, VariableId},
        plan::{ActionKind, Plan, PlanAction},
    },
    error::Error,
    quantity::{energy::KilowattHours, rate::KilowattHourRate},
};

/// Below this, an LP variable counts as zero when actions are extracted.
const EPSILON: f64 = 1e-6;

/// One period of the planning window.
#[derive(Copy, Clone, Debug)]
pub struct PlanPeriod {
    pub timestamp: DateTime<Local>,
    pub buy: KilowattHourRate,
    pub sell: KilowattHourRate,
    pub consumption: KilowattHours,
    pub solar: KilowattHours,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlannerMode {
    /// Trade against the spot price alone.
    Arbitrage,

    /// Balance the household load and solar surplus as well.
    LoadAware,
}

/// Stateless planner; borrows the battery configuration and the caller's
/// view of the current SoC per invocation.
pub struct DispatchPlanner {
    battery: BatteryConfig,
}

struct PeriodVariables {
    charge: VariableId,
    discharge: VariableId,
    soc: VariableId,
    grid: Option<(VariableId, VariableId)>,
}

impl DispatchPlanner {
    pub const fn new(battery: BatteryConfig) -> Self {
        Self { battery }
    }

    /// Solve one window and return the per-period actions.
    pub fn plan(
        &self,
        window: &[PlanPeriod],
        initial_soc: KilowattHours,
        period: TimeDelta,
        mode: PlannerMode,
    ) -> Result<Plan, Error> {
        if window.is_empty() {
            return Ok(Plan::empty(period));
        }
        let (flows, status) = self.solve_window(window, initial_soc, period, mode)?;
        let actions = window
            .iter()
            .zip(&flows)
            .map(|(step, &(charge, discharge))| {
                // Ties resolve to charge.
                let (kind, energy) = if charge < EPSILON && discharge < EPSILON {
                    (ActionKind::Idle, 0.0)
                } else if charge >= discharge {
                    (ActionKind::Charge, charge)
                } else {
                    (ActionKind::Discharge, discharge)
                };
                PlanAction {
                    timestamp: step.timestamp,
                    kind,
                    energy_dc: KilowattHours(energy),
                    buy: step.buy,
                    sell: step.sell,
                }
            })
            .collect();
        Ok(Plan::new(period, actions, status))
    }

    /// The raw per-period `(charge, discharge)` DC energies at the optimum.
    fn solve_window(
        &self,
        window: &[PlanPeriod],
        initial_soc: KilowattHours,
        period: TimeDelta,
        mode: PlannerMode,
    ) -> Result<(Vec<(f64, f64)>, SolveStatus), Error> {
        let charge_efficiency = self.battery.charge_efficiency;
        let discharge_efficiency = self.battery.discharge_efficiency;
        let charge_cap = (self.battery.charge_power * period).0;
        let discharge_cap = (self.battery.discharge_power * period).0;
        let (soc_min, soc_max) = (self.battery.min_energy().0, self.battery.max_energy().0);

        // The physical state may start outside the window; plan from the
        // clamped value and let the battery clip during execution.
        let initial = initial_soc.0.clamp(soc_min, soc_max);

        let direction = match mode {
            PlannerMode::Arbitrage => Direction::Maximize,
            PlannerMode::LoadAware => Direction::Minimize,
        };
        let mut program = LinearProgram::new(direction);

        let variables: Vec<PeriodVariables> = window
            .iter()
            .map(|step| {
                let (charge_objective, discharge_objective) = match mode {
                    PlannerMode::Arbitrage => {
                        (-step.buy.0 / charge_efficiency, step.sell.0 * discharge_efficiency)
                    }
                    PlannerMode::LoadAware => (0.0, 0.0),
                };
                let charge = program.add_variable(charge_objective, 0.0, charge_cap);
                let discharge = program.add_variable(discharge_objective, 0.0, discharge_cap);
                let soc = program.add_variable(0.0, soc_min, soc_max);
                let grid = (mode == PlannerMode::LoadAware).then(|| {
                    let import = program.add_variable(step.buy.0, 0.0, f64::INFINITY);
                    let export = program.add_variable(-step.sell.0, 0.0, f64::INFINITY);
                    (import, export)
                });
                PeriodVariables { charge, discharge, soc, grid }
            })
            .collect();

        for (index, current) in variables.iter().enumerate() {
            // SoC dynamics.
            let mut terms = vec![(current.soc, 1.0), (current.charge, -1.0), (current.discharge, 1.0)];
            let rhs = if index == 0 {
                initial
            } else {
                terms.push((variables[index - 1].soc, -1.0));
                0.0
            };
            program.add_constraint(terms, Relation::Equal, rhs);

            // AC balance against the household load.
            if let Some((import, export)) = current.grid {
                let step = &window[index];
                program.add_constraint(
                    vec![
                        (import, 1.0),
                        (export, -1.0),
                        (current.charge, -1.0 / charge_efficiency),
                        (current.discharge, discharge_efficiency),
                    ],
                    Relation::Equal,
                    (step.consumption - step.solar).0,
                );
            }
        }

        let solution = program.solve()?;
        let flows = variables
            .iter()
            .map(|period_variables| {
                (solution[period_variables.charge], solution[period_variables.discharge])
            })
            .collect();
        Ok((flows, solution.status))
    }
}
