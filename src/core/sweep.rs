//! Grid search over charge × discharge power ratings, each point scored by a
//! full-year simulation.

use std::ops::ControlFlow;

use serde::Serialize;

use crate::{
    core::{
        battery::BatteryConfig,
        efficiency::{EfficiencyBundle, InverterPreset},
        series::{ForecastSeries, PriceSeries},
        simulator::RollingSimulator,
    },
    error::Error,
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
    tariff::Tariff,
};

/// Everything needed to score one `(charge, discharge)` rating pair.
pub struct RatingContext<'a> {
    pub preset: InverterPreset,
    pub capacity: KilowattHours,
    pub min_soc: f64,
    pub max_soc: f64,
    pub initial_soc: KilowattHours,
    pub prices: &'a PriceSeries,
    pub forecast: Option<&'a ForecastSeries>,
    pub tariff: &'a Tariff,
}

impl RatingContext<'_> {
    /// Derive the efficiency bundle, run the full year, and reduce to totals.
    pub fn evaluate(
        &self,
        charge_power: Kilowatts,
        discharge_power: Kilowatts,
    ) -> Result<SweepPoint, Error> {
        let bundle = EfficiencyBundle::derive(
            self.preset,
            charge_power,
            discharge_power,
            self.capacity,
        )?;
        let battery = BatteryConfig::try_new(
            self.capacity,
            charge_power,
            discharge_power,
            bundle.charge_total(),
            bundle.discharge_total(),
            self.min_soc,
            self.max_soc,
        )?;
        let mut simulator =
            RollingSimulator::new(self.prices, self.tariff, battery, self.initial_soc);
        if let Some(forecast) = self.forecast {
            simulator = simulator.with_forecast(forecast);
        }
        let run = simulator.run().map_err(|error| at_point(error, charge_power, discharge_power))?;
        let profit = run.total_cashflow();
        let cycles = run.cycles(self.capacity);
        Ok(SweepPoint {
            charge_power,
            discharge_power,
            profit,
            cycles,
            profit_per_cycle: (cycles > 0.0).then(|| profit / cycles),
        })
    }
}

/// Tag an inner failure with the grid point that produced it.
fn at_point(error: Error, charge_power: Kilowatts, discharge_power: Kilowatts) -> Error {
    match error {
        Error::Solver(message) => {
            Error::Solver(format!("at ({charge_power}, {discharge_power}): {message}"))
        }
        Error::MissingData(message) => {
            Error::MissingData(format!("at ({charge_power}, {discharge_power}): {message}"))
        }
        other => other,
    }
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct SweepPoint {
    pub charge_power: Kilowatts,
    pub discharge_power: Kilowatts,
    pub profit: Cost,
    pub cycles: f64,
    pub profit_per_cycle: Option<Cost>,
}

/// Inclusive power range; the upper end is clipped by the preset hardware
/// limit before expansion.
#[derive(Copy, Clone, Debug)]
pub struct PowerRange {
    pub min: Kilowatts,
    pub max: Kilowatts,
    pub step: Kilowatts,
}

impl PowerRange {
    fn values(&self, hardware_max: Kilowatts) -> Result<Vec<Kilowatts>, Error> {
        if self.step <= Kilowatts::ZERO {
            return Err(Error::invalid(format!("non-positive sweep step {}", self.step)));
        }
        if self.min < Kilowatts::ZERO {
            return Err(Error::invalid(format!("negative sweep minimum {}", self.min)));
        }
        let max = self.max.min(hardware_max);
        let mut values = Vec::new();
        let mut value = self.min;
        while value <= max + Kilowatts(1e-9) {
            values.push(value);
            value += self.step;
        }
        if values.is_empty() {
            return Err(Error::invalid(format!(
                "sweep range [{}, {}] is empty after clipping to {hardware_max}",
                self.min, self.max
            )));
        }
        Ok(values)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SweepProgress {
    pub index: usize,
    pub total: usize,
    pub charge_power: Kilowatts,
    pub discharge_power: Kilowatts,
}

#[derive(Debug, Serialize)]
pub struct SweepResult {
    /// Every evaluated grid point, charge-major.
    pub grid: Vec<SweepPoint>,

    /// The most profitable point.
    pub best: SweepPoint,

    /// The `charge == discharge` slice, sorted by power.
    pub diagonal: Vec<SweepPoint>,
}

pub struct PowerSweep<'a> {
    pub context: RatingContext<'a>,
    pub charge_range: PowerRange,
    pub discharge_range: PowerRange,
}

impl PowerSweep<'_> {
    pub fn run(&self) -> Result<SweepResult, Error> {
        self.run_with(&mut |_| ControlFlow::Continue(()))
    }

    /// Evaluate the full grid, reporting each point to `progress` before its
    /// simulation. Breaking cancels the sweep.
    pub fn run_with(
        &self,
        progress: &mut dyn FnMut(SweepProgress) -> ControlFlow<()>,
    ) -> Result<SweepResult, Error> {
        let charge_values = self.charge_range.values(self.context.preset.max_charge_power())?;
        let discharge_values =
            self.discharge_range.values(self.context.preset.max_discharge_power())?;
        let total = charge_values.len() * discharge_values.len();
        info!(total, "sweeping the rating grid");

        let mut grid = Vec::with_capacity(total);
        for (row, charge_power) in charge_values.iter().copied().enumerate() {
            for (column, discharge_power) in discharge_values.iter().copied().enumerate() {
                let report = SweepProgress {
                    index: row * discharge_values.len() + column,
                    total,
                    charge_power,
                    discharge_power,
                };
                if progress(report).is_break() {
                    return Err(Error::Cancelled);
                }
                grid.push(self.context.evaluate(charge_power, discharge_power)?);
            }
        }

        let best = *grid
            .iter()
            .max_by_key(|point| point.profit)
            .ok_or_else(|| Error::invalid("empty sweep grid"))?;
        let mut diagonal: Vec<SweepPoint> = grid
            .iter()
            .filter(|point| point.charge_power == point.discharge_power)
            .copied()
            .collect();
        diagonal.sort_by_key(|point| point.charge_power);

        Ok(SweepResult { grid, best, diagonal })
    }
}
