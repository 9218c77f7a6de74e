//! The four canonical load-coupled scenarios: {fixed, dynamic} tariff ×
//! {no battery, battery}, all reduced through the same aggregation pipeline.

use crate::{
    core::{
        aggregate::{DailySummary, MonthlySummary, daily_summaries, monthly_summaries},
        battery::{BatteryConfig, BatteryState, Exchange},
        plan::ActionKind,
        series::{ForecastSeries, PriceSeries},
        simulator::{RollingSimulator, TimestepRecord},
    },
    error::Error,
    prelude::*,
    quantity::{
        cost::Cost,
        energy::KilowattHours,
        rate::{KilowattHourRate, MegawattHourRate},
    },
    tariff::{FixedTariff, Tariff},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    FixedNoBattery,
    FixedBattery,
    DynamicNoBattery,
    DynamicBattery,
}

impl ScenarioKind {
    pub const ALL: [Self; 4] =
        [Self::FixedNoBattery, Self::FixedBattery, Self::DynamicNoBattery, Self::DynamicBattery];

    pub const fn name(self) -> &'static str {
        match self {
            Self::FixedNoBattery => "fixed tariff, no battery",
            Self::FixedBattery => "fixed tariff, battery",
            Self::DynamicNoBattery => "dynamic tariff, no battery",
            Self::DynamicBattery => "dynamic tariff, battery",
        }
    }
}

pub struct ScenarioResult {
    pub kind: ScenarioKind,
    pub history: Vec<TimestepRecord>,
    pub monthly: Vec<MonthlySummary>,
    pub daily: Vec<DailySummary>,
    pub total_cashflow: Cost,
    pub cycles: f64,
}

pub struct ScenarioFailure {
    pub scenario: ScenarioKind,
    pub error: Error,
}

/// All completed scenarios plus, on partial completion, the first failure.
pub struct ScenarioReport {
    pub completed: Vec<ScenarioResult>,
    pub failure: Option<ScenarioFailure>,
}

pub struct ScenarioRunner<'a> {
    pub prices: &'a PriceSeries,
    pub forecast: &'a ForecastSeries,
    pub tariff: &'a Tariff,
    pub fixed: FixedTariff,
    pub battery: BatteryConfig,
    pub initial_soc: KilowattHours,
}

impl ScenarioRunner<'_> {
    pub fn run(&self) -> ScenarioReport {
        let mut report = ScenarioReport { completed: Vec::new(), failure: None };
        for kind in ScenarioKind::ALL {
            match self.run_scenario(kind) {
                Ok(result) => report.completed.push(result),
                Err(error) => {
                    warn!(scenario = kind.name(), %error, "scenario failed");
                    if report.failure.is_none() {
                        report.failure = Some(ScenarioFailure { scenario: kind, error });
                    }
                }
            }
        }
        report
    }

    fn run_scenario(&self, kind: ScenarioKind) -> Result<ScenarioResult, Error> {
        let history = match kind {
            ScenarioKind::FixedNoBattery => self.no_battery(false),
            ScenarioKind::FixedBattery => self.greedy_battery(),
            ScenarioKind::DynamicNoBattery => self.no_battery(true),
            ScenarioKind::DynamicBattery => {
                let simulator = RollingSimulator::new(
                    self.prices,
                    self.tariff,
                    self.battery,
                    self.initial_soc,
                )
                .with_forecast(self.forecast);
                simulator.run()?.history
            }
        };
        Ok(self.reduce(kind, history))
    }

    /// The shared tail of every scenario: aggregate and total.
    fn reduce(&self, kind: ScenarioKind, history: Vec<TimestepRecord>) -> ScenarioResult {
        let capacity = self.battery.capacity;
        let monthly = monthly_summaries(&history, capacity);
        let daily = daily_summaries(&history, capacity, Some(self.fixed));
        let total_cashflow = history.iter().map(|record| record.cashflow).sum();
        let moved: KilowattHours = history
            .iter()
            .map(|record| match record.kind {
                ActionKind::Idle => KilowattHours::ZERO,
                _ => record.energy_dc,
            })
            .sum();
        ScenarioResult {
            kind,
            monthly,
            daily,
            total_cashflow,
            cycles: (moved / 2.0) / capacity,
            history,
        }
    }

    /// Raw net flow billed directly, nothing dispatched.
    fn no_battery(&self, dynamic: bool) -> Vec<TimestepRecord> {
        self.prices
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let (buy, sell) = self.rates(dynamic, point.price);
                let forecast = self.forecast.get(index);
                let net = forecast.consumption - forecast.solar;
                let grid_import = net.max(KilowattHours::ZERO);
                let grid_export = (-net).max(KilowattHours::ZERO);
                TimestepRecord {
                    timestamp: point.timestamp,
                    kind: ActionKind::Idle,
                    energy_dc: KilowattHours::ZERO,
                    energy_ac: KilowattHours::ZERO,
                    soc: KilowattHours::ZERO,
                    buy,
                    sell,
                    consumption: forecast.consumption,
                    solar: forecast.solar,
                    grid_import,
                    grid_export,
                    cashflow: grid_export * sell - grid_import * buy,
                }
            })
            .collect()
    }

    /// Fixed-tariff battery without foresight: charge on solar surplus,
    /// discharge up to the deficit, idle otherwise.
    fn greedy_battery(&self) -> Vec<TimestepRecord> {
        let period = self.prices.period();
        let mut battery = BatteryState::new(self.battery, self.initial_soc);
        self.prices
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let (buy, sell) = (self.fixed.buy, self.fixed.sell);
                let forecast = self.forecast.get(index);
                let net = forecast.consumption - forecast.solar;

                let (kind, exchange, grid_import, grid_export) =
                    if net < KilowattHours::ZERO {
                        let surplus = -net;
                        let exchange = battery
                            .charge(surplus * self.battery.charge_efficiency, period);
                        let kind = if exchange.dc > KilowattHours::ZERO {
                            ActionKind::Charge
                        } else {
                            ActionKind::Idle
                        };
                        let export = (surplus - exchange.ac).max(KilowattHours::ZERO);
                        (kind, exchange, KilowattHours::ZERO, export)
                    } else if net > KilowattHours::ZERO {
                        let exchange = battery
                            .discharge(net / self.battery.discharge_efficiency, period);
                        let kind = if exchange.dc > KilowattHours::ZERO {
                            ActionKind::Discharge
                        } else {
                            ActionKind::Idle
                        };
                        let import = (net - exchange.ac).max(KilowattHours::ZERO);
                        (kind, exchange, import, KilowattHours::ZERO)
                    } else {
                        (
                            ActionKind::Idle,
                            Exchange::default(),
                            KilowattHours::ZERO,
                            KilowattHours::ZERO,
                        )
                    };

                TimestepRecord {
                    timestamp: point.timestamp,
                    kind,
                    energy_dc: exchange.dc,
                    energy_ac: exchange.ac,
                    soc: battery.soc(),
                    buy,
                    sell,
                    consumption: forecast.consumption,
                    solar: forecast.solar,
                    grid_import,
                    grid_export,
                    cashflow: grid_export * sell - grid_import * buy,
                }
            })
            .collect()
    }

    fn rates(
        &self,
        dynamic: bool,
        price: MegawattHourRate,
    ) -> (KilowattHourRate, KilowattHourRate) {
        if dynamic {
            (self.tariff.buy(price), self.tariff.sell(price))
        } else {
            (self.fixed.buy, self.fixed.sell)
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeDelta;

    use super::*;
    use crate::{
        core::series::{
            ForecastPoint,
            tests::{hourly_series, local},
        },
        quantity::power::Kilowatts,
    };

    fn battery() -> BatteryConfig {
        BatteryConfig::try_new(
            KilowattHours(10.0),
            Kilowatts(5.0),
            Kilowatts(5.0),
            0.9,
            0.9,
            0.0,
            1.0,
        )
        .unwrap()
    }

    fn forecast_for(prices: &PriceSeries, points: &[(f64, f64)]) -> ForecastSeries {
        let start = prices.first_timestamp();
        ForecastSeries::try_new(
            points
                .iter()
                .enumerate()
                .map(|(index, (consumption, solar))| ForecastPoint {
                    timestamp: start + TimeDelta::hours(index as i64),
                    consumption: KilowattHours(*consumption),
                    solar: KilowattHours(*solar),
                })
                .collect(),
        )
        .unwrap()
    }

    fn runner<'a>(
        prices: &'a PriceSeries,
        forecast: &'a ForecastSeries,
        tariff: &'a Tariff,
    ) -> ScenarioRunner<'a> {
        ScenarioRunner {
            prices,
            forecast,
            tariff,
            fixed: FixedTariff { buy: KilowattHourRate(0.30), sell: KilowattHourRate(0.07) },
            battery: battery(),
            initial_soc: KilowattHours::ZERO,
        }
    }

    #[test]
    fn all_four_scenarios_complete() {
        let prices = hourly_series(local(2024, 6, 1, 0, 0), &[50.0, 250.0, 80.0, 300.0]);
        let forecast =
            forecast_for(&prices, &[(1.0, 0.0), (2.0, 0.5), (0.5, 3.0), (2.0, 0.0)]);
        let tariff = Tariff::StandardNoSaldering;
        let report = runner(&prices, &forecast, &tariff).run();
        assert!(report.failure.is_none());
        assert_eq!(report.completed.len(), 4);
        for (result, kind) in report.completed.iter().zip(ScenarioKind::ALL) {
            assert_eq!(result.kind, kind);
            assert_eq!(result.history.len(), 4);
        }
    }

    #[test]
    fn fixed_no_battery_bills_the_raw_net_flow() {
        let prices = hourly_series(local(2024, 6, 1, 0, 0), &[100.0, 100.0]);
        let forecast = forecast_for(&prices, &[(2.0, 0.0), (0.0, 1.0)]);
        let tariff = Tariff::Bare;
        let report = runner(&prices, &forecast, &tariff).run();
        let fixed = &report.completed[0];
        assert_eq!(fixed.kind, ScenarioKind::FixedNoBattery);
        // Import 2 kWh at 0.30, export 1 kWh at 0.07.
        assert_abs_diff_eq!(fixed.total_cashflow.0, -2.0 * 0.30 + 1.0 * 0.07, epsilon = 1e-9);
        assert_abs_diff_eq!(fixed.cycles, 0.0);
    }

    #[test]
    fn greedy_battery_buffers_the_surplus() {
        let prices = hourly_series(local(2024, 6, 1, 0, 0), &[100.0, 100.0, 100.0]);
        // Surplus of 2 kWh, then a deficit of 1 kWh, then idle.
        let forecast = forecast_for(&prices, &[(0.0, 2.0), (1.0, 0.0), (0.0, 0.0)]);
        let tariff = Tariff::Bare;
        let report = runner(&prices, &forecast, &tariff).run();
        let greedy = &report.completed[1];
        assert_eq!(greedy.kind, ScenarioKind::FixedBattery);

        let charge = &greedy.history[0];
        assert_eq!(charge.kind, ActionKind::Charge);
        assert_abs_diff_eq!(charge.energy_dc.0, 2.0 * 0.9, epsilon = 1e-9);
        assert_eq!(charge.grid_import, KilowattHours::ZERO);
        // The whole surplus went into the battery.
        assert_abs_diff_eq!(charge.grid_export.0, 0.0, epsilon = 1e-9);

        let discharge = &greedy.history[1];
        assert_eq!(discharge.kind, ActionKind::Discharge);
        assert_abs_diff_eq!(discharge.energy_ac.0, 1.0, epsilon = 1e-9);
        assert_eq!(discharge.grid_import, KilowattHours::ZERO);

        assert_eq!(greedy.history[2].kind, ActionKind::Idle);
    }

    #[test]
    fn greedy_discharge_is_capped_by_the_stored_energy() {
        let prices = hourly_series(local(2024, 6, 1, 0, 0), &[100.0, 100.0]);
        // Deficit with an empty battery: everything is imported.
        let forecast = forecast_for(&prices, &[(3.0, 0.0), (0.0, 0.0)]);
        let tariff = Tariff::Bare;
        let report = runner(&prices, &forecast, &tariff).run();
        let greedy = &report.completed[1];
        assert_eq!(greedy.history[0].kind, ActionKind::Idle);
        assert_eq!(greedy.history[0].grid_import, KilowattHours(3.0));
    }

    #[test]
    fn dynamic_battery_beats_dynamic_no_battery_on_a_spread() {
        let daily: Vec<f64> = (0..48)
            .map(|hour| match hour % 24 {
                0..=5 => 10.0,
                17..=20 => 400.0,
                _ => 150.0,
            })
            .collect();
        let prices = hourly_series(local(2024, 6, 1, 0, 0), &daily);
        let load: Vec<(f64, f64)> = (0..48)
            .map(|hour| if (8..=16).contains(&(hour % 24)) { (0.3, 1.5) } else { (0.8, 0.0) })
            .collect();
        let forecast = forecast_for(&prices, &load);
        let tariff = Tariff::Bare;
        let report = runner(&prices, &forecast, &tariff).run();
        assert!(report.failure.is_none());
        let no_battery = &report.completed[2];
        let with_battery = &report.completed[3];
        assert_eq!(no_battery.kind, ScenarioKind::DynamicNoBattery);
        assert_eq!(with_battery.kind, ScenarioKind::DynamicBattery);
        assert!(with_battery.total_cashflow > no_battery.total_cashflow);
        assert!(with_battery.cycles > 0.0);
    }
}
