//! Pure reductions from the timestep history to monthly, daily, and intraday
//! views. Month and day boundaries follow the instants' local calendar dates.

use chrono::{Datelike, NaiveDate};
use itertools::Itertools;

use crate::{
    core::{plan::ActionKind, simulator::TimestepRecord},
    quantity::{cost::Cost, energy::KilowattHours},
    tariff::FixedTariff,
};

#[derive(Clone, Debug, serde::Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub charged_dc: KilowattHours,
    pub discharged_dc: KilowattHours,
    pub grid_import: KilowattHours,
    pub grid_export: KilowattHours,
    pub consumption: KilowattHours,
    pub solar: KilowattHours,
    pub cashflow: Cost,
    pub cycles: f64,

    /// Share of the solar production consumed on site.
    pub self_consumption: Option<f64>,

    /// Share of the consumption covered without grid import.
    pub self_sufficiency: Option<f64>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub charged_dc: KilowattHours,
    pub discharged_dc: KilowattHours,
    pub grid_import: KilowattHours,
    pub grid_export: KilowattHours,
    pub consumption: KilowattHours,
    pub solar: KilowattHours,
    pub cashflow: Cost,
    pub cycles: f64,
    pub min_soc_percent: f64,
    pub max_soc_percent: f64,

    /// Cashflow improvement over the fixed-tariff no-battery baseline.
    pub savings: Option<Cost>,

    pub self_consumption: Option<f64>,
    pub self_sufficiency: Option<f64>,
}

struct Totals {
    charged_dc: KilowattHours,
    discharged_dc: KilowattHours,
    grid_import: KilowattHours,
    grid_export: KilowattHours,
    consumption: KilowattHours,
    solar: KilowattHours,
    cashflow: Cost,
}

impl Totals {
    const fn new() -> Self {
        Self {
            charged_dc: KilowattHours::ZERO,
            discharged_dc: KilowattHours::ZERO,
            grid_import: KilowattHours::ZERO,
            grid_export: KilowattHours::ZERO,
            consumption: KilowattHours::ZERO,
            solar: KilowattHours::ZERO,
            cashflow: Cost::ZERO,
        }
    }

    fn push(&mut self, record: &TimestepRecord) {
        match record.kind {
            ActionKind::Charge => self.charged_dc += record.energy_dc,
            ActionKind::Discharge => self.discharged_dc += record.energy_dc,
            ActionKind::Idle => {}
        }
        self.grid_import += record.grid_import;
        self.grid_export += record.grid_export;
        self.consumption += record.consumption;
        self.solar += record.solar;
        self.cashflow += record.cashflow;
    }

    fn cycles(&self, capacity: KilowattHours) -> f64 {
        ((self.charged_dc + self.discharged_dc) / 2.0) / capacity
    }

    fn self_consumption(&self) -> Option<f64> {
        (self.solar > KilowattHours::ZERO).then(|| {
            ((self.solar - self.grid_export).max(KilowattHours::ZERO) / self.solar).clamp(0.0, 1.0)
        })
    }

    fn self_sufficiency(&self) -> Option<f64> {
        (self.consumption > KilowattHours::ZERO).then(|| {
            ((self.consumption - self.grid_import).max(KilowattHours::ZERO) / self.consumption)
                .clamp(0.0, 1.0)
        })
    }
}

pub fn monthly_summaries(
    history: &[TimestepRecord],
    capacity: KilowattHours,
) -> Vec<MonthlySummary> {
    let grouped = history
        .iter()
        .chunk_by(|record| (record.timestamp.year(), record.timestamp.month()));
    (&grouped)
        .into_iter()
        .map(|((year, month), records)| {
            let mut totals = Totals::new();
            for record in records {
                totals.push(record);
            }
            MonthlySummary {
                year,
                month,
                cycles: totals.cycles(capacity),
                self_consumption: totals.self_consumption(),
                self_sufficiency: totals.self_sufficiency(),
                charged_dc: totals.charged_dc,
                discharged_dc: totals.discharged_dc,
                grid_import: totals.grid_import,
                grid_export: totals.grid_export,
                consumption: totals.consumption,
                solar: totals.solar,
                cashflow: totals.cashflow,
            }
        })
        .collect()
}

pub fn daily_summaries(
    history: &[TimestepRecord],
    capacity: KilowattHours,
    baseline: Option<FixedTariff>,
) -> Vec<DailySummary> {
    let grouped = history.iter().chunk_by(|record| record.timestamp.date_naive());
    (&grouped)
        .into_iter()
        .map(|(date, records)| {
            let mut totals = Totals::new();
            let mut min_soc = f64::INFINITY;
            let mut max_soc = f64::NEG_INFINITY;
            let mut baseline_cashflow = Cost::ZERO;
            for record in records {
                totals.push(record);
                let soc_percent = (record.soc / capacity) * 100.0;
                min_soc = min_soc.min(soc_percent);
                max_soc = max_soc.max(soc_percent);
                if let Some(fixed) = baseline {
                    let net = record.consumption - record.solar;
                    baseline_cashflow += (-net).max(KilowattHours::ZERO) * fixed.sell
                        - net.max(KilowattHours::ZERO) * fixed.buy;
                }
            }
            DailySummary {
                date,
                cycles: totals.cycles(capacity),
                min_soc_percent: min_soc,
                max_soc_percent: max_soc,
                savings: baseline.map(|_| totals.cashflow - baseline_cashflow),
                self_consumption: totals.self_consumption(),
                self_sufficiency: totals.self_sufficiency(),
                charged_dc: totals.charged_dc,
                discharged_dc: totals.discharged_dc,
                grid_import: totals.grid_import,
                grid_export: totals.grid_export,
                consumption: totals.consumption,
                solar: totals.solar,
                cashflow: totals.cashflow,
            }
        })
        .collect()
}

/// The timestep records of a single calendar date, in simulation order.
pub fn intraday_series(history: &[TimestepRecord], date: NaiveDate) -> &[TimestepRecord] {
    let start = history.partition_point(|record| record.timestamp.date_naive() < date);
    let end = history.partition_point(|record| record.timestamp.date_naive() <= date);
    &history[start..end]
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, Local};

    use super::*;
    use crate::{
        core::series::tests::local,
        quantity::rate::KilowattHourRate,
    };

    fn record(
        timestamp: DateTime<Local>,
        kind: ActionKind,
        energy_dc: f64,
        soc: f64,
        cashflow: f64,
    ) -> TimestepRecord {
        let ac = KilowattHours(energy_dc);
        TimestepRecord {
            timestamp,
            kind,
            energy_dc: KilowattHours(energy_dc),
            energy_ac: ac,
            soc: KilowattHours(soc),
            buy: KilowattHourRate(0.1),
            sell: KilowattHourRate(0.1),
            consumption: KilowattHours::ZERO,
            solar: KilowattHours::ZERO,
            grid_import: if kind == ActionKind::Charge { ac } else { KilowattHours::ZERO },
            grid_export: if kind == ActionKind::Discharge { ac } else { KilowattHours::ZERO },
            cashflow: Cost(cashflow),
        }
    }

    fn two_month_history() -> Vec<TimestepRecord> {
        vec![
            record(local(2024, 1, 30, 2, 0), ActionKind::Charge, 4.0, 5.0, -0.4),
            record(local(2024, 1, 30, 19, 0), ActionKind::Discharge, 4.0, 1.0, 0.8),
            record(local(2024, 2, 1, 2, 0), ActionKind::Charge, 6.0, 7.0, -0.6),
            record(local(2024, 2, 1, 19, 0), ActionKind::Discharge, 2.0, 5.0, 0.4),
        ]
    }

    #[test]
    fn monthly_summaries_split_on_month_boundaries() {
        let history = two_month_history();
        let summaries = monthly_summaries(&history, KilowattHours(10.0));
        assert_eq!(summaries.len(), 2);
        assert_eq!((summaries[0].year, summaries[0].month), (2024, 1));
        assert_eq!(summaries[0].charged_dc, KilowattHours(4.0));
        assert_eq!(summaries[0].discharged_dc, KilowattHours(4.0));
        assert_abs_diff_eq!(summaries[0].cycles, 0.4);
        assert_abs_diff_eq!(summaries[1].cycles, 0.4);
    }

    #[test]
    fn monthly_summaries_concatenate_over_disjoint_months() {
        let history = two_month_history();
        let (first, second) = history.split_at(2);
        let capacity = KilowattHours(10.0);
        let joint = monthly_summaries(&history, capacity);
        let separate: Vec<_> = monthly_summaries(first, capacity)
            .into_iter()
            .chain(monthly_summaries(second, capacity))
            .collect();
        assert_eq!(joint.len(), separate.len());
        for (joint, separate) in joint.iter().zip(&separate) {
            assert_eq!((joint.year, joint.month), (separate.year, separate.month));
            assert_abs_diff_eq!(joint.cashflow.0, separate.cashflow.0);
            assert_abs_diff_eq!(joint.cycles, separate.cycles);
        }
    }

    #[test]
    fn cycles_are_the_mean_of_both_directions_over_capacity() {
        let history = vec![
            record(local(2024, 3, 1, 2, 0), ActionKind::Charge, 10.0, 10.0, -1.0),
            record(local(2024, 3, 1, 19, 0), ActionKind::Discharge, 6.0, 4.0, 0.9),
        ];
        let summaries = monthly_summaries(&history, KilowattHours(8.0));
        assert_abs_diff_eq!(summaries[0].cycles, (10.0 + 6.0) / 2.0 / 8.0);
    }

    #[test]
    fn daily_summaries_track_the_soc_envelope() {
        let history = vec![
            record(local(2024, 3, 1, 2, 0), ActionKind::Charge, 4.0, 9.0, -0.4),
            record(local(2024, 3, 1, 19, 0), ActionKind::Discharge, 7.0, 2.0, 1.1),
        ];
        let summaries = daily_summaries(&history, KilowattHours(10.0), None);
        assert_eq!(summaries.len(), 1);
        assert_abs_diff_eq!(summaries[0].min_soc_percent, 20.0);
        assert_abs_diff_eq!(summaries[0].max_soc_percent, 90.0);
        assert!(summaries[0].savings.is_none());
    }

    #[test]
    fn daily_savings_compare_against_the_fixed_baseline() {
        let mut with_load =
            record(local(2024, 3, 1, 19, 0), ActionKind::Idle, 0.0, 5.0, -0.2);
        with_load.consumption = KilowattHours(2.0);
        with_load.grid_import = KilowattHours(1.0);
        let baseline =
            FixedTariff { buy: KilowattHourRate(0.25), sell: KilowattHourRate(0.05) };
        let summaries = daily_summaries(&[with_load], KilowattHours(10.0), Some(baseline));
        // Baseline imports the full 2 kWh at 0.25 €/kWh.
        assert_abs_diff_eq!(summaries[0].savings.unwrap().0, -0.2 - (-0.5), epsilon = 1e-9);
    }

    #[test]
    fn intraday_series_is_the_ordered_day_slice() {
        let history = two_month_history();
        let day = intraday_series(&history, NaiveDate::from_ymd_opt(2024, 1, 30).unwrap());
        assert_eq!(day.len(), 2);
        assert!(day[0].timestamp < day[1].timestamp);
        assert!(
            intraday_series(&history, NaiveDate::from_ymd_opt(2024, 5, 5).unwrap()).is_empty()
        );
    }

    #[test]
    fn ratios_appear_only_with_load_data() {
        let mut with_solar = record(local(2024, 6, 1, 12, 0), ActionKind::Idle, 0.0, 5.0, 0.1);
        with_solar.solar = KilowattHours(4.0);
        with_solar.grid_export = KilowattHours(1.0);
        with_solar.consumption = KilowattHours(3.0);
        let summaries = monthly_summaries(&[with_solar], KilowattHours(10.0));
        assert_abs_diff_eq!(summaries[0].self_consumption.unwrap(), 0.75);
        assert_abs_diff_eq!(summaries[0].self_sufficiency.unwrap(), 1.0);

        let bare = record(local(2024, 6, 1, 12, 0), ActionKind::Idle, 0.0, 5.0, 0.0);
        let summaries = monthly_summaries(&[bare], KilowattHours(10.0));
        assert!(summaries[0].self_consumption.is_none());
        assert!(summaries[0].self_sufficiency.is_none());
    }
}
