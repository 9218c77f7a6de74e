mod scenarios;
mod search;
mod simulate;
mod sweep;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub use self::{
    scenarios::ScenariosArgs,
    search::SearchArgs,
    simulate::SimulateArgs,
    sweep::SweepArgs,
};
use crate::{
    core::{
        battery::BatteryConfig,
        efficiency::{EfficiencyBundle, InverterPreset},
        series::{ForecastSeries, PriceSeries},
    },
    input::{forecast, meter, prices},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
    tariff::{FixedTariff, Formula, Tariff},
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full-year rolling-horizon simulation.
    #[clap(name = "simulate")]
    Simulate(Box<SimulateArgs>),

    /// Sweep a grid of charge × discharge power ratings.
    #[clap(name = "sweep")]
    Sweep(Box<SweepArgs>),

    /// Nelder–Mead search for the profit-maximising rating pair.
    #[clap(name = "search")]
    Search(Box<SearchArgs>),

    /// Compare {fixed, dynamic} × {no battery, battery} on the same inputs.
    #[clap(name = "scenarios")]
    Scenarios(Box<ScenariosArgs>),
}

#[derive(Parser)]
pub struct DataArgs {
    /// JSON file with the day-ahead spot prices.
    #[clap(long, env = "HAMSTER_PRICES")]
    pub prices: PathBuf,

    /// JSON file with the consumption and solar forecast.
    #[clap(long, env = "HAMSTER_FORECAST")]
    pub forecast: Option<PathBuf>,

    /// Smart-meter CSV with cumulative registers, used when no forecast file
    /// is given.
    #[clap(long, env = "HAMSTER_METER")]
    pub meter: Option<PathBuf>,
}

impl DataArgs {
    pub fn load(&self) -> Result<(PriceSeries, Option<ForecastSeries>)> {
        let price_series = prices::load(&self.prices)?;
        let forecast_series = if let Some(path) = &self.forecast {
            let series = forecast::load(path)?;
            series.ensure_aligned(&price_series)?;
            Some(series)
        } else if let Some(path) = &self.meter {
            let series = meter::load(path, price_series.period())?;
            Some(meter::align(&series, &price_series))
        } else {
            None
        };
        Ok((price_series, forecast_series))
    }
}

#[derive(Copy, Clone, Parser)]
pub struct BatteryArgs {
    /// Usable battery capacity in kilowatt-hours.
    #[clap(long = "capacity-kwh", default_value = "10", env = "CAPACITY_KWH")]
    pub capacity: KilowattHours,

    /// DC charging power rating in kilowatts.
    #[clap(long = "charge-power-kw", default_value = "5", env = "CHARGE_POWER_KW")]
    pub charge_power: Kilowatts,

    /// DC discharging power rating in kilowatts.
    #[clap(long = "discharge-power-kw", default_value = "5", env = "DISCHARGE_POWER_KW")]
    pub discharge_power: Kilowatts,

    /// Inverter hardware preset.
    #[clap(long, value_enum, default_value = "three-phase", env = "INVERTER_PRESET")]
    pub preset: InverterPreset,

    /// Minimal state of charge, percent.
    #[clap(long, default_value = "10", env = "MIN_SOC_PERCENT")]
    pub min_soc_percent: u32,

    /// Maximal state of charge, percent.
    #[clap(long, default_value = "95", env = "MAX_SOC_PERCENT")]
    pub max_soc_percent: u32,

    /// State of charge at the start of the run, percent.
    #[clap(long, default_value = "10", env = "INITIAL_SOC_PERCENT")]
    pub initial_soc_percent: u32,
}

impl BatteryArgs {
    pub fn min_soc(&self) -> f64 {
        f64::from(self.min_soc_percent) / 100.0
    }

    pub fn max_soc(&self) -> f64 {
        f64::from(self.max_soc_percent) / 100.0
    }

    pub fn initial_soc(&self) -> KilowattHours {
        self.capacity * (f64::from(self.initial_soc_percent) / 100.0)
    }

    /// Build the battery configuration from the preset's efficiency model.
    pub fn config(&self) -> Result<BatteryConfig> {
        let bundle = EfficiencyBundle::derive(
            self.preset,
            self.charge_power,
            self.discharge_power,
            self.capacity,
        )?;
        Ok(BatteryConfig::try_new(
            self.capacity,
            self.charge_power,
            self.discharge_power,
            bundle.charge_total(),
            bundle.discharge_total(),
            self.min_soc(),
            self.max_soc(),
        )?)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TariffKind {
    StandardSaldering,
    StandardNoSaldering,
    Bare,
    Custom,
}

#[derive(Clone, Parser)]
pub struct TariffArgs {
    /// Tariff model applied to the spot price.
    #[clap(long, value_enum, default_value = "standard-saldering", env = "TARIFF")]
    pub tariff: TariffKind,

    /// Buy formula over `epex` (€/MWh → €/kWh) for the custom tariff.
    #[clap(long, env = "BUY_FORMULA")]
    pub buy_formula: Option<Formula>,

    /// Sell formula over `epex` (€/MWh → €/kWh) for the custom tariff.
    #[clap(long, env = "SELL_FORMULA")]
    pub sell_formula: Option<Formula>,

    /// Fixed buy rate for the flat-tariff baseline, €/kWh.
    #[clap(long, default_value = "0.40", env = "FIXED_BUY")]
    pub fixed_buy: KilowattHourRate,

    /// Fixed sell rate for the flat-tariff baseline, €/kWh.
    #[clap(long, default_value = "0.07", env = "FIXED_SELL")]
    pub fixed_sell: KilowattHourRate,
}

impl TariffArgs {
    pub fn tariff(&self) -> Result<Tariff> {
        match self.tariff {
            TariffKind::StandardSaldering => Ok(Tariff::StandardSaldering),
            TariffKind::StandardNoSaldering => Ok(Tariff::StandardNoSaldering),
            TariffKind::Bare => Ok(Tariff::Bare),
            TariffKind::Custom => {
                let (Some(buy), Some(sell)) = (&self.buy_formula, &self.sell_formula) else {
                    bail!("the custom tariff needs both --buy-formula and --sell-formula");
                };
                Ok(Tariff::Custom { buy: buy.clone(), sell: sell.clone() })
            }
        }
    }

    pub const fn fixed(&self) -> FixedTariff {
        FixedTariff { buy: self.fixed_buy, sell: self.fixed_sell }
    }
}
