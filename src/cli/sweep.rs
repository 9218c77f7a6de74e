use std::ops::ControlFlow;

use clap::Parser;

use crate::{
    cli::{BatteryArgs, DataArgs, TariffArgs},
    core::sweep::{PowerRange, PowerSweep, RatingContext},
    prelude::*,
    quantity::power::Kilowatts,
    render::sweep_table,
};

#[derive(Parser)]
pub struct SweepArgs {
    #[clap(flatten)]
    data: DataArgs,

    #[clap(flatten)]
    battery: BatteryArgs,

    #[clap(flatten)]
    tariff: TariffArgs,

    /// Lower end of the charge power axis, kW.
    #[clap(long = "charge-min-kw", default_value = "1", env = "SWEEP_CHARGE_MIN_KW")]
    charge_min: Kilowatts,

    /// Upper end of the charge power axis, kW (clipped by the preset).
    #[clap(long = "charge-max-kw", default_value = "11", env = "SWEEP_CHARGE_MAX_KW")]
    charge_max: Kilowatts,

    /// Charge power step, kW.
    #[clap(long = "charge-step-kw", default_value = "2", env = "SWEEP_CHARGE_STEP_KW")]
    charge_step: Kilowatts,

    /// Lower end of the discharge power axis, kW.
    #[clap(long = "discharge-min-kw", default_value = "1", env = "SWEEP_DISCHARGE_MIN_KW")]
    discharge_min: Kilowatts,

    /// Upper end of the discharge power axis, kW (clipped by the preset).
    #[clap(long = "discharge-max-kw", default_value = "15", env = "SWEEP_DISCHARGE_MAX_KW")]
    discharge_max: Kilowatts,

    /// Discharge power step, kW.
    #[clap(long = "discharge-step-kw", default_value = "2", env = "SWEEP_DISCHARGE_STEP_KW")]
    discharge_step: Kilowatts,
}

impl SweepArgs {
    #[instrument(skip_all)]
    pub fn run(self) -> Result {
        let (prices, forecast) = self.data.load()?;
        let tariff = self.tariff.tariff()?;
        let sweep = PowerSweep {
            context: RatingContext {
                preset: self.battery.preset,
                capacity: self.battery.capacity,
                min_soc: self.battery.min_soc(),
                max_soc: self.battery.max_soc(),
                initial_soc: self.battery.initial_soc(),
                prices: &prices,
                forecast: forecast.as_ref(),
                tariff: &tariff,
            },
            charge_range: PowerRange {
                min: self.charge_min,
                max: self.charge_max,
                step: self.charge_step,
            },
            discharge_range: PowerRange {
                min: self.discharge_min,
                max: self.discharge_max,
                step: self.discharge_step,
            },
        };

        let result = sweep.run_with(&mut |progress| {
            debug!(
                index = progress.index,
                total = progress.total,
                charge = %progress.charge_power,
                discharge = %progress.discharge_power,
                "evaluating",
            );
            ControlFlow::Continue(())
        })?;

        println!("{}", sweep_table(&result));
        info!(
            charge = %result.best.charge_power,
            discharge = %result.best.discharge_power,
            profit = %result.best.profit,
            "best rating pair",
        );
        Ok(())
    }
}
