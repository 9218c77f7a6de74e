use chrono::NaiveDate;
use clap::Parser;

use crate::{
    cli::{BatteryArgs, DataArgs, TariffArgs},
    core::{
        aggregate::{daily_summaries, intraday_series, monthly_summaries},
        simulator::RollingSimulator,
    },
    prelude::*,
    render::{daily_table, intraday_table, monthly_table},
};

#[derive(Parser)]
pub struct SimulateArgs {
    #[clap(flatten)]
    data: DataArgs,

    #[clap(flatten)]
    battery: BatteryArgs,

    #[clap(flatten)]
    tariff: TariffArgs,

    /// Print the per-day summaries as well.
    #[clap(long)]
    daily: bool,

    /// Print the per-period records of one date.
    #[clap(long)]
    date: Option<NaiveDate>,
}

impl SimulateArgs {
    #[instrument(skip_all)]
    pub fn run(self) -> Result {
        let (prices, forecast) = self.data.load()?;
        let battery = self.battery.config()?;
        let tariff = self.tariff.tariff()?;

        let mut simulator =
            RollingSimulator::new(&prices, &tariff, battery, self.battery.initial_soc());
        if let Some(forecast) = &forecast {
            simulator = simulator.with_forecast(forecast);
        }
        let run = simulator.run()?;

        println!("{}", monthly_table(&monthly_summaries(&run.history, battery.capacity)));
        if self.daily {
            let summaries =
                daily_summaries(&run.history, battery.capacity, Some(self.tariff.fixed()));
            println!("{}", daily_table(&summaries));
        }
        if let Some(date) = self.date {
            println!("{}", intraday_table(intraday_series(&run.history, date)));
        }

        info!(
            profit = %run.total_cashflow(),
            cycles = run.cycles(battery.capacity),
            "simulation finished",
        );
        Ok(())
    }
}
