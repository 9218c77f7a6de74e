use clap::Parser;

use crate::{
    cli::{BatteryArgs, DataArgs, TariffArgs},
    core::{
        nelder_mead::{RatingSearch, SearchOptions},
        sweep::RatingContext,
    },
    prelude::*,
    render::search_table,
};

#[derive(Parser)]
pub struct SearchArgs {
    #[clap(flatten)]
    data: DataArgs,

    /// The battery's power ratings seed the initial simplex.
    #[clap(flatten)]
    battery: BatteryArgs,

    #[clap(flatten)]
    tariff: TariffArgs,

    /// Simplex diameter below which the search stops, kW.
    #[clap(long = "tolerance-kw", default_value = "0.05", env = "SEARCH_TOLERANCE_KW")]
    tolerance: f64,
}

impl SearchArgs {
    #[instrument(skip_all)]
    pub fn run(self) -> Result {
        let (prices, forecast) = self.data.load()?;
        let tariff = self.tariff.tariff()?;
        let search = RatingSearch {
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
            start: (self.battery.charge_power, self.battery.discharge_power),
            options: SearchOptions { tolerance: self.tolerance, ..SearchOptions::default() },
        };
        let result = search.run()?;
        println!("{}", search_table(&result));
        Ok(())
    }
}
