use clap::Parser;

use crate::{
    cli::{BatteryArgs, DataArgs, TariffArgs},
    core::scenario::ScenarioRunner,
    prelude::*,
    render::scenario_table,
};

#[derive(Parser)]
pub struct ScenariosArgs {
    #[clap(flatten)]
    data: DataArgs,

    #[clap(flatten)]
    battery: BatteryArgs,

    #[clap(flatten)]
    tariff: TariffArgs,
}

impl ScenariosArgs {
    #[instrument(skip_all)]
    pub fn run(self) -> Result {
        let (prices, forecast) = self.data.load()?;
        let Some(forecast) = forecast else {
            bail!("the scenario comparison needs --forecast or --meter load data");
        };
        let battery = self.battery.config()?;
        let tariff = self.tariff.tariff()?;

        let runner = ScenarioRunner {
            prices: &prices,
            forecast: &forecast,
            tariff: &tariff,
            fixed: self.tariff.fixed(),
            battery,
            initial_soc: self.battery.initial_soc(),
        };
        let report = runner.run();
        println!("{}", scenario_table(&report));

        if let Some(failure) = &report.failure {
            bail!("scenario `{}` failed: {}", failure.scenario.name(), failure.error);
        }
        Ok(())
    }
}
