//! Forecast file loading: `{ "series": [{ "timestamp", "consumption",
//! "solar" }] }` in kWh per period, aligned to the price series.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    core::series::{ForecastPoint, ForecastSeries},
    prelude::*,
};

#[derive(Deserialize)]
struct ForecastFile {
    series: Vec<ForecastPoint>,
}

pub fn load(path: &Path) -> Result<ForecastSeries> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read the forecast file `{}`", path.display()))?;
    let file: ForecastFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse the forecast file `{}`", path.display()))?;
    let series = ForecastSeries::try_new(file.series)?;
    info!(len = series.len(), "loaded the consumption and solar forecast");
    Ok(series)
}
