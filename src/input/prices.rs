//! Spot price file loading: `{ "prices": [{ "timestamp", "price" }] }` with
//! prices in €/MWh.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    core::series::{PricePoint, PriceSeries},
    prelude::*,
};

#[derive(Deserialize)]
struct PriceFile {
    prices: Vec<PricePoint>,
}

pub fn load(path: &Path) -> Result<PriceSeries> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read the price file `{}`", path.display()))?;
    let file: PriceFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse the price file `{}`", path.display()))?;
    let series = PriceSeries::try_new(file.prices)?;
    info!(
        len = series.len(),
        period_minutes = series.period().num_minutes(),
        "loaded spot prices",
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_price_file_format() {
        let raw = r#"{
            "prices": [
                { "timestamp": "2024-06-01T00:00:00+02:00", "price": 50.0 },
                { "timestamp": "2024-06-01T01:00:00+02:00", "price": -12.5 }
            ]
        }"#;
        let file: PriceFile = serde_json::from_str(raw).unwrap();
        let series = PriceSeries::try_new(file.prices).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.get(1).unwrap().price.0, -12.5);
    }
}
