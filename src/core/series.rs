//! Spot price and load forecast series on a uniform 60- or 15-minute grid.

use chrono::{DateTime, Local, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    quantity::{energy::KilowattHours, rate::MegawattHourRate},
};

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Local>,
    pub price: MegawattHourRate,
}

/// Day-ahead spot prices with a uniform period.
#[derive(Clone, Debug)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
    period: TimeDelta,
}

impl PriceSeries {
    /// Validate ordering, infer the period, and reject gaps.
    pub fn try_new(points: Vec<PricePoint>) -> Result<Self, Error> {
        let Some(window) = points.windows(2).next() else {
            return Err(Error::MissingData("price series needs at least two points".into()));
        };
        let period = window[1].timestamp - window[0].timestamp;
        if period != TimeDelta::minutes(60) && period != TimeDelta::minutes(15) {
            return Err(Error::invalid(format!(
                "unsupported price period {} min, expected 60 or 15",
                period.num_minutes()
            )));
        }
        for window in points.windows(2) {
            let delta = window[1].timestamp - window[0].timestamp;
            if delta != period {
                return Err(Error::MissingData(format!(
                    "price series has a gap at {}",
                    window[1].timestamp
                )));
            }
        }
        Ok(Self { points, period })
    }

    pub const fn period(&self) -> TimeDelta {
        self.period
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.points.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn first_timestamp(&self) -> DateTime<Local> {
        self.points[0].timestamp
    }
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Local>,
    pub consumption: KilowattHours,
    pub solar: KilowattHours,
}

impl Default for ForecastPoint {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH.into(),
            consumption: KilowattHours::ZERO,
            solar: KilowattHours::ZERO,
        }
    }
}

/// Consumption and solar production per period, aligned 1:1 to a price series.
#[derive(Clone, Debug, Default)]
pub struct ForecastSeries {
    points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    pub fn try_new(points: Vec<ForecastPoint>) -> Result<Self, Error> {
        for point in &points {
            if point.consumption < KilowattHours::ZERO || point.solar < KilowattHours::ZERO {
                return Err(Error::invalid(format!(
                    "negative consumption or solar at {}",
                    point.timestamp
                )));
            }
        }
        Ok(Self { points })
    }

    /// Check the 1:1 alignment against the price series.
    pub fn ensure_aligned(&self, prices: &PriceSeries) -> Result<(), Error> {
        if self.points.len() != prices.len() {
            return Err(Error::MissingData(format!(
                "forecast has {} points, prices have {}",
                self.points.len(),
                prices.len()
            )));
        }
        for (forecast, price) in self.points.iter().zip(prices.iter()) {
            if forecast.timestamp != price.timestamp {
                return Err(Error::MissingData(format!(
                    "forecast timestamp {} does not match price timestamp {}",
                    forecast.timestamp, price.timestamp
                )));
            }
        }
        Ok(())
    }

    /// The point at the aligned index; a hole defaults to zero load.
    pub fn get(&self, index: usize) -> ForecastPoint {
        self.points.get(index).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter()
    }
}
