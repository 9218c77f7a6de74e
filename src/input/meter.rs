//! Smart-meter CSV ingestion.
//!
//! The CSV carries a timestamp column plus cumulative energy registers, at
//! least two for import and two for export (the usual day/night pairs). The
//! sampling interval is auto-detected, readings are differenced per sample,
//! and the deltas are binned onto the price period: imports become
//! consumption, exports become solar surplus.

use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};

use crate::{
    core::series::{ForecastPoint, ForecastSeries, PriceSeries},
    prelude::*,
    quantity::energy::KilowattHours,
};

/// Recognised sampling intervals, minutes.
const SUPPORTED_INTERVALS: [i64; 7] = [1, 5, 10, 15, 20, 30, 60];

/// How many leading deltas feed the interval detection.
const INTERVAL_PROBE: usize = 100;

pub fn load(path: &Path, period: TimeDelta) -> Result<ForecastSeries> {
    let file = File::open(path)
        .with_context(|| format!("failed to open the meter file `{}`", path.display()))?;
    parse(file, period)
        .with_context(|| format!("failed to ingest the meter file `{}`", path.display()))
}

/// Re-index meter bins onto the price grid; periods without samples get zero.
pub fn align(series: &ForecastSeries, prices: &PriceSeries) -> ForecastSeries {
    let by_timestamp: BTreeMap<DateTime<Local>, &ForecastPoint> =
        series.iter().map(|point| (point.timestamp, point)).collect();
    let points = prices
        .iter()
        .map(|price| {
            by_timestamp.get(&price.timestamp).map_or(
                ForecastPoint {
                    timestamp: price.timestamp,
                    consumption: KilowattHours::ZERO,
                    solar: KilowattHours::ZERO,
                },
                |point| **point,
            )
        })
        .collect();
    ForecastSeries::try_new(points).expect("aligned points are non-negative by construction")
}

fn parse(reader: impl Read, period: TimeDelta) -> Result<ForecastSeries> {
    let mut csv = csv::Reader::from_reader(reader);
    let columns = detect_columns(csv.headers().context("the meter file has no header")?)?;

    let mut rows: Vec<(DateTime<Local>, f64, f64)> = Vec::new();
    for record in csv.records() {
        let record = record.context("malformed meter record")?;
        let timestamp = parse_timestamp(
            record.get(columns.timestamp).context("missing timestamp field")?,
        )?;
        let sum = |indices: &[usize]| -> Result<f64> {
            let mut total = 0.0;
            for &index in indices {
                let raw = record.get(index).context("missing register field")?;
                total += raw
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("malformed register value `{raw}`"))?;
            }
            Ok(total)
        };
        rows.push((timestamp, sum(&columns.imports)?, sum(&columns.exports)?));
    }
    ensure!(rows.len() >= 2, "the meter file needs at least two samples");

    let interval = detect_interval(&rows)?;
    info!(
        samples = rows.len(),
        interval_minutes = interval.num_minutes(),
        "ingesting meter samples",
    );

    // Difference the cumulative registers and bin the deltas onto the price
    // period; a counter reset shows up as a negative delta and is dropped.
    let period_seconds = period.num_seconds();
    let mut bins: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
    for window in rows.windows(2) {
        let (start, import_before, export_before) = window[0];
        let (_, import_after, export_after) = window[1];
        let bin = start.timestamp().div_euclid(period_seconds) * period_seconds;
        let entry = bins.entry(bin).or_insert((0.0, 0.0));
        entry.0 += (import_after - import_before).max(0.0);
        entry.1 += (export_after - export_before).max(0.0);
    }

    let points = bins
        .into_iter()
        .map(|(bin, (import, export))| {
            let timestamp = DateTime::from_timestamp(bin, 0)
                .context("meter bin out of range")?
                .with_timezone(&Local);
            Ok(ForecastPoint {
                timestamp,
                consumption: KilowattHours(import),
                solar: KilowattHours(export),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ForecastSeries::try_new(points)?)
}

struct Columns {
    timestamp: usize,
    imports: Vec<usize>,
    exports: Vec<usize>,
}

fn detect_columns(headers: &csv::StringRecord) -> Result<Columns> {
    let mut timestamp = None;
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        let header = header.to_lowercase();
        if timestamp.is_none()
            && ["tijd", "time", "datum", "date"].iter().any(|marker| header.contains(marker))
        {
            timestamp = Some(index);
        } else if ["2.8.", "terug", "export"].iter().any(|marker| header.contains(marker)) {
            exports.push(index);
        } else if ["1.8.", "import", "verbruik", "levering", "afname"]
            .iter()
            .any(|marker| header.contains(marker))
        {
            imports.push(index);
        }
    }
    let timestamp = timestamp.context("no timestamp column in the meter header")?;
    ensure!(!imports.is_empty(), "no cumulative import registers in the meter header");
    ensure!(!exports.is_empty(), "no cumulative export registers in the meter header");
    Ok(Columns { timestamp, imports, exports })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Local>> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Local));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d-%m-%Y %H:%M:%S", "%d-%m-%Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .with_context(|| format!("unrepresentable local time `{raw}`"));
        }
    }
    bail!("unrecognized meter timestamp `{raw}`");
}

/// Median of the first deltas, rounded to the nearest supported interval.
fn detect_interval(rows: &[(DateTime<Local>, f64, f64)]) -> Result<TimeDelta> {
    let mut deltas: Vec<i64> = rows
        .windows(2)
        .take(INTERVAL_PROBE)
        .map(|window| (window[1].0 - window[0].0).num_seconds())
        .collect();
    ensure!(!deltas.is_empty(), "cannot detect the meter interval from a single sample");
    deltas.sort_unstable();
    let median = if deltas.len() % 2 == 1 {
        deltas[deltas.len() / 2] as f64
    } else {
        (deltas[deltas.len() / 2 - 1] + deltas[deltas.len() / 2]) as f64 / 2.0
    };
    let median_minutes = median / 60.0;
    let nearest = SUPPORTED_INTERVALS
        .into_iter()
        .min_by(|a, b| {
            (*a as f64 - median_minutes)
                .abs()
                .total_cmp(&(*b as f64 - median_minutes).abs())
        })
        .expect("the interval table is non-empty");
    Ok(TimeDelta::minutes(nearest))
}
