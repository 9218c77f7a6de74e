//! Two-dimensional Nelder–Mead direct search over the charge/discharge power
//! ratings, scored by negative simulated profit.

use serde::Serialize;

use crate::{
    core::sweep::{RatingContext, SweepPoint},
    error::Error,
    prelude::*,
    quantity::power::Kilowatts,
};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Lower bound of both axes; the upper bound is the preset hardware limit.
const MIN_POWER: f64 = 0.1;

/// Relative size of the initial simplex perturbations.
const INITIAL_SPREAD: f64 = 0.2;

#[derive(Copy, Clone, Debug)]
pub struct SearchOptions {
    /// Simplex diameter below which the search counts as converged, kW.
    pub tolerance: f64,
    pub max_iterations: usize,
    pub max_evaluations: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { tolerance: 0.05, max_iterations: 100, max_evaluations: 500 }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub best: SweepPoint,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

pub struct RatingSearch<'a> {
    pub context: RatingContext<'a>,
    pub start: (Kilowatts, Kilowatts),
    pub options: SearchOptions,
}

impl RatingSearch<'_> {
    pub fn run(&self) -> Result<SearchResult, Error> {
        let bounds = [
            (MIN_POWER, self.context.preset.max_charge_power().0),
            (MIN_POWER, self.context.preset.max_discharge_power().0),
        ];
        let outcome = nelder_mead(
            |point| {
                self.context
                    .evaluate(Kilowatts(point[0]), Kilowatts(point[1]))
                    .map(|evaluated| -evaluated.profit.0)
            },
            [self.start.0.0, self.start.1.0],
            bounds,
            self.options,
        )?;
        info!(
            iterations = outcome.iterations,
            evaluations = outcome.evaluations,
            converged = outcome.converged,
            "search finished",
        );
        // The objective only returns the scalar; re-derive the full record.
        let best = self.context.evaluate(Kilowatts(outcome.best[0]), Kilowatts(outcome.best[1]))?;
        Ok(SearchResult {
            best,
            iterations: outcome.iterations,
            evaluations: outcome.evaluations,
            converged: outcome.converged,
        })
    }
}

struct Outcome {
    best: [f64; 2],
    iterations: usize,
    evaluations: usize,
    converged: bool,
}

/// Minimize `objective` over a bounded plane.
fn nelder_mead<F>(
    mut objective: F,
    start: [f64; 2],
    bounds: [(f64, f64); 2],
    options: SearchOptions,
) -> Result<Outcome, Error>
where
    F: FnMut([f64; 2]) -> Result<f64, Error>,
{
    let clip = |point: [f64; 2]| {
        [point[0].clamp(bounds[0].0, bounds[0].1), point[1].clamp(bounds[1].0, bounds[1].1)]
    };

    let origin = clip(start);
    let spread = INITIAL_SPREAD * origin[0].max(origin[1]);
    let mut simplex: Vec<[f64; 2]> = vec![
        origin,
        offset(origin, 0, spread, bounds),
        offset(origin, 1, spread, bounds),
    ];

    let mut evaluations = 0;
    let mut evaluate = |point: [f64; 2], evaluations: &mut usize| {
        *evaluations += 1;
        objective(point)
    };

    let mut values = Vec::with_capacity(3);
    for &vertex in &simplex {
        values.push(evaluate(vertex, &mut evaluations)?);
    }

    let mut iterations = 0;
    let mut converged = diameter(&simplex) < options.tolerance;
    while !converged
        && iterations < options.max_iterations
        && evaluations < options.max_evaluations
    {
        iterations += 1;

        // Order the simplex best to worst.
        let mut order = [0, 1, 2];
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let (best, second, worst) = (order[0], order[1], order[2]);

        let centroid = [
            (simplex[best][0] + simplex[second][0]) / 2.0,
            (simplex[best][1] + simplex[second][1]) / 2.0,
        ];
        let reflected = clip([
            centroid[0] + REFLECTION * (centroid[0] - simplex[worst][0]),
            centroid[1] + REFLECTION * (centroid[1] - simplex[worst][1]),
        ]);
        let reflected_value = evaluate(reflected, &mut evaluations)?;

        if reflected_value < values[best] {
            let expanded = clip([
                centroid[0] + EXPANSION * (reflected[0] - centroid[0]),
                centroid[1] + EXPANSION * (reflected[1] - centroid[1]),
            ]);
            let expanded_value = evaluate(expanded, &mut evaluations)?;
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
        } else if reflected_value < values[second] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
        } else {
            let contracted = clip([
                centroid[0] + CONTRACTION * (simplex[worst][0] - centroid[0]),
                centroid[1] + CONTRACTION * (simplex[worst][1] - centroid[1]),
            ]);
            let contracted_value = evaluate(contracted, &mut evaluations)?;
            if contracted_value < values[worst] {
                simplex[worst] = contracted;
                values[worst] = contracted_value;
            } else {
                // Shrink everything toward the best vertex.
                for index in [second, worst] {
                    simplex[index] = clip([
                        simplex[best][0] + SHRINK * (simplex[index][0] - simplex[best][0]),
                        simplex[best][1] + SHRINK * (simplex[index][1] - simplex[best][1]),
                    ]);
                    values[index] = evaluate(simplex[index], &mut evaluations)?;
                }
            }
        }

        converged = diameter(&simplex) < options.tolerance;
    }

    let best_index = (0..3)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .expect("the simplex has three vertices");
    Ok(Outcome { best: simplex[best_index], iterations, evaluations, converged })
}

/// Perturb one axis, flipping the direction when pinned at a bound.
fn offset(origin: [f64; 2], axis: usize, spread: f64, bounds: [(f64, f64); 2]) -> [f64; 2] {
    let mut point = origin;
    point[axis] = (origin[axis] + spread).clamp(bounds[axis].0, bounds[axis].1);
    if (point[axis] - origin[axis]).abs() < f64::EPSILON {
        point[axis] = (origin[axis] - spread).clamp(bounds[axis].0, bounds[axis].1);
    }
    point
}

/// Largest pairwise Euclidean distance between vertices.
fn diameter(simplex: &[[f64; 2]]) -> f64 {
    let mut largest = 0.0_f64;
    for (index, first) in simplex.iter().enumerate() {
        for second in &simplex[index + 1..] {
            let distance = (first[0] - second[0]).hypot(first[1] - second[1]);
            largest = largest.max(distance);
        }
    }
    largest
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        core::{
            efficiency::InverterPreset,
            series::tests::{hourly_series, local},
        },
        quantity::energy::KilowattHours,
        tariff::Tariff,
    };

    #[test]
    fn converges_to_the_quadratic_optimum() {
        let outcome = nelder_mead(
            |point| Ok::<_, Error>((point[0] - 4.0).powi(2) + (point[1] - 6.0).powi(2)),
            [1.0, 1.0],
            [(0.1, 10.0), (0.1, 10.0)],
            SearchOptions { tolerance: 0.05, ..SearchOptions::default() },
        )
        .unwrap();
        assert!(outcome.converged);
        assert!(outcome.iterations < 100);
        assert_abs_diff_eq!(outcome.best[0], 4.0, epsilon = 0.1);
        assert_abs_diff_eq!(outcome.best[1], 6.0, epsilon = 0.1);
    }

    #[test]
    fn respects_the_bounds() {
        // Unconstrained minimum sits outside the box.
        let outcome = nelder_mead(
            |point| Ok::<_, Error>((point[0] - 20.0).powi(2) + (point[1] + 5.0).powi(2)),
            [5.0, 5.0],
            [(0.1, 10.0), (0.1, 10.0)],
            SearchOptions::default(),
        )
        .unwrap();
        assert!(outcome.best[0] <= 10.0 + f64::EPSILON);
        assert!(outcome.best[1] >= 0.1 - f64::EPSILON);
    }

    #[test]
    fn evaluation_cap_stops_a_stubborn_search() {
        let mut calls = 0;
        let outcome = nelder_mead(
            |point| {
                calls += 1;
                // A rippled objective that refuses to settle quickly.
                Ok::<_, Error>((point[0] * 37.0).sin() + (point[1] * 53.0).cos())
            },
            [5.0, 5.0],
            [(0.1, 10.0), (0.1, 10.0)],
            SearchOptions { tolerance: 0.0, max_iterations: 100_000, max_evaluations: 50 },
        )
        .unwrap();
        assert!(!outcome.converged);
        assert!(outcome.evaluations >= 50);
        assert!(calls <= 60);
    }

    #[test]
    fn search_over_the_simulator_prefers_high_power() {
        let daily: Vec<f64> = (0..48)
            .map(|hour| match hour % 24 {
                0..=5 => 5.0,
                17..=20 => 350.0,
                _ => 120.0,
            })
            .collect();
        let prices = hourly_series(local(2024, 6, 1, 0, 0), &daily);
        let tariff = Tariff::Bare;
        let search = RatingSearch {
            context: RatingContext {
                preset: InverterPreset::ThreePhase,
                capacity: KilowattHours(10.0),
                min_soc: 0.0,
                max_soc: 1.0,
                initial_soc: KilowattHours::ZERO,
                prices: &prices,
                forecast: None,
                tariff: &tariff,
            },
            start: (Kilowatts(1.0), Kilowatts(1.0)),
            options: SearchOptions { tolerance: 0.2, ..SearchOptions::default() },
        };
        let result = search.run().unwrap();
        assert!(result.evaluations > 3);
        // More inverter power monetizes the evening spike better.
        assert!(result.best.charge_power > Kilowatts(1.0));
        assert!(result.best.profit > crate::quantity::cost::Cost::ZERO);
    }
}
